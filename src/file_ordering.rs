//! Reading order for the chapters of a book.
//!
//! Directories are expanded in plain path order so that numbered files
//! (`01-intro.md`, `02-setup.md`, ...) come out the way authors expect. The one
//! exception is a preface, which is pulled to the front of the book regardless
//! of where it was found.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// Order two paths component by component, comparing names case-insensitively
/// first so that `Intro.md` and `intro-2.md` sit next to each other.
pub fn compare_paths(a: &Path, b: &Path) -> Ordering {
    let mut a_parts = a.iter();
    let mut b_parts = b.iter();

    loop {
        match (a_parts.next(), b_parts.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(a), Some(b)) => {
                let folded = a
                    .to_string_lossy()
                    .to_lowercase()
                    .cmp(&b.to_string_lossy().to_lowercase());
                match folded.then_with(|| a.cmp(b)) {
                    Ordering::Equal => continue,
                    o => return o,
                }
            }
        }
    }
}

/// Sort paths into reading order.
pub fn sort_paths(files: &mut [PathBuf]) {
    files.sort_by(|a, b| compare_paths(a, b));
}

fn is_preface(path: &Path) -> bool {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().eq_ignore_ascii_case("preface"))
        .unwrap_or(false)
}

/// Move the first preface (a file whose stem is `preface`, in any case) to the
/// front, keeping everything else in its original order.
pub fn prioritize_preface(files: &mut Vec<PathBuf>) {
    if let Some(index) = files.iter().position(|f| is_preface(f)) {
        let preface = files.remove(index);
        files.insert(0, preface);
    }
}
