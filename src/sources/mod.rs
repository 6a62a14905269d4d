//! Resolving command line arguments into the Markdown files of a book.
//!
//! Each argument is a Markdown file, a directory (expanded recursively), or a
//! repository URL which is shallow-cloned into a temporary directory first.
//! The temporary clones are owned by the resulting [`SourceSet`] and removed
//! when it is dropped.

use crate::file_ordering;
use anyhow::{anyhow, Context, Result};
use globset::{GlobBuilder, GlobSetBuilder};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

mod repository;
pub use repository::ClonedRepository;

const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown"];

/// Whether an argument names a remote repository rather than a local path.
pub fn is_remote(arg: &str) -> bool {
    arg.starts_with("http://") || arg.starts_with("https://") || arg.starts_with("git@")
}

pub fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| MARKDOWN_EXTENSIONS.iter().any(|m| e.eq_ignore_ascii_case(m)))
}

/// The ordered, deduplicated Markdown files that make up a book.
#[derive(Debug)]
pub struct SourceSet {
    files: Vec<PathBuf>,
    /// Kept alive until the book has been rendered
    clones: Vec<ClonedRepository>,
}

impl SourceSet {
    /// Resolve every argument, in order, into Markdown files.
    pub fn resolve<S: AsRef<str>>(args: &[S]) -> Result<SourceSet> {
        let mut set = SourceSet {
            files: Vec::default(),
            clones: Vec::default(),
        };
        let mut seen: HashSet<PathBuf> = HashSet::default();

        for arg in args {
            let arg = arg.as_ref();
            let found = if is_remote(arg) {
                let clone = ClonedRepository::clone_shallow(arg)
                    .with_context(|| format!("Failed to clone repository {arg}"))?;
                let files = markdown_files_in(clone.root())?;
                set.clones.push(clone);
                files
            } else {
                expand_path(Path::new(arg))?
            };

            for file in found {
                let file = file
                    .canonicalize()
                    .with_context(|| format!("Failed to canonicalize path {}", file.display()))?;
                if seen.insert(file.clone()) {
                    set.files.push(file);
                }
            }
        }

        if set.files.is_empty() {
            return Err(anyhow!("No Markdown files found in the provided sources"));
        }

        log::info!("Found {} Markdown file(s)", set.files.len());
        Ok(set)
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Drop every file whose stem matches one of the glob `patterns`
    /// (case-insensitively).
    pub fn exclude(&mut self, patterns: &[String]) -> Result<()> {
        if patterns.is_empty() {
            return Ok(());
        }

        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = GlobBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .with_context(|| format!("Invalid exclude pattern: {pattern}"))?;
            builder.add(glob);
        }
        let globs = builder
            .build()
            .with_context(|| "Failed to build exclude patterns")?;

        self.files.retain(|file| {
            let stem = file.file_stem().unwrap_or_default();
            let excluded = globs.is_match(stem);
            if excluded {
                log::info!("Excluding {}", file.display());
            }
            !excluded
        });

        if self.files.is_empty() {
            return Err(anyhow!("No Markdown files left after applying exclusions"));
        }
        Ok(())
    }

    /// Pull a preface to the front of the book.
    pub fn prioritize_preface(&mut self) {
        file_ordering::prioritize_preface(&mut self.files);
    }
}

fn expand_path(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_dir() {
        markdown_files_in(path)
    } else if path.is_file() {
        if is_markdown(path) {
            Ok(vec![path.to_path_buf()])
        } else {
            log::warn!("Skipping {}: not a Markdown file", path.display());
            Ok(Vec::default())
        }
    } else {
        Err(anyhow!("Source path {} doesn't exist!", path.display()))
    }
}

/// Recursively list the Markdown files below `root`, in reading order.
///
/// Hidden files and anything excluded by ignore files are skipped.
fn markdown_files_in(root: &Path) -> Result<Vec<PathBuf>> {
    use ignore::WalkBuilder;

    let mut files: Vec<PathBuf> = Vec::default();
    for entry in WalkBuilder::new(root).build() {
        let entry = entry.with_context(|| format!("Failed to walk directory {}", root.display()))?;
        let is_file = entry.file_type().is_some_and(|t| t.is_file());
        if is_file && is_markdown(entry.path()) {
            files.push(entry.into_path());
        }
    }
    file_ordering::sort_paths(&mut files);
    Ok(files)
}
