//! Chapter documents for EPUB.
//!
//! Each chapter becomes its own XHTML document so e-readers can paginate and
//! navigate them independently. Local images are embedded once per book and
//! the chapter markup is rewritten to point at the embedded copy.

use crate::markdown::Chapter;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// An image to embed in the EPUB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageResource {
    pub source: PathBuf,
    /// Path inside the EPUB, relative to the content documents
    pub href: String,
}

/// Tracks the images embedded so far so each file is only stored once.
#[derive(Debug, Default)]
pub struct ImageRegistry {
    by_source: HashMap<PathBuf, String>,
}

impl ImageRegistry {
    /// Resolve the chapter's local images, returning the chapter HTML with the
    /// references rewritten and any images not yet embedded.
    pub fn rewrite(&mut self, chapter: &Chapter) -> (String, Vec<ImageResource>) {
        let base = chapter
            .source_path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_default();

        let mut new_images = Vec::new();
        let html = chapter.body_html_with_images(|reference| {
            let source = match base.join(reference).canonicalize() {
                Ok(p) if p.is_file() => p,
                _ => {
                    log::warn!(
                        "Image {reference} referenced from {} not found, leaving it out",
                        chapter.source_path.display()
                    );
                    return None;
                }
            };

            if let Some(href) = self.by_source.get(&source) {
                return Some(href.clone());
            }
            let href = format!(
                "images/{}_{}",
                self.by_source.len() + 1,
                archive_name(&source)
            );
            self.by_source.insert(source.clone(), href.clone());
            new_images.push(ImageResource {
                source,
                href: href.clone(),
            });
            Some(href)
        });

        (html, new_images)
    }
}

/// File name of `path` reduced to characters that need no escaping in an href
fn archive_name(path: &Path) -> String {
    let name: String = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if name.is_empty() {
        "image".to_string()
    } else {
        name
    }
}

/// Wrap a chapter's HTML in a standalone XHTML document.
pub fn render(chapter: &Chapter, body: &str, language: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xml:lang="{lang}" lang="{lang}">
<head>
    <meta http-equiv="Content-Type" content="text/html; charset=UTF-8"/>
    <title>{title}</title>
    <link rel="stylesheet" type="text/css" href="stylesheet.css"/>
</head>
<body>
<section class="chapter">
{body}
</section>
</body>
</html>"#,
        lang = html_escape::encode_double_quoted_attribute(language),
        title = html_escape::encode_text(&chapter.title),
        body = body,
    )
}
