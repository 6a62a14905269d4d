//! EPUB generation.
//!
//! Uses the `epub-builder` crate, which handles the EPUB packaging
//! requirements (OPF manifest, NCX navigation, ZIP structure with the proper
//! MIME type). Every chapter becomes one XHTML content document and one spine
//! entry, in book order, sharing a single stylesheet generated from the same
//! theme as the PDF.

mod chapter;
mod package;

use crate::config::BookConfig;
use crate::markdown::Chapter;
use anyhow::{anyhow, Context, Result};
use chapter::ImageRegistry;
use epub_builder::{EpubBuilder, EpubContent, ReferenceType, ZipLibrary};
use indicatif::ProgressBar;
use std::fmt::Display;
use std::path::{Path, PathBuf};

/// `epub-builder` reports errors as `eyre` reports, which `anyhow` can't wrap
/// directly; this carries the message chain across.
trait WrapEpubErr<T> {
    fn epub_context<C, F>(self, context: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T> WrapEpubErr<T> for eyre::Result<T> {
    fn epub_context<C, F>(self, context: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| anyhow!("{e:#}").context(context()))
    }
}

/// Statistics from rendering an EPUB, used for user feedback.
pub struct RenderStats {
    /// Number of chapters in the EPUB
    pub document_count: usize,
    pub image_count: usize,
    /// Size of the written EPUB in bytes
    pub bytes: usize,
}

/// EPUB output.
#[allow(clippy::upper_case_acronyms)]
pub struct EPUB<'c> {
    config: &'c BookConfig,
    outfile: PathBuf,
}

/// Metadata keys `epub-builder` knows under a different name
fn metadata_key(key: &str) -> &str {
    match key {
        "creator" => "author",
        "language" => "lang",
        "rights" => "license",
        key => key,
    }
}

impl<'c> EPUB<'c> {
    pub fn new<P: Into<PathBuf>>(config: &'c BookConfig, outfile: P) -> EPUB<'c> {
        EPUB {
            config,
            outfile: outfile.into(),
        }
    }

    pub fn outfile(&self) -> &Path {
        &self.outfile
    }

    /// Render the chapters to an EPUB file.
    pub fn render(
        &self,
        chapters: &[Chapter],
        stylesheet: &str,
        progress: &ProgressBar,
    ) -> Result<RenderStats> {
        if chapters.is_empty() {
            return Err(anyhow!("No chapters to put in the EPUB"));
        }
        progress.set_message("Generating EPUB...");

        let zip = ZipLibrary::new().epub_context(|| "Failed to create ZIP library for EPUB")?;
        let mut builder = EpubBuilder::new(zip).epub_context(|| "Failed to build builder")?;

        builder
            .metadata("title", self.config.title.as_str())
            .epub_context(|| "Failed to set title metadata")?;
        builder
            .metadata("author", self.config.author.as_str())
            .epub_context(|| "Failed to set author metadata")?;
        builder
            .metadata("lang", self.config.language.as_str())
            .epub_context(|| "Failed to set language metadata")?;
        builder
            .metadata("generator", "md-book")
            .epub_context(|| "Failed to set generator metadata")?;

        let mut package_metadata: Vec<(String, String)> = Vec::default();
        for (key, value) in self.config.epub_metadata() {
            let key = metadata_key(&key).to_string();
            if package::BUILDER_KEYS.contains(&key.as_str()) {
                if let Err(e) = builder.metadata(&key, value.as_str()) {
                    log::warn!("Skipping EPUB metadata `{key}`: {e}");
                }
            } else {
                package_metadata.push((key, value));
            }
        }

        builder
            .stylesheet(stylesheet.as_bytes())
            .epub_context(|| "Failed to add stylesheet")?;

        if let Some(cover_path) = &self.config.epub_cover {
            let image_data = std::fs::read(cover_path)
                .with_context(|| format!("Failed to read cover image: {}", cover_path.display()))?;
            let filename = cover_path
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "cover-image".to_string());
            builder
                .add_cover_image(&filename, image_data.as_slice(), mime_from_path(cover_path))
                .epub_context(|| {
                    format!(
                        "Failed to add cover image to EPUB: {}",
                        cover_path.display()
                    )
                })?;
        }

        let mut images = ImageRegistry::default();
        let mut image_count = 0;
        for (i, chapter) in chapters.iter().enumerate() {
            progress.inc(1);
            let (body, new_images) = images.rewrite(chapter);

            for image in new_images {
                let data = std::fs::read(&image.source).with_context(|| {
                    format!("Failed to read image {}", image.source.display())
                })?;
                builder
                    .add_resource(&image.href, data.as_slice(), mime_from_path(&image.source))
                    .epub_context(|| {
                        format!("Failed to add image to EPUB: {}", image.source.display())
                    })?;
                image_count += 1;
            }

            let filename = format!("chapter-{:04}.xhtml", i + 1);
            let xhtml = chapter::render(chapter, &body, &self.config.language);
            let mut content = EpubContent::new(&filename, xhtml.as_bytes()).title(&chapter.title);
            if i == 0 {
                content = content.reftype(ReferenceType::Text);
            }
            builder.add_content(content).epub_context(|| {
                format!(
                    "Failed to add chapter to EPUB: {}",
                    chapter.source_path.display()
                )
            })?;
        }

        let mut epub: Vec<u8> = Vec::default();
        builder
            .generate(&mut epub)
            .epub_context(|| "Failed to generate EPUB file")?;
        let epub = package::with_metadata(epub, &package_metadata)
            .with_context(|| "Failed to add metadata to EPUB")?;
        std::fs::write(&self.outfile, &epub)
            .with_context(|| format!("Failed to write EPUB file: {}", self.outfile.display()))?;

        progress.finish_with_message("EPUB generated");

        Ok(RenderStats {
            document_count: chapters.len(),
            image_count,
            bytes: epub.len(),
        })
    }
}

/// Determine MIME type from file extension.
fn mime_from_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::SyntaxTheme;
    use crate::markdown::{Converter, Highlighter};
    use crate::theme::{self, Media};
    use std::fs::File;
    use std::io::Read;

    fn read_entry(archive: &mut zip::ZipArchive<File>, suffix: &str) -> String {
        let name = archive
            .file_names()
            .find(|n| n.ends_with(suffix))
            .map(ToString::to_string)
            .unwrap_or_else(|| panic!("EPUB has an entry ending in {suffix}"));
        let mut contents = String::new();
        archive
            .by_name(&name)
            .expect("can open entry")
            .read_to_string(&mut contents)
            .expect("can read entry");
        contents
    }

    fn chapters(dir: &Path, sources: &[(&str, &str)]) -> Vec<Chapter> {
        let highlighter = Highlighter::new(SyntaxTheme::default()).expect("can load theme");
        let mut converter = Converter::new(&highlighter);
        sources
            .iter()
            .map(|(name, md)| converter.convert_str(md, &dir.join(name)))
            .collect()
    }

    #[test]
    fn mime_types() {
        assert_eq!(mime_from_path(Path::new("a.PNG")), "image/png");
        assert_eq!(mime_from_path(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(mime_from_path(Path::new("a")), "application/octet-stream");
    }

    #[test]
    fn one_spine_entry_per_chapter_in_order() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        let chapters = chapters(
            dir.path(),
            &[
                ("intro.md", "# Intro\ntext"),
                ("one.md", "# Chapter One\nmore text"),
                ("notes.md", "no heading here"),
            ],
        );
        let config = BookConfig::default();
        let css = theme::stylesheet(&config, "", Media::Ebook);
        let outfile = dir.path().join("book.epub");

        let stats = EPUB::new(&config, &outfile)
            .render(&chapters, &css, &ProgressBar::hidden())
            .expect("can render EPUB");
        assert_eq!(stats.document_count, 3);

        let file = File::open(&outfile).expect("can open EPUB");
        let mut archive = zip::ZipArchive::new(file).expect("EPUB is a zip");

        let opf = read_entry(&mut archive, ".opf");
        assert_eq!(opf.matches("<itemref").count(), 3);
        assert!(opf.contains("Generated Book"));

        let first = read_entry(&mut archive, "chapter-0001.xhtml");
        let second = read_entry(&mut archive, "chapter-0002.xhtml");
        let third = read_entry(&mut archive, "chapter-0003.xhtml");
        assert!(first.contains("<title>Intro</title>"));
        assert!(second.contains("<title>Chapter One</title>"));
        assert!(third.contains("<title>notes</title>"));

        let first_ref = opf.find("chapter-0001.xhtml").expect("first chapter in manifest");
        let second_ref = opf.find("chapter-0002.xhtml").expect("second chapter in manifest");
        assert!(first_ref < second_ref);
    }

    #[test]
    fn arbitrary_metadata_reaches_the_package() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        let chapters = chapters(dir.path(), &[("a.md", "# A\n")]);
        let config = BookConfig::from_yaml(
            "metadata:\n  publisher: ACME-PUB\n  date: 2024-01-01\n  description: A test book\nrights_holder: XYZ-HOLDER\n",
        )
        .expect("can parse config");
        let outfile = dir.path().join("book.epub");
        EPUB::new(&config, &outfile)
            .render(&chapters, "", &ProgressBar::hidden())
            .expect("can render EPUB");

        let file = File::open(&outfile).expect("can open EPUB");
        let mut archive = zip::ZipArchive::new(file).expect("EPUB is a zip");
        assert_eq!(archive.file_names().next(), Some("mimetype"));
        let opf = read_entry(&mut archive, ".opf");
        assert!(opf.contains("<dc:publisher>ACME-PUB</dc:publisher>"));
        assert!(opf.contains("<dc:date>2024-01-01</dc:date>"));
        assert!(opf.contains(r#"<meta name="rights_holder" content="XYZ-HOLDER"/>"#));
        assert!(opf.contains("A test book"));
        assert_eq!(opf.matches("A test book").count(), 1);
        let chapter = read_entry(&mut archive, "chapter-0001.xhtml");
        assert!(chapter.contains("<title>A</title>"));
    }

    #[test]
    fn missing_cover_is_an_error() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        let chapters = chapters(dir.path(), &[("a.md", "# A\n")]);
        let config = BookConfig {
            epub_cover: Some(dir.path().join("missing.png")),
            ..BookConfig::default()
        };
        let result = EPUB::new(&config, dir.path().join("book.epub")).render(
            &chapters,
            "",
            &ProgressBar::hidden(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn embeds_cover_and_images() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        std::fs::write(dir.path().join("cover.png"), b"not really a png").expect("can write");
        std::fs::write(dir.path().join("fig.png"), b"not really a png").expect("can write");
        let chapters = chapters(dir.path(), &[("a.md", "# A\n\n![fig](fig.png)\n")]);
        let config = BookConfig {
            epub_cover: Some(dir.path().join("cover.png")),
            ..BookConfig::default()
        };
        let outfile = dir.path().join("book.epub");
        let stats = EPUB::new(&config, &outfile)
            .render(&chapters, "", &ProgressBar::hidden())
            .expect("can render EPUB");
        assert_eq!(stats.image_count, 1);

        let file = File::open(&outfile).expect("can open EPUB");
        let mut archive = zip::ZipArchive::new(file).expect("EPUB is a zip");
        assert!(archive.file_names().any(|n| n.ends_with("images/1_fig.png")));
        assert!(archive.file_names().any(|n| n.ends_with("cover.png")));
        let chapter = read_entry(&mut archive, "chapter-0001.xhtml");
        assert!(chapter.contains(r#"src="images/1_fig.png""#));
    }
}
