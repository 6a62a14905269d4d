//! Markdown to HTML conversion.
//!
//! Every source file becomes one [`Chapter`]. Parsing is done by
//! `pulldown-cmark` with tables, heading attribute lists (`{#id .class}`),
//! strikethrough, task lists and footnotes enabled. On top of the plain
//! conversion we:
//!
//! - give every heading a stable id, prefixed with the chapter anchor so that
//!   ids stay unique once all chapters share one HTML document
//! - mark the first level-1 heading as the chapter title
//! - render fenced code blocks with syntect highlight classes
//! - collect local image references so the EPUB can embed them

mod highlight;
pub use highlight::Highlighter;

use anyhow::{anyhow, Context, Result};
use indicatif::ProgressBar;
use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// A heading that appears in the table of contents below its chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub level: u8,
    pub id: String,
    pub text: String,
}

/// One source file, converted.
#[derive(Debug, Clone)]
pub struct Chapter {
    /// Text of the first level-1 heading, or the file stem
    pub title: String,
    /// Id of the chapter title heading, unique across the book
    pub anchor: String,
    pub source_path: PathBuf,
    /// The converted HTML fragment
    pub html: String,
    /// Whether `html` contains its own title heading
    pub has_title_heading: bool,
    /// Level 1 and 2 headings after the chapter title
    pub sections: Vec<Section>,
    /// Local image references, as written in the source
    pub images: Vec<String>,
    /// The rewritten event stream `html` was rendered from
    events: Vec<Event<'static>>,
}

impl Chapter {
    /// The chapter HTML, with a title heading generated if the source had none.
    pub fn body_html(&self) -> String {
        self.with_title_heading(self.html.clone())
    }

    /// Like [`Chapter::body_html`], but with every local image reference passed
    /// through `rewrite`. References it returns `None` for are left alone.
    pub fn body_html_with_images<F>(&self, mut rewrite: F) -> String
    where
        F: FnMut(&str) -> Option<String>,
    {
        let events = self.events.iter().cloned().map(|event| match event {
            Event::Start(Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            }) if self.images.iter().any(|i| i.as_str() == &*dest_url) => {
                let dest_url = match rewrite(&dest_url) {
                    Some(url) => CowStr::from(url),
                    None => dest_url,
                };
                Event::Start(Tag::Image {
                    link_type,
                    dest_url,
                    title,
                    id,
                })
            }
            event => event,
        });

        let mut html_out = String::with_capacity(self.html.len());
        html::push_html(&mut html_out, events);
        self.with_title_heading(html_out)
    }

    fn with_title_heading(&self, html: String) -> String {
        if self.has_title_heading {
            html
        } else {
            format!(
                "<h1 id=\"{}\" class=\"chapter-title\">{}</h1>\n{}",
                html_escape::encode_double_quoted_attribute(&self.anchor),
                html_escape::encode_text(&self.title),
                html
            )
        }
    }
}

/// Generate a URL-friendly slug, keeping non-latin letters intact.
pub fn slugify(text: &str) -> String {
    text.chars()
        .flat_map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().collect::<Vec<char>>()
            } else if c.is_whitespace() || c == '-' || c == '_' {
                vec!['-']
            } else {
                Vec::new()
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// The language named by a fence info string such as `rust,ignore` or `python {.numbered}`
fn fence_language(info: &str) -> &str {
    info.split(|c: char| c.is_whitespace() || c == ',' || c == '{')
        .next()
        .unwrap_or_default()
}

fn is_local_reference(url: &str) -> bool {
    !(url.is_empty()
        || url.starts_with('#')
        || url.starts_with("//")
        || url.starts_with("data:")
        || url.contains("://"))
}

/// A heading as found in the event stream
struct FoundHeading {
    index: usize,
    level: u8,
    explicit_id: Option<String>,
    text: String,
}

/// Converts Markdown files to chapters, keeping every heading id unique across
/// a whole book.
pub struct Converter<'h> {
    highlighter: &'h Highlighter,
    ids: HashSet<String>,
}

impl<'h> Converter<'h> {
    pub fn new(highlighter: &'h Highlighter) -> Converter<'h> {
        Converter {
            highlighter,
            ids: HashSet::default(),
        }
    }

    fn options() -> Options {
        Options::ENABLE_TABLES
            | Options::ENABLE_HEADING_ATTRIBUTES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_FOOTNOTES
    }

    /// Reserve `base` (or `base-N` if taken) as an id in the book.
    fn reserve_id(&mut self, base: String) -> String {
        let base = if base.is_empty() {
            "section".to_string()
        } else {
            base
        };
        if self.ids.insert(base.clone()) {
            return base;
        }
        let id = (1..)
            .map(|n| format!("{base}-{n}"))
            .find(|id| !self.ids.contains(id))
            .unwrap_or_default();
        self.ids.insert(id.clone());
        id
    }

    pub fn convert_file(&mut self, path: &Path) -> Result<Chapter> {
        let markdown = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(self.convert_str(&markdown, path))
    }

    /// Convert Markdown text that was read from `source_path`.
    pub fn convert_str(&mut self, markdown: &str, source_path: &Path) -> Chapter {
        let mut events: Vec<Event> = Parser::new_ext(markdown, Self::options()).collect();

        // find every heading along with its plain text
        let mut headings: Vec<FoundHeading> = Vec::default();
        let mut current: Option<FoundHeading> = None;
        for (index, event) in events.iter().enumerate() {
            match event {
                Event::Start(Tag::Heading { level, id, .. }) => {
                    current = Some(FoundHeading {
                        index,
                        level: heading_level(*level),
                        explicit_id: id.as_ref().map(|id| id.to_string()),
                        text: String::new(),
                    });
                }
                Event::Text(text) | Event::Code(text) => {
                    if let Some(heading) = current.as_mut() {
                        heading.text.push_str(text);
                    }
                }
                Event::End(TagEnd::Heading(_)) => {
                    if let Some(mut heading) = current.take() {
                        heading.text = heading.text.trim().to_string();
                        headings.push(heading);
                    }
                }
                _ => {}
            }
        }

        let title_heading = headings
            .iter()
            .position(|h| h.level == 1 && !h.text.is_empty());
        let title = match title_heading {
            Some(i) => headings[i].text.clone(),
            None => source_path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "Untitled".to_string()),
        };

        let anchor = match title_heading.and_then(|i| headings[i].explicit_id.clone()) {
            Some(id) => self.reserve_id(id),
            None => self.reserve_id(slugify(&title)),
        };

        // assign heading ids
        let mut sections: Vec<Section> = Vec::default();
        for (i, heading) in headings.iter().enumerate() {
            let is_title = Some(i) == title_heading;
            let id = match (&heading.explicit_id, is_title) {
                (_, true) => anchor.clone(),
                (Some(id), false) => self.reserve_id(id.clone()),
                (None, false) => {
                    let slug = match slugify(&heading.text) {
                        s if s.is_empty() => "section".to_string(),
                        s => s,
                    };
                    self.reserve_id(format!("{anchor}-{slug}"))
                }
            };
            if heading.explicit_id.as_ref().is_some_and(|explicit| *explicit != id) {
                log::warn!(
                    "Heading id `{}` in {} is already used, renamed to `{id}`",
                    heading.explicit_id.as_deref().unwrap_or_default(),
                    source_path.display()
                );
            }

            if let Event::Start(Tag::Heading {
                id: heading_id,
                classes,
                ..
            }) = &mut events[heading.index]
            {
                *heading_id = Some(CowStr::from(id.clone()));
                if is_title {
                    classes.push(CowStr::Borrowed("chapter-title"));
                }
            }

            if !is_title && heading.level <= 2 {
                sections.push(Section {
                    level: heading.level,
                    id,
                    text: heading.text.clone(),
                });
            }
        }

        // highlight code blocks and collect images
        let mut images: Vec<String> = Vec::default();
        let mut output: Vec<Event> = Vec::with_capacity(events.len());
        let mut code: Option<(String, String)> = None;
        for event in events {
            if code.is_some() {
                match event {
                    Event::End(TagEnd::CodeBlock) => {
                        if let Some((lang, buffer)) = code.take() {
                            let highlighted = self.highlighter.highlight(&buffer, &lang);
                            output.push(Event::Html(CowStr::from(highlighted)));
                        }
                    }
                    Event::Text(text) => {
                        if let Some((_, buffer)) = code.as_mut() {
                            buffer.push_str(&text);
                        }
                    }
                    _ => {}
                }
                continue;
            }

            match &event {
                Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                    let lang = fence_language(info);
                    if !lang.is_empty() {
                        code = Some((lang.to_string(), String::new()));
                        continue;
                    }
                }
                Event::Start(Tag::Image { dest_url, .. }) => {
                    let url = dest_url.to_string();
                    if is_local_reference(&url) && !images.contains(&url) {
                        images.push(url);
                    }
                }
                _ => {}
            }
            output.push(event);
        }

        let events: Vec<Event<'static>> = output.into_iter().map(Event::into_static).collect();
        let mut html_out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut html_out, events.iter().cloned());

        Chapter {
            title,
            anchor,
            source_path: source_path.to_path_buf(),
            html: html_out,
            has_title_heading: title_heading.is_some(),
            sections,
            images,
            events,
        }
    }
}

/// Convert every file in order.
///
/// Files that can't be read are reported and skipped so that a partial book
/// can still be produced; it is an error if no file could be converted.
pub fn convert_all(
    paths: &[PathBuf],
    highlighter: &Highlighter,
    progress: &ProgressBar,
) -> Result<Vec<Chapter>> {
    let mut converter = Converter::new(highlighter);
    let mut chapters: Vec<Chapter> = Vec::with_capacity(paths.len());

    for path in paths {
        progress.set_message(
            path.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
        );
        match converter.convert_file(path) {
            Ok(chapter) => {
                log::debug!("Converted {} as `{}`", path.display(), chapter.title);
                chapters.push(chapter);
            }
            Err(e) => {
                log::warn!("Skipping {}: {e:#}", path.display());
            }
        }
        progress.inc(1);
    }

    if chapters.is_empty() {
        return Err(anyhow!("None of the Markdown files could be converted"));
    }
    Ok(chapters)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::SyntaxTheme;

    fn highlighter() -> Highlighter {
        Highlighter::new(SyntaxTheme::default()).expect("can load theme")
    }

    #[test]
    fn slugify_works() {
        assert_eq!(slugify("Chapter One"), "chapter-one");
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  Multiple   Spaces  "), "multiple-spaces");
        assert_eq!(slugify("数据 系统"), "数据-系统");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn title_comes_from_first_h1() {
        let h = highlighter();
        let mut converter = Converter::new(&h);
        let chapter = converter.convert_str("intro text\n\n## Sub\n\n# Intro\ntext\n", Path::new("x.md"));
        assert_eq!(chapter.title, "Intro");
        assert_eq!(chapter.anchor, "intro");
        assert!(chapter.has_title_heading);
        assert!(chapter
            .html
            .contains(r#"<h1 id="intro" class="chapter-title">Intro</h1>"#));
    }

    #[test]
    fn title_falls_back_to_stem() {
        let h = highlighter();
        let mut converter = Converter::new(&h);
        let chapter = converter.convert_str("just text\n", Path::new("docs/getting_started.md"));
        assert_eq!(chapter.title, "getting_started");
        assert_eq!(chapter.anchor, "getting-started");
        assert!(!chapter.has_title_heading);
        assert!(chapter
            .body_html()
            .starts_with(r#"<h1 id="getting-started" class="chapter-title">getting_started</h1>"#));
    }

    #[test]
    fn anchors_are_unique_across_chapters() {
        let h = highlighter();
        let mut converter = Converter::new(&h);
        let a = converter.convert_str("# Intro\n", Path::new("a.md"));
        let b = converter.convert_str("# Intro\n", Path::new("b.md"));
        let c = converter.convert_str("# ???\n", Path::new("c.md"));
        assert_eq!(a.anchor, "intro");
        assert_eq!(b.anchor, "intro-1");
        assert_eq!(c.anchor, "section");
    }

    #[test]
    fn section_ids_and_anchors_share_one_namespace() {
        let h = highlighter();
        let mut converter = Converter::new(&h);
        let a = converter.convert_str("# Intro\n\n## 1\n", Path::new("a.md"));
        let b = converter.convert_str("# Intro\n", Path::new("b.md"));
        let c = converter.convert_str("# Other\n\n## Again {#intro}\n", Path::new("c.md"));

        assert_eq!(a.sections[0].id, "intro-1");
        assert_eq!(b.anchor, "intro-2");
        assert_eq!(c.sections[0].id, "intro-3");
        assert!(c.html.contains(r#"<h2 id="intro-3">Again</h2>"#));
    }

    #[test]
    fn image_references_are_rewritten_on_events() {
        let h = highlighter();
        let mut converter = Converter::new(&h);
        let md = "# Pics\n\n![f](图片/fig.png)\n\n![w](https://example.com/w.png)\n";
        let chapter = converter.convert_str(md, Path::new("a.md"));
        assert!(chapter.html.contains("%E5%9B%BE%E7%89%87/fig.png"));

        let mut seen = Vec::new();
        let html = chapter.body_html_with_images(|reference| {
            seen.push(reference.to_string());
            Some("images/1_fig.png".to_string())
        });
        assert_eq!(seen, vec!["图片/fig.png".to_string()]);
        assert!(html.contains(r#"<img src="images/1_fig.png" alt="f" />"#));
        assert!(html.contains(r#"src="https://example.com/w.png""#));
        assert!(!html.contains("%E5%9B%BE"));
    }

    #[test]
    fn headings_get_prefixed_ids_and_sections() {
        let h = highlighter();
        let mut converter = Converter::new(&h);
        let md = "# Guide\n\n## Setup\n\n### Deep\n\n## Setup\n\n## Custom {#custom-id}\n";
        let chapter = converter.convert_str(md, Path::new("guide.md"));

        assert!(chapter.html.contains(r#"<h2 id="guide-setup">Setup</h2>"#));
        assert!(chapter.html.contains(r#"<h3 id="guide-deep">Deep</h3>"#));
        assert!(chapter.html.contains(r#"<h2 id="guide-setup-1">Setup</h2>"#));
        assert!(chapter.html.contains(r#"<h2 id="custom-id">Custom</h2>"#));

        let ids: Vec<&str> = chapter.sections.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["guide-setup", "guide-setup-1", "custom-id"]);
    }

    #[test]
    fn attribute_lists_add_classes() {
        let h = highlighter();
        let mut converter = Converter::new(&h);
        let chapter = converter.convert_str("# Title\n\n## Note {.callout}\n", Path::new("a.md"));
        assert!(chapter.html.contains(r#"class="callout""#));
    }

    #[test]
    fn fenced_code_gets_language_class() {
        let h = highlighter();
        let mut converter = Converter::new(&h);
        let md = "# Code\n\n```rust\nlet x = 1;\n```\n\n```\nplain\n```\n";
        let chapter = converter.convert_str(md, Path::new("a.md"));
        assert!(chapter
            .html
            .contains(r#"<pre><code class="language-rust">"#));
        assert!(chapter.html.contains("syn-"));
        assert!(chapter.html.contains("<pre><code>plain\n</code></pre>"));
    }

    #[test]
    fn tables_keep_their_shape() {
        let h = highlighter();
        let mut converter = Converter::new(&h);
        let md = "| a | b | c |\n|---|---|---|\n| 1 | 2 | 3 |\n| 4 | 5 | 6 |\n";
        let chapter = converter.convert_str(md, Path::new("t.md"));
        assert_eq!(chapter.html.matches("<table>").count(), 1);
        assert_eq!(chapter.html.matches("<tr>").count(), 3);
        assert_eq!(chapter.html.matches("<th>").count(), 3);
        assert_eq!(chapter.html.matches("<td>").count(), 6);
    }

    #[test]
    fn collects_local_images_once() {
        let h = highlighter();
        let mut converter = Converter::new(&h);
        let md = "![a](img/a.png) ![b](https://example.com/b.png) ![a](img/a.png) ![c](data:image/png;base64,AA)\n";
        let chapter = converter.convert_str(md, Path::new("a.md"));
        assert_eq!(chapter.images, vec!["img/a.png".to_string()]);
    }

    #[test]
    fn unreadable_files_are_skipped() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        let good = dir.path().join("good.md");
        let bad = dir.path().join("bad.md");
        std::fs::write(&good, "# Good\n").expect("can write file");
        std::fs::write(&bad, [0xff, 0xfe, 0x00, 0x80]).expect("can write file");

        let h = highlighter();
        let chapters = convert_all(&[bad.clone(), good], &h, &ProgressBar::hidden())
            .expect("can convert the readable file");
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].title, "Good");

        assert!(convert_all(&[bad], &h, &ProgressBar::hidden()).is_err());
    }
}
