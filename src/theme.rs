//! Stylesheet generation and HTML document composition.
//!
//! The same theme fields drive every output format. Print output additionally
//! gets `@page` geometry, chapter page breaks and a page break after the table
//! of contents; ebook output leaves those to the reader. In both cases the
//! user's `extra_css` comes last so it can override any generated rule.

use crate::config::BookConfig;
use crate::markdown::Chapter;
use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

/// Which kind of output a stylesheet is generated for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Media {
    Print,
    Ebook,
}

/// Generate the complete stylesheet for `media`.
pub fn stylesheet(config: &BookConfig, highlight_css: &str, media: Media) -> String {
    let mut css = String::with_capacity(8192);

    if media == Media::Print {
        css.push_str(&print_rules(config));
    }

    css.push_str(&base_styles(config));

    css.push_str("\n/* Syntax highlighting */\n");
    css.push_str(highlight_css);

    if !config.extra_css.is_empty() {
        css.push_str("\n/* Extra CSS */\n");
        css.push_str(&config.extra_css);
        css.push('\n');
    }

    css
}

/// Page geometry and page breaks, for print only.
fn print_rules(config: &BookConfig) -> String {
    let mut css = format!(
        r#"/* Page geometry */
@page {{
    size: {page_size};
    margin: {top} {right} {bottom} {left};
}}

.pdf-cover {{
    break-after: page;
    page-break-after: always;
    text-align: center;
}}

.book-meta {{
    break-after: page;
    page-break-after: always;
}}

.toc {{
    break-after: page;
    page-break-after: always;
}}
"#,
        page_size = config.page_size,
        top = config.margin_top,
        right = config.margin_right,
        bottom = config.margin_bottom,
        left = config.margin_left,
    );

    if config.chapter_page_break {
        css.push_str(
            r#"
.chapter {
    break-before: page;
    page-break-before: always;
}
"#,
        );
    }

    css
}

fn base_styles(config: &BookConfig) -> String {
    format!(
        r#"/* Base styles */
body {{
    font-family: {font_family};
    font-size: {base_font_size};
    line-height: {line_height};
    color: {text_color};
    background: {background_color};
}}

h1, h2, h3, h4, h5, h6 {{
    font-family: {heading_font_family};
}}

h1 {{
    color: {heading_color_h1};
    margin-top: 1.4em;
}}

h2 {{
    color: {heading_color_h2};
    margin-top: 1.4em;
}}

h3 {{
    color: {heading_color_h3};
    margin-top: 1.2em;
}}

h4, h5, h6 {{
    color: {heading_color};
    margin-top: 1.1em;
}}

h1.chapter-title {{
    font-family: {chapter_title_font_family};
    text-align: center;
}}

a {{
    color: {link_color};
    text-decoration: none;
}}

/* Code blocks */
pre, code {{
    font-family: {code_font_family};
}}

pre {{
    background: {code_background_color};
    border: 1px dashed {code_border_color};
    padding: 12px;
    border-radius: 4px;
    font-size: 0.9em;
    white-space: pre-wrap;
    word-break: break-word;
}}

blockquote {{
    border-left: 4px solid {link_color};
    padding-left: 12px;
    margin-left: 0;
    color: #555;
}}

hr {{
    border: none;
    border-top: 1px dashed {code_border_color};
    margin: 24px 0;
}}

/* Tables */
table {{
    border-collapse: collapse;
    width: 100%;
}}

table, th, td {{
    border: 1px solid {code_border_color};
}}

th, td {{
    padding: {table_cell_padding};
    font-family: {table_font_family};
}}

img {{
    display: block;
    margin-left: auto;
    margin-right: auto;
    max-width: 100%;
}}

/* Title page */
.book-title {{
    text-align: center;
    margin-top: 60px;
    font-size: 2.4em;
}}

.book-author {{
    text-align: center;
    color: #666;
    margin-bottom: 40px;
}}

.pdf-cover img {{
    max-width: 100%;
    height: auto;
}}

/* Table of contents */
.toc-title {{
    font-size: 1.6em;
    font-weight: bold;
    margin-bottom: 10px;
}}

.toc ol {{
    list-style: none;
    padding-left: 0;
}}

.toc ol ol {{
    padding-left: 20px;
}}

.toc li {{
    margin: 6px 0;
}}
"#,
        font_family = config.font_family,
        base_font_size = config.base_font_size,
        line_height = config.line_height,
        text_color = config.text_color,
        background_color = config.background_color,
        heading_font_family = config.heading_font_family,
        heading_color = config.heading_color,
        heading_color_h1 = config.heading_color_h1,
        heading_color_h2 = config.heading_color_h2,
        heading_color_h3 = config.heading_color_h3,
        chapter_title_font_family = config.chapter_title_font_family,
        link_color = config.link_color,
        code_font_family = config.code_font_family,
        code_background_color = config.code_background_color,
        code_border_color = config.code_border_color,
        table_cell_padding = config.table_cell_padding,
        table_font_family = config.table_font_family,
    )
}

/// A complete HTML book, ready to be printed or saved.
#[derive(Debug, Clone)]
pub struct Document {
    pub html: String,
    /// Directory relative asset references resolve against
    pub base_dir: PathBuf,
}

/// `file://` URL of a directory, with the trailing slash `<base>` needs.
pub fn directory_url(dir: &Path) -> Result<url::Url> {
    url::Url::from_directory_path(dir)
        .map_err(|_| anyhow!("Can't express {} as a file URL", dir.display()))
}

/// Compose the whole book into a single HTML document.
///
/// The document is deterministic for a given configuration, stylesheet and
/// list of chapters. Relative references (images, the PDF cover) resolve
/// against the directory of the first chapter.
pub fn compose(config: &BookConfig, chapters: &[Chapter], css: &str) -> Result<Document> {
    let first = chapters
        .first()
        .ok_or_else(|| anyhow!("No Markdown content found to render"))?;
    let base_dir = first
        .source_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let base_url = directory_url(&base_dir)?;

    let mut body: Vec<String> = Vec::with_capacity(chapters.len() + 3);

    if let Some(cover) = &config.pdf_cover {
        let src = if cover.is_absolute() {
            url::Url::from_file_path(cover)
                .map_err(|_| anyhow!("Can't express {} as a file URL", cover.display()))?
                .to_string()
        } else {
            cover.to_string_lossy().to_string()
        };
        body.push(format!(
            r#"<div class="pdf-cover"><img src="{}" alt="Book cover"/></div>"#,
            html_escape::encode_double_quoted_attribute(&src)
        ));
    }

    body.push(format!(
        r#"<div class="book-meta"><h1 class="book-title">{}</h1><div class="book-author">{}</div></div>"#,
        html_escape::encode_text(&config.title),
        html_escape::encode_text(&config.author),
    ));

    if config.toc {
        body.push(table_of_contents(config, chapters));
    }

    for chapter in chapters {
        body.push(format!(
            "<section class=\"chapter\">\n{}</section>",
            chapter.body_html()
        ));
    }

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="{lang}">
<head>
<meta charset="utf-8"/>
<title>{title}</title>
<base href="{base}"/>
<style>
{css}
</style>
</head>
<body>
{body}
</body>
</html>
"#,
        lang = html_escape::encode_double_quoted_attribute(&config.language),
        title = html_escape::encode_text(&config.title),
        base = html_escape::encode_double_quoted_attribute(base_url.as_str()),
        css = css,
        body = body.join("\n"),
    );

    Ok(Document { html, base_dir })
}

/// One entry per chapter, with its level 1 and 2 sections nested below it.
fn table_of_contents(config: &BookConfig, chapters: &[Chapter]) -> String {
    let mut html = String::new();
    html.push_str(r#"<nav class="toc">"#);
    html.push_str(&format!(
        r#"<div class="toc-title">{}</div>"#,
        html_escape::encode_text(&config.toc_title)
    ));
    html.push_str("<ol>");

    for chapter in chapters {
        html.push_str(&format!(
            r##"<li><a href="#{}">{}</a>"##,
            html_escape::encode_double_quoted_attribute(&chapter.anchor),
            html_escape::encode_text(&chapter.title)
        ));
        if !chapter.sections.is_empty() {
            html.push_str("<ol>");
            for section in &chapter.sections {
                html.push_str(&format!(
                    r##"<li class="toc-level-{}"><a href="#{}">{}</a></li>"##,
                    section.level,
                    html_escape::encode_double_quoted_attribute(&section.id),
                    html_escape::encode_text(&section.text)
                ));
            }
            html.push_str("</ol>");
        }
        html.push_str("</li>");
    }

    html.push_str("</ol></nav>");
    html
}
