//! Running header and footer templates for Chrome's print-to-PDF.
//!
//! Chrome renders these in their own isolated documents: the book stylesheet
//! doesn't apply and the default font size is tiny, so all styling is inline.
//! Elements with the classes `title`, `pageNumber` and `totalPages` are filled
//! in by the browser on every page.

use crate::config::BookConfig;

/// An empty template, which stops Chrome from printing its default date/URL
const EMPTY: &str = "<span></span>";

pub fn header_template(config: &BookConfig) -> String {
    if !config.header_enabled {
        return EMPTY.to_string();
    }
    format!(
        r#"<div style="font-size: {size}; width: 100%; margin: 0 10mm; text-align: center; color: #777777;">{text}</div>"#,
        size = html_escape::encode_double_quoted_attribute(&config.header_font_size),
        text = html_escape::encode_text(config.header_text()),
    )
}

pub fn footer_template(config: &BookConfig) -> String {
    if !config.footer_enabled {
        return EMPTY.to_string();
    }
    let extra = if config.footer_html.trim().is_empty() {
        String::new()
    } else {
        format!(r#"<span style="float: left;">{}</span>"#, config.footer_html)
    };
    format!(
        r#"<div style="font-size: {size}; width: 100%; margin: 0 10mm; text-align: right; color: #777777;">{extra}<span class="pageNumber"></span> / <span class="totalPages"></span></div>"#,
        size = html_escape::encode_double_quoted_attribute(&config.footer_font_size),
    )
}

/// Whether Chrome should print a header or footer at all.
pub fn has_header_or_footer(config: &BookConfig) -> bool {
    config.header_enabled || config.footer_enabled
}
