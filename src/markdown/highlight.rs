//! Class-based syntax highlighting for fenced code blocks.
//!
//! Code is annotated with syntect scope classes (e.g. `syn-keyword`) rather
//! than inline colours, so the same markup can be themed by the PDF and EPUB
//! stylesheets alike. [`Highlighter::stylesheet`] derives the matching CSS
//! from the configured theme.

use crate::config::SyntaxTheme;
use anyhow::{anyhow, Context, Result};
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::{css_for_theme_with_class_style, ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

/// CSS class prefix for syntax highlighting spans.
const SCOPE_PREFIX: &str = "syn-";
const CLASS_STYLE: ClassStyle = ClassStyle::SpacedPrefixed {
    prefix: SCOPE_PREFIX,
};

pub struct Highlighter {
    syntaxes: SyntaxSet,
    theme: Theme,
}

impl Highlighter {
    pub fn new(theme: SyntaxTheme) -> Result<Highlighter> {
        let syntaxes = SyntaxSet::load_defaults_newlines();
        let mut themes = ThemeSet::load_defaults();
        let theme = themes
            .themes
            .remove(theme.name())
            .ok_or_else(|| {
                let known: Vec<&str> = SyntaxTheme::all().iter().map(SyntaxTheme::name).collect();
                anyhow!(
                    "Syntax theme `{theme}` isn't available (expected one of: {})",
                    known.join(", ")
                )
            })?;
        Ok(Highlighter { syntaxes, theme })
    }

    /// Render a fenced code block as `<pre><code class="language-…">`.
    ///
    /// Languages syntect doesn't know still get the language class, with the
    /// code escaped but otherwise unannotated.
    pub fn highlight(&self, code: &str, lang: &str) -> String {
        let body = match self.syntaxes.find_syntax_by_token(lang) {
            Some(syntax) => match self.classed_html(code, syntax) {
                Ok(html) => html,
                Err(e) => {
                    log::warn!("Failed to highlight `{lang}` code block: {e:#}");
                    html_escape::encode_text(code).to_string()
                }
            },
            None => {
                log::debug!("No syntax found for `{lang}`");
                html_escape::encode_text(code).to_string()
            }
        };

        format!(
            r#"<pre><code class="language-{lang}">{body}</code></pre>
"#,
            lang = html_escape::encode_double_quoted_attribute(lang),
        )
    }

    fn classed_html(&self, code: &str, syntax: &SyntaxReference) -> Result<String> {
        let mut generator =
            ClassedHTMLGenerator::new_with_class_style(syntax, &self.syntaxes, CLASS_STYLE);
        for line in LinesWithEndings::from(code) {
            generator
                .parse_html_for_line_which_includes_newline(line)
                .with_context(|| "Failed to parse line")?;
        }
        Ok(generator.finalize())
    }

    /// CSS rules for the highlight classes, derived from the theme.
    pub fn stylesheet(&self) -> Result<String> {
        css_for_theme_with_class_style(&self.theme, CLASS_STYLE)
            .with_context(|| "Failed to generate syntax highlighting CSS")
    }
}
