//! Book configuration.
//!
//! A single flat record of theming, layout and metadata options shared by every
//! output format. Configuration files are YAML by default (TOML when the file
//! has a `.toml` extension); every key is optional and falls back to the
//! defaults below. Keys we don't recognise are kept in [`BookConfig::extra`] so
//! they can be passed through as EPUB metadata.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Syntax highlighting themes bundled with syntect.
#[derive(Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Debug, Default)]
pub enum SyntaxTheme {
    #[default]
    #[serde(rename = "InspiredGitHub")]
    InspiredGitHub,
    #[serde(rename = "Solarized (light)")]
    SolarizedLight,
    #[serde(rename = "Solarized (dark)")]
    SolarizedDark,
    #[serde(rename = "base16-ocean.light")]
    OceanLight,
    #[serde(rename = "base16-ocean.dark")]
    OceanDark,
}

impl fmt::Display for SyntaxTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl SyntaxTheme {
    pub fn name(&self) -> &'static str {
        match self {
            SyntaxTheme::InspiredGitHub => "InspiredGitHub",
            SyntaxTheme::SolarizedLight => "Solarized (light)",
            SyntaxTheme::SolarizedDark => "Solarized (dark)",
            SyntaxTheme::OceanLight => "base16-ocean.light",
            SyntaxTheme::OceanDark => "base16-ocean.dark",
        }
    }

    pub fn all() -> &'static [SyntaxTheme] {
        &[
            SyntaxTheme::InspiredGitHub,
            SyntaxTheme::SolarizedLight,
            SyntaxTheme::SolarizedDark,
            SyntaxTheme::OceanLight,
            SyntaxTheme::OceanDark,
        ]
    }
}

const SERIF_STACK: &str = r#""Source Han Serif SC", "Noto Serif CJK SC", "STSong", "SimSun", "Times New Roman", "Georgia", "Palatino Linotype", "STIX Two Text", serif"#;
const SANS_STACK: &str = r#""Source Han Sans SC", "Noto Sans CJK SC", "PingFang SC", "Hiragino Sans GB", "Microsoft YaHei", "Segoe UI", "Helvetica Neue", "Roboto", "Arial", sans-serif"#;
const TABLE_STACK: &str = r#""Kaiti SC", "STKaiti", "KaiTi", "DFKai-SB", serif"#;
const CODE_STACK: &str =
    r#""Source Code Pro", "Fira Mono", "DejaVu Sans Mono", "Courier New", monospace"#;

/// Everything that can be tuned about the generated book.
///
/// Immutable once loaded; construct it with [`BookConfig::load`] or
/// [`Default::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookConfig {
    /// Book title, used for metadata and the title page
    pub title: String,
    /// Book author, used for metadata and the title page
    pub author: String,
    /// Language code (BCP 47 format, e.g., "en", "en-GB", "zh-CN")
    pub language: String,

    pub font_family: String,
    pub heading_font_family: String,
    pub chapter_title_font_family: String,
    pub code_font_family: String,
    pub table_font_family: String,
    /// Any CSS length, e.g. `12pt`
    pub base_font_size: String,
    pub line_height: f32,

    pub text_color: String,
    pub background_color: String,
    pub link_color: String,
    /// Colour for h4-h6
    pub heading_color: String,
    pub heading_color_h1: String,
    pub heading_color_h2: String,
    pub heading_color_h3: String,
    pub code_background_color: String,
    pub code_border_color: String,
    pub table_cell_padding: String,
    /// Theme used to derive the code highlighting classes
    pub code_theme: SyntaxTheme,

    /// Anything accepted by CSS `@page { size }`, e.g. `A4`, `Letter`, `148mm 210mm`
    pub page_size: String,
    pub margin_top: String,
    pub margin_bottom: String,
    pub margin_left: String,
    pub margin_right: String,

    /// Start every chapter on a new page
    pub chapter_page_break: bool,
    /// Emit a generated table of contents
    pub toc: bool,
    pub toc_title: String,
    /// Raw CSS appended after every generated rule
    pub extra_css: String,

    /// Additional EPUB metadata entries
    pub metadata: BTreeMap<String, String>,
    /// Cover image embedded in the EPUB
    pub epub_cover: Option<PathBuf>,
    /// Image printed as the first page of the PDF. Relative paths resolve against the
    /// directory of the first source file.
    pub pdf_cover: Option<PathBuf>,

    pub header_enabled: bool,
    /// Running header text, defaults to the book title
    pub header_title: Option<String>,
    pub header_font_size: String,
    pub footer_enabled: bool,
    /// Raw HTML printed in the running footer, before the page number
    pub footer_html: String,
    pub footer_font_size: String,

    /// Glob patterns matched (case-insensitively) against file stems; matching
    /// files are left out of the book
    pub exclude_pages: Vec<String>,

    /// Chrome / Chromium executable used to print the PDF; auto-detected if unset
    pub chrome_path: Option<PathBuf>,
    /// Launch the browser with `--no-sandbox` (needed when running as root in containers)
    pub chrome_no_sandbox: bool,

    /// Keys that aren't recognised above, passed through as EPUB metadata
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Default for BookConfig {
    fn default() -> Self {
        BookConfig {
            title: "Generated Book".to_string(),
            author: "md-book".to_string(),
            language: "en".to_string(),
            font_family: SERIF_STACK.to_string(),
            heading_font_family: SANS_STACK.to_string(),
            chapter_title_font_family: SANS_STACK.to_string(),
            code_font_family: CODE_STACK.to_string(),
            table_font_family: TABLE_STACK.to_string(),
            base_font_size: "12pt".to_string(),
            line_height: 1.6,
            text_color: "#111111".to_string(),
            background_color: "#ffffff".to_string(),
            link_color: "#1a73e8".to_string(),
            heading_color: "#77AAC2".to_string(),
            heading_color_h1: "#77AAC2".to_string(),
            heading_color_h2: "#77AAC2".to_string(),
            heading_color_h3: "#77AAC2".to_string(),
            code_background_color: "#f5f5f5".to_string(),
            code_border_color: "#e0e0e0".to_string(),
            table_cell_padding: "6px 12px".to_string(),
            code_theme: SyntaxTheme::default(),
            page_size: "A4".to_string(),
            margin_top: "30mm".to_string(),
            margin_bottom: "30mm".to_string(),
            margin_left: "25mm".to_string(),
            margin_right: "25mm".to_string(),
            chapter_page_break: true,
            toc: true,
            toc_title: "Contents".to_string(),
            extra_css: String::new(),
            metadata: BTreeMap::new(),
            epub_cover: None,
            pdf_cover: None,
            header_enabled: true,
            header_title: None,
            header_font_size: "10pt".to_string(),
            footer_enabled: true,
            footer_html: String::new(),
            footer_font_size: "10pt".to_string(),
            exclude_pages: vec![
                "readme".to_string(),
                "sidebar".to_string(),
                "_sidebar".to_string(),
            ],
            chrome_path: None,
            chrome_no_sandbox: false,
            extra: BTreeMap::new(),
        }
    }
}

impl BookConfig {
    /// Load the configuration from `path`, or the defaults if no path was given.
    ///
    /// An explicitly supplied path that doesn't exist is an error.
    pub fn load(path: Option<&Path>) -> Result<BookConfig> {
        let Some(path) = path else {
            log::info!("No configuration file given, using defaults");
            return Ok(BookConfig::default());
        };

        if !path.is_file() {
            return Err(anyhow!(
                "Configuration file {} doesn't exist!",
                path.display()
            ));
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;

        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));

        let config = if is_toml {
            BookConfig::from_toml(&contents)
        } else {
            BookConfig::from_yaml(&contents)
        }
        .with_context(|| format!("Failed to parse configuration file {}", path.display()))?;

        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse a YAML document; an empty document yields the defaults.
    pub fn from_yaml(contents: &str) -> Result<BookConfig> {
        if contents.trim().is_empty() {
            return Ok(BookConfig::default());
        }
        serde_yaml::from_str(contents).with_context(|| "Failed to parse YAML")
    }

    pub fn from_toml(contents: &str) -> Result<BookConfig> {
        toml::from_str(contents).with_context(|| "Failed to parse TOML")
    }

    /// The text printed in the running header of the PDF.
    pub fn header_text(&self) -> &str {
        self.header_title.as_deref().unwrap_or(&self.title)
    }

    /// Metadata entries for the EPUB: the `metadata` table first, then any scalar
    /// keys we didn't otherwise recognise.
    pub fn epub_metadata(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = self
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        for (key, value) in &self.extra {
            let value = match value {
                serde_yaml::Value::String(s) => s.clone(),
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Bool(b) => b.to_string(),
                _ => {
                    log::debug!("Ignoring non-scalar configuration key `{key}`");
                    continue;
                }
            };
            entries.push((key.clone(), value));
        }

        entries
    }
}
