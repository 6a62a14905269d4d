use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Pdf,
    Epub,
    /// PDF and EPUB
    Both,
    /// The standalone HTML document the PDF is printed from
    Html,
    /// PDF, EPUB and HTML
    All,
}

impl Format {
    pub fn pdf(self) -> bool {
        matches!(self, Format::Pdf | Format::Both | Format::All)
    }

    pub fn epub(self) -> bool {
        matches!(self, Format::Epub | Format::Both | Format::All)
    }

    pub fn html(self) -> bool {
        matches!(self, Format::Html | Format::All)
    }
}

/// Turn a collection of Markdown documents into a themed PDF and/or EPUB book
#[derive(Parser, Debug)]
#[clap(author, version, about)]
pub struct Cli {
    /// Markdown files, directories, or a git repository URL (https://, http://, git@)
    #[clap(required = true)]
    pub sources: Vec<String>,

    /// Output path; the extension is replaced for each format
    #[clap(short, long, default_value = "book")]
    pub output: PathBuf,

    /// YAML (or .toml) theme and metadata configuration
    #[clap(short, long, env = "MD_BOOK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Which outputs to produce
    #[clap(short, long, value_enum, default_value_t = Format::Pdf)]
    pub format: Format,

    /// Image printed as the first page of the PDF, overriding `pdf_cover`
    #[clap(long)]
    pub pdf_cover: Option<PathBuf>,

    /// Log progress details
    #[clap(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Output path for a format, e.g. `book.pdf`
    pub fn outfile(&self, extension: &str) -> PathBuf {
        self.output.with_extension(extension)
    }
}
