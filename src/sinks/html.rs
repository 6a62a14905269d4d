//! Standalone HTML output: the same document the PDF is printed from.

use crate::theme::Document;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// HTML output.
#[allow(clippy::upper_case_acronyms)]
pub struct HTML {
    outfile: PathBuf,
}

impl HTML {
    pub fn new<P: Into<PathBuf>>(outfile: P) -> HTML {
        HTML {
            outfile: outfile.into(),
        }
    }

    pub fn outfile(&self) -> &Path {
        &self.outfile
    }

    /// Write the document, returning the number of bytes written.
    pub fn render(&self, document: &Document) -> Result<usize> {
        std::fs::write(&self.outfile, &document.html)
            .with_context(|| format!("Failed to write HTML to {}", self.outfile.display()))?;
        Ok(document.html.len())
    }
}
