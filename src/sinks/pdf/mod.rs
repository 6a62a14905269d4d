//! PDF generation.
//!
//! The composed book is written to a temporary HTML file and printed by a
//! headless Chrome / Chromium driven over the DevTools protocol. Page size and
//! margins come from the stylesheet's `@page` rules.

mod templates;

use crate::config::BookConfig;
use crate::theme::Document;
use anyhow::{anyhow, Context, Result};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::{Browser, BrowserConfig};
use futures_util::StreamExt;
use indicatif::ProgressBar;
use std::io::Write;
use std::path::{Path, PathBuf};
use templates::{footer_template, has_header_or_footer, header_template};

/// Statistics from rendering a PDF, used for user feedback.
pub struct RenderStats {
    /// Size of the written PDF in bytes
    pub bytes: usize,
}

/// PDF output.
#[allow(clippy::upper_case_acronyms)]
pub struct PDF<'c> {
    config: &'c BookConfig,
    outfile: PathBuf,
}

impl<'c> PDF<'c> {
    pub fn new<P: Into<PathBuf>>(config: &'c BookConfig, outfile: P) -> PDF<'c> {
        PDF {
            config,
            outfile: outfile.into(),
        }
    }

    pub fn outfile(&self) -> &Path {
        &self.outfile
    }

    /// Print the composed document to the output file.
    ///
    /// Blocks until the browser has finished; the async browser session runs on
    /// a runtime created for this call only.
    pub fn render(&self, document: &Document, progress: &ProgressBar) -> Result<RenderStats> {
        progress.set_message("Printing PDF...");

        let mut page_file = tempfile::Builder::new()
            .prefix("md-book-")
            .suffix(".html")
            .tempfile()
            .with_context(|| "Failed to create temporary HTML file")?;
        page_file
            .write_all(document.html.as_bytes())
            .with_context(|| "Failed to write temporary HTML file")?;
        page_file
            .flush()
            .with_context(|| "Failed to write temporary HTML file")?;
        let page_url = url::Url::from_file_path(page_file.path())
            .map_err(|_| anyhow!("Can't express {} as a file URL", page_file.path().display()))?;
        log::debug!(
            "Printing {page_url} with assets relative to {}",
            document.base_dir.display()
        );

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .with_context(|| "Failed to start async runtime")?;
        let pdf = runtime.block_on(self.print(page_url.as_str()))?;

        std::fs::write(&self.outfile, &pdf)
            .with_context(|| format!("Failed to write PDF to {}", self.outfile.display()))?;

        progress.finish_with_message("PDF generated");
        Ok(RenderStats { bytes: pdf.len() })
    }

    fn browser_config(&self) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder().arg("--allow-file-access-from-files");
        if let Some(chrome) = &self.config.chrome_path {
            builder = builder.chrome_executable(chrome);
        }
        if self.config.chrome_no_sandbox {
            builder = builder.no_sandbox();
        }
        builder
            .build()
            .map_err(|e| anyhow!("Failed to create browser config: {}", e))
    }

    fn print_params(&self) -> PrintToPdfParams {
        let header_footer = has_header_or_footer(self.config);
        PrintToPdfParams {
            print_background: Some(true),
            prefer_css_page_size: Some(true),
            display_header_footer: Some(header_footer),
            header_template: header_footer.then(|| header_template(self.config)),
            footer_template: header_footer.then(|| footer_template(self.config)),
            ..Default::default()
        }
    }

    async fn print(&self, page_url: &str) -> Result<Vec<u8>> {
        let (mut browser, mut handler) = Browser::launch(self.browser_config()?)
            .await
            .map_err(|e| anyhow!("Failed to launch browser: {}", e))?;

        let handle = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if let Err(err) = h {
                    log::debug!("Browser handler error: {}", err);
                }
            }
        });

        let result = self.print_page(&browser, page_url).await;

        browser.close().await.ok();
        handle.abort();

        result
    }

    async fn print_page(&self, browser: &Browser, page_url: &str) -> Result<Vec<u8>> {
        let page = browser
            .new_page(page_url)
            .await
            .map_err(|e| anyhow!("Failed to open {}: {}", page_url, e))?;

        page.wait_for_navigation()
            .await
            .map_err(|e| anyhow!("Failed to wait for navigation: {}", e))?;

        page.pdf(self.print_params())
            .await
            .map_err(|e| anyhow!("Failed to generate PDF: {}", e))
    }
}
