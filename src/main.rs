use anyhow::{anyhow, Context, Result};
use byte_unit::{Byte, UnitType};
use cli::Cli;
use config::BookConfig;
use indicatif::{ProgressBar, ProgressStyle};
use markdown::Highlighter;
use sinks::{EPUB, HTML, PDF};
use sources::SourceSet;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use theme::Media;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;
mod config;
mod file_ordering;
mod markdown;
mod sinks;
mod sources;
mod theme;

fn main() -> ExitCode {
    use clap::Parser;
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match try_main(&cli) {
        Ok(outputs) => {
            println!();
            for output in outputs {
                println!(
                    "  {:<6}{} ({:.1})",
                    output.kind,
                    output.path.display(),
                    Byte::from_u64(output.bytes as u64).get_appropriate_unit(UnitType::Binary)
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {e:#}", console::style("Error").red());
            ExitCode::FAILURE
        }
    }
}

/// `warn` by default, `info` for this crate with `--verbose`; `RUST_LOG` wins.
/// Log records from the `log` macros are bridged into the subscriber.
fn init_logging(verbose: bool) {
    let default = if verbose { "warn,md_book=info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let filter = ["chromiumoxide::conn=off", "chromiumoxide::handler=off"]
        .into_iter()
        .filter_map(|directive| directive.parse().ok())
        .fold(filter, EnvFilter::add_directive);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .ok();
}

/// A file the run produced.
#[derive(Debug)]
struct Output {
    kind: &'static str,
    path: PathBuf,
    bytes: usize,
}

fn progress_bar(len: usize) -> ProgressBar {
    let progress = ProgressBar::new(len as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("can parse progress style")
            .progress_chars("#>-"),
    );
    progress
}

fn try_main(cli: &Cli) -> Result<Vec<Output>> {
    let mut config = BookConfig::load(cli.config.as_deref())?;
    if let Some(cover) = &cli.pdf_cover {
        let cover = cover
            .canonicalize()
            .with_context(|| format!("Failed to find PDF cover image {}", cover.display()))?;
        config.pdf_cover = Some(cover);
    }

    let mut sources = SourceSet::resolve(&cli.sources)?;
    sources.exclude(&config.exclude_pages)?;
    sources.prioritize_preface();

    let highlighter = Highlighter::new(config.code_theme)?;
    let progress = progress_bar(sources.files().len());
    progress.set_message("Converting Markdown...");
    let chapters = markdown::convert_all(sources.files(), &highlighter, &progress)?;
    progress.finish_and_clear();
    log::info!("Converted {} chapter(s)", chapters.len());

    let highlight_css = highlighter.stylesheet()?;
    let mut outputs: Vec<Output> = Vec::default();
    let mut failures: Vec<anyhow::Error> = Vec::default();

    if cli.format.pdf() || cli.format.html() {
        let css = theme::stylesheet(&config, &highlight_css, Media::Print);
        let document = theme::compose(&config, &chapters, &css)?;

        if cli.format.html() {
            let html = HTML::new(cli.outfile("html"));
            match html.render(&document) {
                Ok(bytes) => outputs.push(Output {
                    kind: "HTML",
                    path: html.outfile().to_path_buf(),
                    bytes,
                }),
                Err(e) => failures.push(e.context("Failed to render HTML")),
            }
        }

        if cli.format.pdf() {
            let pdf = PDF::new(&config, cli.outfile("pdf"));
            let progress = ProgressBar::new_spinner();
            progress.enable_steady_tick(Duration::from_millis(100));
            match pdf.render(&document, &progress) {
                Ok(stats) => outputs.push(Output {
                    kind: "PDF",
                    path: pdf.outfile().to_path_buf(),
                    bytes: stats.bytes,
                }),
                Err(e) => {
                    progress.abandon();
                    failures.push(e.context("Failed to render PDF"));
                }
            }
        }
    }

    if cli.format.epub() {
        let css = theme::stylesheet(&config, &highlight_css, Media::Ebook);
        let epub = EPUB::new(&config, cli.outfile("epub"));
        let progress = progress_bar(chapters.len());
        match epub.render(&chapters, &css, &progress) {
            Ok(stats) => {
                log::info!(
                    "EPUB has {} chapter(s) and {} image(s)",
                    stats.document_count,
                    stats.image_count
                );
                outputs.push(Output {
                    kind: "EPUB",
                    path: epub.outfile().to_path_buf(),
                    bytes: stats.bytes,
                });
            }
            Err(e) => {
                progress.abandon();
                failures.push(e.context("Failed to render EPUB"));
            }
        }
    }

    if outputs.is_empty() {
        return Err(failures
            .into_iter()
            .next()
            .unwrap_or_else(|| anyhow!("No output was produced")));
    }
    for failure in failures {
        log::error!("{failure:#}");
        eprintln!("{}: {failure:#}", console::style("Error").red());
    }

    Ok(outputs)
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::Parser;
    use std::io::Read;

    fn write_book(dir: &std::path::Path) {
        std::fs::write(dir.join("01-intro.md"), "# Intro\ntext").expect("can write");
        std::fs::write(dir.join("02-chapter-one.md"), "# Chapter One\nmore text").expect("can write");
    }

    #[test]
    fn epub_has_chapters_in_order() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        write_book(dir.path());
        let output = dir.path().join("out/book");
        std::fs::create_dir_all(dir.path().join("out")).expect("can create dir");

        let cli = Cli::try_parse_from([
            "md-book",
            dir.path().to_str().expect("utf-8 path"),
            "-o",
            output.to_str().expect("utf-8 path"),
            "-f",
            "epub",
        ])
        .expect("can parse args");
        let outputs = try_main(&cli).expect("can render book");
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].path, dir.path().join("out/book.epub"));
        assert!(outputs[0].bytes > 0);

        let file = std::fs::File::open(&outputs[0].path).expect("can open EPUB");
        let mut archive = zip::ZipArchive::new(file).expect("EPUB is a zip");
        let opf_name = archive
            .file_names()
            .find(|n| n.ends_with(".opf"))
            .map(ToString::to_string)
            .expect("EPUB has a package document");
        let mut opf = String::new();
        archive
            .by_name(&opf_name)
            .expect("can open package document")
            .read_to_string(&mut opf)
            .expect("can read package document");
        assert_eq!(opf.matches("<itemref").count(), 2);

        let mut titles = Vec::new();
        for name in ["chapter-0001.xhtml", "chapter-0002.xhtml"] {
            let entry = archive
                .file_names()
                .find(|n| n.ends_with(name))
                .map(ToString::to_string)
                .expect("chapter is in the EPUB");
            let mut chapter = String::new();
            archive
                .by_name(&entry)
                .expect("can open chapter")
                .read_to_string(&mut chapter)
                .expect("can read chapter");
            titles.push(chapter);
        }
        assert!(titles[0].contains("<title>Intro</title>"));
        assert!(titles[1].contains("<title>Chapter One</title>"));
    }

    #[test]
    fn html_contents_lists_chapters() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        write_book(dir.path());
        let output = dir.path().join("book");

        let cli = Cli::try_parse_from([
            "md-book",
            dir.path().to_str().expect("utf-8 path"),
            "-o",
            output.to_str().expect("utf-8 path"),
            "-f",
            "html",
        ])
        .expect("can parse args");
        let outputs = try_main(&cli).expect("can render book");
        assert_eq!(outputs[0].kind, "HTML");

        let html = std::fs::read_to_string(dir.path().join("book.html")).expect("can read HTML");
        let toc_start = html.find(r#"<nav class="toc">"#).expect("has contents");
        let toc = &html[toc_start..html[toc_start..].find("</nav>").expect("contents end") + toc_start];
        let intro = toc.find(r##"<a href="#intro">Intro</a>"##).expect("Intro listed");
        let one = toc
            .find(r##"<a href="#chapter-one">Chapter One</a>"##)
            .expect("Chapter One listed");
        assert!(intro < one);
        assert!(html.contains("break-before: page"));
    }

    fn unusable_browser_config(dir: &std::path::Path) -> std::path::PathBuf {
        let config = dir.join("book.yaml");
        std::fs::write(&config, "chrome_path: /nonexistent/chrome\n").expect("can write config");
        config
    }

    #[test]
    fn pdf_failure_still_produces_epub() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        let docs = dir.path().join("docs");
        std::fs::create_dir_all(&docs).expect("can create dir");
        write_book(&docs);
        let config = unusable_browser_config(dir.path());

        let cli = Cli::try_parse_from([
            "md-book",
            docs.to_str().expect("utf-8 path"),
            "-o",
            dir.path().join("book").to_str().expect("utf-8 path"),
            "-c",
            config.to_str().expect("utf-8 path"),
            "-f",
            "both",
        ])
        .expect("can parse args");
        let outputs = try_main(&cli).expect("EPUB is still produced");
        let kinds: Vec<&str> = outputs.iter().map(|o| o.kind).collect();
        assert_eq!(kinds, vec!["EPUB"]);
        assert!(dir.path().join("book.epub").is_file());
        assert!(!dir.path().join("book.pdf").exists());
    }

    #[test]
    fn pdf_failure_alone_is_an_error() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        let docs = dir.path().join("docs");
        std::fs::create_dir_all(&docs).expect("can create dir");
        write_book(&docs);
        let config = unusable_browser_config(dir.path());

        let cli = Cli::try_parse_from([
            "md-book",
            docs.to_str().expect("utf-8 path"),
            "-o",
            dir.path().join("book").to_str().expect("utf-8 path"),
            "-c",
            config.to_str().expect("utf-8 path"),
            "-f",
            "pdf",
        ])
        .expect("can parse args");
        assert!(try_main(&cli).is_err());
    }

    #[test]
    fn readme_is_left_out_by_default() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        write_book(dir.path());
        std::fs::write(dir.path().join("README.md"), "# Read Me\n").expect("can write");

        let cli = Cli::try_parse_from([
            "md-book",
            dir.path().to_str().expect("utf-8 path"),
            "-o",
            dir.path().join("book").to_str().expect("utf-8 path"),
            "-f",
            "html",
        ])
        .expect("can parse args");
        try_main(&cli).expect("can render book");
        let html = std::fs::read_to_string(dir.path().join("book.html")).expect("can read HTML");
        assert!(html.contains("Chapter One"));
        assert!(!html.contains("Read Me"));
    }

    #[test]
    fn no_markdown_is_an_error() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        let cli = Cli::try_parse_from([
            "md-book",
            dir.path().to_str().expect("utf-8 path"),
            "-f",
            "html",
        ])
        .expect("can parse args");
        assert!(try_main(&cli).is_err());
    }

    #[test]
    fn missing_config_is_an_error() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        write_book(dir.path());
        let cli = Cli::try_parse_from([
            "md-book",
            dir.path().to_str().expect("utf-8 path"),
            "-c",
            dir.path().join("missing.yaml").to_str().expect("utf-8 path"),
            "-f",
            "html",
        ])
        .expect("can parse args");
        assert!(try_main(&cli).is_err());
    }
}
