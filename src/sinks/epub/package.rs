//! Metadata that `epub-builder` has no setter for.
//!
//! The packager only knows a fixed set of keys, so everything else is written
//! into the generated package document (`content.opf`) afterwards: Dublin Core
//! terms as `<dc:*>` elements, anything else as a `<meta name content>` entry.
//! The archive is rewritten with the `mimetype` entry first and uncompressed,
//! as the OCF container requires.

use anyhow::{Context, Result};
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Keys `EpubBuilder::metadata` accepts
pub const BUILDER_KEYS: &[&str] = &[
    "author",
    "title",
    "lang",
    "direction",
    "generator",
    "description",
    "subject",
    "license",
    "toc_name",
];

const DUBLIN_CORE: &[&str] = &[
    "contributor",
    "coverage",
    "creator",
    "date",
    "description",
    "format",
    "identifier",
    "language",
    "publisher",
    "relation",
    "rights",
    "source",
    "subject",
    "title",
    "type",
];

fn is_xml_name(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
}

/// Add `entries` to the `<metadata>` block of a package document.
pub fn insert_metadata(opf: &str, entries: &[(String, String)]) -> String {
    let mut added = String::new();
    for (key, value) in entries {
        if DUBLIN_CORE.contains(&key.as_str()) {
            added.push_str(&format!(
                "    <dc:{key}>{}</dc:{key}>\n",
                html_escape::encode_text(value)
            ));
        } else if is_xml_name(key) {
            added.push_str(&format!(
                "    <meta name=\"{key}\" content=\"{}\"/>\n",
                html_escape::encode_double_quoted_attribute(value)
            ));
        } else {
            log::warn!("Skipping EPUB metadata `{key}`: not a valid metadata name");
        }
    }

    let mut opf = opf.to_string();
    match opf.find("</metadata>") {
        Some(end) => opf.insert_str(end, &added),
        None => log::warn!("EPUB package document has no metadata block"),
    }
    opf
}

/// Rewrite a generated EPUB with `entries` added to its package document.
pub fn with_metadata(epub: Vec<u8>, entries: &[(String, String)]) -> Result<Vec<u8>> {
    if entries.is_empty() {
        return Ok(epub);
    }

    let mut archive =
        ZipArchive::new(Cursor::new(epub)).with_context(|| "Failed to read generated EPUB")?;
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .with_context(|| "Failed to read generated EPUB entry")?;
        let name = file.name().to_string();
        if file.is_dir() {
            zip.add_directory(name.as_str(), deflated)
                .with_context(|| format!("Failed to copy EPUB directory {name}"))?;
            continue;
        }

        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)
            .with_context(|| format!("Failed to read EPUB entry {name}"))?;
        if name.ends_with(".opf") {
            let opf = String::from_utf8(data)
                .with_context(|| format!("EPUB package document {name} isn't UTF-8"))?;
            data = insert_metadata(&opf, entries).into_bytes();
        }

        let options = if name == "mimetype" { stored } else { deflated };
        zip.start_file(name.as_str(), options)
            .with_context(|| format!("Failed to write EPUB entry {name}"))?;
        zip.write_all(&data)
            .with_context(|| format!("Failed to write EPUB entry {name}"))?;
    }

    let cursor = zip.finish().with_context(|| "Failed to finish EPUB")?;
    Ok(cursor.into_inner())
}
