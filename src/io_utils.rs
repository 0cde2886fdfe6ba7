//! I/O utilities for CSV reading, encoding, delimiter resolution and input
//! discovery.
//!
//! All file access in csv-ingest flows through this module:
//!
//! - **Discovery**: [`discover_inputs`] lists one directory (non-recursive)
//!   and keeps regular files whose name ends in the requested extension.
//! - **Delimiter resolution**: extension-based auto-detection (`.tsv` → tab,
//!   everything else → comma) with manual override support.
//! - **Encoding**: input decoding via `encoding_rs`, defaulting to UTF-8.
//! - **Reader construction**: flexible readers so ragged rows survive the
//!   read and are judged later, at insert time.

use std::{
    fs::{self, File},
    io::{BufReader, Read},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';
pub const DEFAULT_EXTENSION: &str = "csv";

/// A file selected for import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub path: PathBuf,
    pub file_name: String,
    /// File name with the `.{extension}` suffix removed.
    pub stem: String,
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

/// Lists `dir` and returns the regular files whose name ends with
/// `.{extension}`, ordered by file name.
pub fn discover_inputs(dir: &Path, extension: &str) -> std::io::Result<Vec<InputFile>> {
    let suffix = format!(".{}", extension.trim_start_matches('.'));
    let mut inputs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            continue;
        }
        let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        let Some(stem) = file_name.strip_suffix(&suffix) else {
            continue;
        };
        inputs.push(InputFile {
            path: entry.path(),
            stem: stem.to_string(),
            file_name,
        });
    }
    inputs.sort_by(|left, right| left.file_name.cmp(&right.file_name));
    Ok(inputs)
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8, has_headers: bool) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(has_headers)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(
    path: &Path,
    delimiter: u8,
    has_headers: bool,
) -> Result<csv::Reader<BufReader<File>>> {
    let reader =
        BufReader::new(File::open(path).with_context(|| format!("Opening input file {path:?}"))?);
    Ok(open_csv_reader(reader, delimiter, has_headers))
}

/// Decodes one field. Byte-order marks are not sniffed per field; the csv
/// reader already drops a UTF-8 BOM in front of the header.
pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

/// Reads and decodes the header record. An input without a header line is
/// an error rather than an empty header list.
pub fn reader_headers<R>(
    reader: &mut csv::Reader<R>,
    encoding: &'static Encoding,
) -> Result<Vec<String>>
where
    R: Read,
{
    let headers = reader.byte_headers()?.clone();
    if headers.is_empty() {
        return Err(anyhow!("missing header row"));
    }
    decode_record(&headers, encoding)
}
