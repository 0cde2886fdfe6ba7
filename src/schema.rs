//! Column model and sampled type inference.
//!
//! This module owns [`ColumnType`] (the four storage types a column can be
//! created with), [`ColumnSpec`]/[`TableSpec`] (the per-file table shape) and
//! the inference engine that derives a type per column from a small sample
//! of data rows.
//!
//! ## Inference rules
//!
//! Every sampled value is classified as an integer, float, ISO date
//! (`YYYY-MM-DD`) or text. A column's candidate only ever widens:
//! integer and float meet at float, any other disagreement lands on text,
//! and text is final for the rest of the sample. Empty values count as text.
//! Columns that receive no values at all are text.

use std::{fmt, path::Path};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use encoding_rs::Encoding;
use log::debug;

use crate::io_utils;

pub const DEFAULT_SAMPLE_ROWS: usize = 10;
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Integer,
    Float,
    Date,
    Text,
}

impl ColumnType {
    /// Storage type used in generated DDL.
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Float => "REAL",
            ColumnType::Date => "DATE",
            ColumnType::Text => "TEXT",
        }
    }

    /// Least specific type consistent with both `self` and `other`.
    pub fn widen(self, other: ColumnType) -> ColumnType {
        match (self, other) {
            (left, right) if left == right => left,
            (ColumnType::Integer, ColumnType::Float) | (ColumnType::Float, ColumnType::Integer) => {
                ColumnType::Float
            }
            _ => ColumnType::Text,
        }
    }

    /// Classifies a single raw value.
    pub fn classify(value: &str) -> ColumnType {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            ColumnType::Text
        } else if trimmed.parse::<i64>().is_ok() {
            ColumnType::Integer
        } else if trimmed.parse::<f64>().is_ok() {
            ColumnType::Float
        } else if NaiveDate::parse_from_str(trimmed, DATE_FORMAT).is_ok() {
            ColumnType::Date
        } else {
            ColumnType::Text
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ColumnType::Integer => "Integer",
            ColumnType::Float => "Float",
            ColumnType::Date => "Date",
            ColumnType::Text => "Text",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
}

impl TableSpec {
    pub fn new(name: impl Into<String>, headers: &[String], types: &[ColumnType]) -> Self {
        let columns = headers
            .iter()
            .zip(types.iter())
            .map(|(name, column_type)| ColumnSpec {
                name: name.clone(),
                column_type: *column_type,
            })
            .collect();
        Self {
            name: name.into(),
            columns,
        }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }
}

/// Header line plus the first data rows of a file.
#[derive(Debug, Clone, Default)]
pub struct Sample {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Copy)]
struct TypeCandidate {
    current: Option<ColumnType>,
}

impl TypeCandidate {
    fn new() -> Self {
        Self { current: None }
    }

    fn is_settled(&self) -> bool {
        self.current == Some(ColumnType::Text)
    }

    fn update(&mut self, value: &str) {
        if self.is_settled() {
            return;
        }
        let observed = ColumnType::classify(value);
        self.current = Some(match self.current {
            Some(existing) => existing.widen(observed),
            None => observed,
        });
    }

    fn decide(&self) -> ColumnType {
        self.current.unwrap_or(ColumnType::Text)
    }
}

/// Infers one type per header from `samples`.
///
/// Always returns `headers.len()` types. Fields beyond the header count are
/// ignored; missing trailing fields simply contribute nothing.
pub fn infer_types(headers: &[String], samples: &[Vec<String>]) -> Vec<ColumnType> {
    let mut candidates = vec![TypeCandidate::new(); headers.len()];
    for row in samples {
        for (candidate, value) in candidates.iter_mut().zip(row.iter()) {
            candidate.update(value);
        }
    }
    candidates.iter().map(TypeCandidate::decide).collect()
}

/// Reads the header record and up to `sample_rows` data rows.
///
/// A missing or undecodable header is an error. A read error while sampling
/// just ends the sample early.
pub fn read_sample(
    path: &Path,
    sample_rows: usize,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<Sample> {
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter, true)?;
    let headers = io_utils::reader_headers(&mut reader, encoding)
        .with_context(|| format!("Reading header row of {path:?}"))?;

    let mut rows = Vec::with_capacity(sample_rows);
    let mut record = csv::ByteRecord::new();
    while rows.len() < sample_rows {
        match reader.read_byte_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => {
                debug!("Sampling {path:?} stopped early: {err}");
                break;
            }
        }
        match io_utils::decode_record(&record, encoding) {
            Ok(row) => rows.push(row),
            Err(err) => {
                debug!("Sampling {path:?} stopped early: {err}");
                break;
            }
        }
    }
    Ok(Sample { headers, rows })
}
