//! Directory import driver.
//!
//! Files are handled one at a time, each running to completion (including
//! all of its loader workers) before the next one starts:
//!
//! `discover → read header + sample → infer types → create table →
//! read all rows → load batches → report`
//!
//! A failure in any per-file stage is logged, recorded in that file's
//! [`FileReport`] and the driver moves on. Only an unreadable directory stops
//! the run.

use std::{fmt, path::Path};

use anyhow::{Context, Result};
use encoding_rs::{Encoding, UTF_8};
use log::{info, warn};
use thiserror::Error;

use crate::{
    io_utils::{self, DEFAULT_EXTENSION, InputFile},
    loader::{self, LoadOptions},
    progress::Reporter,
    schema::{self, DEFAULT_SAMPLE_ROWS, TableSpec},
    sql,
    store::Store,
};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Error reading folder {path:?}: {source}")]
    ReadDirectory {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub extension: String,
    pub sample_rows: usize,
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
    pub load: LoadOptions,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            extension: DEFAULT_EXTENSION.to_string(),
            sample_rows: DEFAULT_SAMPLE_ROWS,
            delimiter: None,
            encoding: UTF_8,
            load: LoadOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ReadHeaderAndSample,
    CreateTable,
    ReadAllRows,
    LoadBatches,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::ReadHeaderAndSample => "reading header",
            Stage::CreateTable => "creating table",
            Stage::ReadAllRows => "reading rows",
            Stage::LoadBatches => "loading rows",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Imported,
    Failed { stage: Stage, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub file_name: String,
    pub table: String,
    pub rows_read: usize,
    pub rows_loaded: usize,
    pub outcome: FileOutcome,
}

impl FileReport {
    pub fn is_imported(&self) -> bool {
        matches!(self.outcome, FileOutcome::Imported)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub files: Vec<FileReport>,
}

impl ImportSummary {
    pub fn imported(&self) -> usize {
        self.files.iter().filter(|file| file.is_imported()).count()
    }

    pub fn failed(&self) -> usize {
        self.files.len() - self.imported()
    }

    pub fn rows_loaded(&self) -> usize {
        self.files.iter().map(|file| file.rows_loaded).sum()
    }
}

/// Rows of a file plus whether the read stopped early on an error.
#[derive(Debug, Default)]
pub struct DataRows {
    pub rows: Vec<Vec<String>>,
    pub truncated_by: Option<String>,
}

/// Re-reads every data row of `path`. Ragged rows are kept as-is. A read or
/// decode error stops the read and whatever was read before it is returned.
pub fn read_data_rows(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<DataRows> {
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter, true)?;
    reader
        .byte_headers()
        .with_context(|| format!("Reading header row of {path:?}"))?;

    let mut data = DataRows::default();
    let mut record = csv::ByteRecord::new();
    loop {
        match reader.read_byte_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => {
                data.truncated_by = Some(format!("row {}: {err}", data.rows.len() + 1));
                break;
            }
        }
        match io_utils::decode_record(&record, encoding) {
            Ok(row) => data.rows.push(row),
            Err(err) => {
                data.truncated_by = Some(format!("row {}: {err}", data.rows.len() + 1));
                break;
            }
        }
    }
    Ok(data)
}

/// Imports every matching file in `dir` into `store`.
pub fn import_directory(
    dir: &Path,
    store: &dyn Store,
    options: &ImportOptions,
    reporter: &dyn Reporter,
) -> Result<ImportSummary, PipelineError> {
    let inputs =
        io_utils::discover_inputs(dir, &options.extension).map_err(|source| {
            PipelineError::ReadDirectory {
                path: dir.to_path_buf(),
                source,
            }
        })?;
    info!(
        "Found {} .{} file(s) in {:?}",
        inputs.len(),
        options.extension.trim_start_matches('.'),
        dir
    );

    let mut summary = ImportSummary::default();
    for input in &inputs {
        reporter.log_line(&format!("Processing file: {}", input.file_name));
        let report = import_file(input, store, options, reporter);
        match &report.outcome {
            FileOutcome::Imported => reporter.log_line(&format!(
                "Imported {} row(s) into table: {}",
                report.rows_loaded, report.table
            )),
            FileOutcome::Failed { stage, message } => {
                warn!("{} failed while {stage}", input.file_name);
                reporter.log_line(&format!(
                    "Error {stage} for {}: {message}",
                    input.file_name
                ));
            }
        }
        summary.files.push(report);
    }
    Ok(summary)
}

/// Runs the per-file pipeline for one input.
pub fn import_file(
    input: &InputFile,
    store: &dyn Store,
    options: &ImportOptions,
    reporter: &dyn Reporter,
) -> FileReport {
    let mut report = FileReport {
        file_name: input.file_name.clone(),
        table: input.stem.clone(),
        rows_read: 0,
        rows_loaded: 0,
        outcome: FileOutcome::Imported,
    };
    let fail = |report: &mut FileReport, stage: Stage, message: String| {
        report.outcome = FileOutcome::Failed { stage, message };
    };

    let delimiter = io_utils::resolve_input_delimiter(&input.path, options.delimiter);
    let sample =
        match schema::read_sample(&input.path, options.sample_rows, delimiter, options.encoding) {
            Ok(sample) => sample,
            Err(err) => {
                fail(&mut report, Stage::ReadHeaderAndSample, format!("{err:#}"));
                return report;
            }
        };

    let types = schema::infer_types(&sample.headers, &sample.rows);
    let table = TableSpec::new(input.stem.clone(), &sample.headers, &types);
    let ddl = sql::create_table_sql(&table, options.load.identifiers);
    if let Err(err) = store.execute(&ddl, &[]) {
        fail(&mut report, Stage::CreateTable, err.to_string());
        return report;
    }
    info!(
        "Table '{}' ready with {} column(s)",
        table.name,
        table.column_count()
    );

    let data = match read_data_rows(&input.path, delimiter, options.encoding) {
        Ok(data) => data,
        Err(err) => {
            fail(&mut report, Stage::ReadAllRows, format!("{err:#}"));
            return report;
        }
    };
    if let Some(reason) = &data.truncated_by {
        reporter.log_line(&format!(
            "Error reading {} at {reason}; loading the {} row(s) read before it",
            input.file_name,
            data.rows.len()
        ));
    }
    report.rows_read = data.rows.len();

    match loader::load_batches(store, &table, &data.rows, &options.load, reporter) {
        Ok(load) => report.rows_loaded = load.rows_loaded,
        Err(err) => {
            report.rows_loaded = err.rows_loaded();
            fail(&mut report, Stage::LoadBatches, err.to_string());
        }
    }
    report
}
