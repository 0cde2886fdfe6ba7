pub mod cli;
pub mod config;
pub mod dialect;
pub mod io_utils;
pub mod loader;
pub mod pipeline;
pub mod progress;
pub mod schema;
pub mod sql;
pub mod store;

use std::{env, sync::OnceLock, time::Duration};

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands},
    config::ConnectionProfile,
    loader::LoadOptions,
    pipeline::ImportOptions,
    progress::LogReporter,
    schema::TableSpec,
    sql::IdentifierPolicy,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_ingest", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Import(args) => handle_import(&args),
        Commands::Probe(args) => handle_probe(&args),
    }
}

fn identifier_policy(strict: bool) -> IdentifierPolicy {
    if strict {
        IdentifierPolicy::Strict
    } else {
        IdentifierPolicy::Wrap
    }
}

fn handle_import(args: &cli::ImportArgs) -> Result<()> {
    let base = match &args.profile {
        Some(path) => ConnectionProfile::load(path)?,
        None => ConnectionProfile::default(),
    };
    let config = base.merged_with(args.connection.to_profile()).resolve()?;
    let options = ImportOptions {
        extension: args.extension.clone(),
        sample_rows: args.sample_rows,
        delimiter: args.delimiter,
        encoding: io_utils::resolve_encoding(args.input_encoding.as_deref())?,
        load: LoadOptions {
            batch_size: args.batch_size,
            workers: args.workers,
            throttle: Duration::from_millis(args.throttle_ms),
            identifiers: identifier_policy(args.strict_identifiers),
            cancel: None,
        },
    };
    debug!("Import options: {options:?}");

    info!("Connecting to {}", config.describe());
    let store = store::connect(&config, args.workers)
        .with_context(|| format!("DB connection failed ({})", config.dialect()))?;
    info!("Database connection established successfully!");

    let summary = pipeline::import_directory(&args.dir, store.as_ref(), &options, &LogReporter)?;
    info!(
        "Imported {} of {} file(s) from {:?}; {} row(s) loaded",
        summary.imported(),
        summary.files.len(),
        args.dir,
        summary.rows_loaded()
    );
    if summary.failed() > 0 {
        bail!(
            "{} of {} file(s) failed to import",
            summary.failed(),
            summary.files.len()
        );
    }
    Ok(())
}

fn handle_probe(args: &cli::ProbeArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    info!(
        "Probing '{}' with delimiter '{}'",
        args.input.display(),
        printable_delimiter(delimiter)
    );
    let sample = schema::read_sample(&args.input, args.sample_rows, delimiter, encoding)
        .with_context(|| format!("Inferring column types from {:?}", args.input))?;
    let table_name = match &args.table {
        Some(name) => name.clone(),
        None => args
            .input
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Cannot derive a table name from {:?}", args.input))?,
    };
    let types = schema::infer_types(&sample.headers, &sample.rows);
    let table = TableSpec::new(table_name, &sample.headers, &types);
    for column in &table.columns {
        debug!("{} -> {}", column.name, column.column_type);
    }
    println!(
        "{}",
        sql::create_table_sql(&table, identifier_policy(args.strict_identifiers))
    );
    info!(
        "Inferred {} column(s) from {} sampled row(s)",
        table.column_count(),
        sample.rows.len()
    );
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
