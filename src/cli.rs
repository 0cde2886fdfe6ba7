use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{ConnectionProfile, TlsMode};

#[derive(Debug, Parser)]
#[command(author, version, about = "Load a folder of CSV files into a database", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create one table per CSV file in a folder and load its rows
    Import(ImportArgs),
    /// Infer column types for a CSV file and print the CREATE TABLE statement
    Probe(ProbeArgs),
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Folder containing the files to import (not searched recursively)
    #[arg(short = 'd', long = "dir")]
    pub dir: PathBuf,
    /// YAML connection profile; flags below override its values
    #[arg(long)]
    pub profile: Option<PathBuf>,
    #[command(flatten)]
    pub connection: ConnectionArgs,
    /// Rows per INSERT statement
    #[arg(long, default_value_t = crate::loader::DEFAULT_BATCH_SIZE, value_parser = parse_positive)]
    pub batch_size: usize,
    /// Number of concurrent loader workers per file
    #[arg(short = 'w', long, default_value_t = crate::loader::DEFAULT_WORKERS, value_parser = parse_positive)]
    pub workers: usize,
    /// Number of data rows sampled to infer column types
    #[arg(long, default_value_t = crate::schema::DEFAULT_SAMPLE_ROWS)]
    pub sample_rows: usize,
    /// File extension selecting which files to import
    #[arg(long, default_value = crate::io_utils::DEFAULT_EXTENSION)]
    pub extension: String,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Pause in milliseconds a worker takes after each batch (0 disables)
    #[arg(long = "throttle-ms", default_value_t = 10)]
    pub throttle_ms: u64,
    /// Double embedded quotes in table and column names instead of only wrapping them
    #[arg(long = "strict-identifiers")]
    pub strict_identifiers: bool,
}

#[derive(Debug, Args, Default)]
pub struct ConnectionArgs {
    /// Database type: postgres, mysql or sqlite
    #[arg(long)]
    pub dialect: Option<String>,
    /// Database server host
    #[arg(long)]
    pub host: Option<String>,
    /// Database server port (defaults to 5432 for postgres, 3306 for mysql)
    #[arg(long)]
    pub port: Option<u16>,
    /// Database user
    #[arg(short = 'u', long)]
    pub user: Option<String>,
    /// Database password
    #[arg(long)]
    pub password: Option<String>,
    /// Database name (or file path for sqlite)
    #[arg(long)]
    pub database: Option<String>,
    /// SQLite database file
    #[arg(long)]
    pub path: Option<PathBuf>,
    /// TLS mode for server connections
    #[arg(long = "tls-mode", value_enum)]
    pub tls_mode: Option<TlsMode>,
}

impl ConnectionArgs {
    pub fn to_profile(&self) -> ConnectionProfile {
        ConnectionProfile {
            dialect: self.dialect.clone(),
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
            path: self.path.clone(),
            tls_mode: self.tls_mode,
        }
    }
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// Input CSV file to inspect
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Table name for the generated statement (defaults to the file name)
    #[arg(long)]
    pub table: Option<String>,
    /// Number of data rows sampled to infer column types
    #[arg(long, default_value_t = crate::schema::DEFAULT_SAMPLE_ROWS)]
    pub sample_rows: usize,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Double embedded quotes in table and column names instead of only wrapping them
    #[arg(long = "strict-identifiers")]
    pub strict_identifiers: bool,
}

fn parse_positive(value: &str) -> Result<usize, String> {
    match value.trim().parse::<usize>() {
        Ok(0) => Err("value must be at least 1".to_string()),
        Ok(parsed) => Ok(parsed),
        Err(err) => Err(err.to_string()),
    }
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "," | "comma" => Ok(b','),
        "tab" | "\\t" | "\t" => Ok(b'\t'),
        ";" | "semicolon" => Ok(b';'),
        "|" | "pipe" => Ok(b'|'),
        other if other.len() == 1 && other.is_ascii() => Ok(other.as_bytes()[0]),
        other => Err(format!(
            "Unsupported delimiter '{other}'. Use a single ASCII character or one of: comma, tab, semicolon, pipe"
        )),
    }
}
