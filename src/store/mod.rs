//! Target stores.
//!
//! The import pipeline only needs to run statement text with text
//! parameters, so a store is reduced to the [`Store`] trait. [`connect`] opens
//! the backend matching a validated [`DialectConfig`]. Every backend is safe
//! to share across loader workers; how concurrent statements are isolated is
//! up to the backend. PostgreSQL and MySQL use client pools that open
//! connections on demand up to the pool size, and SQLite uses a single
//! locked connection.

mod mysql;
mod pool;
mod postgres;
mod sqlite;

use thiserror::Error;

use crate::{config::DialectConfig, dialect::Dialect};

pub use self::{mysql::MySqlStore, postgres::PostgresStore, sqlite::SqliteStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{dialect} connection failed: {source}")]
    Connect {
        dialect: Dialect,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("{dialect} statement failed: {source}")]
    Execute {
        dialect: Dialect,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StoreError {
    pub fn connect<E>(dialect: Dialect, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        StoreError::Connect {
            dialect,
            source: source.into(),
        }
    }

    pub fn execute<E>(dialect: Dialect, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        StoreError::Execute {
            dialect,
            source: source.into(),
        }
    }
}

/// An opaque executor of SQL text with text parameters.
pub trait Store: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Runs one statement and returns the number of affected rows.
    fn execute(&self, sql: &str, params: &[String]) -> Result<u64, StoreError>;
}

/// Opens a store for `config` able to serve up to `pool_size` concurrent
/// statements.
pub fn connect(config: &DialectConfig, pool_size: usize) -> Result<Box<dyn Store>, StoreError> {
    let pool_size = pool_size.max(1);
    let store: Box<dyn Store> = match config {
        DialectConfig::Postgres(server) => Box::new(PostgresStore::connect(server, pool_size)?),
        DialectConfig::MySql(server) => Box::new(MySqlStore::connect(server, pool_size)?),
        DialectConfig::Sqlite(sqlite) => Box::new(SqliteStore::open(&sqlite.path)?),
    };
    Ok(store)
}
