use std::{path::Path, time::Duration};

use parking_lot::Mutex;
use rusqlite::{Connection, params_from_iter};

use super::{Store, StoreError};
use crate::dialect::Dialect;

const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLite file database. SQLite allows one writer at a time, so workers
/// share a single connection behind a lock.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)
            .map_err(|err| StoreError::connect(Dialect::Sqlite, err))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|err| StoreError::connect(Dialect::Sqlite, err))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|err| StoreError::connect(Dialect::Sqlite, err))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Runs `f` against the underlying connection, mainly for inspection.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> T) -> T {
        let conn = self.conn.lock();
        f(&conn)
    }
}

impl Store for SqliteStore {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn execute(&self, sql: &str, params: &[String]) -> Result<u64, StoreError> {
        let conn = self.conn.lock();
        conn.execute(sql, params_from_iter(params.iter()))
            .map(|affected| affected as u64)
            .map_err(|err| StoreError::execute(Dialect::Sqlite, err))
    }
}
