use ::mysql::{
    Opts, OptsBuilder, Params, Pool, PoolConstraints, PoolOpts, SslOpts, Value, prelude::Queryable,
};
use log::debug;

use super::{Store, StoreError};
use crate::{
    config::{ServerConfig, TlsMode},
    dialect::Dialect,
};

/// Statements generated by this crate quote identifiers with `"`, which
/// MySQL only accepts under `ANSI_QUOTES`.
const SESSION_INIT: &str = "SET SESSION sql_mode = CONCAT_WS(',', @@SESSION.sql_mode, 'ANSI_QUOTES')";

pub struct MySqlStore {
    pool: Pool,
}

impl MySqlStore {
    pub fn connect(server: &ServerConfig, pool_size: usize) -> Result<Self, StoreError> {
        let pool = Pool::new(connection_opts(server, pool_size))
            .map_err(|err| StoreError::connect(Dialect::MySql, err))?;
        // Pool::new is lazy; check out one connection so bad credentials fail here.
        pool.get_conn()
            .map_err(|err| StoreError::connect(Dialect::MySql, err))?;
        debug!(
            "Opened MySQL pool (max {pool_size}) to {}:{}",
            server.host, server.port
        );
        Ok(Self { pool })
    }
}

fn connection_opts(server: &ServerConfig, pool_size: usize) -> Opts {
    let constraints = PoolConstraints::new(1, pool_size.max(1)).unwrap_or_default();
    let ssl_opts = match server.tls_mode {
        TlsMode::Disable | TlsMode::Prefer => None,
        TlsMode::Require => Some(SslOpts::default()),
    };
    OptsBuilder::new()
        .ip_or_hostname(Some(server.host.clone()))
        .tcp_port(server.port)
        .user(Some(server.user.clone()))
        .pass(Some(server.password.clone()))
        .db_name(Some(server.database.clone()))
        .ssl_opts(ssl_opts)
        .init(vec![SESSION_INIT])
        .pool_opts(PoolOpts::default().with_constraints(constraints))
        .into()
}

impl Store for MySqlStore {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn execute(&self, sql: &str, params: &[String]) -> Result<u64, StoreError> {
        let mut conn = self
            .pool
            .get_conn()
            .map_err(|err| StoreError::execute(Dialect::MySql, err))?;
        let values = params
            .iter()
            .map(|value| Value::Bytes(value.as_bytes().to_vec()))
            .collect::<Vec<_>>();
        let params = if values.is_empty() {
            Params::Empty
        } else {
            Params::Positional(values)
        };
        conn.exec_drop(sql, params)
            .map_err(|err| StoreError::execute(Dialect::MySql, err))?;
        Ok(conn.affected_rows())
    }
}
