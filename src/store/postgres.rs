use std::error::Error;

use ::postgres::{
    Client, NoTls,
    config::{Config, SslMode},
    types::{Format, IsNull, ToSql, Type, to_sql_checked},
};
use bytes::BytesMut;
use log::debug;

use super::{Store, StoreError, pool::LazyPool};
use crate::{
    config::{ServerConfig, TlsMode},
    dialect::Dialect,
};

/// PostgreSQL clients handed out from a [`LazyPool`]. One client is opened up
/// front to validate the settings; the rest only when loads run concurrently.
pub struct PostgresStore {
    config: Config,
    clients: LazyPool<Client>,
}

impl PostgresStore {
    pub fn connect(server: &ServerConfig, pool_size: usize) -> Result<Self, StoreError> {
        let config = client_config(server);
        let first = open_client(&config)?;
        let clients = LazyPool::new(pool_size, first);
        debug!(
            "Connected to PostgreSQL at {}:{} (up to {} client(s))",
            server.host,
            server.port,
            clients.size()
        );
        Ok(Self { config, clients })
    }
}

fn open_client(config: &Config) -> Result<Client, StoreError> {
    config
        .connect(NoTls)
        .map_err(|err| StoreError::connect(Dialect::Postgres, err))
}

fn client_config(server: &ServerConfig) -> Config {
    let mut config = Config::new();
    config
        .host(&server.host)
        .port(server.port)
        .user(&server.user)
        .password(&server.password)
        .dbname(&server.database)
        .ssl_mode(match server.tls_mode {
            TlsMode::Disable => SslMode::Disable,
            TlsMode::Prefer => SslMode::Prefer,
            TlsMode::Require => SslMode::Require,
        });
    config
}

impl Store for PostgresStore {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn execute(&self, sql: &str, params: &[String]) -> Result<u64, StoreError> {
        let values = params
            .iter()
            .map(|value| TextParam(value.as_str()))
            .collect::<Vec<_>>();
        let refs = values
            .iter()
            .map(|value| value as &(dyn ToSql + Sync))
            .collect::<Vec<_>>();
        self.clients.with(
            || {
                debug!("Opening another PostgreSQL client");
                open_client(&self.config)
            },
            |client| {
                client
                    .execute(sql, &refs)
                    .map_err(|err| StoreError::execute(Dialect::Postgres, err))
            },
        )
    }
}

/// Sends a value in text format and lets the server convert it to the
/// column's type, the same way a literal in the statement would be.
#[derive(Debug)]
struct TextParam<'a>(&'a str);

impl ToSql for TextParam<'_> {
    fn to_sql(&self, _ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        out.extend_from_slice(self.0.as_bytes());
        Ok(IsNull::No)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn encode_format(&self, _ty: &Type) -> Format {
        Format::Text
    }

    to_sql_checked!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(tls_mode: TlsMode) -> ServerConfig {
        ServerConfig {
            host: "db.internal".to_string(),
            port: 6543,
            user: "loader".to_string(),
            password: "secret".to_string(),
            database: "warehouse".to_string(),
            tls_mode,
        }
    }

    #[test]
    fn client_config_carries_server_settings() {
        let config = client_config(&server(TlsMode::Require));
        assert_eq!(config.get_user(), Some("loader"));
        assert_eq!(config.get_dbname(), Some("warehouse"));
        assert_eq!(config.get_ports(), &[6543]);
        assert_eq!(config.get_ssl_mode(), SslMode::Require);
    }

    #[test]
    fn text_params_are_encoded_verbatim() {
        let mut buf = BytesMut::new();
        let param = TextParam("2024-01-05");
        let is_null = param.to_sql(&Type::DATE, &mut buf).expect("encode");
        assert!(matches!(is_null, IsNull::No));
        assert_eq!(&buf[..], b"2024-01-05");
        assert!(matches!(param.encode_format(&Type::INT4), Format::Text));
        assert!(<TextParam<'_> as ToSql>::accepts(&Type::INT4));
    }
}
