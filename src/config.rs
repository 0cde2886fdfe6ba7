//! Connection profiles and their validation.
//!
//! A [`ConnectionProfile`] is the loosely-typed bag of settings a user can
//! provide through a YAML profile file and/or command-line flags. Calling
//! [`ConnectionProfile::resolve`] turns it into a [`DialectConfig`], the only
//! form the store layer accepts. Anything missing or malformed is reported as
//! a [`ConfigError`] before a connection is attempted.

use std::{
    fmt,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    str::FromStr,
};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dialect::Dialect;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported database type: {0} (expected one of: postgres, mysql, sqlite)")]
    UnsupportedDialect(String),
    #[error("no database type given; pass --dialect or set `dialect` in the profile")]
    MissingDialect,
    #[error("{dialect} connection requires `{field}`")]
    MissingField {
        dialect: Dialect,
        field: &'static str,
    },
    #[error("invalid value for `{field}`: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
    #[error("reading connection profile {path:?}")]
    Profile {
        path: PathBuf,
        #[source]
        source: ProfileSource,
    },
}

#[derive(Debug, Error)]
pub enum ProfileSource {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lowercase")]
pub enum TlsMode {
    #[default]
    Disable,
    Prefer,
    Require,
}

impl TlsMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TlsMode::Disable => "disable",
            TlsMode::Prefer => "prefer",
            TlsMode::Require => "require",
        }
    }
}

impl fmt::Display for TlsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings as supplied by the user; every field is optional until resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionProfile {
    pub dialect: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub path: Option<PathBuf>,
    pub tls_mode: Option<TlsMode>,
}

/// Host-based settings shared by the PostgreSQL and MySQL profiles.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub tls_mode: TlsMode,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("tls_mode", &self.tls_mode)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialectConfig {
    Postgres(ServerConfig),
    MySql(ServerConfig),
    Sqlite(SqliteConfig),
}

impl DialectConfig {
    pub fn dialect(&self) -> Dialect {
        match self {
            DialectConfig::Postgres(_) => Dialect::Postgres,
            DialectConfig::MySql(_) => Dialect::MySql,
            DialectConfig::Sqlite(_) => Dialect::Sqlite,
        }
    }

    /// Human readable target, never including credentials.
    pub fn describe(&self) -> String {
        match self {
            DialectConfig::Postgres(server) | DialectConfig::MySql(server) => format!(
                "{} {}@{}:{}/{}",
                self.dialect(),
                server.user,
                server.host,
                server.port,
                server.database
            ),
            DialectConfig::Sqlite(sqlite) => format!("SQLite {}", sqlite.path.display()),
        }
    }
}

impl ConnectionProfile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let wrap = |source: ProfileSource| ConfigError::Profile {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(|err| wrap(err.into()))?;
        serde_yaml::from_reader(BufReader::new(file)).map_err(|err| wrap(err.into()))
    }

    /// Fields set on `overrides` replace the ones on `self`.
    pub fn merged_with(self, overrides: ConnectionProfile) -> ConnectionProfile {
        ConnectionProfile {
            dialect: overrides.dialect.or(self.dialect),
            host: overrides.host.or(self.host),
            port: overrides.port.or(self.port),
            user: overrides.user.or(self.user),
            password: overrides.password.or(self.password),
            database: overrides.database.or(self.database),
            path: overrides.path.or(self.path),
            tls_mode: overrides.tls_mode.or(self.tls_mode),
        }
    }

    pub fn resolve(&self) -> Result<DialectConfig, ConfigError> {
        let dialect = match self.dialect.as_deref() {
            Some(name) => Dialect::from_str(name)?,
            None => return Err(ConfigError::MissingDialect),
        };
        match dialect {
            Dialect::Postgres => Ok(DialectConfig::Postgres(self.server_config(dialect)?)),
            Dialect::MySql => Ok(DialectConfig::MySql(self.server_config(dialect)?)),
            Dialect::Sqlite => {
                let path = self
                    .path
                    .clone()
                    .or_else(|| non_empty(self.database.as_deref()).map(PathBuf::from))
                    .filter(|path| !path.as_os_str().is_empty())
                    .ok_or(ConfigError::MissingField {
                        dialect,
                        field: "path",
                    })?;
                Ok(DialectConfig::Sqlite(SqliteConfig { path }))
            }
        }
    }

    fn server_config(&self, dialect: Dialect) -> Result<ServerConfig, ConfigError> {
        let required = |value: Option<&str>, field: &'static str| {
            non_empty(value)
                .map(str::to_string)
                .ok_or(ConfigError::MissingField { dialect, field })
        };
        let port = match self.port.or(dialect.default_port()) {
            Some(0) => {
                return Err(ConfigError::InvalidField {
                    field: "port",
                    message: "port must be between 1 and 65535".to_string(),
                });
            }
            Some(port) => port,
            None => {
                return Err(ConfigError::MissingField {
                    dialect,
                    field: "port",
                });
            }
        };
        Ok(ServerConfig {
            host: required(self.host.as_deref(), "host")?,
            port,
            user: required(self.user.as_deref(), "user")?,
            password: self.password.clone().unwrap_or_default(),
            database: required(self.database.as_deref(), "database")?,
            tls_mode: self.tls_mode.unwrap_or_default(),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
