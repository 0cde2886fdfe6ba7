//! Target store dialects.
//!
//! Every dialect-dependent decision (placeholder syntax, bind-parameter
//! limits, display names) hangs off [`Dialect`] so the rest of the crate never
//! compares dialect names as strings.

use std::{fmt, str::FromStr};

use crate::config::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Postgres,
    MySql,
    Sqlite,
}

/// How bind parameters are spelled inside statement text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `$1, $2, ...` numbered across the whole statement.
    Numbered,
    /// `?` for every parameter.
    Positional,
}

impl Dialect {
    pub fn display_name(&self) -> &'static str {
        match self {
            Dialect::Postgres => "PostgreSQL",
            Dialect::MySql => "MySQL",
            Dialect::Sqlite => "SQLite",
        }
    }

    pub fn placeholder_style(&self) -> PlaceholderStyle {
        match self {
            Dialect::Postgres => PlaceholderStyle::Numbered,
            Dialect::MySql | Dialect::Sqlite => PlaceholderStyle::Positional,
        }
    }

    /// Renders the placeholder for the parameter at 1-based `position`.
    pub fn placeholder(&self, position: usize) -> String {
        match self.placeholder_style() {
            PlaceholderStyle::Numbered => format!("${position}"),
            PlaceholderStyle::Positional => "?".to_string(),
        }
    }

    /// Largest number of bind parameters a single statement may carry.
    pub fn max_bind_parameters(&self) -> usize {
        match self {
            Dialect::Postgres | Dialect::MySql => 65_535,
            Dialect::Sqlite => 32_766,
        }
    }

    pub fn default_port(&self) -> Option<u16> {
        match self {
            Dialect::Postgres => Some(5432),
            Dialect::MySql => Some(3306),
            Dialect::Sqlite => None,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Dialect {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            _ => Err(ConfigError::UnsupportedDialect(value.trim().to_string())),
        }
    }
}
