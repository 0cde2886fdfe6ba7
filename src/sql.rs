//! Statement text generation.
//!
//! Produces the `CREATE TABLE IF NOT EXISTS` statement for an inferred
//! [`TableSpec`] and one multi-row `INSERT` per batch. Output is
//! byte-for-byte reproducible for the same inputs.
//!
//! Identifiers are double-quoted by [`IdentifierPolicy::escape`], the single
//! place that decides how table and column names reach statement text.
//! [`IdentifierPolicy::Wrap`] only wraps the name, so a name that itself
//! contains `"` yields broken SQL; [`IdentifierPolicy::Strict`] doubles
//! embedded quotes instead.

use thiserror::Error;

use crate::{dialect::Dialect, schema::TableSpec};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SqlError {
    #[error("row width mismatch at row {row}: expected {expected} field(s), found {found}")]
    RowWidthMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdentifierPolicy {
    #[default]
    Wrap,
    Strict,
}

impl IdentifierPolicy {
    pub fn escape(&self, identifier: &str) -> String {
        match self {
            IdentifierPolicy::Wrap => format!("\"{identifier}\""),
            IdentifierPolicy::Strict => format!("\"{}\"", identifier.replace('"', "\"\"")),
        }
    }
}

/// A statement ready for execution with its flattened text parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    pub sql: String,
    pub params: Vec<String>,
    pub rows: usize,
}

pub fn create_table_sql(table: &TableSpec, policy: IdentifierPolicy) -> String {
    let columns = table
        .columns
        .iter()
        .map(|column| {
            format!(
                "{} {}",
                policy.escape(&column.name),
                column.column_type.sql_type()
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({columns});",
        policy.escape(&table.name)
    )
}

/// Builds one `INSERT` covering every row of a batch.
///
/// `first_row` is the 1-based data row number of `rows[0]`, used only to
/// point at the offending row when a width check fails. Returns `Ok(None)`
/// for an empty batch.
pub fn bulk_insert(
    table: &TableSpec,
    rows: &[Vec<String>],
    first_row: usize,
    dialect: Dialect,
    policy: IdentifierPolicy,
) -> Result<Option<InsertStatement>, SqlError> {
    if rows.is_empty() {
        return Ok(None);
    }
    let width = table.column_count();
    if let Some((offset, row)) = rows
        .iter()
        .enumerate()
        .find(|(_, row)| row.len() != width)
    {
        return Err(SqlError::RowWidthMismatch {
            row: first_row + offset,
            expected: width,
            found: row.len(),
        });
    }

    let columns = table
        .column_names()
        .map(|name| policy.escape(name))
        .collect::<Vec<_>>()
        .join(", ");
    let mut sql = format!(
        "INSERT INTO {} ({columns}) VALUES ",
        policy.escape(&table.name)
    );
    let mut params = Vec::with_capacity(rows.len() * width);
    for (row_idx, row) in rows.iter().enumerate() {
        if row_idx > 0 {
            sql.push_str(", ");
        }
        sql.push('(');
        for (col_idx, value) in row.iter().enumerate() {
            if col_idx > 0 {
                sql.push_str(", ");
            }
            params.push(value.clone());
            sql.push_str(&dialect.placeholder(params.len()));
        }
        sql.push(')');
    }
    Ok(Some(InsertStatement {
        sql,
        params,
        rows: rows.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;

    fn orders() -> TableSpec {
        let headers = ["id", "name", "signup"].map(String::from);
        TableSpec::new(
            "orders",
            &headers,
            &[ColumnType::Integer, ColumnType::Text, ColumnType::Text],
        )
    }

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn create_table_matches_expected_text() {
        assert_eq!(
            create_table_sql(&orders(), IdentifierPolicy::Wrap),
            r#"CREATE TABLE IF NOT EXISTS "orders" ("id" INTEGER, "name" TEXT, "signup" TEXT);"#
        );
    }

    #[test]
    fn create_table_maps_every_type() {
        let headers = ["i", "f", "d", "t"].map(String::from);
        let table = TableSpec::new(
            "types",
            &headers,
            &[
                ColumnType::Integer,
                ColumnType::Float,
                ColumnType::Date,
                ColumnType::Text,
            ],
        );
        assert_eq!(
            create_table_sql(&table, IdentifierPolicy::Wrap),
            r#"CREATE TABLE IF NOT EXISTS "types" ("i" INTEGER, "f" REAL, "d" DATE, "t" TEXT);"#
        );
    }

    #[test]
    fn create_table_is_stable() {
        let table = orders();
        assert_eq!(
            create_table_sql(&table, IdentifierPolicy::Wrap),
            create_table_sql(&table, IdentifierPolicy::Wrap)
        );
    }

    #[test]
    fn wrap_policy_leaves_embedded_quotes_alone() {
        assert_eq!(IdentifierPolicy::Wrap.escape(r#"a"b"#), r#""a"b""#);
        assert_eq!(IdentifierPolicy::Strict.escape(r#"a"b"#), r#""a""b""#);
    }

    #[test]
    fn numbered_placeholders_run_across_the_batch() {
        let rows = vec![row(&["1", "Ann", "x"]), row(&["2", "Bea", "y"])];
        let statement = bulk_insert(&orders(), &rows, 1, Dialect::Postgres, IdentifierPolicy::Wrap)
            .expect("build")
            .expect("non-empty");
        assert_eq!(
            statement.sql,
            r#"INSERT INTO "orders" ("id", "name", "signup") VALUES ($1, $2, $3), ($4, $5, $6)"#
        );
        assert_eq!(statement.params, row(&["1", "Ann", "x", "2", "Bea", "y"]));
        assert_eq!(statement.rows, 2);
    }

    #[test]
    fn positional_placeholders_for_mysql_and_sqlite() {
        let rows = vec![row(&["1", "Ann", "x"]), row(&["2", "Bea", "y"])];
        for dialect in [Dialect::MySql, Dialect::Sqlite] {
            let statement = bulk_insert(&orders(), &rows, 1, dialect, IdentifierPolicy::Wrap)
                .expect("build")
                .expect("non-empty");
            assert_eq!(
                statement.sql,
                r#"INSERT INTO "orders" ("id", "name", "signup") VALUES (?, ?, ?), (?, ?, ?)"#
            );
            assert_eq!(statement.params.len(), 6);
        }
    }

    #[test]
    fn empty_batch_builds_nothing() {
        let result = bulk_insert(&orders(), &[], 1, Dialect::Sqlite, IdentifierPolicy::Wrap);
        assert_eq!(result, Ok(None));
    }

    #[test]
    fn ragged_row_is_rejected_with_its_row_number() {
        let rows = vec![row(&["1", "Ann", "x"]), row(&["2", "Bea"])];
        let err = bulk_insert(&orders(), &rows, 41, Dialect::Sqlite, IdentifierPolicy::Wrap)
            .unwrap_err();
        assert_eq!(
            err,
            SqlError::RowWidthMismatch {
                row: 42,
                expected: 3,
                found: 2
            }
        );
    }
}
