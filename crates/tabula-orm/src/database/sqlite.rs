//! SQLite store backed by sqlx.
//!
//! sqlx is async; the record layer is not. The adapter owns a
//! current-thread tokio runtime and blocks on each statement.

use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnection, SqliteRow};
use sqlx::{Column, Connection, Row as _, TypeInfo, ValueRef};
use tabula_sql::{Dialect, SqlValue, SqliteDialect};
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

use super::{Database, Row};
use crate::error::Result;
use crate::query::CompiledStatement;

/// A single SQLite connection driven synchronously.
pub struct SqliteDatabase {
    runtime: Runtime,
    conn: SqliteConnection,
    dialect: SqliteDialect,
    last_insert_id: Option<i64>,
}

impl std::fmt::Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDatabase")
            .field("last_insert_id", &self.last_insert_id)
            .finish_non_exhaustive()
    }
}

impl SqliteDatabase {
    /// Opens a connection from a sqlx URL such as `sqlite://app.db`.
    pub fn connect(url: &str) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let conn = runtime.block_on(SqliteConnection::connect(url))?;
        debug!(url = %url, "Opened SQLite connection");

        Ok(Self {
            runtime,
            conn,
            dialect: SqliteDialect::new(),
            last_insert_id: None,
        })
    }

    /// Opens a private in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:")
    }

    /// Runs raw SQL with no parameters, e.g. table setup in tests.
    pub fn execute_raw(&mut self, sql: &str) -> Result<u64> {
        let Self { runtime, conn, .. } = self;
        let result = runtime.block_on(sqlx::query(sql).execute(&mut *conn))?;
        Ok(result.rows_affected())
    }

    fn fetch(&mut self, stmt: &CompiledStatement) -> Result<Vec<SqliteRow>> {
        debug!(sql = %stmt.sql(), params = stmt.params().len(), "Fetching rows");
        let Self { runtime, conn, .. } = self;
        let query = bind_params(sqlx::query(stmt.sql()), stmt.params());
        Ok(runtime.block_on(query.fetch_all(&mut *conn))?)
    }
}

impl Database for SqliteDatabase {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn execute(&mut self, stmt: &CompiledStatement) -> Result<u64> {
        debug!(sql = %stmt.sql(), params = stmt.params().len(), "Executing SQL");
        let Self {
            runtime,
            conn,
            last_insert_id,
            ..
        } = self;
        let query = bind_params(sqlx::query(stmt.sql()), stmt.params());
        let result = runtime.block_on(query.execute(&mut *conn))?;
        *last_insert_id = Some(result.last_insert_rowid());
        Ok(result.rows_affected())
    }

    fn fetch_all(&mut self, stmt: &CompiledStatement) -> Result<Vec<Row>> {
        self.fetch(stmt)?.iter().map(decode_row).collect()
    }

    fn fetch_scalar(&mut self, stmt: &CompiledStatement) -> Result<Option<SqlValue>> {
        let rows = self.fetch(stmt)?;
        match rows.first() {
            Some(row) => Ok(decode_row(row)?.iter().next().map(|(_, v)| v.clone())),
            None => Ok(None),
        }
    }

    fn last_insert_id(&self) -> Option<i64> {
        self.last_insert_id
    }
}

/// Converts a sqlx row into a raw row, keyed by column name.
fn decode_row(row: &SqliteRow) -> Result<Row> {
    let mut out = Row::new();

    for (index, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(index)?;
        let value = if raw.is_null() {
            SqlValue::Null
        } else {
            // Storage class of the value, not the declared column type.
            let storage = raw.type_info().name().to_string();
            match storage.as_str() {
                "INTEGER" | "BOOLEAN" => SqlValue::Int(row.try_get(index)?),
                "REAL" => SqlValue::Float(row.try_get(index)?),
                "BLOB" => SqlValue::Blob(row.try_get(index)?),
                _ => SqlValue::Text(row.try_get(index)?),
            }
        };
        out.insert(column.name(), value);
    }

    Ok(out)
}

fn bind_params<'q>(
    mut query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &[SqlValue],
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = bind_param_raw(query, param.clone());
    }
    query
}

/// Binds a SqlValue parameter to a raw query.
fn bind_param_raw<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    value: SqlValue,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        SqlValue::Null => query.bind(Option::<i64>::None),
        SqlValue::Bool(b) => query.bind(b),
        SqlValue::Int(i) => query.bind(i),
        SqlValue::Float(f) => query.bind(f),
        SqlValue::Text(s) => query.bind(s),
        SqlValue::Blob(b) => query.bind(b),
    }
}
