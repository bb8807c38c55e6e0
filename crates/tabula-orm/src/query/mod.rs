//! Fluent query builder for a single table.
//!
//! A [`Query`] accumulates where clauses, ordering, pagination and a column
//! projection, then a terminal method (`get`, `first`, `count`, `create`,
//! `update`, `delete`, ...) compiles and executes it against the injected
//! [`Database`]. Each terminal call consumes the accumulated state, so the
//! same `Query` can be reused for the next logical operation without
//! leaking filters from the previous one.
//!
//! ```ignore
//! use tabula_orm::{Query, Operator, SqliteDatabase};
//!
//! let mut db = SqliteDatabase::connect("sqlite://site.db")?;
//! let mut posts = Query::new(&mut db, "posts");
//!
//! let recent = posts
//!     .where_eq("status", "publish")
//!     .or_where_op("views", Operator::Gt, 100)
//!     .order_by("id", "DESC")
//!     .take(10, 0)
//!     .get()?;
//!
//! let total = posts.where_eq("status", "draft").count()?;
//! ```

mod clause;
mod compiler;

pub use clause::{
    Join, Operation, Operator, OrderBy, OrderDirection, QueryState, Take, WhereClause,
    WhereValue,
};
pub use compiler::{compile, json_to_sql, CompiledStatement};

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tabula_sql::{SqlValue, ToSqlValue};
use tracing::warn;

use crate::abort::{AbortHandler, LogAbort, NOT_FOUND_MESSAGE};
use crate::database::{Database, Results, Row};
use crate::error::{OrmError, Result};

/// A chainable query against one table, executed through an injected store.
pub struct Query<'db> {
    db: &'db mut dyn Database,
    table: String,
    id_column: String,
    state: QueryState,
    last_compiled: Option<CompiledStatement>,
    abort: Arc<dyn AbortHandler>,
}

impl std::fmt::Debug for Query<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("table", &self.table)
            .field("id_column", &self.id_column)
            .field("state", &self.state)
            .field("last_compiled", &self.last_compiled)
            .finish_non_exhaustive()
    }
}

impl<'db> Query<'db> {
    /// Creates a query against `table`, keyed by an `id` column.
    pub fn new(db: &'db mut dyn Database, table: impl Into<String>) -> Self {
        Self {
            db,
            table: table.into(),
            id_column: String::from("id"),
            state: QueryState::default(),
            last_compiled: None,
            abort: Arc::new(LogAbort),
        }
    }

    /// Uses a different identifier column.
    #[must_use]
    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    /// Replaces the handler invoked by the `..._or_die` lookups.
    #[must_use]
    pub fn with_abort_handler(mut self, handler: Arc<dyn AbortHandler>) -> Self {
        self.abort = handler;
        self
    }

    /// Returns the target table.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the identifier column.
    #[must_use]
    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    /// Returns the accumulated, not yet executed state.
    #[must_use]
    pub const fn state(&self) -> &QueryState {
        &self.state
    }

    /// Returns the statement issued by the most recent terminal call.
    #[must_use]
    pub const fn last_compiled(&self) -> Option<&CompiledStatement> {
        self.last_compiled.as_ref()
    }

    /// Returns the current UTC time formatted for DATETIME columns.
    #[must_use]
    pub fn date_time() -> String {
        Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
    }

    /// Adds a where clause with an explicit join keyword.
    ///
    /// The first clause always renders as `WHERE`; `join` applies from the
    /// second clause on. A list value renders as `IN (...)`.
    pub fn where_join(
        &mut self,
        join: Join,
        column: impl Into<String>,
        operator: Operator,
        value: impl Into<WhereValue>,
    ) -> &mut Self {
        let join = if self.state.wheres.is_empty() {
            None
        } else {
            Some(join)
        };
        self.state.wheres.push(WhereClause {
            join,
            column: column.into(),
            operator,
            value: value.into(),
        });
        self
    }

    /// Adds `column = value`, joined with AND.
    pub fn where_eq(&mut self, column: impl Into<String>, value: impl Into<WhereValue>) -> &mut Self {
        self.where_join(Join::And, column, Operator::Eq, value)
    }

    /// Adds `column <operator> value`, joined with AND.
    pub fn where_op(
        &mut self,
        column: impl Into<String>,
        operator: Operator,
        value: impl Into<WhereValue>,
    ) -> &mut Self {
        self.where_join(Join::And, column, operator, value)
    }

    /// Adds `column = value`, joined with OR.
    pub fn or_where_eq(
        &mut self,
        column: impl Into<String>,
        value: impl Into<WhereValue>,
    ) -> &mut Self {
        self.where_join(Join::Or, column, Operator::Eq, value)
    }

    /// Adds `column <operator> value`, joined with OR.
    pub fn or_where_op(
        &mut self,
        column: impl Into<String>,
        operator: Operator,
        value: impl Into<WhereValue>,
    ) -> &mut Self {
        self.where_join(Join::Or, column, operator, value)
    }

    /// Sets the ordering. Only the last call is kept.
    ///
    /// Accepts an [`OrderDirection`] or a string, where anything other than
    /// exactly `"ASC"` means descending.
    pub fn order_by(
        &mut self,
        column: impl Into<String>,
        direction: impl Into<OrderDirection>,
    ) -> &mut Self {
        self.state.order_by = Some(OrderBy {
            column: column.into(),
            direction: direction.into(),
        });
        self
    }

    /// Sets the pagination window. Negative inputs are clamped to zero.
    pub fn take(&mut self, limit: i64, offset: i64) -> &mut Self {
        self.state.take = Some(Take {
            limit: u64::try_from(limit).unwrap_or(0),
            offset: u64::try_from(offset).unwrap_or(0),
        });
        self
    }

    /// Restricts the selected columns.
    pub fn select<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.select = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Constrains the query to the given identifiers, when any are given.
    ///
    /// Execute with [`Query::get`].
    pub fn find_all<I, T>(&mut self, ids: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: ToSqlValue,
    {
        let ids: Vec<SqlValue> = ids.into_iter().map(ToSqlValue::to_sql_value).collect();
        if !ids.is_empty() {
            let column = self.id_column.clone();
            self.where_op(column, Operator::In, ids);
        }
        self
    }

    /// Executes a select and returns every matching row.
    pub fn get(&mut self) -> Result<Results> {
        let stmt = self.prepare(Operation::Select)?;
        Ok(Results::new(self.db.fetch_all(&stmt)?))
    }

    /// Returns the row with the given identifier.
    pub fn find_by_id(&mut self, id: impl ToSqlValue) -> Result<Option<Row>> {
        let column = self.id_column.clone();
        self.where_eq(column, id.to_sql_value()).first()
    }

    /// Returns the first matching row.
    pub fn first(&mut self) -> Result<Option<Row>> {
        self.take(1, 0);
        Ok(self.get()?.into_iter().next())
    }

    /// Counts matching rows. Zero when nothing matches.
    pub fn count(&mut self) -> Result<u64> {
        let stmt = self.prepare(Operation::Count)?;
        let count = self
            .db
            .fetch_scalar(&stmt)?
            .and_then(|value| value.as_i64())
            .map_or(0, |n| u64::try_from(n).unwrap_or(0));
        Ok(count)
    }

    /// Inserts one row and returns its generated identifier.
    pub fn create(&mut self, fields: Map<String, Value>) -> Result<i64> {
        self.state.data = fields;
        let stmt = self.prepare(Operation::Create)?;

        if self.db.execute(&stmt)? == 0 {
            return Err(OrmError::WriteFailed(format!(
                "no row inserted into {}",
                self.table
            )));
        }
        self.db.last_insert_id().ok_or_else(|| {
            OrmError::WriteFailed(format!("no identifier generated for {}", self.table))
        })
    }

    /// Updates matching rows and returns how many changed.
    pub fn update(&mut self, fields: Map<String, Value>) -> Result<u64> {
        self.state.data = fields;
        let stmt = self.prepare(Operation::Update)?;
        self.db.execute(&stmt)
    }

    /// Deletes matching rows, or the given identifiers, and returns how many
    /// were removed.
    pub fn delete<I, T>(&mut self, ids: I) -> Result<u64>
    where
        I: IntoIterator<Item = T>,
        T: ToSqlValue,
    {
        self.find_all(ids);
        let stmt = self.prepare(Operation::Delete)?;
        self.db.execute(&stmt)
    }

    /// Like [`Query::find_by_id`], but aborts the request when nothing is found.
    pub fn find_or_die(&mut self, id: impl ToSqlValue) -> Result<Row> {
        let found = self.find_by_id(id)?;
        self.or_die(found)
    }

    /// Adds one where clause and returns the first match, aborting the
    /// request when nothing is found.
    pub fn find_first_where_or_die(
        &mut self,
        column: impl Into<String>,
        operator: Operator,
        value: impl Into<WhereValue>,
        join: Join,
    ) -> Result<Row> {
        let found = self.where_join(join, column, operator, value).first()?;
        self.or_die(found)
    }

    /// Compiles the accumulated state without executing or consuming it.
    pub fn compile(&self, operation: Operation) -> Result<CompiledStatement> {
        let mut state = self.state.clone();
        state.set_operation(operation);
        compile(&self.table, &state, self.db.dialect())
    }

    fn or_die(&self, found: Option<Row>) -> Result<Row> {
        match found {
            Some(row) => Ok(row),
            None => {
                self.abort.abort(NOT_FOUND_MESSAGE);
                Err(OrmError::Aborted(NOT_FOUND_MESSAGE.to_string()))
            }
        }
    }

    /// Takes the accumulated state, compiles it and keeps the statement for
    /// diagnostics. The builder is empty afterwards.
    fn prepare(&mut self, operation: Operation) -> Result<CompiledStatement> {
        let mut state = std::mem::take(&mut self.state);
        state.set_operation(operation);

        if matches!(operation, Operation::Update | Operation::Delete) && state.wheres.is_empty() {
            warn!(table = %self.table, ?operation, "Statement is not scoped by any where clause");
        }

        let stmt = compile(&self.table, &state, self.db.dialect())?;
        self.last_compiled = Some(stmt.clone());
        Ok(stmt)
    }
}
