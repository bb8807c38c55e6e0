//! The store collaborator.
//!
//! Queries never reach for a global connection. Whatever implements
//! [`Database`] is handed to [`Query::new`](crate::Query::new) or
//! [`Record::new`](crate::Record::new) and used for the duration of one
//! logical operation.

mod sqlite;

pub use sqlite::SqliteDatabase;

use std::ops::Deref;

use indexmap::IndexMap;
use tabula_sql::{Dialect, SqlValue};

use crate::error::Result;
use crate::query::CompiledStatement;

/// Synchronous access to a relational store.
///
/// Implementations run each statement to completion before returning. One
/// call issues exactly one statement.
pub trait Database {
    /// The dialect used to quote identifiers, emit placeholders and escape
    /// scalars for diagnostics.
    fn dialect(&self) -> &dyn Dialect;

    /// Executes a statement and returns the number of affected rows.
    fn execute(&mut self, stmt: &CompiledStatement) -> Result<u64>;

    /// Executes a statement and returns every row in store order.
    fn fetch_all(&mut self, stmt: &CompiledStatement) -> Result<Vec<Row>>;

    /// Executes a statement and returns the first column of the first row.
    fn fetch_scalar(&mut self, stmt: &CompiledStatement) -> Result<Option<SqlValue>>;

    /// Returns the identifier generated by the most recent INSERT.
    fn last_insert_id(&self) -> Option<i64>;
}

/// A raw row: column name to stored value, in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: IndexMap<String, SqlValue>,
}

impl Row {
    /// Creates an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw value of a column.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns.get(column)
    }

    /// Sets a column value.
    pub fn insert(&mut self, column: impl Into<String>, value: SqlValue) {
        self.columns.insert(column.into(), value);
    }

    /// Returns whether the row has a column.
    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    /// Iterates over `(column, value)` pairs in select order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns whether the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, SqlValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, SqlValue)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// An ordered result set. Empty, never absent, when nothing matched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Results {
    rows: Vec<Row>,
}

impl Results {
    /// Wraps rows in store order.
    #[must_use]
    pub const fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    /// Unwraps the rows.
    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

impl Deref for Results {
    type Target = [Row];

    fn deref(&self) -> &Self::Target {
        &self.rows
    }
}

impl IntoIterator for Results {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a Results {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_keeps_select_order() {
        let row: Row = [
            ("id", SqlValue::Int(1)),
            ("title", SqlValue::Text("Hello".into())),
            ("body", SqlValue::Null),
        ]
        .into_iter()
        .collect();

        let columns: Vec<&str> = row.iter().map(|(k, _)| k).collect();
        assert_eq!(columns, vec!["id", "title", "body"]);
        assert_eq!(row.get("title"), Some(&SqlValue::Text("Hello".into())));
        assert!(row.get("missing").is_none());
        assert!(row.contains("body"));
    }

    #[test]
    fn test_results_deref() {
        let results = Results::new(vec![Row::new(), Row::new()]);
        assert_eq!(results.len(), 2);
        assert!(!results.is_empty());
        assert!(Results::default().is_empty());
        assert_eq!(results.into_iter().count(), 2);
    }

    #[test]
    fn test_results_into_rows() {
        let mut first = Row::new();
        first.insert("id", SqlValue::Int(1));
        let rows = Results::new(vec![first.clone(), Row::new()]).into_rows();
        assert_eq!(rows, vec![first, Row::new()]);
        assert!(Results::default().into_rows().is_empty());
    }
}
