//! SQL dialect support.
//!
//! Stores disagree on identifier quoting and parameter placeholders. The
//! compiler asks the dialect for both, so the same query state renders
//! correctly for each backend.

mod mysql;
mod sqlite;

pub use mysql::MySqlDialect;
pub use sqlite::SqliteDialect;

use crate::value::SqlValue;

/// Trait for SQL dialect-specific behavior.
pub trait Dialect {
    /// Returns the name of the dialect.
    fn name(&self) -> &'static str;

    /// Returns the identifier quote character (e.g., `"` for standard SQL, `` ` `` for MySQL).
    fn identifier_quote(&self) -> char {
        '"'
    }

    /// Returns the parameter placeholder style.
    fn parameter_placeholder(&self) -> &'static str {
        "?"
    }

    /// Quotes an identifier.
    ///
    /// Callers validate the name first; quoting only protects keywords such
    /// as `order` or `key` used as column names.
    fn quote_identifier(&self, name: &str) -> String {
        let quote = self.identifier_quote();
        format!("{quote}{name}{quote}")
    }

    /// Escapes a single scalar into text that can be embedded in SQL.
    fn escape(&self, value: &SqlValue) -> String {
        value.to_sql_inline()
    }
}
