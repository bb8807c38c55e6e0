//! # tabula-sql
//!
//! SQL building blocks shared by the tabula data-access layer:
//!
//! - [`SqlValue`] and [`ToSqlValue`] for parameter values
//! - [`Dialect`] implementations for identifier quoting, placeholders and
//!   inline escaping
//! - identifier validation, so table and column names never carry SQL
//!
//! ```rust
//! use tabula_sql::{validate_identifier, Dialect, SqliteDialect, SqlValue};
//!
//! let dialect = SqliteDialect::new();
//! let column = validate_identifier("post_title").unwrap();
//! assert_eq!(dialect.quote_identifier(column), "\"post_title\"");
//! assert_eq!(dialect.escape(&SqlValue::Text("it's".into())), "'it''s'");
//!
//! assert!(validate_identifier("title; DROP TABLE posts").is_err());
//! ```

pub mod dialect;
mod ident;
pub mod value;

pub use dialect::{Dialect, MySqlDialect, SqliteDialect};
pub use ident::{is_safe_identifier, validate_identifier, IdentError};
pub use value::{SqlValue, ToSqlValue};
