//! # tabula-orm
//!
//! Query builder and active-record access for a single relational table.
//!
//! This crate provides:
//! - [`Query`], a fluent builder that compiles to parameterized SQL and runs
//!   it through an injected [`Database`]
//! - [`Record`] and the [`Model`] trait for create/find/update/delete of one
//!   row, with fillable/guard protection of incoming fields
//! - a value codec that decodes JSON or legacy serialized columns and walks
//!   dotted paths such as `meta.colors.0`
//! - named formatters applied along dotted paths before writes
//!
//! ## Quick Start
//!
//! ```
//! use tabula_orm::{FieldRules, Model, Record, SqliteDatabase};
//! use serde_json::json;
//!
//! struct Post;
//!
//! impl Model for Post {
//!     fn table_name() -> &'static str {
//!         "posts"
//!     }
//!
//!     fn field_rules() -> FieldRules {
//!         FieldRules::new().with_fillable(["title", "meta"])
//!     }
//! }
//!
//! # fn main() -> tabula_orm::Result<()> {
//! let mut db = SqliteDatabase::in_memory()?;
//! db.execute_raw("CREATE TABLE posts (id INTEGER PRIMARY KEY, title TEXT, meta TEXT)")?;
//!
//! let serde_json::Value::Object(fields) = json!({
//!     "id": 99,
//!     "title": "Hello",
//!     "meta": {"color": "red"},
//! }) else { unreachable!() };
//! let id = Record::<Post>::new(&mut db).create(fields)?;
//! assert_eq!(id, 1);
//!
//! let mut post = Record::<Post>::new(&mut db);
//! post.find_by_id(id)?;
//! assert_eq!(post.get_field_value("meta.color"), Some(json!("red")));
//! # Ok(())
//! # }
//! ```
//!
//! ## Queries
//!
//! ```ignore
//! use tabula_orm::{Operator, Query};
//!
//! let mut posts = Query::new(&mut db, "posts");
//! let page = posts
//!     .where_eq("status", "publish")
//!     .or_where_op("views", Operator::Gt, 100)
//!     .order_by("id", "DESC")
//!     .take(10, 20)
//!     .get()?;
//! ```

mod abort;
pub mod codec;
mod database;
mod error;
mod format;
mod guard;
mod hooks;
mod old;
pub mod query;
mod record;

pub use abort::{AbortHandler, LogAbort, NOT_FOUND_MESSAGE};
pub use database::{Database, Results, Row, SqliteDatabase};
pub use error::{OrmError, Result};
pub use format::{FormatFn, FormatRules, Formatter, FormatterRegistry};
pub use guard::{FieldRules, FieldRulesConfig, Fields};
pub use hooks::{ModelHook, Hooks};
pub use old::{MemoryTransientStore, TransientStore, OLD_FIELDS_COOKIE};
pub use query::{CompiledStatement, Join, Operator, OrderDirection, Query};
pub use record::{DottedPath, FieldPath, Model, Record};

// Re-export commonly used types from tabula-sql
pub use tabula_sql::{Dialect, SqlValue, ToSqlValue};
