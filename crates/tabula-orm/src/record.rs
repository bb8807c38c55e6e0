//! Active-record access to one row of a model's table.
//!
//! A [`Record`] ties a [`Model`]'s field rules to a [`Query`]: writes pass
//! through [`FieldRules::secure`] and the hook chain, reads keep the raw
//! row so dotted paths can be resolved into decoded column values later.

use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;
use tabula_sql::SqlValue;
use tracing::{debug, info};

use crate::abort::{AbortHandler, LogAbort};
use crate::codec::{resolve_in, resolve_path, segments, sql_to_json};
use crate::database::{Database, Row};
use crate::error::{OrmError, Result};
use crate::guard::{FieldRules, Fields};
use crate::hooks::Hooks;
use crate::old::TransientStore;
use crate::query::Query;

/// A table-backed entity type.
///
/// # Example
///
/// ```
/// use tabula_orm::{FieldRules, Model};
///
/// struct Post;
///
/// impl Model for Post {
///     fn table_name() -> &'static str {
///         "posts"
///     }
///
///     fn field_rules() -> FieldRules {
///         FieldRules::new()
///             .with_fillable(["title", "status", "meta"])
///             .with_guard(["id"])
///     }
/// }
///
/// assert_eq!(Post::pk_column(), "id");
/// assert_eq!(Post::model_name(), "posts");
/// ```
pub trait Model {
    /// Returns the table name.
    fn table_name() -> &'static str;

    /// Returns the identifier column name.
    fn pk_column() -> &'static str {
        "id"
    }

    /// Returns the name hooks see for this model.
    fn model_name() -> &'static str {
        Self::table_name()
    }

    /// Returns the rules a new record starts with, before hooks run.
    fn field_rules() -> FieldRules {
        FieldRules::new()
    }
}

/// Something that can name a field as a dotted path.
pub trait DottedPath {
    /// Returns the path with `.` between segments.
    fn dots(&self) -> Cow<'_, str>;
}

impl DottedPath for str {
    fn dots(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl DottedPath for String {
    fn dots(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

/// A form field name such as `meta[colors][0]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Parses a bracketed input name.
    ///
    /// ```
    /// use tabula_orm::{DottedPath, FieldPath};
    ///
    /// let field = FieldPath::from_brackets("meta[colors][0]");
    /// assert_eq!(field.dots(), "meta.colors.0");
    /// ```
    #[must_use]
    pub fn from_brackets(name: &str) -> Self {
        let segments = name
            .split(['[', ']'])
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self { segments }
    }
}

impl DottedPath for FieldPath {
    fn dots(&self) -> Cow<'_, str> {
        Cow::Owned(self.segments.join("."))
    }
}

/// One row of `M`'s table, plus the rules that protect writes to it.
pub struct Record<'db, M: Model> {
    db: &'db mut dyn Database,
    rules: FieldRules,
    hooks: Hooks,
    abort: Arc<dyn AbortHandler>,
    id: Option<i64>,
    data: Option<Row>,
    old: Option<Fields>,
    _model: PhantomData<M>,
}

impl<M: Model> fmt::Debug for Record<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("model", &M::model_name())
            .field("id", &self.id)
            .field("rules", &self.rules)
            .field("data", &self.data)
            .field("old", &self.old)
            .finish_non_exhaustive()
    }
}

impl<'db, M: Model> Record<'db, M> {
    /// Creates an unsaved record with no hooks.
    pub fn new(db: &'db mut dyn Database) -> Self {
        Self::with_hooks(db, Hooks::new())
    }

    /// Creates an unsaved record whose rules pass through `hooks`.
    pub fn with_hooks(db: &'db mut dyn Database, hooks: Hooks) -> Self {
        let rules = hooks.construct(M::model_name(), M::field_rules());
        Self {
            db,
            rules,
            hooks,
            abort: Arc::new(LogAbort),
            id: None,
            data: None,
            old: None,
            _model: PhantomData,
        }
    }

    /// Uses a different handler for `find_or_die`.
    #[must_use]
    pub fn with_abort_handler(mut self, handler: Arc<dyn AbortHandler>) -> Self {
        self.abort = handler;
        self
    }

    /// Starts a fresh query against this model's table.
    pub fn query(&mut self) -> Query<'_> {
        Query::new(&mut *self.db, M::table_name())
            .with_id_column(M::pk_column())
            .with_abort_handler(Arc::clone(&self.abort))
    }

    /// Returns the identifier, set once the record is created or found.
    #[must_use]
    pub const fn id(&self) -> Option<i64> {
        self.id
    }

    /// Returns the active field rules.
    #[must_use]
    pub const fn rules(&self) -> &FieldRules {
        &self.rules
    }

    /// Returns the field rules for in-place changes such as
    /// [`FieldRules::unlock`].
    pub fn rules_mut(&mut self) -> &mut FieldRules {
        &mut self.rules
    }

    /// Fields allowed through on write.
    #[must_use]
    pub fn fillable_fields(&self) -> &[String] {
        self.rules.fillable()
    }

    /// Fields stripped on write unless also fillable.
    #[must_use]
    pub fn guard_fields(&self) -> &[String] {
        self.rules.guard()
    }

    /// Native table columns.
    #[must_use]
    pub fn builtin_fields(&self) -> &[String] {
        self.rules.builtin()
    }

    /// Returns the loaded row, if any.
    #[must_use]
    pub const fn row(&self) -> Option<&Row> {
        self.data.as_ref()
    }

    /// Returns one raw column of the loaded row.
    #[must_use]
    pub fn get_data(&self, column: &str) -> Option<&SqlValue> {
        self.data.as_ref()?.get(column)
    }

    /// Returns the old-fields snapshot, if loaded.
    #[must_use]
    pub const fn old(&self) -> Option<&Fields> {
        self.old.as_ref()
    }

    /// Filters, formats and hooks an incoming payload.
    #[must_use]
    pub fn secure_fields(&self, fields: Fields) -> Fields {
        let secured = self.rules.secure(fields);
        self.hooks.secure_fields(M::model_name(), secured)
    }

    /// Inserts a secured payload and adopts the new identifier.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::WriteFailed`] when the store reports no insert,
    /// or any store error unchanged.
    pub fn create(&mut self, fields: Fields) -> Result<i64> {
        let secured = self.secure_fields(fields);
        let id = self.query().create(secured)?;
        info!(model = M::model_name(), id, "Created record");
        self.id = Some(id);
        Ok(id)
    }

    /// Updates this record's row with a secured payload.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::NotPersisted`] when the record has no identifier
    /// and [`OrmError::EmptyPayload`] when nothing survives securing.
    pub fn update(&mut self, fields: Fields) -> Result<u64> {
        let id = self.id.ok_or(OrmError::NotPersisted)?;
        let secured = self.secure_fields(fields);
        let pk = M::pk_column();
        let affected = self.query().where_eq(pk, id).update(secured)?;
        debug!(model = M::model_name(), id, affected, "Updated record");
        Ok(affected)
    }

    /// Loads the row with `id` into this record.
    ///
    /// Returns `None` and leaves the record untouched when no row matches.
    ///
    /// # Errors
    ///
    /// Returns any store error unchanged.
    pub fn find_by_id(&mut self, id: i64) -> Result<Option<&Row>> {
        let found = self.query().find_by_id(id)?;
        match found {
            Some(row) => Ok(Some(self.load(row, id))),
            None => Ok(None),
        }
    }

    /// Loads the row with `id`, aborting the request when there is none.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Aborted`] after signalling the abort handler.
    pub fn find_or_die(&mut self, id: i64) -> Result<&Row> {
        let row = self.query().find_or_die(id)?;
        Ok(self.load(row, id))
    }

    /// Deletes this record's row and forgets its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::NotPersisted`] when the record has no identifier.
    pub fn delete(&mut self) -> Result<u64> {
        let id = self.id.ok_or(OrmError::NotPersisted)?;
        let affected = self.query().delete([id])?;
        info!(model = M::model_name(), id, affected, "Deleted record");
        self.id = None;
        self.data = None;
        Ok(affected)
    }

    /// Loads the old-fields snapshot stored under `token`.
    ///
    /// Returns whether a snapshot was found. A missing or empty token is not
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns any error from the store.
    pub fn load_old(&mut self, store: &dyn TransientStore, token: Option<&str>) -> Result<bool> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(false);
        };
        self.old = store.get_transient(token)?;
        Ok(self.old.is_some())
    }

    /// Resolves a dotted path against the old snapshot when one is loaded,
    /// otherwise against the loaded row.
    ///
    /// Returns `None` for an unsaved record without a snapshot, and for any
    /// path that runs into a missing key, null or empty string.
    pub fn get_field_value<P: DottedPath + ?Sized>(&self, field: &P) -> Option<Value> {
        let path = field.dots();
        if let Some(old) = &self.old {
            return resolve_in(old, &path);
        }

        self.id?;
        let mut parts = segments(&path);
        let column = parts.next()?;
        let base = sql_to_json(self.get_data(column)?);
        resolve_path(base, parts)
    }

    fn load(&mut self, row: Row, id: i64) -> &Row {
        let stored_id = row.get(M::pk_column()).and_then(SqlValue::as_i64);
        self.id = Some(stored_id.unwrap_or(id));
        self.data.insert(row)
    }
}
