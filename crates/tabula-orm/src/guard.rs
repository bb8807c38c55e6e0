//! Mass-assignment protection for incoming field maps.
//!
//! [`FieldRules`] holds a model's fillable, guarded, builtin and format
//! lists. [`FieldRules::secure`] filters and formats a payload before it
//! reaches the query builder.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::codec::apply_format;
use crate::error::Result;
use crate::format::{FormatRules, Formatter, FormatterRegistry};

/// A map of field names to incoming values.
pub type Fields = Map<String, Value>;

/// Field access rules for one model.
#[derive(Debug, Clone, Default)]
pub struct FieldRules {
    fillable: Vec<String>,
    guard: Vec<String>,
    builtin: Vec<String>,
    format: FormatRules,
}

impl FieldRules {
    /// Creates rules that accept every field.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the fillable list.
    #[must_use]
    pub fn with_fillable<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fillable = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the guard list.
    #[must_use]
    pub fn with_guard<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.guard = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the builtin column list.
    #[must_use]
    pub fn with_builtin<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.builtin = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a format rule.
    #[must_use]
    pub fn with_format(mut self, path: impl Into<String>, formatter: Formatter) -> Self {
        self.format.add(path, formatter);
        self
    }

    /// Replaces all format rules.
    #[must_use]
    pub fn with_format_rules(mut self, format: FormatRules) -> Self {
        self.format = format;
        self
    }

    /// Fields allowed through. Empty means every field not guarded.
    #[must_use]
    pub fn fillable(&self) -> &[String] {
        &self.fillable
    }

    /// Fields always stripped unless also fillable.
    #[must_use]
    pub fn guard(&self) -> &[String] {
        &self.guard
    }

    /// Columns that belong to the main table.
    #[must_use]
    pub fn builtin(&self) -> &[String] {
        &self.builtin
    }

    /// Format rules applied after filtering.
    #[must_use]
    pub fn format(&self) -> &FormatRules {
        &self.format
    }

    /// Makes a field fillable unless it is already listed in either list.
    pub fn append_fillable(&mut self, field: &str) -> &mut Self {
        if !self.is_listed(field) {
            self.fillable.push(field.to_string());
        }
        self
    }

    /// Guards a field unless it is already listed in either list.
    pub fn append_guard(&mut self, field: &str) -> &mut Self {
        if !self.is_listed(field) {
            self.guard.push(field.to_string());
        }
        self
    }

    /// Adds a format rule unless the path already has one.
    pub fn append_format(&mut self, path: &str, formatter: Formatter) -> &mut Self {
        self.format.add(path, formatter);
        self
    }

    /// Drops a field from the fillable list.
    pub fn remove_fillable(&mut self, field: &str) -> &mut Self {
        self.fillable.retain(|f| f != field);
        self
    }

    /// Drops a field from the guard list.
    pub fn remove_guard(&mut self, field: &str) -> &mut Self {
        self.guard.retain(|f| f != field);
        self
    }

    /// Drops the format rule for a path.
    pub fn remove_format(&mut self, path: &str) -> &mut Self {
        self.format.remove(path);
        self
    }

    /// Lets a guarded field through.
    ///
    /// When a fillable list is in force, the field is added to it too.
    pub fn unlock(&mut self, field: &str) -> &mut Self {
        self.remove_guard(field);
        if !self.fillable.is_empty() && !self.fillable.iter().any(|f| f == field) {
            self.fillable.push(field.to_string());
        }
        self
    }

    /// Filters and formats an incoming payload.
    ///
    /// With a fillable list, only those fields survive, in fillable order.
    /// Guarded fields are then removed unless also fillable. Finally each
    /// format rule rewrites the value at its path.
    #[must_use]
    pub fn secure(&self, mut fields: Fields) -> Fields {
        if !self.fillable.is_empty() {
            fields = self
                .fillable
                .iter()
                .filter_map(|name| fields.remove(name).map(|value| (name.clone(), value)))
                .collect();
        }

        for name in &self.guard {
            if !self.fillable.contains(name) && fields.shift_remove(name).is_some() {
                debug!(field = %name, "Dropped guarded field");
            }
        }

        for (path, formatter) in self.format.iter() {
            apply_format(&mut fields, path, formatter);
        }

        fields
    }

    /// Returns the fields that are builtin columns.
    #[must_use]
    pub fn builtin_fields(&self, fields: &Fields) -> Fields {
        self.partition(fields, true)
    }

    /// Returns the fields that are not builtin columns.
    #[must_use]
    pub fn meta_fields(&self, fields: &Fields) -> Fields {
        self.partition(fields, false)
    }

    fn partition(&self, fields: &Fields, builtin: bool) -> Fields {
        fields
            .iter()
            .filter(|(name, _)| self.builtin.contains(name) == builtin)
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    fn is_listed(&self, field: &str) -> bool {
        self.fillable.iter().chain(&self.guard).any(|f| f == field)
    }
}

/// Field rules as they appear in a configuration file.
///
/// ```
/// use tabula_orm::{FieldRulesConfig, FormatterRegistry};
///
/// let config: FieldRulesConfig = serde_json::from_str(
///     r#"{"fillable": ["title", "slug"], "format": {"slug": "dash"}}"#,
/// ).unwrap();
/// let rules = config.into_rules(&FormatterRegistry::with_builtins()).unwrap();
/// assert_eq!(rules.fillable(), ["title", "slug"]);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldRulesConfig {
    /// Fillable field names.
    pub fillable: Vec<String>,
    /// Guarded field names.
    pub guard: Vec<String>,
    /// Builtin column names.
    pub builtin: Vec<String>,
    /// Dotted path to formatter name.
    pub format: IndexMap<String, String>,
}

impl FieldRulesConfig {
    /// Resolves formatter names and builds the rules.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::UnknownFormatter`](crate::OrmError::UnknownFormatter)
    /// for the first name the registry does not know.
    pub fn into_rules(self, registry: &FormatterRegistry) -> Result<FieldRules> {
        let mut format = FormatRules::new();
        for (path, name) in self.format {
            format.add(path, registry.resolve(&name)?);
        }
        Ok(FieldRules::new()
            .with_fillable(self.fillable)
            .with_guard(self.guard)
            .with_builtin(self.builtin)
            .with_format_rules(format))
    }
}
