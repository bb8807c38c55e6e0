//! Extension points run when a record is built and when it secures input.
//!
//! A hook sees the model name and can reshape the rule lists or the
//! secured payload. Hooks run in registration order; each receives the
//! previous one's output.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::format::FormatRules;
use crate::guard::{FieldRules, Fields};

/// Customizes field rules and payloads for models.
///
/// Every method defaults to passing its input through unchanged.
pub trait ModelHook: Send + Sync {
    /// Adjusts the fillable list.
    fn fillable(&self, _model: &str, fillable: Vec<String>) -> Vec<String> {
        fillable
    }

    /// Adjusts the guard list.
    fn guard(&self, _model: &str, guard: Vec<String>) -> Vec<String> {
        guard
    }

    /// Adjusts the format rules.
    fn format(&self, _model: &str, format: FormatRules) -> FormatRules {
        format
    }

    /// Observes the finished rules of a newly built record.
    fn constructed(&self, _model: &str, _rules: &FieldRules) {}

    /// Adjusts a payload after filtering and formatting.
    fn secure_fields(&self, _model: &str, fields: Fields) -> Fields {
        fields
    }
}

/// An ordered chain of hooks.
#[derive(Clone, Default)]
pub struct Hooks {
    chain: Vec<Arc<dyn ModelHook>>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("len", &self.chain.len())
            .finish()
    }
}

impl Hooks {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a hook.
    #[must_use]
    pub fn with(mut self, hook: Arc<dyn ModelHook>) -> Self {
        self.chain.push(hook);
        self
    }

    /// Appends a hook in place.
    pub fn register(&mut self, hook: Arc<dyn ModelHook>) {
        self.chain.push(hook);
    }

    /// Returns the number of registered hooks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Returns whether the chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Passes a model's rules through every hook, then announces them.
    #[must_use]
    pub fn construct(&self, model: &str, rules: FieldRules) -> FieldRules {
        if self.chain.is_empty() {
            return rules;
        }

        let mut fillable = rules.fillable().to_vec();
        let mut guard = rules.guard().to_vec();
        let mut format = rules.format().clone();
        for hook in &self.chain {
            fillable = hook.fillable(model, fillable);
            guard = hook.guard(model, guard);
            format = hook.format(model, format);
        }

        let rules = rules
            .with_fillable(fillable)
            .with_guard(guard)
            .with_format_rules(format);
        debug!(model, hooks = self.chain.len(), "Applied model hooks");

        for hook in &self.chain {
            hook.constructed(model, &rules);
        }
        rules
    }

    /// Passes a secured payload through every hook.
    #[must_use]
    pub fn secure_fields(&self, model: &str, fields: Fields) -> Fields {
        self.chain
            .iter()
            .fold(fields, |fields, hook| hook.secure_fields(model, fields))
    }
}
