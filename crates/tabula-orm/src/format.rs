//! Value formatters and the registry of named built-ins.
//!
//! A formatter is a plain function value. Named formatters (`"dash"`,
//! `"plaintext"`, ...) are looked up once, when rules are configured, so a
//! misspelled name fails at startup instead of being skipped per request.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;

use crate::error::{OrmError, Result};

/// Signature shared by every formatter.
pub type FormatFn = dyn Fn(Value) -> Value + Send + Sync;

static HTML_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag pattern is valid"));
static NON_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("slug pattern is valid"));

/// A callable applied to one value.
#[derive(Clone)]
pub struct Formatter {
    name: Option<String>,
    func: Arc<FormatFn>,
}

impl Formatter {
    /// Wraps a function.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Self {
            name: None,
            func: Arc::new(func),
        }
    }

    /// Wraps a function under a registry name.
    pub fn named<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Self {
            name: Some(name.into()),
            func: Arc::new(func),
        }
    }

    /// Returns the registry name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Applies the formatter.
    #[must_use]
    pub fn apply(&self, value: Value) -> Value {
        (self.func)(value)
    }
}

impl fmt::Debug for Formatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Formatter")
            .field("name", &self.name.as_deref().unwrap_or("<fn>"))
            .finish()
    }
}

/// Ordered dotted-path to formatter rules.
#[derive(Debug, Clone, Default)]
pub struct FormatRules {
    rules: Vec<(String, Formatter)>,
}

impl FormatRules {
    /// Creates an empty rule set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule unless the path already has one.
    pub fn add(&mut self, path: impl Into<String>, formatter: Formatter) -> &mut Self {
        let path = path.into();
        if !self.contains(&path) {
            self.rules.push((path, formatter));
        }
        self
    }

    /// Removes the rule for a path.
    pub fn remove(&mut self, path: &str) -> &mut Self {
        self.rules.retain(|(p, _)| p != path);
        self
    }

    /// Returns whether a path has a rule.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.rules.iter().any(|(p, _)| p == path)
    }

    /// Iterates over `(path, formatter)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Formatter)> {
        self.rules.iter().map(|(p, f)| (p.as_str(), f))
    }

    /// Returns the number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns whether there are no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Named formatters available to configuration.
#[derive(Debug, Clone, Default)]
pub struct FormatterRegistry {
    entries: HashMap<String, Formatter>,
}

impl FormatterRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in sanitizers.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register(Formatter::named("trim", map_str(|s| s.trim().to_string())))
            .register(Formatter::named("plaintext", map_str(plaintext)))
            .register(Formatter::named("textarea", map_str(textarea)))
            .register(Formatter::named("attribute", map_str(attribute)))
            .register(Formatter::named("underscore", map_str(|s| slug(s, "_"))))
            .register(Formatter::named("dash", map_str(|s| slug(s, "-"))))
            .register(Formatter::named("int", int));
        registry
    }

    /// Adds or replaces a named formatter.
    ///
    /// Unnamed formatters are ignored.
    pub fn register(&mut self, formatter: Formatter) -> &mut Self {
        if let Some(name) = formatter.name() {
            self.entries.insert(name.to_string(), formatter);
        }
        self
    }

    /// Looks up a formatter by name.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::UnknownFormatter`] when nothing is registered
    /// under `name`.
    pub fn resolve(&self, name: &str) -> Result<Formatter> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| OrmError::UnknownFormatter(name.to_string()))
    }

    /// Returns whether a name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }
}

/// Lifts a string function to a formatter that leaves other values alone.
fn map_str<F>(f: F) -> impl Fn(Value) -> Value + Send + Sync + 'static
where
    F: Fn(&str) -> String + Send + Sync + 'static,
{
    move |value| match value {
        Value::String(s) => Value::String(f(&s)),
        other => other,
    }
}

fn plaintext(s: &str) -> String {
    HTML_TAGS.replace_all(s, "").trim().to_string()
}

fn textarea(s: &str) -> String {
    HTML_TAGS.replace_all(s, "").replace("\r\n", "\n")
}

fn attribute(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            c => out.push(c),
        }
    }
    out
}

fn slug(s: &str, separator: &str) -> String {
    let lower = s.trim().to_lowercase();
    NON_SLUG
        .replace_all(&lower, separator)
        .trim_matches(|c: char| separator.contains(c))
        .to_string()
}

fn int(value: Value) -> Value {
    let n = match &value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse::<f64>().map_or(0, |f| f.trunc() as i64),
        Value::Bool(b) => i64::from(*b),
        _ => 0,
    };
    Value::from(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(name: &str, value: Value) -> Value {
        FormatterRegistry::with_builtins()
            .resolve(name)
            .unwrap()
            .apply(value)
    }

    #[test]
    fn test_unknown_name_is_rejected() {
        let err = FormatterRegistry::with_builtins()
            .resolve("no_such_sanitizer")
            .unwrap_err();
        assert!(matches!(err, OrmError::UnknownFormatter(name) if name == "no_such_sanitizer"));
    }

    #[test]
    fn test_builtins() {
        assert_eq!(run("trim", json!("  x ")), json!("x"));
        assert_eq!(run("plaintext", json!(" <b>bold</b> text ")), json!("bold text"));
        assert_eq!(run("textarea", json!("a<br>\r\nb")), json!("a\nb"));
        assert_eq!(
            run("attribute", json!(r#"<a href="x">'"#)),
            json!("&lt;a href=&quot;x&quot;&gt;&#039;")
        );
        assert_eq!(run("underscore", json!(" Hello World! ")), json!("hello_world"));
        assert_eq!(run("dash", json!("Hello, World")), json!("hello-world"));
        assert_eq!(run("int", json!("42.9")), json!(42));
        assert_eq!(run("int", json!("abc")), json!(0));
    }

    #[test]
    fn test_string_formatters_skip_other_values() {
        assert_eq!(run("dash", json!(5)), json!(5));
        assert_eq!(run("plaintext", json!(null)), json!(null));
    }

    #[test]
    fn test_custom_registration() {
        let mut registry = FormatterRegistry::new();
        registry.register(Formatter::named("upper", |v: Value| match v {
            Value::String(s) => Value::String(s.to_uppercase()),
            other => other,
        }));
        assert!(registry.contains("upper"));
        assert_eq!(registry.resolve("upper").unwrap().apply(json!("a")), json!("A"));
    }

    #[test]
    fn test_rules_keep_first_formatter_per_path() {
        let mut rules = FormatRules::new();
        rules
            .add("title", Formatter::named("a", |v| v))
            .add("title", Formatter::named("b", |v| v))
            .add("slug", Formatter::named("c", |v| v));
        let names: Vec<_> = rules.iter().map(|(p, f)| (p, f.name())).collect();
        assert_eq!(names, vec![("title", Some("a")), ("slug", Some("c"))]);

        rules.remove("title");
        assert!(!rules.contains("title"));
        assert_eq!(rules.len(), 1);
    }
}
