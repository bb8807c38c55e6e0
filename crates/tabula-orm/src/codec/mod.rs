//! Decoding of stored compound values and dotted-path access into them.
//!
//! Columns may hold JSON text or the legacy serialized form. [`decode`]
//! turns either into a structured [`Value`]; [`resolve_path`] walks into
//! it, and [`apply_format`] rewrites nested values in place.

mod serialized;

use serde_json::{Map, Number, Value};
use tabula_sql::SqlValue;

use crate::format::Formatter;

/// Wildcard segment matching every child of an object or list.
pub const WILDCARD: &str = "*";

/// Decodes a stored string into structured data when it is JSON or the
/// legacy serialized form. Everything else is returned unchanged.
#[must_use]
pub fn decode(value: Value) -> Value {
    let Value::String(raw) = value else {
        return value;
    };

    let trimmed = raw.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(parsed) = serde_json::from_str::<Value>(&raw) {
            return parsed;
        }
    }

    serialized::parse(&raw).unwrap_or(Value::String(raw))
}

/// Converts a column value to JSON.
///
/// Blobs are read as UTF-8, replacing invalid sequences.
#[must_use]
pub fn sql_to_json(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Bool(b) => Value::Bool(*b),
        SqlValue::Int(n) => Value::from(*n),
        SqlValue::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        SqlValue::Text(s) => Value::String(s.clone()),
        SqlValue::Blob(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
    }
}

/// Splits a dotted path into its segments.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.')
}

/// Decodes `base` and walks the remaining path segments into it.
///
/// Objects are indexed by key and lists by position. A missing segment, a
/// null, or an empty string anywhere along the way yields `None`.
#[must_use]
pub fn resolve_path<'p, I>(base: Value, rest: I) -> Option<Value>
where
    I: IntoIterator<Item = &'p str>,
{
    if is_blank(&base) {
        return None;
    }
    let mut current = decode(base);
    for key in rest {
        current = child(&current, key)?.clone();
        if is_blank(&current) {
            return None;
        }
    }
    Some(current)
}

/// Resolves a full dotted path against a field map.
///
/// The first segment selects the field; the rest walk into its decoded
/// value.
#[must_use]
pub fn resolve_in(fields: &Map<String, Value>, path: &str) -> Option<Value> {
    let mut parts = segments(path);
    let first = parts.next()?;
    let base = fields.get(first)?.clone();
    resolve_path(base, parts)
}

/// Applies `formatter` to the value at `path` inside `fields`.
///
/// A `*` segment fans out over every non-null child of the object or list
/// at that point. A path whose prefix is missing or null leaves `fields`
/// untouched.
pub fn apply_format(fields: &mut Map<String, Value>, path: &str, formatter: &Formatter) {
    let parts: Vec<&str> = segments(path).collect();
    let mut root = Value::Object(std::mem::take(fields));
    format_at(&mut root, &parts, formatter);
    if let Value::Object(map) = root {
        *fields = map;
    }
}

fn format_at(target: &mut Value, path: &[&str], formatter: &Formatter) {
    let Some((head, rest)) = path.split_first() else {
        let value = std::mem::take(target);
        *target = formatter.apply(value);
        return;
    };

    if *head == WILDCARD {
        match target {
            Value::Object(map) => map
                .values_mut()
                .filter(|c| !c.is_null())
                .for_each(|c| format_at(c, rest, formatter)),
            Value::Array(list) => list
                .iter_mut()
                .filter(|c| !c.is_null())
                .for_each(|c| format_at(c, rest, formatter)),
            _ => {}
        }
        return;
    }

    if let Some(child) = child_mut(target, head) {
        if !child.is_null() {
            format_at(child, rest, formatter);
        }
    }
}

fn child<'v>(value: &'v Value, key: &str) -> Option<&'v Value> {
    match value {
        Value::Object(map) => map.get(key),
        Value::Array(list) => list.get(key.parse::<usize>().ok()?),
        _ => None,
    }
}

fn child_mut<'v>(value: &'v mut Value, key: &str) -> Option<&'v mut Value> {
    match value {
        Value::Object(map) => map.get_mut(key),
        Value::Array(list) => list.get_mut(key.parse::<usize>().ok()?),
        _ => None,
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn upper() -> Formatter {
        Formatter::new(|v| match v {
            Value::String(s) => Value::String(s.to_uppercase()),
            other => other,
        })
    }

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_decode() {
        assert_eq!(decode(json!(r#"{"a":1}"#)), json!({"a": 1}));
        assert_eq!(decode(json!(" [1,2]")), json!([1, 2]));
        assert_eq!(decode(json!(r#"a:1:{i:0;s:1:"x";}"#)), json!(["x"]));
        assert_eq!(decode(json!("plain")), json!("plain"));
        assert_eq!(decode(json!("{broken")), json!("{broken"));
        assert_eq!(decode(json!("42")), json!("42"));
        assert_eq!(decode(json!(42)), json!(42));
    }

    #[test]
    fn test_decode_keeps_raw_text_for_hostile_legacy_input() {
        let oversized = "a:99999999999999999:{}";
        assert_eq!(decode(json!(oversized)), json!(oversized));
    }

    #[test]
    fn test_sql_to_json() {
        assert_eq!(sql_to_json(&SqlValue::Int(3)), json!(3));
        assert_eq!(sql_to_json(&SqlValue::Text("x".into())), json!("x"));
        assert_eq!(sql_to_json(&SqlValue::Null), Value::Null);
        assert_eq!(sql_to_json(&SqlValue::Float(f64::NAN)), Value::Null);
        assert_eq!(sql_to_json(&SqlValue::Blob(b"ab".to_vec())), json!("ab"));
    }

    #[test]
    fn test_resolve_nested() {
        let data = fields(json!({
            "meta": r#"{"color":"red","sizes":["s","m"],"empty":""}"#,
            "title": "Hello",
        }));
        assert_eq!(resolve_in(&data, "meta.color"), Some(json!("red")));
        assert_eq!(resolve_in(&data, "meta.sizes.1"), Some(json!("m")));
        assert_eq!(resolve_in(&data, "title"), Some(json!("Hello")));
        assert_eq!(resolve_in(&data, "meta.missing"), None);
        assert_eq!(resolve_in(&data, "meta.empty"), None);
        assert_eq!(resolve_in(&data, "meta.sizes.9"), None);
        assert_eq!(resolve_in(&data, "title.x"), None);
        assert_eq!(resolve_in(&data, "nope"), None);
    }

    #[test]
    fn test_resolve_blank_base() {
        assert_eq!(resolve_path(json!(""), ["a"]), None);
        assert_eq!(resolve_path(Value::Null, []), None);
        assert_eq!(resolve_path(json!(0), []), Some(json!(0)));
    }

    #[test]
    fn test_resolve_does_not_decode_nested_strings() {
        let data = fields(json!({"meta": {"inner": r#"{"a":1}"#}}));
        assert_eq!(resolve_in(&data, "meta.inner.a"), None);
    }

    #[test]
    fn test_apply_format_paths() {
        let mut data = fields(json!({
            "title": "hello",
            "meta": {"color": "red", "size": "m"},
        }));
        apply_format(&mut data, "title", &upper());
        apply_format(&mut data, "meta.color", &upper());
        assert_eq!(
            Value::Object(data),
            json!({"title": "HELLO", "meta": {"color": "RED", "size": "m"}})
        );
    }

    #[test]
    fn test_apply_format_wildcard() {
        let mut data = fields(json!({
            "rows": [{"name": "a"}, null, {"name": "b"}, {"other": 1}],
            "tags": ["x", "y"],
        }));
        apply_format(&mut data, "rows.*.name", &upper());
        apply_format(&mut data, "tags.*", &upper());
        assert_eq!(
            Value::Object(data),
            json!({
                "rows": [{"name": "A"}, null, {"name": "B"}, {"other": 1}],
                "tags": ["X", "Y"],
            })
        );
    }

    #[test]
    fn test_apply_format_wildcard_over_object() {
        let mut data = fields(json!({"meta": {"a": "x", "b": null, "c": 3}}));
        let tag = Formatter::new(|v| Value::String(format!("seen:{v}")));
        apply_format(&mut data, "meta.*", &tag);
        assert_eq!(
            Value::Object(data),
            json!({"meta": {"a": "seen:\"x\"", "b": null, "c": "seen:3"}})
        );
    }

    #[test]
    fn test_apply_format_missing_prefix_is_noop() {
        let original = json!({"meta": null, "title": "x"});
        let mut data = fields(original.clone());
        apply_format(&mut data, "meta.color", &upper());
        apply_format(&mut data, "nothing.here", &upper());
        apply_format(&mut data, "title.*", &upper());
        assert_eq!(Value::Object(data), original);
    }
}
