#![allow(dead_code)]

use std::sync::Once;

use serde_json::Value;
use tabula_orm::{Fields, FieldRules, FormatterRegistry, Model, SqliteDatabase};

static TRACING: Once = Once::new();

/// Routes log output through the test harness.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// An in-memory database with a `posts` table.
pub fn setup() -> SqliteDatabase {
    init_tracing();
    let mut db = SqliteDatabase::in_memory()
        .unwrap_or_else(|e| panic!("Failed to open in-memory database: {e}"));
    db.execute_raw(
        "CREATE TABLE posts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT,
            status TEXT,
            views INTEGER NOT NULL DEFAULT 0,
            role TEXT,
            meta TEXT
        )",
    )
    .unwrap_or_else(|e| panic!("Failed to create posts table: {e}"));
    db
}

/// Unwraps a JSON object literal into a field map.
pub fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        other => panic!("Expected an object, got {other:?}"),
    }
}

/// Posts accept a title, status, views and meta; `role` is guarded.
pub struct Post;

impl Model for Post {
    fn table_name() -> &'static str {
        "posts"
    }

    fn field_rules() -> FieldRules {
        let registry = FormatterRegistry::with_builtins();
        let mut rules = FieldRules::new()
            .with_fillable(["title", "status", "views", "meta"])
            .with_guard(["id", "role"])
            .with_builtin(["title", "status", "views"]);
        if let Ok(trim) = registry.resolve("trim") {
            rules.append_format("title", trim);
        }
        rules
    }
}
