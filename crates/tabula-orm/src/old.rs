//! Previously submitted form values kept across one redirect.
//!
//! After a failed submission the request layer stashes the payload in a
//! short-lived store and sets the [`OLD_FIELDS_COOKIE`] cookie to its
//! token. The next request loads the snapshot so dotted-path lookups can
//! prefer it over stored values.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::error::Result;
use crate::guard::Fields;

/// Cookie carrying the token of the old-fields snapshot.
pub const OLD_FIELDS_COOKIE: &str = "tr_old_fields";

/// A keyed store of short-lived snapshots.
pub trait TransientStore {
    /// Returns the snapshot for `token`, or `None` once it is gone.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing store cannot be read.
    fn get_transient(&self, token: &str) -> Result<Option<Fields>>;
}

#[derive(Debug, Clone)]
struct Entry {
    fields: Fields,
    expire_date: DateTime<Utc>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        Utc::now() > self.expire_date
    }
}

/// Process-local snapshot store with per-entry expiry.
#[derive(Debug, Default)]
pub struct MemoryTransientStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryTransientStore {
    /// Default lifetime of a snapshot in seconds.
    pub const DEFAULT_TTL_SECONDS: i64 = 60;

    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a snapshot for the default lifetime.
    pub fn put(&self, token: impl Into<String>, fields: Fields) {
        self.put_for(token, fields, Duration::seconds(Self::DEFAULT_TTL_SECONDS));
    }

    /// Stores a snapshot that expires after `ttl`.
    pub fn put_for(&self, token: impl Into<String>, fields: Fields, ttl: Duration) {
        let entry = Entry {
            fields,
            expire_date: Utc::now() + ttl,
        };
        self.write().insert(token.into(), entry);
    }

    /// Drops a snapshot.
    pub fn remove(&self, token: &str) {
        self.write().remove(token);
    }

    /// Drops every expired snapshot and returns how many went.
    pub fn clear_expired(&self) -> usize {
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        before - entries.len()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl TransientStore for MemoryTransientStore {
    fn get_transient(&self, token: &str) -> Result<Option<Fields>> {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let found = entries
            .get(token)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.fields.clone());
        if found.is_some() {
            debug!(token, "Loaded old fields snapshot");
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn snapshot() -> Fields {
        let Value::Object(fields) = json!({"title": "draft title"}) else {
            unreachable!()
        };
        fields
    }

    #[test]
    fn test_put_and_get() {
        let store = MemoryTransientStore::new();
        store.put("abc", snapshot());
        assert_eq!(store.get_transient("abc").unwrap(), Some(snapshot()));
        assert_eq!(store.get_transient("other").unwrap(), None);

        store.remove("abc");
        assert_eq!(store.get_transient("abc").unwrap(), None);
    }

    #[test]
    fn test_expired_entries_are_invisible() {
        let store = MemoryTransientStore::new();
        store.put_for("old", snapshot(), Duration::seconds(-1));
        store.put("fresh", snapshot());
        assert_eq!(store.get_transient("old").unwrap(), None);
        assert_eq!(store.clear_expired(), 1);
        assert!(store.get_transient("fresh").unwrap().is_some());
    }
}
