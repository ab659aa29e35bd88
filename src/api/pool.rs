//! The per-run variable pool.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;
use thiserror::Error;

/// Returned when a write targets a name that is already in the pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Variable '{0}' already exists")]
pub struct VariableExists(pub String);

/// Append-only mapping from variable name to value, kept in write order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariablePool {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl VariablePool {
    /// Creates a pool holding only the initial input.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut pool = Self::default();
        pool.entries.push((key.into(), value.into()));
        pool.index.insert(pool.entries[0].0.clone(), 0);
        pool
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.index
            .get(key)
            .map(|&i| self.entries[i].1.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Adds a new variable. Existing variables are never replaced.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), VariableExists> {
        let key = key.into();
        if self.index.contains_key(&key) {
            return Err(VariableExists(key));
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, value.into()));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(name, value)` pairs in the order they were written.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Names in write order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl Serialize for VariablePool {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_pool_has_single_entry() {
        let pool = VariablePool::new("input", "hello");
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get("input"), Some("hello"));
        assert_eq!(pool.get("other"), None);
    }

    #[test]
    fn test_insert_never_overwrites() {
        let mut pool = VariablePool::new("input", "hello");
        pool.insert("draft", "first").unwrap();

        let err = pool.insert("draft", "second").unwrap_err();
        assert_eq!(err, VariableExists("draft".to_string()));
        assert_eq!(pool.get("draft"), Some("first"));

        let err = pool.insert("input", "again").unwrap_err();
        assert_eq!(err.0, "input");
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_iteration_follows_write_order() {
        let mut pool = VariablePool::new("zeta", "1");
        pool.insert("alpha", "2").unwrap();
        pool.insert("mid", "3").unwrap();

        let keys: Vec<&str> = pool.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_serializes_as_ordered_map() {
        let mut pool = VariablePool::new("topic", "rust");
        pool.insert("draft", "text").unwrap();

        let json = serde_json::to_string(&pool).unwrap();
        assert_eq!(json, r#"{"topic":"rust","draft":"text"}"#);
    }
}
