//! In-memory store: a `BTreeMap` per domain, lexicographic scans for free.
//!
//! Used by tests and for volatile deployments that accept losing the
//! backlog on restart.

use std::collections::BTreeMap;
use std::sync::Mutex;

use super::kv::{LogStore, StoreError};

/// Ephemeral [`LogStore`] with the same scan ordering as the SQLite store.
#[derive(Default)]
pub struct MemoryStore {
    domains: Mutex<BTreeMap<String, BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, BTreeMap<String, String>>> {
        self.domains
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl LogStore for MemoryStore {
    fn scan_keys(&self, domain: &str, limit: usize) -> Result<Vec<String>, StoreError> {
        let domains = self.lock();
        let keys = match domains.get(domain) {
            Some(entries) => entries.keys().take(limit).cloned().collect(),
            None => Vec::new(),
        };
        Ok(keys)
    }

    fn get(&self, domain: &str, key: &str) -> Result<Option<String>, StoreError> {
        let domains = self.lock();
        Ok(domains.get(domain).and_then(|entries| entries.get(key)).cloned())
    }

    fn put(&self, domain: &str, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock()
            .entry(domain.to_owned())
            .or_default()
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn delete(&self, domain: &str, key: &str) -> Result<(), StoreError> {
        if let Some(entries) = self.lock().get_mut(domain) {
            entries.remove(key);
        }
        Ok(())
    }
}
