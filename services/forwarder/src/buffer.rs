//! The persistent buffer: a shared store pinned to the `logs` domain.
//!
//! The buffer is the rendezvous point between producer calls and the drain
//! task; there is no in-memory queue. Producers `put` through freshly
//! allocated keys, the drain task `scan`s, `get`s, and `delete`s.

use std::sync::Arc;

use crate::storage::{DOMAIN_LOGS, LogStore, StoreError};

/// Handle to the `logs` domain of the backing store. Cheap to clone.
#[derive(Clone)]
pub struct LogBuffer {
    store: Arc<dyn LogStore>,
}

impl LogBuffer {
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        LogBuffer { store }
    }

    /// Up to `limit` buffered keys in lexicographic order.
    pub fn scan(&self, limit: usize) -> Result<Vec<String>, StoreError> {
        self.store.scan_keys(DOMAIN_LOGS, limit)
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.store.get(DOMAIN_LOGS, key)
    }

    pub fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.store.put(DOMAIN_LOGS, key, value)
    }

    pub fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.store.delete(DOMAIN_LOGS, key)
    }
}
