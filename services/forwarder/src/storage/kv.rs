//! The store interface consumed by the buffer.
//!
//! Keys within a domain enumerate in lexicographic order during scans; a
//! completed `put`/`delete` is visible to the next `scan`. A scan that
//! interleaves a concurrent `put` may or may not return the new key — the
//! drain cycle tolerates either.

/// The single domain all buffered log entries live in.
pub const DOMAIN_LOGS: &str = "logs";

/// Error type for store operations.
#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    IntegrityCheckFailed(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Sqlite(e) => write!(f, "SQLite error: {}", e),
            StoreError::IntegrityCheckFailed(s) => write!(f, "Integrity check failed: {}", s),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Sqlite(e)
    }
}

/// Minimal key-value surface over a named domain.
///
/// Implementations serialize their own operations; callers may share one
/// store across producer threads and the drain task.
pub trait LogStore: Send + Sync {
    /// Return up to `limit` keys of `domain` in lexicographic order.
    fn scan_keys(&self, domain: &str, limit: usize) -> Result<Vec<String>, StoreError>;

    /// Fetch the value for `key`, or `None` on a miss.
    fn get(&self, domain: &str, key: &str) -> Result<Option<String>, StoreError>;

    /// Insert or overwrite `key`.
    fn put(&self, domain: &str, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove `key`. Deleting an absent key is not an error.
    fn delete(&self, domain: &str, key: &str) -> Result<(), StoreError>;
}
