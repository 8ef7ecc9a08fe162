//! Persistent key-value storage behind the log buffer.
//!
//! The buffer only needs four operations over a named domain; everything
//! else (schema, durability, locking) is the store's concern.

pub mod kv;
pub mod memory;
pub mod sqlite;

pub use kv::{DOMAIN_LOGS, LogStore, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
