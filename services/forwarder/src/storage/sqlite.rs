//! Durable SQLite store for buffered log entries.
//!
//! # SQLite durability settings
//! Applied at open: WAL, synchronous=FULL, wal_autocheckpoint=1000.
//! PRAGMA integrity_check runs at open; returns error if it fails.
//!
//! Entries written before a crash are recovered verbatim on the next open;
//! the drain loop re-sends them (at-least-once).

use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;

use super::kv::{LogStore, StoreError};

/// SQLite-backed [`LogStore`].
///
/// Operations are short single-row statements serialized behind a mutex;
/// producer puts and drain scans interleave at statement granularity.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the store at the given path.
    ///
    /// Applies PRAGMAs, runs `PRAGMA integrity_check`, and creates the
    /// schema if needed. Returns `Err` if integrity_check fails.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        apply_pragmas(&conn)?;
        run_integrity_check(&conn)?;
        apply_schema(&conn)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store; contents vanish on drop.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned lock means another thread panicked mid-statement; the
        // connection itself is still usable.
        self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl LogStore for SqliteStore {
    fn scan_keys(&self, domain: &str, limit: usize) -> Result<Vec<String>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT key FROM kv WHERE domain = ?1 ORDER BY key ASC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![domain, limit as i64], |row| row.get(0))?;
        let mut keys = Vec::new();
        for r in rows {
            keys.push(r?);
        }
        Ok(keys)
    }

    fn get(&self, domain: &str, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.lock();
        let value = conn
            .query_row(
                "SELECT value FROM kv WHERE domain = ?1 AND key = ?2",
                params![domain, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put(&self, domain: &str, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock().execute(
            "INSERT INTO kv (domain, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT (domain, key) DO UPDATE SET value = excluded.value",
            params![domain, key, value],
        )?;
        Ok(())
    }

    fn delete(&self, domain: &str, key: &str) -> Result<(), StoreError> {
        self.lock().execute(
            "DELETE FROM kv WHERE domain = ?1 AND key = ?2",
            params![domain, key],
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn apply_pragmas(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA synchronous=FULL;
         PRAGMA wal_autocheckpoint=1000;",
    )?;
    Ok(())
}

fn run_integrity_check(conn: &Connection) -> Result<(), StoreError> {
    let result: String = conn.pragma_query_value(None, "integrity_check", |row| row.get(0))?;
    if result != "ok" {
        return Err(StoreError::IntegrityCheckFailed(result));
    }
    Ok(())
}

fn apply_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(include_str!("schema.sql"))?;
    Ok(())
}
