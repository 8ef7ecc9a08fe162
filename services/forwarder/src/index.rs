//! Buffer-key allocation for one forwarder instance.
//!
//! # Key shape
//! `<k>_<name>_<unixSeconds>_<seq>` where `<k>` is `r` (result) or `s`
//! (status), `<name>` is the instance name, and `<seq>` is a per-instance
//! counter starting at 1. The first byte alone determines the kind; the
//! `<k>_<name>_` prefix determines ownership, so several instances can
//! share the `logs` domain without draining each other's entries.
//!
//! The counter is not persisted. [`LogIndex::reseed`] lifts it above any
//! sequence numbers found in the startup scan, which closes the restart
//! collision window for backlogs the scan can see.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use hostlog_protocol::LogKind;

/// Monotone key allocator for a named forwarder instance.
///
/// Instance names must not contain `_` (enforced at config load) so that
/// key prefixes stay unambiguous.
pub struct LogIndex {
    name: String,
    counter: AtomicU64,
}

impl LogIndex {
    pub fn new(name: &str) -> Self {
        LogIndex {
            name: name.to_owned(),
            counter: AtomicU64::new(0),
        }
    }

    /// The instance name embedded in every allocated key.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Allocate a fresh buffer key for `kind`.
    ///
    /// Safe to call from any thread; each call observes a strictly larger
    /// sequence number than the one before it.
    pub fn next_key(&self, kind: LogKind) -> String {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}_{}_{}_{}", kind.tag(), self.name, unix_seconds(), seq)
    }

    /// Return the kind of `key` if this instance allocated it.
    pub fn owns(&self, key: &str) -> Option<LogKind> {
        let kind = LogKind::from_tag(key.chars().next()?)?;
        let rest = key.strip_prefix(kind.tag())?.strip_prefix('_')?;
        rest.strip_prefix(self.name.as_str())?.strip_prefix('_')?;
        Some(kind)
    }

    /// Lift the counter above the largest sequence number among `keys`
    /// that belong to this instance.
    ///
    /// Called once at setup with the recovery scan, before the first
    /// allocation, so fresh keys never overwrite surviving backlog.
    pub fn reseed<'a>(&self, keys: impl IntoIterator<Item = &'a str>) {
        let mut max_seq = 0;
        for key in keys {
            if self.owns(key).is_some() {
                if let Some(seq) = parse_seq(key) {
                    max_seq = max_seq.max(seq);
                }
            }
        }
        self.counter.fetch_max(max_seq, Ordering::Relaxed);
    }
}

/// The `<seq>` suffix of a buffer key.
fn parse_seq(key: &str) -> Option<u64> {
    key.rsplit('_').next()?.parse().ok()
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
