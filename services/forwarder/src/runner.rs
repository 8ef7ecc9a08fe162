//! The drain runner: one long-lived task per forwarder instance.
//!
//! # Drain cycle
//! 1. Scan up to `max_batch` keys (lexicographic = insertion order).
//! 2. Keep only this instance's keys; partition by the kind tag.
//! 3. Fetch values; oversize values (collector cap) are dropped but their
//!    keys stay scheduled for clearing.
//! 4. Send each non-empty partition; on success delete its keys, on
//!    failure leave everything for the next tick (the period is the
//!    backoff).
//!
//! Deletion is gated on sink success, so a crash between send and delete
//! re-sends the batch on the next run (at-least-once, duplicates allowed).
//! Delete failures are logged and ignored for the same reason.

use std::sync::Arc;
use std::time::Duration;

use hostlog_protocol::LogKind;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::buffer::LogBuffer;
use crate::index::LogIndex;
use crate::sink::LogSink;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Drain parameters, captured once at construction.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Time between drain cycles.
    pub period: Duration,
    /// Max entries per cycle.
    pub max_batch: usize,
    /// Per-value size cap applied at drain time; `None` for sinks without
    /// a line limit.
    pub max_line_bytes: Option<usize>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            period: Duration::from_secs(4),
            max_batch: 1024,
            max_line_bytes: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to a spawned runner. Stop is cooperative: a drain in progress
/// completes before the task exits.
pub struct RunnerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RunnerHandle {
    /// Signal the runner to stop and wait for it to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Periodically drains the buffer into a sink.
pub struct ForwarderRunner<S: LogSink> {
    index: Arc<LogIndex>,
    buffer: LogBuffer,
    sink: Arc<S>,
    config: RunnerConfig,
}

impl<S: LogSink> ForwarderRunner<S> {
    pub fn new(
        index: Arc<LogIndex>,
        buffer: LogBuffer,
        sink: Arc<S>,
        config: RunnerConfig,
    ) -> Self {
        ForwarderRunner {
            index,
            buffer,
            sink,
            config,
        }
    }

    /// Spawn the tick loop onto the runtime.
    pub fn spawn(self) -> RunnerHandle {
        let (shutdown, rx) = watch::channel(false);
        let task = tokio::spawn(self.run(rx));
        RunnerHandle { shutdown, task }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            instance = %self.index.name(),
            period_ms = self.config.period.as_millis() as u64,
            max_batch = self.config.max_batch,
            "forwarder runner started"
        );
        loop {
            if *shutdown.borrow() {
                break;
            }
            self.drain_once().await;

            tokio::select! {
                () = tokio::time::sleep(self.config.period) => {}
                changed = shutdown.changed() => {
                    // A closed channel means the handle was dropped; stop
                    // rather than spin.
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!(instance = %self.index.name(), "forwarder runner stopped");
    }

    /// Run a single drain cycle.
    pub async fn drain_once(&self) {
        let keys = match self.buffer.scan(self.config.max_batch) {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "buffer scan failed; skipping drain cycle");
                return;
            }
        };

        // Only this instance's entries; co-located forwarders sharing the
        // domain drain their own keys.
        let mut result_keys = Vec::new();
        let mut status_keys = Vec::new();
        for key in keys {
            match self.index.owns(&key) {
                Some(LogKind::Result) => result_keys.push(key),
                Some(LogKind::Status) => status_keys.push(key),
                None => {}
            }
        }

        self.flush(result_keys, LogKind::Result).await;
        self.flush(status_keys, LogKind::Status).await;
    }

    /// Send one kind's worth of entries and clear what was delivered.
    async fn flush(&self, keys: Vec<String>, kind: LogKind) {
        if keys.is_empty() {
            return;
        }

        // Keys whose value was fetched (or found gone, or dropped as
        // oversize) are cleared once the batch succeeds. Keys whose get
        // errored stay untouched for the next tick.
        let mut lines = Vec::with_capacity(keys.len());
        let mut done_keys = Vec::with_capacity(keys.len());
        for key in keys {
            match self.buffer.get(&key) {
                Ok(Some(value)) => {
                    if let Some(max) = self.config.max_line_bytes {
                        if value.len() > max {
                            warn!(key = %key, size = value.len(), max, "line exceeds sink max, dropping");
                            done_keys.push(key);
                            continue;
                        }
                    }
                    lines.push(value);
                    done_keys.push(key);
                }
                Ok(None) => done_keys.push(key),
                Err(e) => warn!(key = %key, error = %e, "could not read buffered entry"),
            }
        }

        if lines.is_empty() {
            // Every fetched value was dropped or already gone; nothing to
            // send, but the keys must not be retried forever.
            self.clear(&done_keys);
            return;
        }

        let flush_id = Uuid::new_v4();
        debug!(flush = %flush_id, log_type = %kind, lines = lines.len(), "sending batch");
        match self.sink.send(lines, kind).await {
            Ok(()) => self.clear(&done_keys),
            Err(e) => {
                warn!(flush = %flush_id, log_type = %kind, error = %e, "could not send logs to sink; batch retained");
            }
        }
    }

    fn clear(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.buffer.delete(key) {
                // Next drain re-sends the entry; a duplicate is harmless.
                warn!(key = %key, error = %e, "failed to clear sent entry");
            }
        }
    }
}
