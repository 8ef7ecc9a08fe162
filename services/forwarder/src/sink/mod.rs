//! Sink adapters: where drained batches go.
//!
//! The runner is generic over one capability: deliver a batch of opaque
//! log lines tagged with a kind. Returning `Ok` means the sink durably
//! accepted every item; any error leaves the whole batch in the buffer for
//! the next tick.

use std::future::Future;
use std::io::Write;

use hostlog_protocol::LogKind;
use thiserror::Error;

pub mod collector;
pub mod kinesis;

pub use collector::{CollectorConfig, CollectorSink};
pub use kinesis::KinesisSink;

/// Error type for sink operations.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Fatal at setup: the sink can never work as configured.
    #[error("sink misconfigured: {0}")]
    Config(String),
    /// Transient delivery failure; the batch is retained and retried.
    #[error("send failed: {0}")]
    Transient(String),
}

impl SinkError {
    pub fn is_config(&self) -> bool {
        matches!(self, SinkError::Config(_))
    }
}

/// A destination for drained log batches.
///
/// `send` consumes the batch; the caller never observes it afterwards,
/// success or not.
pub trait LogSink: Send + Sync + 'static {
    /// One-time initialization, possibly with network I/O (stream lookup,
    /// endpoint validation). A [`SinkError::Config`] here means the
    /// forwarder must not start against this sink.
    fn setup(&self) -> impl Future<Output = Result<(), SinkError>> + Send;

    /// Deliver every line of `batch`, all tagged `kind`.
    fn send(
        &self,
        batch: Vec<String>,
        kind: LogKind,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;
}

// ---------------------------------------------------------------------------
// Stderr fallback sink
// ---------------------------------------------------------------------------

/// Degraded-mode sink: writes every line to stderr.
///
/// Used when the configured sink fails initialization, so buffered entries
/// still drain locally instead of accumulating forever.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl LogSink for StderrSink {
    async fn setup(&self) -> Result<(), SinkError> {
        Ok(())
    }

    async fn send(&self, batch: Vec<String>, _kind: LogKind) -> Result<(), SinkError> {
        let stderr = std::io::stderr();
        let mut out = stderr.lock();
        for line in batch {
            writeln!(out, "{}", line).map_err(|e| SinkError::Transient(e.to_string()))?;
        }
        Ok(())
    }
}
