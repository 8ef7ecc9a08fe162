//! The producer-side logger facade.
//!
//! Producers hand result lines and status records to a [`BufferedLogger`];
//! everything goes through the key allocator into the persistent buffer,
//! and the spawned runner drains it from there. There is no in-memory
//! queue, so a crash after `log_string` returns never loses the entry.

use std::collections::BTreeMap;
use std::sync::Arc;

use hostlog_protocol::{LogKind, StatusLogLine, status_envelope};
use tracing::info;

use crate::buffer::LogBuffer;
use crate::index::LogIndex;
use crate::runner::{ForwarderRunner, RunnerConfig, RunnerHandle};
use crate::sink::{LogSink, SinkError};
use crate::storage::{LogStore, StoreError};

// ---------------------------------------------------------------------------
// Decorations
// ---------------------------------------------------------------------------

/// Source of host-level tags attached to every status envelope.
///
/// The map is snapshotted once per `log_status` call; all lines of one
/// call carry the same decorations.
pub trait DecorationSource: Send + Sync {
    fn decorations(&self) -> BTreeMap<String, String>;
}

/// Fixed decorations, e.g. from the `[decorations]` config table.
pub struct StaticDecorations(BTreeMap<String, String>);

impl StaticDecorations {
    pub fn new(map: BTreeMap<String, String>) -> Self {
        StaticDecorations(map)
    }
}

impl DecorationSource for StaticDecorations {
    fn decorations(&self) -> BTreeMap<String, String> {
        self.0.clone()
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Error type for `log_status`.
#[derive(Debug)]
pub enum LogStatusError {
    /// A status line could not be rendered to JSON; the call aborts, lines
    /// buffered before the failure stay buffered.
    Encoding(serde_json::Error),
    /// A buffer write failed.
    Storage(StoreError),
}

impl std::fmt::Display for LogStatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogStatusError::Encoding(e) => write!(f, "status encoding error: {}", e),
            LogStatusError::Storage(e) => write!(f, "status buffering error: {}", e),
        }
    }
}

impl std::error::Error for LogStatusError {}

/// Error type for `setup`.
#[derive(Debug)]
pub enum SetupError {
    /// The sink refused to initialize; the runner was not started.
    Sink(SinkError),
    /// The recovery scan failed.
    Storage(StoreError),
    /// The bootstrap status lines could not be buffered. The runner is
    /// already running at this point.
    Bootstrap(LogStatusError),
}

impl SetupError {
    /// True when falling back to stderr logging is the right response.
    pub fn is_sink_config(&self) -> bool {
        matches!(self, SetupError::Sink(e) if e.is_config())
    }
}

impl std::fmt::Display for SetupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetupError::Sink(e) => write!(f, "sink setup failed: {}", e),
            SetupError::Storage(e) => write!(f, "recovery scan failed: {}", e),
            SetupError::Bootstrap(e) => write!(f, "bootstrap status failed: {}", e),
        }
    }
}

impl std::error::Error for SetupError {}

// ---------------------------------------------------------------------------
// BufferedLogger
// ---------------------------------------------------------------------------

/// Facade binding an instance name, the shared buffer, and one sink.
pub struct BufferedLogger<S: LogSink> {
    index: Arc<LogIndex>,
    buffer: LogBuffer,
    sink: Arc<S>,
    decorations: Arc<dyn DecorationSource>,
    config: RunnerConfig,
}

impl<S: LogSink> BufferedLogger<S> {
    pub fn new(
        name: &str,
        store: Arc<dyn LogStore>,
        sink: S,
        decorations: Arc<dyn DecorationSource>,
        config: RunnerConfig,
    ) -> Self {
        BufferedLogger {
            index: Arc::new(LogIndex::new(name)),
            buffer: LogBuffer::new(store),
            sink: Arc::new(sink),
            decorations,
            config,
        }
    }

    /// Initialize the sink, recover the allocator from surviving backlog,
    /// start the drain runner, and buffer the bootstrap status lines.
    ///
    /// On a [`SetupError::Sink`] the runner is not started; the caller
    /// decides whether to degrade to stderr logging.
    pub async fn setup(&self, initial: &[StatusLogLine]) -> Result<RunnerHandle, SetupError> {
        self.sink.setup().await.map_err(SetupError::Sink)?;

        let backlog = self
            .buffer
            .scan(self.config.max_batch)
            .map_err(SetupError::Storage)?;
        self.index.reseed(backlog.iter().map(String::as_str));
        if !backlog.is_empty() {
            info!(
                instance = %self.index.name(),
                entries = backlog.len(),
                "recovered buffered backlog"
            );
        }

        let runner = ForwarderRunner::new(
            Arc::clone(&self.index),
            self.buffer.clone(),
            Arc::clone(&self.sink),
            self.config.clone(),
        );
        let handle = runner.spawn();

        self.log_status(initial).map_err(SetupError::Bootstrap)?;
        Ok(handle)
    }

    /// Buffer one pre-serialized result line.
    pub fn log_string(&self, s: &str) -> Result<(), StoreError> {
        let key = self.index.next_key(LogKind::Result);
        self.buffer.put(&key, s)
    }

    /// Render and buffer a batch of status lines.
    ///
    /// Returns on the first failure; earlier lines remain buffered
    /// (partial status is better than none).
    pub fn log_status(&self, lines: &[StatusLogLine]) -> Result<(), LogStatusError> {
        let decorations = self.decorations.decorations();
        for line in lines {
            let json = status_envelope(line, &decorations).map_err(LogStatusError::Encoding)?;
            let key = self.index.next_key(LogKind::Status);
            self.buffer.put(&key, &json).map_err(LogStatusError::Storage)?;
        }
        Ok(())
    }
}
