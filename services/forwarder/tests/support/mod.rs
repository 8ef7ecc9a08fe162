//! Shared helpers for forwarder integration tests.
#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use forwarder::buffer::LogBuffer;
use forwarder::index::LogIndex;
use forwarder::logger::{BufferedLogger, StaticDecorations};
use forwarder::runner::{ForwarderRunner, RunnerConfig};
use forwarder::sink::{LogSink, SinkError};
use forwarder::storage::{LogStore, MemoryStore};
use hostlog_protocol::LogKind;

// ---------------------------------------------------------------------------
// MockSink
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MockSinkInner {
    calls: Mutex<Vec<(Vec<String>, LogKind)>>,
    /// Scripted outcomes, consumed front-first; `true` = accept. When the
    /// script runs dry every send succeeds.
    script: Mutex<VecDeque<bool>>,
}

/// Recording sink with scriptable outcomes. Clones share state.
#[derive(Clone, Default)]
pub struct MockSink(Arc<MockSinkInner>);

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(outcomes: &[bool]) -> Self {
        let sink = Self::new();
        sink.push_outcomes(outcomes);
        sink
    }

    pub fn push_outcomes(&self, outcomes: &[bool]) {
        self.0.script.lock().unwrap().extend(outcomes.iter().copied());
    }

    pub fn calls(&self) -> Vec<(Vec<String>, LogKind)> {
        self.0.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.0.calls.lock().unwrap().len()
    }
}

impl LogSink for MockSink {
    async fn setup(&self) -> Result<(), SinkError> {
        Ok(())
    }

    async fn send(&self, batch: Vec<String>, kind: LogKind) -> Result<(), SinkError> {
        self.0.calls.lock().unwrap().push((batch, kind));
        let ok = self.0.script.lock().unwrap().pop_front().unwrap_or(true);
        if ok {
            Ok(())
        } else {
            Err(SinkError::Transient("scripted failure".to_owned()))
        }
    }
}

// ---------------------------------------------------------------------------
// Test rig: producer facade + manually-driven runner over one store
// ---------------------------------------------------------------------------

pub struct Rig {
    pub store: Arc<dyn LogStore>,
    pub logger: BufferedLogger<MockSink>,
    pub runner: ForwarderRunner<MockSink>,
}

pub fn rig(name: &str, config: RunnerConfig, sink: &MockSink) -> Rig {
    let store: Arc<dyn LogStore> = Arc::new(MemoryStore::new());
    rig_with_store(name, config, sink, store)
}

pub fn rig_with_store(
    name: &str,
    config: RunnerConfig,
    sink: &MockSink,
    store: Arc<dyn LogStore>,
) -> Rig {
    let logger = BufferedLogger::new(
        name,
        Arc::clone(&store),
        sink.clone(),
        Arc::new(StaticDecorations::new(BTreeMap::new())),
        config.clone(),
    );
    let runner = ForwarderRunner::new(
        Arc::new(LogIndex::new(name)),
        LogBuffer::new(Arc::clone(&store)),
        Arc::new(sink.clone()),
        config,
    );
    Rig {
        store,
        logger,
        runner,
    }
}
