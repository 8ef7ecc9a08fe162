//! HTTPS/JSON collector sink.
//!
//! One POST per batch. Each buffered line is re-parsed as JSON and placed
//! in the `data` array of the request body next to the enrollment
//! `node_key` and the batch `log_type`; see [`CollectorBody`].
//!
//! Lines over `max_line_bytes` are dropped with a warning, lines that are
//! not valid JSON are dropped quietly; both feed dead-letter counters so
//! the loss stays observable. Dropped lines count as delivered — their
//! keys are cleared with the batch, otherwise an impossible line would be
//! retried forever.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use flate2::Compression;
use flate2::write::GzEncoder;
use hostlog_protocol::{CollectorBody, LogKind};
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use tracing::{debug, warn};

use super::{LogSink, SinkError};

/// Configuration for the collector sink.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Collector URI, e.g. `https://collector.example.com/log`.
    pub endpoint: String,
    /// Enrollment bearer token, sent verbatim in every request body.
    pub node_key: String,
    /// Per-line size cap; larger lines are dropped, not sent.
    pub max_line_bytes: usize,
    /// GZip the request body.
    pub compress: bool,
}

/// [`LogSink`] posting batches to an HTTPS collector.
pub struct CollectorSink {
    client: reqwest::Client,
    config: CollectorConfig,
    dropped_oversize: AtomicU64,
    dropped_invalid: AtomicU64,
}

impl CollectorSink {
    pub fn new(config: CollectorConfig) -> Self {
        CollectorSink {
            client: reqwest::Client::new(),
            config,
            dropped_oversize: AtomicU64::new(0),
            dropped_invalid: AtomicU64::new(0),
        }
    }

    /// Dead-letter totals since construction: `(oversize, unparseable)`.
    pub fn dropped_counts(&self) -> (u64, u64) {
        (
            self.dropped_oversize.load(Ordering::Relaxed),
            self.dropped_invalid.load(Ordering::Relaxed),
        )
    }

    /// Re-parse the batch into the `data` array, dropping dead letters.
    fn collect_data(&self, batch: Vec<String>) -> Vec<serde_json::Value> {
        let mut data = Vec::with_capacity(batch.len());
        let mut oversize = 0u64;
        let mut invalid = 0u64;
        for line in batch {
            if line.len() > self.config.max_line_bytes {
                warn!(
                    size = line.len(),
                    max = self.config.max_line_bytes,
                    "line exceeds collector max, dropping"
                );
                oversize += 1;
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(value) => data.push(value),
                Err(_) => invalid += 1,
            }
        }
        if oversize > 0 || invalid > 0 {
            let oversize_total = self.dropped_oversize.fetch_add(oversize, Ordering::Relaxed) + oversize;
            let invalid_total = self.dropped_invalid.fetch_add(invalid, Ordering::Relaxed) + invalid;
            warn!(
                oversize,
                invalid, oversize_total, invalid_total, "dropped dead-letter lines from batch"
            );
        }
        data
    }
}

impl LogSink for CollectorSink {
    async fn setup(&self) -> Result<(), SinkError> {
        if self.config.endpoint.is_empty() {
            return Err(SinkError::Config("collector endpoint is not set".to_owned()));
        }
        reqwest::Url::parse(&self.config.endpoint).map_err(|e| {
            SinkError::Config(format!(
                "invalid collector endpoint '{}': {}",
                self.config.endpoint, e
            ))
        })?;
        if self.config.node_key.is_empty() {
            return Err(SinkError::Config(
                "node key is empty; host is not enrolled".to_owned(),
            ));
        }
        Ok(())
    }

    async fn send(&self, batch: Vec<String>, kind: LogKind) -> Result<(), SinkError> {
        let body = CollectorBody {
            node_key: self.config.node_key.clone(),
            log_type: kind.as_str().to_owned(),
            data: self.collect_data(batch),
        };
        let payload =
            serde_json::to_vec(&body).map_err(|e| SinkError::Transient(e.to_string()))?;

        let mut request = self
            .client
            .post(&self.config.endpoint)
            .header(CONTENT_TYPE, "application/json");
        if self.config.compress {
            request = request
                .header(CONTENT_ENCODING, "gzip")
                .body(gzip(&payload).map_err(|e| SinkError::Transient(e.to_string()))?);
        } else {
            request = request.body(payload);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SinkError::Transient(e.to_string()))?;

        // Only the status matters; some collectors accept a batch and
        // return an empty body.
        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Transient(format!(
                "collector returned {}",
                status
            )));
        }
        debug!(log_type = %kind, "collector accepted batch");
        Ok(())
    }
}

fn gzip(payload: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload)?;
    encoder.finish()
}
