//! AWS Kinesis sink.
//!
//! Every log line becomes one `PutRecord` with the host identifier as
//! partition key, so all records from one host land on one shard in
//! order. Setup lists the account's streams and refuses to start when the
//! configured stream is absent; the failure names the caller's access key
//! id to make cross-account misconfiguration diagnosable.

use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_kinesis::Client as KinesisClient;
use aws_sdk_kinesis::error::DisplayErrorContext;
use aws_sdk_kinesis::primitives::Blob;
use hostlog_protocol::LogKind;
use tracing::debug;

use super::{LogSink, SinkError};

/// [`LogSink`] putting one Kinesis record per log line.
pub struct KinesisSink {
    client: KinesisClient,
    sdk_config: SdkConfig,
    stream_name: String,
    partition_key: String,
}

impl KinesisSink {
    /// Build a sink from the ambient AWS configuration (environment,
    /// profile, instance metadata).
    pub async fn new(stream_name: &str, partition_key: &str) -> Self {
        let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let client = KinesisClient::new(&sdk_config);
        KinesisSink {
            client,
            sdk_config,
            stream_name: stream_name.to_owned(),
            partition_key: partition_key.to_owned(),
        }
    }

    /// The current access key id, for setup diagnostics.
    async fn caller_identity(&self) -> String {
        let Some(provider) = self.sdk_config.credentials_provider() else {
            return "<no credentials provider>".to_owned();
        };
        match provider.provide_credentials().await {
            Ok(credentials) => credentials.access_key_id().to_owned(),
            Err(e) => format!("<credentials unavailable: {}>", e),
        }
    }
}

impl LogSink for KinesisSink {
    async fn setup(&self) -> Result<(), SinkError> {
        if self.stream_name.is_empty() {
            return Err(SinkError::Config("kinesis stream is not set".to_owned()));
        }

        let streams = self
            .client
            .list_streams()
            .send()
            .await
            .map_err(|e| {
                SinkError::Config(format!(
                    "could not list kinesis streams: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        if !streams.stream_names().contains(&self.stream_name) {
            return Err(SinkError::Config(format!(
                "kinesis stream '{}' not found (caller access key id: {})",
                self.stream_name,
                self.caller_identity().await
            )));
        }
        Ok(())
    }

    async fn send(&self, batch: Vec<String>, kind: LogKind) -> Result<(), SinkError> {
        // One record per line; the first failure fails the whole batch and
        // the runner re-sends everything next tick (at-least-once).
        for line in batch {
            self.client
                .put_record()
                .stream_name(&self.stream_name)
                .partition_key(&self.partition_key)
                .data(Blob::new(line.into_bytes()))
                .send()
                .await
                .map_err(|e| SinkError::Transient(DisplayErrorContext(&e).to_string()))?;
        }
        debug!(log_type = %kind, stream = %self.stream_name, "kinesis accepted batch");
        Ok(())
    }
}
