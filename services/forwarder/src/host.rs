//! Host identity.

/// Stable per-host identifier: the OS hostname, or a fixed fallback when
/// it cannot be read. Used as the Kinesis partition key.
pub fn host_identifier() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown-host".to_owned())
}
