// hostlog-protocol: Log record types and wire serialization.
//
// Shared between the producer-side logger facade and the sink adapters so
// that the buffered payloads and the collector request body agree on one
// schema.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Log kinds
// ---------------------------------------------------------------------------

/// The two classes of buffered log records.
///
/// The kind is encoded twice: as the first byte of every buffer key
/// (`'r'` / `'s'`) and as the `log_type` field of collector requests
/// (`"result"` / `"status"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogKind {
    /// Pre-serialized query result lines, buffered verbatim.
    Result,
    /// Internal status lines, rendered to JSON envelopes before buffering.
    Status,
}

impl LogKind {
    /// The `log_type` value sent to the collector.
    pub fn as_str(self) -> &'static str {
        match self {
            LogKind::Result => "result",
            LogKind::Status => "status",
        }
    }

    /// The single-byte key prefix tag.
    pub fn tag(self) -> char {
        match self {
            LogKind::Result => 'r',
            LogKind::Status => 's',
        }
    }

    /// Recover the kind from a buffer key's first byte.
    pub fn from_tag(tag: char) -> Option<Self> {
        match tag {
            'r' => Some(LogKind::Result),
            's' => Some(LogKind::Status),
            _ => None,
        }
    }
}

impl std::fmt::Display for LogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Status severity
// ---------------------------------------------------------------------------

/// Host log severity, serialized as its bare integer value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info = 0,
    Warning = 1,
    Error = 2,
    Fatal = 3,
}

impl Severity {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl Serialize for Severity {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.as_i32())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match i32::deserialize(deserializer)? {
            0 => Ok(Severity::Info),
            1 => Ok(Severity::Warning),
            2 => Ok(Severity::Error),
            3 => Ok(Severity::Fatal),
            other => Err(serde::de::Error::custom(format!(
                "unknown severity {}",
                other
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Status lines and envelopes
// ---------------------------------------------------------------------------

/// One internal status line as handed to the logger facade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLogLine {
    pub severity: Severity,
    /// Source file that emitted the line.
    pub filename: String,
    pub line: u64,
    pub message: String,
}

/// The JSON envelope a status line is buffered as.
///
/// Field order is the frozen wire order; `decorations` is present iff the
/// decoration map captured for the enclosing flush was non-empty.
#[derive(Debug, Serialize)]
struct StatusEnvelope<'a> {
    severity: Severity,
    filename: &'a str,
    line: u64,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    decorations: Option<&'a BTreeMap<String, String>>,
}

/// Render a status line plus its decoration snapshot to the canonical
/// single-line JSON string.
///
/// The output carries no trailing newline; serde_json writes none, and the
/// buffered value must match what the collector receives byte for byte.
pub fn status_envelope(
    line: &StatusLogLine,
    decorations: &BTreeMap<String, String>,
) -> Result<String, serde_json::Error> {
    let envelope = StatusEnvelope {
        severity: line.severity,
        filename: &line.filename,
        line: line.line,
        message: &line.message,
        decorations: (!decorations.is_empty()).then_some(decorations),
    };
    serde_json::to_string(&envelope)
}

// ---------------------------------------------------------------------------
// Collector request body
// ---------------------------------------------------------------------------

/// Body of one collector POST: all buffered lines of a single kind,
/// re-parsed into JSON values under `data`.
///
/// The response body is ignored; collectors that accept a batch without
/// echoing anything back (empty body) are treated as success based on the
/// HTTP status alone.
#[derive(Debug, Serialize, Deserialize)]
pub struct CollectorBody {
    /// Opaque enrollment bearer token identifying this host.
    pub node_key: String,
    /// `"result"` or `"status"`.
    pub log_type: String,
    pub data: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> StatusLogLine {
        StatusLogLine {
            severity: Severity::Info,
            filename: "scheduler.rs".to_owned(),
            line: 42,
            message: "query complete".to_owned(),
        }
    }

    #[test]
    fn envelope_has_exactly_four_keys_without_decorations() {
        let json = status_envelope(&line(), &BTreeMap::new()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 4);
        assert_eq!(obj["severity"], 0);
        assert_eq!(obj["filename"], "scheduler.rs");
        assert_eq!(obj["line"], 42);
        assert_eq!(obj["message"], "query complete");
    }

    #[test]
    fn envelope_nests_decorations_when_map_is_non_empty() {
        let mut decorations = BTreeMap::new();
        decorations.insert("host_uuid".to_owned(), "abc-123".to_owned());
        decorations.insert("env".to_owned(), "prod".to_owned());

        let json = status_envelope(&line(), &decorations).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 5);
        assert_eq!(obj["decorations"]["host_uuid"], "abc-123");
        assert_eq!(obj["decorations"]["env"], "prod");
    }

    #[test]
    fn envelope_has_no_trailing_newline() {
        let json = status_envelope(&line(), &BTreeMap::new()).unwrap();
        assert!(!json.ends_with('\n'));
    }

    #[test]
    fn severity_serializes_as_bare_integer() {
        assert_eq!(serde_json::to_string(&Severity::Warning).unwrap(), "1");
        assert_eq!(serde_json::to_string(&Severity::Fatal).unwrap(), "3");
        let parsed: Severity = serde_json::from_str("2").unwrap();
        assert_eq!(parsed, Severity::Error);
    }

    #[test]
    fn kind_tags_round_trip() {
        assert_eq!(LogKind::from_tag('r'), Some(LogKind::Result));
        assert_eq!(LogKind::from_tag('s'), Some(LogKind::Status));
        assert_eq!(LogKind::from_tag('x'), None);
        assert_eq!(LogKind::Result.as_str(), "result");
        assert_eq!(LogKind::Status.tag(), 's');
    }

    #[test]
    fn collector_body_shape_matches_wire_schema() {
        let body = CollectorBody {
            node_key: "secret".to_owned(),
            log_type: LogKind::Result.as_str().to_owned(),
            data: vec![serde_json::json!({"a": 1}), serde_json::json!({"a": 2})],
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["node_key"], "secret");
        assert_eq!(value["log_type"], "result");
        assert_eq!(value["data"], serde_json::json!([{"a": 1}, {"a": 2}]));
    }
}
