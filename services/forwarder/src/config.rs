//! Forwarder configuration loading.
//!
//! TOML is the sole config source; no environment variable overrides.
//! Default config path: `/etc/hostlog/forwarder.toml`.
//!
//! # Required fields
//! - `schema_version = 1`
//! - `collector.endpoint` and `collector.node_key_file` when `sink = "collector"`
//! - `kinesis.stream` when `sink = "kinesis"`
//!
//! # Node key file format
//! Raw enrollment token on a single line; trimmed on read.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// Config types (deserialized from TOML)
// ---------------------------------------------------------------------------

/// Which sink adapter the forwarder drains into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Collector,
    Kinesis,
}

impl SinkKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SinkKind::Collector => "collector",
            SinkKind::Kinesis => "kinesis",
        }
    }
}

/// Top-level forwarder configuration.
#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    pub schema_version: u32,
    pub sink: SinkKind,
    /// Name embedded in every buffer key; lets several forwarder
    /// instances share one store without draining each other.
    pub instance_name: String,
    pub drain: DrainConfig,
    pub buffer: BufferConfig,
    pub collector: CollectorSection,
    pub kinesis: KinesisSection,
    /// Host-level tags attached to every status envelope.
    pub decorations: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct DrainConfig {
    pub period_secs: u64,
    pub max_batch: usize,
}

#[derive(Debug, Clone)]
pub struct BufferConfig {
    pub sqlite_path: String,
}

#[derive(Debug, Clone)]
pub struct CollectorSection {
    pub endpoint: String,
    /// The enrollment token (read from the node key file, not the path).
    pub node_key: String,
    pub max_line_bytes: usize,
    pub compress: bool,
}

#[derive(Debug, Clone)]
pub struct KinesisSection {
    pub stream: String,
}

// ---------------------------------------------------------------------------
// Raw TOML deserialization types (with Option for optional fields)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawConfig {
    schema_version: Option<u32>,
    sink: Option<String>,
    instance_name: Option<String>,
    forwarder: Option<RawDrainConfig>,
    buffer: Option<RawBufferConfig>,
    collector: Option<RawCollectorSection>,
    kinesis: Option<RawKinesisSection>,
    decorations: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct RawDrainConfig {
    period_secs: Option<u64>,
    max_batch: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawBufferConfig {
    sqlite_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCollectorSection {
    endpoint: Option<String>,
    node_key_file: Option<String>,
    max_line_bytes: Option<usize>,
    compress: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawKinesisSection {
    stream: Option<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Load forwarder config from a custom path.
pub fn load_config_from_path(path: &Path) -> Result<ForwarderConfig, ConfigError> {
    let toml_str = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("reading config file '{}': {}", path.display(), e)))?;
    load_config_from_str(&toml_str)
}

/// Load forwarder config from the default path `/etc/hostlog/forwarder.toml`.
pub fn load_config() -> Result<ForwarderConfig, ConfigError> {
    load_config_from_path(Path::new("/etc/hostlog/forwarder.toml"))
}

/// Load forwarder config from a TOML string.
pub fn load_config_from_str(toml_str: &str) -> Result<ForwarderConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;

    // Validate schema_version
    let schema_version = raw
        .schema_version
        .ok_or_else(|| ConfigError::MissingField("schema_version".to_owned()))?;
    if schema_version != 1 {
        return Err(ConfigError::InvalidValue(format!(
            "schema_version must be 1, got {}",
            schema_version
        )));
    }

    // Validate sink selection
    let sink = match raw.sink.as_deref() {
        None | Some("collector") => SinkKind::Collector,
        Some("kinesis") => SinkKind::Kinesis,
        Some(other) => {
            return Err(ConfigError::InvalidValue(format!(
                "sink must be \"collector\" or \"kinesis\", got \"{}\"",
                other
            )));
        }
    };

    // Instance name defaults to the sink name. Underscores are reserved as
    // the buffer-key separator.
    let instance_name = raw
        .instance_name
        .unwrap_or_else(|| sink.as_str().to_owned());
    if instance_name.is_empty() {
        return Err(ConfigError::InvalidValue(
            "instance_name must not be empty".to_owned(),
        ));
    }
    if instance_name.contains('_') {
        return Err(ConfigError::InvalidValue(format!(
            "instance_name must not contain '_', got \"{}\"",
            instance_name
        )));
    }

    // Drain defaults
    let drain = match raw.forwarder {
        Some(d) => DrainConfig {
            period_secs: d.period_secs.unwrap_or(4),
            max_batch: d.max_batch.unwrap_or(1024),
        },
        None => DrainConfig {
            period_secs: 4,
            max_batch: 1024,
        },
    };
    if drain.max_batch == 0 {
        return Err(ConfigError::InvalidValue(
            "forwarder.max_batch must be at least 1".to_owned(),
        ));
    }

    // Buffer defaults
    let buffer = match raw.buffer {
        Some(b) => BufferConfig {
            sqlite_path: b
                .sqlite_path
                .unwrap_or_else(|| "/var/lib/hostlog/buffer.sqlite3".to_owned()),
        },
        None => BufferConfig {
            sqlite_path: "/var/lib/hostlog/buffer.sqlite3".to_owned(),
        },
    };

    // Collector section; endpoint and node key file are only required when
    // the collector sink is selected.
    let raw_collector = raw.collector;
    let collector = if sink == SinkKind::Collector {
        let raw_collector =
            raw_collector.ok_or_else(|| ConfigError::MissingField("collector".to_owned()))?;
        let endpoint = raw_collector
            .endpoint
            .ok_or_else(|| ConfigError::MissingField("collector.endpoint".to_owned()))?;
        let node_key_file = raw_collector
            .node_key_file
            .ok_or_else(|| ConfigError::MissingField("collector.node_key_file".to_owned()))?;
        let node_key = read_node_key_file(&node_key_file)?;
        CollectorSection {
            endpoint,
            node_key,
            max_line_bytes: raw_collector.max_line_bytes.unwrap_or(1024 * 1024),
            compress: raw_collector.compress.unwrap_or(false),
        }
    } else {
        CollectorSection {
            endpoint: raw_collector
                .as_ref()
                .and_then(|c| c.endpoint.clone())
                .unwrap_or_default(),
            node_key: String::new(),
            max_line_bytes: raw_collector
                .as_ref()
                .and_then(|c| c.max_line_bytes)
                .unwrap_or(1024 * 1024),
            compress: raw_collector.and_then(|c| c.compress).unwrap_or(false),
        }
    };

    // Kinesis section
    let kinesis = if sink == SinkKind::Kinesis {
        let raw_kinesis = raw
            .kinesis
            .ok_or_else(|| ConfigError::MissingField("kinesis".to_owned()))?;
        KinesisSection {
            stream: raw_kinesis
                .stream
                .ok_or_else(|| ConfigError::MissingField("kinesis.stream".to_owned()))?,
        }
    } else {
        KinesisSection {
            stream: raw.kinesis.and_then(|k| k.stream).unwrap_or_default(),
        }
    };

    Ok(ForwarderConfig {
        schema_version,
        sink,
        instance_name,
        drain,
        buffer,
        collector,
        kinesis,
        decorations: raw.decorations.unwrap_or_default(),
    })
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    MissingField(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(s) => write!(f, "IO error: {}", s),
            ConfigError::Parse(s) => write!(f, "Parse error: {}", s),
            ConfigError::MissingField(s) => write!(f, "Missing required field: {}", s),
            ConfigError::InvalidValue(s) => write!(f, "Invalid config value: {}", s),
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Node key file reader
// ---------------------------------------------------------------------------

fn read_node_key_file(path: &str) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("reading node key file '{}': {}", path, e)))?;
    Ok(content.trim().to_owned())
}
