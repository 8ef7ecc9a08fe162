// forwarder: Buffers host log records locally and drains them to a
// remote sink (HTTPS collector or Kinesis stream).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use hostlog_protocol::{Severity, StatusLogLine};
use tracing::{info, warn};

use forwarder::config::{ForwarderConfig, SinkKind, load_config};
use forwarder::host::host_identifier;
use forwarder::logger::{BufferedLogger, DecorationSource, StaticDecorations};
use forwarder::runner::RunnerConfig;
use forwarder::sink::{CollectorConfig, CollectorSink, KinesisSink, LogSink, StderrSink};
use forwarder::storage::{LogStore, SqliteStore};

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber for structured logging to stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "forwarder starting"
    );

    let cfg = match load_config() {
        Ok(cfg) => {
            info!(
                sink = cfg.sink.as_str(),
                instance = %cfg.instance_name,
                period_secs = cfg.drain.period_secs,
                "config loaded"
            );
            cfg
        }
        Err(e) => {
            eprintln!("FATAL: failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    let store: Arc<dyn LogStore> = match SqliteStore::open(Path::new(&cfg.buffer.sqlite_path)) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!(
                "FATAL: failed to open buffer store '{}': {}",
                cfg.buffer.sqlite_path, e
            );
            std::process::exit(1);
        }
    };

    let decorations: Arc<dyn DecorationSource> =
        Arc::new(StaticDecorations::new(cfg.decorations.clone()));
    let runner_cfg = RunnerConfig {
        period: Duration::from_secs(cfg.drain.period_secs),
        max_batch: cfg.drain.max_batch,
        // Only the collector enforces a per-line cap.
        max_line_bytes: match cfg.sink {
            SinkKind::Collector => Some(cfg.collector.max_line_bytes),
            SinkKind::Kinesis => None,
        },
    };

    let degraded = match cfg.sink {
        SinkKind::Collector => {
            let sink = CollectorSink::new(CollectorConfig {
                endpoint: cfg.collector.endpoint.clone(),
                node_key: cfg.collector.node_key.clone(),
                max_line_bytes: cfg.collector.max_line_bytes,
                compress: cfg.collector.compress,
            });
            run_logger(&cfg, Arc::clone(&store), sink, &decorations, &runner_cfg).await
        }
        SinkKind::Kinesis => {
            let sink = KinesisSink::new(&cfg.kinesis.stream, &host_identifier()).await;
            run_logger(&cfg, Arc::clone(&store), sink, &decorations, &runner_cfg).await
        }
    };

    // Degraded mode: the configured sink can never work; keep the engine
    // alive but drain to stderr so the backlog stays visible and bounded.
    if degraded {
        let runner_cfg = RunnerConfig {
            // Stderr has no line cap.
            max_line_bytes: None,
            ..runner_cfg
        };
        run_logger(&cfg, store, StderrSink, &decorations, &runner_cfg).await;
    }
}

/// Run the forwarder against one sink until ctrl-c.
///
/// Returns `true` when the sink refused to initialize and the caller
/// should fall back to stderr logging.
async fn run_logger<S: LogSink>(
    cfg: &ForwarderConfig,
    store: Arc<dyn LogStore>,
    sink: S,
    decorations: &Arc<dyn DecorationSource>,
    runner_cfg: &RunnerConfig,
) -> bool {
    let logger = BufferedLogger::new(
        &cfg.instance_name,
        store,
        sink,
        Arc::clone(decorations),
        runner_cfg.clone(),
    );

    let bootstrap = vec![StatusLogLine {
        severity: Severity::Info,
        filename: "main.rs".to_owned(),
        line: u64::from(line!()),
        message: format!("forwarder starting (pid {})", std::process::id()),
    }];

    let handle = match logger.setup(&bootstrap).await {
        Ok(handle) => handle,
        Err(e) if e.is_sink_config() => {
            warn!(error = %e, "sink unavailable, falling back to stderr logging");
            return true;
        }
        Err(e) => {
            eprintln!("FATAL: forwarder setup failed: {}", e);
            std::process::exit(1);
        }
    };

    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received, stopping runner");
    handle.stop().await;
    false
}
