/// Drain-cycle tests: flush, retry, batch cap, kind routing, and
/// success-gated deletion, driven one cycle at a time for determinism.
use forwarder::runner::RunnerConfig;
use forwarder::storage::{DOMAIN_LOGS, LogStore};
use hostlog_protocol::{LogKind, Severity, StatusLogLine};

mod support;
use support::{MockSink, rig};

fn config(max_batch: usize) -> RunnerConfig {
    RunnerConfig {
        max_batch,
        ..RunnerConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Basic flush
// ---------------------------------------------------------------------------

/// Test: a buffered line is sent once; an empty buffer makes no sink call.
#[tokio::test]
async fn basic_flush_sends_once_and_goes_quiet() {
    let sink = MockSink::new();
    let r = rig("mock", config(1024), &sink);

    r.logger.log_string("foo").unwrap();
    r.runner.drain_once().await;
    assert_eq!(
        sink.calls(),
        vec![(vec!["foo".to_owned()], LogKind::Result)]
    );

    r.runner.drain_once().await;
    assert_eq!(sink.call_count(), 1, "empty buffer must make no sink call");

    r.logger.log_string("bar").unwrap();
    r.logger.log_string("baz").unwrap();
    r.runner.drain_once().await;
    assert_eq!(sink.call_count(), 2);
    assert_eq!(
        sink.calls()[1],
        (
            vec!["bar".to_owned(), "baz".to_owned()],
            LogKind::Result
        )
    );

    r.runner.drain_once().await;
    assert_eq!(sink.call_count(), 2);
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

/// Test: a failed batch is retained verbatim and retried, picking up new
/// entries on the next tick.
#[tokio::test]
async fn failed_batch_is_retried_with_new_entries_appended() {
    let sink = MockSink::scripted(&[false, false, true]);
    let r = rig("mock", config(1024), &sink);

    r.logger.log_string("foo").unwrap();
    r.runner.drain_once().await;
    r.runner.drain_once().await;
    assert_eq!(sink.call_count(), 2);
    assert_eq!(sink.calls()[1].0, vec!["foo".to_owned()]);

    r.logger.log_string("bar").unwrap();
    r.runner.drain_once().await;
    assert_eq!(sink.call_count(), 3);
    assert_eq!(
        sink.calls()[2].0,
        vec!["foo".to_owned(), "bar".to_owned()]
    );

    r.runner.drain_once().await;
    assert_eq!(sink.call_count(), 3, "delivered batch must not be re-sent");
}

// ---------------------------------------------------------------------------
// Batch cap
// ---------------------------------------------------------------------------

/// Test: max_batch=1 splits the backlog one entry per tick, retrying the
/// head until it is accepted.
#[tokio::test]
async fn batch_cap_of_one_drains_one_entry_per_tick() {
    let sink = MockSink::scripted(&[false, true, true, true]);
    let r = rig("mock", config(1), &sink);

    for line in ["foo", "bar", "baz"] {
        r.logger.log_string(line).unwrap();
    }

    r.runner.drain_once().await;
    r.runner.drain_once().await;
    r.runner.drain_once().await;
    r.runner.drain_once().await;

    let batches: Vec<Vec<String>> = sink.calls().into_iter().map(|(batch, _)| batch).collect();
    assert_eq!(
        batches,
        vec![
            vec!["foo".to_owned()],
            vec!["foo".to_owned()],
            vec!["bar".to_owned()],
            vec!["baz".to_owned()],
        ]
    );
}

/// Test: max_batch=2 groups two entries per tick.
#[tokio::test]
async fn batch_cap_of_two_groups_pairs() {
    let sink = MockSink::scripted(&[false, true, true]);
    let r = rig("mock", config(2), &sink);

    for line in ["foo", "bar", "baz"] {
        r.logger.log_string(line).unwrap();
    }

    r.runner.drain_once().await;
    r.runner.drain_once().await;
    r.runner.drain_once().await;

    let batches: Vec<Vec<String>> = sink.calls().into_iter().map(|(batch, _)| batch).collect();
    assert_eq!(
        batches,
        vec![
            vec!["foo".to_owned(), "bar".to_owned()],
            vec!["foo".to_owned(), "bar".to_owned()],
            vec!["baz".to_owned()],
        ]
    );
}

// ---------------------------------------------------------------------------
// Kind routing
// ---------------------------------------------------------------------------

/// Test: result and status entries flush as two independent batches of the
/// right kind within one drain cycle.
#[tokio::test]
async fn results_and_statuses_flush_as_separate_kinds() {
    let sink = MockSink::new();
    let r = rig("mock", config(1024), &sink);

    r.logger.log_string(r#"{"query":"x"}"#).unwrap();
    r.logger
        .log_status(&[StatusLogLine {
            severity: Severity::Warning,
            filename: "watcher.rs".to_owned(),
            line: 12,
            message: "worker restarted".to_owned(),
        }])
        .unwrap();

    r.runner.drain_once().await;

    let calls = sink.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].1, LogKind::Result);
    assert_eq!(calls[0].0, vec![r#"{"query":"x"}"#.to_owned()]);
    assert_eq!(calls[1].1, LogKind::Status);
    let status: serde_json::Value = serde_json::from_str(&calls[1].0[0]).unwrap();
    assert_eq!(status["severity"], 1);
    assert_eq!(status["message"], "worker restarted");
}

/// Test: a failing result batch does not block the status batch, and
/// deletion stays per-kind.
#[tokio::test]
async fn kinds_succeed_and_fail_independently() {
    // First drain: result send fails, status send succeeds.
    let sink = MockSink::scripted(&[false, true]);
    let r = rig("mock", config(1024), &sink);

    r.logger.log_string("result-line").unwrap();
    r.logger
        .log_status(&[StatusLogLine {
            severity: Severity::Info,
            filename: "main.rs".to_owned(),
            line: 1,
            message: "up".to_owned(),
        }])
        .unwrap();

    r.runner.drain_once().await;
    assert_eq!(sink.call_count(), 2);

    // Second drain: only the retained result batch is re-sent.
    r.runner.drain_once().await;
    let calls = sink.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[2].1, LogKind::Result);
    assert_eq!(calls[2].0, vec!["result-line".to_owned()]);
}

// ---------------------------------------------------------------------------
// Success-gated deletion
// ---------------------------------------------------------------------------

/// Test: keys stay buffered across failed sends and disappear only after
/// an accepted batch.
#[tokio::test]
async fn keys_are_deleted_only_after_accepted_send() {
    let sink = MockSink::scripted(&[false, true]);
    let r = rig("mock", config(1024), &sink);

    r.logger.log_string("foo").unwrap();
    r.runner.drain_once().await;
    assert_eq!(
        r.store.scan_keys(DOMAIN_LOGS, 16).unwrap().len(),
        1,
        "failed send must not delete the key"
    );

    r.runner.drain_once().await;
    assert!(
        r.store.scan_keys(DOMAIN_LOGS, 16).unwrap().is_empty(),
        "accepted send must clear the batch before the next drain"
    );
}

// ---------------------------------------------------------------------------
// Instance isolation
// ---------------------------------------------------------------------------

/// Test: a runner drains only keys carrying its own instance name, even
/// though the scan sees the whole domain.
#[tokio::test]
async fn runner_ignores_other_instances_sharing_the_domain() {
    let sink = MockSink::new();
    let r = rig("alpha", config(1024), &sink);

    r.logger.log_string("mine").unwrap();
    // Another instance's entry in the same domain.
    r.store
        .put(DOMAIN_LOGS, "r_beta_100_1", "theirs")
        .unwrap();

    r.runner.drain_once().await;

    assert_eq!(sink.call_count(), 1);
    assert_eq!(sink.calls()[0].0, vec!["mine".to_owned()]);
    let remaining = r.store.scan_keys(DOMAIN_LOGS, 16).unwrap();
    assert_eq!(remaining, vec!["r_beta_100_1".to_owned()]);
}

// ---------------------------------------------------------------------------
// Oversize handling
// ---------------------------------------------------------------------------

/// Test: an oversize value is dropped at drain time and its key is cleared
/// with the successful batch instead of being retried forever.
#[tokio::test]
async fn oversize_value_is_dropped_and_cleared_with_the_batch() {
    let sink = MockSink::new();
    let cfg = RunnerConfig {
        max_line_bytes: Some(8),
        ..RunnerConfig::default()
    };
    let r = rig("mock", cfg, &sink);

    r.logger.log_string("short").unwrap();
    r.logger
        .log_string("much much much too long for the cap")
        .unwrap();

    r.runner.drain_once().await;
    assert_eq!(sink.call_count(), 1);
    assert_eq!(sink.calls()[0].0, vec!["short".to_owned()]);
    assert!(r.store.scan_keys(DOMAIN_LOGS, 16).unwrap().is_empty());
}

/// Test: a batch where every value is oversize clears its keys without a
/// sink call.
#[tokio::test]
async fn all_oversize_batch_clears_without_sink_call() {
    let sink = MockSink::new();
    let cfg = RunnerConfig {
        max_line_bytes: Some(4),
        ..RunnerConfig::default()
    };
    let r = rig("mock", cfg, &sink);

    r.logger.log_string("too long").unwrap();
    r.runner.drain_once().await;

    assert_eq!(sink.call_count(), 0);
    assert!(r.store.scan_keys(DOMAIN_LOGS, 16).unwrap().is_empty());
}
