/// Buffer-key format and monotonicity tests.
use forwarder::index::LogIndex;
use hostlog_protocol::LogKind;

/// Test: consecutive result allocations yield `r_mock_<digits>_1..3`.
#[test]
fn result_keys_match_the_frozen_shape() {
    let index = LogIndex::new("mock");

    for expected_seq in 1..=3 {
        let key = index.next_key(LogKind::Result);
        let parts: Vec<&str> = key.split('_').collect();
        assert_eq!(parts.len(), 4, "key must have four segments: {}", key);
        assert_eq!(parts[0], "r");
        assert_eq!(parts[1], "mock");
        assert!(
            !parts[2].is_empty() && parts[2].bytes().all(|b| b.is_ascii_digit()),
            "timestamp segment must be digits: {}",
            key
        );
        assert_eq!(parts[3], expected_seq.to_string());
    }
}

/// Test: the seq suffix is strictly increasing across kinds and callers.
#[test]
fn seq_is_strictly_increasing_across_kinds() {
    let index = LogIndex::new("mock");
    let mut last = 0u64;
    for i in 0..100 {
        let kind = if i % 2 == 0 {
            LogKind::Result
        } else {
            LogKind::Status
        };
        let key = index.next_key(kind);
        let seq: u64 = key.rsplit('_').next().unwrap().parse().unwrap();
        assert!(seq > last, "seq must strictly increase: {} after {}", seq, last);
        last = seq;
    }
}

/// Test: the first byte of the key determines the kind.
#[test]
fn first_byte_encodes_the_kind() {
    let index = LogIndex::new("mock");
    assert!(index.next_key(LogKind::Result).starts_with('r'));
    assert!(index.next_key(LogKind::Status).starts_with('s'));
}
