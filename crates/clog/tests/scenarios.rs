//! End-to-end behaviour of the cluster log across admission, retention and
//! exchange between nodes running different feature sets.

use clog::core::{CHANNEL_AUDIT, CHANNEL_CLUSTER};
use clog::{Admission, ClusterLog, ClusterLogConfig, CodecError, Features, LogSummary};
use clog_testkit::{cluster_fixtures, NodeFixture};

fn log_with(max: usize, features: Features) -> ClusterLog {
    ClusterLog::new(ClusterLogConfig {
        max_entries_per_channel: max,
        features,
        prune_on_submit: true,
    })
    .unwrap()
}

#[test]
fn tail_interleaves_channels_in_admission_order() {
    let mut node = NodeFixture::osd(0);
    let x = node.info("x");
    let y = node.audit("y");
    let z = node.info("z");

    let mut log = log_with(10, Features::ALL);
    for e in [x.clone(), y.clone(), z.clone()] {
        assert!(log.submit(e).is_admitted());
    }

    assert_eq!(log.tail(), vec![x, y, z]);
}

#[test]
fn prune_evicts_only_the_oldest_identity() {
    const N: usize = 4;
    let mut node = NodeFixture::mon(1);
    let entries = node.burst(N + 1);

    let mut summary = LogSummary::new();
    for e in &entries {
        summary.add(e.clone());
    }
    assert_eq!(summary.prune(N), 1);

    assert!(!summary.contains(&entries[0].key()));
    for e in &entries[1..] {
        assert!(summary.contains(&e.key()));
    }
}

#[test]
fn truncated_record_is_rejected_whole() {
    let mut node = NodeFixture::osd(2);
    let mut summary = LogSummary::new();
    for e in node.burst(3) {
        summary.add(e);
    }

    let bytes = summary.encode_to_bytes(Features::ALL);
    // Keep the header intact but cut into the last record.
    let cut = bytes.len() - 5;
    let err = LogSummary::decode_from(&bytes[..cut]).unwrap_err();
    assert!(matches!(err, CodecError::Truncated { .. }), "got {err:?}");
}

#[test]
fn resubmitting_after_eviction_readmits() {
    let mut node = NodeFixture::osd(3);
    let old = node.info("old");
    let mut log = log_with(1, Features::ALL);

    log.submit(old.clone());
    log.submit(node.info("new"));
    assert!(!log.contains(&old.key()));

    // Once evicted the identity is forgotten, so it can come back.
    assert!(matches!(log.submit(old.clone()), Admission::Admitted { .. }));
    assert!(log.contains(&old.key()));
}

#[test]
fn nodes_converge_after_exchanging_snapshots() {
    let mut nodes = cluster_fixtures(3);
    let mut logs: Vec<ClusterLog> = (0..3).map(|_| log_with(50, Features::ALL)).collect();

    // Every node logs locally, then everyone absorbs everyone else in a fixed order.
    for (node, log) in nodes.iter_mut().zip(logs.iter_mut()) {
        log.submit_all(node.burst(4));
        log.submit(node.audit("config change"));
    }

    let mut merged = log_with(50, Features::ALL);
    for log in &mut logs {
        merged.absorb(&log.snapshot()).unwrap();
    }
    let merged_bytes = merged.snapshot();

    let mut replicas: Vec<ClusterLog> = (0..3).map(|_| log_with(50, Features::ALL)).collect();
    for replica in &mut replicas {
        let report = replica.absorb(&merged_bytes).unwrap();
        assert_eq!(report.admitted, 15);
        assert_eq!(replica.fingerprint(), merged.fingerprint());
    }
}

#[test]
fn modern_node_feeds_legacy_node() {
    let mut osd = NodeFixture::osd(5);
    let mut modern = log_with(10, Features::ALL);
    let mut legacy = log_with(10, Features::NONE);

    modern.submit(osd.info("one"));
    modern.submit(osd.audit("two"));
    modern.submit(osd.warn("three"));

    let bytes = modern.snapshot_for(legacy.config().features);
    assert_eq!(bytes[0], 2, "legacy peers get the flat layout");

    let report = legacy.absorb(&bytes).unwrap();
    assert_eq!(report.admitted, 3);
    assert_eq!(legacy.fingerprint(), modern.fingerprint());
    assert_eq!(
        legacy.summary().channel(CHANNEL_AUDIT).map(|t| t.len()),
        Some(1)
    );
    assert_eq!(
        legacy.summary().channel(CHANNEL_CLUSTER).map(|t| t.len()),
        Some(2)
    );

    // And back again: the legacy node's snapshot is readable by the modern one.
    let echo = legacy.snapshot();
    let back = modern.absorb(&echo).unwrap();
    assert_eq!(back.admitted, 0);
    assert_eq!(back.duplicates, 3);
}

#[test]
fn absorb_respects_local_cap() {
    let mut osd = NodeFixture::osd(6);
    let mut big = log_with(20, Features::ALL);
    big.submit_all(osd.burst(12));

    let mut small = log_with(5, Features::ALL);
    let report = small.absorb(&big.snapshot()).unwrap();
    assert_eq!(report.received, 12);
    assert_eq!(report.admitted, 12);
    assert_eq!(report.pruned, 7);
    assert_eq!(small.tail(), big.tail()[7..].to_vec());
}

#[test]
fn dump_lists_channels_with_seqs() {
    let mut osd = NodeFixture::osd(7);
    let mut log = log_with(10, Features::ALL);
    log.submit(osd.info("a"));
    log.submit(osd.audit("b"));

    let dump = serde_json::to_value(log.summary()).unwrap();
    assert_eq!(dump["seq"], 2);
    assert_eq!(dump["channels"]["cluster"][0][0], 1);
    assert_eq!(dump["channels"]["audit"][0][0], 2);
    assert_eq!(dump["channels"]["audit"][0][1]["msg"], "b");
    assert_eq!(dump["channels"]["audit"][0][1]["severity"], "security");
}
