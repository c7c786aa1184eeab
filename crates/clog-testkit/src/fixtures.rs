//! Test fixtures and helpers.
//!
//! Simulated nodes for integration tests.

use clog_core::{
    EntityKind, EntityName, LogEntry, LogEntryBuilder, Origin, Severity, Timestamp, CHANNEL_AUDIT,
    CHANNEL_CLUSTER,
};

/// A simulated node that emits entries with increasing seqs and stamps.
#[derive(Debug, Clone)]
pub struct NodeFixture {
    pub origin: Origin,
    pub name: EntityName,
    next_seq: u64,
    clock: Timestamp,
}

impl NodeFixture {
    /// Create a fixture for `origin`, starting at seq 1 and the given clock.
    pub fn new(origin: Origin, name: EntityName, start: Timestamp) -> Self {
        Self {
            origin,
            name,
            next_seq: 1,
            clock: start,
        }
    }

    pub fn osd(num: i64) -> Self {
        Self::new(
            Origin::osd(num),
            EntityName::new(EntityKind::OSD, num.to_string()),
            Timestamp::new(1_700_000_000, 0),
        )
    }

    pub fn mon(num: i64) -> Self {
        Self::new(
            Origin::mon(num),
            EntityName::new(EntityKind::MON, num.to_string()),
            Timestamp::new(1_700_000_000, 0),
        )
    }

    /// Seq the next entry will carry.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Emit an entry on `channel`, advancing seq and clock.
    pub fn emit(&mut self, channel: &str, severity: Severity, msg: &str) -> LogEntry {
        let entry = LogEntryBuilder::new(self.origin, self.next_seq)
            .name(self.name.clone())
            .stamp(self.clock)
            .severity(severity)
            .message(msg)
            .channel(channel)
            .build();
        self.next_seq += 1;
        self.clock = Timestamp::new(self.clock.sec + 1, self.clock.nsec);
        entry
    }

    pub fn info(&mut self, msg: &str) -> LogEntry {
        self.emit(CHANNEL_CLUSTER, Severity::Info, msg)
    }

    pub fn warn(&mut self, msg: &str) -> LogEntry {
        self.emit(CHANNEL_CLUSTER, Severity::Warn, msg)
    }

    pub fn audit(&mut self, msg: &str) -> LogEntry {
        self.emit(CHANNEL_AUDIT, Severity::Security, msg)
    }

    /// Emit `count` info entries numbered from the current seq.
    pub fn burst(&mut self, count: usize) -> Vec<LogEntry> {
        (0..count)
            .map(|_| {
                let msg = format!("event {}", self.next_seq);
                self.info(&msg)
            })
            .collect()
    }
}

/// One OSD fixture per index, `osd.0` through `osd.{count - 1}`.
pub fn cluster_fixtures(count: usize) -> Vec<NodeFixture> {
    (0..count).map(|i| NodeFixture::osd(i as i64)).collect()
}
