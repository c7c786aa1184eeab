//! Proptest generators for property-based testing.
//!
//! The value spaces are deliberately narrow so that generated scripts hit
//! duplicate identities and shared channels often.

use proptest::prelude::*;

use clog_core::{
    EntityKind, LogEntry, LogEntryBuilder, LogSummary, Origin, Severity, Timestamp, CHANNEL_AUDIT,
    CHANNEL_CLUSTER, CHANNEL_NONE,
};

/// Generate an origin from a handful of daemons.
pub fn origin() -> impl Strategy<Value = Origin> {
    (
        prop_oneof![
            Just(EntityKind::MON),
            Just(EntityKind::OSD),
            Just(EntityKind::CLIENT),
            Just(EntityKind::MGR),
        ],
        0i64..4,
    )
        .prop_map(|(kind, num)| Origin::new(kind, num))
}

/// Generate a timestamp from a small window.
pub fn timestamp() -> impl Strategy<Value = Timestamp> {
    (0u32..4, prop_oneof![Just(0u32), Just(500_000_000u32)])
        .prop_map(|(sec, nsec)| Timestamp::new(sec, nsec))
}

/// Generate a severity, including the unknown sentinel.
pub fn severity() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::Debug),
        Just(Severity::Info),
        Just(Severity::Security),
        Just(Severity::Warn),
        Just(Severity::Error),
        Just(Severity::Unknown),
    ]
}

/// Generate a channel name.
pub fn channel() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => Just(CHANNEL_CLUSTER.to_string()),
        3 => Just(CHANNEL_AUDIT.to_string()),
        1 => Just(CHANNEL_NONE.to_string()),
        1 => "[a-z]{1,8}".prop_map(String::from),
    ]
}

/// Generate an entry whose identity often collides with others.
pub fn entry() -> impl Strategy<Value = LogEntry> {
    (origin(), timestamp(), 1u64..6, severity(), "[a-z ]{0,16}", channel()).prop_map(
        |(origin, stamp, seq, severity, msg, channel)| {
            LogEntryBuilder::new(origin, seq)
                .stamp(stamp)
                .severity(severity)
                .message(msg)
                .channel(channel)
                .build()
        },
    )
}

/// A sequence of submissions followed by a prune to `max_per_channel`.
#[derive(Debug, Clone)]
pub struct AdmissionScript {
    pub entries: Vec<LogEntry>,
    pub max_per_channel: usize,
}

impl Arbitrary for AdmissionScript {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (prop::collection::vec(entry(), 0..40), 0usize..6)
            .prop_map(|(entries, max_per_channel)| AdmissionScript {
                entries,
                max_per_channel,
            })
            .boxed()
    }
}

impl AdmissionScript {
    /// Admit every entry whose identity is not already retained.
    pub fn replay(&self) -> LogSummary {
        let mut summary = LogSummary::new();
        for entry in &self.entries {
            if !summary.contains(&entry.key()) {
                summary.add(entry.clone());
            }
        }
        summary
    }

    /// Add every entry, repeated identities included.
    ///
    /// Colliding keys land in the index more than once, possibly from
    /// different channels.
    pub fn replay_raw(&self) -> LogSummary {
        let mut summary = LogSummary::new();
        for entry in &self.entries {
            summary.add(entry.clone());
        }
        summary
    }
}
