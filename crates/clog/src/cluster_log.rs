//! ClusterLog: the admission, retention and exchange driver.
//!
//! Wraps one [`LogSummary`] and applies the configured retention and wire
//! features to it. Every mutator takes `&mut self`; callers that share a
//! `ClusterLog` between tasks wrap it in their own lock.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use clog_core::{Features, Fingerprint, LogEntry, LogEntryKey, LogSummary};

use crate::error::{ClusterLogError, Result};

/// Configuration for a [`ClusterLog`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterLogConfig {
    /// Entries retained per channel after a trim.
    pub max_entries_per_channel: usize,
    /// Wire features this node speaks.
    pub features: Features,
    /// Trim right after every admission instead of only on [`ClusterLog::trim`].
    pub prune_on_submit: bool,
}

impl Default for ClusterLogConfig {
    fn default() -> Self {
        Self {
            max_entries_per_channel: 50,
            features: Features::ALL,
            prune_on_submit: true,
        }
    }
}

impl ClusterLogConfig {
    /// Reject settings that would make the log useless.
    pub fn validate(&self) -> Result<()> {
        if self.max_entries_per_channel == 0 && self.prune_on_submit {
            return Err(ClusterLogError::InvalidConfig(
                "max_entries_per_channel is 0 with prune_on_submit: every entry would be dropped on admission".into(),
            ));
        }
        Ok(())
    }
}

/// Outcome of submitting one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Entry was appended under this global seq.
    Admitted { seq: u64 },
    /// An entry with the same identity is already retained.
    Duplicate,
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted { .. })
    }
}

/// Result of absorbing a peer's summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbsorbReport {
    /// Version the peer stamped on its summary.
    pub peer_version: u64,
    /// Entries present in the peer summary.
    pub received: usize,
    /// Entries that were new to us.
    pub admitted: usize,
    /// Entries we already had.
    pub duplicates: usize,
    /// Entries trimmed afterwards to stay within the cap.
    pub pruned: usize,
}

/// A node's cluster log.
#[derive(Debug, Clone)]
pub struct ClusterLog {
    config: ClusterLogConfig,
    summary: LogSummary,
}

impl ClusterLog {
    /// Create an empty log.
    pub fn new(config: ClusterLogConfig) -> Result<Self> {
        Self::from_summary(config, LogSummary::new())
    }

    /// Resume from an existing summary.
    pub fn from_summary(config: ClusterLogConfig, summary: LogSummary) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, summary })
    }

    /// Resume from a snapshot produced by [`ClusterLog::snapshot`].
    pub fn restore(config: ClusterLogConfig, bytes: &[u8]) -> Result<Self> {
        let summary = LogSummary::decode_from(bytes).map_err(|e| {
            tracing::warn!(error = %e, len = bytes.len(), "discarding unreadable snapshot");
            e
        })?;
        tracing::debug!(
            version = summary.version(),
            seq = summary.seq(),
            entries = summary.len(),
            "restored cluster log"
        );
        Self::from_summary(config, summary)
    }

    pub fn config(&self) -> &ClusterLogConfig {
        &self.config
    }

    pub fn summary(&self) -> &LogSummary {
        &self.summary
    }

    pub fn into_summary(self) -> LogSummary {
        self.summary
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Admission
    // ─────────────────────────────────────────────────────────────────────────

    /// Admit an entry unless its identity is already retained.
    pub fn submit(&mut self, entry: LogEntry) -> Admission {
        let admission = self.admit(entry);
        if admission.is_admitted() && self.config.prune_on_submit {
            self.trim();
        }
        admission
    }

    /// Submit entries in order and trim once at the end.
    ///
    /// Returns how many were admitted. An identity repeated within the batch
    /// is a duplicate even if a per-entry trim would have evicted it first.
    pub fn submit_all(&mut self, entries: impl IntoIterator<Item = LogEntry>) -> usize {
        let admitted = entries
            .into_iter()
            .map(|entry| self.admit(entry))
            .filter(Admission::is_admitted)
            .count();
        if admitted > 0 && self.config.prune_on_submit {
            self.trim();
        }
        admitted
    }

    fn admit(&mut self, entry: LogEntry) -> Admission {
        let key = entry.key();
        if self.summary.contains(&key) {
            tracing::trace!(origin = %key.origin(), seq = key.seq(), "duplicate entry skipped");
            return Admission::Duplicate;
        }
        let seq = self.summary.add(entry);
        tracing::trace!(origin = %key.origin(), seq, "admitted entry");
        Admission::Admitted { seq }
    }

    /// Enforce the per-channel cap. Returns how many entries were dropped.
    pub fn trim(&mut self) -> usize {
        let max = self.config.max_entries_per_channel;
        let removed = self.summary.prune(max);
        if removed > 0 {
            tracing::debug!(removed, max, "trimmed cluster log");
        }
        removed
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    pub fn contains(&self, key: &LogEntryKey) -> bool {
        self.summary.contains(key)
    }

    /// Retained entries across all channels in admission order.
    pub fn tail(&self) -> Vec<LogEntry> {
        self.summary.build_ordered_tail()
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.summary.fingerprint()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Persistence and exchange
    // ─────────────────────────────────────────────────────────────────────────

    /// Bump the version and encode with this node's features.
    pub fn snapshot(&mut self) -> Bytes {
        self.encode_with(self.config.features)
    }

    /// Bump the version and encode for a peer speaking `peer_features`.
    pub fn snapshot_for(&mut self, peer_features: Features) -> Bytes {
        self.encode_with(self.config.features & peer_features)
    }

    fn encode_with(&mut self, features: Features) -> Bytes {
        let version = self.summary.bump_version();
        let bytes = self.summary.encode_to_bytes(features);
        tracing::debug!(version, ?features, len = bytes.len(), "encoded cluster log");
        bytes
    }

    /// Merge a peer's encoded summary into ours.
    ///
    /// Entries are considered in the peer's global order and admitted only if
    /// their identity is new here, so replays and overlapping peers are
    /// harmless. With `prune_on_submit` set, the cap is enforced once after
    /// the whole peer tail is in; otherwise trimming is left to
    /// [`ClusterLog::trim`]. If the bytes do not decode, nothing changes
    /// locally.
    pub fn absorb(&mut self, bytes: &[u8]) -> Result<AbsorbReport> {
        let peer = LogSummary::decode_from(bytes).map_err(|e| {
            tracing::warn!(error = %e, len = bytes.len(), "rejected peer summary");
            e
        })?;

        let mut report = AbsorbReport {
            peer_version: peer.version(),
            ..AbsorbReport::default()
        };
        for (_, entry) in peer.ordered_tail() {
            report.received += 1;
            match self.admit(entry.clone()) {
                Admission::Admitted { .. } => report.admitted += 1,
                Admission::Duplicate => report.duplicates += 1,
            }
        }
        if report.admitted > 0 && self.config.prune_on_submit {
            report.pruned = self.trim();
        }

        tracing::info!(
            peer_version = report.peer_version,
            received = report.received,
            admitted = report.admitted,
            duplicates = report.duplicates,
            pruned = report.pruned,
            "absorbed peer summary"
        );
        Ok(report)
    }
}
