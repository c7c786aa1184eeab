//! # Cluster Log
//!
//! Bounded, deduplicating retention of cluster log entries, with a versioned
//! encoding that lets nodes of different vintages exchange their tails.
//!
//! ## Overview
//!
//! - **Entries**: one record emitted by a node, identified by origin, stamp and seq
//! - **Channels**: named streams ("cluster", "audit", ...) each keeping a bounded tail
//! - **Summary**: the per-channel tails plus a dedup index over retained identities
//! - **Exchange**: snapshots encoded for a peer's features and absorbed on the other side
//!
//! ## Usage
//!
//! ```rust
//! use clog::{ClusterLog, ClusterLogConfig};
//! use clog::core::{LogEntryBuilder, Origin, Severity, Timestamp};
//!
//! let mut log = ClusterLog::new(ClusterLogConfig::default()).unwrap();
//!
//! let entry = LogEntryBuilder::new(Origin::osd(3), 1)
//!     .stamp(Timestamp::new(1_700_000_000, 0))
//!     .severity(Severity::Warn)
//!     .message("slow request")
//!     .build();
//! assert!(log.submit(entry.clone()).is_admitted());
//! assert!(!log.submit(entry).is_admitted());
//!
//! let bytes = log.snapshot();
//! let mut peer = ClusterLog::new(ClusterLogConfig::default()).unwrap();
//! peer.absorb(&bytes).unwrap();
//! assert_eq!(peer.fingerprint(), log.fingerprint());
//! ```
//!
//! ## Re-exports
//!
//! - `clog::core` - entries, summary and the wire codec

pub mod cluster_log;
pub mod error;

pub use clog_core as core;

pub use cluster_log::{AbsorbReport, Admission, ClusterLog, ClusterLogConfig};
pub use error::{ClusterLogError, Result};

pub use clog_core::{
    CodecError, Features, Fingerprint, LogEntry, LogEntryBuilder, LogEntryKey, LogSummary, Severity,
};
