//! # Cluster Log Core
//!
//! Pure primitives for the cluster log: entries, the deduplicating summary,
//! and the versioned binary encoding used for persistence and peer exchange.
//!
//! This crate contains no I/O, no storage, no networking. Every operation is
//! synchronous computation over in-memory state.
//!
//! ## Key Types
//!
//! - [`LogEntry`] - A single cluster log record
//! - [`LogEntryKey`] - Identity of a record, used for deduplication
//! - [`LogSummary`] - Bounded per-channel tails plus a dedup index
//! - [`Features`] - Capability bitmask gating the wire format
//!
//! ## Encoding
//!
//! Every encoded struct is wrapped in a versioned envelope. See [`codec`].

pub mod codec;
pub mod entry;
pub mod error;
pub mod features;
pub mod summary;
pub mod types;

pub use codec::{from_bytes, to_bytes, Decode, Encode};
pub use entry::{
    parse_severity, LogEntry, LogEntryBuilder, LogEntryKey, Severity, CHANNEL_AUDIT, CHANNEL_CLUSTER,
    CHANNEL_DEFAULT, CHANNEL_NONE, CONFIG_DEFAULT_KEY,
};
pub use error::{CodecError, Result};
pub use features::Features;
pub use summary::{ChannelTail, Fingerprint, LogSummary, OrderedTail, MAX_COUNTER};
pub use types::{AddrKind, AddrVec, EntityAddr, EntityKind, EntityName, Origin, Timestamp};
