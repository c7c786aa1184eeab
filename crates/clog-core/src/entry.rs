//! Log entries: the unit the cluster log retains and deduplicates.
//!
//! An entry is immutable once built. Its [`LogEntryKey`] is what peers compare
//! to decide whether they have already seen it.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;

use crate::codec::{self, Decode, Encode};
use crate::error::{CodecError, Result};
use crate::features::Features;
use crate::types::{AddrKind, AddrVec, EntityAddr, EntityKind, EntityName, Origin, Timestamp};

/// Channel entries land in when nothing else is configured.
pub const CHANNEL_DEFAULT: &str = "cluster";
/// Cluster-wide operational channel.
pub const CHANNEL_CLUSTER: &str = "cluster";
/// Audit trail of administrative commands.
pub const CHANNEL_AUDIT: &str = "audit";
/// Placeholder meaning "no channel".
pub const CHANNEL_NONE: &str = "none";

/// Key used in per-channel config strings for the fallback value,
/// e.g. `default=true audit=false`.
pub const CONFIG_DEFAULT_KEY: &str = "default";

/// Newest entry layout this build reads and writes.
const ENTRY_VERSION: u8 = 5;
/// Layout used for peers lacking [`Features::ENTRY_ADDRVEC`].
const ENTRY_LEGACY_VERSION: u8 = 4;
/// Oldest layout this build can still read.
const ENTRY_OLDEST_VERSION: u8 = 2;
/// Layout of a standalone [`LogEntryKey`].
const KEY_VERSION: u8 = 1;

/// How serious an entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i8)]
pub enum Severity {
    #[default]
    Debug = 0,
    Info = 1,
    Security = 2,
    Warn = 3,
    Error = 4,
    /// Sentinel for unparseable input. Never chosen by a caller on purpose.
    Unknown = -1,
}

impl Severity {
    /// Parse a severity name, case-insensitively.
    ///
    /// Anything unrecognised maps to [`Severity::Unknown`] rather than
    /// failing, so stale or hand-edited config strings keep working.
    pub fn parse(text: &str) -> Self {
        match text.to_ascii_lowercase().as_str() {
            "debug" | "dbg" => Self::Debug,
            "info" | "inf" => Self::Info,
            "sec" | "security" => Self::Security,
            "warn" | "warning" | "wrn" => Self::Warn,
            "error" | "err" => Self::Error,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Security => "security",
            Self::Warn => "warn",
            Self::Error => "err",
            Self::Unknown => "unknown",
        }
    }

    /// Bracketed three-letter tag used in rendered log lines.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Debug => "[DBG]",
            Self::Info => "[INF]",
            Self::Security => "[SEC]",
            Self::Warn => "[WRN]",
            Self::Error => "[ERR]",
            Self::Unknown => "[???]",
        }
    }

    /// Wire form: the signed value in a `u16`, so `Unknown` is `0xffff`.
    pub fn to_wire(self) -> u16 {
        (self as i8) as i16 as u16
    }

    /// Inverse of [`Severity::to_wire`]. Unrecognised values become `Unknown`.
    pub fn from_wire(value: u16) -> Self {
        match value as i16 {
            0 => Self::Debug,
            1 => Self::Info,
            2 => Self::Security,
            3 => Self::Warn,
            4 => Self::Error,
            _ => Self::Unknown,
        }
    }
}

/// Free-function form of [`Severity::parse`].
pub fn parse_severity(text: &str) -> Severity {
    Severity::parse(text)
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Identity of an entry: who logged it, when, and its sender-side seq.
///
/// Two keys are equal only if all three fields are. The hash mixes the
/// origin's stable hash with the seq.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LogEntryKey {
    origin: Origin,
    stamp: Timestamp,
    seq: u64,
}

impl LogEntryKey {
    pub const fn new(origin: Origin, stamp: Timestamp, seq: u64) -> Self {
        Self { origin, stamp, seq }
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn stamp(&self) -> Timestamp {
        self.stamp
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// The value fed to [`Hasher`]s.
    pub fn hash_value(&self) -> u64 {
        self.seq.wrapping_add(self.origin.stable_hash())
    }

    /// Canonical sample keys for round-trip and regression tests.
    pub fn test_instances() -> Vec<Self> {
        vec![
            Self::default(),
            Self::new(Origin::client(1234), Timestamp::new(1, 2), 34),
        ]
    }
}

impl Hash for LogEntryKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_value());
    }
}

impl Encode for LogEntryKey {
    fn encode(&self, buf: &mut BytesMut, features: Features) {
        codec::encode_envelope(buf, KEY_VERSION, KEY_VERSION, |buf| {
            self.origin.encode(buf, features);
            self.stamp.encode(buf, features);
            buf.put_u64_le(self.seq);
        });
    }
}

impl Decode for LogEntryKey {
    fn decode(buf: &mut Bytes) -> Result<Self> {
        codec::decode_envelope(buf, "LogEntryKey", KEY_VERSION, |_, buf| {
            let origin = Origin::decode(buf)?;
            let stamp = Timestamp::decode(buf)?;
            let seq = codec::get_u64(buf)?;
            Ok(Self { origin, stamp, seq })
        })
    }
}

/// A single cluster log entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct LogEntry {
    /// Configured name of the sender, e.g. `mon.a`.
    pub name: EntityName,
    /// Daemon instance that produced the entry.
    pub origin: Origin,
    /// Addresses of the sender.
    pub addrs: AddrVec,
    /// When the sender stamped the entry.
    pub stamp: Timestamp,
    /// Sender-assigned sequence number.
    pub seq: u64,
    pub severity: Severity,
    pub msg: String,
    /// Logical stream, e.g. [`CHANNEL_CLUSTER`] or [`CHANNEL_AUDIT`].
    pub channel: String,
}

impl LogEntry {
    /// Smallest possible encoding (an empty envelope), used to bound counts.
    pub const MIN_ENCODED_LEN: usize = codec::ENVELOPE_HEADER_LEN;

    /// The identity used for deduplication.
    pub fn key(&self) -> LogEntryKey {
        LogEntryKey::new(self.origin, self.stamp, self.seq)
    }

    /// Decode one entry that must span the whole input.
    pub fn decode_from(data: &[u8]) -> Result<Self> {
        codec::from_bytes(data)
    }

    /// Encode for a reader with the given features.
    pub fn encode_to_bytes(&self, features: Features) -> Bytes {
        codec::to_bytes(self, features)
    }

    /// Canonical sample entries for round-trip and regression tests.
    pub fn test_instances() -> Vec<Self> {
        let v1 = EntityAddr::new(AddrKind::Legacy, SocketAddr::from(([10, 0, 0, 3], 6800)), 4711);
        let v2 = EntityAddr::new(AddrKind::Msgr2, SocketAddr::from(([10, 0, 0, 3], 6801)), 4711);
        vec![
            Self::default(),
            LogEntryBuilder::new(Origin::osd(123), 1)
                .name(EntityName::new(EntityKind::OSD, "123"))
                .addrs(vec![v2, v1])
                .stamp(Timestamp::new(1, 2))
                .severity(Severity::Info)
                .message("hello world")
                .build(),
            LogEntryBuilder::new(Origin::client(4100), 77)
                .name(EntityName::new(EntityKind::CLIENT, "admin"))
                .addrs(vec![v2])
                .stamp(Timestamp::new(1_700_000_000, 500_000_000))
                .severity(Severity::Security)
                .message("from='client.admin' cmd='osd pool create'")
                .channel(CHANNEL_AUDIT)
                .build(),
            LogEntryBuilder::new(Origin::mon(0), 9)
                .severity(Severity::Unknown)
                .channel("")
                .build(),
        ]
    }

    fn encode_legacy(&self, buf: &mut BytesMut, features: Features) {
        self.origin.encode(buf, features);
        self.addrs.legacy_addr().encode_legacy(buf);
        self.stamp.encode(buf, features);
        buf.put_u64_le(self.seq);
        buf.put_u16_le(self.severity.to_wire());
        codec::put_str(buf, &self.msg);
        codec::put_str(buf, &self.channel);
        self.name.encode(buf, features);
    }

    fn decode_legacy(struct_v: u8, buf: &mut Bytes) -> Result<Self> {
        let origin = Origin::decode(buf)?;
        let addrs = AddrVec::from_legacy(EntityAddr::decode_legacy(buf)?);
        let stamp = Timestamp::decode(buf)?;
        let seq = codec::get_u64(buf)?;
        let severity = Severity::from_wire(codec::get_u16(buf)?);
        let msg = codec::get_string(buf)?;
        let channel = if struct_v >= 3 {
            codec::get_string(buf)?
        } else {
            CHANNEL_CLUSTER.to_string()
        };
        let name = if struct_v >= 4 {
            EntityName::decode(buf)?
        } else {
            EntityName::default()
        };
        Ok(Self {
            name,
            origin,
            addrs,
            stamp,
            seq,
            severity,
            msg,
            channel,
        })
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({}) {} : {} {} {}",
            self.stamp, self.name, self.origin, self.seq, self.channel, self.severity, self.msg
        )
    }
}

impl Encode for LogEntry {
    fn encode(&self, buf: &mut BytesMut, features: Features) {
        if !features.contains(Features::ENTRY_ADDRVEC) {
            codec::encode_envelope(buf, ENTRY_LEGACY_VERSION, ENTRY_OLDEST_VERSION, |buf| {
                self.encode_legacy(buf, features)
            });
            return;
        }

        codec::encode_envelope(buf, ENTRY_VERSION, ENTRY_VERSION, |buf| {
            self.name.encode(buf, features);
            self.origin.encode(buf, features);
            self.addrs.encode(buf, features);
            self.stamp.encode(buf, features);
            buf.put_u64_le(self.seq);
            buf.put_u16_le(self.severity.to_wire());
            codec::put_str(buf, &self.msg);
            codec::put_str(buf, &self.channel);
        });
    }
}

impl Decode for LogEntry {
    fn decode(buf: &mut Bytes) -> Result<Self> {
        codec::decode_envelope(buf, "LogEntry", ENTRY_VERSION, |struct_v, buf| {
            if struct_v < ENTRY_OLDEST_VERSION {
                return Err(CodecError::Malformed(format!(
                    "LogEntry struct version {struct_v} predates version {ENTRY_OLDEST_VERSION}"
                )));
            }
            if struct_v < ENTRY_VERSION {
                return Self::decode_legacy(struct_v, buf);
            }

            let name = EntityName::decode(buf)?;
            let origin = Origin::decode(buf)?;
            let addrs = AddrVec::decode(buf)?;
            let stamp = Timestamp::decode(buf)?;
            let seq = codec::get_u64(buf)?;
            let severity = Severity::from_wire(codec::get_u16(buf)?);
            let msg = codec::get_string(buf)?;
            let channel = codec::get_string(buf)?;
            Ok(Self {
                name,
                origin,
                addrs,
                stamp,
                seq,
                severity,
                msg,
                channel,
            })
        })
    }
}

/// Builder for log entries.
pub struct LogEntryBuilder {
    name: EntityName,
    origin: Origin,
    addrs: AddrVec,
    stamp: Timestamp,
    seq: u64,
    severity: Severity,
    msg: String,
    channel: String,
}

impl LogEntryBuilder {
    /// Start building an entry from `origin` with sender seq `seq`.
    ///
    /// The channel defaults to [`CHANNEL_DEFAULT`] and severity to `Info`.
    pub fn new(origin: Origin, seq: u64) -> Self {
        Self {
            name: EntityName::default(),
            origin,
            addrs: AddrVec::new(),
            stamp: Timestamp::default(),
            seq,
            severity: Severity::Info,
            msg: String::new(),
            channel: CHANNEL_DEFAULT.to_string(),
        }
    }

    pub fn name(mut self, name: EntityName) -> Self {
        self.name = name;
        self
    }

    pub fn addrs(mut self, addrs: impl Into<AddrVec>) -> Self {
        self.addrs = addrs.into();
        self
    }

    pub fn stamp(mut self, stamp: Timestamp) -> Self {
        self.stamp = stamp;
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.msg = msg.into();
        self
    }

    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn build(self) -> LogEntry {
        LogEntry {
            name: self.name,
            origin: self.origin,
            addrs: self.addrs,
            stamp: self.stamp,
            seq: self.seq,
            severity: self.severity,
            msg: self.msg,
            channel: self.channel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::from_bytes;
    use std::collections::HashSet;

    /// What a reader sees after a round trip at `features`.
    fn as_seen_with(entry: &LogEntry, features: Features) -> LogEntry {
        let mut expected = entry.clone();
        if !features.contains(Features::ENTRY_ADDRVEC) {
            expected.addrs = AddrVec::from_legacy(entry.addrs.legacy_addr());
        }
        expected
    }

    #[test]
    fn test_parse_severity() {
        assert_eq!(parse_severity("debug"), Severity::Debug);
        assert_eq!(parse_severity("INFO"), Severity::Info);
        assert_eq!(parse_severity("Sec"), Severity::Security);
        assert_eq!(parse_severity("security"), Severity::Security);
        assert_eq!(parse_severity("warn"), Severity::Warn);
        assert_eq!(parse_severity("WARNING"), Severity::Warn);
        assert_eq!(parse_severity("err"), Severity::Error);
        assert_eq!(parse_severity("Error"), Severity::Error);
        assert_eq!(parse_severity(""), Severity::Unknown);
        assert_eq!(parse_severity("fatal"), Severity::Unknown);
        assert_eq!(parse_severity(" info"), Severity::Unknown);
    }

    #[test]
    fn test_severity_names_parse_back() {
        for severity in [
            Severity::Debug,
            Severity::Info,
            Severity::Security,
            Severity::Warn,
            Severity::Error,
        ] {
            assert_eq!(Severity::parse(severity.as_str()), severity);
        }
        assert_eq!(Severity::parse(Severity::Unknown.as_str()), Severity::Unknown);
    }

    #[test]
    fn test_severity_wire() {
        assert_eq!(Severity::Unknown.to_wire(), 0xffff);
        assert_eq!(Severity::Error.to_wire(), 4);
        assert_eq!(Severity::from_wire(0xffff), Severity::Unknown);
        assert_eq!(Severity::from_wire(42), Severity::Unknown);
        assert_eq!(Severity::from_wire(Severity::Warn.to_wire()), Severity::Warn);
    }

    #[test]
    fn test_key_equality_covers_all_fields() {
        let base = LogEntryKey::new(Origin::osd(1), Timestamp::new(5, 0), 10);
        assert_eq!(base, LogEntryKey::new(Origin::osd(1), Timestamp::new(5, 0), 10));
        assert_ne!(base, LogEntryKey::new(Origin::osd(2), Timestamp::new(5, 0), 10));
        assert_ne!(base, LogEntryKey::new(Origin::osd(1), Timestamp::new(5, 1), 10));
        assert_ne!(base, LogEntryKey::new(Origin::osd(1), Timestamp::new(5, 0), 11));
    }

    #[test]
    fn test_key_hash_consistent_with_eq() {
        let a = LogEntryKey::new(Origin::mon(0), Timestamp::new(1, 2), 3);
        let b = LogEntryKey::new(Origin::mon(0), Timestamp::new(1, 2), 3);
        assert_eq!(a.hash_value(), b.hash_value());

        // Same hash, different stamp: still distinct set members.
        let c = LogEntryKey::new(Origin::mon(0), Timestamp::new(9, 9), 3);
        assert_eq!(a.hash_value(), c.hash_value());

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_key_roundtrip_all_features() {
        for features in Features::combinations() {
            for key in LogEntryKey::test_instances() {
                let bytes = codec::to_bytes(&key, features);
                let decoded: LogEntryKey = from_bytes(&bytes).unwrap();
                assert_eq!(decoded, key, "features {features:?}");
                assert_eq!(decoded.hash_value(), key.hash_value());
            }
        }
    }

    #[test]
    fn test_key_instances_are_distinct_set_members() {
        let keys = LogEntryKey::test_instances();
        let set: HashSet<_> = keys.iter().chain(keys.iter()).copied().collect();
        assert_eq!(set.len(), keys.len());
        for key in &keys {
            assert!(set.contains(key));
            assert_eq!(*key, LogEntryKey::new(key.origin(), key.stamp(), key.seq()));
        }
    }

    #[test]
    fn test_key_layout() {
        let key = &LogEntryKey::test_instances()[1];
        let bytes = codec::to_bytes(key, Features::ALL);
        assert_eq!(bytes.len(), codec::ENVELOPE_HEADER_LEN + Origin::ENCODED_LEN + Timestamp::ENCODED_LEN + 8);
        assert_eq!(&bytes[..2], &[1, 1]);
    }

    #[test]
    fn test_entry_key_derivation() {
        let entry = LogEntryBuilder::new(Origin::osd(7), 42)
            .stamp(Timestamp::new(100, 5))
            .build();
        assert_eq!(
            entry.key(),
            LogEntryKey::new(Origin::osd(7), Timestamp::new(100, 5), 42)
        );
    }

    #[test]
    fn test_entry_roundtrip_all_features() {
        for features in Features::combinations() {
            for entry in LogEntry::test_instances() {
                let bytes = entry.encode_to_bytes(features);
                let decoded = LogEntry::decode_from(&bytes).unwrap();
                assert_eq!(decoded, as_seen_with(&entry, features), "features {features:?}");
            }
        }
    }

    #[test]
    fn test_legacy_drops_non_legacy_addrs() {
        let entry = &LogEntry::test_instances()[2];
        let bytes = entry.encode_to_bytes(Features::NONE);
        let decoded = LogEntry::decode_from(&bytes).unwrap();

        assert!(decoded.addrs.is_empty());
        assert_eq!(decoded.name, entry.name);
        assert_eq!(decoded.channel, CHANNEL_AUDIT);
    }

    #[test]
    fn test_decode_v2_defaults() {
        let mut buf = BytesMut::new();
        codec::encode_envelope(&mut buf, 2, 2, |buf| {
            Origin::osd(5).encode(buf, Features::NONE);
            EntityAddr::BLANK.encode_legacy(buf);
            Timestamp::new(3, 4).encode(buf, Features::NONE);
            buf.put_u64_le(8);
            buf.put_u16_le(Severity::Warn.to_wire());
            codec::put_str(buf, "slow request");
        });

        let entry: LogEntry = from_bytes(&buf).unwrap();
        assert_eq!(entry.origin, Origin::osd(5));
        assert_eq!(entry.seq, 8);
        assert_eq!(entry.severity, Severity::Warn);
        assert_eq!(entry.msg, "slow request");
        assert_eq!(entry.channel, CHANNEL_CLUSTER);
        assert_eq!(entry.name, EntityName::default());
        assert!(entry.addrs.is_empty());
    }

    #[test]
    fn test_decode_v3_has_channel_but_no_name() {
        let mut buf = BytesMut::new();
        codec::encode_envelope(&mut buf, 3, 2, |buf| {
            Origin::mgr(1).encode(buf, Features::NONE);
            EntityAddr::BLANK.encode_legacy(buf);
            Timestamp::new(3, 4).encode(buf, Features::NONE);
            buf.put_u64_le(1);
            buf.put_u16_le(Severity::Info.to_wire());
            codec::put_str(buf, "module enabled");
            codec::put_str(buf, CHANNEL_AUDIT);
        });

        let entry: LogEntry = from_bytes(&buf).unwrap();
        assert_eq!(entry.channel, CHANNEL_AUDIT);
        assert_eq!(entry.name, EntityName::default());
    }

    #[test]
    fn test_decode_rejects_future_compat() {
        let mut buf = BytesMut::new();
        codec::encode_envelope(&mut buf, 7, 6, |_| {});

        let err = from_bytes::<LogEntry>(&buf).unwrap_err();
        assert!(matches!(
            err,
            CodecError::IncompatibleVersion { type_name: "LogEntry", compat: 6, supported: 5 }
        ));
    }

    #[test]
    fn test_decode_reads_newer_struct_with_old_compat() {
        let entry = &LogEntry::test_instances()[1];
        let mut buf = BytesMut::new();
        codec::encode_envelope(&mut buf, 6, 5, |buf| {
            let inner = entry.encode_to_bytes(Features::ALL);
            // Reuse the v5 payload and append a field this build ignores.
            buf.put_slice(&inner[codec::ENVELOPE_HEADER_LEN..]);
            codec::put_str(buf, "future field");
        });

        let decoded: LogEntry = from_bytes(&buf).unwrap();
        assert_eq!(&decoded, entry);
    }

    #[test]
    fn test_every_truncation_fails() {
        for features in Features::combinations() {
            let bytes = LogEntry::test_instances()[1].encode_to_bytes(features);
            for cut in 0..bytes.len() {
                assert!(
                    LogEntry::decode_from(&bytes[..cut]).is_err(),
                    "prefix of {cut} bytes decoded"
                );
            }
        }
    }

    #[test]
    fn test_display() {
        let entry = &LogEntry::test_instances()[1];
        assert_eq!(
            entry.to_string(),
            "1.000000 osd.123 (osd.123) 1 : cluster [INF] hello world"
        );
    }

    #[test]
    fn test_dump_fields() {
        let entry = &LogEntry::test_instances()[2];
        let dump = serde_json::to_value(entry).unwrap();

        assert_eq!(dump["name"], "client.admin");
        assert_eq!(dump["origin"], "client.4100");
        assert_eq!(dump["severity"], "security");
        assert_eq!(dump["channel"], "audit");
        assert_eq!(dump["addrs"][0], "v2:10.0.0.3:6801/4711");
    }
}
