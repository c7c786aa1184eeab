//! LogSummary: bounded per-channel tails plus a dedup index.
//!
//! Every admitted entry gets the next value of a single global seq, shared by
//! all channels. Each channel's tail is therefore already sorted by that seq,
//! and a merged, globally ordered view is a k-way merge of the tails.
//!
//! The index is reference counted: a key stays present while at least one
//! retained entry carries it, even if the same identity was admitted on two
//! channels and one copy has since been pruned.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Serialize, Serializer};
use std::cmp::Reverse;
use std::collections::{btree_map, vec_deque, BTreeMap, BinaryHeap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::iter::Peekable;

use crate::codec::{self, Decode, Encode};
use crate::entry::{LogEntry, LogEntryBuilder, LogEntryKey, Severity, CHANNEL_AUDIT, CHANNEL_CLUSTER};
use crate::error::{CodecError, Result};
use crate::features::Features;
use crate::types::{EntityKind, EntityName, Origin, Timestamp};

/// Newest summary layout this build reads and writes.
const SUMMARY_VERSION: u8 = 3;
/// Flat-tail layout used for peers lacking [`Features::SUMMARY_CHANNELS`].
const SUMMARY_LEGACY_VERSION: u8 = 2;

/// Largest `version` or global `seq` a decoded summary may carry.
///
/// Leaves 2^63 admissions of headroom so the counters never wrap.
pub const MAX_COUNTER: u64 = i64::MAX as u64;

/// A channel's retained entries, oldest first, each with its global seq.
pub type ChannelTail = VecDeque<(u64, LogEntry)>;

/// The retained cluster log.
///
/// Single-writer: callers sharing one summary across threads must serialize
/// `add`, `prune` and `encode` themselves.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LogSummary {
    version: u64,
    seq: u64,
    channels: BTreeMap<String, ChannelTail>,
    #[serde(skip)]
    keys: HashMap<LogEntryKey, usize>,
}

impl LogSummary {
    /// An empty summary: version 0, seq 0, no channels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from decoded parts, deriving the index from the entries.
    fn from_parts(version: u64, seq: u64, channels: BTreeMap<String, ChannelTail>) -> Self {
        let mut keys = HashMap::new();
        for (_, entry) in channels.values().flatten() {
            *keys.entry(entry.key()).or_insert(0) += 1;
        }
        Self {
            version,
            seq,
            channels,
            keys,
        }
    }

    /// Opaque freshness marker, round-tripped through encoding.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    /// Increment the version and return the new value.
    pub fn bump_version(&mut self) -> u64 {
        self.version = self.version.saturating_add(1);
        self.version
    }

    /// The last global seq handed out (0 if nothing was ever admitted).
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Admit an entry at the tail of its channel.
    ///
    /// Returns the global seq assigned to it. Duplicates are not rejected;
    /// check [`LogSummary::contains`] first to skip them. Decoding caps the
    /// starting seq at [`MAX_COUNTER`], so the counter cannot wrap.
    pub fn add(&mut self, entry: LogEntry) -> u64 {
        self.seq += 1;
        *self.keys.entry(entry.key()).or_insert(0) += 1;
        self.channels
            .entry(entry.channel.clone())
            .or_default()
            .push_back((self.seq, entry));
        self.seq
    }

    /// Drop the oldest entries of every channel longer than `max`.
    ///
    /// Returns how many entries were removed in total.
    pub fn prune(&mut self, max: usize) -> usize {
        let mut removed = 0;
        for tail in self.channels.values_mut() {
            while tail.len() > max {
                let Some((_, entry)) = tail.pop_front() else {
                    break;
                };
                release_key(&mut self.keys, &entry.key());
                removed += 1;
            }
        }
        removed
    }

    /// Whether an entry with this identity is currently retained.
    pub fn contains(&self, key: &LogEntryKey) -> bool {
        self.keys.contains_key(key)
    }

    /// A channel's retained entries, oldest first.
    pub fn channel(&self, name: &str) -> Option<&ChannelTail> {
        self.channels.get(name)
    }

    /// All channels in name order.
    pub fn channels(&self) -> btree_map::Iter<'_, String, ChannelTail> {
        self.channels.iter()
    }

    pub fn channel_names(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    /// Total retained entries across all channels.
    pub fn len(&self) -> usize {
        self.channels.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.values().all(VecDeque::is_empty)
    }

    /// Number of distinct identities in the index.
    pub fn distinct_keys(&self) -> usize {
        self.keys.len()
    }

    /// Lazily merge all channels into global seq order.
    pub fn ordered_tail(&self) -> OrderedTail<'_> {
        OrderedTail::new(&self.channels)
    }

    /// Every retained entry, oldest first across all channels.
    pub fn build_ordered_tail(&self) -> Vec<LogEntry> {
        self.ordered_tail().map(|(_, entry)| entry.clone()).collect()
    }

    /// Digest of the retained identities in global order.
    ///
    /// Local seqs are left out, so two peers that admitted the same entries in
    /// the same order agree even if their counters differ.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"clog-summary-v0:");
        for (_, entry) in self.ordered_tail() {
            let key = entry.key();
            hasher.update(&[key.origin().kind.0]);
            hasher.update(&key.origin().num.to_le_bytes());
            hasher.update(&key.stamp().sec.to_le_bytes());
            hasher.update(&key.stamp().nsec.to_le_bytes());
            hasher.update(&key.seq().to_le_bytes());
            hasher.update(&(entry.channel.len() as u64).to_le_bytes());
            hasher.update(entry.channel.as_bytes());
        }
        Fingerprint(*hasher.finalize().as_bytes())
    }

    /// Encode for a reader with the given features.
    pub fn encode_to_bytes(&self, features: Features) -> Bytes {
        codec::to_bytes(self, features)
    }

    /// Decode a summary that must span the whole input.
    pub fn decode_from(data: &[u8]) -> Result<Self> {
        codec::from_bytes(data)
    }

    /// Canonical sample summaries for round-trip and regression tests.
    pub fn test_instances() -> Vec<Self> {
        let mut populated = Self::new();
        for entry in LogEntry::test_instances().into_iter().skip(1) {
            populated.add(entry);
        }
        populated.set_version(3);

        let mut pruned = Self::new();
        let mon = EntityName::new(EntityKind::MON, "a");
        for i in 1..=6u64 {
            let channel = if i % 3 == 0 { CHANNEL_AUDIT } else { CHANNEL_CLUSTER };
            pruned.add(
                LogEntryBuilder::new(Origin::mon(0), i)
                    .name(mon.clone())
                    .stamp(Timestamp::new(1_000 + i as u32, 0))
                    .severity(if i % 2 == 0 { Severity::Warn } else { Severity::Info })
                    .message(format!("event {i}"))
                    .channel(channel)
                    .build(),
            );
        }
        pruned.prune(2);
        pruned.set_version(11);

        vec![Self::new(), populated, pruned]
    }
}

fn release_key(keys: &mut HashMap<LogEntryKey, usize>, key: &LogEntryKey) {
    if let Some(count) = keys.get_mut(key) {
        *count -= 1;
        if *count == 0 {
            keys.remove(key);
        }
    }
}

impl PartialEq for LogSummary {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version && self.seq == other.seq && self.channels == other.channels
    }
}

impl Eq for LogSummary {}

impl Encode for LogSummary {
    fn encode(&self, buf: &mut BytesMut, features: Features) {
        if !features.contains(Features::SUMMARY_CHANNELS) {
            codec::encode_envelope(buf, SUMMARY_LEGACY_VERSION, SUMMARY_LEGACY_VERSION, |buf| {
                buf.put_u64_le(self.version);
                let tail = self.ordered_tail();
                codec::put_count(buf, tail.len());
                for (_, entry) in tail {
                    entry.encode(buf, features);
                }
            });
            return;
        }

        codec::encode_envelope(buf, SUMMARY_VERSION, SUMMARY_VERSION, |buf| {
            buf.put_u64_le(self.version);
            buf.put_u64_le(self.seq);
            codec::put_count(buf, self.channels.len());
            for (name, tail) in &self.channels {
                codec::put_str(buf, name);
                codec::put_count(buf, tail.len());
                for (seq, entry) in tail {
                    buf.put_u64_le(*seq);
                    entry.encode(buf, features);
                }
            }
        });
    }
}

impl Decode for LogSummary {
    fn decode(buf: &mut Bytes) -> Result<Self> {
        codec::decode_envelope(buf, "LogSummary", SUMMARY_VERSION, |struct_v, buf| {
            if struct_v < SUMMARY_LEGACY_VERSION {
                return Err(CodecError::Malformed(format!(
                    "LogSummary struct version {struct_v} predates version {SUMMARY_LEGACY_VERSION}"
                )));
            }

            let version = get_counter(buf, "version")?;

            if struct_v < SUMMARY_VERSION {
                // Flat tail in global order: re-admit to rebuild channels.
                let tail: Vec<LogEntry> = codec::get_seq(buf, LogEntry::MIN_ENCODED_LEN)?;
                let mut summary = Self::new();
                summary.version = version;
                for entry in tail {
                    summary.add(entry);
                }
                return Ok(summary);
            }

            let seq = get_counter(buf, "seq")?;
            let channel_count = codec::get_count(buf, 8)?;
            let mut channels = BTreeMap::new();
            let mut assigned = HashSet::new();

            for _ in 0..channel_count {
                let name = codec::get_string(buf)?;
                let count = codec::get_count(buf, 8 + LogEntry::MIN_ENCODED_LEN)?;
                let mut tail = VecDeque::with_capacity(count);
                let mut last = 0u64;

                for _ in 0..count {
                    let entry_seq = codec::get_u64(buf)?;
                    if entry_seq <= last {
                        return Err(CodecError::Malformed(format!(
                            "channel {name:?}: seq {entry_seq} does not follow {last}"
                        )));
                    }
                    if entry_seq > seq {
                        return Err(CodecError::Malformed(format!(
                            "channel {name:?}: seq {entry_seq} beyond summary seq {seq}"
                        )));
                    }
                    if !assigned.insert(entry_seq) {
                        return Err(CodecError::Malformed(format!(
                            "seq {entry_seq} assigned twice"
                        )));
                    }
                    let entry = LogEntry::decode(buf)?;
                    if entry.channel != name {
                        return Err(CodecError::Malformed(format!(
                            "entry of channel {:?} stored under {name:?}",
                            entry.channel
                        )));
                    }
                    tail.push_back((entry_seq, entry));
                    last = entry_seq;
                }

                if channels.insert(name, tail).is_some() {
                    return Err(CodecError::Malformed("duplicate channel".into()));
                }
            }

            Ok(Self::from_parts(version, seq, channels))
        })
    }
}

fn get_counter(buf: &mut Bytes, field: &str) -> Result<u64> {
    let value = codec::get_u64(buf)?;
    if value > MAX_COUNTER {
        return Err(CodecError::Malformed(format!(
            "summary {field} {value} exceeds {MAX_COUNTER}"
        )));
    }
    Ok(value)
}

/// Globally ordered iterator over a summary's retained entries.
///
/// Yields `(seq, entry)` in ascending seq by merging the per-channel tails
/// through a min-heap keyed on each tail's next seq.
pub struct OrderedTail<'a> {
    cursors: Vec<Peekable<vec_deque::Iter<'a, (u64, LogEntry)>>>,
    heap: BinaryHeap<Reverse<(u64, usize)>>,
    remaining: usize,
}

impl<'a> OrderedTail<'a> {
    fn new(channels: &'a BTreeMap<String, ChannelTail>) -> Self {
        let mut cursors = Vec::with_capacity(channels.len());
        let mut heap = BinaryHeap::with_capacity(channels.len());
        let mut remaining = 0;

        for tail in channels.values() {
            remaining += tail.len();
            if let Some((seq, _)) = tail.front() {
                heap.push(Reverse((*seq, cursors.len())));
            }
            cursors.push(tail.iter().peekable());
        }

        Self {
            cursors,
            heap,
            remaining,
        }
    }
}

impl<'a> Iterator for OrderedTail<'a> {
    type Item = (u64, &'a LogEntry);

    fn next(&mut self) -> Option<Self::Item> {
        let Reverse((seq, idx)) = self.heap.pop()?;
        let cursor = &mut self.cursors[idx];
        let (_, entry) = cursor.next()?;
        if let Some((next_seq, _)) = cursor.peek() {
            self.heap.push(Reverse((*next_seq, idx)));
        }
        self.remaining -= 1;
        Some((seq, entry))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for OrderedTail<'_> {}

/// A 32-byte digest of a summary's retained identities.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub [u8; 32]);

impl Fingerprint {
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}
