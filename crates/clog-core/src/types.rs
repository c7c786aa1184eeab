//! Entity primitives shared by log entries.
//!
//! These identify where an entry came from: which daemon (`Origin`), under
//! what configured name (`EntityName`), at which addresses (`AddrVec`), and
//! when (`Timestamp`).

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Serialize, Serializer};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV6};

use crate::codec::{self, Decode, Encode};
use crate::error::{CodecError, Result};
use crate::features::Features;

/// The class of daemon an entity belongs to.
///
/// Unrecognised values are carried through verbatim so that entries from
/// newer peers survive a round trip.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct EntityKind(pub u8);

impl EntityKind {
    pub const MON: Self = Self(0x01);
    pub const MDS: Self = Self(0x02);
    pub const OSD: Self = Self(0x04);
    pub const CLIENT: Self = Self(0x08);
    pub const MGR: Self = Self(0x10);

    /// Short lowercase name, `unknown` for values this build does not know.
    pub fn name(self) -> &'static str {
        match self {
            Self::MON => "mon",
            Self::MDS => "mds",
            Self::OSD => "osd",
            Self::CLIENT => "client",
            Self::MGR => "mgr",
            _ => "unknown",
        }
    }
}

impl fmt::Debug for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityKind({}:{:#04x})", self.name(), self.0)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The daemon instance that produced an entry, e.g. `osd.3`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Origin {
    pub kind: EntityKind,
    pub num: i64,
}

impl Origin {
    /// Encoded size in bytes.
    pub const ENCODED_LEN: usize = 9;

    pub const fn new(kind: EntityKind, num: i64) -> Self {
        Self { kind, num }
    }

    pub const fn mon(num: i64) -> Self {
        Self::new(EntityKind::MON, num)
    }

    pub const fn osd(num: i64) -> Self {
        Self::new(EntityKind::OSD, num)
    }

    pub const fn client(num: i64) -> Self {
        Self::new(EntityKind::CLIENT, num)
    }

    pub const fn mgr(num: i64) -> Self {
        Self::new(EntityKind::MGR, num)
    }

    /// A hash that depends only on `(kind, num)`.
    ///
    /// Stable across processes and builds, unlike `std`'s randomly keyed
    /// hasher.
    pub fn stable_hash(&self) -> u64 {
        let mut x = (u64::from(self.kind.0) << 56) ^ (self.num as u64);
        x ^= x >> 30;
        x = x.wrapping_mul(0xbf58_476d_1ce4_e5b9);
        x ^= x >> 27;
        x = x.wrapping_mul(0x94d0_49bb_1331_11eb);
        x ^ (x >> 31)
    }
}

impl fmt::Debug for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Origin({self})")
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.num)
    }
}

impl Serialize for Origin {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl Encode for Origin {
    fn encode(&self, buf: &mut BytesMut, _features: Features) {
        buf.put_u8(self.kind.0);
        buf.put_i64_le(self.num);
    }
}

impl Decode for Origin {
    fn decode(buf: &mut Bytes) -> Result<Self> {
        let kind = EntityKind(codec::get_u8(buf)?);
        let num = codec::get_i64(buf)?;
        Ok(Self { kind, num })
    }
}

/// The configured name of an entity, e.g. `client.admin`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct EntityName {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityName {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Debug for EntityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityName({self})")
    }
}

impl fmt::Display for EntityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.id)
    }
}

impl Serialize for EntityName {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl Encode for EntityName {
    fn encode(&self, buf: &mut BytesMut, _features: Features) {
        buf.put_u32_le(u32::from(self.kind.0));
        codec::put_str(buf, &self.id);
    }
}

impl Decode for EntityName {
    fn decode(buf: &mut Bytes) -> Result<Self> {
        let raw_kind = codec::get_u32(buf)?;
        let kind = u8::try_from(raw_kind)
            .map(EntityKind)
            .map_err(|_| CodecError::Malformed(format!("entity kind {raw_kind} out of range")))?;
        let id = codec::get_string(buf)?;
        Ok(Self { kind, id })
    }
}

/// Wall-clock time an entry was stamped with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub struct Timestamp {
    pub sec: u32,
    pub nsec: u32,
}

impl Timestamp {
    pub const ENCODED_LEN: usize = 8;

    pub const fn new(sec: u32, nsec: u32) -> Self {
        Self { sec, nsec }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.sec, self.nsec / 1000)
    }
}

impl Encode for Timestamp {
    fn encode(&self, buf: &mut BytesMut, _features: Features) {
        buf.put_u32_le(self.sec);
        buf.put_u32_le(self.nsec);
    }
}

impl Decode for Timestamp {
    fn decode(buf: &mut Bytes) -> Result<Self> {
        let sec = codec::get_u32(buf)?;
        let nsec = codec::get_u32(buf)?;
        Ok(Self { sec, nsec })
    }
}

/// Which messenger protocol an address speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum AddrKind {
    #[default]
    None = 0,
    Legacy = 1,
    Msgr2 = 2,
    Any = 3,
}

impl AddrKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Legacy),
            2 => Some(Self::Msgr2),
            3 => Some(Self::Any),
            _ => None,
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            Self::None => "-",
            Self::Legacy => "v1",
            Self::Msgr2 => "v2",
            Self::Any => "any",
        }
    }
}

const FAMILY_NONE: u16 = 0;
const FAMILY_INET: u16 = 2;
const FAMILY_INET6: u16 = 10;

/// A single network address an entity listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EntityAddr {
    pub kind: AddrKind,
    pub nonce: u32,
    pub socket: Option<SocketAddr>,
}

impl EntityAddr {
    /// Smallest encoding: kind, nonce, empty family.
    pub const MIN_ENCODED_LEN: usize = 7;

    /// The blank address: no protocol, no socket.
    pub const BLANK: Self = Self {
        kind: AddrKind::None,
        nonce: 0,
        socket: None,
    };

    pub fn new(kind: AddrKind, socket: SocketAddr, nonce: u32) -> Self {
        Self {
            kind,
            nonce,
            socket: Some(socket),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.kind == AddrKind::None && self.socket.is_none()
    }

    /// Pre-`ENTRY_ADDRVEC` layout: nonce and socket only, protocol implied.
    pub(crate) fn encode_legacy(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.nonce);
        encode_socket(buf, self.socket);
    }

    pub(crate) fn decode_legacy(buf: &mut Bytes) -> Result<Self> {
        let nonce = codec::get_u32(buf)?;
        let socket = decode_socket(buf)?;
        let kind = if socket.is_none() && nonce == 0 {
            AddrKind::None
        } else {
            AddrKind::Legacy
        };
        Ok(Self {
            kind,
            nonce,
            socket,
        })
    }
}

fn encode_socket(buf: &mut BytesMut, socket: Option<SocketAddr>) {
    match socket {
        None => buf.put_u16_le(FAMILY_NONE),
        Some(SocketAddr::V4(v4)) => {
            buf.put_u16_le(FAMILY_INET);
            buf.put_u16_le(v4.port());
            buf.put_slice(&v4.ip().octets());
        }
        Some(SocketAddr::V6(v6)) => {
            buf.put_u16_le(FAMILY_INET6);
            buf.put_u16_le(v6.port());
            buf.put_slice(&v6.ip().octets());
        }
    }
}

fn decode_socket(buf: &mut Bytes) -> Result<Option<SocketAddr>> {
    match codec::get_u16(buf)? {
        FAMILY_NONE => Ok(None),
        FAMILY_INET => {
            let port = codec::get_u16(buf)?;
            let raw = codec::get_raw(buf, 4)?;
            let octets: [u8; 4] = raw[..]
                .try_into()
                .map_err(|_| CodecError::Malformed("ipv4 address".into()))?;
            Ok(Some(SocketAddr::new(IpAddr::V4(Ipv4Addr::from(octets)), port)))
        }
        FAMILY_INET6 => {
            let port = codec::get_u16(buf)?;
            let raw = codec::get_raw(buf, 16)?;
            let octets: [u8; 16] = raw[..]
                .try_into()
                .map_err(|_| CodecError::Malformed("ipv6 address".into()))?;
            Ok(Some(SocketAddr::V6(SocketAddrV6::new(
                Ipv6Addr::from(octets),
                port,
                0,
                0,
            ))))
        }
        family => Err(CodecError::Malformed(format!(
            "unknown address family {family}"
        ))),
    }
}

impl fmt::Display for EntityAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.socket {
            Some(socket) => write!(f, "{}:{}/{}", self.kind.prefix(), socket, self.nonce),
            None if self.is_blank() => f.write_str("-"),
            None => write!(f, "{}:-/{}", self.kind.prefix(), self.nonce),
        }
    }
}

impl Serialize for EntityAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl Encode for EntityAddr {
    fn encode(&self, buf: &mut BytesMut, _features: Features) {
        buf.put_u8(self.kind as u8);
        buf.put_u32_le(self.nonce);
        encode_socket(buf, self.socket);
    }
}

impl Decode for EntityAddr {
    fn decode(buf: &mut Bytes) -> Result<Self> {
        let raw_kind = codec::get_u8(buf)?;
        let kind = AddrKind::from_u8(raw_kind)
            .ok_or_else(|| CodecError::Malformed(format!("unknown address kind {raw_kind}")))?;
        let nonce = codec::get_u32(buf)?;
        let socket = decode_socket(buf)?;
        Ok(Self {
            kind,
            nonce,
            socket,
        })
    }
}

/// Every address an entity is reachable at, in preference order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct AddrVec(pub Vec<EntityAddr>);

impl AddrVec {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EntityAddr> {
        self.0.iter()
    }

    /// The address an old peer would understand: the first legacy-capable
    /// address, or the blank address if there is none.
    pub fn legacy_addr(&self) -> EntityAddr {
        self.0
            .iter()
            .copied()
            .find(|a| matches!(a.kind, AddrKind::Legacy | AddrKind::Any))
            .unwrap_or(EntityAddr::BLANK)
    }

    /// Build from a single legacy address; a blank address means none.
    pub(crate) fn from_legacy(addr: EntityAddr) -> Self {
        if addr.is_blank() {
            Self::new()
        } else {
            Self(vec![addr])
        }
    }
}

impl From<Vec<EntityAddr>> for AddrVec {
    fn from(addrs: Vec<EntityAddr>) -> Self {
        Self(addrs)
    }
}

impl fmt::Display for AddrVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, addr) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{addr}")?;
        }
        f.write_str("]")
    }
}

impl Encode for AddrVec {
    fn encode(&self, buf: &mut BytesMut, features: Features) {
        codec::put_seq(buf, self.0.iter(), features);
    }
}

impl Decode for AddrVec {
    fn decode(buf: &mut Bytes) -> Result<Self> {
        codec::get_seq(buf, EntityAddr::MIN_ENCODED_LEN).map(Self)
    }
}
