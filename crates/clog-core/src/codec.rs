//! Versioned binary encoding.
//!
//! The layout is deliberately simple:
//! - Integers are little-endian, fixed width
//! - Strings are a `u32` byte length followed by UTF-8 bytes
//! - Sequences are a `u32` count followed by the items
//!
//! Every struct is wrapped in an envelope:
//!
//! ```text
//! | struct_v (u8) | compat_v (u8) | payload_len (u32) | payload ... |
//! ```
//!
//! `compat_v` is the oldest decoder version able to read the payload. A decoder
//! rejects envelopes whose `compat_v` is newer than what it supports, reads the
//! fields it knows for `struct_v`, and skips whatever payload remains. That
//! last rule is what lets older nodes read records written by newer ones.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{CodecError, Result};
use crate::features::Features;

/// Size of the envelope header in bytes.
pub const ENVELOPE_HEADER_LEN: usize = 6;

/// A value that can be written to the wire.
///
/// `features` describes what the reader understands; implementations must not
/// emit layouts the reader lacks a bit for.
pub trait Encode {
    fn encode(&self, buf: &mut BytesMut, features: Features);
}

/// A value that can be read back from the wire.
///
/// Decoding never needs features: the envelope version tells the decoder which
/// layout it is looking at.
pub trait Decode: Sized {
    fn decode(buf: &mut Bytes) -> Result<Self>;
}

/// Encode a value into a fresh buffer.
pub fn to_bytes<T: Encode + ?Sized>(value: &T, features: Features) -> Bytes {
    let mut buf = BytesMut::new();
    value.encode(&mut buf, features);
    buf.freeze()
}

/// Decode a value that must span the whole input.
pub fn from_bytes<T: Decode>(data: &[u8]) -> Result<T> {
    let mut buf = Bytes::copy_from_slice(data);
    let value = T::decode(&mut buf)?;
    if buf.has_remaining() {
        return Err(CodecError::TrailingBytes(buf.remaining()));
    }
    Ok(value)
}

/// Write a struct envelope around whatever `body` writes.
pub fn encode_envelope(
    buf: &mut BytesMut,
    struct_v: u8,
    compat_v: u8,
    body: impl FnOnce(&mut BytesMut),
) {
    buf.put_u8(struct_v);
    buf.put_u8(compat_v);
    let len_at = buf.len();
    buf.put_u32_le(0);
    let start = buf.len();
    body(buf);
    let len = len_u32(buf.len() - start);
    buf[len_at..len_at + 4].copy_from_slice(&len.to_le_bytes());
}

/// Read a struct envelope and hand its payload to `body`.
///
/// `body` receives the encoded `struct_v`. Payload bytes it leaves unread are
/// dropped.
pub fn decode_envelope<T>(
    buf: &mut Bytes,
    type_name: &'static str,
    supported: u8,
    body: impl FnOnce(u8, &mut Bytes) -> Result<T>,
) -> Result<T> {
    let struct_v = get_u8(buf)?;
    let compat_v = get_u8(buf)?;
    if compat_v > supported {
        return Err(CodecError::IncompatibleVersion {
            type_name,
            compat: compat_v,
            supported,
        });
    }
    if compat_v > struct_v {
        return Err(CodecError::Malformed(format!(
            "{type_name}: compat version {compat_v} newer than struct version {struct_v}"
        )));
    }

    let len = get_u32(buf)? as usize;
    ensure(buf, len)?;
    let mut payload = buf.split_to(len);
    body(struct_v, &mut payload)
}

fn len_u32(len: usize) -> u32 {
    debug_assert!(len <= u32::MAX as usize, "length {len} overflows u32");
    len as u32
}

/// Fail with [`CodecError::Truncated`] unless `needed` bytes remain.
pub fn ensure(buf: &Bytes, needed: usize) -> Result<()> {
    if buf.remaining() < needed {
        return Err(CodecError::Truncated {
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

pub fn get_u8(buf: &mut Bytes) -> Result<u8> {
    ensure(buf, 1)?;
    Ok(buf.get_u8())
}

pub fn get_u16(buf: &mut Bytes) -> Result<u16> {
    ensure(buf, 2)?;
    Ok(buf.get_u16_le())
}

pub fn get_u32(buf: &mut Bytes) -> Result<u32> {
    ensure(buf, 4)?;
    Ok(buf.get_u32_le())
}

pub fn get_u64(buf: &mut Bytes) -> Result<u64> {
    ensure(buf, 8)?;
    Ok(buf.get_u64_le())
}

pub fn get_i64(buf: &mut Bytes) -> Result<i64> {
    ensure(buf, 8)?;
    Ok(buf.get_i64_le())
}

/// Read exactly `len` raw bytes.
pub fn get_raw(buf: &mut Bytes, len: usize) -> Result<Bytes> {
    ensure(buf, len)?;
    Ok(buf.split_to(len))
}

pub fn put_str(buf: &mut BytesMut, s: &str) {
    buf.put_u32_le(len_u32(s.len()));
    buf.put_slice(s.as_bytes());
}

pub fn get_string(buf: &mut Bytes) -> Result<String> {
    let len = get_u32(buf)? as usize;
    let raw = get_raw(buf, len)?;
    String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidUtf8)
}

/// Write a sequence count.
pub fn put_count(buf: &mut BytesMut, count: usize) {
    buf.put_u32_le(len_u32(count));
}

/// Read a sequence count, checking that `count` items of at least
/// `min_item_len` bytes could still fit in the buffer.
///
/// This keeps a corrupted count from driving a huge allocation.
pub fn get_count(buf: &mut Bytes, min_item_len: usize) -> Result<usize> {
    let count = get_u32(buf)? as usize;
    let needed = count.saturating_mul(min_item_len.max(1));
    ensure(buf, needed)?;
    Ok(count)
}

/// Write a sequence of encodable items.
pub fn put_seq<'a, T, I>(buf: &mut BytesMut, items: I, features: Features)
where
    T: Encode + 'a,
    I: ExactSizeIterator<Item = &'a T>,
{
    put_count(buf, items.len());
    for item in items {
        item.encode(buf, features);
    }
}

/// Read a sequence of decodable items.
pub fn get_seq<T: Decode>(buf: &mut Bytes, min_item_len: usize) -> Result<Vec<T>> {
    let count = get_count(buf, min_item_len)?;
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        items.push(T::decode(buf)?);
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_layout() {
        let mut buf = BytesMut::new();
        encode_envelope(&mut buf, 3, 2, |b| b.put_u16_le(0xbeef));

        assert_eq!(&buf[..], &[3, 2, 2, 0, 0, 0, 0xef, 0xbe]);
    }

    #[test]
    fn test_envelope_skips_unknown_trailing_fields() {
        let mut buf = BytesMut::new();
        encode_envelope(&mut buf, 9, 1, |b| {
            b.put_u32_le(7);
            b.put_u64_le(u64::MAX); // field from a newer version
        });
        buf.put_u8(0xaa); // next value in the stream

        let mut bytes = buf.freeze();
        let value = decode_envelope(&mut bytes, "Test", 1, |v, b| {
            assert_eq!(v, 9);
            get_u32(b)
        })
        .unwrap();

        assert_eq!(value, 7);
        assert_eq!(get_u8(&mut bytes).unwrap(), 0xaa);
    }

    #[test]
    fn test_envelope_rejects_newer_compat() {
        let mut buf = BytesMut::new();
        encode_envelope(&mut buf, 4, 4, |_| {});

        let err = decode_envelope(&mut buf.freeze(), "Test", 3, |_, _| Ok(())).unwrap_err();
        assert_eq!(
            err,
            CodecError::IncompatibleVersion {
                type_name: "Test",
                compat: 4,
                supported: 3,
            }
        );
    }

    #[test]
    fn test_envelope_truncated_payload() {
        let mut buf = BytesMut::new();
        encode_envelope(&mut buf, 1, 1, |b| b.put_u64_le(1));
        let truncated = buf.freeze().slice(..10);

        let err = decode_envelope(&mut truncated.clone(), "Test", 1, |_, b| get_u64(b)).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { needed: 8, remaining: 4 }));
    }

    #[test]
    fn test_string_roundtrip() {
        let mut buf = BytesMut::new();
        put_str(&mut buf, "audit");
        put_str(&mut buf, "");

        let mut bytes = buf.freeze();
        assert_eq!(get_string(&mut bytes).unwrap(), "audit");
        assert_eq!(get_string(&mut bytes).unwrap(), "");
        assert!(!bytes.has_remaining());
    }

    #[test]
    fn test_string_invalid_utf8() {
        let mut buf = BytesMut::new();
        buf.put_u32_le(2);
        buf.put_slice(&[0xff, 0xfe]);

        assert_eq!(get_string(&mut buf.freeze()), Err(CodecError::InvalidUtf8));
    }

    #[test]
    fn test_count_guards_allocation() {
        let mut buf = BytesMut::new();
        buf.put_u32_le(u32::MAX);
        buf.put_u64_le(0);

        let err = get_count(&mut buf.freeze(), 8).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { .. }));
    }

    #[test]
    fn test_short_integer_reads() {
        let mut bytes = Bytes::from_static(&[1, 2, 3]);
        assert!(matches!(
            get_u32(&mut bytes),
            Err(CodecError::Truncated { needed: 4, remaining: 3 })
        ));
    }
}
