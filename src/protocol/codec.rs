//! Binary codec
//!
//! Encoding and decoding of [`TypedValue`]s.
//!
//! ## Wire Format
//!
//! Every value is self-describing:
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Tag (1)  │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Payload by Type
//! - 0x01 BINARY:  raw bytes
//! - 0x02 MAP:     sequence of key_len (1) + key + encoded value
//! - 0x03 INTEGER: u32 big-endian (Len is always 4)
//!
//! Map entries are written in insertion order. Decoding is a single forward
//! pass; a short outermost buffer yields [`RndcError::TruncatedInput`] while
//! anything inconsistent yields [`RndcError::MalformedData`].

use bytes::{Buf, BufMut};

use super::{Map, TypedValue};
use crate::error::{Result, RndcError};

/// Tag + length prefix size
pub const VALUE_HEADER_SIZE: usize = 5;

pub const TAG_BINARY: u8 = 0x01;
pub const TAG_MAP: u8 = 0x02;
pub const TAG_INTEGER: u8 = 0x03;

/// Longest key representable by the 1-byte key length
pub const MAX_KEY_LEN: usize = u8::MAX as usize;

/// Deepest mapping nesting accepted by the decoder
pub const MAX_DEPTH: usize = 32;

/// An undecoded map entry: the key and the exact encoded bytes of its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEntry<'a> {
    pub key: &'a str,
    pub raw: &'a [u8],
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode a value to bytes
///
/// Fails only for values the format cannot represent (keys longer than 255
/// bytes, payloads longer than `u32::MAX`).
pub fn encode(value: &TypedValue) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(encoded_len(value));
    encode_into(value, &mut buf)?;
    Ok(buf)
}

/// Encode a value, appending to `buf`
pub fn encode_into<B: BufMut>(value: &TypedValue, buf: &mut B) -> Result<()> {
    match value {
        TypedValue::Integer(n) => {
            buf.put_u8(TAG_INTEGER);
            buf.put_u32(4);
            buf.put_u32(*n);
        }
        TypedValue::Binary(bytes) => {
            buf.put_u8(TAG_BINARY);
            buf.put_u32(payload_len(bytes.len())?);
            buf.put_slice(bytes);
        }
        TypedValue::Map(map) => {
            buf.put_u8(TAG_MAP);
            buf.put_u32(payload_len(map_body_len(map))?);
            for (key, entry) in map.iter() {
                if key.len() > MAX_KEY_LEN {
                    return Err(RndcError::MalformedData(format!(
                        "key of {} bytes exceeds {} byte limit",
                        key.len(),
                        MAX_KEY_LEN
                    )));
                }
                buf.put_u8(key.len() as u8);
                buf.put_slice(key.as_bytes());
                encode_into(entry, buf)?;
            }
        }
    }
    Ok(())
}

/// Size of the encoding of `value`, header included
pub fn encoded_len(value: &TypedValue) -> usize {
    VALUE_HEADER_SIZE
        + match value {
            TypedValue::Integer(_) => 4,
            TypedValue::Binary(bytes) => bytes.len(),
            TypedValue::Map(map) => map_body_len(map),
        }
}

fn map_body_len(map: &Map) -> usize {
    map.iter().map(|(k, v)| 1 + k.len() + encoded_len(v)).sum()
}

fn payload_len(len: usize) -> Result<u32> {
    u32::try_from(len)
        .map_err(|_| RndcError::MalformedData(format!("payload of {} bytes is too large", len)))
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode one value from the front of `bytes`
///
/// Returns the value and the number of bytes consumed. Trailing bytes are
/// left for the caller.
pub fn decode(bytes: &[u8]) -> Result<(TypedValue, usize)> {
    decode_value(bytes, 0)
}

/// Split an encoded mapping into its raw entries without decoding them
///
/// Used where the exact bytes of an entry matter (HMAC verification).
/// Returns the entries and the number of bytes consumed.
pub fn decode_map_entries(bytes: &[u8]) -> Result<(Vec<RawEntry<'_>>, usize)> {
    let (tag, len) = read_value_header(bytes)?;
    if tag != TAG_MAP {
        return Err(RndcError::MalformedData(format!(
            "expected mapping, found tag 0x{:02x}",
            tag
        )));
    }
    let body = &bytes[VALUE_HEADER_SIZE..VALUE_HEADER_SIZE + len];
    Ok((split_map_body(body)?, VALUE_HEADER_SIZE + len))
}

fn decode_value(bytes: &[u8], depth: usize) -> Result<(TypedValue, usize)> {
    let (tag, len) = read_value_header(bytes)?;
    let payload = &bytes[VALUE_HEADER_SIZE..VALUE_HEADER_SIZE + len];

    let value = match tag {
        TAG_INTEGER => {
            if len != 4 {
                return Err(RndcError::MalformedData(format!(
                    "integer with length {} (expected 4)",
                    len
                )));
            }
            TypedValue::Integer(u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]))
        }
        TAG_BINARY => TypedValue::Binary(payload.to_vec()),
        TAG_MAP => {
            if depth >= MAX_DEPTH {
                return Err(RndcError::MalformedData(format!(
                    "mappings nested deeper than {}",
                    MAX_DEPTH
                )));
            }
            let mut map = Map::new();
            for entry in split_map_body(payload)? {
                let (value, _) = decode_value(entry.raw, depth + 1)?;
                map.insert(entry.key, value);
            }
            TypedValue::Map(map)
        }
        other => {
            return Err(RndcError::MalformedData(format!("unknown type tag 0x{:02x}", other)));
        }
    };

    Ok((value, VALUE_HEADER_SIZE + len))
}

/// Parse the tag and length, checking that the payload is fully present
fn read_value_header(bytes: &[u8]) -> Result<(u8, usize)> {
    if bytes.len() < VALUE_HEADER_SIZE {
        return Err(RndcError::TruncatedInput {
            needed: VALUE_HEADER_SIZE,
            available: bytes.len(),
        });
    }

    let mut cursor = bytes;
    let tag = cursor.get_u8();
    if !matches!(tag, TAG_BINARY | TAG_MAP | TAG_INTEGER) {
        return Err(RndcError::MalformedData(format!("unknown type tag 0x{:02x}", tag)));
    }

    let len = cursor.get_u32() as usize;
    if cursor.remaining() < len {
        return Err(RndcError::TruncatedInput {
            needed: VALUE_HEADER_SIZE + len,
            available: bytes.len(),
        });
    }

    Ok((tag, len))
}

/// Walk a mapping body, returning each key with the raw bytes of its value
fn split_map_body(body: &[u8]) -> Result<Vec<RawEntry<'_>>> {
    let mut entries: Vec<RawEntry<'_>> = Vec::new();
    let mut rest = body;

    while let Some((&key_len, tail)) = rest.split_first() {
        let key_len = key_len as usize;
        if tail.len() < key_len {
            return Err(RndcError::MalformedData(
                "mapping key overruns mapping body".to_string(),
            ));
        }
        let (key_bytes, tail) = tail.split_at(key_len);
        let key = std::str::from_utf8(key_bytes)
            .map_err(|e| RndcError::MalformedData(format!("mapping key is not UTF-8: {}", e)))?;

        // The enclosing length is already satisfied, so a short value is
        // corruption rather than a partial read
        let value_len = match read_value_header(tail) {
            Ok((_, len)) => VALUE_HEADER_SIZE + len,
            Err(RndcError::TruncatedInput { .. }) => {
                return Err(RndcError::MalformedData(format!(
                    "value for key {:?} overruns mapping body",
                    key
                )));
            }
            Err(e) => return Err(e),
        };

        if entries.iter().any(|e| e.key == key) {
            return Err(RndcError::MalformedData(format!("duplicate mapping key {:?}", key)));
        }

        let (raw, tail) = tail.split_at(value_len);
        entries.push(RawEntry { key, raw });
        rest = tail;
    }

    Ok(entries)
}
