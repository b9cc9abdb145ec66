//! Codec Tests
//!
//! Tests for typed value encoding/decoding.

use rndc::protocol::codec::{
    decode_map_entries, encoded_len, MAX_DEPTH, TAG_BINARY, TAG_INTEGER, TAG_MAP,
};
use rndc::protocol::{decode, encode, Map, TypedValue};
use rndc::RndcError;

// =============================================================================
// Layout Tests
// =============================================================================

#[test]
fn test_integer_layout() {
    let bytes = encode(&TypedValue::Integer(0x0102_0304)).unwrap();
    assert_eq!(bytes, [TAG_INTEGER, 0, 0, 0, 4, 1, 2, 3, 4]);
}

#[test]
fn test_binary_layout_keeps_nul() {
    let bytes = encode(&TypedValue::Binary(b"a\0b".to_vec())).unwrap();
    assert_eq!(bytes, [TAG_BINARY, 0, 0, 0, 3, b'a', 0, b'b']);
}

#[test]
fn test_map_layout() {
    let map = Map::new().with("a", 7u32);
    let bytes = encode(&TypedValue::Map(map)).unwrap();

    // key_len(1) + "a"(1) + integer(9)
    assert_eq!(
        bytes,
        [TAG_MAP, 0, 0, 0, 11, 1, b'a', TAG_INTEGER, 0, 0, 0, 4, 0, 0, 0, 7]
    );
}

#[test]
fn test_encoded_len_matches_output() {
    let value = TypedValue::Map(
        Map::new()
            .with("type", "status")
            .with("_ctrl", Map::new().with("_ser", 1u32).with("_tim", 2u32)),
    );
    assert_eq!(encoded_len(&value), encode(&value).unwrap().len());
}

#[test]
fn test_insertion_order_is_preserved() {
    let map = Map::new().with("zeta", 1u32).with("alpha", 2u32).with("mid", 3u32);
    let (decoded, _) = decode(&encode(&TypedValue::Map(map)).unwrap()).unwrap();

    let keys: Vec<&str> = decoded.as_map().unwrap().iter().map(|(k, _)| k).collect();
    assert_eq!(keys, ["zeta", "alpha", "mid"]);
}

#[test]
fn test_order_changes_encoding() {
    let a = Map::new().with("x", 1u32).with("y", 2u32);
    let b = Map::new().with("y", 2u32).with("x", 1u32);
    assert_ne!(
        encode(&TypedValue::Map(a.clone())).unwrap(),
        encode(&TypedValue::Map(b.clone())).unwrap()
    );

    let mut sorted = b;
    sorted.sort_keys();
    assert_eq!(
        encode(&TypedValue::Map(a)).unwrap(),
        encode(&TypedValue::Map(sorted)).unwrap()
    );
}

#[test]
fn test_insert_replaces_in_place() {
    let mut map = Map::new().with("a", 1u32).with("b", 2u32);
    let previous = map.insert("a", 9u32);

    assert_eq!(previous, Some(TypedValue::Integer(1)));
    assert_eq!(map.len(), 2);
    assert_eq!(map.iter().next(), Some(("a", &TypedValue::Integer(9))));
}

// =============================================================================
// Round Trip Edge Cases
// =============================================================================

#[test]
fn test_empty_values() {
    for value in [
        TypedValue::Binary(vec![]),
        TypedValue::Map(Map::new()),
        TypedValue::Integer(0),
        TypedValue::Integer(u32::MAX),
    ] {
        let bytes = encode(&value).unwrap();
        let (decoded, consumed) = decode(&bytes).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(consumed, bytes.len());
    }
}

#[test]
fn test_nested_maps() {
    let value = TypedValue::Map(
        Map::new()
            .with("_data", Map::new().with("msg", "hello").with("nested", Map::new().with("k", "v")))
            .with("_auth", Map::new().with("token", b"abc".to_vec())),
    );
    let (decoded, _) = decode(&encode(&value).unwrap()).unwrap();

    let data = decoded.as_map().unwrap().get("_data").unwrap().as_map().unwrap();
    assert_eq!(data.get("msg").unwrap().as_binary(), Some(&b"hello"[..]));
    let nested = data.get("nested").unwrap().as_map().unwrap();
    assert_eq!(nested.get("k").unwrap().as_binary(), Some(&b"v"[..]));
    assert_eq!(decoded, value);
}

#[test]
fn test_decode_leaves_trailing_bytes() {
    let mut bytes = encode(&TypedValue::Integer(5)).unwrap();
    let value_len = bytes.len();
    bytes.extend_from_slice(b"extra");

    let (decoded, consumed) = decode(&bytes).unwrap();
    assert_eq!(decoded, TypedValue::Integer(5));
    assert_eq!(consumed, value_len);
}

#[test]
fn test_raw_entries_are_exact_encodings() {
    let inner = Map::new().with("type", "status");
    let outer = Map::new().with("header", 1u32).with("data", inner.clone());
    let bytes = encode(&TypedValue::Map(outer)).unwrap();

    let (entries, consumed) = decode_map_entries(&bytes).unwrap();
    assert_eq!(consumed, bytes.len());
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].key, "data");
    assert_eq!(entries[1].raw, encode(&TypedValue::Map(inner)).unwrap().as_slice());
}

// =============================================================================
// Error Handling Tests
// =============================================================================

#[test]
fn test_incomplete_header() {
    let result = decode(&[TAG_BINARY, 0x00, 0x00]);
    assert!(matches!(
        result,
        Err(RndcError::TruncatedInput { needed: 5, available: 3 })
    ));
}

#[test]
fn test_incomplete_payload() {
    // Declares 10 bytes, carries 2
    let result = decode(&[TAG_BINARY, 0, 0, 0, 10, b'h', b'i']);
    assert!(matches!(
        result,
        Err(RndcError::TruncatedInput { needed: 15, available: 7 })
    ));
}

#[test]
fn test_truncated_map_is_truncated() {
    let bytes = encode(&TypedValue::Map(Map::new().with("k", "value"))).unwrap();
    let result = decode(&bytes[..bytes.len() - 1]);
    assert!(matches!(result, Err(RndcError::TruncatedInput { .. })));
}

#[test]
fn test_unknown_type_tag() {
    let result = decode(&[0xFF, 0, 0, 0, 0]);
    assert!(matches!(result, Err(RndcError::MalformedData(_))));
    assert!(result.unwrap_err().to_string().contains("unknown type tag"));
}

#[test]
fn test_unknown_tag_beats_truncation() {
    // Wrong tag is reported even though the declared length is missing
    let result = decode(&[0x07, 0, 0, 0, 50]);
    assert!(matches!(result, Err(RndcError::MalformedData(_))));
}

#[test]
fn test_integer_with_wrong_length() {
    let result = decode(&[TAG_INTEGER, 0, 0, 0, 2, 0, 1]);
    assert!(matches!(result, Err(RndcError::MalformedData(_))));
}

#[test]
fn test_nested_overrun_is_malformed() {
    // Map body of 8 bytes holding a binary value that claims 100 bytes
    let bytes = [TAG_MAP, 0, 0, 0, 8, 1, b'k', TAG_BINARY, 0, 0, 0, 100, b'x'];
    let result = decode(&bytes);
    assert!(matches!(result, Err(RndcError::MalformedData(_))));
}

#[test]
fn test_key_overrun_is_malformed() {
    let bytes = [TAG_MAP, 0, 0, 0, 2, 9, b'k'];
    assert!(matches!(decode(&bytes), Err(RndcError::MalformedData(_))));
}

#[test]
fn test_duplicate_keys_rejected() {
    let entry = [1, b'k', TAG_INTEGER, 0, 0, 0, 4, 0, 0, 0, 1];
    let mut bytes = vec![TAG_MAP, 0, 0, 0, (entry.len() * 2) as u8];
    bytes.extend_from_slice(&entry);
    bytes.extend_from_slice(&entry);

    let result = decode(&bytes);
    assert!(matches!(result, Err(RndcError::MalformedData(_))));
    assert!(result.unwrap_err().to_string().contains("duplicate"));
}

#[test]
fn test_non_utf8_key_rejected() {
    let bytes = [TAG_MAP, 0, 0, 0, 11, 1, 0xFF, TAG_INTEGER, 0, 0, 0, 4, 0, 0, 0, 1];
    assert!(matches!(decode(&bytes), Err(RndcError::MalformedData(_))));
}

#[test]
fn test_overlong_key_rejected_on_encode() {
    let map = Map::new().with("k".repeat(256), 1u32);
    assert!(matches!(encode(&TypedValue::Map(map)), Err(RndcError::MalformedData(_))));

    let map = Map::new().with("k".repeat(255), 1u32);
    assert!(encode(&TypedValue::Map(map)).is_ok());
}

#[test]
fn test_nesting_limit() {
    let mut value = TypedValue::Integer(1);
    for _ in 0..=MAX_DEPTH {
        value = TypedValue::Map(Map::new().with("n", value));
    }
    let bytes = encode(&value).unwrap();
    assert!(matches!(decode(&bytes), Err(RndcError::MalformedData(_))));

    let mut value = TypedValue::Integer(1);
    for _ in 0..MAX_DEPTH {
        value = TypedValue::Map(Map::new().with("n", value));
    }
    assert!(decode(&encode(&value).unwrap()).is_ok());
}

#[test]
fn test_map_entries_requires_map() {
    let bytes = encode(&TypedValue::Integer(1)).unwrap();
    assert!(matches!(decode_map_entries(&bytes), Err(RndcError::MalformedData(_))));
}
