//! Message Tests
//!
//! Tests for message building, decoding and response parsing.

use std::time::Duration;

use rndc::protocol::message::{self, CTRL_EXPIRY, CTRL_SERIAL, CTRL_TIMESTAMP, DATA_CTRL};
use rndc::protocol::{encode, Control, Map, MessageBuilder, ReceivedMessage, Response, TypedValue};
use rndc::RndcError;

const NOW: u32 = 1_700_000_000;

// =============================================================================
// Builder Tests
// =============================================================================

#[test]
fn test_build_header_fields() {
    let msg = message::build("status", 1, "rndc-key", NOW).unwrap();

    assert_eq!(msg.header.serial, 1);
    assert_eq!(msg.header.timestamp, NOW);
    assert_eq!(msg.header.expiry, NOW + 60);
    assert!(msg.header.authentication.is_empty());
    assert_eq!(msg.key_name, "rndc-key");
}

#[test]
fn test_build_data_section() {
    let msg = message::build("zonestatus example.com", 9, "rndc-key", NOW).unwrap();

    assert_eq!(msg.data.get("type"), Some(&TypedValue::from("zonestatus example.com")));
    let keys: Vec<&str> = msg.data.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, ["type", "_ctrl"]);

    let ctrl = msg.data.get(DATA_CTRL).unwrap().as_map().unwrap();
    assert_eq!(ctrl.get(CTRL_SERIAL), Some(&TypedValue::Integer(9)));
    assert_eq!(ctrl.get(CTRL_TIMESTAMP), Some(&TypedValue::Integer(NOW)));
    assert_eq!(ctrl.get(CTRL_EXPIRY), Some(&TypedValue::Integer(NOW + 60)));
}

#[test]
fn test_custom_expiry_window() {
    let msg = MessageBuilder::new()
        .expiry_window(Duration::from_secs(300))
        .build("status", 1, "rndc-key", NOW)
        .unwrap();
    assert_eq!(msg.header.expiry, NOW + 300);
}

#[test]
fn test_expiry_saturates() {
    let msg = message::build("status", 1, "rndc-key", u32::MAX - 10).unwrap();
    assert_eq!(msg.header.expiry, u32::MAX);
}

#[test]
fn test_empty_command_rejected() {
    for command in ["", "   ", "\t\n"] {
        let result = message::build(command, 1, "rndc-key", NOW);
        assert!(matches!(result, Err(RndcError::InvalidCommand(_))), "{:?}", command);
    }
}

#[test]
fn test_nul_in_command_rejected() {
    let result = message::build("sta\0tus", 1, "rndc-key", NOW);
    assert!(matches!(result, Err(RndcError::InvalidCommand(_))));
}

#[test]
fn test_empty_key_name_rejected() {
    let result = message::build("status", 1, "", NOW);
    assert!(matches!(result, Err(RndcError::Config(_))));
}

#[test]
fn test_compose_rewrites_ctrl() {
    let data = Map::new()
        .with(DATA_CTRL, "stale")
        .with("result", 0u32)
        .with("text", "ok");
    let msg = MessageBuilder::new().compose(data, 5, "rndc-key", NOW).unwrap();

    let keys: Vec<&str> = msg.data.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, ["result", "text", "_ctrl"]);
    assert!(msg.data.get(DATA_CTRL).unwrap().as_map().is_some());
}

// =============================================================================
// Decode Tests
// =============================================================================

#[test]
fn test_received_message_matches_sent() {
    let msg = message::build("reload", 77, "rndc-key", NOW).unwrap();
    let received = ReceivedMessage::decode(&msg.encode().unwrap()).unwrap();

    assert_eq!(received.header, msg.header);
    assert_eq!(received.data, msg.data);
    assert_eq!(received.data_bytes, msg.encode_data().unwrap());
}

#[test]
fn test_received_message_trailing_bytes() {
    let mut body = message::build("reload", 1, "rndc-key", NOW).unwrap().encode().unwrap();
    body.push(0);
    assert!(matches!(ReceivedMessage::decode(&body), Err(RndcError::MalformedData(_))));
}

#[test]
fn test_received_message_missing_data() {
    let msg = message::build("reload", 1, "rndc-key", NOW).unwrap();
    let only_header = Map::new().with("header", msg.header.to_map());
    let body = encode(&TypedValue::Map(only_header)).unwrap();

    let result = ReceivedMessage::decode(&body);
    assert!(matches!(result, Err(RndcError::MalformedData(_))));
}

#[test]
fn test_received_message_header_missing_serial() {
    let mut header = message::build("reload", 1, "rndc-key", NOW).unwrap().header.to_map();
    header.remove("serial");
    let body = encode(&TypedValue::Map(
        Map::new().with("header", header).with("data", Map::new()),
    ))
    .unwrap();

    let result = ReceivedMessage::decode(&body);
    assert!(matches!(result, Err(RndcError::MalformedData(_))));
}

#[test]
fn test_received_message_not_a_map() {
    let body = encode(&TypedValue::Binary(b"hello".to_vec())).unwrap();
    assert!(matches!(ReceivedMessage::decode(&body), Err(RndcError::MalformedData(_))));
}

#[test]
fn test_received_message_truncated() {
    let body = message::build("reload", 1, "rndc-key", NOW).unwrap().encode().unwrap();
    let result = ReceivedMessage::decode(&body[..body.len() - 3]);
    assert!(matches!(result, Err(RndcError::TruncatedInput { .. })));
}

#[test]
fn test_control_fields() {
    let msg = message::build("reload", 42, "rndc-key", NOW).unwrap();
    let received = ReceivedMessage::decode(&msg.encode().unwrap()).unwrap();

    let ctrl = received.control().unwrap();
    assert_eq!(ctrl, Control { serial: 42, timestamp: NOW, expiry: NOW + 60 });
}

#[test]
fn test_control_missing_or_malformed() {
    assert!(matches!(
        Control::from_data(&Map::new().with("type", "reload")),
        Err(RndcError::MalformedData(_))
    ));
    assert!(matches!(
        Control::from_data(&Map::new().with(DATA_CTRL, "x")),
        Err(RndcError::MalformedData(_))
    ));
    let partial = Map::new().with(DATA_CTRL, Map::new().with(CTRL_SERIAL, 1u32));
    assert!(matches!(Control::from_data(&partial), Err(RndcError::MalformedData(_))));
}

// =============================================================================
// Response Tests
// =============================================================================

#[test]
fn test_response_from_data() {
    let data = Map::new()
        .with("type", "status")
        .with("result", 0u32)
        .with("text", "server is up")
        .with("_ctrl", Map::new().with("_ser", 1u32));

    let response = Response::from_data(&data).unwrap();
    assert_eq!(response, Response::new(0).with_text("server is up"));
    assert!(response.is_success());
}

#[test]
fn test_response_err_field() {
    let data = Map::new().with("result", 1u32).with("err", "zone not found");
    let response = Response::from_data(&data).unwrap();

    assert_eq!(response.err.as_deref(), Some("zone not found"));
    assert!(!response.is_success());
}

#[test]
fn test_response_textual_result_code() {
    let data = Map::new().with("result", "1");
    assert_eq!(Response::from_data(&data).unwrap().result, 1);

    let data = Map::new().with("result", "ok");
    assert!(matches!(Response::from_data(&data), Err(RndcError::MalformedData(_))));
}

#[test]
fn test_response_missing_result() {
    let data = Map::new().with("text", "hello");
    assert!(matches!(Response::from_data(&data), Err(RndcError::MalformedData(_))));
}

#[test]
fn test_response_keeps_other_fields() {
    let data = Map::new()
        .with("type", "response")
        .with("result", 0u32)
        .with("custom_field", "custom_value")
        .with("another", "data");

    let response = Response::from_data(&data).unwrap();
    let keys: Vec<&str> = response.fields.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, ["custom_field", "another"]);
}

#[test]
fn test_response_to_data_round_trip() {
    let response = Response::new(2).with_text("t").with_err("e");
    assert_eq!(Response::from_data(&response.to_data()).unwrap(), response);
}
