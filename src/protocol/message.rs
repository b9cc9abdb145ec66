//! Message definitions
//!
//! A message is a top-level mapping with two sections:
//!
//! ```text
//! {
//!   "header": { "serial", "timestamp", "expiry", "authentication": { key-name: digest } }
//!   "data":   { "type": command, ..., "_ctrl": { "_ser", "_tim", "_exp" } }
//! }
//! ```
//!
//! The HMAC covers the encoded `data` section only, so the freshness fields
//! are repeated inside `data._ctrl` where the signature protects them.

use std::time::Duration;

use super::codec::{self, RawEntry};
use super::{Map, TypedValue};
use crate::config::DEFAULT_EXPIRY_WINDOW;
use crate::error::{Result, RndcError};

pub const KEY_HEADER: &str = "header";
pub const KEY_DATA: &str = "data";

pub const HEADER_SERIAL: &str = "serial";
pub const HEADER_TIMESTAMP: &str = "timestamp";
pub const HEADER_EXPIRY: &str = "expiry";
pub const HEADER_AUTH: &str = "authentication";

pub const DATA_TYPE: &str = "type";
pub const DATA_CTRL: &str = "_ctrl";
pub const CTRL_SERIAL: &str = "_ser";
pub const CTRL_TIMESTAMP: &str = "_tim";
pub const CTRL_EXPIRY: &str = "_exp";

// =============================================================================
// Header
// =============================================================================

/// Message header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Request serial, echoed by the peer
    pub serial: u32,

    /// Seconds since the Unix epoch at construction
    pub timestamp: u32,

    /// `timestamp` plus the skew tolerance
    pub expiry: u32,

    /// key-name → HMAC digest (binary string); empty until signed
    pub authentication: Map,
}

impl Header {
    /// Convert to the wire mapping
    pub fn to_map(&self) -> Map {
        Map::new()
            .with(HEADER_SERIAL, self.serial)
            .with(HEADER_TIMESTAMP, self.timestamp)
            .with(HEADER_EXPIRY, self.expiry)
            .with(HEADER_AUTH, self.authentication.clone())
    }

    /// Parse from the wire mapping
    ///
    /// A missing `authentication` entry is accepted here and rejected later
    /// by verification.
    pub fn from_map(map: &Map) -> Result<Self> {
        let authentication = match map.get(HEADER_AUTH) {
            None => Map::new(),
            Some(TypedValue::Map(auth)) => auth.clone(),
            Some(_) => {
                return Err(RndcError::MalformedData(format!(
                    "header field {:?} is not a mapping",
                    HEADER_AUTH
                )));
            }
        };

        Ok(Self {
            serial: required_integer(map, HEADER_SERIAL)?,
            timestamp: required_integer(map, HEADER_TIMESTAMP)?,
            expiry: required_integer(map, HEADER_EXPIRY)?,
            authentication,
        })
    }
}

// =============================================================================
// Control
// =============================================================================

/// Freshness fields from `data._ctrl`, covered by the HMAC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Control {
    pub serial: u32,
    pub timestamp: u32,
    pub expiry: u32,
}

impl Control {
    /// Parse the `_ctrl` entry of a data section
    pub fn from_data(data: &Map) -> Result<Self> {
        let ctrl = match data.get(DATA_CTRL) {
            Some(TypedValue::Map(ctrl)) => ctrl,
            Some(_) => {
                return Err(RndcError::MalformedData(format!("{:?} is not a mapping", DATA_CTRL)));
            }
            None => {
                return Err(RndcError::MalformedData(format!("data has no {:?} entry", DATA_CTRL)));
            }
        };

        Ok(Self {
            serial: field(ctrl, DATA_CTRL, CTRL_SERIAL)?,
            timestamp: field(ctrl, DATA_CTRL, CTRL_TIMESTAMP)?,
            expiry: field(ctrl, DATA_CTRL, CTRL_EXPIRY)?,
        })
    }
}

fn required_integer(map: &Map, key: &str) -> Result<u32> {
    field(map, KEY_HEADER, key)
}

fn field(map: &Map, section: &str, key: &str) -> Result<u32> {
    match map.get(key) {
        Some(TypedValue::Integer(n)) => Ok(*n),
        Some(_) => Err(RndcError::MalformedData(format!(
            "{} field {:?} is not an integer",
            section, key
        ))),
        None => Err(RndcError::MalformedData(format!("{} field {:?} is missing", section, key))),
    }
}

// =============================================================================
// Outgoing Message
// =============================================================================

/// A message under construction, owned by the call that builds it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: Header,
    pub data: Map,

    /// Name of the key the message is to be signed with
    pub key_name: String,
}

impl Message {
    /// The full message as a typed value
    pub fn to_value(&self) -> TypedValue {
        TypedValue::Map(
            Map::new()
                .with(KEY_HEADER, self.header.to_map())
                .with(KEY_DATA, self.data.clone()),
        )
    }

    /// Encode the full message (frame body)
    pub fn encode(&self) -> Result<Vec<u8>> {
        codec::encode(&self.to_value())
    }

    /// Encode only the `data` section, as covered by the HMAC
    pub fn encode_data(&self) -> Result<Vec<u8>> {
        codec::encode(&TypedValue::Map(self.data.clone()))
    }
}

/// Assembles messages with a fixed expiry window
#[derive(Debug, Clone, Copy)]
pub struct MessageBuilder {
    expiry_window: Duration,
}

impl Default for MessageBuilder {
    fn default() -> Self {
        Self {
            expiry_window: DEFAULT_EXPIRY_WINDOW,
        }
    }
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the skew tolerance added to the timestamp
    pub fn expiry_window(mut self, window: Duration) -> Self {
        self.expiry_window = window;
        self
    }

    /// Build a command message
    ///
    /// `now` is seconds since the Unix epoch. The header's authentication
    /// mapping is left empty for the authenticator to fill.
    pub fn build(&self, command: &str, serial: u32, key_name: &str, now: u32) -> Result<Message> {
        validate_command(command)?;
        let data = Map::new().with(DATA_TYPE, command);
        self.compose(data, serial, key_name, now)
    }

    /// Build a message around an arbitrary data section
    ///
    /// Used for replies; the `_ctrl` sub-map is (re)written at the end of
    /// `data`.
    pub fn compose(&self, mut data: Map, serial: u32, key_name: &str, now: u32) -> Result<Message> {
        if key_name.is_empty() || key_name.len() > codec::MAX_KEY_LEN {
            return Err(RndcError::Config(format!(
                "key name must be 1..={} bytes, got {}",
                codec::MAX_KEY_LEN,
                key_name.len()
            )));
        }

        let window = u32::try_from(self.expiry_window.as_secs()).unwrap_or(u32::MAX);
        let expiry = now.saturating_add(window);

        data.remove(DATA_CTRL);
        data.insert(
            DATA_CTRL,
            Map::new()
                .with(CTRL_SERIAL, serial)
                .with(CTRL_TIMESTAMP, now)
                .with(CTRL_EXPIRY, expiry),
        );

        Ok(Message {
            header: Header {
                serial,
                timestamp: now,
                expiry,
                authentication: Map::new(),
            },
            data,
            key_name: key_name.to_string(),
        })
    }
}

/// Build a command message with the default expiry window
pub fn build(command: &str, serial: u32, key_name: &str, now: u32) -> Result<Message> {
    MessageBuilder::default().build(command, serial, key_name, now)
}

fn validate_command(command: &str) -> Result<()> {
    if command.trim().is_empty() {
        return Err(RndcError::InvalidCommand("command is empty".to_string()));
    }
    if command.contains('\0') {
        return Err(RndcError::InvalidCommand("command contains a NUL byte".to_string()));
    }
    Ok(())
}

// =============================================================================
// Incoming Message
// =============================================================================

/// A decoded message together with the exact bytes of its `data` section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub header: Header,
    pub data: Map,

    /// Encoded `data` exactly as received; the HMAC is checked against these
    pub data_bytes: Vec<u8>,
}

impl ReceivedMessage {
    /// Decode a frame body
    pub fn decode(body: &[u8]) -> Result<Self> {
        let (entries, consumed) = codec::decode_map_entries(body)?;
        if consumed != body.len() {
            return Err(RndcError::MalformedData(format!(
                "{} trailing bytes after message",
                body.len() - consumed
            )));
        }

        let header = match decode_section(&entries, KEY_HEADER)?.0 {
            TypedValue::Map(map) => Header::from_map(&map)?,
            _ => return Err(RndcError::MalformedData("header is not a mapping".to_string())),
        };

        let (data, data_bytes) = match decode_section(&entries, KEY_DATA)? {
            (TypedValue::Map(map), raw) => (map, raw.to_vec()),
            _ => return Err(RndcError::MalformedData("data is not a mapping".to_string())),
        };

        Ok(Self {
            header,
            data,
            data_bytes,
        })
    }

    /// The signed `_ctrl` fields of the data section
    ///
    /// Only meaningful after the digest has been verified.
    pub fn control(&self) -> Result<Control> {
        Control::from_data(&self.data)
    }
}

fn decode_section<'a>(entries: &[RawEntry<'a>], key: &str) -> Result<(TypedValue, &'a [u8])> {
    let entry = entries
        .iter()
        .find(|e| e.key == key)
        .ok_or_else(|| RndcError::MalformedData(format!("message has no {:?} section", key)))?;
    let (value, _) = codec::decode(entry.raw)?;
    Ok((value, entry.raw))
}
