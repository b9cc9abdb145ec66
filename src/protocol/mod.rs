//! Protocol Module
//!
//! Defines the message format exchanged with the nameserver.
//!
//! ## Frame Format
//! ```text
//! ┌──────────┬───────────────────────────────────────────┐
//! │ Len (4)  │   Encoded message (top-level mapping)     │
//! └──────────┴───────────────────────────────────────────┘
//! ```
//!
//! ### Value Types
//! - 0x01: BINARY  - raw bytes
//! - 0x02: MAP     - ordered key/value entries
//! - 0x03: INTEGER - u32 big-endian
//!
//! ### Message Sections
//! - `header`: serial, timestamp, expiry, authentication
//! - `data`:   command text (`type`), reply fields, `_ctrl` freshness map

mod value;
mod response;

pub mod codec;
pub mod message;

pub use value::{Map, TypedValue};
pub use response::Response;
pub use codec::{decode, encode};
pub use message::{Control, Header, Message, MessageBuilder, ReceivedMessage};
