//! # rndc
//!
//! A client for the remote name daemon control (RNDC) protocol:
//! - Self-describing binary codec (integers, binary strings, ordered maps)
//! - HMAC-MD5/SHA1/SHA224/SHA256/SHA384/SHA512 message authentication
//! - Single-shot TCP exchange with strict framing and timeouts
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Client                                │
//! │               (one call = one exchange)                      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │   Message   │─────────▶│    Auth     │
//!   │   Builder   │          │   (HMAC)    │
//!   └──────┬──────┘          └──────┬──────┘
//!          │                        │
//!          ▼                        ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │    Codec    │─────────▶│   Session   │──────▶ nameserver
//!   │             │          │    (TCP)    │
//!   └─────────────┘          └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use rndc::{Address, Algorithm, Client, ClientConfig, Credentials};
//!
//! let credentials = Credentials::from_base64("rndc-key", "c2VjcmV0", Algorithm::Sha256)?;
//! let client = Client::new(ClientConfig::default());
//! let response = client.execute("status", &credentials, &Address::new("127.0.0.1", 953))?;
//! println!("{}", response.text.unwrap_or_default());
//! # Ok::<(), rndc::RndcError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod auth;
pub mod network;
pub mod client;
pub mod cli;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Delivery, Result, RndcError, Stage};
pub use config::{Address, ClientConfig};
pub use auth::{Algorithm, Credentials};
pub use protocol::{Map, Response, TypedValue};
pub use client::{execute, Client};
