//! Error types for the RNDC client
//!
//! Provides a unified error type for all operations. Network-layer variants
//! carry the [`Stage`] they failed in so callers can tell whether a command
//! was ever delivered (see [`RndcError::delivery`]).

use std::fmt;
use std::io;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using RndcError
pub type Result<T> = std::result::Result<T, RndcError>;

/// Point in a single exchange where a network failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Opening the TCP connection
    Connect,
    /// Writing the request frame
    Send,
    /// Reading the 4-byte response length prefix
    ReceiveLength,
    /// Reading the response body
    ReceiveBody,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Connect => "connect",
            Stage::Send => "send",
            Stage::ReceiveLength => "receive length",
            Stage::ReceiveBody => "receive body",
        })
    }
}

/// What is known about delivery of the command when an error is returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Nothing reached the peer; retrying cannot duplicate the command
    NotSent,
    /// The write may or may not have reached the peer
    Ambiguous,
    /// The request was fully written; only the response was lost or rejected
    Delivered,
}

/// Unified error type for RNDC operations
#[derive(Debug, Error)]
pub enum RndcError {
    // -------------------------------------------------------------------------
    // Caller Errors
    // -------------------------------------------------------------------------
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("Malformed data: {0}")]
    MalformedData(String),

    #[error("Truncated input: needed {needed} bytes, {available} available")]
    TruncatedInput { needed: usize, available: usize },

    // -------------------------------------------------------------------------
    // Authentication Errors
    // -------------------------------------------------------------------------
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Connection error to {addr}: {source}")]
    Connection {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("No response within {timeout:?} ({stage})")]
    ResponseTimeout { stage: Stage, timeout: Duration },

    #[error("Transport error during {stage}: {source}")]
    Transport {
        stage: Stage,
        #[source]
        source: io::Error,
    },

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Cancelled during {stage}")]
    Cancelled { stage: Stage },
}

impl RndcError {
    /// Classify how far the command got before this error
    pub fn delivery(&self) -> Delivery {
        match self {
            RndcError::InvalidCommand(_) | RndcError::Config(_) | RndcError::Connection { .. } => {
                Delivery::NotSent
            }
            RndcError::Transport { stage, .. } | RndcError::Cancelled { stage } => match stage {
                Stage::Connect => Delivery::NotSent,
                Stage::Send => Delivery::Ambiguous,
                Stage::ReceiveLength | Stage::ReceiveBody => Delivery::Delivered,
            },
            RndcError::ResponseTimeout { .. }
            | RndcError::ProtocolViolation(_)
            | RndcError::MalformedData(_)
            | RndcError::TruncatedInput { .. }
            | RndcError::AuthenticationFailed(_) => Delivery::Delivered,
        }
    }

    /// Map a failed socket operation at `stage`
    ///
    /// A receive that ran out of time is a timeout even if the token was
    /// cancelled afterwards; any other failure on a cancelled exchange is
    /// reported as `Cancelled`.
    pub fn from_io(stage: Stage, source: io::Error, read_timeout: Duration, cancelled: bool) -> Self {
        let timed_out = matches!(source.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut);
        match stage {
            Stage::ReceiveLength | Stage::ReceiveBody if timed_out => RndcError::ResponseTimeout {
                stage,
                timeout: read_timeout,
            },
            _ if cancelled => RndcError::Cancelled { stage },
            _ => RndcError::Transport { stage, source },
        }
    }

    /// True when retrying cannot cause the command to run twice
    pub fn is_retry_safe(&self) -> bool {
        self.delivery() == Delivery::NotSent
    }
}
