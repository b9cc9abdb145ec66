//! Configuration for the RNDC client
//!
//! Centralized configuration with sensible defaults. Credentials and the
//! target address are supplied per call and are not part of this struct.

use std::fmt;
use std::time::Duration;

use crate::error::{Result, RndcError};

/// Default RNDC control port
pub const DEFAULT_PORT: u16 = 953;

/// Default connect/read/write timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default freshness window added to the message timestamp
pub const DEFAULT_EXPIRY_WINDOW: Duration = Duration::from_secs(60);

/// Default largest response body accepted from a peer
pub const DEFAULT_MAX_FRAME_LEN: u32 = 65535;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// Port used when an address is given without one
    pub port: u16,

    /// TCP connect timeout
    pub connect_timeout: Duration,

    /// Read timeout for the response length prefix and body
    pub read_timeout: Duration,

    /// Write timeout for the request frame
    pub write_timeout: Duration,

    // -------------------------------------------------------------------------
    // Protocol Configuration
    // -------------------------------------------------------------------------
    /// Skew tolerance: `expiry = timestamp + expiry_window`
    pub expiry_window: Duration,

    /// Largest frame body (in bytes) accepted or sent
    pub max_frame_len: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            connect_timeout: DEFAULT_TIMEOUT,
            read_timeout: DEFAULT_TIMEOUT,
            write_timeout: DEFAULT_TIMEOUT,
            expiry_window: DEFAULT_EXPIRY_WINDOW,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl ClientConfig {
    /// Create a new config builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Builder for ClientConfig
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the default port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set connect, read and write timeouts at once
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self.config.read_timeout = timeout;
        self.config.write_timeout = timeout;
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the read timeout
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Set the write timeout
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    /// Set the expiry window
    pub fn expiry_window(mut self, window: Duration) -> Self {
        self.config.expiry_window = window;
        self
    }

    /// Set the maximum frame body length (in bytes)
    pub fn max_frame_len(mut self, len: u32) -> Self {
        self.config.max_frame_len = len;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// Target nameserver address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    pub host: String,
    pub port: u16,
}

impl Address {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `host`, `host:port`, `[v6]` or `[v6]:port`
    ///
    /// A bare IPv6 literal (more than one colon) is taken as a host without
    /// a port.
    pub fn parse(s: &str, default_port: u16) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(RndcError::Config("server address is empty".to_string()));
        }

        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            let end = rest
                .find(']')
                .ok_or_else(|| RndcError::Config(format!("unterminated '[' in address {:?}", s)))?;
            let port = match &rest[end + 1..] {
                "" => None,
                tail => Some(tail.strip_prefix(':').ok_or_else(|| {
                    RndcError::Config(format!("unexpected {:?} after ']' in address", tail))
                })?),
            };
            (&rest[..end], port)
        } else if let (1, Some((host, port))) = (s.matches(':').count(), s.split_once(':')) {
            (host, Some(port))
        } else {
            (s, None)
        };

        let port = match port {
            Some(p) => parse_port(p)?,
            None => default_port,
        };

        if host.is_empty() {
            return Err(RndcError::Config(format!("no host in address {:?}", s)));
        }

        Ok(Self::new(host, port))
    }
}

/// Parse a TCP port, rejecting 0
pub fn parse_port(s: &str) -> Result<u16> {
    match s.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(RndcError::Config(format!("invalid port {:?}", s))),
        Ok(port) => Ok(port),
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
