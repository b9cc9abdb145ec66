//! Client
//!
//! Runs one command end to end:
//!
//! ```text
//! build → sign → connect/send/receive/close → verify → Response
//! ```
//!
//! Nothing is kept between calls. Each call carries its own serial and
//! freshness window and opens its own connection, so a `Client` can be
//! shared freely between threads.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::auth::{self, Credentials};
use crate::config::{Address, ClientConfig};
use crate::error::{Result, RndcError};
use crate::network::{CancelToken, Session};
use crate::protocol::{MessageBuilder, ReceivedMessage, Response};

/// Issues commands to a nameserver
#[derive(Debug, Clone, Default)]
pub struct Client {
    config: ClientConfig,
}

impl Client {
    /// Create a client with the given config
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Execute a command with a random serial
    pub fn execute(&self, command: &str, credentials: &Credentials, address: &Address) -> Result<Response> {
        self.run(command, rand::random(), credentials, address, None)
    }

    /// Execute a command with a caller-chosen serial
    pub fn execute_with_serial(
        &self,
        command: &str,
        serial: u32,
        credentials: &Credentials,
        address: &Address,
    ) -> Result<Response> {
        self.run(command, serial, credentials, address, None)
    }

    /// Execute a command that can be aborted through `token`
    pub fn execute_cancellable(
        &self,
        command: &str,
        credentials: &Credentials,
        address: &Address,
        token: &CancelToken,
    ) -> Result<Response> {
        self.run(command, rand::random(), credentials, address, Some(token))
    }

    fn run(
        &self,
        command: &str,
        serial: u32,
        credentials: &Credentials,
        address: &Address,
        token: Option<&CancelToken>,
    ) -> Result<Response> {
        let builder = MessageBuilder::new().expiry_window(self.config.expiry_window);
        let mut message = builder.build(command, serial, credentials.key_name(), unix_now()?)?;
        auth::sign_message(&mut message, credentials)?;
        let body = message.encode()?;

        tracing::debug!(
            server = %address,
            serial,
            key = credentials.key_name(),
            "Sending {:?}",
            command
        );

        let mut session = Session::new(self.config.clone());
        if let Some(token) = token {
            session = session.with_cancel(token.clone());
        }
        let reply = session.round_trip(address, &body)?;

        auth::verify_message(&reply, credentials)?;
        check_control(&reply, serial, unix_now()?)?;

        let response = Response::from_data(&reply.data)?;
        tracing::debug!(server = %address, result = response.result, "Command completed");
        Ok(response)
    }
}

/// Match the signed `_ctrl` fields against the request and the clock
///
/// The header copy is unsigned, so it must agree with `_ctrl` but is never
/// trusted on its own.
fn check_control(reply: &ReceivedMessage, serial: u32, now: u32) -> Result<()> {
    let ctrl = reply.control()?;

    if ctrl.serial != serial {
        return Err(RndcError::ProtocolViolation(format!(
            "reply serial {} does not match request serial {}",
            ctrl.serial, serial
        )));
    }

    let header = &reply.header;
    if header.serial != ctrl.serial || header.timestamp != ctrl.timestamp || header.expiry != ctrl.expiry {
        tracing::warn!(
            header_serial = header.serial,
            signed_serial = ctrl.serial,
            "reply header disagrees with signed control fields"
        );
        return Err(RndcError::ProtocolViolation(
            "reply header disagrees with signed control fields".to_string(),
        ));
    }

    if ctrl.expiry < now {
        return Err(RndcError::ProtocolViolation(format!(
            "reply expired at {} (now {})",
            ctrl.expiry, now
        )));
    }

    Ok(())
}

/// Execute a command with the default config
pub fn execute(command: &str, credentials: &Credentials, address: &Address) -> Result<Response> {
    Client::default().execute(command, credentials, address)
}

/// Seconds since the Unix epoch, as carried on the wire
fn unix_now() -> Result<u32> {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| RndcError::Config(format!("system clock is before the Unix epoch: {}", e)))?
        .as_secs();
    u32::try_from(secs).map_err(|_| RndcError::Config(format!("timestamp {} does not fit in 32 bits", secs)))
}
