//! Session
//!
//! One request/response exchange over a fresh TCP connection.
//!
//! ## States
//! ```text
//! Idle → Connected → Sent → AwaitingLength → AwaitingBody → Decoded → Closed
//!   └──────────┴────────┴──────────┴───────────────┴────────────┴──→ Error
//! ```
//!
//! `Error` is absorbing. The socket is released on every exit path: on
//! failure, on [`Session::close`], and on drop.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

use bytes::BufMut;
use crossbeam::channel;

use super::CancelToken;
use crate::config::{Address, ClientConfig};
use crate::error::{Result, RndcError, Stage};
use crate::protocol::ReceivedMessage;

/// Length prefix size
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connected,
    Sent,
    AwaitingLength,
    AwaitingBody,
    Decoded,
    Closed,
    Error,
}

/// A single-shot exchange with one peer
pub struct Session {
    config: ClientConfig,
    state: SessionState,
    stream: Option<TcpStream>,
    cancel: Option<CancelToken>,

    /// Our slot in the token while a socket is attached
    cancel_slot: Option<u64>,

    /// Peer address for logging
    peer_addr: String,
}

impl Session {
    /// Create an idle session
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            state: SessionState::Idle,
            stream: None,
            cancel: None,
            cancel_slot: None,
            peer_addr: String::new(),
        }
    }

    /// Abort blocking operations when `token` is cancelled
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Connect, send, receive and close in one call
    pub fn round_trip(&mut self, address: &Address, body: &[u8]) -> Result<ReceivedMessage> {
        self.connect(address)?;
        self.send(body)?;
        let reply = self.receive();
        self.close();
        reply
    }

    // =========================================================================
    // Idle → Connected
    // =========================================================================

    /// Open the TCP connection
    pub fn connect(&mut self, address: &Address) -> Result<()> {
        self.expect_state(SessionState::Idle, Stage::Connect)?;
        self.check_timeouts()?;
        if self.is_cancelled() {
            return Err(self.abort(RndcError::Cancelled { stage: Stage::Connect }));
        }

        let addrs: Vec<SocketAddr> = match (address.host.as_str(), address.port).to_socket_addrs() {
            Ok(addrs) => addrs.collect(),
            Err(e) => return Err(self.abort(connection_error(address, e))),
        };

        let stream = match self.open(addrs) {
            Ok(Some(stream)) => stream,
            Ok(None) => return Err(self.abort(RndcError::Cancelled { stage: Stage::Connect })),
            Err(e) => return Err(self.abort(connection_error(address, e))),
        };

        self.peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| address.to_string());

        let attached = self
            .configure(&stream)
            .and_then(|_| self.cancel.as_ref().map(|token| token.attach(&stream)).transpose());
        match attached {
            Ok(slot) => self.cancel_slot = slot,
            Err(e) => {
                let _ = stream.shutdown(Shutdown::Both);
                return Err(self.abort(connection_error(address, e)));
            }
        }
        self.stream = Some(stream);

        if self.is_cancelled() {
            return Err(self.abort(RndcError::Cancelled { stage: Stage::Connect }));
        }

        self.transition(SessionState::Connected);
        Ok(())
    }

    /// Try each address in turn; `None` if cancelled while connecting
    ///
    /// With a token the connect runs on a helper thread so that the wait
    /// can be abandoned as soon as the token fires.
    fn open(&self, addrs: Vec<SocketAddr>) -> io::Result<Option<TcpStream>> {
        let timeout = self.config.connect_timeout;
        let token = match &self.cancel {
            Some(token) => token,
            None => return connect_any(&addrs, timeout).map(Some),
        };

        let (done_tx, done_rx) = channel::bounded(1);
        thread::Builder::new()
            .name("rndc-connect".to_string())
            .spawn(move || {
                // An abandoned stream is dropped with the channel
                let _ = done_tx.send(connect_any(&addrs, timeout));
            })?;

        let wake = token.wake();
        channel::select! {
            recv(done_rx) -> outcome => match outcome {
                Ok(result) => result.map(Some),
                Err(_) => Err(io::Error::new(io::ErrorKind::Other, "connect worker exited")),
            },
            recv(wake) -> _ => Ok(None),
        }
    }

    fn configure(&self, stream: &TcpStream) -> io::Result<()> {
        stream.set_nodelay(true)?;
        stream.set_write_timeout(Some(self.config.write_timeout))?;
        stream.set_read_timeout(Some(self.config.read_timeout))?;
        Ok(())
    }

    // =========================================================================
    // Connected → Sent
    // =========================================================================

    /// Write one length-prefixed frame
    pub fn send(&mut self, body: &[u8]) -> Result<()> {
        self.expect_state(SessionState::Connected, Stage::Send)?;

        if body.len() > self.config.max_frame_len as usize {
            return Err(self.abort(RndcError::InvalidCommand(format!(
                "request of {} bytes exceeds frame limit of {}",
                body.len(),
                self.config.max_frame_len
            ))));
        }

        let mut frame = Vec::with_capacity(LENGTH_PREFIX_SIZE + body.len());
        frame.put_u32(body.len() as u32);
        frame.put_slice(body);

        let written = match self.stream.as_mut() {
            Some(stream) => stream.write_all(&frame).and_then(|_| stream.flush()),
            None => Err(not_connected()),
        };
        if let Err(e) = written {
            return Err(self.io_failure(Stage::Send, e));
        }

        tracing::trace!("Sent {} byte frame to {}", body.len(), self.peer_addr);
        self.transition(SessionState::Sent);
        Ok(())
    }

    // =========================================================================
    // Sent → AwaitingLength → AwaitingBody → Decoded
    // =========================================================================

    /// Read and decode one response frame
    ///
    /// The read timeout bounds the whole response, not each read call.
    pub fn receive(&mut self) -> Result<ReceivedMessage> {
        self.expect_state(SessionState::Sent, Stage::ReceiveLength)?;
        let deadline = Instant::now() + self.config.read_timeout;

        self.transition(SessionState::AwaitingLength);
        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        self.read_exact_by(&mut prefix, deadline, Stage::ReceiveLength)?;

        let len = u32::from_be_bytes(prefix);
        if len == 0 || len > self.config.max_frame_len {
            tracing::warn!(
                "Peer {} sent frame length {} (allowed 1..={})",
                self.peer_addr,
                len,
                self.config.max_frame_len
            );
            return Err(self.abort(RndcError::ProtocolViolation(format!(
                "frame length {} outside 1..={}",
                len, self.config.max_frame_len
            ))));
        }

        self.transition(SessionState::AwaitingBody);
        let mut body = vec![0u8; len as usize];
        self.read_exact_by(&mut body, deadline, Stage::ReceiveBody)?;
        tracing::trace!("Received {} byte frame from {}", len, self.peer_addr);

        match ReceivedMessage::decode(&body) {
            Ok(message) => {
                self.transition(SessionState::Decoded);
                Ok(message)
            }
            Err(e) => Err(self.abort(e)),
        }
    }

    fn read_exact_by(&mut self, buf: &mut [u8], deadline: Instant, stage: Stage) -> Result<()> {
        let outcome = match self.stream.as_mut() {
            Some(stream) => read_until(stream, buf, deadline),
            None => Err(ReadFailure::Io(not_connected())),
        };

        match outcome {
            Ok(()) => Ok(()),
            Err(ReadFailure::Io(e)) => Err(self.io_failure(stage, e)),
            // A cancelled token shuts the socket down, which reads as EOF
            Err(ReadFailure::Eof { .. }) if self.is_cancelled() => {
                Err(self.abort(RndcError::Cancelled { stage }))
            }
            Err(ReadFailure::Eof { filled }) => Err(self.abort(RndcError::TruncatedInput {
                needed: buf.len(),
                available: filled,
            })),
        }
    }

    // =========================================================================
    // → Closed
    // =========================================================================

    /// Release the connection
    ///
    /// Safe to call more than once. A session in `Error` stays there.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        if let (Some(token), Some(slot)) = (&self.cancel, self.cancel_slot.take()) {
            token.detach(slot);
        }
        if self.state != SessionState::Error && self.state != SessionState::Closed {
            self.transition(SessionState::Closed);
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(peer = %self.peer_addr, from = ?self.state, to = ?next, "session state");
        self.state = next;
    }

    /// Enter `Error`, release the socket and hand back the error
    fn abort(&mut self, err: RndcError) -> RndcError {
        tracing::debug!("Session with {} failed: {}", self.peer_addr, err);
        self.transition(SessionState::Error);
        self.close();
        err
    }

    fn io_failure(&mut self, stage: Stage, e: io::Error) -> RndcError {
        let err = RndcError::from_io(stage, e, self.config.read_timeout, self.is_cancelled());
        self.abort(err)
    }

    fn expect_state(&mut self, expected: SessionState, stage: Stage) -> Result<()> {
        if self.state == expected {
            return Ok(());
        }
        let e = io::Error::new(
            io::ErrorKind::Other,
            format!("session is {:?}, expected {:?}", self.state, expected),
        );
        Err(self.abort(RndcError::Transport { stage, source: e }))
    }

    fn check_timeouts(&mut self) -> Result<()> {
        let c = &self.config;
        if c.connect_timeout.is_zero() || c.read_timeout.is_zero() || c.write_timeout.is_zero() {
            return Err(self.abort(RndcError::Config("timeouts must be non-zero".to_string())));
        }
        Ok(())
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map_or(false, CancelToken::is_cancelled)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

enum ReadFailure {
    /// Peer closed after `filled` bytes
    Eof { filled: usize },
    Io(io::Error),
}

/// Fill `buf` completely or fail; no partial frames are returned
fn read_until(stream: &mut TcpStream, buf: &mut [u8], deadline: Instant) -> std::result::Result<(), ReadFailure> {
    let mut filled = 0;
    while filled < buf.len() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(ReadFailure::Io(io::Error::new(io::ErrorKind::TimedOut, "read deadline passed")));
        }
        stream
            .set_read_timeout(Some(remaining.max(Duration::from_millis(1))))
            .map_err(ReadFailure::Io)?;

        match stream.read(&mut buf[filled..]) {
            Ok(0) => return Err(ReadFailure::Eof { filled }),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ReadFailure::Io(e)),
        }
    }
    Ok(())
}

fn connect_any(addrs: &[SocketAddr], timeout: Duration) -> io::Result<TcpStream> {
    let mut last_err = io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses");
    for addr in addrs {
        match TcpStream::connect_timeout(addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                tracing::debug!("Connect to {} failed: {}", addr, e);
                last_err = e;
            }
        }
    }
    Err(last_err)
}

fn connection_error(address: &Address, source: io::Error) -> RndcError {
    RndcError::Connection {
        addr: address.to_string(),
        source,
    }
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "session has no connection")
}
