//! Shared helpers: stub peers speaking the wire protocol

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

use rndc::auth;
use rndc::protocol::{Map, MessageBuilder, ReceivedMessage};
use rndc::{Address, Algorithm, Credentials};

// =============================================================================
// Credentials
// =============================================================================

pub fn credentials(secret: &str, algorithm: Algorithm) -> Credentials {
    Credentials::new("rndc-key", secret.as_bytes(), algorithm).unwrap()
}

// =============================================================================
// Stub Peer
// =============================================================================

/// Accept one connection on an ephemeral port and hand it to `handler`
pub fn spawn_peer<F, T>(handler: F) -> (Address, JoinHandle<T>)
where
    F: FnOnce(TcpStream) -> T + Send + 'static,
    T: Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        handler(stream)
    });
    (Address::new("127.0.0.1", port), handle)
}

/// An address with nothing listening on it
pub fn closed_address() -> Address {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    Address::new("127.0.0.1", port)
}

/// Read one length-prefixed frame body
pub fn read_frame(stream: &mut TcpStream) -> Vec<u8> {
    let mut prefix = [0u8; 4];
    stream.read_exact(&mut prefix).unwrap();
    let mut body = vec![0u8; u32::from_be_bytes(prefix) as usize];
    stream.read_exact(&mut body).unwrap();
    body
}

/// Write one length-prefixed frame body
pub fn write_frame(stream: &mut TcpStream, body: &[u8]) {
    stream.write_all(&(body.len() as u32).to_be_bytes()).unwrap();
    stream.write_all(body).unwrap();
    stream.flush().unwrap();
}

/// Block until the other side closes; returns true on a clean EOF
pub fn wait_for_close(stream: &mut TcpStream) -> bool {
    let mut buf = [0u8; 64];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => return true,
            Ok(_) => continue,
            Err(_) => return false,
        }
    }
}

/// Encode a signed reply to `request` carrying `data`
pub fn signed_reply(request: &ReceivedMessage, data: Map, credentials: &Credentials) -> Vec<u8> {
    let mut reply = MessageBuilder::new()
        .compose(data, request.header.serial, credentials.key_name(), request.header.timestamp)
        .unwrap();
    auth::sign_message(&mut reply, credentials).unwrap();
    reply.encode().unwrap()
}

/// Peer that reads one request and answers with `data` signed by `credentials`
pub fn replying_peer(data: Map, credentials: Credentials) -> (Address, JoinHandle<ReceivedMessage>) {
    spawn_peer(move |mut stream| {
        let request = ReceivedMessage::decode(&read_frame(&mut stream)).unwrap();
        write_frame(&mut stream, &signed_reply(&request, data, &credentials));
        request
    })
}
