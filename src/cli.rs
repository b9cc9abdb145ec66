//! Command-line helpers
//!
//! Output and retry rules of the `rndc` binary, kept in the library so they
//! can be driven from tests.

use std::io::{self, Write};
use std::thread;
use std::time::Duration;

use crate::error::{Result, RndcError};
use crate::protocol::{Response, TypedValue};

/// Print a reply; returns whether the command succeeded
///
/// `text` goes to `out`, followed by every other field as `key: value`.
/// `err` goes to `err_out`. A reply with `err` or a non-zero result is a
/// failure.
pub fn render<O: Write, E: Write>(response: &Response, out: &mut O, err_out: &mut E) -> io::Result<bool> {
    if let Some(text) = &response.text {
        writeln!(out, "{}", text)?;
    }
    for (key, value) in response.fields.iter() {
        writeln!(out, "{}: {}", key, display_value(value))?;
    }

    if let Some(err) = &response.err {
        writeln!(err_out, "{}", err)?;
        return Ok(false);
    }
    Ok(response.result == 0)
}

fn display_value(value: &TypedValue) -> String {
    match value {
        TypedValue::Integer(n) => n.to_string(),
        TypedValue::Binary(b) => String::from_utf8_lossy(b).into_owned(),
        TypedValue::Map(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}={}", k, display_value(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
    }
}

/// One-line message for a failed command
pub fn describe(err: &RndcError) -> String {
    match err {
        RndcError::Config(msg) => format!("Configuration error: {}", msg),
        RndcError::Connection { .. } => format!("Connection error: {}", err),
        RndcError::AuthenticationFailed(_) => format!("Authentication error: {}", err),
        RndcError::ResponseTimeout { .. } => format!("Timeout: {}", err),
        _ => format!("Error: {}", err),
    }
}

/// Run `attempt` up to `retries + 1` times
///
/// Only errors that prove nothing was sent are retried.
pub fn with_retries<F>(retries: u32, delay: Duration, mut attempt: F) -> Result<Response>
where
    F: FnMut() -> Result<Response>,
{
    let mut failures = 0;
    loop {
        match attempt() {
            Err(e) if e.is_retry_safe() && failures < retries => {
                failures += 1;
                tracing::warn!("Attempt {} failed ({}), retrying", failures, e);
                thread::sleep(delay);
            }
            outcome => return outcome,
        }
    }
}
