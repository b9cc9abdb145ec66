//! Network Module
//!
//! TCP transport for a single request/response exchange.
//!
//! ## Architecture
//! - One fresh connection per command, closed on every exit path
//! - Blocking I/O with explicit connect/read/write timeouts
//! - Optional cooperative cancellation from another thread

mod cancel;
mod session;

pub use cancel::CancelToken;
pub use session::{Session, SessionState, LENGTH_PREFIX_SIZE};
