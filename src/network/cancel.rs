//! Cooperative cancellation
//!
//! A [`CancelToken`] can be handed to any number of sessions and cancelled
//! from another thread. Cancelling shuts down every attached socket, which
//! wakes blocked reads and writes, and closes the wake-up channel that a
//! pending connect waits on.

use std::collections::HashMap;
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

/// Shared cancellation flag for one or more exchanges
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    cancelled: AtomicBool,
    next_id: AtomicU64,

    /// Clones of the sockets in use, one per attached session
    streams: Mutex<HashMap<u64, TcpStream>>,

    // Dropping the sender disconnects every clone of `wake`
    signal: Mutex<Option<Sender<()>>>,
    wake: Receiver<()>,
}

impl Default for Inner {
    fn default() -> Self {
        let (signal, wake) = channel::bounded(0);
        Self {
            cancelled: AtomicBool::new(false),
            next_id: AtomicU64::new(0),
            streams: Mutex::new(HashMap::new()),
            signal: Mutex::new(Some(signal)),
            wake,
        }
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel; blocked socket operations return promptly
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.signal.lock().take();
        for stream in self.inner.streams.lock().values() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Receiver that disconnects once the token is cancelled
    pub(crate) fn wake(&self) -> Receiver<()> {
        self.inner.wake.clone()
    }

    /// Register the socket of an active session; returns its slot id
    pub(crate) fn attach(&self, stream: &TcpStream) -> std::io::Result<u64> {
        let clone = stream.try_clone()?;
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let mut streams = self.inner.streams.lock();
        // cancel() may have run before we took the lock
        if self.is_cancelled() {
            let _ = clone.shutdown(Shutdown::Both);
        }
        streams.insert(id, clone);
        Ok(id)
    }

    /// Forget one session's socket once it has been closed
    pub(crate) fn detach(&self, id: u64) {
        self.inner.streams.lock().remove(&id);
    }

    /// Number of sockets currently attached
    pub fn attached(&self) -> usize {
        self.inner.streams.lock().len()
    }
}
