//! Single-use acknowledgement between a waiting thread and the render thread.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::error::{Result, RuntimeError};

/// Completing side, moved into the render-thread job.
pub(crate) struct Ack<T> {
    tx: Sender<T>,
}

/// Waiting side.
pub(crate) struct Handshake<T> {
    rx: Receiver<T>,
}

pub(crate) fn handshake<T>() -> (Ack<T>, Handshake<T>) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    (Ack { tx }, Handshake { rx })
}

impl<T> Ack<T> {
    pub(crate) fn complete(self, value: T) {
        // The waiter may have timed out and left; nothing to do then.
        let _ = self.tx.send(value);
    }
}

impl<T> Handshake<T> {
    /// Blocks until the job completes. `None` waits without limit.
    ///
    /// An `Ack` dropped without completing (the render thread died or shut
    /// down first) yields [`RuntimeError::RenderThreadGone`].
    pub(crate) fn wait(self, timeout: Option<Duration>) -> Result<T> {
        match timeout {
            None => self.rx.recv().map_err(|_| RuntimeError::RenderThreadGone),
            Some(limit) => self.rx.recv_timeout(limit).map_err(|e| match e {
                RecvTimeoutError::Timeout => RuntimeError::HandshakeTimedOut(limit),
                RecvTimeoutError::Disconnected => RuntimeError::RenderThreadGone,
            }),
        }
    }
}
