use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, TrySendError};

#[derive(Debug, Default)]
struct Counters {
    posted: AtomicU64,
    coalesced: AtomicU64,
}

/// Creates a linked requester/receiver pair. At most one request is pending.
pub fn frame_requests() -> (FrameRequester, FrameRequests) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let counters = Arc::new(Counters::default());
    (
        FrameRequester {
            tx,
            counters: counters.clone(),
        },
        FrameRequests { rx, counters },
    )
}

/// Posts "render now" to the render thread.
#[derive(Debug, Clone)]
pub struct FrameRequester {
    tx: Sender<()>,
    counters: Arc<Counters>,
}

impl FrameRequester {
    /// Returns `false` when a request was already pending (coalesced) or the
    /// render thread is gone.
    pub fn request(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => {
                self.counters.posted.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(())) => {
                self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Disconnected(())) => false,
        }
    }
}

/// Render-thread side of the frame request slot.
#[derive(Debug)]
pub struct FrameRequests {
    rx: Receiver<()>,
    counters: Arc<Counters>,
}

impl FrameRequests {
    pub fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }

    /// Consumes a pending request, if any.
    pub fn take(&self) -> bool {
        self.rx.try_recv().is_ok()
    }

    /// Drops a stale request. Used when rendering pauses.
    pub fn discard_pending(&self) -> bool {
        let stale = self.take();
        if stale {
            log::trace!("discarded stale frame request");
        }
        stale
    }

    pub fn is_pending(&self) -> bool {
        !self.rx.is_empty()
    }

    /// Requests that reached the slot.
    pub fn posted(&self) -> u64 {
        self.counters.posted.load(Ordering::Relaxed)
    }

    /// Requests folded into one that was already pending.
    pub fn coalesced(&self) -> u64 {
        self.counters.coalesced.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_requests_coalesce() {
        let (requester, requests) = frame_requests();
        assert!(requester.request());
        assert!(!requester.request());
        assert!(!requester.clone().request());

        assert_eq!(requests.posted(), 1);
        assert_eq!(requests.coalesced(), 2);
        assert!(requests.take());
        assert!(!requests.take());

        assert!(requester.request());
        assert!(requests.discard_pending());
        assert!(!requests.is_pending());
    }

    #[test]
    fn request_after_receiver_dropped_is_rejected() {
        let (requester, requests) = frame_requests();
        drop(requests);
        assert!(!requester.request());
    }
}
