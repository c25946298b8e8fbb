//! Frame pacing.
//!
//! A dedicated thread waits on the display's refresh signal and posts a
//! coalescing frame request to the render thread for every tick. The session
//! controller starts the pacer once a window surface is bound and stops it
//! before any GPU teardown.

mod request;
mod vsync;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, select};

use crate::error::{Result, RuntimeError};

pub use request::{FrameRequester, FrameRequests, frame_requests};
pub use vsync::{IntervalVsync, ManualVsync, VsyncSource};

static NEXT_PACER_ID: AtomicU64 = AtomicU64::new(1);

struct Running {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

/// Owns the frame-pacing thread.
pub struct FramePacer {
    vsync: Arc<dyn VsyncSource>,
    requester: FrameRequester,
    prefix: String,
    running: Option<Running>,
}

impl FramePacer {
    pub fn new(vsync: Arc<dyn VsyncSource>, requester: FrameRequester, prefix: impl Into<String>) -> Self {
        Self {
            vsync,
            requester,
            prefix: prefix.into(),
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Subscribes to the refresh signal and spawns the pacing thread.
    /// No-op when already running.
    pub fn start(&mut self) -> Result<()> {
        if self.running.is_some() {
            return Ok(());
        }

        let name = format!(
            "{}-pacer-{}",
            self.prefix,
            NEXT_PACER_ID.fetch_add(1, Ordering::Relaxed)
        );
        // Subscribe before spawning so no tick fired after `start` returns is lost.
        let ticks = self.vsync.subscribe();
        let (stop, stopped) = crossbeam_channel::bounded::<()>(0);
        let requester = self.requester.clone();

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                log::debug!("frame pacer running");
                loop {
                    select! {
                        recv(stopped) -> _ => break,
                        recv(ticks) -> tick => {
                            if tick.is_err() {
                                log::warn!("refresh signal ended; pacer exiting");
                                break;
                            }
                            requester.request();
                        }
                    }
                }
                log::debug!("frame pacer exiting");
            })
            .map_err(|source| RuntimeError::ThreadSpawn { name, source })?;

        self.running = Some(Running { stop, handle });
        Ok(())
    }

    /// Cancels the subscription, stops the thread and joins it.
    /// No-op when not running.
    pub fn stop(&mut self) {
        let Some(Running { stop, handle }) = self.running.take() else {
            return;
        };

        drop(stop);
        if handle.join().is_err() {
            log::error!("frame pacer thread panicked");
        }
        log::debug!("frame pacer stopped");
    }
}

impl Drop for FramePacer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for FramePacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramePacer")
            .field("prefix", &self.prefix)
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        cond()
    }

    #[test]
    fn each_tick_posts_a_request() {
        let vsync = Arc::new(ManualVsync::new());
        let (requester, requests) = frame_requests();
        let mut pacer = FramePacer::new(vsync.clone(), requester, "test");
        pacer.start().unwrap();

        assert_eq!(vsync.fire(), 1);
        assert!(requests.receiver().recv_timeout(Duration::from_secs(5)).is_ok());

        vsync.fire();
        assert!(requests.receiver().recv_timeout(Duration::from_secs(5)).is_ok());
        assert_eq!(requests.posted(), 2);
    }

    #[test]
    fn unconsumed_ticks_coalesce() {
        let vsync = Arc::new(ManualVsync::new());
        let (requester, requests) = frame_requests();
        let mut pacer = FramePacer::new(vsync.clone(), requester, "test");
        pacer.start().unwrap();

        for _ in 0..3 {
            vsync.fire();
        }
        assert!(wait_until(|| requests.posted() + requests.coalesced() == 3));
        assert_eq!(requests.posted(), 1);
        assert_eq!(requests.coalesced(), 2);
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let vsync = Arc::new(ManualVsync::new());
        let (requester, requests) = frame_requests();
        let mut pacer = FramePacer::new(vsync.clone(), requester, "test");

        pacer.stop();
        pacer.start().unwrap();
        pacer.start().unwrap();
        assert!(pacer.is_running());
        assert_eq!(vsync.subscriber_count(), 1);

        pacer.stop();
        pacer.stop();
        assert!(!pacer.is_running());

        // The subscription went away with the thread.
        assert_eq!(vsync.fire(), 0);
        assert!(!requests.is_pending());
    }

    #[test]
    fn restart_resubscribes() {
        let vsync = Arc::new(ManualVsync::new());
        let (requester, requests) = frame_requests();
        let mut pacer = FramePacer::new(vsync.clone(), requester, "test");

        pacer.start().unwrap();
        pacer.stop();
        pacer.start().unwrap();
        assert_eq!(vsync.fire(), 1);
        assert!(requests.receiver().recv_timeout(Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn interval_vsync_drives_frames() {
        let vsync = Arc::new(IntervalVsync::new(500));
        let drift = vsync.period().abs_diff(Duration::from_millis(2));
        assert!(drift < Duration::from_micros(1));

        let (requester, requests) = frame_requests();
        let mut pacer = FramePacer::new(vsync, requester, "test");
        pacer.start().unwrap();
        assert!(requests.receiver().recv_timeout(Duration::from_secs(5)).is_ok());
        drop(pacer);
    }
}
