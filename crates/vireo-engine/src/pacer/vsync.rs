use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

/// The display's periodic refresh signal.
///
/// Each subscription is an independent stream; dropping the receiver cancels
/// it.
pub trait VsyncSource: Send + Sync {
    fn subscribe(&self) -> Receiver<Instant>;
}

/// Fixed-rate signal derived from a refresh rate.
#[derive(Debug, Copy, Clone)]
pub struct IntervalVsync {
    period: Duration,
}

impl IntervalVsync {
    /// `refresh_hz` of zero falls back to 60 Hz.
    pub fn new(refresh_hz: u32) -> Self {
        let hz = if refresh_hz == 0 { 60 } else { refresh_hz };
        Self {
            period: Duration::from_secs_f64(1.0 / f64::from(hz)),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl VsyncSource for IntervalVsync {
    fn subscribe(&self) -> Receiver<Instant> {
        crossbeam_channel::tick(self.period)
    }
}

/// Signal fired by hand. Lets tests step frames deterministically.
#[derive(Debug, Default)]
pub struct ManualVsync {
    subscribers: Mutex<Vec<Sender<Instant>>>,
}

impl ManualVsync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers one signal to every live subscription; returns how many got it.
    pub fn fire(&self) -> usize {
        let now = Instant::now();
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(now).is_ok());
        subscribers.len()
    }

    /// Subscriptions still registered. Dropped ones are pruned on the next
    /// [`fire`](Self::fire).
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl VsyncSource for ManualVsync {
    fn subscribe(&self) -> Receiver<Instant> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }
}
