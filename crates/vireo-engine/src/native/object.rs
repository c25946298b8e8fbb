use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use crossbeam_channel::Sender;

use crate::error::{Result, RuntimeError};

use super::registry::TrackingKey;

/// Address of a natively-allocated resource. Never zero.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct NativePtr(NonZeroU64);

impl NativePtr {
    /// Returns `None` for the null pointer.
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::LowerHex for NativePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0.get(), f)
    }
}

impl fmt::Display for NativePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0.get())
    }
}

/// Managed handle that may own one native resource.
///
/// Clones share identity. When the last clone drops, the object becomes
/// unreachable and its tracking key is queued for the
/// [`Sweeper`](super::Sweeper); nothing is freed on the dropping thread.
///
/// Once the registry frees the resource the handle is tombstoned:
/// [`native`](Self::native) returns `None` from then on and the object can
/// never be attached again.
#[derive(Clone, Default)]
pub struct HybridObject {
    pub(super) cell: Arc<HybridCell>,
}

#[derive(Default)]
pub(super) struct HybridCell {
    /// Mirror of the tracked pointer; 0 before attach and after free.
    pub(super) native: AtomicU64,
    pub(super) tracking: OnceLock<Tracking>,
}

pub(super) struct Tracking {
    pub(super) key: TrackingKey,
    pub(super) unreachable: Sender<TrackingKey>,
}

impl HybridObject {
    /// Creates an object that owns nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// The owned pointer, or `None` when unattached or already released.
    pub fn native(&self) -> Option<NativePtr> {
        NativePtr::new(self.cell.native.load(Ordering::Acquire))
    }

    /// Like [`native`](Self::native) but reports a released resource as an error.
    pub fn require_native(&self) -> Result<NativePtr> {
        self.native().ok_or(RuntimeError::NativeReleased)
    }

    /// True once a pointer was attached, whether or not it is still live.
    pub fn is_attached(&self) -> bool {
        self.cell.tracking.get().is_some()
    }

    /// True when a pointer was attached and has since been freed.
    pub fn is_released(&self) -> bool {
        self.is_attached() && self.native().is_none()
    }

    /// Tracking key assigned by the registry at attach time.
    pub fn tracking_key(&self) -> Option<TrackingKey> {
        self.cell.tracking.get().map(|t| t.key)
    }
}

impl fmt::Debug for HybridObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HybridObject")
            .field("native", &self.native())
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl Drop for HybridCell {
    fn drop(&mut self) {
        // The registry may already be gone; nothing is left to notify then.
        if let Some(tracking) = self.tracking.get() {
            let _ = tracking.unreachable.send(tracking.key);
        }
    }
}
