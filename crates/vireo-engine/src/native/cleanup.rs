use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::RuntimeError;

use super::object::NativePtr;

/// Frees native memory once every cleanup callback has run.
pub trait NativeDeleter: Send + Sync {
    fn delete(&self, native: NativePtr);
}

impl<F> NativeDeleter for F
where
    F: Fn(NativePtr) + Send + Sync,
{
    fn delete(&self, native: NativePtr) {
        self(native)
    }
}

/// Where a cleanup callback is allowed to run.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CleanupAffinity {
    /// Any thread.
    Host,
    /// Only the thread that owns the current GPU context.
    Graphics,
}

/// Work to run with the raw pointer right before it is freed.
///
/// Callbacks receive only the pointer; the owning object is already
/// unreachable when the sweeper runs them.
pub struct CleanupCallback {
    affinity: CleanupAffinity,
    run: Box<dyn FnOnce(NativePtr) + Send>,
}

impl CleanupCallback {
    pub fn host(run: impl FnOnce(NativePtr) + Send + 'static) -> Self {
        Self {
            affinity: CleanupAffinity::Host,
            run: Box::new(run),
        }
    }

    /// A callback that touches GPU state.
    pub fn graphics(run: impl FnOnce(NativePtr) + Send + 'static) -> Self {
        Self {
            affinity: CleanupAffinity::Graphics,
            run: Box::new(run),
        }
    }

    pub fn affinity(&self) -> CleanupAffinity {
        self.affinity
    }
}

impl fmt::Debug for CleanupCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanupCallback")
            .field("affinity", &self.affinity)
            .finish_non_exhaustive()
    }
}

/// A record removed from the live set whose pointer still has to be freed.
pub(super) struct Claimed {
    pub(super) native: NativePtr,
    pub(super) cleanups: Vec<CleanupCallback>,
}

impl Claimed {
    pub(super) fn needs_graphics(&self) -> bool {
        self.cleanups
            .iter()
            .any(|c| c.affinity == CleanupAffinity::Graphics)
    }

    fn finalize(self, deleter: &dyn NativeDeleter, graphics_available: bool) {
        let Claimed { native, cleanups } = self;

        for callback in cleanups {
            if callback.affinity == CleanupAffinity::Graphics && !graphics_available {
                log::warn!("skipping graphics cleanup for {native}: no GPU context");
                continue;
            }

            let run = callback.run;
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || run(native))) {
                let fault = RuntimeError::CleanupCallbackFault {
                    native: native.get(),
                    detail: panic_detail(payload.as_ref()),
                };
                log::error!("{fault}");
            }
        }

        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| deleter.delete(native))) {
            log::error!(
                "native delete for {native} panicked: {}",
                panic_detail(payload.as_ref())
            );
        }

        log::trace!("freed native {native}");
    }
}

/// Claimed records handed to whichever thread may finalize them.
///
/// Dropping an unfinished batch still frees its pointers (without graphics
/// callbacks), so a batch lost in a closed queue cannot leak.
pub struct FinalizeBatch {
    claimed: Vec<Claimed>,
    deleter: Arc<dyn NativeDeleter>,
}

impl FinalizeBatch {
    pub(super) fn new(claimed: Vec<Claimed>, deleter: Arc<dyn NativeDeleter>) -> Self {
        Self { claimed, deleter }
    }

    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }

    /// Runs every callback, graphics ones included. Call on the graphics thread.
    pub fn run_on_graphics_thread(mut self) {
        self.run(true);
    }

    /// Runs host callbacks and frees; graphics callbacks are skipped.
    pub fn run_without_graphics(mut self) {
        self.run(false);
    }

    fn run(&mut self, graphics_available: bool) {
        for claimed in self.claimed.drain(..) {
            claimed.finalize(self.deleter.as_ref(), graphics_available);
        }
    }
}

impl Drop for FinalizeBatch {
    fn drop(&mut self) {
        if !self.claimed.is_empty() {
            log::warn!(
                "finalize batch of {} dropped before running; freeing without GPU cleanup",
                self.claimed.len()
            );
            self.run(false);
        }
    }
}

impl fmt::Debug for FinalizeBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinalizeBatch")
            .field("len", &self.claimed.len())
            .finish()
    }
}

fn panic_detail(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
