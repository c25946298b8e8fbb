use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crossbeam_channel::{Receiver, Sender};
use slotmap::{SlotMap, new_key_type};

use crate::error::{Result, RuntimeError};
use crate::gate::GraphicsThreadGate;

use super::cleanup::{Claimed, CleanupCallback, FinalizeBatch, NativeDeleter};
use super::object::{HybridCell, HybridObject, NativePtr, Tracking};
use super::sweeper::{GraphicsExecutor, Sweeper};

new_key_type! {
    /// Identifies one tracking record in the live set.
    pub struct TrackingKey;
}

/// Weak back-reference from the registry to a hybrid object, paired with the
/// object's pointer and cleanup callbacks.
pub(super) struct TrackingRecord {
    native: NativePtr,
    cleanups: Vec<CleanupCallback>,
    object: Weak<HybridCell>,
}

/// Snapshot of a live tracking record returned by [`NativeRegistry::lookup`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TrackingRef {
    pub key: TrackingKey,
    pub native: NativePtr,
    /// Whether the owning object still has strong handles.
    pub reachable: bool,
    pub cleanup_count: usize,
}

#[derive(Default)]
pub(super) struct LiveSet {
    records: SlotMap<TrackingKey, TrackingRecord>,
    by_native: HashMap<u64, TrackingKey>,
}

impl LiveSet {
    /// Removes a record and tombstones its object. Only the caller that gets
    /// `Some` may free the pointer.
    pub(super) fn claim(&mut self, key: TrackingKey) -> Option<Claimed> {
        let record = self.records.remove(key)?;
        self.by_native.remove(&record.native.get());

        if let Some(cell) = record.object.upgrade() {
            cell.native.store(0, Ordering::Release);
        }

        Some(Claimed {
            native: record.native,
            cleanups: record.cleanups,
        })
    }

    fn claim_all(&mut self) -> Vec<Claimed> {
        let keys: Vec<TrackingKey> = self.records.keys().collect();
        keys.into_iter().filter_map(|k| self.claim(k)).collect()
    }
}

#[derive(Clone)]
pub(super) struct GraphicsBinding {
    pub(super) gate: Arc<GraphicsThreadGate>,
    pub(super) executor: Arc<dyn GraphicsExecutor>,
}

pub(super) struct RegistryShared {
    live: Mutex<LiveSet>,
    unreachable_tx: Sender<TrackingKey>,
    pub(super) unreachable_rx: Receiver<TrackingKey>,
    pub(super) deleter: Arc<dyn NativeDeleter>,
    graphics: Mutex<Option<GraphicsBinding>>,
}

impl RegistryShared {
    pub(super) fn lock_live(&self) -> MutexGuard<'_, LiveSet> {
        // A panic while holding the lock cannot leave a half-claimed record:
        // claim is a single remove, so the set stays consistent.
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn graphics_binding(&self) -> Option<GraphicsBinding> {
        self.graphics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Finalizes claimed records on a thread allowed to run their callbacks.
    pub(super) fn dispatch(&self, claimed: Vec<Claimed>) {
        if claimed.is_empty() {
            return;
        }

        let (graphics, host): (Vec<_>, Vec<_>) =
            claimed.into_iter().partition(Claimed::needs_graphics);

        if !host.is_empty() {
            FinalizeBatch::new(host, self.deleter.clone()).run_without_graphics();
        }

        if graphics.is_empty() {
            return;
        }

        let batch = FinalizeBatch::new(graphics, self.deleter.clone());
        match self.graphics_binding() {
            Some(binding) if binding.gate.is_on_graphics_thread() => batch.run_on_graphics_thread(),
            Some(binding) => {
                log::trace!("marshaling {} finalizations to the graphics thread", batch.len());
                if let Err(batch) = binding.executor.submit(batch) {
                    log::warn!("graphics thread rejected finalize batch; freeing without GPU cleanup");
                    batch.run_without_graphics();
                }
            }
            None => batch.run_without_graphics(),
        }
    }
}

impl Drop for RegistryShared {
    fn drop(&mut self) {
        let live = self.live.get_mut().unwrap_or_else(PoisonError::into_inner);
        let remaining = live.claim_all();
        if remaining.is_empty() {
            return;
        }

        log::debug!("registry dropped with {} live native resources; freeing", remaining.len());
        let on_graphics = self
            .graphics
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|b| b.gate.is_on_graphics_thread());

        let batch = FinalizeBatch::new(remaining, self.deleter.clone());
        if on_graphics {
            batch.run_on_graphics_thread();
        } else {
            batch.run_without_graphics();
        }
    }
}

/// Tracks native resources owned by [`HybridObject`]s.
///
/// Cheap to clone; clones share one live set. Registration, lookup, explicit
/// release and the sweeper all serialize on the same lock. Cleanup callbacks
/// run after that lock is released, so a callback may attach or release other
/// objects.
#[derive(Clone)]
pub struct NativeRegistry {
    pub(super) shared: Arc<RegistryShared>,
}

impl NativeRegistry {
    /// Creates a registry that frees pointers through `deleter`.
    pub fn new(deleter: impl NativeDeleter + 'static) -> Self {
        let (unreachable_tx, unreachable_rx) = crossbeam_channel::unbounded();
        Self {
            shared: Arc::new(RegistryShared {
                live: Mutex::new(LiveSet::default()),
                unreachable_tx,
                unreachable_rx,
                deleter: Arc::new(deleter),
                graphics: Mutex::new(None),
            }),
        }
    }

    /// Starts tracking `native` as owned by `object`.
    ///
    /// Fails with [`RuntimeError::InvalidArgument`] when `native` is zero, when
    /// the object already owns (or owned) a pointer, or when `native` is
    /// already tracked for another object.
    pub fn attach(
        &self,
        object: &HybridObject,
        native: u64,
        cleanups: Vec<CleanupCallback>,
    ) -> Result<TrackingKey> {
        let native = NativePtr::new(native)
            .ok_or(RuntimeError::InvalidArgument("native pointer must be non-zero"))?;

        let mut live = self.shared.lock_live();

        if object.is_attached() {
            return Err(RuntimeError::InvalidArgument(
                "object already owns a native resource",
            ));
        }
        if live.by_native.contains_key(&native.get()) {
            return Err(RuntimeError::InvalidArgument("native pointer is already tracked"));
        }

        let key = live.records.insert(TrackingRecord {
            native,
            cleanups,
            object: Arc::downgrade(&object.cell),
        });
        live.by_native.insert(native.get(), key);

        object.cell.native.store(native.get(), Ordering::Release);
        // Cannot fail: `is_attached` was false and the lock is still held.
        let _ = object.cell.tracking.set(Tracking {
            key,
            unreachable: self.shared.unreachable_tx.clone(),
        });

        log::trace!("attached native {native} as {key:?}");
        Ok(key)
    }

    /// Finds the live record for `native`.
    ///
    /// Explicit release is the only path that needs this; unreachable objects
    /// are found through their queued keys.
    pub fn lookup(&self, native: u64) -> Option<TrackingRef> {
        let live = self.shared.lock_live();
        let key = *live.by_native.get(&native)?;
        let record = live.records.get(key)?;
        Some(TrackingRef {
            key,
            native: record.native,
            reachable: record.object.strong_count() > 0,
            cleanup_count: record.cleanups.len(),
        })
    }

    /// Frees the object's native resource now instead of waiting for it to
    /// become unreachable. No-op when the object owns nothing.
    ///
    /// Graphics callbacks requested from another thread complete on the
    /// render thread; the pointer is tombstoned before this returns.
    pub fn release_explicit(&self, object: &HybridObject) {
        let claimed = {
            let mut live = self.shared.lock_live();
            let Some(native) = object.native() else {
                return;
            };
            let Some(key) = live.by_native.get(&native.get()).copied() else {
                return;
            };
            live.claim(key)
        };

        if let Some(claimed) = claimed {
            log::trace!("explicit release of native {}", claimed.native);
            self.shared.dispatch(vec![claimed]);
        }
    }

    /// Number of live tracking records.
    pub fn live_count(&self) -> usize {
        self.shared.lock_live().records.len()
    }

    /// Routes graphics cleanup to the thread owning `gate`.
    pub fn bind_graphics(&self, gate: Arc<GraphicsThreadGate>, executor: Arc<dyn GraphicsExecutor>) {
        *self
            .shared
            .graphics
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(GraphicsBinding { gate, executor });
    }

    /// Forgets the graphics thread; later graphics callbacks are skipped.
    pub fn unbind_graphics(&self) {
        *self
            .shared
            .graphics
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// A sweeper draining this registry's unreachable notifications.
    pub fn sweeper(&self) -> Sweeper {
        Sweeper::new(self.shared.clone())
    }
}

impl std::fmt::Debug for NativeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeRegistry")
            .field("live", &self.live_count())
            .finish()
    }
}
