use std::sync::Arc;

use super::cleanup::FinalizeBatch;
use super::registry::RegistryShared;

/// Runs finalize batches on the graphics thread.
///
/// `submit` hands the batch back when the thread can no longer accept work.
pub trait GraphicsExecutor: Send + Sync {
    fn submit(&self, batch: FinalizeBatch) -> Result<(), FinalizeBatch>;
}

/// Drains unreachable-object notifications and frees their native resources.
///
/// Call [`drain`](Self::drain) periodically: the render thread does so after
/// every frame and the host shell after every lifecycle event.
#[derive(Clone)]
pub struct Sweeper {
    shared: Arc<RegistryShared>,
}

impl Sweeper {
    pub(super) fn new(shared: Arc<RegistryShared>) -> Self {
        Self { shared }
    }

    /// Finalizes every object that became unreachable since the last drain.
    ///
    /// Returns how many records were claimed. A record is claimed at most once,
    /// so concurrent or repeated drains never free a pointer twice.
    pub fn drain(&self) -> usize {
        let claimed = {
            let mut live = self.shared.lock_live();
            let mut claimed = Vec::new();
            while let Ok(key) = self.shared.unreachable_rx.try_recv() {
                if let Some(c) = live.claim(key) {
                    claimed.push(c);
                }
            }
            claimed
        };

        let count = claimed.len();
        if count > 0 {
            log::debug!("sweeper claimed {count} unreachable native resources");
        }
        self.shared.dispatch(claimed);
        count
    }

    /// Notifications queued but not yet drained.
    pub fn pending(&self) -> usize {
        self.shared.unreachable_rx.len()
    }
}

impl std::fmt::Debug for Sweeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sweeper")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Barrier, Mutex};
    use std::thread;

    use crate::gate::GraphicsThreadGate;
    use crate::native::{CleanupCallback, HybridObject, NativePtr, NativeRegistry};

    use super::*;

    fn tallying_registry() -> (NativeRegistry, Arc<Mutex<HashMap<u64, usize>>>) {
        let frees = Arc::new(Mutex::new(HashMap::new()));
        let sink = frees.clone();
        let registry = NativeRegistry::new(move |p: NativePtr| {
            *sink.lock().unwrap().entry(p.get()).or_insert(0) += 1;
        });
        (registry, frees)
    }

    // ── drain ─────────────────────────────────────────────────────────────

    #[test]
    fn drain_finalizes_dropped_objects_in_callback_order() {
        let (registry, frees) = tallying_registry();
        let log = Arc::new(Mutex::new(Vec::new()));

        let object = HybridObject::new();
        let callbacks = (0..3)
            .map(|i| {
                let log = log.clone();
                CleanupCallback::host(move |p| log.lock().unwrap().push((i, p.get())))
            })
            .collect();
        registry.attach(&object, 0xabc, callbacks).unwrap();

        let sweeper = registry.sweeper();
        assert_eq!(sweeper.drain(), 0);
        assert!(log.lock().unwrap().is_empty());

        drop(object);
        assert_eq!(sweeper.pending(), 1);
        assert_eq!(sweeper.drain(), 1);

        assert_eq!(*log.lock().unwrap(), vec![(0, 0xabc), (1, 0xabc), (2, 0xabc)]);
        assert_eq!(frees.lock().unwrap().get(&0xabc), Some(&1));
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn second_drain_is_noop() {
        let (registry, frees) = tallying_registry();
        let object = HybridObject::new();
        registry.attach(&object, 0x1, Vec::new()).unwrap();
        drop(object);

        let sweeper = registry.sweeper();
        assert_eq!(sweeper.drain(), 1);
        assert_eq!(sweeper.drain(), 0);
        assert_eq!(frees.lock().unwrap().get(&0x1), Some(&1));
    }

    #[test]
    fn clones_keep_object_reachable() {
        let (registry, frees) = tallying_registry();
        let object = HybridObject::new();
        registry.attach(&object, 0x2, Vec::new()).unwrap();
        let alias = object.clone();

        drop(object);
        assert_eq!(registry.sweeper().drain(), 0);
        assert_eq!(alias.native().map(NativePtr::get), Some(0x2));

        drop(alias);
        assert_eq!(registry.sweeper().drain(), 1);
        assert_eq!(frees.lock().unwrap().len(), 1);
    }

    #[test]
    fn panicking_callback_does_not_block_free() {
        let (registry, frees) = tallying_registry();
        let after = Arc::new(AtomicUsize::new(0));

        let object = HybridObject::new();
        let a = after.clone();
        registry
            .attach(
                &object,
                0x3,
                vec![
                    CleanupCallback::host(|_| panic!("cleanup exploded")),
                    CleanupCallback::host(move |_| {
                        a.fetch_add(1, Ordering::SeqCst);
                    }),
                ],
            )
            .unwrap();
        drop(object);

        registry.sweeper().drain();
        assert_eq!(after.load(Ordering::SeqCst), 1);
        assert_eq!(frees.lock().unwrap().get(&0x3), Some(&1));
    }

    #[test]
    fn callback_may_attach_another_object() {
        let (registry, frees) = tallying_registry();
        let spawned = Arc::new(Mutex::new(None));

        let object = HybridObject::new();
        let (reg, slot) = (registry.clone(), spawned.clone());
        registry
            .attach(
                &object,
                0x10,
                vec![CleanupCallback::host(move |_| {
                    let replacement = HybridObject::new();
                    reg.attach(&replacement, 0x11, Vec::new()).unwrap();
                    *slot.lock().unwrap() = Some(replacement);
                })],
            )
            .unwrap();
        drop(object);

        registry.sweeper().drain();
        assert_eq!(frees.lock().unwrap().get(&0x10), Some(&1));
        assert!(registry.lookup(0x11).is_some());
    }

    #[test]
    fn graphics_batch_marshaled_to_executor() {
        struct Collect(Mutex<Vec<FinalizeBatch>>);
        impl GraphicsExecutor for Collect {
            fn submit(&self, batch: FinalizeBatch) -> Result<(), FinalizeBatch> {
                self.0.lock().unwrap().push(batch);
                Ok(())
            }
        }

        let (registry, frees) = tallying_registry();
        let executor = Arc::new(Collect(Mutex::new(Vec::new())));

        // Gate owned by another thread, so the sweeper has to marshal.
        let gate = Arc::new(GraphicsThreadGate::new());
        let g = gate.clone();
        thread::spawn(move || g.mark_current()).join().unwrap();
        registry.bind_graphics(gate, executor.clone());

        let ran = Arc::new(AtomicUsize::new(0));
        let object = HybridObject::new();
        let r = ran.clone();
        registry
            .attach(
                &object,
                0x20,
                vec![CleanupCallback::graphics(move |_| {
                    r.fetch_add(1, Ordering::SeqCst);
                })],
            )
            .unwrap();
        drop(object);

        assert_eq!(registry.sweeper().drain(), 1);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert!(frees.lock().unwrap().is_empty());

        let batch = executor.0.lock().unwrap().pop().unwrap();
        batch.run_on_graphics_thread();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(frees.lock().unwrap().get(&0x20), Some(&1));
    }

    // ── stress ────────────────────────────────────────────────────────────

    #[test]
    fn concurrent_attach_and_drain_free_each_pointer_once() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 250;

        let (registry, frees) = tallying_registry();
        let callbacks_run = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS + 1));
        let done = Arc::new(AtomicUsize::new(0));

        let drainer = {
            let sweeper = registry.sweeper();
            let barrier = barrier.clone();
            let done = done.clone();
            thread::spawn(move || {
                barrier.wait();
                let mut total = 0;
                while done.load(Ordering::SeqCst) < THREADS {
                    total += sweeper.drain();
                    thread::yield_now();
                }
                total + sweeper.drain()
            })
        };

        let workers: Vec<_> = (0..THREADS)
            .map(|t| {
                let registry = registry.clone();
                let callbacks_run = callbacks_run.clone();
                let barrier = barrier.clone();
                let done = done.clone();
                thread::spawn(move || {
                    barrier.wait();
                    let mut kept = Vec::new();
                    for i in 0..PER_THREAD {
                        let object = HybridObject::new();
                        let native = ((t * PER_THREAD + i) as u64 + 1) * 16;
                        let (c1, c2) = (callbacks_run.clone(), callbacks_run.clone());
                        registry
                            .attach(
                                &object,
                                native,
                                vec![
                                    CleanupCallback::host(move |_| {
                                        c1.fetch_add(1, Ordering::SeqCst);
                                    }),
                                    CleanupCallback::host(move |_| {
                                        c2.fetch_add(1, Ordering::SeqCst);
                                    }),
                                ],
                            )
                            .unwrap();
                        if i % 3 == 0 {
                            registry.release_explicit(&object);
                        }
                        if i % 2 == 0 {
                            kept.push(object);
                        }
                    }
                    drop(kept);
                    done.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        barrier.wait();
        for w in workers {
            w.join().unwrap();
        }
        drainer.join().unwrap();
        registry.sweeper().drain();

        let total = THREADS * PER_THREAD;
        let frees = frees.lock().unwrap();
        assert_eq!(frees.len(), total);
        assert!(frees.values().all(|&n| n == 1));
        assert_eq!(callbacks_run.load(Ordering::SeqCst), total * 2);
        assert_eq!(registry.live_count(), 0);
    }
}
