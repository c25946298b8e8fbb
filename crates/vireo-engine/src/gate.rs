//! Graphics thread gate.
//!
//! GPU contexts are bound to the thread that made them current. Every call
//! that mutates context or surface state asserts it runs on that thread;
//! violating this is a programming error, so the assertion panics rather than
//! returning an error.

use std::thread::{self, ThreadId};

use state::InitCell;

/// Records which thread owns the current GPU context.
///
/// One gate exists per initialized session; the identity is written once, when
/// the context first becomes current, and stays valid for the lifetime of that
/// context.
pub struct GraphicsThreadGate {
    owner: InitCell<ThreadId>,
}

impl GraphicsThreadGate {
    pub fn new() -> Self {
        Self {
            owner: InitCell::new(),
        }
    }

    /// Marks the calling thread as the graphics thread.
    ///
    /// Repeated calls from the same thread are no-ops.
    ///
    /// # Panics
    ///
    /// If a different thread already made the context current.
    pub fn mark_current(&self) {
        let me = thread::current().id();
        if self.owner.set(me) {
            log::debug!(
                "graphics thread is {}",
                thread::current().name().unwrap_or("<unnamed>")
            );
            return;
        }

        if let Some(owner) = self.owner.try_get() {
            if *owner != me {
                contract_violation("make the context current", *owner);
            }
        }
    }

    /// True when called on the thread that owns the context.
    pub fn is_on_graphics_thread(&self) -> bool {
        self.owner
            .try_get()
            .is_some_and(|owner| *owner == thread::current().id())
    }

    /// # Panics
    ///
    /// When called off the graphics thread, or before any context was made
    /// current.
    #[track_caller]
    pub fn assert_on_graphics_thread(&self) {
        match self.owner.try_get() {
            Some(owner) if *owner == thread::current().id() => {}
            Some(owner) => contract_violation("issue a GPU call", *owner),
            None => {
                log::error!("GPU call before any context was made current");
                panic!("graphics thread contract violated: no current context");
            }
        }
    }

    /// The owning thread, once known.
    pub fn owner(&self) -> Option<ThreadId> {
        self.owner.try_get().copied()
    }
}

impl Default for GraphicsThreadGate {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GraphicsThreadGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsThreadGate")
            .field("owner", &self.owner())
            .finish()
    }
}

#[track_caller]
fn contract_violation(action: &str, owner: ThreadId) -> ! {
    let current = thread::current();
    log::error!(
        "thread {:?} ({}) tried to {action}; graphics thread is {owner:?}",
        current.id(),
        current.name().unwrap_or("<unnamed>"),
    );
    panic!("graphics thread contract violated: {action} off the graphics thread");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn unmarked_gate_is_never_on_graphics_thread() {
        let gate = GraphicsThreadGate::new();
        assert!(!gate.is_on_graphics_thread());
        assert_eq!(gate.owner(), None);
    }

    #[test]
    fn marking_thread_owns_gate() {
        let gate = GraphicsThreadGate::new();
        gate.mark_current();
        gate.mark_current();
        assert!(gate.is_on_graphics_thread());
        gate.assert_on_graphics_thread();
        assert_eq!(gate.owner(), Some(thread::current().id()));
    }

    #[test]
    fn other_threads_are_rejected() {
        let gate = Arc::new(GraphicsThreadGate::new());
        gate.mark_current();

        let g = gate.clone();
        let on_other = thread::spawn(move || g.is_on_graphics_thread()).join().unwrap();
        assert!(!on_other);

        let g = gate.clone();
        let asserted = thread::spawn(move || g.assert_on_graphics_thread()).join();
        assert!(asserted.is_err());
    }

    #[test]
    #[should_panic(expected = "no current context")]
    fn assert_before_mark_panics() {
        GraphicsThreadGate::new().assert_on_graphics_thread();
    }

    #[test]
    fn second_thread_cannot_claim_gate() {
        let gate = Arc::new(GraphicsThreadGate::new());
        gate.mark_current();

        let g = gate.clone();
        assert!(thread::spawn(move || g.mark_current()).join().is_err());
        assert!(gate.is_on_graphics_thread());
    }
}
