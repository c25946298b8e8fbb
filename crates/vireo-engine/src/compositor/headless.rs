use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use anyhow::bail;

use super::Compositor;

/// One recorded compositor request.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CompositorCall {
    Initialize,
    Shutdown,
    SurfaceCreated,
    EnterSession,
    LeaveSession,
    ConfirmQuit,
}

#[derive(Default)]
struct Journal {
    calls: Vec<(CompositorCall, ThreadId)>,
    runtime_up: bool,
    in_session: bool,
    fail_initialize: bool,
    fail_enter: bool,
}

/// In-process compositor that journals every request.
///
/// Clones share the journal: hand one to the controller and keep one to
/// inspect.
#[derive(Clone, Default)]
pub struct HeadlessCompositor {
    journal: Arc<Mutex<Journal>>,
}

impl HeadlessCompositor {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Journal> {
        self.journal.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: CompositorCall) -> MutexGuard<'_, Journal> {
        log::trace!("headless compositor: {call:?}");
        let mut journal = self.lock();
        journal.calls.push((call, thread::current().id()));
        journal
    }

    pub fn calls(&self) -> Vec<CompositorCall> {
        self.lock().calls.iter().map(|(c, _)| *c).collect()
    }

    /// Calls together with the thread each one arrived on.
    pub fn calls_with_threads(&self) -> Vec<(CompositorCall, ThreadId)> {
        self.lock().calls.clone()
    }

    pub fn count(&self, call: CompositorCall) -> usize {
        self.lock().calls.iter().filter(|(c, _)| *c == call).count()
    }

    pub fn is_runtime_up(&self) -> bool {
        self.lock().runtime_up
    }

    pub fn in_session(&self) -> bool {
        self.lock().in_session
    }

    pub fn set_fail_initialize(&self, fail: bool) {
        self.lock().fail_initialize = fail;
    }

    pub fn set_fail_enter(&self, fail: bool) {
        self.lock().fail_enter = fail;
    }
}

impl Compositor for HeadlessCompositor {
    fn initialize(&mut self) -> anyhow::Result<()> {
        let mut journal = self.record(CompositorCall::Initialize);
        if journal.fail_initialize {
            bail!("compositor runtime refused to start");
        }
        journal.runtime_up = true;
        Ok(())
    }

    fn shutdown(&mut self) {
        let mut journal = self.record(CompositorCall::Shutdown);
        journal.runtime_up = false;
        journal.in_session = false;
    }

    fn on_surface_created(&mut self) {
        self.record(CompositorCall::SurfaceCreated);
    }

    fn enter_session(&mut self) -> anyhow::Result<()> {
        let mut journal = self.record(CompositorCall::EnterSession);
        if !journal.runtime_up {
            bail!("session requested before the runtime was initialized");
        }
        if journal.fail_enter {
            bail!("compositor rejected the window surface");
        }
        journal.in_session = true;
        Ok(())
    }

    fn leave_session(&mut self) {
        let mut journal = self.record(CompositorCall::LeaveSession);
        journal.in_session = false;
    }

    fn show_confirm_quit(&mut self) {
        self.record(CompositorCall::ConfirmQuit);
    }
}

impl std::fmt::Debug for HeadlessCompositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let journal = self.lock();
        f.debug_struct("HeadlessCompositor")
            .field("calls", &journal.calls.len())
            .field("runtime_up", &journal.runtime_up)
            .field("in_session", &journal.in_session)
            .finish()
    }
}
