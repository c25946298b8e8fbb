use crate::device::{SurfaceHandle, WindowSurface};
use crate::pacer::FramePacer;

/// Lifecycle state of a surface session.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SessionState {
    /// Constructed, or reset; `initialize` has not succeeded yet.
    Uninitialized,
    /// Compositor runtime up and GPU context created; no window surface bound.
    SessionActive,
    /// A window surface is handed to the compositor and frames are paced.
    SurfaceBound,
    Paused,
    Destroyed,
}

impl SessionState {
    /// States from which a window surface may be (re)bound.
    pub fn can_bind(self) -> bool {
        matches!(self, SessionState::SessionActive | SessionState::SurfaceBound)
    }
}

/// Mutable session record, guarded by the controller's lock.
pub(crate) struct SessionRecord {
    pub state: SessionState,
    pub compositor_initialized: bool,
    pub window_surface: Option<WindowSurface>,
    pub offscreen_surface: Option<SurfaceHandle>,
    pub pacer: Option<FramePacer>,
}

impl SessionRecord {
    pub fn new() -> Self {
        Self {
            state: SessionState::Uninitialized,
            compositor_initialized: false,
            window_surface: None,
            offscreen_surface: None,
            pacer: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state,
            compositor_initialized: self.compositor_initialized,
            window_surface: self.window_surface,
            offscreen_surface: self.offscreen_surface,
            pacing: self.pacer.as_ref().is_some_and(FramePacer::is_running),
        }
    }
}

/// Point-in-time copy of the session record.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SessionStatus {
    pub state: SessionState,
    pub compositor_initialized: bool,
    pub window_surface: Option<WindowSurface>,
    pub offscreen_surface: Option<SurfaceHandle>,
    /// Whether the frame pacer thread is running.
    pub pacing: bool,
}
