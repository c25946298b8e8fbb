//! Immersive compositor service seam.
//!
//! The compositor owns the display while a session is active: it takes over the
//! window surface between [`Compositor::enter_session`] and
//! [`Compositor::leave_session`]. Its runtime must be initialized before any
//! session and is shut down whenever the host pauses.

mod headless;
mod probe;

pub use headless::{CompositorCall, HeadlessCompositor};
pub use probe::{CapabilityProbe, PackageProbe};

/// Operations the session controller drives on the compositor service.
///
/// Implementations are host code; they report failures with `anyhow` and the
/// controller maps them onto [`RuntimeError`](crate::RuntimeError).
/// `initialize`, `shutdown` and `show_confirm_quit` are called from the
/// controller's thread; the rest from the render thread.
pub trait Compositor: Send {
    /// Brings the compositor runtime up. Failure means the capability is unusable.
    fn initialize(&mut self) -> anyhow::Result<()>;

    fn shutdown(&mut self);

    /// The render thread created its context and pixel buffer.
    fn on_surface_created(&mut self);

    /// Hands the current window surface to the compositor and starts a session.
    fn enter_session(&mut self) -> anyhow::Result<()>;

    /// Ends the session; no-op when none is active.
    fn leave_session(&mut self);

    /// Shows the "quit?" overlay.
    fn show_confirm_quit(&mut self);
}
