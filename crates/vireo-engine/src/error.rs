use std::time::Duration;

use thiserror::Error;

use crate::session::SessionState;

/// Errors surfaced by the runtime core.
///
/// Construction and creation failures are returned to the caller. Teardown
/// failures are built as values only so they can be logged; `pause`/`destroy`
/// never return them.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The immersive compositor is not present on this system. Permanent.
    #[error("immersive compositor not available: {0}")]
    CapabilityUnavailable(String),

    /// A context, surface or make-current call failed while binding.
    #[error("{what} failed (backend error 0x{code:x})")]
    ResourceCreationFailed { what: &'static str, code: i32 },

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("cannot {op} while the session is {state:?}")]
    InvalidTransition { op: &'static str, state: SessionState },

    /// The compositor refused a runtime or session request.
    #[error("compositor failure: {0}")]
    CompositorFailure(String),

    /// The hybrid object's native resource has already been freed.
    #[error("native resource already released")]
    NativeReleased,

    #[error("render thread is not running")]
    RenderThreadGone,

    #[error("render thread did not acknowledge within {0:?}")]
    HandshakeTimedOut(Duration),

    #[error("failed to spawn {name} thread")]
    ThreadSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("teardown step `{step}` failed: {detail}")]
    Teardown { step: &'static str, detail: String },

    #[error("cleanup callback for native 0x{native:x} faulted: {detail}")]
    CleanupCallbackFault { native: u64, detail: String },
}

impl RuntimeError {
    /// True for the "feature not available" condition hosts report to users
    /// instead of treating it as a crash.
    pub fn is_capability_unavailable(&self) -> bool {
        matches!(self, RuntimeError::CapabilityUnavailable(_))
    }
}

pub type Result<T, E = RuntimeError> = std::result::Result<T, E>;
