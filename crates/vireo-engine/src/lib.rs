//! Vireo engine crate.
//!
//! Runtime core for head-mounted rendering: native handle lifecycle with
//! deferred graphics cleanup, and the compositor surface session driven
//! by a dedicated render thread.

pub mod compositor;
pub mod config;
pub mod device;
pub mod error;
pub mod gate;
pub mod native;
pub mod pacer;
pub mod render;
pub mod session;
pub mod time;
pub mod window;

pub mod logging;

pub use config::SessionConfig;
pub use error::{Result, RuntimeError};
pub use render::Renderer;
pub use session::{SessionController, SessionState, SessionStatus};
