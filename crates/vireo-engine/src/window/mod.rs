//! winit host shell.
//!
//! Owns the `winit` EventLoop and Window, and drives a session controller
//! from the platform lifecycle.

mod runtime;

pub use runtime::{Shell, ShellConfig};
