//! Render thread.
//!
//! One thread per session owns the GPU context. It draws when the frame pacer
//! asks, runs jobs the session controller posts (binding and tearing down the
//! window surface), and finalizes native resources whose cleanup needs the
//! context.

pub(crate) mod handshake;
mod renderer;
mod thread;

pub use renderer::Renderer;
pub(crate) use thread::{RenderLoop, RenderSetup, RenderThread, SurfaceHooks};
