//! GPU context and surface management.
//!
//! This module is responsible for:
//! - the EGL-shaped [`GraphicsBackend`] seam to the display layer
//! - choosing a config and creating the context + pixel buffer ([`SurfaceStrategies`])
//! - creating, binding and destroying the window surface ([`GraphicsContext`])

pub mod attribs;
mod backend;
mod context;
pub mod headless;
mod strategy;

pub use attribs::SurfaceAttributes;
pub use backend::{ConfigHandle, ContextHandle, GraphicsBackend, SurfaceHandle};
pub use context::{GraphicsContext, WindowSurface};
pub use strategy::{
    ConfigChooser, ContextFactory, Es3ContextFactory, OffscreenSurfaceFactory,
    PixelBufferSurfaceFactory, Rgba8ConfigChooser, SurfaceStrategies,
};
