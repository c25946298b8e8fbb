//! Frame timing for the render loop.
//!
//! The render thread owns one [`FrameClock`], ticks it once per drawn frame and
//! resets it on resume.

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};
