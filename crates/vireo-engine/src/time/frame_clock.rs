use std::time::{Duration, Instant};

/// Timing of one drawn frame, handed to the renderer.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Seconds since the previous drawn frame, clamped.
    pub dt: f32,

    pub now: Instant,

    /// Frames drawn since the render thread started. Survives pause/resume.
    pub frame_index: u64,

    /// Frames drawn since the last resume.
    pub frames_since_resume: u64,
}

/// Render-thread frame clock.
///
/// Delta time is clamped so a frame following a pause, a debugger stop or a
/// long compositor stall does not see a multi-second step.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
    frame_index: u64,
    frames_since_resume: u64,
    dt_min: Duration,
    dt_max: Duration,
}

impl FrameClock {
    /// Clamps `dt` to between 0.1 ms and a quarter second.
    pub fn new() -> Self {
        Self::with_clamps(Duration::from_micros(100), Duration::from_millis(250))
    }

    pub fn with_clamps(dt_min: Duration, dt_max: Duration) -> Self {
        debug_assert!(dt_min <= dt_max);
        Self {
            last: Instant::now(),
            frame_index: 0,
            frames_since_resume: 0,
            dt_min,
            dt_max,
        }
    }

    /// Restarts the baseline after a pause so the first resumed frame sees a
    /// nominal `dt` instead of the pause length.
    pub fn reset(&mut self) {
        self.last = Instant::now();
        self.frames_since_resume = 0;
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn tick(&mut self) -> FrameTime {
        let now = Instant::now();
        let dt = now
            .saturating_duration_since(self.last)
            .clamp(self.dt_min, self.dt_max);
        self.last = now;

        let ft = FrameTime {
            dt: dt.as_secs_f32(),
            now,
            frame_index: self.frame_index,
            frames_since_resume: self.frames_since_resume,
        };

        self.frame_index = self.frame_index.wrapping_add(1);
        self.frames_since_resume = self.frames_since_resume.wrapping_add(1);
        ft
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
