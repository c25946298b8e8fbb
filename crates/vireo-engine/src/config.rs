use std::time::Duration;

use crate::device::SurfaceAttributes;

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Attributes of every window surface handed to the compositor.
    pub surface: SurfaceAttributes,

    /// Refresh rate of the default vsync source.
    pub refresh_hz: u32,

    /// Upper bound on blocking render-thread handshakes.
    ///
    /// `None` waits indefinitely. On timeout `pause` leaves the compositor
    /// runtime initialized rather than shutting it down under the render
    /// thread.
    pub handshake_timeout: Option<Duration>,

    /// Prefix of spawned thread names (`<prefix>-render`, `<prefix>-pacer-<n>`).
    pub thread_name_prefix: String,

    /// Devices with a home key handle "back" themselves; no confirm-quit overlay.
    pub home_key_present: bool,

    /// Explicit framebuffer size, see [`framebuffer_size`].
    pub framebuffer: Option<(u32, u32)>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            surface: SurfaceAttributes {
                srgb: true,
                protected_content: false,
            },
            refresh_hz: 60,
            handshake_timeout: None,
            thread_name_prefix: "vireo".to_string(),
            home_key_present: false,
            framebuffer: None,
        }
    }
}

/// Window size for a display of `display` pixels.
///
/// Defaults to the display in landscape (long side as width). A requested
/// size replaces it only when it differs from the default in both
/// dimensions.
pub fn framebuffer_size(display: (u32, u32), requested: Option<(u32, u32)>) -> (u32, u32) {
    let (w, h) = display;
    let default = (w.max(h), w.min(h));

    match requested {
        Some((rw, rh)) if rw != default.0 && rh != default.1 => {
            log::debug!("framebuffer override {rw}x{rh} (display {}x{})", default.0, default.1);
            (rw, rh)
        }
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_landscape_display() {
        assert_eq!(framebuffer_size((1440, 2560), None), (2560, 1440));
        assert_eq!(framebuffer_size((2560, 1440), None), (2560, 1440));
    }

    #[test]
    fn override_needs_both_dimensions_to_differ() {
        assert_eq!(framebuffer_size((1440, 2560), Some((1024, 1024))), (1024, 1024));
        assert_eq!(framebuffer_size((1440, 2560), Some((2560, 1024))), (2560, 1440));
        assert_eq!(framebuffer_size((1440, 2560), Some((1920, 1440))), (2560, 1440));
    }

    #[test]
    fn default_config_requests_srgb() {
        let config = SessionConfig::default();
        assert!(config.surface.srgb);
        assert!(!config.surface.protected_content);
        assert_eq!(config.handshake_timeout, None);
    }
}
