use std::sync::Arc;

use super::attribs::{self, NONE};
use super::backend::{ConfigHandle, ContextHandle, GraphicsBackend, SurfaceHandle};

/// Picks the framebuffer config every surface of a session shares.
pub trait ConfigChooser: Send + Sync {
    fn choose(&self, backend: &mut dyn GraphicsBackend) -> Option<ConfigHandle>;
}

/// Creates and destroys the session's GPU context.
pub trait ContextFactory: Send + Sync {
    fn create(&self, backend: &mut dyn GraphicsBackend, config: ConfigHandle) -> Option<ContextHandle>;

    fn destroy(&self, backend: &mut dyn GraphicsBackend, context: ContextHandle) -> bool {
        backend.destroy_context(context)
    }
}

/// Creates the offscreen surface the context is current on whenever no window
/// surface is bound.
pub trait OffscreenSurfaceFactory: Send + Sync {
    fn create(&self, backend: &mut dyn GraphicsBackend, config: ConfigHandle) -> Option<SurfaceHandle>;

    fn destroy(&self, backend: &mut dyn GraphicsBackend, surface: SurfaceHandle) -> bool {
        backend.destroy_surface(surface)
    }
}

/// First config that is ES3-renderable, usable for both window and pixel-buffer
/// surfaces, RGBA 8/8/8/8, with no depth buffer and no multisampling.
///
/// The compositor supplies its own depth and MSAA buffers; the window surface
/// is only ever a color target.
#[derive(Debug, Copy, Clone, Default)]
pub struct Rgba8ConfigChooser;

impl Rgba8ConfigChooser {
    const REQUIRED: [(i32, i32); 6] = [
        (attribs::RED_SIZE, 8),
        (attribs::GREEN_SIZE, 8),
        (attribs::BLUE_SIZE, 8),
        (attribs::ALPHA_SIZE, 8),
        (attribs::DEPTH_SIZE, 0),
        (attribs::SAMPLES, 0),
    ];

    fn matches(backend: &mut dyn GraphicsBackend, config: ConfigHandle) -> bool {
        let has_bits = |backend: &mut dyn GraphicsBackend, attrib: i32, bits: i32| {
            backend
                .config_attrib(config, attrib)
                .is_some_and(|v| v & bits == bits)
        };

        if !has_bits(backend, attribs::RENDERABLE_TYPE, attribs::OPENGL_ES3_BIT) {
            return false;
        }
        if !has_bits(
            backend,
            attribs::SURFACE_TYPE,
            attribs::WINDOW_BIT | attribs::PBUFFER_BIT,
        ) {
            return false;
        }

        Self::REQUIRED
            .iter()
            .all(|&(attrib, want)| backend.config_attrib(config, attrib) == Some(want))
    }
}

impl ConfigChooser for Rgba8ConfigChooser {
    fn choose(&self, backend: &mut dyn GraphicsBackend) -> Option<ConfigHandle> {
        let configs = backend.configs()?;
        log::trace!("scanning {} framebuffer configs", configs.len());

        configs.into_iter().find(|&c| Self::matches(backend, c))
    }
}

/// OpenGL ES 3 context.
#[derive(Debug, Copy, Clone, Default)]
pub struct Es3ContextFactory;

impl ContextFactory for Es3ContextFactory {
    fn create(&self, backend: &mut dyn GraphicsBackend, config: ConfigHandle) -> Option<ContextHandle> {
        backend.create_context(config, &[attribs::CONTEXT_CLIENT_VERSION, 3, NONE])
    }
}

/// Tiny pixel-buffer surface, 16×16 unless configured otherwise.
#[derive(Debug, Copy, Clone)]
pub struct PixelBufferSurfaceFactory {
    pub width: i32,
    pub height: i32,
}

impl Default for PixelBufferSurfaceFactory {
    fn default() -> Self {
        Self {
            width: 16,
            height: 16,
        }
    }
}

impl OffscreenSurfaceFactory for PixelBufferSurfaceFactory {
    fn create(&self, backend: &mut dyn GraphicsBackend, config: ConfigHandle) -> Option<SurfaceHandle> {
        backend.create_pbuffer_surface(
            config,
            &[attribs::WIDTH, self.width, attribs::HEIGHT, self.height, NONE],
        )
    }
}

/// The three strategies a [`GraphicsContext`](super::GraphicsContext) is built from.
#[derive(Clone)]
pub struct SurfaceStrategies {
    pub config: Arc<dyn ConfigChooser>,
    pub context: Arc<dyn ContextFactory>,
    pub offscreen: Arc<dyn OffscreenSurfaceFactory>,
}

impl Default for SurfaceStrategies {
    fn default() -> Self {
        Self {
            config: Arc::new(Rgba8ConfigChooser),
            context: Arc::new(Es3ContextFactory),
            offscreen: Arc::new(PixelBufferSurfaceFactory::default()),
        }
    }
}

impl std::fmt::Debug for SurfaceStrategies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceStrategies").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::headless::{ConfigSpec, HeadlessBackend};

    #[test]
    fn chooser_skips_non_matching_configs() {
        let (mut backend, _probe) = HeadlessBackend::new();
        let chosen = Rgba8ConfigChooser.choose(&mut backend).unwrap();
        assert_eq!(Some(chosen), backend.first_matching_config());
    }

    #[test]
    fn chooser_rejects_depth_and_msaa() {
        let (mut backend, _probe) = HeadlessBackend::with_configs(vec![
            ConfigSpec {
                depth: 24,
                ..ConfigSpec::RGBA8_ES3
            },
            ConfigSpec {
                samples: 4,
                ..ConfigSpec::RGBA8_ES3
            },
            ConfigSpec {
                surface_type: attribs::WINDOW_BIT,
                ..ConfigSpec::RGBA8_ES3
            },
        ]);
        assert_eq!(Rgba8ConfigChooser.choose(&mut backend), None);
    }

    #[test]
    fn context_requests_client_version_three() {
        let (mut backend, probe) = HeadlessBackend::new();
        let config = Rgba8ConfigChooser.choose(&mut backend).unwrap();
        Es3ContextFactory.create(&mut backend, config).unwrap();
        assert_eq!(probe.context_client_version(), Some(3));
    }

    #[test]
    fn pixel_buffer_is_sixteen_square() {
        let (mut backend, probe) = HeadlessBackend::new();
        let config = Rgba8ConfigChooser.choose(&mut backend).unwrap();
        let surface = PixelBufferSurfaceFactory::default()
            .create(&mut backend, config)
            .unwrap();
        let info = probe.surface(surface).unwrap();
        assert_eq!((info.width, info.height), (16, 16));
    }
}
