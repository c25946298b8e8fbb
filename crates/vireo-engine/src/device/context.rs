use std::sync::Arc;

use crate::error::{Result, RuntimeError};
use crate::gate::GraphicsThreadGate;

use super::attribs::SurfaceAttributes;
use super::backend::{ConfigHandle, ContextHandle, GraphicsBackend, SurfaceHandle};
use super::strategy::SurfaceStrategies;

/// On-screen surface currently handed to the compositor.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct WindowSurface {
    pub handle: SurfaceHandle,
    pub width: u32,
    pub height: u32,
}

/// GPU context plus the surfaces it renders to.
///
/// Lives on the render thread. The context is current on the pixel buffer
/// except for the brief window while the compositor is handed the window
/// surface. Every method asserts it is called on the graphics thread.
pub struct GraphicsContext {
    backend: Box<dyn GraphicsBackend>,
    strategies: SurfaceStrategies,
    config: ConfigHandle,
    context: Option<ContextHandle>,
    pixel_buffer: Option<SurfaceHandle>,
    window: Option<WindowSurface>,
    gate: Arc<GraphicsThreadGate>,
}

impl GraphicsContext {
    /// Chooses a config, creates the context and its pixel buffer, and makes
    /// the context current. The calling thread becomes the graphics thread.
    pub fn create(
        mut backend: Box<dyn GraphicsBackend>,
        strategies: SurfaceStrategies,
        gate: Arc<GraphicsThreadGate>,
    ) -> Result<Self> {
        let config = strategies
            .config
            .choose(backend.as_mut())
            .ok_or_else(|| failed("choose framebuffer config", backend.as_mut()))?;
        log::debug!("chose framebuffer config {config:?}");

        let context = strategies
            .context
            .create(backend.as_mut(), config)
            .ok_or_else(|| failed("create context", backend.as_mut()))?;

        let Some(pixel_buffer) = strategies.offscreen.create(backend.as_mut(), config) else {
            let err = failed("create pixel buffer", backend.as_mut());
            strategies.context.destroy(backend.as_mut(), context);
            return Err(err);
        };

        if !backend.make_current(Some(pixel_buffer), context) {
            let err = failed("make pixel buffer current", backend.as_mut());
            strategies.offscreen.destroy(backend.as_mut(), pixel_buffer);
            strategies.context.destroy(backend.as_mut(), context);
            return Err(err);
        }
        gate.mark_current();
        log::debug!("context {context:?} current on pixel buffer {pixel_buffer:?}");

        Ok(Self {
            backend,
            strategies,
            config,
            context: Some(context),
            pixel_buffer: Some(pixel_buffer),
            window: None,
            gate,
        })
    }

    pub fn gate(&self) -> &Arc<GraphicsThreadGate> {
        &self.gate
    }

    pub fn window_surface(&self) -> Option<WindowSurface> {
        self.window
    }

    pub fn pixel_buffer(&self) -> Option<SurfaceHandle> {
        self.pixel_buffer
    }

    fn live_context(&self) -> Result<ContextHandle> {
        self.context.ok_or(RuntimeError::ResourceCreationFailed {
            what: "use released context",
            code: 0,
        })
    }

    /// Creates the window surface. Any previous one must already be destroyed.
    pub fn create_window_surface(
        &mut self,
        width: u32,
        height: u32,
        attributes: SurfaceAttributes,
    ) -> Result<WindowSurface> {
        self.gate.assert_on_graphics_thread();
        self.live_context()?;
        if self.window.is_some() {
            return Err(RuntimeError::InvalidArgument("window surface already exists"));
        }

        let list = attributes.to_attrib_list();
        let handle = self
            .backend
            .create_window_surface(self.config, width, height, &list)
            .ok_or_else(|| failed("create window surface", self.backend.as_mut()))?;

        let surface = WindowSurface {
            handle,
            width,
            height,
        };
        log::debug!("window surface {handle:?} created at {width}x{height}");
        self.window = Some(surface);
        Ok(surface)
    }

    pub fn make_window_current(&mut self) -> Result<()> {
        self.gate.assert_on_graphics_thread();
        let context = self.live_context()?;
        let Some(window) = self.window else {
            return Err(RuntimeError::InvalidArgument("no window surface to make current"));
        };

        if !self.backend.make_current(Some(window.handle), context) {
            return Err(failed("make window surface current", self.backend.as_mut()));
        }
        Ok(())
    }

    pub fn make_offscreen_current(&mut self) -> Result<()> {
        self.gate.assert_on_graphics_thread();
        let context = self.live_context()?;
        let Some(pixel_buffer) = self.pixel_buffer else {
            return Err(RuntimeError::InvalidArgument("pixel buffer already released"));
        };

        if !self.backend.make_current(Some(pixel_buffer), context) {
            return Err(failed("make pixel buffer current", self.backend.as_mut()));
        }
        Ok(())
    }

    /// Unbinds and destroys the window surface, if any.
    ///
    /// Leaves nothing current; callers rebind the pixel buffer when they
    /// keep rendering.
    pub fn destroy_window_surface(&mut self) -> Result<()> {
        self.gate.assert_on_graphics_thread();
        let Some(window) = self.window.take() else {
            return Ok(());
        };

        if let Some(context) = self.context {
            if !self.backend.make_current(None, context) {
                log::warn!(
                    "unbinding before destroying {:?} failed (0x{:x})",
                    window.handle,
                    self.backend.last_error()
                );
            }
        }

        if !self.backend.destroy_surface(window.handle) {
            return Err(RuntimeError::Teardown {
                step: "destroy window surface",
                detail: format!("backend error 0x{:x}", self.backend.last_error()),
            });
        }
        log::debug!("window surface {:?} destroyed", window.handle);
        Ok(())
    }

    /// Releases window surface, pixel buffer and context, in that order.
    ///
    /// Tolerates partial state; failures are logged. Safe to call twice.
    pub fn release(&mut self) {
        if self.context.is_none() && self.pixel_buffer.is_none() && self.window.is_none() {
            return;
        }
        self.gate.assert_on_graphics_thread();

        if let Err(e) = self.destroy_window_surface() {
            log::warn!("{e}");
        }

        if let Some(context) = self.context {
            if !self.backend.make_current(None, context) {
                log::warn!(
                    "unbinding context {context:?} failed (0x{:x})",
                    self.backend.last_error()
                );
            }
        }

        if let Some(pixel_buffer) = self.pixel_buffer.take() {
            if !self.strategies.offscreen.destroy(self.backend.as_mut(), pixel_buffer) {
                log::warn!(
                    "destroying pixel buffer {pixel_buffer:?} failed (0x{:x})",
                    self.backend.last_error()
                );
            }
        }

        if let Some(context) = self.context.take() {
            if !self.strategies.context.destroy(self.backend.as_mut(), context) {
                log::warn!(
                    "destroying context {context:?} failed (0x{:x})",
                    self.backend.last_error()
                );
            }
        }
        log::debug!("graphics context released");
    }
}

impl Drop for GraphicsContext {
    fn drop(&mut self) {
        if self.gate.is_on_graphics_thread() {
            self.release();
        } else if self.context.is_some() {
            // Only reachable if the render thread died; touching the context
            // from here would break the thread contract.
            log::error!("graphics context dropped off the graphics thread; leaking it");
        }
    }
}

fn failed(what: &'static str, backend: &mut dyn GraphicsBackend) -> RuntimeError {
    let code = backend.last_error();
    log::error!("{what} failed (0x{code:x})");
    RuntimeError::ResourceCreationFailed { what, code }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::attribs;
    use crate::device::headless::{BackendCall, HeadlessBackend, HeadlessProbe, SurfaceKind};

    fn context() -> (GraphicsContext, HeadlessProbe) {
        let (backend, probe) = HeadlessBackend::new();
        let gfx = GraphicsContext::create(
            Box::new(backend),
            SurfaceStrategies::default(),
            Arc::new(GraphicsThreadGate::new()),
        )
        .unwrap();
        (gfx, probe)
    }

    // ── creation ──────────────────────────────────────────────────────────

    #[test]
    fn create_makes_pixel_buffer_current_and_marks_gate() {
        let (gfx, probe) = context();
        assert!(gfx.gate().is_on_graphics_thread());
        assert_eq!(probe.current_surface(), gfx.pixel_buffer());

        let info = probe.surface(gfx.pixel_buffer().unwrap()).unwrap();
        assert_eq!(info.kind, SurfaceKind::PixelBuffer);
        assert_eq!(probe.live_contexts(), 1);
    }

    #[test]
    fn context_failure_reports_backend_code() {
        let (backend, probe) = HeadlessBackend::new();
        probe.set_fail_context(true);
        let gate = Arc::new(GraphicsThreadGate::new());
        let err = GraphicsContext::create(Box::new(backend), SurfaceStrategies::default(), gate.clone())
            .err()
            .unwrap();

        assert!(matches!(
            err,
            RuntimeError::ResourceCreationFailed { what: "create context", code } if code != 0
        ));
        assert_eq!(gate.owner(), None);
    }

    // ── window surface ────────────────────────────────────────────────────

    #[test]
    fn window_surface_carries_requested_attributes() {
        let (mut gfx, probe) = context();
        let window = gfx
            .create_window_surface(
                1024,
                1024,
                SurfaceAttributes {
                    srgb: true,
                    protected_content: false,
                },
            )
            .unwrap();

        let info = probe.surface(window.handle).unwrap();
        assert_eq!((info.width, info.height), (1024, 1024));
        assert_eq!(
            info.attribs,
            vec![(attribs::GL_COLORSPACE, attribs::GL_COLORSPACE_SRGB)]
        );

        gfx.make_window_current().unwrap();
        assert_eq!(probe.current_surface(), Some(window.handle));
        gfx.make_offscreen_current().unwrap();
        assert_eq!(probe.current_surface(), gfx.pixel_buffer());
    }

    #[test]
    fn destroy_window_unbinds_first() {
        let (mut gfx, probe) = context();
        let window = gfx
            .create_window_surface(800, 600, SurfaceAttributes::default())
            .unwrap();
        gfx.make_window_current().unwrap();
        gfx.destroy_window_surface().unwrap();

        let calls = probe.calls();
        let tail = &calls[calls.len() - 2..];
        assert_eq!(
            tail,
            &[BackendCall::MakeCurrent(None), BackendCall::DestroySurface(window.handle)]
        );
        assert!(gfx.window_surface().is_none());
        assert!(gfx.destroy_window_surface().is_ok());
    }

    #[test]
    fn release_frees_everything_once() {
        let (mut gfx, probe) = context();
        gfx.create_window_surface(640, 480, SurfaceAttributes::default())
            .unwrap();
        gfx.release();
        assert_eq!(probe.live_surfaces(), 0);
        assert_eq!(probe.live_contexts(), 0);

        let count = probe.call_count();
        gfx.release();
        drop(gfx);
        assert_eq!(probe.call_count(), count);
    }

    #[test]
    fn release_continues_past_failed_unbind() {
        let (mut gfx, probe) = context();
        let pixel_buffer = gfx.pixel_buffer().unwrap();
        let window = gfx
            .create_window_surface(640, 480, SurfaceAttributes::default())
            .unwrap();
        gfx.make_window_current().unwrap();
        probe.set_fail_unbind(true);

        gfx.release();
        assert_eq!(probe.live_surfaces(), 0);
        assert_eq!(probe.live_contexts(), 0);

        let calls = probe.calls();
        assert!(calls.contains(&BackendCall::DestroySurface(window.handle)));
        assert!(calls.contains(&BackendCall::DestroySurface(pixel_buffer)));
        assert!(matches!(calls.last(), Some(BackendCall::DestroyContext(_))));
    }

    #[test]
    fn drop_releases_on_graphics_thread() {
        let (gfx, probe) = context();
        drop(gfx);
        assert_eq!(probe.live_surfaces(), 0);
        assert_eq!(probe.live_contexts(), 0);
    }
}
