use std::marker::PhantomData;

use anyhow::{Context, Result};

use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::config::framebuffer_size;
use crate::device::GraphicsBackend;
use crate::render::Renderer;
use crate::session::{SessionController, SessionState};

/// Host window configuration.
#[derive(Debug, Clone)]
pub struct ShellConfig {
    pub title: String,

    /// Display size assumed when the platform reports no monitor.
    pub fallback_display: (u32, u32),
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            title: "vireo".to_string(),
            fallback_display: (1920, 1080),
        }
    }
}

/// winit host shell.
///
/// Maps the platform lifecycle onto a [`SessionController`]:
///
/// | winit                     | controller                          |
/// |---------------------------|-------------------------------------|
/// | first `resumed`           | `initialize`, then surface size     |
/// | later `resumed`           | `resume`, then surface size         |
/// | `suspended`               | `pause`                             |
/// | `Resized`                 | `notify_surface_changed`            |
/// | Escape pressed            | `on_back`                           |
/// | `CloseRequested`          | `destroy`, exit                     |
pub struct Shell;

impl Shell {
    /// Runs the event loop until the window closes.
    ///
    /// `make_backend` builds the GPU backend for the created window. When the
    /// compositor is unavailable the loop exits and the returned error wraps
    /// [`crate::RuntimeError::CapabilityUnavailable`].
    pub fn run<B, F, R>(config: ShellConfig, controller: SessionController, make_backend: F, renderer: R) -> Result<()>
    where
        B: GraphicsBackend + 'static,
        F: FnOnce(&Window) -> Result<B>,
        R: Renderer + 'static,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = ShellState {
            config,
            controller,
            pending: Some((make_backend, renderer)),
            window: None,
            failure: None,
            _backend: PhantomData,
        };

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.failure.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

struct ShellState<B, F, R> {
    config: ShellConfig,
    controller: SessionController,
    pending: Option<(F, R)>,
    window: Option<Window>,
    failure: Option<anyhow::Error>,
    _backend: PhantomData<fn() -> B>,
}

impl<B, F, R> ShellState<B, F, R>
where
    B: GraphicsBackend + 'static,
    F: FnOnce(&Window) -> Result<B>,
    R: Renderer + 'static,
{
    fn fail(&mut self, event_loop: &ActiveEventLoop, e: anyhow::Error) {
        self.controller.destroy();
        self.failure = Some(e);
        event_loop.exit();
    }

    fn sweep(&self) {
        if let Some(registry) = self.controller.registry() {
            registry.sweeper().drain();
        }
    }

    fn report_size(&self) {
        let Some(window) = &self.window else {
            return;
        };
        self.surface_changed(window.inner_size());
    }

    fn surface_changed(&self, size: PhysicalSize<u32>) {
        let Some((width, height)) = bindable_size(size) else {
            log::debug!("skipping zero-sized surface {}x{}", size.width, size.height);
            return;
        };
        if let Err(e) = self.controller.notify_surface_changed(width, height) {
            log::error!("binding {width}x{height} surface failed: {e}");
        }
    }

    fn start_session(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let Some((make_backend, renderer)) = self.pending.take() else {
            return Ok(());
        };

        let display = event_loop
            .primary_monitor()
            .map(|m| {
                let size = m.size();
                (size.width, size.height)
            })
            .unwrap_or(self.config.fallback_display);
        let (width, height) = framebuffer_size(display, self.controller.config().framebuffer);

        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(PhysicalSize::new(width, height));
        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let backend = make_backend(&window).context("failed to create GPU backend")?;
        self.window = Some(window);

        self.controller.initialize(backend, renderer).map_err(|e| {
            if e.is_capability_unavailable() {
                log::error!("immersive mode not available on this system: {e}");
            }
            anyhow::Error::new(e)
        })?;
        Ok(())
    }
}

impl<B, F, R> ApplicationHandler for ShellState<B, F, R>
where
    B: GraphicsBackend + 'static,
    F: FnOnce(&Window) -> Result<B>,
    R: Renderer + 'static,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.start_session(event_loop) {
                self.fail(event_loop, e);
                return;
            }
        } else if let Err(e) = self.controller.resume() {
            log::error!("resume failed: {e}");
        }

        self.report_size();
        self.sweep();
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        if let Err(e) = self.controller.pause() {
            log::warn!("pause: {e}");
        }
        self.sweep();
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        // Frames are paced on the render thread; the UI thread only waits.
        event_loop.set_control_flow(ControlFlow::Wait);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                self.controller.destroy();
                self.sweep();
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                if matches!(
                    self.controller.state(),
                    SessionState::Uninitialized | SessionState::Destroyed
                ) {
                    return;
                }
                self.surface_changed(size);
                self.sweep();
            }

            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed
                    && !event.repeat
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape) =>
            {
                self.controller.on_back();
            }

            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.controller.destroy();
        self.sweep();
    }
}

/// Minimized windows report 0x0; there is nothing to bind then.
fn bindable_size(size: PhysicalSize<u32>) -> Option<(u32, u32)> {
    if size.width == 0 || size.height == 0 {
        return None;
    }
    Some((size.width, size.height))
}
