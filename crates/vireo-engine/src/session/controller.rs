use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::compositor::{CapabilityProbe, Compositor};
use crate::config::SessionConfig;
use crate::device::{GraphicsBackend, GraphicsContext, SurfaceStrategies};
use crate::error::{Result, RuntimeError};
use crate::gate::GraphicsThreadGate;
use crate::native::NativeRegistry;
use crate::pacer::{FramePacer, IntervalVsync, VsyncSource};
use crate::render::{RenderLoop, RenderSetup, RenderThread, Renderer, SurfaceHooks};

use super::state::{SessionRecord, SessionState, SessionStatus};

struct SessionCore {
    record: SessionRecord,
    compositor: Box<dyn Compositor>,
}

/// State shared between the controller (UI thread) and the render thread.
struct SessionShared {
    core: Mutex<SessionCore>,
    config: SessionConfig,
    vsync: Arc<dyn VsyncSource>,
}

impl SessionShared {
    fn lock(&self) -> MutexGuard<'_, SessionCore> {
        // Teardown must still run after a renderer panic poisoned the lock.
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drops a half-bound window surface after a failed bind step.
    fn abandon_window(gfx: &mut GraphicsContext, core: &mut SessionCore) {
        if let Err(e) = gfx.destroy_window_surface() {
            log::warn!("{e}");
        }
        core.record.window_surface = None;
        if let Err(e) = gfx.make_offscreen_current() {
            log::error!("could not restore pixel buffer after failed bind: {e}");
        }
    }

    /// Render-thread half of `pause`/`destroy`: leave the session and destroy
    /// the window surface. Leaves no surface current.
    fn unbind_surface(&self, gfx: &mut GraphicsContext) {
        gfx.gate().assert_on_graphics_thread();
        let mut core = self.lock();

        core.compositor.leave_session();
        if let Err(e) = gfx.destroy_window_surface() {
            log::warn!("{e}");
        }
        core.record.window_surface = None;
    }
}

impl SurfaceHooks for SessionShared {
    fn surface_created(&self, gfx: &mut GraphicsContext) {
        let mut core = self.lock();
        core.record.offscreen_surface = gfx.pixel_buffer();
        core.compositor.on_surface_created();
    }

    fn bind_surface(&self, gfx: &mut GraphicsContext, width: u32, height: u32) -> Result<bool> {
        // The compositor only takes landscape surfaces; portrait sizes are
        // transient during rotation.
        if width < height {
            log::debug!("ignoring portrait surface {width}x{height}");
            return Ok(false);
        }

        gfx.gate().assert_on_graphics_thread();
        let mut core = self.lock();

        let state = core.record.state;
        if !state.can_bind() {
            return Err(RuntimeError::InvalidTransition {
                op: "bind surface",
                state,
            });
        }
        if !core.record.compositor_initialized {
            return Err(RuntimeError::CompositorFailure(
                "compositor runtime is not initialized".to_string(),
            ));
        }

        // 1. Leave any session and drop the previous window surface. Pacing
        // restarts only once the new surface is bound.
        if let Some(pacer) = core.record.pacer.as_mut() {
            pacer.stop();
        }
        core.compositor.leave_session();
        if let Err(e) = gfx.destroy_window_surface() {
            log::warn!("{e}");
        }
        core.record.window_surface = None;
        core.record.state = SessionState::SessionActive;

        // 2. New window surface.
        let window = gfx.create_window_surface(width, height, self.config.surface)?;
        core.record.window_surface = Some(window);

        // 3. Current on the window so the compositor can take it over.
        if let Err(e) = gfx.make_window_current() {
            Self::abandon_window(gfx, &mut core);
            return Err(e);
        }

        // 4. Rendering resumed.
        if let Err(e) = core.compositor.enter_session() {
            Self::abandon_window(gfx, &mut core);
            return Err(RuntimeError::CompositorFailure(format!("{e:#}")));
        }

        // 5. Back to the pixel buffer; the compositor owns the window now.
        if let Err(e) = gfx.make_offscreen_current() {
            core.compositor.leave_session();
            Self::abandon_window(gfx, &mut core);
            return Err(e);
        }

        if let Some(pacer) = core.record.pacer.as_mut() {
            if let Err(e) = pacer.start() {
                core.compositor.leave_session();
                Self::abandon_window(gfx, &mut core);
                return Err(e);
            }
        }

        core.record.state = SessionState::SurfaceBound;
        log::info!("surface bound at {width}x{height}");
        Ok(true)
    }

    fn should_draw(&self) -> bool {
        self.lock().record.state == SessionState::SurfaceBound
    }
}

/// Drives a GPU surface through its lifecycle against the immersive
/// compositor.
///
/// Lifecycle calls come from the host's UI thread and block until the
/// render thread has carried them out. They are serialized; at most one
/// transition is in flight.
///
/// Dropping the controller destroys the session.
pub struct SessionController {
    shared: Arc<SessionShared>,
    render: Mutex<Option<RenderThread>>,
    gate: Mutex<Option<Arc<GraphicsThreadGate>>>,
    probe: Box<dyn CapabilityProbe>,
    registry: Option<NativeRegistry>,
    strategies: SurfaceStrategies,
}

impl SessionController {
    pub fn new(
        config: SessionConfig,
        compositor: impl Compositor + 'static,
        probe: impl CapabilityProbe + 'static,
    ) -> Self {
        let vsync = Arc::new(IntervalVsync::new(config.refresh_hz));
        Self {
            shared: Arc::new(SessionShared {
                core: Mutex::new(SessionCore {
                    record: SessionRecord::new(),
                    compositor: Box::new(compositor),
                }),
                config,
                vsync,
            }),
            render: Mutex::new(None),
            gate: Mutex::new(None),
            probe: Box::new(probe),
            registry: None,
            strategies: SurfaceStrategies::default(),
        }
    }

    /// Constructs and initializes in one step.
    pub fn start(
        config: SessionConfig,
        compositor: impl Compositor + 'static,
        probe: impl CapabilityProbe + 'static,
        backend: impl GraphicsBackend + 'static,
        renderer: impl Renderer + 'static,
    ) -> Result<Self> {
        let controller = Self::new(config, compositor, probe);
        controller.initialize(backend, renderer)?;
        Ok(controller)
    }

    /// Replaces the display refresh signal. Call before `initialize`.
    pub fn with_vsync(mut self, vsync: Arc<dyn VsyncSource>) -> Self {
        match Arc::get_mut(&mut self.shared) {
            Some(shared) => shared.vsync = vsync,
            None => log::warn!("vsync source replaced after initialize; ignored"),
        }
        self
    }

    /// Routes graphics cleanup of `registry` to this session's render thread
    /// and drains it after every frame.
    pub fn with_registry(mut self, registry: NativeRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_strategies(mut self, strategies: SurfaceStrategies) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn registry(&self) -> Option<&NativeRegistry> {
        self.registry.as_ref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().record.state
    }

    pub fn status(&self) -> SessionStatus {
        self.shared.lock().record.status()
    }

    /// Held for the whole of a transition, including render-thread waits.
    fn lock_render(&self) -> MutexGuard<'_, Option<RenderThread>> {
        self.render.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True on this session's render thread.
    pub fn is_on_graphics_thread(&self) -> bool {
        self.gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|g| g.is_on_graphics_thread())
    }

    /// `Uninitialized → SessionActive`.
    ///
    /// Fails with [`RuntimeError::CapabilityUnavailable`] when the probe
    /// finds no compositor (the compositor is then never called) or its
    /// runtime refuses to start. GPU context creation failures shut the
    /// runtime down again and are returned as-is.
    pub fn initialize(
        &self,
        backend: impl GraphicsBackend + 'static,
        renderer: impl Renderer + 'static,
    ) -> Result<()> {
        let mut slot = self.lock_render();
        let state = self.state();
        if state != SessionState::Uninitialized {
            return Err(RuntimeError::InvalidTransition {
                op: "initialize",
                state,
            });
        }

        if !self.probe.is_available() {
            log::warn!("immersive compositor not installed");
            return Err(RuntimeError::CapabilityUnavailable(
                "compositor service is not installed".to_string(),
            ));
        }

        {
            let mut core = self.shared.lock();
            core.compositor.initialize().map_err(|e| {
                log::warn!("compositor runtime failed to start: {e:#}");
                RuntimeError::CapabilityUnavailable(format!("{e:#}"))
            })?;
            core.record.compositor_initialized = true;
        }

        let prefix = &self.shared.config.thread_name_prefix;
        let gate = Arc::new(GraphicsThreadGate::new());
        let spawned = RenderThread::spawn(RenderSetup {
            name: format!("{prefix}-render"),
            backend: Box::new(backend),
            strategies: self.strategies.clone(),
            gate: gate.clone(),
            renderer: Box::new(renderer),
            hooks: self.shared.clone(),
            sweeper: self.registry.as_ref().map(NativeRegistry::sweeper),
        });

        let render = match spawned {
            Ok(render) => render,
            Err(e) => {
                let mut core = self.shared.lock();
                core.compositor.shutdown();
                core.record.compositor_initialized = false;
                core.record.offscreen_surface = None;
                return Err(e);
            }
        };

        if let Some(registry) = &self.registry {
            registry.bind_graphics(gate.clone(), Arc::new(render.executor()));
        }

        {
            let mut core = self.shared.lock();
            core.record.pacer = Some(FramePacer::new(
                self.shared.vsync.clone(),
                render.frame_requester(),
                prefix.clone(),
            ));
            core.record.state = SessionState::SessionActive;
        }

        *slot = Some(render);
        *self.gate.lock().unwrap_or_else(PoisonError::into_inner) = Some(gate);
        log::info!("session active");
        Ok(())
    }

    /// Host surface-size notification. Binds a window surface on the render
    /// thread and blocks until done.
    ///
    /// Ignored while paused; the host reports the size again after resume.
    pub fn notify_surface_changed(&self, width: u32, height: u32) -> Result<()> {
        let slot = self.lock_render();
        let state = self.state();
        if state == SessionState::Paused {
            log::debug!("surface change {width}x{height} while paused; ignored");
            return Ok(());
        }
        if !state.can_bind() {
            return Err(RuntimeError::InvalidTransition {
                op: "bind surface",
                state,
            });
        }

        let Some(render) = slot.as_ref() else {
            return Err(RuntimeError::RenderThreadGone);
        };
        render.run_and_wait(
            move |lp| lp.surface_changed(width, height),
            self.shared.config.handshake_timeout,
        )?
    }

    /// `{SessionActive, SurfaceBound} → Paused`. Blocks until the pacer is
    /// joined and the render thread has released the window surface; only
    /// then is the compositor runtime shut down.
    ///
    /// Teardown problems are logged. Pausing twice is a no-op.
    pub fn pause(&self) -> Result<()> {
        let slot = self.lock_render();
        let state = self.state();
        match state {
            SessionState::SessionActive | SessionState::SurfaceBound => {}
            SessionState::Paused => return Ok(()),
            _ => return Err(RuntimeError::InvalidTransition { op: "pause", state }),
        }
        log::info!("pausing session");

        if let Some(pacer) = self.shared.lock().record.pacer.as_mut() {
            pacer.stop();
        }

        let mut released = true;
        if let Some(render) = slot.as_ref() {
            if let Err(e) = render.pause() {
                log::warn!("render thread missed pause: {e}");
            }

            let shared = self.shared.clone();
            let job = move |lp: &mut RenderLoop| shared.unbind_surface(lp.graphics());
            match render.run_and_wait(job, self.shared.config.handshake_timeout) {
                Ok(()) => {}
                // Nothing is left running that could use the compositor.
                Err(RuntimeError::RenderThreadGone) => {
                    log::error!("render thread gone during pause");
                }
                Err(e) => {
                    log::error!("pause handshake failed: {e}; compositor runtime stays up");
                    released = false;
                }
            }
        }

        let mut core = self.shared.lock();
        if released && core.record.compositor_initialized {
            core.compositor.shutdown();
            core.record.compositor_initialized = false;
        }
        core.record.state = SessionState::Paused;
        Ok(())
    }

    /// `Paused → SessionActive`. Re-initializes the compositor runtime if
    /// `pause` shut it down. The window surface comes back with the next
    /// surface-change notification.
    pub fn resume(&self) -> Result<()> {
        let slot = self.lock_render();
        let state = self.state();
        match state {
            SessionState::Paused => {}
            SessionState::SessionActive | SessionState::SurfaceBound => return Ok(()),
            _ => return Err(RuntimeError::InvalidTransition { op: "resume", state }),
        }

        {
            let mut core = self.shared.lock();
            if !core.record.compositor_initialized {
                core.compositor
                    .initialize()
                    .map_err(|e| RuntimeError::CompositorFailure(format!("{e:#}")))?;
                core.record.compositor_initialized = true;
            }
            core.record.state = SessionState::SessionActive;
        }

        if let Some(render) = slot.as_ref() {
            if let Err(e) = render.resume() {
                log::warn!("render thread missed resume: {e}");
            }
        }
        log::info!("session resumed");
        Ok(())
    }

    /// Any state `→ Destroyed`. Releases the window surface, the pixel
    /// buffer, the context and the compositor runtime, whichever exist.
    pub fn destroy(&self) {
        let mut slot = self.lock_render();
        if self.state() == SessionState::Destroyed {
            return;
        }
        log::info!("destroying session");

        if let Some(mut pacer) = self.shared.lock().record.pacer.take() {
            pacer.stop();
        }

        if let Some(mut render) = slot.take() {
            if !render.is_alive() {
                log::warn!("render thread exited before destroy; GPU objects may leak");
            }

            let shared = self.shared.clone();
            let job = move |lp: &mut RenderLoop| shared.unbind_surface(lp.graphics());
            if let Err(e) = render.run_and_wait(job, self.shared.config.handshake_timeout) {
                log::warn!("{}", RuntimeError::Teardown {
                    step: "release window surface",
                    detail: e.to_string(),
                });
            }
            // The render loop drains queued finalizations before releasing the
            // context, so graphics stay bound until it has joined.
            render.shutdown_and_join();
        }
        if let Some(registry) = &self.registry {
            registry.unbind_graphics();
        }
        *self.gate.lock().unwrap_or_else(PoisonError::into_inner) = None;

        let mut core = self.shared.lock();
        if core.record.compositor_initialized {
            core.compositor.shutdown();
            core.record.compositor_initialized = false;
        }
        core.record.window_surface = None;
        core.record.offscreen_surface = None;
        core.record.state = SessionState::Destroyed;
    }

    /// Destroys the session and returns to `Uninitialized`, ready for a new
    /// `initialize` with a fresh graphics thread.
    pub fn reset(&self) {
        self.destroy();
        self.shared.lock().record = SessionRecord::new();
        log::debug!("session reset");
    }

    /// Back navigation. Shows the compositor's confirm-quit overlay unless
    /// the device has a home key. Always consumed.
    pub fn on_back(&self) -> bool {
        if !self.shared.config.home_key_present {
            self.shared.lock().compositor.show_confirm_quit();
        }
        true
    }

    /// Long-press back is left to the host.
    pub fn on_back_long_press(&self) -> bool {
        false
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
