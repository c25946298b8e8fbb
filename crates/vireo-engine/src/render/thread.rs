use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, select};

use crate::device::{GraphicsBackend, GraphicsContext, SurfaceStrategies};
use crate::error::{Result, RuntimeError};
use crate::gate::GraphicsThreadGate;
use crate::native::{FinalizeBatch, GraphicsExecutor, Sweeper};
use crate::pacer::{FrameRequester, FrameRequests, frame_requests};
use crate::time::FrameClock;

use super::handshake::handshake;
use super::renderer::Renderer;

type Job = Box<dyn FnOnce(&mut RenderLoop) + Send>;

/// Messages from the controller to the render thread. Processed in order.
enum RenderCommand {
    Run(Job),
    /// Stop drawing and drop any stale frame request.
    Pause,
    Resume,
    Shutdown,
}

/// Session-side decisions the render loop defers to.
pub(crate) trait SurfaceHooks: Send + Sync {
    /// The context and pixel buffer were just created.
    fn surface_created(&self, gfx: &mut GraphicsContext);

    /// Binds a window surface of the given size. `Ok(false)` means the size
    /// was ignored (portrait) and nothing changed.
    fn bind_surface(&self, gfx: &mut GraphicsContext, width: u32, height: u32) -> Result<bool>;

    /// Whether a frame request should produce a draw right now.
    fn should_draw(&self) -> bool;
}

pub(crate) struct RenderSetup {
    pub name: String,
    pub backend: Box<dyn GraphicsBackend>,
    pub strategies: SurfaceStrategies,
    pub gate: Arc<GraphicsThreadGate>,
    pub renderer: Box<dyn Renderer>,
    pub hooks: Arc<dyn SurfaceHooks>,
    pub sweeper: Option<Sweeper>,
}

/// State owned by the render thread. Jobs posted with
/// [`RenderThread::run_and_wait`] receive it mutably.
pub(crate) struct RenderLoop {
    gfx: GraphicsContext,
    renderer: Box<dyn Renderer>,
    hooks: Arc<dyn SurfaceHooks>,
    sweeper: Option<Sweeper>,
    clock: FrameClock,
    paused: bool,
}

impl RenderLoop {
    pub(crate) fn graphics(&mut self) -> &mut GraphicsContext {
        &mut self.gfx
    }

    #[cfg(test)]
    pub(crate) fn is_paused(&self) -> bool {
        self.paused
    }

    pub(crate) fn surface_changed(&mut self, width: u32, height: u32) -> Result<()> {
        if self.hooks.bind_surface(&mut self.gfx, width, height)? {
            self.renderer.on_surface_changed(width, height);
        }
        Ok(())
    }

    fn draw_frame(&mut self) {
        if self.paused || !self.hooks.should_draw() {
            return;
        }

        let frame = self.clock.tick();
        self.renderer.on_draw_frame(&frame);

        if let Some(sweeper) = &self.sweeper {
            sweeper.drain();
        }
    }

    fn run(mut self, commands: Receiver<RenderCommand>, finalize: Receiver<FinalizeBatch>, frames: FrameRequests) {
        log::debug!("render loop running");
        loop {
            select! {
                recv(commands) -> cmd => match cmd {
                    Ok(RenderCommand::Run(job)) => {
                        // A frame requested before the job was posted is drawn first.
                        if frames.take() {
                            self.draw_frame();
                        }
                        job(&mut self);
                    }
                    Ok(RenderCommand::Pause) => {
                        self.paused = true;
                        frames.discard_pending();
                    }
                    Ok(RenderCommand::Resume) => {
                        self.paused = false;
                        self.clock.reset();
                    }
                    Ok(RenderCommand::Shutdown) | Err(_) => break,
                },
                recv(frames.receiver()) -> _ => self.draw_frame(),
                recv(finalize) -> batch => {
                    if let Ok(batch) = batch {
                        batch.run_on_graphics_thread();
                    }
                }
            }
        }

        // Objects dropped while the context was alive still get their GPU
        // cleanup; the drain runs it inline on this thread.
        let mut pending = self.sweeper.as_ref().map_or(0, Sweeper::drain);
        while let Ok(batch) = finalize.try_recv() {
            pending += batch.len();
            batch.run_on_graphics_thread();
        }
        if pending > 0 {
            log::debug!("finalized {pending} queued native resources before exit");
        }

        self.gfx.release();
        log::debug!("render loop exited after {} frames", self.clock.frame_index());
    }
}

/// Marshals finalize batches onto the render thread.
#[derive(Clone)]
pub(crate) struct RenderQueue {
    tx: Sender<FinalizeBatch>,
}

impl GraphicsExecutor for RenderQueue {
    fn submit(&self, batch: FinalizeBatch) -> Result<(), FinalizeBatch> {
        self.tx.send(batch).map_err(|e| e.into_inner())
    }
}

/// Handle to the render thread.
///
/// The thread owns the GPU context; it is the graphics thread for the
/// session's gate. Dropping the handle shuts the thread down and joins it.
pub(crate) struct RenderThread {
    commands: Sender<RenderCommand>,
    finalize: Sender<FinalizeBatch>,
    requester: FrameRequester,
    handle: Option<JoinHandle<()>>,
}

impl RenderThread {
    /// Spawns the thread and waits until it has created the GPU context.
    pub(crate) fn spawn(setup: RenderSetup) -> Result<Self> {
        let RenderSetup {
            name,
            backend,
            strategies,
            gate,
            renderer,
            hooks,
            sweeper,
        } = setup;

        let (commands, command_rx) = crossbeam_channel::unbounded();
        let (finalize, finalize_rx) = crossbeam_channel::unbounded();
        let (requester, requests) = frame_requests();
        let (started, startup) = handshake::<Result<()>>();

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let mut gfx = match GraphicsContext::create(backend, strategies, gate) {
                    Ok(gfx) => gfx,
                    Err(e) => {
                        started.complete(Err(e));
                        return;
                    }
                };

                let mut renderer = renderer;
                hooks.surface_created(&mut gfx);
                renderer.on_surface_created();
                started.complete(Ok(()));

                RenderLoop {
                    gfx,
                    renderer,
                    hooks,
                    sweeper,
                    clock: FrameClock::new(),
                    paused: false,
                }
                .run(command_rx, finalize_rx, requests);
            })
            .map_err(|source| RuntimeError::ThreadSpawn { name, source })?;

        let mut render = Self {
            commands,
            finalize,
            requester,
            handle: Some(handle),
        };

        match startup.wait(None) {
            Ok(Ok(())) => Ok(render),
            Ok(Err(e)) | Err(e) => {
                render.shutdown_and_join();
                Err(e)
            }
        }
    }

    fn post(&self, command: RenderCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| RuntimeError::RenderThreadGone)
    }

    /// Runs `job` on the render thread and blocks for its result.
    pub(crate) fn run_and_wait<T, F>(&self, job: F, timeout: Option<Duration>) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut RenderLoop) -> T + Send + 'static,
    {
        let (ack, done) = handshake();
        self.post(RenderCommand::Run(Box::new(move |lp| ack.complete(job(lp)))))?;
        done.wait(timeout)
    }

    pub(crate) fn pause(&self) -> Result<()> {
        self.post(RenderCommand::Pause)
    }

    pub(crate) fn resume(&self) -> Result<()> {
        self.post(RenderCommand::Resume)
    }

    /// Requester feeding this thread's frame slot.
    pub(crate) fn frame_requester(&self) -> FrameRequester {
        self.requester.clone()
    }

    pub(crate) fn executor(&self) -> RenderQueue {
        RenderQueue {
            tx: self.finalize.clone(),
        }
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Asks the loop to exit, then joins. The loop releases the GPU context
    /// on its way out. Idempotent.
    pub(crate) fn shutdown_and_join(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        let _ = self.commands.send(RenderCommand::Shutdown);
        if handle.join().is_err() {
            log::error!("render thread panicked");
        }
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}
