use std::collections::VecDeque;

use vireo_engine::compositor::HeadlessCompositor;
use vireo_engine::device::headless::HeadlessBackend;
use vireo_engine::logging::{LoggingConfig, init_logging};
use vireo_engine::native::{CleanupCallback, HybridObject, NativePtr, NativeRegistry};
use vireo_engine::time::FrameTime;
use vireo_engine::window::{Shell, ShellConfig};
use vireo_engine::{Renderer, RuntimeError, SessionConfig, SessionController};

/// Set to any value to simulate a system without the immersive compositor.
const NO_COMPOSITOR_ENV: &str = "VIREO_NO_COMPOSITOR";

/// Textures kept alive at once; older ones are dropped for the sweeper.
const LIVE_TEXTURES: usize = 8;

fn main() {
    init_logging(LoggingConfig::default());

    if let Err(e) = run() {
        match e.downcast_ref::<RuntimeError>() {
            Some(err) if err.is_capability_unavailable() => {
                eprintln!("Immersive mode is not available on this system.");
                std::process::exit(2);
            }
            _ => {
                log::error!("{e:#}");
                std::process::exit(1);
            }
        }
    }
}

fn run() -> anyhow::Result<()> {
    let registry = NativeRegistry::new(|ptr: NativePtr| log::trace!("freed native {ptr}"));

    let controller = SessionController::new(
        SessionConfig::default(),
        HeadlessCompositor::new(),
        || std::env::var_os(NO_COMPOSITOR_ENV).is_none(),
    )
    .with_registry(registry.clone());

    let renderer = TextureChurn {
        registry,
        next_native: 0x1000,
        live: VecDeque::new(),
    };

    let shell = ShellConfig {
        title: "Vireo Studio".to_string(),
        ..ShellConfig::default()
    };

    Shell::run(shell, controller, |_window| Ok(HeadlessBackend::new().0), renderer)
}

/// Demo renderer: every frame allocates a fake GPU texture and drops the
/// oldest, so the registry's deferred cleanup is exercised continuously.
struct TextureChurn {
    registry: NativeRegistry,
    next_native: u64,
    live: VecDeque<HybridObject>,
}

impl TextureChurn {
    fn allocate(&mut self) {
        let texture = HybridObject::new();
        let native = self.next_native;
        self.next_native += 0x10;

        let cleanups = vec![CleanupCallback::graphics(|ptr| {
            log::trace!("deleting texture {ptr}");
        })];
        match self.registry.attach(&texture, native, cleanups) {
            Ok(_) => self.live.push_back(texture),
            Err(e) => log::warn!("attach texture 0x{native:x}: {e}"),
        }

        while self.live.len() > LIVE_TEXTURES {
            self.live.pop_front();
        }
    }
}

impl Renderer for TextureChurn {
    fn on_surface_created(&mut self) {
        log::info!("surface created");
    }

    fn on_surface_changed(&mut self, width: u32, height: u32) {
        log::info!("surface bound at {width}x{height}");
    }

    fn on_draw_frame(&mut self, frame: &FrameTime) {
        self.allocate();

        if frame.frame_index % 120 == 0 {
            log::info!(
                "frame {} dt={:.2}ms live natives={}",
                frame.frame_index,
                frame.dt * 1000.0,
                self.registry.live_count()
            );
        }
    }
}
