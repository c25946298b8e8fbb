//! In-process GPU backend that records every call.
//!
//! Used by tests and the studio binary. It hands out numbered handles and keeps
//! enough state (current surface, live surfaces, sizes) to check that callers
//! drive it in the right order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use super::attribs;
use super::backend::{ConfigHandle, ContextHandle, GraphicsBackend, SurfaceHandle};

pub const EGL_SUCCESS: i32 = 0x3000;
pub const EGL_BAD_ACCESS: i32 = 0x3002;
pub const EGL_BAD_ALLOC: i32 = 0x3003;
pub const EGL_BAD_CONFIG: i32 = 0x3005;
pub const EGL_BAD_CONTEXT: i32 = 0x3006;
pub const EGL_BAD_SURFACE: i32 = 0x300D;

/// Attribute values of one headless framebuffer config.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ConfigSpec {
    pub red: i32,
    pub green: i32,
    pub blue: i32,
    pub alpha: i32,
    pub depth: i32,
    pub samples: i32,
    pub surface_type: i32,
    pub renderable_type: i32,
}

impl ConfigSpec {
    pub const RGBA8_ES3: ConfigSpec = ConfigSpec {
        red: 8,
        green: 8,
        blue: 8,
        alpha: 8,
        depth: 0,
        samples: 0,
        surface_type: attribs::WINDOW_BIT | attribs::PBUFFER_BIT,
        renderable_type: attribs::OPENGL_ES3_BIT,
    };

    fn attrib(&self, name: i32) -> Option<i32> {
        Some(match name {
            attribs::RED_SIZE => self.red,
            attribs::GREEN_SIZE => self.green,
            attribs::BLUE_SIZE => self.blue,
            attribs::ALPHA_SIZE => self.alpha,
            attribs::DEPTH_SIZE => self.depth,
            attribs::SAMPLES => self.samples,
            attribs::SURFACE_TYPE => self.surface_type,
            attribs::RENDERABLE_TYPE => self.renderable_type,
            _ => return None,
        })
    }

    fn default_set() -> Vec<ConfigSpec> {
        vec![
            ConfigSpec {
                red: 5,
                green: 6,
                blue: 5,
                alpha: 0,
                ..Self::RGBA8_ES3
            },
            ConfigSpec {
                depth: 24,
                samples: 4,
                ..Self::RGBA8_ES3
            },
            Self::RGBA8_ES3,
            ConfigSpec {
                depth: 16,
                ..Self::RGBA8_ES3
            },
        ]
    }
}

/// Kind of a headless surface.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceKind {
    Window,
    PixelBuffer,
}

/// What the backend knows about a live surface.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SurfaceInfo {
    pub kind: SurfaceKind,
    pub width: u32,
    pub height: u32,
    pub attribs: Vec<(i32, i32)>,
}

/// One recorded backend call.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum BackendCall {
    CreateContext(ConfigHandle),
    DestroyContext(ContextHandle),
    CreatePixelBuffer { width: u32, height: u32 },
    CreateWindowSurface { width: u32, height: u32 },
    DestroySurface(SurfaceHandle),
    MakeCurrent(Option<SurfaceHandle>),
}

#[derive(Default)]
struct HeadlessState {
    next_handle: u64,
    contexts: HashMap<u64, i32>,
    surfaces: HashMap<u64, SurfaceInfo>,
    current: Option<SurfaceHandle>,
    calls: Vec<(BackendCall, ThreadId)>,
    windows_created: usize,
    fail_window_surface: bool,
    fail_context: bool,
    fail_unbind: bool,
    last_error: i32,
}

impl HeadlessState {
    fn next(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn record(&mut self, call: BackendCall) {
        log::trace!("headless backend: {call:?}");
        self.calls.push((call, thread::current().id()));
    }
}

fn lock(state: &Mutex<HeadlessState>) -> MutexGuard<'_, HeadlessState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Headless [`GraphicsBackend`]. Pair it with the [`HeadlessProbe`] returned by
/// [`HeadlessBackend::new`] to inspect what the render thread did.
pub struct HeadlessBackend {
    configs: Vec<ConfigSpec>,
    state: Arc<Mutex<HeadlessState>>,
}

impl HeadlessBackend {
    /// A backend offering a few configs, exactly one of which satisfies
    /// [`Rgba8ConfigChooser`](super::Rgba8ConfigChooser).
    pub fn new() -> (Self, HeadlessProbe) {
        Self::with_configs(ConfigSpec::default_set())
    }

    pub fn with_configs(configs: Vec<ConfigSpec>) -> (Self, HeadlessProbe) {
        let state = Arc::new(Mutex::new(HeadlessState {
            last_error: EGL_SUCCESS,
            ..HeadlessState::default()
        }));
        let probe = HeadlessProbe {
            state: state.clone(),
        };
        (Self { configs, state }, probe)
    }

    /// Handle of the first config equal to [`ConfigSpec::RGBA8_ES3`].
    pub fn first_matching_config(&self) -> Option<ConfigHandle> {
        self.configs
            .iter()
            .position(|c| *c == ConfigSpec::RGBA8_ES3)
            .map(|i| ConfigHandle(i as u64))
    }

    fn config(&self, handle: ConfigHandle) -> Option<&ConfigSpec> {
        self.configs.get(handle.0 as usize)
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn configs(&mut self) -> Option<Vec<ConfigHandle>> {
        Some((0..self.configs.len() as u64).map(ConfigHandle).collect())
    }

    fn config_attrib(&mut self, config: ConfigHandle, attrib: i32) -> Option<i32> {
        self.config(config)?.attrib(attrib)
    }

    fn create_context(&mut self, config: ConfigHandle, attribs: &[i32]) -> Option<ContextHandle> {
        let valid = self.config(config).is_some();
        let mut st = lock(&self.state);
        st.record(BackendCall::CreateContext(config));
        if !valid {
            st.last_error = EGL_BAD_CONFIG;
            return None;
        }
        if st.fail_context {
            st.last_error = EGL_BAD_ALLOC;
            return None;
        }

        let version = attribs::pairs(attribs)
            .find(|(name, _)| *name == attribs::CONTEXT_CLIENT_VERSION)
            .map_or(1, |(_, v)| v);
        let id = st.next();
        st.contexts.insert(id, version);
        Some(ContextHandle(id))
    }

    fn destroy_context(&mut self, context: ContextHandle) -> bool {
        let mut st = lock(&self.state);
        st.record(BackendCall::DestroyContext(context));
        if st.contexts.remove(&context.0).is_none() {
            st.last_error = EGL_BAD_CONTEXT;
            return false;
        }
        true
    }

    fn create_pbuffer_surface(&mut self, config: ConfigHandle, attribs: &[i32]) -> Option<SurfaceHandle> {
        let valid = self.config(config).is_some();
        let mut width = 0;
        let mut height = 0;
        for (name, value) in attribs::pairs(attribs) {
            match name {
                attribs::WIDTH => width = value.max(0) as u32,
                attribs::HEIGHT => height = value.max(0) as u32,
                _ => {}
            }
        }

        let mut st = lock(&self.state);
        st.record(BackendCall::CreatePixelBuffer { width, height });
        if !valid {
            st.last_error = EGL_BAD_CONFIG;
            return None;
        }

        let id = st.next();
        st.surfaces.insert(
            id,
            SurfaceInfo {
                kind: SurfaceKind::PixelBuffer,
                width,
                height,
                attribs: attribs::pairs(attribs).collect(),
            },
        );
        Some(SurfaceHandle(id))
    }

    fn create_window_surface(
        &mut self,
        config: ConfigHandle,
        width: u32,
        height: u32,
        attribs: &[i32],
    ) -> Option<SurfaceHandle> {
        let valid = self.config(config).is_some();
        let mut st = lock(&self.state);
        st.record(BackendCall::CreateWindowSurface { width, height });
        if !valid {
            st.last_error = EGL_BAD_CONFIG;
            return None;
        }
        if st.fail_window_surface {
            st.last_error = EGL_BAD_ALLOC;
            return None;
        }

        let id = st.next();
        st.windows_created += 1;
        st.surfaces.insert(
            id,
            SurfaceInfo {
                kind: SurfaceKind::Window,
                width,
                height,
                attribs: attribs::pairs(attribs).collect(),
            },
        );
        Some(SurfaceHandle(id))
    }

    fn destroy_surface(&mut self, surface: SurfaceHandle) -> bool {
        let mut st = lock(&self.state);
        st.record(BackendCall::DestroySurface(surface));
        if st.surfaces.remove(&surface.0).is_none() {
            st.last_error = EGL_BAD_SURFACE;
            return false;
        }
        if st.current == Some(surface) {
            st.current = None;
        }
        true
    }

    fn make_current(&mut self, surface: Option<SurfaceHandle>, context: ContextHandle) -> bool {
        let mut st = lock(&self.state);
        st.record(BackendCall::MakeCurrent(surface));
        if !st.contexts.contains_key(&context.0) {
            st.last_error = EGL_BAD_CONTEXT;
            return false;
        }
        if surface.is_none() && st.fail_unbind {
            st.last_error = EGL_BAD_ACCESS;
            return false;
        }
        if let Some(s) = surface {
            if !st.surfaces.contains_key(&s.0) {
                st.last_error = EGL_BAD_SURFACE;
                return false;
            }
        }
        st.current = surface;
        true
    }

    fn last_error(&mut self) -> i32 {
        lock(&self.state).last_error
    }
}

/// Read side of a [`HeadlessBackend`], usable from any thread.
#[derive(Clone)]
pub struct HeadlessProbe {
    state: Arc<Mutex<HeadlessState>>,
}

impl HeadlessProbe {
    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<BackendCall> {
        lock(&self.state).calls.iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.state).calls.len()
    }

    /// Threads that issued calls, deduplicated.
    pub fn calling_threads(&self) -> Vec<ThreadId> {
        let st = lock(&self.state);
        let mut threads: Vec<ThreadId> = Vec::new();
        for (_, t) in &st.calls {
            if !threads.contains(t) {
                threads.push(*t);
            }
        }
        threads
    }

    pub fn current_surface(&self) -> Option<SurfaceHandle> {
        lock(&self.state).current
    }

    pub fn surface(&self, handle: SurfaceHandle) -> Option<SurfaceInfo> {
        lock(&self.state).surfaces.get(&handle.0).cloned()
    }

    pub fn live_surfaces(&self) -> usize {
        lock(&self.state).surfaces.len()
    }

    pub fn live_contexts(&self) -> usize {
        lock(&self.state).contexts.len()
    }

    /// Live window surfaces, oldest first.
    pub fn window_surfaces(&self) -> Vec<SurfaceHandle> {
        let st = lock(&self.state);
        let mut handles: Vec<u64> = st
            .surfaces
            .iter()
            .filter(|(_, info)| info.kind == SurfaceKind::Window)
            .map(|(id, _)| *id)
            .collect();
        handles.sort_unstable();
        handles.into_iter().map(SurfaceHandle).collect()
    }

    pub fn window_surfaces_created(&self) -> usize {
        lock(&self.state).windows_created
    }

    /// Client version requested for the most recently created live context.
    pub fn context_client_version(&self) -> Option<i32> {
        let st = lock(&self.state);
        st.contexts
            .iter()
            .max_by_key(|(id, _)| **id)
            .map(|(_, v)| *v)
    }

    /// Makes subsequent window-surface creation fail with `EGL_BAD_ALLOC`.
    pub fn set_fail_window_surface(&self, fail: bool) {
        lock(&self.state).fail_window_surface = fail;
    }

    /// Makes subsequent context creation fail with `EGL_BAD_ALLOC`.
    pub fn set_fail_context(&self, fail: bool) {
        lock(&self.state).fail_context = fail;
    }

    /// Makes releasing the current surface fail with `EGL_BAD_ACCESS`.
    pub fn set_fail_unbind(&self, fail: bool) {
        lock(&self.state).fail_unbind = fail;
    }
}

impl std::fmt::Debug for HeadlessProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = lock(&self.state);
        f.debug_struct("HeadlessProbe")
            .field("calls", &st.calls.len())
            .field("surfaces", &st.surfaces.len())
            .field("current", &st.current)
            .finish()
    }
}
