/// Opaque framebuffer configuration handle.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ConfigHandle(pub u64);

/// Opaque GPU context handle.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ContextHandle(pub u64);

/// Opaque surface handle (window or pixel buffer).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct SurfaceHandle(pub u64);

/// Display-level GPU operations, shaped after EGL.
///
/// Implementations wrap a real display connection or, for tests and the
/// studio, the [`headless`](super::headless) backend. Calls report failure by
/// returning `None`/`false`; [`last_error`](Self::last_error) then explains it.
///
/// The backend is moved onto the render thread and only ever called from there.
pub trait GraphicsBackend: Send {
    /// All configs the display offers.
    fn configs(&mut self) -> Option<Vec<ConfigHandle>>;

    fn config_attrib(&mut self, config: ConfigHandle, attrib: i32) -> Option<i32>;

    fn create_context(&mut self, config: ConfigHandle, attribs: &[i32]) -> Option<ContextHandle>;

    fn destroy_context(&mut self, context: ContextHandle) -> bool;

    fn create_pbuffer_surface(&mut self, config: ConfigHandle, attribs: &[i32]) -> Option<SurfaceHandle>;

    /// Creates the on-screen surface for the backend's native window.
    fn create_window_surface(
        &mut self,
        config: ConfigHandle,
        width: u32,
        height: u32,
        attribs: &[i32],
    ) -> Option<SurfaceHandle>;

    fn destroy_surface(&mut self, surface: SurfaceHandle) -> bool;

    /// Binds `context` to `surface` for draw and read; `None` unbinds any surface.
    fn make_current(&mut self, surface: Option<SurfaceHandle>, context: ContextHandle) -> bool;

    /// Error code of the most recent failed call.
    fn last_error(&mut self) -> i32;
}
