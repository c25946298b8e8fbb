use crate::time::FrameTime;

/// Scene/rendering layer driven by the render thread.
///
/// All three callbacks run on the graphics thread with the context current.
/// They must not call back into session transitions (`pause`, `destroy`, ...);
/// those block on this very thread.
pub trait Renderer: Send {
    /// The GPU context exists. Create GPU resources here.
    fn on_surface_created(&mut self);

    /// A window surface of this size was handed to the compositor.
    fn on_surface_changed(&mut self, width: u32, height: u32);

    /// Render one frame.
    fn on_draw_frame(&mut self, frame: &FrameTime);
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn on_surface_created(&mut self) {
        (**self).on_surface_created()
    }

    fn on_surface_changed(&mut self, width: u32, height: u32) {
        (**self).on_surface_changed(width, height)
    }

    fn on_draw_frame(&mut self, frame: &FrameTime) {
        (**self).on_draw_frame(frame)
    }
}
