//! EGL-style attribute names and attribute-list builders.

pub const NONE: i32 = 0x3038;
pub const TRUE: i32 = 1;

pub const ALPHA_SIZE: i32 = 0x3021;
pub const BLUE_SIZE: i32 = 0x3022;
pub const GREEN_SIZE: i32 = 0x3023;
pub const RED_SIZE: i32 = 0x3024;
pub const DEPTH_SIZE: i32 = 0x3025;
pub const SAMPLES: i32 = 0x3031;
pub const SURFACE_TYPE: i32 = 0x3033;
pub const RENDERABLE_TYPE: i32 = 0x3040;
pub const HEIGHT: i32 = 0x3056;
pub const WIDTH: i32 = 0x3057;
pub const CONTEXT_CLIENT_VERSION: i32 = 0x3098;
pub const GL_COLORSPACE: i32 = 0x309D;
pub const GL_COLORSPACE_SRGB: i32 = 0x3089;
pub const PROTECTED_CONTENT: i32 = 0x32C0;

pub const PBUFFER_BIT: i32 = 0x0001;
pub const WINDOW_BIT: i32 = 0x0004;
pub const OPENGL_ES3_BIT: i32 = 0x0040;

/// Attributes requested for the window surface the compositor takes over.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct SurfaceAttributes {
    /// Request an sRGB colorspace for the window surface.
    pub srgb: bool,
    /// Request a protected-content surface (DRM video and the like).
    pub protected_content: bool,
}

impl SurfaceAttributes {
    /// NONE-terminated attribute list for window-surface creation.
    pub fn to_attrib_list(self) -> Vec<i32> {
        let mut list = Vec::with_capacity(5);
        if self.srgb {
            list.extend([GL_COLORSPACE, GL_COLORSPACE_SRGB]);
        }
        if self.protected_content {
            list.extend([PROTECTED_CONTENT, TRUE]);
        }
        list.push(NONE);
        list
    }
}

/// Iterates `(name, value)` pairs of a NONE-terminated list.
pub fn pairs(list: &[i32]) -> impl Iterator<Item = (i32, i32)> + '_ {
    list.chunks_exact(2)
        .map(|c| (c[0], c[1]))
        .take_while(|(name, _)| *name != NONE)
}
