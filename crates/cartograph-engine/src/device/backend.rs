use crate::coords::{Size, ViewportRect};
use crate::error::RenderError;
use crate::layer::ImageSource;
use crate::paint::Color;
use crate::shader::ShaderStage;

/// Outcome of a compile or link request.
///
/// A handle comes back even on failure. Whether the failure matters depends on
/// the context state at the time, which only the caller can judge.
#[derive(Debug)]
pub struct Built<H> {
    pub handle: H,
    pub status: BuildStatus,
}

impl<H> Built<H> {
    #[inline]
    pub fn ok(handle: H) -> Self {
        Self { handle, status: BuildStatus::Ok }
    }

    #[inline]
    pub fn failed(handle: H, log: impl Into<String>) -> Self {
        Self {
            handle,
            status: BuildStatus::Failed(log.into()),
        }
    }
}

/// Compile/link status with the device's diagnostic log on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStatus {
    Ok,
    Failed(String),
}

/// Device state re-established after context creation and after every restore.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BaselineState {
    pub clear_color: Color,
    pub cull_face: bool,
    pub scissor_test: bool,
}

impl BaselineState {
    /// Baseline with culling and scissoring disabled.
    #[inline]
    pub fn with_clear_color(clear_color: Color) -> Self {
        Self {
            clear_color,
            cull_face: false,
            scissor_test: false,
        }
    }
}

/// Attributes requested when the drawing context is created.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ContextAttributes {
    pub alpha: bool,
    pub antialias: bool,
    pub depth: bool,
    pub preserve_drawing_buffer: bool,
    pub stencil: bool,
}

impl Default for ContextAttributes {
    fn default() -> Self {
        Self {
            alpha: false,
            antialias: true,
            depth: false,
            preserve_drawing_buffer: false,
            stencil: false,
        }
    }
}

/// Immediate-mode device contract used by the cache and the compositor.
///
/// Handles are cheap to clone and stay owned by the caller: the device never
/// tracks which handles are alive. Release calls are only issued against a live
/// context.
pub trait GraphicsDevice: 'static {
    type Shader: Clone + 'static;
    type Program: Clone + 'static;
    type Texture: Clone + 'static;

    /// Returns `true` once the device has discarded its context.
    fn is_context_lost(&self) -> bool;

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Built<Self::Shader>;

    /// Links a program from a fragment and a vertex stage, attached in that order.
    fn link_program(
        &mut self,
        fragment: &Self::Shader,
        vertex: &Self::Shader,
    ) -> Built<Self::Program>;

    /// Uploads RGBA8 pixels with linear filtering and no mipmaps.
    fn upload_texture(&mut self, image: &ImageSource) -> Self::Texture;

    fn delete_shader(&mut self, shader: Self::Shader);
    fn delete_program(&mut self, program: Self::Program);
    fn delete_texture(&mut self, texture: Self::Texture);

    fn reset_state(&mut self, baseline: &BaselineState);

    /// Resizes the drawing buffer.
    fn resize(&mut self, size: Size);
    fn viewport(&mut self, rect: ViewportRect);

    fn bind_default_framebuffer(&mut self);
    /// Clears the bound framebuffer's color buffer to the baseline clear color.
    fn clear(&mut self);
    fn use_program(&mut self, program: &Self::Program);
    fn bind_texture(&mut self, texture: &Self::Texture);

    /// Draws the full-screen quad with the bound program and texture.
    fn draw_quad(&mut self, opacity: f32);

    /// Finishes the frame on the default framebuffer.
    fn present(&mut self) -> Result<(), RenderError>;
}
