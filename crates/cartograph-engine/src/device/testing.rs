//! Recording device for unit tests.

use crate::coords::{Size, ViewportRect};
use crate::error::RenderError;
use crate::layer::ImageSource;
use crate::shader::ShaderStage;

use super::{BaselineState, Built, GraphicsDevice};

/// Opaque handle issued by [`FakeDevice`]; numbers are never reused.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub(crate) struct Handle(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    CompileShader(ShaderStage, Handle),
    LinkProgram(Handle),
    UploadTexture(String, Handle),
    DeleteShader(Handle),
    DeleteProgram(Handle),
    DeleteTexture(Handle),
    ResetState(BaselineState),
    Resize(Size),
    Viewport(ViewportRect),
    BindDefaultFramebuffer,
    Clear,
    UseProgram(Handle),
    BindTexture(Handle),
    DrawQuad { texture: Option<Handle>, opacity: f32 },
    Present,
}

#[derive(Debug, Default)]
pub(crate) struct FakeDevice {
    pub calls: Vec<Call>,
    pub lost: bool,
    pub fail_compile: Option<ShaderStage>,
    pub fail_link: bool,
    next_handle: u32,
    bound_texture: Option<Handle>,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self::default()
    }

    fn issue(&mut self) -> Handle {
        self.next_handle += 1;
        Handle(self.next_handle)
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn compiles(&self) -> usize {
        self.count(|c| matches!(c, Call::CompileShader(..)))
    }

    pub fn links(&self) -> usize {
        self.count(|c| matches!(c, Call::LinkProgram(_)))
    }

    pub fn uploads(&self) -> usize {
        self.count(|c| matches!(c, Call::UploadTexture(..)))
    }

    pub fn deletes(&self) -> usize {
        self.count(|c| {
            matches!(
                c,
                Call::DeleteShader(_) | Call::DeleteProgram(_) | Call::DeleteTexture(_)
            )
        })
    }

    pub fn presents(&self) -> usize {
        self.count(|c| matches!(c, Call::Present))
    }

    /// Locators of uploads, in upload order.
    pub fn uploaded(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::UploadTexture(locator, _) => Some(locator.clone()),
                _ => None,
            })
            .collect()
    }

    /// Texture handle of the upload for `locator`, most recent first.
    pub fn texture_for(&self, locator: &str) -> Option<Handle> {
        self.calls.iter().rev().find_map(|c| match c {
            Call::UploadTexture(l, h) if l == locator => Some(*h),
            _ => None,
        })
    }

    /// Textures drawn by quad draws, in draw order.
    pub fn drawn_textures(&self) -> Vec<Option<Handle>> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::DrawQuad { texture, .. } => Some(*texture),
                _ => None,
            })
            .collect()
    }

    pub fn position(&self, pred: impl Fn(&Call) -> bool) -> Option<usize> {
        self.calls.iter().position(pred)
    }

    pub fn reset_calls(&mut self) {
        self.calls.clear();
    }
}

impl GraphicsDevice for FakeDevice {
    type Shader = Handle;
    type Program = Handle;
    type Texture = Handle;

    fn is_context_lost(&self) -> bool {
        self.lost
    }

    fn compile_shader(&mut self, stage: ShaderStage, _source: &str) -> Built<Handle> {
        let h = self.issue();
        self.calls.push(Call::CompileShader(stage, h));
        if self.fail_compile == Some(stage) {
            Built::failed(h, format!("ERROR: 0:1: {stage} stage rejected"))
        } else {
            Built::ok(h)
        }
    }

    fn link_program(&mut self, _fragment: &Handle, _vertex: &Handle) -> Built<Handle> {
        let h = self.issue();
        self.calls.push(Call::LinkProgram(h));
        if self.fail_link {
            Built::failed(h, "ERROR: varying mismatch")
        } else {
            Built::ok(h)
        }
    }

    fn upload_texture(&mut self, image: &ImageSource) -> Handle {
        let h = self.issue();
        self.calls.push(Call::UploadTexture(image.locator().to_string(), h));
        h
    }

    fn delete_shader(&mut self, shader: Handle) {
        self.calls.push(Call::DeleteShader(shader));
    }

    fn delete_program(&mut self, program: Handle) {
        self.calls.push(Call::DeleteProgram(program));
    }

    fn delete_texture(&mut self, texture: Handle) {
        self.calls.push(Call::DeleteTexture(texture));
    }

    fn reset_state(&mut self, baseline: &BaselineState) {
        self.calls.push(Call::ResetState(*baseline));
    }

    fn resize(&mut self, size: Size) {
        self.calls.push(Call::Resize(size));
    }

    fn viewport(&mut self, rect: ViewportRect) {
        self.calls.push(Call::Viewport(rect));
    }

    fn bind_default_framebuffer(&mut self) {
        self.calls.push(Call::BindDefaultFramebuffer);
    }

    fn clear(&mut self) {
        self.calls.push(Call::Clear);
    }

    fn use_program(&mut self, program: &Handle) {
        self.calls.push(Call::UseProgram(*program));
    }

    fn bind_texture(&mut self, texture: &Handle) {
        self.bound_texture = Some(*texture);
        self.calls.push(Call::BindTexture(*texture));
    }

    fn draw_quad(&mut self, opacity: f32) {
        self.calls.push(Call::DrawQuad {
            texture: self.bound_texture,
            opacity,
        });
    }

    fn present(&mut self) -> Result<(), RenderError> {
        self.calls.push(Call::Present);
        Ok(())
    }
}
