//! Graphics device seam.
//!
//! Everything the engine asks of the GPU goes through [`GraphicsDevice`], a
//! narrow, immediate-mode contract: compile, link, upload, release, bind, draw,
//! present, and the context-lost query. [`Gpu`] implements it on wgpu.

mod backend;
mod gpu;
mod init;
mod surface;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{BaselineState, BuildStatus, Built, ContextAttributes, GraphicsDevice};
pub use gpu::{Gpu, GpuProgram, GpuShader, GpuTexture};
pub use init::GpuInit;
