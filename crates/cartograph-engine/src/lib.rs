//! Cartograph engine crate.
//!
//! GPU compositing backend of a map viewer: shader and texture caching on a
//! device that may lose its context, per-layer renderers, and a compositor
//! that draws every visible layer into one framebuffer.

pub mod cache;
pub mod context;
pub mod coords;
pub mod device;
pub mod layer;
pub mod logging;
pub mod map;
pub mod paint;
pub mod shader;
pub mod window;

mod error;

pub use error::RenderError;
