//! Window host.
//!
//! Owns the `winit` event loop and one window with its map, and forwards
//! resize, refresh, context loss and restoration into the engine.

mod runtime;

pub use runtime::{AppControl, MapApp, Runtime, RuntimeConfig};
