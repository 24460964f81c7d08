//! Device resource caches.
//!
//! Compiled shaders, linked programs and uploaded textures are created lazily on
//! first request and reused until the context is lost or the map is torn down.

mod resource_cache;

pub use resource_cache::{CacheStats, ProgramKey, ResourceCache, TextureKey};
