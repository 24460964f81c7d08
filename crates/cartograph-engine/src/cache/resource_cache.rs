use std::borrow::Borrow;
use std::collections::HashMap;
use std::sync::Arc;

use crate::device::{BuildStatus, Built, GraphicsDevice};
use crate::error::RenderError;
use crate::layer::ImageSource;
use crate::shader::{ShaderId, ShaderSource, ShaderStage};

/// Program cache key: fragment token, then vertex token. Order matters.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ProgramKey {
    pub fragment: ShaderId,
    pub vertex: ShaderId,
}

/// Texture cache key: the source image's stable locator.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct TextureKey(Arc<str>);

impl TextureKey {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&ImageSource> for TextureKey {
    fn from(image: &ImageSource) -> Self {
        Self(image.locator_arc())
    }
}

impl Borrow<str> for TextureKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Entry counts per cache.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub shaders: usize,
    pub programs: usize,
    pub textures: usize,
}

impl CacheStats {
    #[inline]
    pub fn is_empty(self) -> bool {
        self.shaders == 0 && self.programs == 0 && self.textures == 0
    }
}

/// Shader, program and texture caches for one device context.
///
/// Invariant: a key is present iff its handle is valid on the live context.
/// Context loss clears all three maps in a single call.
pub struct ResourceCache<D: GraphicsDevice> {
    shaders: HashMap<ShaderId, D::Shader>,
    programs: HashMap<ProgramKey, D::Program>,
    textures: HashMap<TextureKey, D::Texture>,
}

impl<D: GraphicsDevice> Default for ResourceCache<D> {
    fn default() -> Self {
        Self {
            shaders: HashMap::new(),
            programs: HashMap::new(),
            textures: HashMap::new(),
        }
    }
}

impl<D: GraphicsDevice> ResourceCache<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the compiled shader for `source`, compiling it on first use.
    ///
    /// A compile failure is an error while the context is live. On a lost
    /// context the failed handle is cached as-is: the loss notification that
    /// follows clears it.
    pub fn shader(&mut self, device: &mut D, source: &ShaderSource) -> Result<D::Shader, RenderError> {
        if let Some(shader) = self.shaders.get(&source.id()) {
            return Ok(shader.clone());
        }

        let stage = source.stage();
        let Built { handle, status } = device.compile_shader(stage, source.source());
        if let BuildStatus::Failed(log) = status {
            if !device.is_context_lost() {
                log::error!("{stage} shader {} failed to compile:\n{log}", source.id());
                device.delete_shader(handle);
                return Err(RenderError::Compile { stage, log });
            }
            log::debug!("compile failure for shader {} ignored: context lost", source.id());
        }

        log::debug!("compiled {stage} shader {}", source.id());
        self.shaders.insert(source.id(), handle.clone());
        Ok(handle)
    }

    /// Returns the program linking `fragment` and `vertex`, building it on first use.
    pub fn program(
        &mut self,
        device: &mut D,
        fragment: &ShaderSource,
        vertex: &ShaderSource,
    ) -> Result<D::Program, RenderError> {
        debug_assert_eq!(fragment.stage(), ShaderStage::Fragment);
        debug_assert_eq!(vertex.stage(), ShaderStage::Vertex);

        let key = ProgramKey {
            fragment: fragment.id(),
            vertex: vertex.id(),
        };
        if let Some(program) = self.programs.get(&key) {
            return Ok(program.clone());
        }

        let fs = self.shader(device, fragment)?;
        let vs = self.shader(device, vertex)?;

        let Built { handle, status } = device.link_program(&fs, &vs);
        if let BuildStatus::Failed(log) = status {
            if !device.is_context_lost() {
                log::error!("program {}/{} failed to link:\n{log}", key.fragment, key.vertex);
                device.delete_program(handle);
                return Err(RenderError::Link { log });
            }
            log::debug!("link failure ignored: context lost");
        }

        log::debug!("linked program {}/{}", key.fragment, key.vertex);
        self.programs.insert(key, handle.clone());
        Ok(handle)
    }

    /// Returns the texture for `image`, uploading it once per locator.
    pub fn texture(&mut self, device: &mut D, image: &ImageSource) -> D::Texture {
        if let Some(texture) = self.textures.get(image.locator()) {
            return texture.clone();
        }

        let texture = device.upload_texture(image);
        log::debug!(
            "uploaded texture `{}` ({}x{})",
            image.locator(),
            image.width(),
            image.height()
        );
        self.textures.insert(TextureKey::from(image), texture.clone());
        texture
    }

    #[inline]
    pub fn contains_texture(&self, locator: &str) -> bool {
        self.textures.contains_key(locator)
    }

    /// Forgets every cached handle without releasing it.
    ///
    /// Used on context loss: the device already discarded the objects and
    /// release calls against it are meaningless.
    pub fn invalidate_all(&mut self) {
        let stats = self.stats();
        self.shaders.clear();
        self.programs.clear();
        self.textures.clear();
        log::debug!("cache invalidated: {stats:?}");
    }

    /// Releases every cached handle on the device, then clears the caches.
    ///
    /// Release calls are skipped when the context is already lost.
    pub fn release_all(&mut self, device: &mut D) {
        if device.is_context_lost() {
            self.invalidate_all();
            return;
        }

        let stats = self.stats();
        for (_, program) in self.programs.drain() {
            device.delete_program(program);
        }
        for (_, shader) in self.shaders.drain() {
            device.delete_shader(shader);
        }
        for (_, texture) in self.textures.drain() {
            device.delete_texture(texture);
        }
        log::debug!("cache released: {stats:?}");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            shaders: self.shaders.len(),
            programs: self.programs.len(),
            textures: self.textures.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::testing::{Call, FakeDevice};
    use crate::shader::{COMPOSITE_FRAGMENT, COMPOSITE_VERTEX};

    fn image(locator: &str) -> ImageSource {
        ImageSource::from_rgba8(locator, 1, 1, vec![0, 0, 0, 255]).unwrap()
    }

    // ── shaders ───────────────────────────────────────────────────────────

    #[test]
    fn shader_is_compiled_once() {
        let mut dev = FakeDevice::new();
        let mut cache = ResourceCache::new();

        let a = cache.shader(&mut dev, &COMPOSITE_VERTEX).unwrap();
        let b = cache.shader(&mut dev, &COMPOSITE_VERTEX).unwrap();

        assert_eq!(a, b);
        assert_eq!(dev.compiles(), 1);
    }

    #[test]
    fn identical_text_compiles_twice() {
        let mut dev = FakeDevice::new();
        let mut cache = ResourceCache::new();
        let a = ShaderSource::new(ShaderStage::Vertex, COMPOSITE_VERTEX.source().to_string());
        let b = ShaderSource::new(ShaderStage::Vertex, COMPOSITE_VERTEX.source().to_string());

        let ha = cache.shader(&mut dev, &a).unwrap();
        let hb = cache.shader(&mut dev, &b).unwrap();

        assert_ne!(ha, hb);
        assert_eq!(cache.stats().shaders, 2);
    }

    #[test]
    fn compile_failure_on_live_context_is_an_error() {
        let mut dev = FakeDevice::new();
        dev.fail_compile = Some(ShaderStage::Fragment);
        let mut cache = ResourceCache::new();

        let err = cache.shader(&mut dev, &COMPOSITE_FRAGMENT).unwrap_err();

        match err {
            RenderError::Compile { stage, log } => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert!(log.contains("rejected"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(cache.stats().shaders, 0);
        assert_eq!(dev.count(|c| matches!(c, Call::DeleteShader(_))), 1);
    }

    #[test]
    fn failed_compile_is_retried_next_time() {
        let mut dev = FakeDevice::new();
        dev.fail_compile = Some(ShaderStage::Fragment);
        let mut cache = ResourceCache::new();

        assert!(cache.shader(&mut dev, &COMPOSITE_FRAGMENT).is_err());
        dev.fail_compile = None;
        assert!(cache.shader(&mut dev, &COMPOSITE_FRAGMENT).is_ok());
        assert_eq!(dev.compiles(), 2);
    }

    #[test]
    fn compile_failure_on_lost_context_is_swallowed() {
        let mut dev = FakeDevice::new();
        dev.fail_compile = Some(ShaderStage::Fragment);
        dev.lost = true;
        let mut cache = ResourceCache::new();

        let shader = cache.shader(&mut dev, &COMPOSITE_FRAGMENT);

        assert!(shader.is_ok());
        assert_eq!(cache.stats().shaders, 1);
        assert_eq!(dev.deletes(), 0);
    }

    // ── programs ──────────────────────────────────────────────────────────

    #[test]
    fn program_is_linked_once() {
        let mut dev = FakeDevice::new();
        let mut cache = ResourceCache::new();

        let a = cache.program(&mut dev, &COMPOSITE_FRAGMENT, &COMPOSITE_VERTEX).unwrap();
        let b = cache.program(&mut dev, &COMPOSITE_FRAGMENT, &COMPOSITE_VERTEX).unwrap();

        assert_eq!(a, b);
        assert_eq!(dev.links(), 1);
        assert_eq!(dev.compiles(), 2);
    }

    #[test]
    fn program_reuses_cached_shaders() {
        let mut dev = FakeDevice::new();
        let mut cache = ResourceCache::new();
        cache.shader(&mut dev, &COMPOSITE_FRAGMENT).unwrap();

        cache.program(&mut dev, &COMPOSITE_FRAGMENT, &COMPOSITE_VERTEX).unwrap();

        assert_eq!(dev.compiles(), 2);
        assert_eq!(cache.stats(), CacheStats { shaders: 2, programs: 1, textures: 0 });
    }

    #[test]
    fn program_key_is_order_sensitive() {
        let a = ProgramKey { fragment: COMPOSITE_FRAGMENT.id(), vertex: COMPOSITE_VERTEX.id() };
        let b = ProgramKey { fragment: COMPOSITE_VERTEX.id(), vertex: COMPOSITE_FRAGMENT.id() };
        assert_ne!(a, b);
    }

    #[test]
    fn link_failure_on_live_context_is_an_error() {
        let mut dev = FakeDevice::new();
        dev.fail_link = true;
        let mut cache = ResourceCache::new();

        let err = cache
            .program(&mut dev, &COMPOSITE_FRAGMENT, &COMPOSITE_VERTEX)
            .unwrap_err();

        assert_eq!(err, RenderError::Link { log: "ERROR: varying mismatch".into() });
        assert_eq!(cache.stats().programs, 0);
        // Shaders compiled fine and stay cached.
        assert_eq!(cache.stats().shaders, 2);
    }

    #[test]
    fn link_failure_on_lost_context_is_swallowed() {
        let mut dev = FakeDevice::new();
        dev.fail_link = true;
        dev.lost = true;
        let mut cache = ResourceCache::new();

        assert!(cache.program(&mut dev, &COMPOSITE_FRAGMENT, &COMPOSITE_VERTEX).is_ok());
        assert_eq!(cache.stats().programs, 1);
    }

    #[test]
    fn shader_compile_error_aborts_program() {
        let mut dev = FakeDevice::new();
        dev.fail_compile = Some(ShaderStage::Vertex);
        let mut cache = ResourceCache::new();

        let err = cache
            .program(&mut dev, &COMPOSITE_FRAGMENT, &COMPOSITE_VERTEX)
            .unwrap_err();

        assert!(matches!(err, RenderError::Compile { stage: ShaderStage::Vertex, .. }));
        assert_eq!(dev.links(), 0);
        assert_eq!(cache.stats().programs, 0);
    }

    // ── textures ──────────────────────────────────────────────────────────

    #[test]
    fn same_locator_uploads_once() {
        let mut dev = FakeDevice::new();
        let mut cache = ResourceCache::new();

        let first = cache.texture(&mut dev, &image("tiles/0/0/0.png"));
        for _ in 0..5 {
            assert_eq!(cache.texture(&mut dev, &image("tiles/0/0/0.png")), first);
        }

        assert_eq!(dev.uploads(), 1);
    }

    #[test]
    fn distinct_locators_get_distinct_textures() {
        let mut dev = FakeDevice::new();
        let mut cache = ResourceCache::new();

        let a = cache.texture(&mut dev, &image("a.png"));
        let b = cache.texture(&mut dev, &image("b.png"));

        assert_ne!(a, b);
        assert_eq!(dev.uploaded(), vec!["a.png".to_string(), "b.png".to_string()]);
        assert!(cache.contains_texture("a.png"));
    }

    // ── invalidation / release ────────────────────────────────────────────

    fn populated(dev: &mut FakeDevice) -> ResourceCache<FakeDevice> {
        let mut cache = ResourceCache::new();
        cache.program(dev, &COMPOSITE_FRAGMENT, &COMPOSITE_VERTEX).unwrap();
        cache.texture(dev, &image("a.png"));
        cache
    }

    #[test]
    fn invalidate_clears_everything_without_releasing() {
        let mut dev = FakeDevice::new();
        let mut cache = populated(&mut dev);

        cache.invalidate_all();

        assert!(cache.stats().is_empty());
        assert_eq!(dev.deletes(), 0);
    }

    #[test]
    fn next_request_after_invalidate_recreates_once() {
        let mut dev = FakeDevice::new();
        let mut cache = populated(&mut dev);
        cache.invalidate_all();
        dev.reset_calls();

        cache.texture(&mut dev, &image("a.png"));
        cache.texture(&mut dev, &image("a.png"));
        cache.program(&mut dev, &COMPOSITE_FRAGMENT, &COMPOSITE_VERTEX).unwrap();
        cache.program(&mut dev, &COMPOSITE_FRAGMENT, &COMPOSITE_VERTEX).unwrap();

        assert_eq!(dev.uploads(), 1);
        assert_eq!(dev.links(), 1);
        assert_eq!(dev.compiles(), 2);
    }

    #[test]
    fn release_deletes_every_handle() {
        let mut dev = FakeDevice::new();
        let mut cache = populated(&mut dev);

        cache.release_all(&mut dev);

        assert!(cache.stats().is_empty());
        assert_eq!(dev.count(|c| matches!(c, Call::DeleteProgram(_))), 1);
        assert_eq!(dev.count(|c| matches!(c, Call::DeleteShader(_))), 2);
        assert_eq!(dev.count(|c| matches!(c, Call::DeleteTexture(_))), 1);
    }

    #[test]
    fn release_on_lost_context_skips_device_calls() {
        let mut dev = FakeDevice::new();
        let mut cache = populated(&mut dev);
        dev.lost = true;

        cache.release_all(&mut dev);

        assert!(cache.stats().is_empty());
        assert_eq!(dev.deletes(), 0);
    }
}
