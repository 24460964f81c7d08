use crate::cache::{CacheStats, ResourceCache};
use crate::context::{ContextLifecycle, ContextLossEvent, ContextState};
use crate::coords::{Coordinate, Size};
use crate::device::{BaselineState, GraphicsDevice};
use crate::error::RenderError;
use crate::layer::{Layer, LayerId, LayerRenderer, RenderCtx, RendererRegistry};
use crate::shader::{COMPOSITE_FRAGMENT, COMPOSITE_VERTEX};

use super::{MapOptions, RedrawScheduler, ViewState};

/// Result of one refresh tick.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FrameOutcome {
    /// Nothing was pending.
    Idle,
    /// A frame is pending but the context is lost; it stays pending.
    Deferred,
    /// A frame was drawn. `animate` is set when another one was scheduled.
    Rendered { animate: bool },
}

/// Composites the layers of one map onto its drawing surface.
pub struct MapRenderer<D: GraphicsDevice> {
    device: D,
    cache: ResourceCache<D>,
    lifecycle: ContextLifecycle,
    registry: RendererRegistry<D>,
    /// Registration order, which is also compositing order.
    layers: Vec<Layer>,
    view: ViewState,
    canvas: Size,
    baseline: BaselineState,
    scheduler: RedrawScheduler,
}

impl<D: GraphicsDevice> MapRenderer<D> {
    /// Takes ownership of `device`, applies the baseline state and sizes the
    /// drawing buffer.
    pub fn new(mut device: D, size: Size, options: MapOptions) -> Self {
        let baseline = BaselineState::with_clear_color(options.clear_color);
        device.reset_state(&baseline);

        let mut map = Self {
            device,
            cache: ResourceCache::new(),
            lifecycle: ContextLifecycle::new(),
            registry: RendererRegistry::new(),
            layers: Vec::new(),
            view: ViewState::new(options.center, options.resolution),
            canvas: Size::default(),
            baseline,
            scheduler: RedrawScheduler::new(),
        };
        map.set_size(size);
        map
    }

    // ---- view hooks ----

    pub fn set_center(&mut self, center: Coordinate) {
        self.view.center = center;
        self.request_redraw();
    }

    pub fn set_resolution(&mut self, resolution: f64) {
        self.view.resolution = resolution;
        self.request_redraw();
    }

    /// Records the new canvas size. A non-empty size also resizes the drawing
    /// buffer, resets the viewport to cover it and schedules a frame.
    pub fn set_size(&mut self, size: Size) {
        self.canvas = size;
        self.view.size = Some(size);
        if size.is_empty() {
            return;
        }
        self.device.resize(size);
        self.device.viewport(size.full_viewport());
        self.request_redraw();
    }

    pub fn set_animating(&mut self, animating: bool) {
        self.view.animating = animating;
        if animating {
            self.request_redraw();
        }
    }

    // ---- layers ----

    /// Registers `layer` on top of the existing ones.
    ///
    /// Fails without registering anything when no renderer exists for the
    /// layer's kind.
    pub fn add_layer(&mut self, layer: Layer) -> Result<LayerId, RenderError> {
        let renderer = RendererRegistry::<D>::create_renderer(&layer)?;
        let id = layer.id();
        self.registry.set_renderer(id, renderer);
        log::debug!("added {} layer {id}", layer.kind().name());

        if layer.visible() {
            self.request_redraw();
        }
        self.layers.push(layer);
        Ok(id)
    }

    pub fn remove_layer(&mut self, id: LayerId) -> Option<Layer> {
        let index = self.layers.iter().position(|l| l.id() == id)?;
        let layer = self.layers.remove(index);
        self.registry.remove_renderer(id);
        log::debug!("removed layer {id}");

        if layer.visible() {
            self.request_redraw();
        }
        Some(layer)
    }

    /// Returns `true` when the visibility changed.
    pub fn set_layer_visible(&mut self, id: LayerId, visible: bool) -> bool {
        let Some(layer) = self.layers.iter_mut().find(|l| l.id() == id) else {
            return false;
        };
        let changed = layer.set_visible(visible);
        if changed {
            self.request_redraw();
        }
        changed
    }

    /// Returns `true` when the opacity changed.
    pub fn set_layer_opacity(&mut self, id: LayerId, opacity: f32) -> bool {
        let Some(layer) = self.layers.iter_mut().find(|l| l.id() == id) else {
            return false;
        };
        let changed = layer.set_opacity(opacity);
        if changed && layer.visible() {
            self.request_redraw();
        }
        changed
    }

    // ---- redraw ----

    /// Returns `true` when this call created the pending frame.
    #[inline]
    pub fn request_redraw(&mut self) -> bool {
        self.scheduler.request()
    }

    #[inline]
    pub fn redraw_pending(&self) -> bool {
        self.scheduler.is_pending()
    }

    /// Applies queued renderer change signals.
    ///
    /// Returns `true` when one of them, from a visible layer, scheduled a
    /// frame.
    pub fn pump_changes(&mut self) -> bool {
        let layers = &self.layers;
        let changed = self
            .registry
            .drain_changes(|id| layers.iter().any(|l| l.id() == id && l.visible()));
        changed && self.request_redraw()
    }

    pub fn handle_context_lost(&mut self, event: &mut ContextLossEvent) {
        self.lifecycle
            .on_lost(event, &mut self.cache, &mut self.registry);
    }

    /// Called once the host has a usable context again.
    pub fn handle_context_restored(&mut self) {
        self.lifecycle.on_restored(&mut self.device, &self.baseline);
        self.request_redraw();
    }

    /// Runs the pending frame, if any.
    pub fn on_refresh(&mut self) -> Result<FrameOutcome, RenderError> {
        if !self.scheduler.is_pending() {
            return Ok(FrameOutcome::Idle);
        }
        if self.lifecycle.is_lost() {
            return Ok(FrameOutcome::Deferred);
        }

        self.scheduler.take();
        let animate = self.redraw()?;
        if animate {
            self.scheduler.request();
        }
        Ok(FrameOutcome::Rendered { animate })
    }

    /// Draws one frame now.
    ///
    /// Every visible layer renders first; their textures are then composited
    /// bottom to top. Returns `true` when more frames are needed. Does nothing
    /// while the context is lost.
    pub fn redraw(&mut self) -> Result<bool, RenderError> {
        if self.lifecycle.is_lost() {
            return Ok(false);
        }

        let visible: Vec<(LayerId, f32)> = self
            .layers
            .iter()
            .filter(|l| l.visible())
            .map(|l| (l.id(), l.opacity()))
            .collect();

        let mut animate = self.view.animating;
        for &(id, _) in &visible {
            if let Some(renderer) = self.registry.get_mut(id) {
                let mut ctx = RenderCtx::new(&mut self.device, &mut self.cache);
                animate |= renderer.redraw(&mut ctx)?;
            }
        }

        self.device.bind_default_framebuffer();
        self.device.clear();

        let program = self
            .cache
            .program(&mut self.device, &COMPOSITE_FRAGMENT, &COMPOSITE_VERTEX)?;
        self.device.use_program(&program);

        for &(id, opacity) in &visible {
            let Some(texture) = self.registry.get(id).and_then(|r| r.texture()) else {
                continue;
            };
            self.device.bind_texture(texture);
            self.device.draw_quad(opacity);
        }

        self.device.present()?;
        Ok(animate)
    }

    /// Unbinds every renderer and releases every cached device object.
    ///
    /// Runs on drop; calling it earlier leaves an empty map.
    pub fn dispose(&mut self) {
        self.registry.clear();
        self.layers.clear();
        self.cache.release_all(&mut self.device);
    }

    // ---- accessors ----

    #[inline]
    pub fn device(&self) -> &D {
        &self.device
    }

    #[inline]
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    #[inline]
    pub fn view(&self) -> &ViewState {
        &self.view
    }

    #[inline]
    pub fn canvas_size(&self) -> Size {
        self.canvas
    }

    #[inline]
    pub fn context_state(&self) -> ContextState {
        self.lifecycle.state()
    }

    #[inline]
    pub fn lifecycle(&self) -> &ContextLifecycle {
        &self.lifecycle
    }

    #[inline]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id() == id)
    }

    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    pub fn renderer(&self, id: LayerId) -> Option<&dyn LayerRenderer<D>> {
        self.registry.get(id)
    }
}

impl<D: GraphicsDevice> Drop for MapRenderer<D> {
    fn drop(&mut self) {
        self.dispose();
    }
}
