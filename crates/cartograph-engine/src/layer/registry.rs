use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::device::GraphicsDevice;
use crate::error::RenderError;

use super::{ChangeNotifier, Layer, LayerId, LayerKind, LayerRenderer, SubscriptionId, TileLayerRenderer};

struct Binding<D: GraphicsDevice> {
    renderer: Box<dyn LayerRenderer<D>>,
    subscription: SubscriptionId,
}

/// One renderer and one change subscription per registered layer.
///
/// Renderers post change signals through their [`ChangeNotifier`]; the owner
/// drains them with [`drain_changes`](Self::drain_changes) between frames.
pub struct RendererRegistry<D: GraphicsDevice> {
    bindings: HashMap<LayerId, Binding<D>>,
    subscribers: HashMap<SubscriptionId, LayerId>,
    next_subscription: u64,
    tx: Sender<SubscriptionId>,
    rx: Receiver<SubscriptionId>,
}

impl<D: GraphicsDevice> Default for RendererRegistry<D> {
    fn default() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            bindings: HashMap::new(),
            subscribers: HashMap::new(),
            next_subscription: 1,
            tx,
            rx,
        }
    }
}

impl<D: GraphicsDevice> RendererRegistry<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the renderer for `layer`'s kind.
    pub fn create_renderer(layer: &Layer) -> Result<Box<dyn LayerRenderer<D>>, RenderError> {
        match layer.kind() {
            LayerKind::Tile(source) => Ok(Box::new(TileLayerRenderer::<D>::new(
                layer.id(),
                source.clone(),
            ))),
            LayerKind::Vector => Err(RenderError::UnsupportedLayerKind {
                kind: layer.kind().name(),
            }),
        }
    }

    /// Binds `renderer` to `layer` under a fresh subscription.
    ///
    /// Returns the renderer previously bound to the layer, already
    /// disconnected.
    pub fn set_renderer(
        &mut self,
        layer: LayerId,
        mut renderer: Box<dyn LayerRenderer<D>>,
    ) -> Option<Box<dyn LayerRenderer<D>>> {
        let previous = self.remove_renderer(layer);

        let subscription = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;

        renderer.connect(ChangeNotifier::new(subscription, self.tx.clone()));
        self.subscribers.insert(subscription, layer);
        self.bindings.insert(
            layer,
            Binding {
                renderer,
                subscription,
            },
        );
        log::debug!("renderer bound: {layer} ({subscription:?})");

        previous
    }

    /// Unbinds the layer's renderer and releases its subscription.
    pub fn remove_renderer(&mut self, layer: LayerId) -> Option<Box<dyn LayerRenderer<D>>> {
        let mut binding = self.bindings.remove(&layer)?;
        binding.renderer.disconnect();
        self.subscribers.remove(&binding.subscription);
        log::debug!("renderer unbound: {layer}");
        Some(binding.renderer)
    }

    pub fn get(&self, layer: LayerId) -> Option<&dyn LayerRenderer<D>> {
        self.bindings.get(&layer).map(|b| b.renderer.as_ref())
    }

    pub fn get_mut(&mut self, layer: LayerId) -> Option<&mut (dyn LayerRenderer<D> + 'static)> {
        self.bindings.get_mut(&layer).map(|b| b.renderer.as_mut())
    }

    #[inline]
    pub fn contains(&self, layer: LayerId) -> bool {
        self.bindings.contains_key(&layer)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn handle_context_lost(&mut self) {
        for binding in self.bindings.values_mut() {
            binding.renderer.handle_context_lost();
        }
    }

    /// Consumes pending change signals.
    ///
    /// Returns `true` when at least one came from a live subscription whose
    /// layer is visible. Signals of released subscriptions are dropped.
    pub fn drain_changes(&mut self, is_visible: impl Fn(LayerId) -> bool) -> bool {
        let mut redraw = false;
        while let Ok(subscription) = self.rx.try_recv() {
            if let Some(&layer) = self.subscribers.get(&subscription) {
                redraw |= is_visible(layer);
            }
        }
        redraw
    }

    /// Unbinds every renderer.
    pub fn clear(&mut self) {
        for (_, mut binding) in self.bindings.drain() {
            binding.renderer.disconnect();
        }
        self.subscribers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::testing::FakeDevice;
    use crate::layer::{ImageSource, TileSource};

    type Registry = RendererRegistry<FakeDevice>;

    fn image(locator: &str) -> ImageSource {
        ImageSource::from_rgba8(locator, 1, 1, vec![0, 0, 0, 255]).unwrap()
    }

    fn bind(registry: &mut Registry, layer: &Layer) {
        let renderer = Registry::create_renderer(layer).unwrap();
        registry.set_renderer(layer.id(), renderer);
    }

    #[test]
    fn tile_layer_gets_tile_renderer() {
        let layer = Layer::tile(TileSource::new());
        let renderer = Registry::create_renderer(&layer).unwrap();
        assert_eq!(renderer.layer(), layer.id());
    }

    #[test]
    fn vector_layer_is_rejected() {
        let layer = Layer::new(LayerKind::Vector);
        let err = Registry::create_renderer(&layer).err().unwrap();
        assert_eq!(err, RenderError::UnsupportedLayerKind { kind: "vector" });
    }

    #[test]
    fn remove_twice_yields_some_then_none() {
        let mut registry = Registry::new();
        let layer = Layer::tile(TileSource::new());
        bind(&mut registry, &layer);

        assert!(registry.remove_renderer(layer.id()).is_some());
        assert!(registry.remove_renderer(layer.id()).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn replacing_returns_previous_and_releases_its_subscription() {
        let mut registry = Registry::new();
        let source = TileSource::new();
        let layer = Layer::tile(source.clone());
        bind(&mut registry, &layer);

        let renderer = Registry::create_renderer(&layer).unwrap();
        let previous = registry.set_renderer(layer.id(), renderer);

        assert!(previous.is_some());
        assert_eq!(registry.len(), 1);
        assert_eq!(source.watcher_count(), 1);
    }

    #[test]
    fn visible_change_requests_redraw() {
        let mut registry = Registry::new();
        let source = TileSource::new();
        let layer = Layer::tile(source.clone());
        bind(&mut registry, &layer);

        source.set_image(image("a.png"));

        assert!(registry.drain_changes(|_| true));
        assert!(!registry.drain_changes(|_| true));
    }

    #[test]
    fn invisible_change_is_consumed_without_redraw() {
        let mut registry = Registry::new();
        let source = TileSource::new();
        let layer = Layer::tile(source.clone());
        bind(&mut registry, &layer);

        source.set_image(image("a.png"));

        assert!(!registry.drain_changes(|_| false));
    }

    #[test]
    fn signal_queued_before_removal_is_ignored() {
        let mut registry = Registry::new();
        let source = TileSource::new();
        let layer = Layer::tile(source.clone());
        bind(&mut registry, &layer);

        source.set_image(image("a.png"));
        registry.remove_renderer(layer.id());

        assert!(!registry.drain_changes(|_| true));
    }

    #[test]
    fn notifier_outliving_its_binding_is_ignored() {
        let mut registry = Registry::new();
        let layer = Layer::tile(TileSource::new());
        bind(&mut registry, &layer);
        let stale = ChangeNotifier::new(SubscriptionId(1), registry.tx.clone());

        registry.remove_renderer(layer.id());
        stale.notify();

        assert!(!registry.drain_changes(|_| true));
    }

    #[test]
    fn context_loss_reaches_every_renderer() {
        let mut registry = Registry::new();
        let mut device = FakeDevice::new();
        let mut cache = crate::cache::ResourceCache::new();
        let layers = [
            Layer::tile(TileSource::with_image(image("a.png"))),
            Layer::tile(TileSource::with_image(image("b.png"))),
        ];
        for layer in &layers {
            bind(&mut registry, layer);
            let renderer = registry.get_mut(layer.id()).unwrap();
            renderer
                .redraw(&mut crate::layer::RenderCtx::new(&mut device, &mut cache))
                .unwrap();
            assert!(renderer.texture().is_some());
        }

        registry.handle_context_lost();

        for layer in &layers {
            assert!(registry.get(layer.id()).unwrap().texture().is_none());
        }
    }

    #[test]
    fn clear_disconnects_everything() {
        let mut registry = Registry::new();
        let source = TileSource::new();
        bind(&mut registry, &Layer::tile(source.clone()));

        registry.clear();

        assert!(registry.is_empty());
        assert_eq!(source.watcher_count(), 0);
    }
}
