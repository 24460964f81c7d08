use std::cell::RefCell;
use std::rc::Rc;

use crate::device::GraphicsDevice;
use crate::error::RenderError;

use super::{ChangeNotifier, ImageSource, LayerId, LayerRenderer, RenderCtx, SubscriptionId};

#[derive(Debug, Default)]
struct TileSourceState {
    image: Option<ImageSource>,
    loading: bool,
    watchers: Vec<ChangeNotifier>,
}

/// Shared handle to a layer's raster content.
///
/// The host updates it as tiles arrive; the layer's renderer watches it and
/// signals a change on every update.
#[derive(Debug, Clone, Default)]
pub struct TileSource {
    state: Rc<RefCell<TileSourceState>>,
}

impl TileSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(image: ImageSource) -> Self {
        let source = Self::new();
        source.state.borrow_mut().image = Some(image);
        source
    }

    /// Replaces the current image and ends any pending load.
    pub fn set_image(&self, image: ImageSource) {
        {
            let mut state = self.state.borrow_mut();
            state.image = Some(image);
            state.loading = false;
        }
        self.notify();
    }

    pub fn clear_image(&self) {
        self.state.borrow_mut().image = None;
        self.notify();
    }

    /// While loading, the layer keeps requesting frames.
    pub fn set_loading(&self, loading: bool) {
        let changed = {
            let mut state = self.state.borrow_mut();
            std::mem::replace(&mut state.loading, loading) != loading
        };
        if changed {
            self.notify();
        }
    }

    pub fn image(&self) -> Option<ImageSource> {
        self.state.borrow().image.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub(crate) fn watch(&self, notifier: ChangeNotifier) {
        self.state.borrow_mut().watchers.push(notifier);
    }

    pub(crate) fn unwatch(&self, subscription: SubscriptionId) {
        self.state
            .borrow_mut()
            .watchers
            .retain(|n| n.subscription() != subscription);
    }

    #[cfg(test)]
    pub(crate) fn watcher_count(&self) -> usize {
        self.state.borrow().watchers.len()
    }

    fn notify(&self) {
        for watcher in &self.state.borrow().watchers {
            watcher.notify();
        }
    }
}

/// Renderer for [`LayerKind::Tile`](super::LayerKind::Tile) layers.
///
/// Its output is the source's current image, uploaded through the shared
/// texture cache.
pub struct TileLayerRenderer<D: GraphicsDevice> {
    layer: LayerId,
    source: TileSource,
    texture: Option<D::Texture>,
    subscription: Option<SubscriptionId>,
}

impl<D: GraphicsDevice> TileLayerRenderer<D> {
    pub fn new(layer: LayerId, source: TileSource) -> Self {
        Self {
            layer,
            source,
            texture: None,
            subscription: None,
        }
    }

    #[inline]
    pub fn source(&self) -> &TileSource {
        &self.source
    }
}

impl<D: GraphicsDevice> LayerRenderer<D> for TileLayerRenderer<D> {
    fn layer(&self) -> LayerId {
        self.layer
    }

    fn redraw(&mut self, ctx: &mut RenderCtx<'_, D>) -> Result<bool, RenderError> {
        self.texture = self.source.image().map(|image| ctx.texture(&image));
        Ok(self.source.is_loading())
    }

    fn texture(&self) -> Option<&D::Texture> {
        self.texture.as_ref()
    }

    fn handle_context_lost(&mut self) {
        self.texture = None;
    }

    fn connect(&mut self, notifier: ChangeNotifier) {
        self.disconnect();
        self.subscription = Some(notifier.subscription());
        self.source.watch(notifier);
    }

    fn disconnect(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.source.unwatch(subscription);
        }
    }
}

impl<D: GraphicsDevice> Drop for TileLayerRenderer<D> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::cache::ResourceCache;
    use crate::device::testing::FakeDevice;

    fn image(locator: &str) -> ImageSource {
        ImageSource::from_rgba8(locator, 1, 1, vec![255, 255, 255, 255]).unwrap()
    }

    fn renderer(source: &TileSource) -> TileLayerRenderer<FakeDevice> {
        let layer = crate::layer::Layer::tile(source.clone());
        TileLayerRenderer::new(layer.id(), source.clone())
    }

    #[test]
    fn redraw_uploads_current_image() {
        let source = TileSource::with_image(image("t.png"));
        let mut r = renderer(&source);
        let mut dev = FakeDevice::new();
        let mut cache = ResourceCache::new();

        let animate = r.redraw(&mut RenderCtx::new(&mut dev, &mut cache)).unwrap();

        assert!(!animate);
        assert_eq!(r.texture().copied(), dev.texture_for("t.png"));
    }

    #[test]
    fn redraw_without_image_produces_nothing() {
        let source = TileSource::new();
        let mut r = renderer(&source);
        let mut dev = FakeDevice::new();
        let mut cache = ResourceCache::new();

        r.redraw(&mut RenderCtx::new(&mut dev, &mut cache)).unwrap();

        assert!(r.texture().is_none());
        assert_eq!(dev.uploads(), 0);
    }

    #[test]
    fn loading_source_requests_more_frames() {
        let source = TileSource::new();
        source.set_loading(true);
        let mut r = renderer(&source);
        let mut dev = FakeDevice::new();
        let mut cache = ResourceCache::new();

        assert!(r.redraw(&mut RenderCtx::new(&mut dev, &mut cache)).unwrap());
    }

    #[test]
    fn context_loss_drops_texture_without_release() {
        let source = TileSource::with_image(image("t.png"));
        let mut r = renderer(&source);
        let mut dev = FakeDevice::new();
        let mut cache = ResourceCache::new();
        r.redraw(&mut RenderCtx::new(&mut dev, &mut cache)).unwrap();

        r.handle_context_lost();

        assert!(r.texture().is_none());
        assert_eq!(dev.deletes(), 0);
    }

    #[test]
    fn source_updates_reach_connected_notifier() {
        let (tx, rx) = mpsc::channel();
        let source = TileSource::new();
        let mut r = renderer(&source);
        r.connect(ChangeNotifier::new(SubscriptionId(7), tx));

        source.set_image(image("t.png"));

        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![SubscriptionId(7)]);
    }

    #[test]
    fn disconnect_and_drop_release_the_watch() {
        let (tx, rx) = mpsc::channel();
        let source = TileSource::new();
        let mut r = renderer(&source);
        r.connect(ChangeNotifier::new(SubscriptionId(1), tx.clone()));
        assert_eq!(source.watcher_count(), 1);

        r.disconnect();
        assert_eq!(source.watcher_count(), 0);

        r.connect(ChangeNotifier::new(SubscriptionId(2), tx));
        drop(r);
        assert_eq!(source.watcher_count(), 0);

        source.set_image(image("t.png"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn reconnect_replaces_previous_watch() {
        let (tx, _rx) = mpsc::channel();
        let source = TileSource::new();
        let mut r = renderer(&source);

        r.connect(ChangeNotifier::new(SubscriptionId(1), tx.clone()));
        r.connect(ChangeNotifier::new(SubscriptionId(2), tx));

        assert_eq!(source.watcher_count(), 1);
    }

    #[test]
    fn unchanged_loading_flag_is_silent() {
        let (tx, rx) = mpsc::channel();
        let source = TileSource::new();
        let mut r = renderer(&source);
        r.connect(ChangeNotifier::new(SubscriptionId(3), tx));

        source.set_loading(false);

        assert!(rx.try_recv().is_err());
    }
}
