use std::fmt;
use std::sync::mpsc::Sender;

use crate::cache::ResourceCache;
use crate::device::GraphicsDevice;
use crate::error::RenderError;
use crate::shader::ShaderSource;

use super::{ImageSource, LayerId};

/// Renderer-facing access to the device caches for one redraw.
///
/// Renderers may request handles but never reach into the caches directly.
pub struct RenderCtx<'a, D: GraphicsDevice> {
    device: &'a mut D,
    cache: &'a mut ResourceCache<D>,
}

impl<'a, D: GraphicsDevice> RenderCtx<'a, D> {
    #[inline]
    pub(crate) fn new(device: &'a mut D, cache: &'a mut ResourceCache<D>) -> Self {
        Self { device, cache }
    }

    /// Uploaded texture for `image`, shared with every other request for the
    /// same locator.
    pub fn texture(&mut self, image: &ImageSource) -> D::Texture {
        self.cache.texture(self.device, image)
    }

    pub fn program(
        &mut self,
        fragment: &ShaderSource,
        vertex: &ShaderSource,
    ) -> Result<D::Program, RenderError> {
        self.cache.program(self.device, fragment, vertex)
    }

    pub fn shader(&mut self, source: &ShaderSource) -> Result<D::Shader, RenderError> {
        self.cache.shader(self.device, source)
    }
}

/// Identifier of one change subscription.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

/// Posts "output changed" signals for one renderer into the registry.
///
/// Signals sent after the subscription was released are dropped by the
/// registry, so a stale notifier is harmless.
#[derive(Clone)]
pub struct ChangeNotifier {
    subscription: SubscriptionId,
    tx: Sender<SubscriptionId>,
}

impl ChangeNotifier {
    pub(crate) fn new(subscription: SubscriptionId, tx: Sender<SubscriptionId>) -> Self {
        Self { subscription, tx }
    }

    #[inline]
    pub fn subscription(&self) -> SubscriptionId {
        self.subscription
    }

    pub fn notify(&self) {
        // The receiver only goes away with the map itself.
        let _ = self.tx.send(self.subscription);
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ChangeNotifier").field(&self.subscription).finish()
    }
}

/// Per-layer renderer driven by the compositor.
pub trait LayerRenderer<D: GraphicsDevice> {
    fn layer(&self) -> LayerId;

    /// Renders the layer's output for this frame.
    ///
    /// Returns `true` when more frames are needed (animation pending).
    fn redraw(&mut self, ctx: &mut RenderCtx<'_, D>) -> Result<bool, RenderError>;

    /// The texture produced by the last `redraw`, if any.
    fn texture(&self) -> Option<&D::Texture>;

    /// Drops every device handle the renderer holds. No release calls: the
    /// context that owned them is gone.
    fn handle_context_lost(&mut self);

    /// Starts posting change signals through `notifier`.
    fn connect(&mut self, notifier: ChangeNotifier);

    /// Stops posting change signals.
    fn disconnect(&mut self);
}
