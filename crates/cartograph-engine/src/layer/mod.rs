//! Layers, their renderers, and the registry binding the two.
//!
//! A layer is the map-facing description (kind, visibility, opacity). Its
//! renderer owns whatever the layer needs on the device and produces one
//! texture per frame for the compositor.

mod image;
mod registry;
mod renderer;
mod tile;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

pub use image::ImageSource;
pub use registry::RendererRegistry;
pub use renderer::{ChangeNotifier, LayerRenderer, RenderCtx, SubscriptionId};
pub use tile::{TileLayerRenderer, TileSource};

static NEXT_LAYER_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a layer for its whole lifetime.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct LayerId(u64);

impl LayerId {
    fn next() -> Self {
        Self(NEXT_LAYER_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer#{}", self.0)
    }
}

/// What a layer draws.
#[derive(Debug, Clone)]
pub enum LayerKind {
    /// Raster tiles from a [`TileSource`].
    Tile(TileSource),
    /// Vector geometry. No renderer exists for it.
    Vector,
}

impl LayerKind {
    pub fn name(&self) -> &'static str {
        match self {
            LayerKind::Tile(_) => "tile",
            LayerKind::Vector => "vector",
        }
    }
}

/// A map layer.
///
/// Not `Clone`: the id is the layer's identity in the registry.
#[derive(Debug)]
pub struct Layer {
    id: LayerId,
    kind: LayerKind,
    visible: bool,
    opacity: f32,
}

impl Layer {
    pub fn new(kind: LayerKind) -> Self {
        Self {
            id: LayerId::next(),
            kind,
            visible: true,
            opacity: 1.0,
        }
    }

    pub fn tile(source: TileSource) -> Self {
        Self::new(LayerKind::Tile(source))
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    #[inline]
    pub fn id(&self) -> LayerId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> &LayerKind {
        &self.kind
    }

    #[inline]
    pub fn visible(&self) -> bool {
        self.visible
    }

    #[inline]
    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub(crate) fn set_visible(&mut self, visible: bool) -> bool {
        let changed = self.visible != visible;
        self.visible = visible;
        changed
    }

    pub(crate) fn set_opacity(&mut self, opacity: f32) -> bool {
        let opacity = opacity.clamp(0.0, 1.0);
        let changed = self.opacity != opacity;
        self.opacity = opacity;
        changed
    }
}
