use crate::coords::Coordinate;
use crate::paint::Color;

/// Construction options for a [`MapRenderer`](super::MapRenderer).
#[derive(Debug, Clone)]
pub struct MapOptions {
    /// Color the framebuffer is cleared to before compositing.
    pub clear_color: Color,
    pub center: Coordinate,
    /// Map units per pixel.
    pub resolution: f64,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            clear_color: Color::RED,
            center: Coordinate::ORIGIN,
            resolution: 1.0,
        }
    }
}
