//! Coordinate and size types shared across the engine.
//!
//! Sizes and viewports are in physical pixels. Map coordinates are in the
//! projection's units; the engine never interprets them, it only forwards
//! changes to the redraw pipeline.

mod coordinate;
mod size;

pub use coordinate::Coordinate;
pub use size::{Size, ViewportRect};
