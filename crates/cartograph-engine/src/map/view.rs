use crate::coords::{Coordinate, Size};

/// The parts of the view the compositor reacts to.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewState {
    pub center: Coordinate,
    pub resolution: f64,
    /// `None` until the host reports a size.
    pub size: Option<Size>,
    /// Set while an interaction or animation keeps the view moving.
    pub animating: bool,
}

impl ViewState {
    pub fn new(center: Coordinate, resolution: f64) -> Self {
        Self {
            center,
            resolution,
            size: None,
            animating: false,
        }
    }
}
