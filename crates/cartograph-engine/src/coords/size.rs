use winit::dpi::PhysicalSize;

/// Drawable size in physical pixels.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A zero-area size cannot back a surface; callers record it and wait for
    /// the next non-empty resize.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Viewport covering the whole drawable, anchored at the origin.
    #[inline]
    pub fn full_viewport(self) -> ViewportRect {
        ViewportRect::new(0, 0, self.width, self.height)
    }
}

impl From<PhysicalSize<u32>> for Size {
    fn from(size: PhysicalSize<u32>) -> Self {
        Self::new(size.width, size.height)
    }
}

/// Device viewport rectangle in physical pixels.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ViewportRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ViewportRect {
    #[inline]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Clamps the rectangle to a target of `bounds`, as required by backends
    /// that reject viewports reaching outside the attachment.
    pub fn clamped_to(self, bounds: Size) -> Self {
        let x = self.x.clamp(0, bounds.width as i32);
        let y = self.y.clamp(0, bounds.height as i32);
        let width = self.width.min(bounds.width.saturating_sub(x as u32));
        let height = self.height.min(bounds.height.saturating_sub(y as u32));
        Self { x, y, width, height }
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_viewport_is_anchored_at_origin() {
        assert_eq!(Size::new(400, 300).full_viewport(), ViewportRect::new(0, 0, 400, 300));
    }

    #[test]
    fn empty_sizes() {
        assert!(Size::new(0, 300).is_empty());
        assert!(Size::new(400, 0).is_empty());
        assert!(!Size::new(1, 1).is_empty());
    }

    #[test]
    fn clamp_shrinks_oversized_viewport() {
        let vp = ViewportRect::new(0, 0, 800, 600).clamped_to(Size::new(400, 300));
        assert_eq!(vp, ViewportRect::new(0, 0, 400, 300));
    }

    #[test]
    fn clamp_keeps_offset_inside_bounds() {
        let vp = ViewportRect::new(350, -10, 100, 100).clamped_to(Size::new(400, 300));
        assert_eq!(vp, ViewportRect::new(350, 0, 50, 100));
    }
}
