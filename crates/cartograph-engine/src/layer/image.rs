use std::fmt;
use std::sync::Arc;

use crate::error::RenderError;

/// Decoded RGBA8 image identified by a stable locator.
///
/// The locator (usually the tile URL) is the texture cache key: two images
/// with the same locator share one uploaded texture. Cloning is cheap.
#[derive(Clone)]
pub struct ImageSource {
    locator: Arc<str>,
    width: u32,
    height: u32,
    pixels: Arc<[u8]>,
}

impl ImageSource {
    /// Wraps tightly packed RGBA8 rows, top row first.
    pub fn from_rgba8(
        locator: impl Into<Arc<str>>,
        width: u32,
        height: u32,
        pixels: impl Into<Arc<[u8]>>,
    ) -> Result<Self, RenderError> {
        let locator = locator.into();
        let pixels = pixels.into();

        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(RenderError::InvalidImage {
                locator: locator.to_string(),
                expected,
                actual: pixels.len(),
            });
        }

        Ok(Self {
            locator,
            width,
            height,
            pixels,
        })
    }

    #[inline]
    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub(crate) fn locator_arc(&self) -> Arc<str> {
        Arc::clone(&self.locator)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

impl fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageSource")
            .field("locator", &self.locator)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}
