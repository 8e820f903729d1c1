//! Decoding and downsampling of fetched image bytes.

use image::{DynamicImage, RgbaImage};

use crate::error::Result;

/// Longest edge, in pixels, of a cached thumbnail unless configured otherwise.
pub const DEFAULT_MAX_PIXEL_SIZE: u32 = 350;

/// A decoded image, no larger than the cache's pixel bound on either side.
#[derive(Debug, Clone, PartialEq)]
pub struct Thumbnail {
    pixels: RgbaImage,
}

impl Thumbnail {
    /// Decode `bytes` (any format the `image` crate recognises) and shrink it
    /// so that neither side exceeds `max_pixel_size`.  Smaller images are
    /// kept at their original size.
    pub fn decode(bytes: &[u8], max_pixel_size: u32) -> Result<Self> {
        let decoded = image::load_from_memory(bytes)?;
        Ok(Self::from_image(decoded, max_pixel_size))
    }

    pub fn from_image(image: DynamicImage, max_pixel_size: u32) -> Self {
        let bound = max_pixel_size.max(1);
        let image = if image.width() > bound || image.height() > bound {
            image.thumbnail(bound, bound)
        } else {
            image
        };
        Self {
            pixels: image.into_rgba8(),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}
