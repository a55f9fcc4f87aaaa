//! Owned RGBA raster surface the engine operates on.

use image::{DynamicImage, Rgba, RgbaImage};

use crate::error::{Error, Result};
use crate::region::Region;

/// An owned `width x height` RGBA8 surface.
///
/// The byte length always equals `width * height * 4`; the wrapped
/// [`RgbaImage`] enforces this. All mutation is in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    image: RgbaImage,
}

impl PixelBuffer {
    /// Create a buffer with every pixel set to `fill`.
    #[must_use]
    pub fn filled(width: u32, height: u32, fill: [u8; 4]) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, Rgba(fill)),
        }
    }

    /// Wrap raw RGBA bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PixelAccessDenied`] if the buffer has zero area or the
    /// byte length is not `width * height * 4`.
    pub fn from_raw(width: u32, height: u32, bytes: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        let actual = bytes.len();
        let denied = || Error::PixelAccessDenied {
            width,
            height,
            expected,
            actual,
        };
        if expected == 0 {
            return Err(denied());
        }
        let image = RgbaImage::from_raw(width, height, bytes).ok_or_else(denied)?;
        if image.as_raw().len() != expected {
            return Err(denied());
        }
        Ok(Self { image })
    }

    /// Wrap a decoded image of any pixel format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PixelAccessDenied`] for zero-area images.
    pub fn from_dynamic(image: &DynamicImage) -> Result<Self> {
        Self::from_image(image.to_rgba8())
    }

    /// Wrap an existing RGBA image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PixelAccessDenied`] for zero-area images.
    pub fn from_image(image: RgbaImage) -> Result<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(Error::PixelAccessDenied {
                width: image.width(),
                height: image.height(),
                expected: 0,
                actual: image.as_raw().len(),
            });
        }
        Ok(Self { image })
    }

    /// Consume the buffer and return the underlying image.
    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Borrow the underlying image.
    #[must_use]
    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    /// Raw RGBA bytes in row-major order.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// `(width, height)` in pixels.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Read a pixel, `None` when out of bounds.
    #[must_use]
    pub fn pixel(&self, x: i64, y: i64) -> Option<[u8; 4]> {
        let (x, y) = (u32::try_from(x).ok()?, u32::try_from(y).ok()?);
        self.image.get_pixel_checked(x, y).map(|p| p.0)
    }

    /// Write a pixel; returns `false` (and writes nothing) when out of bounds.
    pub fn set_pixel(&mut self, x: i64, y: i64, px: [u8; 4]) -> bool {
        let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
            return false;
        };
        match self.image.get_pixel_mut_checked(x, y) {
            Some(p) => {
                p.0 = px;
                true
            }
            None => false,
        }
    }

    /// Read a pixel at a coordinate already known to be in bounds.
    pub(crate) fn at(&self, x: u32, y: u32) -> [u8; 4] {
        self.image.get_pixel(x, y).0
    }

    /// Overwrite the RGB channels of an in-bounds pixel, keeping alpha.
    pub(crate) fn put_rgb(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        let p = self.image.get_pixel_mut(x, y);
        p.0[..3].copy_from_slice(&rgb);
    }

    /// Copy the pixels of a clamped region, row by row.
    pub(crate) fn snapshot(&self, region: &Region) -> Vec<[u8; 4]> {
        region.points().map(|(x, y)| self.at(x, y)).collect()
    }

    /// Write back pixels captured by [`PixelBuffer::snapshot`] for the same region.
    pub(crate) fn restore(&mut self, region: &Region, pixels: &[[u8; 4]]) {
        for ((x, y), px) in region.points().zip(pixels) {
            self.image.get_pixel_mut(x, y).0 = *px;
        }
    }
}

impl From<PixelBuffer> for DynamicImage {
    fn from(buffer: PixelBuffer) -> Self {
        DynamicImage::ImageRgba8(buffer.image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_rejects_length_mismatch() {
        let err = PixelBuffer::from_raw(4, 4, vec![0; 10]).unwrap_err();
        assert!(matches!(
            err,
            Error::PixelAccessDenied {
                expected: 64,
                actual: 10,
                ..
            }
        ));
    }

    #[test]
    fn from_raw_rejects_zero_area() {
        assert!(PixelBuffer::from_raw(0, 5, Vec::new()).is_err());
    }

    #[test]
    fn pixel_access_is_bounds_checked() {
        let mut buf = PixelBuffer::filled(3, 2, [1, 2, 3, 255]);
        assert_eq!(buf.pixel(2, 1), Some([1, 2, 3, 255]));
        assert_eq!(buf.pixel(3, 0), None);
        assert_eq!(buf.pixel(-1, 0), None);

        assert!(buf.set_pixel(0, 0, [9, 9, 9, 9]));
        assert!(!buf.set_pixel(0, 2, [9, 9, 9, 9]));
        assert_eq!(buf.pixel(0, 0), Some([9, 9, 9, 9]));
        assert_eq!(buf.as_bytes().len(), 3 * 2 * 4);
    }

    #[test]
    fn snapshot_and_restore_round_trip_a_region() {
        let mut buf = PixelBuffer::filled(10, 10, [50, 60, 70, 255]);
        let region = Region::new(2, 2, 4, 3).clamp_to(10, 10);
        let saved = buf.snapshot(&region);
        for (x, y) in region.points() {
            buf.put_rgb(x, y, [0, 0, 0]);
        }
        assert_eq!(buf.pixel(3, 3), Some([0, 0, 0, 255]));
        buf.restore(&region, &saved);
        assert_eq!(buf, PixelBuffer::filled(10, 10, [50, 60, 70, 255]));
    }
}
