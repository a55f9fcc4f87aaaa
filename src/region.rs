//! Rectangular candidate regions and the presets that choose them.

use crate::buffer::PixelBuffer;
use crate::error::{Error, Result};

/// Left/top inset of the default badge region.
const BADGE_INSET: i64 = 3;
/// Maximum width of the default badge region.
const BADGE_MAX_WIDTH: i64 = 220;
/// Maximum height of the default badge region.
const BADGE_MAX_HEIGHT: i64 = 90;
/// Badge width as a percentage of the image width.
const BADGE_WIDTH_PERCENT: i64 = 28;
/// Badge height as a percentage of the image height.
const BADGE_HEIGHT_PERCENT: i64 = 15;

/// An immutable integer rectangle `(x, y, width, height)`.
///
/// Coordinates are signed so callers can describe rectangles that hang off
/// the buffer; [`Region::clamp_to`] produces the in-bounds part. A region with
/// non-positive width or height is degenerate and treated as empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    x: i64,
    y: i64,
    width: i64,
    height: i64,
}

impl Region {
    /// Create a region.
    #[must_use]
    pub const fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The default top-left badge region for a `width x height` image:
    /// `x = 3, y = 3, w = min(220, 0.28 W), h = min(90, 0.15 H)`.
    #[must_use]
    pub fn default_for(width: u32, height: u32) -> Self {
        RegionPreset::TopLeftBadge.region_for(width, height)
    }

    /// The smaller fixed region used by the plain-smoothing fallback.
    #[must_use]
    pub const fn fallback() -> Self {
        Self::new(10, 10, 150, 50)
    }

    /// Left edge.
    #[must_use]
    pub const fn x(&self) -> i64 {
        self.x
    }

    /// Top edge.
    #[must_use]
    pub const fn y(&self) -> i64 {
        self.y
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> i64 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> i64 {
        self.height
    }

    /// Exclusive right edge, saturating at `i64::MAX`.
    #[must_use]
    pub const fn right(&self) -> i64 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge, saturating at `i64::MAX`.
    #[must_use]
    pub const fn bottom(&self) -> i64 {
        self.y.saturating_add(self.height)
    }

    /// Whether the region covers no pixels.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Number of pixels covered.
    #[must_use]
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub const fn area(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.width.saturating_mul(self.height) as usize
        }
    }

    /// Whether `(x, y)` lies inside the region.
    #[must_use]
    pub const fn contains(&self, x: i64, y: i64) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Intersect with a `width x height` buffer.
    ///
    /// The result satisfies `0 <= x`, `0 <= y`, `x + w <= width` and
    /// `y + h <= height`, or is empty.
    #[must_use]
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let x0 = self.x.clamp(0, i64::from(width));
        let y0 = self.y.clamp(0, i64::from(height));
        let x1 = self.right().clamp(0, i64::from(width));
        let y1 = self.bottom().clamp(0, i64::from(height));
        if self.is_empty() || x1 <= x0 || y1 <= y0 {
            return Self::new(x0, y0, 0, 0);
        }
        Self::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// Clamp to `buffer`, failing if nothing remains.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRegion`] when the clamped region is empty.
    pub fn clamped(&self, buffer: &PixelBuffer) -> Result<Self> {
        let clamped = self.clamp_to(buffer.width(), buffer.height());
        if clamped.is_empty() {
            return Err(Error::InvalidRegion {
                x: self.x,
                y: self.y,
                width: self.width,
                height: self.height,
            });
        }
        Ok(clamped)
    }

    /// Distance from `(x, y)` to the nearest of the four region edges.
    /// Pixels on the outermost ring are at distance 0.
    #[must_use]
    pub fn edge_distance(&self, x: i64, y: i64) -> i64 {
        let left = x - self.x;
        let right = self.right() - 1 - x;
        let top = y - self.y;
        let bottom = self.bottom() - 1 - y;
        left.min(right).min(top).min(bottom)
    }

    /// Row-major index of `(x, y)` relative to the region origin.
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub(crate) fn local_index(&self, x: i64, y: i64) -> usize {
        ((y - self.y) * self.width + (x - self.x)) as usize
    }

    /// All pixel coordinates in row-major order. Only meaningful on a clamped region.
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub(crate) fn points(&self) -> impl Iterator<Item = (u32, u32)> {
        let (x0, y0) = (self.x.max(0) as u32, self.y.max(0) as u32);
        let (x1, y1) = if self.is_empty() {
            (x0, y0)
        } else {
            (self.right().max(0) as u32, self.bottom().max(0) as u32)
        };
        (y0..y1).flat_map(move |y| (x0..x1).map(move |x| (x, y)))
    }
}

/// Chooses the candidate region from the image dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum RegionPreset {
    /// Badge in the top-left corner: `(3, 3, min(220, 0.28 W), min(90, 0.15 H))`.
    #[default]
    TopLeftBadge,
    /// Corner anchored bottom-right covering `fraction` of each dimension.
    BottomRightCorner {
        /// Share of width and height covered, in `(0, 1]`.
        fraction: f32,
    },
}

impl RegionPreset {
    /// Resolve the preset for a `width x height` image.
    #[must_use]
    pub fn region_for(self, width: u32, height: u32) -> Region {
        let (w, h) = (i64::from(width), i64::from(height));
        match self {
            Self::TopLeftBadge => Region::new(
                BADGE_INSET,
                BADGE_INSET,
                BADGE_MAX_WIDTH.min(w * BADGE_WIDTH_PERCENT / 100),
                BADGE_MAX_HEIGHT.min(h * BADGE_HEIGHT_PERCENT / 100),
            ),
            Self::BottomRightCorner { fraction } => {
                let fraction = f64::from(fraction.clamp(0.0, 1.0));
                #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
                let (cw, ch) = (
                    (w as f64 * fraction).floor() as i64,
                    (h as f64 * fraction).floor() as i64,
                );
                Region::new(w - cw, h - ch, cw, ch)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_region_for_400_square() {
        assert_eq!(Region::default_for(400, 400), Region::new(3, 3, 112, 60));
    }

    #[test]
    fn default_region_caps_at_badge_maximum() {
        assert_eq!(Region::default_for(4000, 3000), Region::new(3, 3, 220, 90));
    }

    #[test]
    fn clamp_trims_to_buffer_bounds() {
        let r = Region::new(-5, 90, 20, 30).clamp_to(100, 100);
        assert_eq!(r, Region::new(0, 90, 15, 10));
        assert!(r.right() <= 100 && r.bottom() <= 100);
    }

    #[test]
    fn clamp_of_disjoint_or_degenerate_region_is_empty() {
        assert!(Region::new(200, 200, 10, 10).clamp_to(100, 100).is_empty());
        assert!(Region::new(5, 5, 0, 10).clamp_to(100, 100).is_empty());
        assert!(Region::new(5, 5, 10, -3).clamp_to(100, 100).is_empty());
    }

    #[test]
    fn clamped_reports_invalid_region() {
        let buf = PixelBuffer::filled(8, 8, [0, 0, 0, 255]);
        let err = Region::new(10, 10, 150, 50).clamped(&buf).unwrap_err();
        assert!(matches!(err, Error::InvalidRegion { x: 10, y: 10, .. }));
    }

    #[test]
    fn edge_distance_is_zero_on_border_and_grows_inward() {
        let r = Region::new(10, 10, 20, 10);
        assert_eq!(r.edge_distance(10, 15), 0);
        assert_eq!(r.edge_distance(29, 15), 0);
        assert_eq!(r.edge_distance(15, 14), 4);
    }

    #[test]
    fn points_cover_region_row_major() {
        let r = Region::new(1, 2, 2, 2);
        let pts: Vec<_> = r.points().collect();
        assert_eq!(pts, vec![(1, 2), (2, 2), (1, 3), (2, 3)]);
        assert_eq!(r.local_index(2, 3), 3);
        assert_eq!(Region::new(0, 0, 0, 5).points().count(), 0);
    }

    #[test]
    fn extreme_coordinates_saturate() {
        let r = Region::new(i64::MAX - 5, i64::MAX - 5, 10, 10);
        assert_eq!(r.right(), i64::MAX);
        assert_eq!(r.bottom(), i64::MAX);
        assert!(r.clamp_to(100, 100).is_empty());
        assert_eq!(
            Region::new(0, 0, i64::MAX, i64::MAX).area(),
            usize::try_from(i64::MAX).unwrap()
        );

        let huge = Region::new(-5, -5, i64::MAX, i64::MAX).clamp_to(100, 100);
        assert_eq!(huge, Region::new(0, 0, 100, 100));
        assert!(Region::new(i64::MIN, 0, 10, 10).clamp_to(100, 100).is_empty());
    }

    #[test]
    fn bottom_right_preset_anchors_corner() {
        let r = RegionPreset::BottomRightCorner { fraction: 0.15 }.region_for(1000, 800);
        assert_eq!(r, Region::new(850, 680, 150, 120));
    }
}
