//! Multi-pass median/mean smoothing that erases text strokes inside a region.
//!
//! Every pass reads the previous pass's output and writes a fresh copy, so all
//! pixels in one pass see the same input. Kernels are clipped at the region
//! edges: nothing outside the region is ever read. Alpha is never touched.

use crate::buffer::PixelBuffer;
use crate::error::{Error, Result};
use crate::region::Region;

/// Largest accepted kernel side.
const MAX_KERNEL_SIZE: u32 = 63;
/// Distance from the region edge over which the enhanced blend ramps.
const EDGE_RAMP: f32 = 5.0;
/// Median weight for interior pixels in enhanced mode.
const INTERIOR_MEDIAN_WEIGHT: f32 = 0.6;
/// Extra median weight at the region border in enhanced mode.
const BORDER_MEDIAN_BOOST: f32 = 0.3;

/// How each pass combines the kernel statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmoothMode {
    /// Replace each pixel by the per-channel median.
    Plain,
    /// Blend median and mean, leaning harder on the median near the border.
    Enhanced,
}

/// Parameters for [`smooth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmoothParams {
    /// Number of passes.
    pub iterations: u32,
    /// Side of the square kernel; must be odd.
    pub kernel_size: u32,
    /// Combination rule.
    pub mode: SmoothMode,
}

impl SmoothParams {
    /// Default enhanced pass: 4 iterations, 13x13 kernel.
    pub const ENHANCED: Self = Self {
        iterations: 4,
        kernel_size: 13,
        mode: SmoothMode::Enhanced,
    };

    /// Default plain pass: 3 iterations, 11x11 kernel.
    pub const PLAIN: Self = Self {
        iterations: 3,
        kernel_size: 11,
        mode: SmoothMode::Plain,
    };

    /// Check the parameters are usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for zero iterations or a kernel
    /// size that is even, zero, or larger than 63.
    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(Error::InvalidParameter {
                name: "iterations",
                value: self.iterations,
            });
        }
        if self.kernel_size % 2 == 0 || self.kernel_size > MAX_KERNEL_SIZE {
            return Err(Error::InvalidParameter {
                name: "kernel size",
                value: self.kernel_size,
            });
        }
        Ok(())
    }
}

/// Median of `values` (upper median for even counts). `values` is reordered.
fn median(values: &mut [u8]) -> u8 {
    let mid = values.len() / 2;
    *values.select_nth_unstable(mid).1
}

/// Smooth `region` of `buffer` in place.
///
/// # Errors
///
/// Returns [`Error::InvalidRegion`] if the region is empty after clamping, or
/// [`Error::InvalidParameter`] if `params` fail validation. The buffer is not
/// modified on error.
pub fn smooth(buffer: &mut PixelBuffer, region: &Region, params: &SmoothParams) -> Result<()> {
    params.validate()?;
    let region = region.clamped(buffer)?;

    let mut current: Vec<[u8; 3]> = region
        .points()
        .map(|(x, y)| {
            let px = buffer.at(x, y);
            [px[0], px[1], px[2]]
        })
        .collect();

    let half = i64::from(params.kernel_size / 2);
    let side = params.kernel_size as usize;
    let mut channels: [Vec<u8>; 3] = std::array::from_fn(|_| Vec::with_capacity(side * side));

    for _ in 0..params.iterations {
        let mut next = current.clone();

        for y in region.y()..region.bottom() {
            let ky0 = (y - half).max(region.y());
            let ky1 = (y + half).min(region.bottom() - 1);
            for x in region.x()..region.right() {
                let kx0 = (x - half).max(region.x());
                let kx1 = (x + half).min(region.right() - 1);

                for ch in &mut channels {
                    ch.clear();
                }
                let mut sums = [0u32; 3];
                for ky in ky0..=ky1 {
                    for kx in kx0..=kx1 {
                        let px = current[region.local_index(kx, ky)];
                        for (c, ch) in channels.iter_mut().enumerate() {
                            ch.push(px[c]);
                            sums[c] += u32::from(px[c]);
                        }
                    }
                }

                #[allow(clippy::cast_precision_loss)]
                let count = channels[0].len() as f32;
                let medians = [
                    median(&mut channels[0]),
                    median(&mut channels[1]),
                    median(&mut channels[2]),
                ];

                let out = match params.mode {
                    SmoothMode::Plain => medians,
                    SmoothMode::Enhanced => {
                        #[allow(clippy::cast_precision_loss)]
                        let d = region.edge_distance(x, y) as f32;
                        let edge_factor = (d / EDGE_RAMP).min(1.0);
                        let blend =
                            INTERIOR_MEDIAN_WEIGHT + BORDER_MEDIAN_BOOST * (1.0 - edge_factor);
                        #[allow(clippy::cast_precision_loss)]
                        let mix = |c: usize| {
                            let mean = sums[c] as f32 / count;
                            blend * f32::from(medians[c]) + (1.0 - blend) * mean
                        };
                        [to_u8(mix(0)), to_u8(mix(1)), to_u8(mix(2))]
                    }
                };
                next[region.local_index(x, y)] = out;
            }
        }

        current = next;
    }

    for ((x, y), rgb) in region.points().zip(current) {
        buffer.put_rgb(x, y, rgb);
    }
    Ok(())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{analyze_region, fixtures::glyph_buffer};

    fn variance(buffer: &PixelBuffer, region: &Region) -> f64 {
        let values: Vec<f64> = region
            .points()
            .flat_map(|(x, y)| {
                let px = buffer.at(x, y);
                [f64::from(px[0]), f64::from(px[1]), f64::from(px[2])]
            })
            .collect();
        #[allow(clippy::cast_precision_loss)]
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
    }

    #[test]
    fn validate_rejects_bad_parameters() {
        let even = SmoothParams {
            kernel_size: 4,
            ..SmoothParams::PLAIN
        };
        assert!(matches!(
            even.validate(),
            Err(Error::InvalidParameter {
                name: "kernel size",
                value: 4
            })
        ));
        let idle = SmoothParams {
            iterations: 0,
            ..SmoothParams::ENHANCED
        };
        assert!(idle.validate().is_err());
        assert!(SmoothParams::ENHANCED.validate().is_ok());
        assert!(SmoothParams::PLAIN.validate().is_ok());
    }

    #[test]
    fn empty_region_is_rejected_without_mutation() {
        let mut buf = PixelBuffer::filled(20, 20, [1, 2, 3, 255]);
        let before = buf.clone();
        let err = smooth(&mut buf, &Region::new(5, 5, 0, 5), &SmoothParams::PLAIN).unwrap_err();
        assert!(matches!(err, Error::InvalidRegion { .. }));
        assert_eq!(buf, before);
    }

    #[test]
    fn uniform_region_is_unchanged() {
        for params in [SmoothParams::PLAIN, SmoothParams::ENHANCED] {
            let mut buf = PixelBuffer::filled(60, 40, [120, 80, 200, 255]);
            let before = buf.clone();
            smooth(&mut buf, &Region::new(3, 3, 40, 30), &params).unwrap();
            assert_eq!(buf, before);
        }
    }

    #[test]
    fn alpha_channel_is_preserved() {
        let mut buf = PixelBuffer::filled(30, 30, [0, 0, 0, 255]);
        for y in 0..30 {
            for x in 0..30 {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let v = ((x * 7 + y * 13) % 256) as u8;
                buf.set_pixel(x, y, [v, 255 - v, v / 2, v]);
            }
        }
        let alpha_before: Vec<u8> = buf.as_bytes().iter().skip(3).step_by(4).copied().collect();
        smooth(&mut buf, &Region::new(2, 2, 26, 26), &SmoothParams::ENHANCED).unwrap();
        let alpha_after: Vec<u8> = buf.as_bytes().iter().skip(3).step_by(4).copied().collect();
        assert_eq!(alpha_before, alpha_after);
    }

    #[test]
    fn pixels_outside_region_are_neither_read_nor_written() {
        let region = Region::new(5, 5, 20, 12);
        let mut a = glyph_buffer(40, 30, Region::new(0, 0, 40, 30));
        let mut b = a.clone();
        // Differ only outside the region.
        for x in 0..40 {
            b.set_pixel(x, 0, [255, 0, 0, 255]);
            b.set_pixel(x, 29, [0, 255, 0, 255]);
        }
        let b_before = b.clone();
        smooth(&mut a, &region, &SmoothParams::ENHANCED).unwrap();
        smooth(&mut b, &region, &SmoothParams::ENHANCED).unwrap();
        for (x, y) in region.points() {
            assert_eq!(a.at(x, y), b.at(x, y));
        }
        for x in 0..40 {
            assert_eq!(b.pixel(x, 0), b_before.pixel(x, 0));
            assert_eq!(b.pixel(x, 29), b_before.pixel(x, 29));
        }
    }

    #[test]
    fn plain_median_erases_sparse_impulse_noise() {
        let mut buf = PixelBuffer::filled(30, 30, [100, 100, 100, 255]);
        for y in (3..30).step_by(7) {
            for x in (3..30).step_by(7) {
                buf.set_pixel(x, y, [255, 255, 255, 255]);
            }
        }
        let params = SmoothParams {
            iterations: 1,
            kernel_size: 5,
            mode: SmoothMode::Plain,
        };
        smooth(&mut buf, &Region::new(0, 0, 30, 30), &params).unwrap();
        assert_eq!(buf, PixelBuffer::filled(30, 30, [100, 100, 100, 255]));
    }

    #[test]
    fn plain_variance_is_non_increasing_with_iterations() {
        let mut ramp = PixelBuffer::filled(40, 10, [0, 0, 0, 255]);
        for x in 0..40 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let v = (x * 5) as u8;
            for y in 0..10 {
                ramp.set_pixel(x, y, [v, v, v, 255]);
            }
        }
        let region = Region::new(0, 0, 40, 10);

        for kernel_size in [3, 5, 11] {
            let mut last = variance(&ramp, &region);
            for iterations in 1..=5 {
                let mut buf = ramp.clone();
                let params = SmoothParams {
                    iterations,
                    kernel_size,
                    mode: SmoothMode::Plain,
                };
                smooth(&mut buf, &region, &params).unwrap();
                let v = variance(&buf, &region);
                assert!(
                    v <= last + 1e-9,
                    "kernel {kernel_size}, {iterations} iterations: {v} > {last}"
                );
                last = v;
            }
        }
    }

    #[test]
    fn enhanced_pass_removes_text_like_pixels() {
        let region = Region::new(3, 3, 112, 60);
        let mut buf = glyph_buffer(200, 100, region);
        let before = analyze_region(&buf, &region).text_ratio;
        smooth(&mut buf, &region, &SmoothParams::ENHANCED).unwrap();
        let after = analyze_region(&buf, &region).text_ratio;
        assert!(before > 0.3);
        assert!(after <= before * 0.5, "text ratio {before} -> {after}");
    }
}
