//! Edge feathering that blends a processed region into its surroundings.
//!
//! Each pixel gets an intensity from its distance to the nearest region edge,
//! perturbed by a bounded sinusoidal jitter so the seam is not a straight line:
//!
//! `out = intensity * current + (1 - intensity) * gaussian_average`
//!
//! A random factor adds organic variation; the random source is supplied by
//! the caller so runs can be reproduced from a seed.

use rand::Rng;

use crate::buffer::PixelBuffer;
use crate::error::Result;
use crate::region::Region;
use crate::smoothing::to_u8;

/// Width of the fade band in pixels.
const FADE_BAND: f32 = 15.0;
/// Amplitude of each jitter term; the sum stays within +/-3.
const JITTER_AMPLITUDE: f32 = 1.5;
/// Spatial frequency of the jitter.
const JITTER_FREQUENCY: f32 = 0.3;
/// Range of the per-pixel random intensity factor.
const RANDOM_FACTOR: std::ops::RangeInclusive<f32> = 0.8..=1.2;
/// Pixels at or above this intensity are kept as is.
const KEEP_INTENSITY: f32 = 0.95;
/// Gaussian sigma of the local average.
const GAUSSIAN_SIGMA: f32 = 2.0;
/// Gaussian radius of the local average.
const GAUSSIAN_RADIUS: i64 = 4;

/// `3t^2 - 2t^3` on `t` clamped to `[0, 1]`.
fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Bounded seam jitter at `(x, y)`, within `[-3, 3]`.
#[allow(clippy::cast_precision_loss)]
fn jitter(x: i64, y: i64) -> f32 {
    JITTER_AMPLITUDE * (x as f32 * JITTER_FREQUENCY).sin()
        + JITTER_AMPLITUDE * (y as f32 * JITTER_FREQUENCY).cos()
}

/// Deterministic part of the feather intensity at `(x, y)`.
#[allow(clippy::cast_precision_loss)]
fn base_intensity(region: &Region, x: i64, y: i64) -> f32 {
    let distance = region.edge_distance(x, y) as f32 + jitter(x, y);
    smoothstep(distance / FADE_BAND)
}

/// Precomputed `(2r+1)^2` Gaussian weights, row-major.
#[allow(clippy::cast_precision_loss)]
fn gaussian_weights() -> Vec<f32> {
    let two_sigma_sq = 2.0 * GAUSSIAN_SIGMA * GAUSSIAN_SIGMA;
    (-GAUSSIAN_RADIUS..=GAUSSIAN_RADIUS)
        .flat_map(|dy| {
            (-GAUSSIAN_RADIUS..=GAUSSIAN_RADIUS)
                .map(move |dx| (-((dx * dx + dy * dy) as f32) / two_sigma_sq).exp())
        })
        .collect()
}

/// Feather `region` of `buffer` into its surroundings, in place.
///
/// Neighborhood averages are read from the pre-feathering state of the
/// region plus a 4-pixel margin (clipped to the buffer), so the result does
/// not depend on pixel visiting order. Alpha is never modified.
///
/// # Errors
///
/// Returns [`crate::Error::InvalidRegion`] if the region is empty after clamping.
pub fn feather_edges(buffer: &mut PixelBuffer, region: &Region, rng: &mut impl Rng) -> Result<()> {
    let region = region.clamped(buffer)?;
    let source = Region::new(
        region.x() - GAUSSIAN_RADIUS,
        region.y() - GAUSSIAN_RADIUS,
        region.width() + 2 * GAUSSIAN_RADIUS,
        region.height() + 2 * GAUSSIAN_RADIUS,
    )
    .clamp_to(buffer.width(), buffer.height());
    let snapshot = buffer.snapshot(&source);
    let weights = gaussian_weights();
    let side = 2 * GAUSSIAN_RADIUS + 1;

    let gaussian_average = |x: i64, y: i64| -> [f32; 3] {
        let mut acc = [0.0_f32; 3];
        let mut total = 0.0_f32;
        for dy in -GAUSSIAN_RADIUS..=GAUSSIAN_RADIUS {
            for dx in -GAUSSIAN_RADIUS..=GAUSSIAN_RADIUS {
                let (nx, ny) = (x + dx, y + dy);
                if !source.contains(nx, ny) {
                    continue;
                }
                #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
                let w = weights[((dy + GAUSSIAN_RADIUS) * side + dx + GAUSSIAN_RADIUS) as usize];
                let px = snapshot[source.local_index(nx, ny)];
                for (a, &c) in acc.iter_mut().zip(&px[..3]) {
                    *a += w * f32::from(c);
                }
                total += w;
            }
        }
        acc.map(|a| a / total)
    };

    for y in region.y()..region.bottom() {
        for x in region.x()..region.right() {
            let factor = rng.gen_range(RANDOM_FACTOR);
            let intensity = (base_intensity(&region, x, y) * factor).clamp(0.0, 1.0);
            if intensity >= KEEP_INTENSITY {
                continue;
            }

            let current = snapshot[source.local_index(x, y)];
            let avg = gaussian_average(x, y);
            let mix = |c: usize| intensity * f32::from(current[c]) + (1.0 - intensity) * avg[c];
            #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
            let (px, py) = (x as u32, y as u32);
            buffer.put_rgb(px, py, [to_u8(mix(0)), to_u8(mix(1)), to_u8(mix(2))]);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const INSIDE: [u8; 4] = [200, 40, 40, 255];
    const OUTSIDE: [u8; 4] = [40, 40, 200, 255];

    fn seam_buffer(region: &Region) -> PixelBuffer {
        let mut buf = PixelBuffer::filled(80, 60, OUTSIDE);
        for (x, y) in region.points() {
            buf.set_pixel(i64::from(x), i64::from(y), INSIDE);
        }
        buf
    }

    #[test]
    fn smoothstep_is_clamped_and_monotone() {
        assert!(smoothstep(-1.0).abs() < f32::EPSILON);
        assert!((smoothstep(2.0) - 1.0).abs() < f32::EPSILON);
        assert!((smoothstep(0.5) - 0.5).abs() < 1e-6);
        assert!(smoothstep(0.3) < smoothstep(0.6));
    }

    #[test]
    fn jitter_stays_within_three_pixels() {
        for y in -50..50 {
            for x in -50..50 {
                assert!(jitter(x, y).abs() <= 3.0 + 1e-5);
            }
        }
    }

    #[test]
    fn gaussian_weights_peak_at_center() {
        let w = gaussian_weights();
        assert_eq!(w.len(), 81);
        assert!((w[40] - 1.0).abs() < f32::EPSILON);
        assert!(w.iter().all(|&v| v <= w[40]));
    }

    #[test]
    fn uniform_surroundings_are_unchanged() {
        let mut buf = PixelBuffer::filled(80, 60, [90, 140, 60, 255]);
        let before = buf.clone();
        let mut rng = StdRng::seed_from_u64(7);
        feather_edges(&mut buf, &Region::new(3, 3, 50, 40), &mut rng).unwrap();
        assert_eq!(buf, before);
    }

    #[test]
    fn border_pixels_blend_toward_surroundings() {
        let region = Region::new(20, 15, 40, 30);
        let mut buf = seam_buffer(&region);
        let mut rng = StdRng::seed_from_u64(42);
        feather_edges(&mut buf, &region, &mut rng).unwrap();

        let border = buf.pixel(20, 30).unwrap();
        assert!(border[0] < INSIDE[0] && border[2] > INSIDE[2], "{border:?}");

        // Deep interior: every Gaussian neighbor is INSIDE, so any blend is a no-op.
        assert_eq!(buf.pixel(40, 30), Some(INSIDE));
        // Outside the region nothing is written.
        assert_eq!(buf.pixel(19, 30), Some(OUTSIDE));
    }

    #[test]
    fn same_seed_gives_identical_output() {
        let region = Region::new(20, 15, 40, 30);
        let mut a = seam_buffer(&region);
        let mut b = a.clone();
        feather_edges(&mut a, &region, &mut StdRng::seed_from_u64(9)).unwrap();
        feather_edges(&mut b, &region, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_region_is_rejected() {
        let mut buf = PixelBuffer::filled(10, 10, OUTSIDE);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(feather_edges(&mut buf, &Region::new(20, 20, 5, 5), &mut rng).is_err());
    }
}
