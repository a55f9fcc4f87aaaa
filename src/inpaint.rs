//! Reconstruction fallbacks: content-aware fill, flat background repair and
//! strip tiling.
//!
//! Content-aware fill only ever reads pixels outside the target region, so the
//! result does not depend on the order in which target pixels are visited.

use rand::Rng;
use tracing::debug;

use crate::buffer::PixelBuffer;
use crate::error::{Error, Result};
use crate::region::Region;
use crate::smoothing::to_u8;

/// Search radius around each target pixel.
const SEARCH_RADIUS: i64 = 25;
/// Grid step of the search.
const SEARCH_STEP: usize = 2;
/// Candidates at or below this similarity are discarded.
const MIN_SIMILARITY: f32 = 0.3;
/// Number of best candidates blended per target pixel.
const TOP_CANDIDATES: usize = 5;
/// Radius of the plain neighborhood average used when no candidate matches.
const AVERAGE_RADIUS: i64 = 8;
/// Color used when no reference pixel exists at all.
const NEUTRAL_GRAY: [u8; 3] = [200, 200, 200];
/// Distance of the flat-repair samples from the region edges.
const REPAIR_SAMPLE_OFFSET: i64 = 5;
/// Per-channel jitter applied to the flat-repair color.
const REPAIR_JITTER: i32 = 5;
/// Width of the source strip used by [`strip_fill`] by default.
pub const DEFAULT_STRIP_WIDTH: u32 = 5;

/// A source color scored against a target neighborhood.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Source pixel color.
    pub color: [u8; 4],
    /// Neighborhood similarity in `[0, 1]`.
    pub similarity: f32,
}

/// Read-only view over the pixels surrounding a hole.
struct Surroundings<'a> {
    buffer: &'a PixelBuffer,
    hole: Region,
}

impl Surroundings<'_> {
    /// Pixel at `(x, y)` if it is in bounds and outside the hole.
    fn known(&self, x: i64, y: i64) -> Option<[u8; 4]> {
        if self.hole.contains(x, y) {
            return None;
        }
        self.buffer.pixel(x, y)
    }

    /// Similarity of the 3x3 neighborhoods around target `t` and source `s`,
    /// averaged over pairs where both sides are known.
    #[allow(clippy::cast_precision_loss)]
    fn similarity(&self, t: (i64, i64), s: (i64, i64)) -> Option<f32> {
        let mut total = 0.0_f32;
        let mut pairs = 0u32;
        for dy in -1..=1 {
            for dx in -1..=1 {
                let (Some(a), Some(b)) = (
                    self.known(t.0 + dx, t.1 + dy),
                    self.known(s.0 + dx, s.1 + dy),
                ) else {
                    continue;
                };
                let distance = a[..3]
                    .iter()
                    .zip(&b[..3])
                    .map(|(&p, &q)| (f32::from(p) - f32::from(q)).abs())
                    .sum::<f32>()
                    / 3.0;
                total += 1.0 - distance / 255.0;
                pairs += 1;
            }
        }
        (pairs > 0).then(|| total / pairs as f32)
    }

    /// Best-matching source candidates for target `(x, y)`, strongest first.
    fn candidates(&self, x: i64, y: i64) -> Vec<Candidate> {
        let mut found = Vec::new();
        for sy in (y - SEARCH_RADIUS..=y + SEARCH_RADIUS).step_by(SEARCH_STEP) {
            for sx in (x - SEARCH_RADIUS..=x + SEARCH_RADIUS).step_by(SEARCH_STEP) {
                let Some(color) = self.known(sx, sy) else {
                    continue;
                };
                match self.similarity((x, y), (sx, sy)) {
                    Some(similarity) if similarity > MIN_SIMILARITY => {
                        found.push(Candidate { color, similarity });
                    }
                    _ => {}
                }
            }
        }
        found.sort_unstable_by(|a, b| b.similarity.total_cmp(&a.similarity));
        found.truncate(TOP_CANDIDATES);
        found
    }

    /// Unweighted mean of the known pixels within `radius`.
    #[allow(clippy::cast_possible_truncation)]
    fn neighborhood_average(&self, x: i64, y: i64, radius: i64) -> Option<[u8; 3]> {
        let mut sums = [0u64; 3];
        let mut count = 0u64;
        for ny in y - radius..=y + radius {
            for nx in x - radius..=x + radius {
                if let Some(px) = self.known(nx, ny) {
                    for (s, &c) in sums.iter_mut().zip(&px[..3]) {
                        *s += u64::from(c);
                    }
                    count += 1;
                }
            }
        }
        (count > 0).then(|| sums.map(|s| ((s + count / 2) / count) as u8))
    }

    fn reconstruct(&self, x: i64, y: i64) -> [u8; 3] {
        let candidates = self.candidates(x, y);
        if !candidates.is_empty() {
            return weighted_color(&candidates);
        }
        // Deep pixels see no known neighbors at the base radius; widen until
        // the window covers the whole buffer.
        let reach = i64::from(self.buffer.width().max(self.buffer.height()));
        let mut radius = AVERAGE_RADIUS;
        loop {
            if let Some(color) = self.neighborhood_average(x, y, radius) {
                return color;
            }
            if radius >= reach {
                return NEUTRAL_GRAY;
            }
            radius *= 2;
        }
    }
}

/// Similarity-weighted mean color of `candidates` (non-empty, positive weights).
fn weighted_color(candidates: &[Candidate]) -> [u8; 3] {
    let mut acc = [0.0_f32; 3];
    let mut total = 0.0_f32;
    for c in candidates {
        for (a, &v) in acc.iter_mut().zip(&c.color[..3]) {
            *a += c.similarity * f32::from(v);
        }
        total += c.similarity;
    }
    acc.map(|a| to_u8(a / total))
}

/// Fill `region` by blending similar neighborhoods found outside it.
///
/// For each target pixel a grid (step 2, radius 25) of known source pixels is
/// searched; the five most similar (above 0.3) are blended by similarity.
/// Without any match the mean of known pixels within radius 8 is used, the
/// radius doubling until known pixels are found. Only when the region covers
/// the whole buffer is a neutral light gray used. Alpha is never modified.
///
/// # Errors
///
/// Returns [`Error::InvalidRegion`] if the region is empty after clamping.
pub fn inpaint(buffer: &mut PixelBuffer, region: &Region) -> Result<()> {
    let hole = region.clamped(buffer)?;
    let filled: Vec<[u8; 3]> = {
        let view = Surroundings {
            buffer: &*buffer,
            hole,
        };
        hole.points()
            .map(|(x, y)| view.reconstruct(i64::from(x), i64::from(y)))
            .collect()
    };
    for ((x, y), rgb) in hole.points().zip(filled) {
        buffer.put_rgb(x, y, rgb);
    }
    Ok(())
}

/// Flat-fill `region` with a color sampled just outside it.
///
/// Samples one pixel above, left, right and below the region center (clamped
/// into the buffer), weights the upper and left samples twice, adds a small
/// per-channel jitter and paints the whole region with the result. Samples
/// that clamp back into the region are skipped.
///
/// # Errors
///
/// Returns [`Error::InvalidRegion`] if the region is empty after clamping.
pub fn simple_background_repair(
    buffer: &mut PixelBuffer,
    region: &Region,
    rng: &mut impl Rng,
) -> Result<()> {
    let r = region.clamped(buffer)?;
    let (cx, cy) = (r.x() + r.width() / 2, r.y() + r.height() / 2);
    let max_x = i64::from(buffer.width()) - 1;
    let max_y = i64::from(buffer.height()) - 1;

    let samples = [
        ((cx, r.y() - REPAIR_SAMPLE_OFFSET), 2u32),
        ((r.x() - REPAIR_SAMPLE_OFFSET, cy), 2),
        ((r.right() - 1 + REPAIR_SAMPLE_OFFSET, cy), 1),
        ((cx, r.bottom() - 1 + REPAIR_SAMPLE_OFFSET), 1),
    ];

    let mut sums = [0u32; 3];
    let mut weight = 0u32;
    for ((x, y), w) in samples {
        let (x, y) = (x.clamp(0, max_x), y.clamp(0, max_y));
        if r.contains(x, y) {
            continue;
        }
        let Some(px) = buffer.pixel(x, y) else {
            continue;
        };
        for (s, &c) in sums.iter_mut().zip(&px[..3]) {
            *s += w * u32::from(c);
        }
        weight += w;
    }
    if weight == 0 {
        return Err(Error::InvalidRegion {
            x: region.x(),
            y: region.y(),
            width: region.width(),
            height: region.height(),
        });
    }

    let color = sums.map(|s| {
        let base = i32::try_from(s / weight).unwrap_or(255);
        let jittered = base + rng.gen_range(-REPAIR_JITTER..=REPAIR_JITTER);
        u8::try_from(jittered.clamp(0, 255)).unwrap_or(u8::MAX)
    });
    debug!(?color, "flat background repair");

    for (x, y) in r.points() {
        buffer.put_rgb(x, y, color);
    }
    Ok(())
}

/// Tile the column strip immediately left of `region` across it.
///
/// The strip is up to `strip_width` columns wide (fewer when the region sits
/// close to the left edge) and spans the region's rows.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] for a zero strip width, or
/// [`Error::InvalidRegion`] if the region is empty after clamping or starts at
/// the left or top edge of the buffer, leaving no strip to copy from.
pub fn strip_fill(buffer: &mut PixelBuffer, region: &Region, strip_width: u32) -> Result<()> {
    if strip_width == 0 {
        return Err(Error::InvalidParameter {
            name: "strip width",
            value: strip_width,
        });
    }
    let r = region.clamped(buffer)?;
    if r.x() == 0 || r.y() == 0 {
        return Err(Error::InvalidRegion {
            x: region.x(),
            y: region.y(),
            width: region.width(),
            height: region.height(),
        });
    }

    let strip_x0 = (r.x() - i64::from(strip_width)).max(0);
    let strip = Region::new(strip_x0, r.y(), r.x() - strip_x0, r.height());
    let pixels = buffer.snapshot(&strip);

    for (x, y) in r.points() {
        let (x, y) = (i64::from(x), i64::from(y));
        let sx = strip.x() + (x - r.x()) % strip.width();
        let px = pixels[strip.local_index(sx, y)];
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let (tx, ty) = (x as u32, y as u32);
        buffer.put_rgb(tx, ty, [px[0], px[1], px[2]]);
    }
    Ok(())
}
