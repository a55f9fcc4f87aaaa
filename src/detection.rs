//! Overlay-text likelihood scoring for candidate regions.
//!
//! A region is scored from pixel statistics in three passes:
//! 1. **Dominant color**: a quantized RGB histogram picks the background proxy
//! 2. **Classification**: every non-background pixel is tested for edge and
//!    text-like (achromatic, extreme or high-contrast) signatures
//! 3. **Weighted sum**: text, edge, contrast and uniformity ratios combine into
//!    a score in `[0, 1]`, with early rejection of background-dominated regions
//!
//! [`looks_like_overlay_text`] is a narrower secondary check for semi-transparent
//! gray text.

use crate::buffer::PixelBuffer;
use crate::region::Region;

/// Pixels with alpha below this are ignored.
const ALPHA_CUTOFF: u8 = 50;
/// Histogram resolution per channel (32 levels).
const BUCKET_SHIFT: u32 = 3;
/// Buckets per channel.
const BUCKETS: usize = 32;
/// RGB distance under which a pixel counts as background.
const BACKGROUND_DISTANCE: f32 = 40.0;
/// Channel spread under which a pixel counts as achromatic.
const ACHROMATIC_SPREAD: i32 = 40;
/// Contrast above which a pixel counts as an edge.
const EDGE_CONTRAST: f32 = 50.0;
/// Contrast above which an achromatic pixel counts as text.
const TEXT_CONTRAST: f32 = 35.0;
/// Brightness below which a pixel is considered dark.
const DARK_BRIGHTNESS: f32 = 140.0;
/// Brightness above which a pixel is considered bright.
const BRIGHT_BRIGHTNESS: f32 = 200.0;

/// Reject when the background covers more than this share of the region.
const MAX_BACKGROUND_RATIO: f32 = 0.75;
/// Reject when fewer than this share of pixels look like text.
const MIN_TEXT_RATIO: f32 = 0.05;
/// Bonus for regions showing every text signature at once.
const SIGNATURE_BONUS: f32 = 0.2;
/// Multiplier for badge candidates that do not match the typical overlay.
const ATYPICAL_BADGE_PENALTY: f32 = 0.5;

/// Gray-text detector: brightness band of semi-transparent gray glyphs.
const GRAY_BRIGHTNESS: std::ops::RangeInclusive<f32> = 100.0..=200.0;
/// Gray-text detector: contrast above which a pixel counts as an edge.
const GRAY_EDGE_CONTRAST: f32 = 30.0;
/// Gray-text detector: minimum number of sampled pixels.
const GRAY_MIN_SAMPLES: usize = 100;

/// Quantized RGB histogram with 32 levels per channel.
///
/// Stored as a flat `32^3` array so the key space is bounded.
pub struct ColorHistogram {
    counts: Vec<u32>,
}

impl Default for ColorHistogram {
    fn default() -> Self {
        Self {
            counts: vec![0; BUCKETS * BUCKETS * BUCKETS],
        }
    }
}

impl ColorHistogram {
    fn bucket(rgb: [u8; 3]) -> usize {
        let q = |c: u8| usize::from(c >> BUCKET_SHIFT);
        (q(rgb[0]) * BUCKETS + q(rgb[1])) * BUCKETS + q(rgb[2])
    }

    /// Count one pixel.
    pub fn add(&mut self, rgb: [u8; 3]) {
        self.counts[Self::bucket(rgb)] += 1;
    }

    /// Number of pixels counted in the bucket holding `rgb`.
    #[must_use]
    pub fn count(&self, rgb: [u8; 3]) -> u32 {
        self.counts[Self::bucket(rgb)]
    }

    /// Center color of the most populated bucket, `None` if empty.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn dominant(&self) -> Option<[u8; 3]> {
        let (index, &count) = self
            .counts
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))?;
        if count == 0 {
            return None;
        }
        // Bucket centers are at most 31 * 8 + 4 = 252.
        let center = |q: usize| (q * (1 << BUCKET_SHIFT) + (1 << (BUCKET_SHIFT - 1))) as u8;
        Some([
            center(index / (BUCKETS * BUCKETS)),
            center((index / BUCKETS) % BUCKETS),
            center(index % BUCKETS),
        ])
    }
}

/// How a candidate region was chosen, which affects scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CandidateKind {
    /// Any caller-supplied region.
    #[default]
    Generic,
    /// The default top-left badge region; scored with the typical-overlay check.
    DefaultCorner,
}

/// Pixel statistics gathered over one region.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RegionAnalysis {
    /// Number of non-border, non-transparent pixels examined.
    pub sampled: usize,
    /// Share of sampled pixels classified as text-like.
    pub text_ratio: f32,
    /// Share of sampled pixels classified as edges.
    pub edge_ratio: f32,
    /// Mean 4-neighbor contrast over non-background pixels.
    pub avg_contrast: f32,
    /// Share of sampled pixels that are achromatic and non-background.
    pub uniform_ratio: f32,
    /// Share of sampled pixels close to the dominant color.
    pub background_ratio: f32,
    /// Dominant quantized color, if any pixel was counted.
    pub dominant: Option<[u8; 3]>,
}

/// Result of scoring a candidate region.
#[derive(Debug, Clone, Default)]
pub struct DetectionResult {
    /// Whether the region should be treated as watermarked.
    pub detected: bool,
    /// Watermark score in `[0, 1]`.
    pub confidence: f32,
    /// Secondary gray-text signature check.
    pub overlay_text: bool,
    /// Underlying statistics.
    pub analysis: RegionAnalysis,
}

fn brightness(px: [u8; 4]) -> f32 {
    (f32::from(px[0]) + f32::from(px[1]) + f32::from(px[2])) / 3.0
}

fn channel_spread(px: [u8; 4]) -> i32 {
    let (r, g, b) = (i32::from(px[0]), i32::from(px[1]), i32::from(px[2]));
    (r - g).abs() + (g - b).abs() + (b - r).abs()
}

fn color_distance(px: [u8; 4], c: [u8; 3]) -> f32 {
    let d = |a: u8, b: u8| f32::from(a) - f32::from(b);
    let (dr, dg, db) = (d(px[0], c[0]), d(px[1], c[1]), d(px[2], c[2]));
    (dr * dr + dg * dg + db * db).sqrt()
}

/// Per-pixel brightness of a clamped region, plus neighbor contrast lookup.
struct BrightnessMap {
    region: Region,
    values: Vec<f32>,
}

impl BrightnessMap {
    fn new(buffer: &PixelBuffer, region: Region) -> Self {
        let values = region
            .points()
            .map(|(x, y)| brightness(buffer.at(x, y)))
            .collect();
        Self { region, values }
    }

    fn get(&self, x: i64, y: i64) -> f32 {
        self.values[self.region.local_index(x, y)]
    }

    /// `|b - mean(4-neighbors)|` for a pixel not on the region border.
    fn contrast(&self, x: i64, y: i64) -> f32 {
        let around =
            (self.get(x - 1, y) + self.get(x + 1, y) + self.get(x, y - 1) + self.get(x, y + 1))
                / 4.0;
        (self.get(x, y) - around).abs()
    }

    /// Coordinates of every pixel not on the outermost ring.
    fn interior(&self) -> impl Iterator<Item = (i64, i64)> {
        let r = self.region;
        (r.y() + 1..r.bottom() - 1)
            .flat_map(move |y| (r.x() + 1..r.right() - 1).map(move |x| (x, y)))
    }
}

#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn at(buffer: &PixelBuffer, x: i64, y: i64) -> [u8; 4] {
    buffer.at(x as u32, y as u32)
}

#[allow(clippy::cast_precision_loss)]
fn ratio(count: usize, total: usize) -> f32 {
    if total == 0 {
        0.0
    } else {
        count as f32 / total as f32
    }
}

/// Gather the text, edge and background statistics of a region.
///
/// Degenerate or out-of-bounds regions yield an all-zero analysis.
#[must_use]
pub fn analyze_region(buffer: &PixelBuffer, region: &Region) -> RegionAnalysis {
    let region = region.clamp_to(buffer.width(), buffer.height());
    if region.is_empty() {
        return RegionAnalysis::default();
    }

    let mut histogram = ColorHistogram::default();
    for (x, y) in region.points() {
        let px = buffer.at(x, y);
        if px[3] >= ALPHA_CUTOFF {
            histogram.add([px[0], px[1], px[2]]);
        }
    }
    let Some(dominant) = histogram.dominant() else {
        return RegionAnalysis::default();
    };

    let map = BrightnessMap::new(buffer, region);
    let mut sampled = 0usize;
    let mut background = 0usize;
    let mut text = 0usize;
    let mut edges = 0usize;
    let mut uniform = 0usize;
    let mut classified = 0usize;
    let mut contrast_sum = 0.0_f32;

    for (x, y) in map.interior() {
        let px = at(buffer, x, y);
        if px[3] < ALPHA_CUTOFF {
            continue;
        }
        sampled += 1;
        if color_distance(px, dominant) < BACKGROUND_DISTANCE {
            background += 1;
            continue;
        }

        let b = map.get(x, y);
        let contrast = map.contrast(x, y);
        let achromatic = channel_spread(px) < ACHROMATIC_SPREAD;
        let extreme = !(DARK_BRIGHTNESS..=BRIGHT_BRIGHTNESS).contains(&b);

        classified += 1;
        contrast_sum += contrast;
        if contrast > EDGE_CONTRAST {
            edges += 1;
        }
        if achromatic {
            uniform += 1;
            if extreme || contrast > TEXT_CONTRAST {
                text += 1;
            }
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let avg_contrast = if classified == 0 {
        0.0
    } else {
        contrast_sum / classified as f32
    };

    RegionAnalysis {
        sampled,
        text_ratio: ratio(text, sampled),
        edge_ratio: ratio(edges, sampled),
        avg_contrast,
        uniform_ratio: ratio(uniform, sampled),
        background_ratio: ratio(background, sampled),
        dominant: Some(dominant),
    }
}

/// Combine an analysis into a watermark score in `[0, 1]`.
#[must_use]
pub fn score_analysis(a: &RegionAnalysis, kind: CandidateKind) -> f32 {
    if a.sampled == 0 || a.background_ratio > MAX_BACKGROUND_RATIO || a.text_ratio < MIN_TEXT_RATIO
    {
        return 0.0;
    }

    let mut score = 0.5 * a.text_ratio
        + (2.5 * a.edge_ratio).min(0.35)
        + (a.avg_contrast / 80.0).min(0.25)
        + (0.4 * a.uniform_ratio).min(0.15);

    if a.text_ratio > 0.1 && a.edge_ratio > 0.05 && a.avg_contrast > 15.0 && a.uniform_ratio > 0.2
    {
        score += SIGNATURE_BONUS;
    }

    if kind == CandidateKind::DefaultCorner {
        let typical = a.text_ratio > 0.1
            && a.text_ratio < 0.4
            && a.edge_ratio > 0.05
            && a.avg_contrast > 15.0
            && a.background_ratio < 0.7;
        if !typical {
            score *= ATYPICAL_BADGE_PENALTY;
        }
    }

    score.clamp(0.0, 1.0)
}

/// Score how likely `region` is to hold overlay text.
///
/// Never fails: degenerate and out-of-bounds regions score 0.
#[must_use]
pub fn score_region(buffer: &PixelBuffer, region: &Region, kind: CandidateKind) -> f32 {
    score_analysis(&analyze_region(buffer, region), kind)
}

/// Secondary check for semi-transparent gray overlay text.
///
/// True when gray mid-brightness pixels and moderate edges are both present in
/// text-like proportions and the gray pixels sit mostly in the central
/// 80% x 60% of the region.
#[must_use]
pub fn looks_like_overlay_text(buffer: &PixelBuffer, region: &Region) -> bool {
    let region = region.clamp_to(buffer.width(), buffer.height());
    if region.is_empty() {
        return false;
    }

    let map = BrightnessMap::new(buffer, region);
    let cx0 = region.x() + region.width() / 10;
    let cx1 = region.right() - region.width() / 10;
    let cy0 = region.y() + region.height() / 5;
    let cy1 = region.bottom() - region.height() / 5;

    let mut sampled = 0usize;
    let mut gray = 0usize;
    let mut edges = 0usize;
    let mut central = 0usize;

    for (x, y) in map.interior() {
        let px = at(buffer, x, y);
        if px[3] < ALPHA_CUTOFF {
            continue;
        }
        sampled += 1;
        if map.contrast(x, y) > GRAY_EDGE_CONTRAST {
            edges += 1;
        }
        if channel_spread(px) < ACHROMATIC_SPREAD && GRAY_BRIGHTNESS.contains(&map.get(x, y)) {
            gray += 1;
            if (cx0..cx1).contains(&x) && (cy0..cy1).contains(&y) {
                central += 1;
            }
        }
    }

    let gray_ratio = ratio(gray, sampled);
    let edge_ratio = ratio(edges, sampled);
    let central_ratio = ratio(central, gray);

    sampled > GRAY_MIN_SAMPLES
        && gray_ratio > 0.08
        && gray_ratio < 0.4
        && edge_ratio > 0.03
        && edge_ratio < 0.25
        && central_ratio > 0.25
}

/// Score a region and run the secondary check.
///
/// `detected` is set when the score reaches `threshold` or the gray-text
/// signature matches.
#[must_use]
pub fn detect_watermark(
    buffer: &PixelBuffer,
    region: &Region,
    kind: CandidateKind,
    threshold: f32,
) -> DetectionResult {
    let analysis = analyze_region(buffer, region);
    let confidence = score_analysis(&analysis, kind);
    let overlay_text = looks_like_overlay_text(buffer, region);
    DetectionResult {
        detected: confidence >= threshold || overlay_text,
        confidence,
        overlay_text,
        analysis,
    }
}
