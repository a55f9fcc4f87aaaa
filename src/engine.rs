//! Removal orchestration: candidate selection, the fallback ladder, and file
//! processing.

use std::fmt;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, instrument, warn};

use crate::blending;
use crate::buffer::PixelBuffer;
use crate::detection::{self, CandidateKind, DetectionResult};
use crate::error::{Error, Result};
use crate::inpaint;
use crate::region::{Region, RegionPreset};
use crate::smoothing::{self, SmoothParams};

/// One rung of the fallback ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemovalStage {
    /// Enhanced smoothing followed by edge feathering.
    Enhanced,
    /// Plain median smoothing over the smaller fallback region.
    Plain,
    /// Content-aware fill from similar surrounding neighborhoods.
    ContentAware,
    /// Flat fill with a color sampled around the region.
    FlatFill,
    /// Tiling of the column strip left of the region.
    StripFill,
}

impl fmt::Display for RemovalStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Enhanced => "enhanced",
            Self::Plain => "plain",
            Self::ContentAware => "content-aware",
            Self::FlatFill => "flat-fill",
            Self::StripFill => "strip-fill",
        })
    }
}

/// Which sequence of stages to attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Enhanced, then plain, then content-aware, then flat fill.
    #[default]
    Ladder,
    /// Strip tiling, then content-aware, then flat fill.
    StripFill,
    /// An explicit stage sequence, attempted in order.
    Custom(&'static [RemovalStage]),
}

impl Strategy {
    /// Stages in the order they are attempted.
    #[must_use]
    pub fn stages(self) -> &'static [RemovalStage] {
        match self {
            Self::Ladder => &[
                RemovalStage::Enhanced,
                RemovalStage::Plain,
                RemovalStage::ContentAware,
                RemovalStage::FlatFill,
            ],
            Self::StripFill => &[
                RemovalStage::StripFill,
                RemovalStage::ContentAware,
                RemovalStage::FlatFill,
            ],
            Self::Custom(stages) => stages,
        }
    }
}

/// Options controlling watermark processing behavior.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    /// Skip watermark detection, process unconditionally.
    pub force: bool,
    /// Detection confidence threshold (0.0-1.0).
    pub threshold: f32,
    /// How the candidate region is chosen.
    pub preset: RegionPreset,
    /// Stage sequence to attempt.
    pub strategy: Strategy,
    /// Parameters of the enhanced smoothing stage.
    pub enhanced: SmoothParams,
    /// Parameters of the plain smoothing stage.
    pub plain: SmoothParams,
    /// Seed for the feathering and flat-fill jitter; entropy when `None`.
    pub seed: Option<u64>,
    /// Fail the enhanced stage unless it halves the text-like pixel ratio.
    pub verify: bool,
    /// Enable verbose logging.
    pub verbose: bool,
    /// Suppress non-error output.
    pub quiet: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            force: false,
            threshold: 0.25,
            preset: RegionPreset::default(),
            strategy: Strategy::default(),
            enhanced: SmoothParams::ENHANCED,
            plain: SmoothParams::PLAIN,
            seed: None,
            verify: false,
            verbose: false,
            quiet: false,
        }
    }
}

/// Outcome of a removal call on a buffer.
#[derive(Debug)]
pub struct RemovalReport {
    /// The candidate region, clamped to the buffer.
    pub region: Region,
    /// The stage that succeeded; `None` when the region was degenerate.
    pub stage: Option<RemovalStage>,
    /// Failures of earlier stages, in order.
    pub failures: Vec<Error>,
    /// Watermark score before removal.
    pub score_before: f32,
    /// Watermark score after removal.
    pub score_after: f32,
}

/// Result of processing a single image file.
#[derive(Debug)]
pub struct ProcessResult {
    /// Path of the processed file.
    pub path: PathBuf,
    /// Whether processing succeeded.
    pub success: bool,
    /// Whether the file was skipped (no watermark detected or removal failed).
    pub skipped: bool,
    /// Detection confidence score.
    pub confidence: f32,
    /// The stage that removed the watermark, if any.
    pub stage: Option<RemovalStage>,
    /// Human-readable status message.
    pub message: String,
}

impl ProcessResult {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            success: false,
            skipped: false,
            confidence: 0.0,
            stage: None,
            message: String::new(),
        }
    }

    fn failed(path: &Path, message: String) -> Self {
        Self {
            message,
            ..Self::new(path)
        }
    }
}

/// The removal engine.
///
/// Holds configuration only; every call works on the buffer it is given and
/// no state survives between calls.
#[derive(Debug, Clone, Default)]
pub struct WatermarkEngine {
    options: ProcessOptions,
}

impl WatermarkEngine {
    /// Create an engine with the given options.
    #[must_use]
    pub fn new(options: ProcessOptions) -> Self {
        Self { options }
    }

    /// The engine's options.
    #[must_use]
    pub fn options(&self) -> &ProcessOptions {
        &self.options
    }

    /// Candidate region for a `width x height` image under the configured preset.
    #[must_use]
    pub fn candidate_region(&self, width: u32, height: u32) -> Region {
        self.options.preset.region_for(width, height)
    }

    /// How `region` should be scored: the default badge region gets the
    /// typical-overlay check.
    fn candidate_kind(region: &Region, buffer: &PixelBuffer) -> CandidateKind {
        if *region == Region::default_for(buffer.width(), buffer.height()) {
            CandidateKind::DefaultCorner
        } else {
            CandidateKind::Generic
        }
    }

    /// Score `region` of `buffer` in `[0, 1]`.
    #[must_use]
    #[allow(clippy::unused_self)] // method on `self` for API consistency
    pub fn score(&self, buffer: &PixelBuffer, region: &Region) -> f32 {
        detection::score_region(buffer, region, Self::candidate_kind(region, buffer))
    }

    /// Score the candidate region and run the secondary gray-text check.
    #[must_use]
    pub fn detect(&self, buffer: &PixelBuffer) -> DetectionResult {
        let region = self.candidate_region(buffer.width(), buffer.height());
        detection::detect_watermark(
            buffer,
            &region,
            Self::candidate_kind(&region, buffer),
            self.options.threshold,
        )
    }

    /// Remove the watermark from the configured candidate region, in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FallbackExhausted`] if every stage failed; the buffer
    /// is then exactly as it was before the call.
    pub fn process(&self, buffer: &mut PixelBuffer) -> Result<RemovalReport> {
        let region = self.candidate_region(buffer.width(), buffer.height());
        self.process_region(buffer, &region)
    }

    /// Remove the watermark from `region`, in place.
    ///
    /// Stages are attempted in order, each at most once; a failed stage is
    /// rolled back before the next begins. A degenerate region is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FallbackExhausted`] if every stage failed; the buffer
    /// is then exactly as it was before the call.
    #[instrument(skip(self, buffer), fields(width = buffer.width(), height = buffer.height()))]
    pub fn process_region(
        &self,
        buffer: &mut PixelBuffer,
        region: &Region,
    ) -> Result<RemovalReport> {
        let kind = Self::candidate_kind(region, buffer);
        let clamped = match region.clamped(buffer) {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "nothing to remove");
                return Ok(RemovalReport {
                    region: region.clamp_to(buffer.width(), buffer.height()),
                    stage: None,
                    failures: Vec::new(),
                    score_before: 0.0,
                    score_after: 0.0,
                });
            }
        };

        let before = detection::analyze_region(buffer, &clamped);
        let score_before = detection::score_analysis(&before, kind);
        let mut rng = match self.options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let stages = self.options.strategy.stages();
        let mut failures = Vec::new();
        for &stage in stages {
            let target = match stage {
                RemovalStage::Plain => Region::fallback(),
                _ => clamped,
            };
            let target = match target.clamped(buffer) {
                Ok(t) => t,
                Err(e) => {
                    warn!(%stage, error = %e, "stage skipped");
                    failures.push(e.in_stage(stage));
                    continue;
                }
            };

            debug!(
                %stage,
                x = target.x(),
                y = target.y(),
                w = target.width(),
                h = target.height(),
                "running stage"
            );
            let saved = buffer.snapshot(&target);
            match self.run_stage(stage, buffer, &target, &mut rng, before.text_ratio) {
                Ok(()) => {
                    let score_after = detection::score_region(buffer, &clamped, kind);
                    debug!(%stage, score_before, score_after, "stage succeeded");
                    return Ok(RemovalReport {
                        region: clamped,
                        stage: Some(stage),
                        failures,
                        score_before,
                        score_after,
                    });
                }
                Err(e) => {
                    buffer.restore(&target, &saved);
                    warn!(%stage, error = %e, "stage failed, falling back");
                    failures.push(e.in_stage(stage));
                }
            }
        }

        for failure in &failures {
            debug!(error = %failure, "exhausted");
        }
        Err(Error::FallbackExhausted {
            attempts: failures.len(),
        })
    }

    fn run_stage(
        &self,
        stage: RemovalStage,
        buffer: &mut PixelBuffer,
        region: &Region,
        rng: &mut StdRng,
        text_before: f32,
    ) -> Result<()> {
        match stage {
            RemovalStage::Enhanced => {
                smoothing::smooth(buffer, region, &self.options.enhanced)?;
                blending::feather_edges(buffer, region, rng)?;
                if self.options.verify {
                    let after = detection::analyze_region(buffer, region).text_ratio;
                    if after > text_before * 0.5 {
                        return Err(Error::InsufficientRemoval {
                            before: text_before,
                            after,
                        });
                    }
                }
                Ok(())
            }
            RemovalStage::Plain => smoothing::smooth(buffer, region, &self.options.plain),
            RemovalStage::ContentAware => inpaint::inpaint(buffer, region),
            RemovalStage::FlatFill => inpaint::simple_background_repair(buffer, region, rng),
            RemovalStage::StripFill => {
                inpaint::strip_fill(buffer, region, inpaint::DEFAULT_STRIP_WIDTH)
            }
        }
    }

    /// Process a single image file: load, detect, remove, save.
    ///
    /// When every removal stage fails, the untouched image is saved and the
    /// result is marked as skipped. Returns a [`ProcessResult`] indicating
    /// success, skip, or failure.
    #[must_use]
    pub fn process_file(&self, input: &Path, output: &Path) -> ProcessResult {
        let opts = &self.options;
        let mut result = ProcessResult::new(input);

        let dyn_img = match image::open(input) {
            Ok(img) => img,
            Err(e) => {
                result.message = format!("Failed to load: {e}");
                return result;
            }
        };
        let mut buffer = match PixelBuffer::from_dynamic(&dyn_img) {
            Ok(b) => b,
            Err(e) => {
                result.message = format!("Failed to read pixels: {e}");
                return result;
            }
        };
        drop(dyn_img);

        // Detection (unless forced)
        if !opts.force {
            let detection = self.detect(&buffer);
            result.confidence = detection.confidence;

            if !detection.detected {
                result.skipped = true;
                result.success = true;
                result.message = format!(
                    "No watermark detected ({:.0}% confidence, text={:.2}, edge={:.2}, background={:.2})",
                    detection.confidence * 100.0,
                    detection.analysis.text_ratio,
                    detection.analysis.edge_ratio,
                    detection.analysis.background_ratio,
                );
                return result;
            }
        }

        match self.process(&mut buffer) {
            Ok(report) => {
                result.stage = report.stage;
                result.message = match report.stage {
                    Some(stage) => format!(
                        "Watermark removed ({stage}, score {:.2} -> {:.2})",
                        report.score_before, report.score_after
                    ),
                    None => "Region empty, nothing removed".to_string(),
                };
            }
            Err(e) => {
                warn!(path = %input.display(), error = %e, "keeping original pixels");
                result.skipped = true;
                result.message = format!("Removal failed, original kept: {e}");
            }
        }

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    result.message = format!("Failed to create output directory: {e}");
                    return result;
                }
            }
        }

        match save_image(&buffer, output) {
            Ok(()) => {
                result.success = true;
                info!(path = %output.display(), stage = ?result.stage, "saved");
            }
            Err(e) => {
                result.message = format!("Failed to save: {e}");
            }
        }

        result
    }

    /// Process all supported images in a directory.
    ///
    /// Uses parallel iteration when the `cli` feature is enabled (via rayon).
    /// Returns a [`ProcessResult`] for each image found.
    #[must_use]
    pub fn process_directory(&self, input_dir: &Path, output_dir: &Path) -> Vec<ProcessResult> {
        let entries: Vec<PathBuf> = match std::fs::read_dir(input_dir) {
            Ok(rd) => rd
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
                .map(|e| e.path())
                .filter(|p| is_supported_image(p))
                .collect(),
            Err(e) => {
                return vec![ProcessResult::failed(
                    input_dir,
                    format!("Failed to read directory: {e}"),
                )];
            }
        };

        if !output_dir.exists() {
            if let Err(e) = std::fs::create_dir_all(output_dir) {
                return vec![ProcessResult::failed(
                    output_dir,
                    format!("Failed to create output directory: {e}"),
                )];
            }
        }

        let run = |input_path: &PathBuf| match input_path.file_name() {
            Some(name) => self.process_file(input_path, &output_dir.join(name)),
            None => ProcessResult::failed(input_path, "Missing file name".to_string()),
        };

        #[cfg(feature = "cli")]
        {
            use rayon::prelude::*;
            entries.par_iter().map(run).collect()
        }

        #[cfg(not(feature = "cli"))]
        {
            entries.iter().map(run).collect()
        }
    }
}

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "webp" | "bmp"
        ),
        None => false,
    }
}

/// Save a buffer with format-specific settings.
///
/// JPEG has no alpha channel, so it is written as RGB at quality 100; PNG,
/// WebP and BMP keep the alpha channel.
///
/// # Errors
///
/// Returns an error if the format is unsupported or writing fails.
pub fn save_image(buffer: &PixelBuffer, path: &Path) -> Result<()> {
    let format =
        ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;

    let dyn_img = DynamicImage::ImageRgba8(buffer.as_image().clone());

    match format {
        ImageFormat::Jpeg => {
            let file = std::fs::File::create(path)?;
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(file, 100);
            encoder.encode_image(&DynamicImage::ImageRgb8(dyn_img.to_rgb8()))?;
        }
        ImageFormat::Png | ImageFormat::WebP | ImageFormat::Bmp => {
            dyn_img.save(path)?;
        }
        _ => {
            return Err(Error::UnsupportedFormat(format!("{format:?}")));
        }
    }

    Ok(())
}

/// Generate a default output path from an input path.
///
/// Example: `"photo.jpg"` becomes `"photo_cleaned.jpg"`.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let ext = input.extension().unwrap_or_default().to_string_lossy();
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(format!("{stem}_cleaned.{ext}"))
}
