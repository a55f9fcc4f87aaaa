//! Score and remove corner overlay-text watermarks from raster images.
//!
//! Image generators often stamp a small text badge into a corner of their
//! output. This crate estimates how text-like a candidate region is, then
//! reconstructs plausible background there: multi-pass median/mean smoothing
//! erases the glyph strokes and a noise-perturbed feather hides the seam. If a
//! stage fails the engine falls back to content-aware fill and finally to a
//! flat fill, so the buffer always stays a complete image.
//!
//! # Quick Start
//!
//! ```no_run
//! use overlay_watermark_removal::{PixelBuffer, ProcessOptions, WatermarkEngine};
//!
//! let engine = WatermarkEngine::new(ProcessOptions::default());
//! let img = image::open("photo.png").unwrap();
//! let mut buffer = PixelBuffer::from_dynamic(&img).unwrap();
//! let report = engine.process(&mut buffer).unwrap();
//! println!("removed by {:?}", report.stage);
//! image::DynamicImage::from(buffer).save("cleaned.png").unwrap();
//! ```
//!
//! # Detection
//!
//! Scoring combines a dominant-color histogram with edge and achromatic-text
//! statistics. A narrower gray-text signature serves as a second opinion.
//!
//! ```no_run
//! use overlay_watermark_removal::{PixelBuffer, ProcessOptions, WatermarkEngine};
//!
//! let engine = WatermarkEngine::new(ProcessOptions::default());
//! let img = image::open("photo.png").unwrap();
//! let buffer = PixelBuffer::from_dynamic(&img).unwrap();
//! let result = engine.detect(&buffer);
//! println!("Detected: {}, confidence: {:.0}%", result.detected, result.confidence * 100.0);
//! ```

#![deny(missing_docs)]

pub mod blending;
pub mod buffer;
pub mod detection;
mod engine;
pub mod error;
pub mod inpaint;
pub mod region;
pub mod smoothing;

pub use buffer::PixelBuffer;
pub use engine::{
    default_output_path, is_supported_image, save_image, ProcessOptions, ProcessResult,
    RemovalReport, RemovalStage, Strategy, WatermarkEngine,
};
pub use error::{Error, Result};
pub use region::{Region, RegionPreset};
