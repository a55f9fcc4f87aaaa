//! Error types for the overlay-watermark-removal crate.

use crate::engine::RemovalStage;

/// Errors that can occur during watermark scoring and removal.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The region is empty after clamping to the buffer bounds.
    #[error("degenerate region ({x},{y} {width}x{height})")]
    InvalidRegion {
        /// Requested left edge.
        x: i64,
        /// Requested top edge.
        y: i64,
        /// Requested width.
        width: i64,
        /// Requested height.
        height: i64,
    },

    /// The pixel data cannot be read as a `width x height` RGBA surface.
    #[error("pixel data inaccessible: expected {expected} bytes for {width}x{height}, got {actual}")]
    PixelAccessDenied {
        /// Buffer width in pixels.
        width: u32,
        /// Buffer height in pixels.
        height: u32,
        /// Expected byte length (`width * height * 4`).
        expected: usize,
        /// Byte length actually supplied.
        actual: usize,
    },

    /// A filter parameter is outside its supported range.
    #[error("invalid {name}: {value}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Rejected value.
        value: u32,
    },

    /// The enhanced pass ran but left too much text-like structure behind.
    #[error("text-like ratio only dropped from {before:.3} to {after:.3}")]
    InsufficientRemoval {
        /// Text-like pixel ratio before the pass.
        before: f32,
        /// Text-like pixel ratio after the pass.
        after: f32,
    },

    /// A stage of the fallback ladder failed.
    #[error("{stage} stage failed: {source}")]
    StageFailure {
        /// The stage that failed.
        stage: RemovalStage,
        /// Underlying cause.
        #[source]
        source: Box<Error>,
    },

    /// Every stage of the fallback ladder failed; the buffer is untouched.
    #[error("all {attempts} removal stages failed")]
    FallbackExhausted {
        /// Number of stages attempted.
        attempts: usize,
    },

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An error occurred during image processing (load, save, encode).
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    /// Wrap this error as the failure of a ladder stage.
    #[must_use]
    pub fn in_stage(self, stage: RemovalStage) -> Self {
        Error::StageFailure {
            stage,
            source: Box::new(self),
        }
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
