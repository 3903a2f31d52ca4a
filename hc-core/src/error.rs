//! Failure taxonomy of the measurement pipeline.
//!
//! Every stage returns [`MeasureError`]; the pipeline never converts one into a
//! placeholder measurement. Callers branch on [`MeasureError::kind`].

use serde::Serialize;
use thiserror::Error;

pub type Result<T, E = MeasureError> = std::result::Result<T, E>;

/// One classified pipeline failure.
#[derive(Debug, Error)]
pub enum MeasureError {
    /// The bytes are not a recognizable image or decode to an empty grid.
    #[error("failed to decode image: {0}")]
    Decode(String),
    /// The preprocessed tensor does not have the configured shape.
    #[error("tensor shape contract violated: {0}")]
    Shape(String),
    /// The segmentation model could not be loaded or does not fit the pipeline.
    #[error("segmentation model unavailable: {0}")]
    CapabilityUnavailable(String),
    /// The segmentation model failed while running a request.
    #[error("segmentation inference failed: {0}")]
    Inference(String),
    /// The model output could not be turned into a binary mask.
    #[error("mask post-processing failed: {0}")]
    Postprocess(String),
    /// The binary mask contains no foreground region to measure.
    #[error("no contour found in segmentation mask ({width}x{height})")]
    NoContour { width: u32, height: u32 },
    /// The overlay image could not be encoded.
    #[error("failed to encode overlay: {0}")]
    Overlay(#[from] image::ImageError),
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

/// Copyable discriminant of [`MeasureError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Decode,
    Shape,
    CapabilityUnavailable,
    Inference,
    Postprocess,
    NoContour,
    Overlay,
    Io,
}

impl MeasureError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MeasureError::Decode(_) => ErrorKind::Decode,
            MeasureError::Shape(_) => ErrorKind::Shape,
            MeasureError::CapabilityUnavailable(_) => ErrorKind::CapabilityUnavailable,
            MeasureError::Inference(_) => ErrorKind::Inference,
            MeasureError::Postprocess(_) => ErrorKind::Postprocess,
            MeasureError::NoContour { .. } => ErrorKind::NoContour,
            MeasureError::Overlay(_) => ErrorKind::Overlay,
            MeasureError::Io(_) => ErrorKind::Io,
        }
    }

    /// Startup failures mean the pipeline must not be used at all.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MeasureError::CapabilityUnavailable(_) | MeasureError::Shape(_)
        )
    }
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Decode => "decode",
            ErrorKind::Shape => "shape",
            ErrorKind::CapabilityUnavailable => "capability_unavailable",
            ErrorKind::Inference => "inference",
            ErrorKind::Postprocess => "postprocess",
            ErrorKind::NoContour => "no_contour",
            ErrorKind::Overlay => "overlay",
            ErrorKind::Io => "io",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
