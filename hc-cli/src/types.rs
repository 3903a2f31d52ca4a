//! Serializable per-image records for hc-measure output.

use hc_core::{ErrorKind, MeasureError, MeasurementResult};
use serde::Serialize;

/// Outcome for one input image; exactly one of the measurement fields or
/// `error` is populated.
#[derive(Debug, Serialize)]
pub struct MeasurementRecord {
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circumference: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circumference_mm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contour_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlay: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlay_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,
}

#[derive(Debug, Serialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
}

impl MeasurementRecord {
    /// Record a successful measurement, scaling to millimetres when a pixel
    /// size is known.
    pub fn measured(image: String, result: &MeasurementResult, pixel_size_mm: Option<f64>) -> Self {
        Self {
            image,
            circumference: Some(result.circumference()),
            circumference_mm: pixel_size_mm.map(|mm| result.circumference() * mm),
            contour_count: Some(result.contour_count()),
            overlay: Some(result.overlay().to_string()),
            overlay_path: None,
            error: None,
        }
    }

    pub fn failed(image: String, error: &MeasureError) -> Self {
        Self {
            image,
            circumference: None,
            circumference_mm: None,
            contour_count: None,
            overlay: None,
            overlay_path: None,
            error: Some(ErrorRecord {
                kind: error.kind(),
                message: error.to_string(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
