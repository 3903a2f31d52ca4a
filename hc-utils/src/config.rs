//! Shared configuration consumed by the measurement pipeline and its hosts.
//!
//! Every section is `#[serde(default)]`, so a settings file only needs to
//! mention the values it overrides. The core crate converts these sections
//! into its own stage configs.

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::macros::settings_enum;

/// Model file used when neither the settings nor the CLI name one.
pub const DEFAULT_MODEL_PATH: &str = "models/head_circumference_256.onnx";

settings_enum! {
    /// Interpolation used when resizing the scan to the model input.
    pub enum ResizeQuality {
        /// Bilinear (Triangle filter).
        #[default]
        Quality => "quality" | "bilinear",
        /// Nearest neighbour.
        Speed => "speed" | "nearest",
    }
}

settings_enum! {
    /// Activation applied to single-channel model output before thresholding.
    pub enum MaskActivation {
        /// The model already emits probabilities.
        #[default]
        Identity => "none" | "identity",
        /// The model emits logits.
        Sigmoid => "sigmoid",
    }
}

settings_enum! {
    /// Which external contour is measured when the mask has several regions.
    pub enum ContourSelection {
        /// First contour in extraction order: the last border traced, i.e. the
        /// region whose border starts lowest in raster order.
        #[default]
        First => "first",
        /// Contour enclosing the largest area.
        LargestArea => "largest-area" | "largest",
    }
}

settings_enum! {
    /// What the overlay image depicts.
    pub enum OverlayStyle {
        /// Closed polyline of the measured contour.
        #[default]
        Contour => "contour",
        /// Circle with the measured circumference, centred on the contour centroid.
        Circle => "circle",
    }
}

/// Spatial size the segmentation model expects, plus the resize policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InputDimensions {
    pub width: u32,
    pub height: u32,
    pub resize_quality: ResizeQuality,
}

impl Default for InputDimensions {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            resize_quality: ResizeQuality::Quality,
        }
    }
}

/// Thresholding of the raw model output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MaskSettings {
    /// Foreground cut-off on the `[0, 1]` probability scale.
    pub threshold: f32,
    pub activation: MaskActivation,
}

impl Default for MaskSettings {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            activation: MaskActivation::Identity,
        }
    }
}

/// Contour selection, simplification and overlay rendering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MeasurementSettings {
    pub selection: ContourSelection,
    /// Douglas-Peucker tolerance in pixels; `None` measures the raw border chain.
    pub approximation_epsilon: Option<f64>,
    pub overlay_style: OverlayStyle,
    /// RGBA colour of the drawn boundary.
    pub overlay_color: [u8; 4],
}

impl Default for MeasurementSettings {
    fn default() -> Self {
        Self {
            selection: ContourSelection::First,
            approximation_epsilon: None,
            overlay_style: OverlayStyle::Contour,
            overlay_color: [0, 255, 0, 255],
        }
    }
}

/// Settings controlling the stage timing logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    pub enabled: bool,
    /// One of off, error, warn, info, debug, trace.
    pub level: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "debug".to_string(),
        }
    }
}

impl TelemetrySettings {
    /// Resolve the level string; unknown strings mean `Debug`.
    pub fn level_filter(&self) -> LevelFilter {
        self.level
            .trim()
            .parse::<LevelFilter>()
            .or_else(|_| match self.level.trim().to_ascii_lowercase().as_str() {
                "warning" => Ok(LevelFilter::Warn),
                _ => Err(()),
            })
            .unwrap_or(LevelFilter::Debug)
    }
}

/// Everything a host needs to build a measurement pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// ONNX segmentation model; `None` falls back to [`DEFAULT_MODEL_PATH`].
    pub model_path: Option<String>,
    pub input: InputDimensions,
    pub mask: MaskSettings,
    pub measurement: MeasurementSettings,
    pub telemetry: TelemetrySettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            model_path: Some(DEFAULT_MODEL_PATH.into()),
            input: InputDimensions::default(),
            mask: MaskSettings::default(),
            measurement: MeasurementSettings::default(),
            telemetry: TelemetrySettings::default(),
        }
    }
}

impl AppSettings {
    /// Load settings from a JSON file, filling in anything the file omits.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let mut settings: AppSettings = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse settings JSON at {}", path.display()))?;

        if settings.model_path.is_none() {
            settings.model_path = Some(DEFAULT_MODEL_PATH.into());
        }
        settings.validate()?;
        Ok(settings)
    }

    /// Serialize settings to disk as pretty-printed JSON, overwriting the file.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let payload =
            serde_json::to_string_pretty(self).context("failed to serialize settings JSON")?;
        fs::write(path, payload)
            .with_context(|| format!("failed to write settings file {}", path.display()))?;
        Ok(())
    }

    /// Reject values no pipeline stage can work with.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.input.width > 0 && self.input.height > 0,
            "input dimensions must be greater than zero (got {}x{})",
            self.input.width,
            self.input.height
        );
        anyhow::ensure!(
            self.mask.threshold.is_finite() && (0.0..=1.0).contains(&self.mask.threshold),
            "mask threshold must lie in [0, 1] (got {})",
            self.mask.threshold
        );
        if let Some(epsilon) = self.measurement.approximation_epsilon {
            anyhow::ensure!(
                epsilon.is_finite() && epsilon >= 0.0,
                "approximation epsilon must be a non-negative number (got {epsilon})"
            );
        }
        Ok(())
    }

    /// Model path with the built-in default applied.
    pub fn resolved_model_path(&self) -> PathBuf {
        PathBuf::from(self.model_path.as_deref().unwrap_or(DEFAULT_MODEL_PATH))
    }
}

/// Default location of the persisted settings (`config/hc_settings.json`).
pub fn default_settings_path() -> PathBuf {
    env::current_dir()
        .map(|dir| dir.join("config/hc_settings.json"))
        .unwrap_or_else(|_| PathBuf::from("config/hc_settings.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn default_settings_round_trip() {
        let file = NamedTempFile::new().expect("tempfile");
        let mut settings = AppSettings::default();
        settings.measurement.selection = ContourSelection::LargestArea;
        settings.measurement.approximation_epsilon = Some(1.0);
        settings.save_to_path(file.path()).expect("save");

        let loaded = AppSettings::load_from_path(file.path()).expect("load");
        assert_eq!(loaded.input, settings.input);
        assert_eq!(loaded.mask, settings.mask);
        assert_eq!(loaded.measurement, settings.measurement);
        assert_eq!(loaded.model_path, settings.model_path);
        assert_eq!(loaded.telemetry.level, settings.telemetry.level);
    }

    #[test]
    fn partial_file_uses_defaults() {
        let file = NamedTempFile::new().expect("tempfile");
        let json = r#"{
            "input": { "width": 128 },
            "measurement": { "selection": "largest_area", "overlay_style": "circle" }
        }"#;
        fs::write(file.path(), json).expect("write settings");

        let loaded = AppSettings::load_from_path(file.path()).expect("load");
        assert_eq!(loaded.input.width, 128);
        assert_eq!(loaded.input.height, 256);
        assert_eq!(loaded.input.resize_quality, ResizeQuality::Quality);
        assert_eq!(loaded.measurement.selection, ContourSelection::LargestArea);
        assert_eq!(loaded.measurement.overlay_style, OverlayStyle::Circle);
        assert_eq!(loaded.mask.threshold, 0.5);
        assert_eq!(loaded.resolved_model_path(), PathBuf::from(DEFAULT_MODEL_PATH));
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let file = NamedTempFile::new().expect("tempfile");
        fs::write(file.path(), r#"{ "mask": { "threshold": 1.5 } }"#).expect("write");

        let err = AppSettings::load_from_path(file.path()).expect_err("threshold > 1");
        assert!(format!("{err}").contains("threshold"));
    }

    #[test]
    fn enums_parse_labels_and_aliases() {
        assert_eq!("largest_area".parse::<ContourSelection>(), Ok(ContourSelection::LargestArea));
        assert_eq!("Largest".parse::<ContourSelection>(), Ok(ContourSelection::LargestArea));
        assert_eq!("nearest".parse::<ResizeQuality>(), Ok(ResizeQuality::Speed));
        assert_eq!("SIGMOID".parse::<MaskActivation>(), Ok(MaskActivation::Sigmoid));
        assert!("ellipse".parse::<OverlayStyle>().is_err());
        assert_eq!(ContourSelection::LargestArea.to_string(), "largest-area");
    }

    #[test]
    fn telemetry_level_parses_variants() {
        let telemetry = TelemetrySettings {
            level: "TRACE".into(),
            ..TelemetrySettings::default()
        };
        assert_eq!(telemetry.level_filter(), LevelFilter::Trace);

        let telemetry = TelemetrySettings {
            level: "warning".into(),
            ..TelemetrySettings::default()
        };
        assert_eq!(telemetry.level_filter(), LevelFilter::Warn);

        let telemetry = TelemetrySettings {
            level: "chatty".into(),
            ..TelemetrySettings::default()
        };
        assert_eq!(telemetry.level_filter(), LevelFilter::Debug);
    }
}
