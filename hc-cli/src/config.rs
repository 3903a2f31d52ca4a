//! Settings loading and CLI override logic.

use std::path::PathBuf;

use anyhow::{Context, Result};
use hc_utils::{AppSettings, config::default_settings_path, normalize_path};
use log::info;

use crate::{args::MeasureArgs, color::parse_overlay_color};

/// Load application settings from a file or use defaults.
pub fn load_settings(config_path: Option<&PathBuf>) -> Result<AppSettings> {
    if let Some(path) = config_path {
        let resolved = normalize_path(path)?;
        let settings = AppSettings::load_from_path(&resolved)?;
        info!("Loaded settings from {}", resolved.display());
        Ok(settings)
    } else {
        let default_path = default_settings_path();
        if default_path.exists() {
            let settings = AppSettings::load_from_path(&default_path).with_context(|| {
                format!(
                    "failed to load default settings from {}",
                    default_path.display()
                )
            })?;
            info!("Loaded settings from {}", default_path.display());
            Ok(settings)
        } else {
            Ok(AppSettings::default())
        }
    }
}

/// Apply command-line arguments on top of loaded or default settings, then
/// re-validate the result.
pub fn apply_cli_overrides(settings: &mut AppSettings, args: &MeasureArgs) -> Result<()> {
    if let Some(model) = args.model.as_ref() {
        settings.model_path = Some(model.display().to_string());
    }

    if args.telemetry {
        settings.telemetry.enabled = true;
    }
    if let Some(level) = args.telemetry_level.as_ref() {
        let normalized = level.trim();
        if !normalized.is_empty() {
            let lower = normalized.to_ascii_lowercase();
            if lower == "off" {
                settings.telemetry.enabled = false;
            }
            settings.telemetry.level = lower;
        }
    }

    if let Some(width) = args.width {
        settings.input.width = width;
    }
    if let Some(height) = args.height {
        settings.input.height = height;
    }
    if let Some(mode) = args.resize_quality {
        settings.input.resize_quality = mode;
    }

    if let Some(threshold) = args.threshold {
        settings.mask.threshold = threshold;
    }
    if let Some(activation) = args.activation {
        settings.mask.activation = activation;
    }

    if let Some(selection) = args.selection {
        settings.measurement.selection = selection;
    }
    if let Some(epsilon) = args.approximation_epsilon {
        settings.measurement.approximation_epsilon = (epsilon > 0.0).then_some(epsilon);
    }
    if let Some(style) = args.overlay_style {
        settings.measurement.overlay_style = style;
    }
    if let Some(raw) = args.overlay_color.as_deref() {
        settings.measurement.overlay_color =
            parse_overlay_color(raw).map_err(|err| anyhow::anyhow!("--overlay-color: {err}"))?;
    }

    settings.validate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use hc_utils::{ContourSelection, OverlayStyle};

    fn parse(extra: &[&str]) -> MeasureArgs {
        let mut argv = vec!["hc-measure", "--input", "scan.png"];
        argv.extend_from_slice(extra);
        MeasureArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn overrides_replace_settings_values() {
        let mut settings = AppSettings::default();
        let args = parse(&[
            "--model",
            "custom.onnx",
            "--width",
            "128",
            "--threshold",
            "0.3",
            "--selection",
            "largest-area",
            "--approximation-epsilon",
            "1.0",
            "--overlay-style",
            "circle",
            "--overlay-color",
            "#ff0000",
            "--telemetry",
        ]);
        apply_cli_overrides(&mut settings, &args).unwrap();

        assert_eq!(settings.model_path.as_deref(), Some("custom.onnx"));
        assert_eq!(settings.input.width, 128);
        assert_eq!(settings.input.height, 256);
        assert_eq!(settings.mask.threshold, 0.3);
        assert_eq!(settings.measurement.selection, ContourSelection::LargestArea);
        assert_eq!(settings.measurement.approximation_epsilon, Some(1.0));
        assert_eq!(settings.measurement.overlay_style, OverlayStyle::Circle);
        assert_eq!(settings.measurement.overlay_color, [255, 0, 0, 255]);
        assert!(settings.telemetry.enabled);
    }

    #[test]
    fn zero_epsilon_disables_approximation() {
        let mut settings = AppSettings::default();
        settings.measurement.approximation_epsilon = Some(2.0);
        apply_cli_overrides(&mut settings, &parse(&["--approximation-epsilon", "0"])).unwrap();
        assert_eq!(settings.measurement.approximation_epsilon, None);
    }

    #[test]
    fn invalid_overrides_are_rejected() {
        let mut settings = AppSettings::default();
        assert!(apply_cli_overrides(&mut settings, &parse(&["--threshold", "1.5"])).is_err());

        let mut settings = AppSettings::default();
        assert!(
            apply_cli_overrides(&mut settings, &parse(&["--overlay-color", "nope"])).is_err()
        );
    }

    #[test]
    fn telemetry_level_off_disables_telemetry() {
        let mut settings = AppSettings::default();
        settings.telemetry.enabled = true;
        apply_cli_overrides(&mut settings, &parse(&["--telemetry-level", "OFF"])).unwrap();
        assert!(!settings.telemetry.enabled);
        assert_eq!(settings.telemetry.level, "off");
    }
}
