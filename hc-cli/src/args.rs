//! Command-line argument definitions for hc-measure.

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use hc_utils::{ContourSelection, MaskActivation, OverlayStyle, ResizeQuality};

/// Measure fetal head circumference on ultrasound images.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct MeasureArgs {
    /// Path to an image file or a directory containing images.
    #[arg(short, long)]
    pub input: PathBuf,

    /// Path to the segmentation ONNX model (overrides the settings file).
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Optional settings JSON. Defaults to `config/hc_settings.json` when present, otherwise built-in parameters.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override model input width (pixels).
    #[arg(long)]
    pub width: Option<u32>,

    /// Override model input height (pixels).
    #[arg(long)]
    pub height: Option<u32>,

    /// Resize quality mode: `quality` (Triangle) or `speed` (Nearest).
    #[arg(long, value_name = "MODE")]
    pub resize_quality: Option<ResizeQuality>,

    /// Foreground threshold on the `[0, 1]` probability scale.
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Activation applied to single-channel output: `none` or `sigmoid`.
    #[arg(long, value_name = "FN")]
    pub activation: Option<MaskActivation>,

    /// Contour to measure when the mask has several: `first` or `largest-area`.
    #[arg(long, value_name = "POLICY")]
    pub selection: Option<ContourSelection>,

    /// Simplify the contour with Douglas-Peucker before measuring (pixels; 0 disables).
    #[arg(long, value_name = "PIXELS")]
    pub approximation_epsilon: Option<f64>,

    /// Overlay rendering: `contour` or `circle`.
    #[arg(long, value_name = "STYLE")]
    pub overlay_style: Option<OverlayStyle>,

    /// Overlay colour as #RRGGBB[AA], rgb(r,g,b[,a]) or r,g,b.
    #[arg(long, value_name = "COLOR")]
    pub overlay_color: Option<String>,

    /// Physical size of one mask pixel; adds `circumference_mm` to each record.
    #[arg(long, value_name = "MM")]
    pub pixel_size_mm: Option<f64>,

    /// Write overlay PNGs to this directory instead of inlining them as base64.
    #[arg(long)]
    pub overlay_dir: Option<PathBuf>,

    /// Write results to a JSON file instead of stdout.
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Enable telemetry timing logs (defaults to settings file).
    #[arg(long, action = ArgAction::SetTrue)]
    pub telemetry: bool,

    /// Override telemetry logging level (error, warn, info, debug, trace).
    #[arg(long, value_name = "LEVEL")]
    pub telemetry_level: Option<String>,
}
