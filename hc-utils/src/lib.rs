//! Common helpers shared across the head-circumference crates.

/// Persistent settings shared by the pipeline and its hosts.
pub mod config;
/// Synthetic masks and scans used by tests and benchmarks.
pub mod fixtures;
/// Image I/O, PNG encoding and base64 helpers.
pub mod image_utils;
mod macros;
/// Instrumentation helpers for optional stage timing.
pub mod telemetry;

use std::path::{Path, PathBuf};

use anyhow::Result;
use log::LevelFilter;

pub use config::{
    AppSettings, ContourSelection, DEFAULT_MODEL_PATH, InputDimensions, MaskActivation,
    MaskSettings, MeasurementSettings, OverlayStyle, ResizeQuality, TelemetrySettings,
};
pub use image_utils::{decode_base64, encode_base64, encode_png, write_bytes};
pub use telemetry::{TimingGuard, configure as configure_telemetry, timing_guard};

/// Initialize logging once for every host.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` applies. Telemetry
/// records are always let through so `--telemetry` works without extra env vars.
pub fn init_logging(default_filter: LevelFilter) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter.as_str()),
    );
    builder.filter_module(telemetry::TARGET, LevelFilter::Trace);

    // A second call (tests, embedding hosts) keeps the first logger.
    let _ = builder.try_init();
    Ok(())
}

/// Validate that a path exists and resolve it to an absolute path.
pub fn normalize_path<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
    let path = path.as_ref();
    anyhow::ensure!(path.exists(), "path does not exist: {}", path.display());
    Ok(path.canonicalize()?)
}
