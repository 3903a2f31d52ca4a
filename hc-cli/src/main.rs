//! hc-measure: batch head-circumference measurement.

mod args;
mod color;
mod config;
mod input;
mod types;

use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::Parser;
use hc_core::{MeasurementPipeline, MeasurementResult};
use hc_utils::{configure_telemetry, init_logging, normalize_path, write_bytes};
use log::{LevelFilter, debug, info, warn};
use rayon::prelude::*;

use crate::{
    args::MeasureArgs,
    config::{apply_cli_overrides, load_settings},
    input::{collect_images, overlay_path_for},
    types::MeasurementRecord,
};

/// Per-run output options shared by every worker.
struct OutputOptions {
    pixel_size_mm: Option<f64>,
    overlay_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_logging(LevelFilter::Info)?;
    let args = MeasureArgs::parse();
    debug!("hc-measure {}", hc_core::version());

    let mut settings = load_settings(args.config.as_ref())?;
    apply_cli_overrides(&mut settings, &args)?;
    configure_telemetry(&settings.telemetry);

    if let Some(mm) = args.pixel_size_mm {
        anyhow::ensure!(
            mm.is_finite() && mm > 0.0,
            "--pixel-size-mm must be a positive number (got {mm})"
        );
    }
    let input_path = normalize_path(&args.input)?;
    let overlay_dir = if let Some(dir) = args.overlay_dir.as_ref() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create overlay directory {}", dir.display()))?;
        Some(normalize_path(dir)?)
    } else {
        None
    };

    let pipeline = MeasurementPipeline::from_settings(&settings)
        .context("failed to initialise the measurement pipeline")?;

    let images = collect_images(&input_path)?;
    if images.is_empty() {
        anyhow::bail!("no images found at {}", input_path.display());
    }

    let options = OutputOptions {
        pixel_size_mm: args.pixel_size_mm,
        overlay_dir,
    };
    info!(
        "Processing {} image(s) at {} model input...",
        images.len(),
        pipeline.config().preprocess.input_size
    );
    let records: Vec<MeasurementRecord> = images
        .par_iter()
        .map(|path| measure_one(&pipeline, path, &options))
        .collect();

    let succeeded = records.iter().filter(|r| r.is_success()).count();
    info!("{succeeded}/{} image(s) measured", records.len());
    write_records(&records, args.json.as_deref())?;

    if succeeded == 0 {
        anyhow::bail!("all {} image(s) failed; no measurement produced", records.len());
    }
    Ok(())
}

fn measure_one(
    pipeline: &MeasurementPipeline,
    path: &Path,
    options: &OutputOptions,
) -> MeasurementRecord {
    let image = path.display().to_string();
    let result = match pipeline.run_path(path) {
        Ok(result) => result,
        Err(err) => {
            warn!("Failed to measure {image}: {err}");
            return MeasurementRecord::failed(image, &err);
        }
    };
    info!("{image} -> {:.2}px", result.circumference());

    let mut record = MeasurementRecord::measured(image, &result, options.pixel_size_mm);
    if let Some(dir) = options.overlay_dir.as_ref() {
        let target = overlay_path_for(path, dir);
        match save_overlay(&result, &target) {
            Ok(()) => {
                record.overlay = None;
                record.overlay_path = Some(target.display().to_string());
            }
            Err(err) => warn!("Failed to write overlay {}: {err:#}", target.display()),
        }
    }
    record
}

fn save_overlay(result: &MeasurementResult, target: &Path) -> Result<()> {
    let png = result.overlay_png()?;
    write_bytes(target, &png)
}

fn write_records(records: &[MeasurementRecord], json_path: Option<&Path>) -> Result<()> {
    if let Some(json_path) = json_path {
        if let Some(dir) = json_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory {}", dir.display()))?;
        }
        let file = File::create(json_path)
            .with_context(|| format!("failed to create {}", json_path.display()))?;
        serde_json::to_writer_pretty(file, records).with_context(|| {
            format!("failed to write measurement JSON to {}", json_path.display())
        })?;
        info!("Wrote measurements to {}", json_path.display());
    } else {
        let json =
            serde_json::to_string_pretty(records).context("failed to serialize measurements")?;
        println!("{json}");
    }
    Ok(())
}
