//! Synthetic images for tests and benchmarks.
//!
//! Real ultrasound frames cannot be shipped with the repository, so the
//! fixtures are generated: binary masks built from filled discs, and a
//! speckled scan with a bright elliptical ring standing in for the skull.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{GrayImage, Luma};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_ellipse_mut};

/// Foreground value used by binary masks.
pub const FOREGROUND: u8 = 255;

/// A `width x height` binary mask containing one filled disc.
pub fn disk_mask(width: u32, height: u32, center: (i32, i32), radius: i32) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    draw_filled_circle_mut(&mut mask, center, radius, Luma([FOREGROUND]));
    mask
}

/// A binary mask with a disc of `radius` at the centre of the canvas.
pub fn centered_disk_mask(size: u32, radius: i32) -> GrayImage {
    let c = (size / 2) as i32;
    disk_mask(size, size, (c, c), radius)
}

/// Deterministic speckled frame with an elliptical bright ring.
pub fn synthetic_scan(width: u32, height: u32) -> GrayImage {
    let mut scan = GrayImage::from_fn(width, height, |x, y| {
        // Cheap integer hash; stable across platforms.
        let h = x
            .wrapping_mul(73_856_093)
            ^ y.wrapping_mul(19_349_663)
            ^ (x.wrapping_add(y)).wrapping_mul(83_492_791);
        Luma([20 + (h % 40) as u8])
    });
    let center = ((width / 2) as i32, (height / 2) as i32);
    let rx = (width as i32 * 3 / 8).max(1);
    let ry = (height as i32 * 5 / 16).max(1);
    for inset in 0..3 {
        draw_hollow_ellipse_mut(&mut scan, center, rx - inset, ry - inset, Luma([220]));
    }
    scan
}

/// Encode a grayscale fixture as PNG bytes.
pub fn png_bytes(image: &GrayImage) -> Result<Vec<u8>> {
    let mut buffer = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, image::ImageFormat::Png)
        .context("failed to encode fixture PNG")?;
    Ok(buffer.into_inner())
}

/// Write a grayscale fixture as `<dir>/<name>`, creating `dir` if needed.
pub fn write_png(dir: &Path, name: &str, image: &GrayImage) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create fixture directory {}", dir.display()))?;
    let path = dir.join(name);
    image
        .save(&path)
        .with_context(|| format!("failed to save fixture {}", path.display()))?;
    Ok(path)
}
