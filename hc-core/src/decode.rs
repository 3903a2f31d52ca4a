//! Raw bytes to a single-channel pixel grid.

use image::{DynamicImage, GenericImageView, GrayImage};
use log::{Level, trace};

use hc_utils::timing_guard;

use crate::error::{MeasureError, Result};

/// Decoded 8-bit intensity grid at the source resolution.
pub type PixelGrid = GrayImage;

/// Decode encoded image bytes into a luma grid.
///
/// The format is sniffed from the leading magic bytes. Colour input is reduced
/// to luma. Either a complete non-empty grid is produced or the call fails with
/// [`MeasureError::Decode`].
pub fn decode(bytes: &[u8]) -> Result<PixelGrid> {
    let _guard = timing_guard("hc_core::decode", Level::Debug);
    if bytes.is_empty() {
        return Err(MeasureError::Decode("input is empty".into()));
    }

    let format = image::guess_format(bytes).map_err(|_| {
        MeasureError::Decode(format!(
            "unrecognized image format ({} bytes)",
            bytes.len()
        ))
    })?;
    let image = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| MeasureError::Decode(format!("{format:?} payload is corrupt: {e}")))?;
    trace!(
        "decoded {:?} image {}x{} ({:?})",
        format,
        image.width(),
        image.height(),
        image.color()
    );
    grid_from_image(&image)
}

/// Reduce an already decoded image to a luma grid, rejecting empty images.
pub fn grid_from_image(image: &DynamicImage) -> Result<PixelGrid> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(MeasureError::Decode(format!(
            "image has degenerate dimensions {width}x{height}"
        )));
    }
    Ok(image.to_luma8())
}
