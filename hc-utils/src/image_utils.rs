use std::{fs, path::Path};

use anyhow::{Context, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use image::{
    ExtendedColorType, ImageEncoder, ImageResult, RgbaImage,
    codecs::png::{CompressionType, FilterType, PngEncoder},
};

/// Encode an RGBA canvas as a lossless PNG.
pub fn encode_png(image: &RgbaImage) -> ImageResult<Vec<u8>> {
    let mut buffer = Vec::new();
    PngEncoder::new_with_quality(&mut buffer, CompressionType::Default, FilterType::Adaptive)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgba8,
        )?;
    Ok(buffer)
}

/// Standard (padded) base64, the form browsers accept in `data:image/png;base64,` URLs.
pub fn encode_base64(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

pub fn decode_base64(encoded: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(encoded.trim())
        .context("payload is not valid base64")
}

/// Write bytes to `destination`, creating parent directories as needed.
pub fn write_bytes(destination: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(destination, bytes)
        .with_context(|| format!("failed to write {}", destination.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::tempdir;

    #[test]
    fn png_encoding_is_lossless() {
        let mut canvas = RgbaImage::from_pixel(8, 4, Rgba([0, 0, 0, 255]));
        canvas.put_pixel(3, 2, Rgba([0, 255, 0, 255]));

        let png = encode_png(&canvas).expect("encode");
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = image::load_from_memory(&png).expect("decode").to_rgba8();
        assert_eq!(decoded.dimensions(), (8, 4));
        assert_eq!(decoded.as_raw(), canvas.as_raw());
    }

    #[test]
    fn base64_helpers_invert_each_other() {
        let encoded = encode_base64(b"overlay");
        assert_eq!(encoded, "b3ZlcmxheQ==");
        assert_eq!(decode_base64(&encoded).expect("decode"), b"overlay");
        assert!(decode_base64("not base64!").is_err());
    }

    #[test]
    fn write_bytes_creates_parent_directories() {
        let dir = tempdir().expect("tempdir");
        let target = dir.path().join("nested/out/overlay.png");
        write_bytes(&target, b"abc").expect("write");
        assert_eq!(fs::read(&target).expect("read"), b"abc");
    }
}
