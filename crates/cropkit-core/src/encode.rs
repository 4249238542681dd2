//! Encoding the final raster for persistence.
//!
//! PNG keeps the shape mask's transparency. JPEG has no alpha channel, so
//! pixels are composited onto black first.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use thiserror::Error;

use crate::decode::Raster;

/// Errors that can occur while encoding a raster.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Pixel data length doesn't match expected dimensions
    #[error("Invalid pixel data: expected {expected} bytes (width * height * 4), got {actual}")]
    InvalidPixelData { expected: usize, actual: usize },

    /// Width or height is zero
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// Encoder failed
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),
}

fn validate(raster: &Raster) -> Result<(), EncodeError> {
    let (width, height) = (raster.width, raster.height);
    if width == 0 || height == 0 {
        return Err(EncodeError::InvalidDimensions { width, height });
    }
    let expected = width as usize * height as usize * 4;
    if raster.pixels.len() != expected {
        return Err(EncodeError::InvalidPixelData {
            expected,
            actual: raster.pixels.len(),
        });
    }
    Ok(())
}

/// Encode a raster to PNG bytes, keeping alpha.
pub fn encode_png(raster: &Raster) -> Result<Vec<u8>, EncodeError> {
    validate(raster)?;
    let mut buffer = Cursor::new(Vec::new());
    PngEncoder::new(&mut buffer)
        .write_image(
            &raster.pixels,
            raster.width,
            raster.height,
            ExtendedColorType::Rgba8,
        )
        .map_err(|e| EncodeError::EncodingFailed(e.to_string()))?;
    Ok(buffer.into_inner())
}

/// Encode a raster to JPEG bytes at `quality` (clamped to 1-100).
///
/// Transparent pixels come out black.
pub fn encode_jpeg(raster: &Raster, quality: u8) -> Result<Vec<u8>, EncodeError> {
    validate(raster)?;
    let rgb: Vec<u8> = raster
        .pixels
        .chunks_exact(4)
        .flat_map(|p| {
            let a = p[3] as u32;
            [0, 1, 2].map(|c| ((p[c] as u32 * a + 127) / 255) as u8)
        })
        .collect();

    let mut buffer = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
        .write_image(&rgb, raster.width, raster.height, ExtendedColorType::Rgb8)
        .map_err(|e| EncodeError::EncodingFailed(e.to_string()))?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(width: u32, height: u32, alpha: u8) -> Raster {
        let pixels = [128, 128, 128, alpha].repeat(width as usize * height as usize);
        Raster::new(width, height, pixels)
    }

    #[test]
    fn test_encode_jpeg_basic() {
        let jpeg_bytes = encode_jpeg(&gray(100, 100, 255), 90).unwrap();

        // SOI and EOI markers
        assert_eq!(&jpeg_bytes[0..2], &[0xFF, 0xD8]);
        let len = jpeg_bytes.len();
        assert_eq!(&jpeg_bytes[len - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_encode_jpeg_quality_clamping() {
        assert!(encode_jpeg(&gray(10, 10, 255), 0).is_ok());
        assert!(encode_jpeg(&gray(10, 10, 255), 255).is_ok());
    }

    #[test]
    fn test_encode_png_round_trip_keeps_alpha() {
        let src = gray(7, 5, 90);
        let png = encode_png(&src).unwrap();
        assert_eq!(&png[1..4], b"PNG");
        let decoded = image::load_from_memory(&png).unwrap().into_rgba8();
        assert_eq!(Raster::from_rgba_image(decoded), src);
    }

    #[test]
    fn test_invalid_pixel_data() {
        let raster = Raster {
            width: 10,
            height: 10,
            pixels: vec![0; 10],
        };
        assert!(matches!(
            encode_png(&raster),
            Err(EncodeError::InvalidPixelData {
                expected: 400,
                actual: 10
            })
        ));
    }

    #[test]
    fn test_zero_dimensions() {
        let raster = Raster {
            width: 0,
            height: 100,
            pixels: vec![],
        };
        assert!(matches!(
            encode_jpeg(&raster, 90),
            Err(EncodeError::InvalidDimensions { .. })
        ));
    }
}
