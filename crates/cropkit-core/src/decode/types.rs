//! Core types for decoding: requests, results and the raster buffer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{IntRect, IntSize};

/// Error types for image decoding operations.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The file format is not recognized or supported.
    #[error("Invalid or unsupported image format")]
    InvalidFormat,

    /// The image file is corrupted or incomplete.
    #[error("Corrupted or incomplete image file: {0}")]
    CorruptedFile(String),

    /// I/O error during file reading.
    #[error("I/O error: {0}")]
    IoError(String),

    /// The requested subset does not lie within the image.
    #[error("Region {subset:?} is outside the {width}x{height} image")]
    RegionOutOfBounds {
        subset: IntRect,
        width: u32,
        height: u32,
    },

    /// The request itself is malformed (empty subset or zero sample size).
    #[error("Invalid decode request: {0}")]
    InvalidRequest(String),
}

impl From<std::io::Error> for DecodeError {
    fn from(e: std::io::Error) -> Self {
        DecodeError::IoError(e.to_string())
    }
}

/// Filter type for image resizing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterType {
    /// Nearest neighbor interpolation (fastest, lowest quality).
    Nearest,
    /// Bilinear interpolation (fast, acceptable quality).
    #[default]
    Bilinear,
    /// Lanczos3 interpolation (slower, highest quality).
    Lanczos3,
}

impl FilterType {
    /// Convert to the image crate's FilterType.
    pub fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            FilterType::Nearest => image::imageops::FilterType::Nearest,
            FilterType::Bilinear => image::imageops::FilterType::Triangle,
            FilterType::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

/// Pixel dimensions of a source image. Both sides are non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageDescriptor {
    width: u32,
    height: u32,
}

impl ImageDescriptor {
    /// Returns `None` when either side is zero.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        (width > 0 && height > 0).then_some(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> IntSize {
        IntSize::new(self.width, self.height)
    }
}

impl TryFrom<IntSize> for ImageDescriptor {
    type Error = DecodeError;

    fn try_from(size: IntSize) -> Result<Self, Self::Error> {
        ImageDescriptor::new(size.width, size.height).ok_or(DecodeError::InvalidFormat)
    }
}

/// What to ask the codec for: a subset of the raw image at a downsample
/// factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecodeRequest {
    /// Integer downsample factor, at least 1.
    pub sample_size: u32,
    /// Pixel rectangle in raw image space.
    pub subset: IntRect,
}

impl DecodeRequest {
    pub fn new(sample_size: u32, subset: IntRect) -> Self {
        Self {
            sample_size,
            subset,
        }
    }

    /// Request for the whole image at `sample_size`.
    pub fn full(image: IntSize, sample_size: u32) -> Self {
        Self::new(sample_size, image.to_int_rect())
    }

    /// `self` covers `other` when it was taken at the same sample size over
    /// an equal or larger subset. Reflexive and transitive.
    pub fn covers(&self, other: &DecodeRequest) -> bool {
        self.sample_size == other.sample_size && self.subset.contains_inclusive(&other.subset)
    }
}

/// A decoded tile together with the request it satisfies.
///
/// The request may be larger than what was asked for when the codec fell
/// back to a full decode.
#[derive(Debug, Clone)]
pub struct DecodeResult {
    pub request: DecodeRequest,
    pub raster: Raster,
}

/// An RGBA image buffer (4 bytes per pixel, row-major, straight alpha).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// RGBA pixel data in row-major order.
    /// Length should be width * height * 4.
    pub pixels: Vec<u8>,
}

impl Raster {
    /// Create a new Raster with the given dimensions and pixel data.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(
            pixels.len(),
            width as usize * height as usize * 4,
            "Pixel buffer size mismatch"
        );
        Self {
            width,
            height,
            pixels,
        }
    }

    /// A fully transparent raster.
    pub fn transparent(width: u32, height: u32) -> Self {
        Self::new(width, height, vec![0; width as usize * height as usize * 4])
    }

    /// Create a Raster from an image::RgbaImage.
    pub fn from_rgba_image(img: image::RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            pixels: img.into_raw(),
        }
    }

    /// Convert to an image::RgbaImage for further processing.
    pub fn to_rgba_image(&self) -> Option<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
    }

    pub fn size(&self) -> IntSize {
        IntSize::new(self.width, self.height)
    }

    /// RGBA value at `(x, y)`. Panics when out of bounds.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ]
    }

    /// Get the total number of pixels.
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Get the size of the pixel buffer in bytes.
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }

    /// Check if this is an empty/invalid image.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.is_empty()
    }
}


// ============================================================================
// Property-Based Tests
// ============================================================================
