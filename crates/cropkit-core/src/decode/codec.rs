//! Codec adapter over the `image` crate.
//!
//! The `image` crate has no native region decoder, so a region decode reads
//! the whole stream and crops before downsampling. The request semantics are
//! the same either way: the returned raster covers `subset` at
//! `1 / sample_size` scale, i.e. `ceil(w / s) × ceil(h / s)` pixels.

use std::io::{BufRead, Seek};

use image::{DynamicImage, GenericImageView, ImageReader};

use super::{DecodeError, DecodeRequest, FilterType, Raster};
use crate::geometry::IntSize;

fn open_reader<R: BufRead + Seek>(reader: R) -> Result<ImageReader<R>, DecodeError> {
    ImageReader::new(reader)
        .with_guessed_format()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))
}

fn decode_image<R: BufRead + Seek>(reader: R) -> Result<DynamicImage, DecodeError> {
    let reader = open_reader(reader)?;
    if reader.format().is_none() {
        return Err(DecodeError::InvalidFormat);
    }
    reader
        .decode()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))
}

/// Read the pixel dimensions from the image header without decoding pixels.
///
/// # Errors
///
/// Returns `DecodeError::InvalidFormat` if the format is unknown or either
/// dimension is zero.
pub fn probe_size<R: BufRead + Seek>(reader: R) -> Result<IntSize, DecodeError> {
    let reader = open_reader(reader)?;
    if reader.format().is_none() {
        return Err(DecodeError::InvalidFormat);
    }
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;
    if width == 0 || height == 0 {
        return Err(DecodeError::InvalidFormat);
    }
    Ok(IntSize::new(width, height))
}

/// Decode `request.subset` of the image at `request.sample_size`.
///
/// # Errors
///
/// Returns `DecodeError::RegionOutOfBounds` if the subset is not inside the
/// image, `DecodeError::InvalidRequest` for an empty subset or zero sample
/// size, and a decode error if the stream cannot be read.
pub fn decode_region<R: BufRead + Seek>(
    reader: R,
    request: &DecodeRequest,
    filter: FilterType,
) -> Result<Raster, DecodeError> {
    validate(request)?;
    let img = decode_image(reader)?;
    sample_dynamic(&img, request, filter)
}

/// Decode the whole image at `sample_size`.
///
/// # Returns
///
/// The raster together with the request it actually satisfies (the full
/// image subset).
pub fn decode_full<R: BufRead + Seek>(
    reader: R,
    sample_size: u32,
    filter: FilterType,
) -> Result<(DecodeRequest, Raster), DecodeError> {
    let img = decode_image(reader)?;
    let (width, height) = img.dimensions();
    let request = DecodeRequest::full(IntSize::new(width, height), sample_size);
    validate(&request)?;
    let raster = sample_dynamic(&img, &request, filter)?;
    Ok((request, raster))
}

/// Crop and downsample an already decoded raster to satisfy `request`.
pub fn sample_raster(
    raster: &Raster,
    request: &DecodeRequest,
    filter: FilterType,
) -> Result<Raster, DecodeError> {
    validate(request)?;
    let rgba = raster
        .to_rgba_image()
        .ok_or_else(|| DecodeError::CorruptedFile("Pixel buffer size mismatch".to_string()))?;
    sample_dynamic(&DynamicImage::ImageRgba8(rgba), request, filter)
}

fn sample_dynamic(
    img: &DynamicImage,
    request: &DecodeRequest,
    filter: FilterType,
) -> Result<Raster, DecodeError> {
    let (width, height) = img.dimensions();
    check_bounds(request, IntSize::new(width, height))?;
    let s = request.subset;
    let cropped = img.crop_imm(
        s.left as u32,
        s.top as u32,
        s.width() as u32,
        s.height() as u32,
    );
    let (out_w, out_h) = sampled_dimensions(request);
    let cropped = if request.sample_size == 1 {
        cropped
    } else {
        cropped.resize_exact(out_w, out_h, filter.to_image_filter())
    };
    Ok(Raster::from_rgba_image(cropped.into_rgba8()))
}

/// Output dimensions of a request: `ceil(subset / sample_size)`.
fn sampled_dimensions(request: &DecodeRequest) -> (u32, u32) {
    let size = request.subset.size();
    let s = request.sample_size.max(1);
    (size.width.div_ceil(s), size.height.div_ceil(s))
}

fn validate(request: &DecodeRequest) -> Result<(), DecodeError> {
    if request.sample_size == 0 {
        return Err(DecodeError::InvalidRequest(
            "sample size must be at least 1".to_string(),
        ));
    }
    if request.subset.is_empty() {
        return Err(DecodeError::InvalidRequest("empty subset".to_string()));
    }
    Ok(())
}

fn check_bounds(request: &DecodeRequest, image: IntSize) -> Result<(), DecodeError> {
    if !image.to_int_rect().contains_inclusive(&request.subset) {
        return Err(DecodeError::RegionOutOfBounds {
            subset: request.subset,
            width: image.width,
            height: image.height,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::IntRect;
    use std::io::Cursor;

    /// Gradient test image: R = x, G = y, B = 0, A = 255.
    fn gradient(width: u32, height: u32) -> Raster {
        let img = image::RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([x as u8, y as u8, 0, 255])
        });
        Raster::from_rgba_image(img)
    }

    fn png_bytes(raster: &Raster) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        raster
            .to_rgba_image()
            .unwrap()
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_probe_size() {
        let bytes = png_bytes(&gradient(40, 30));
        assert_eq!(
            probe_size(Cursor::new(bytes)).unwrap(),
            IntSize::new(40, 30)
        );
    }

    #[test]
    fn test_probe_garbage_is_invalid() {
        let result = probe_size(Cursor::new(vec![0u8, 1, 2, 3, 4, 5]));
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_region_exact_pixels() {
        let bytes = png_bytes(&gradient(40, 30));
        let req = DecodeRequest::new(1, IntRect::new(10, 5, 20, 25));
        let out = decode_region(Cursor::new(bytes), &req, FilterType::Bilinear).unwrap();
        assert_eq!((out.width, out.height), (10, 20));
        assert_eq!(out.pixel(0, 0), [10, 5, 0, 255]);
        assert_eq!(out.pixel(9, 19), [19, 24, 0, 255]);
    }

    #[test]
    fn test_decode_region_out_of_bounds() {
        let bytes = png_bytes(&gradient(40, 30));
        let req = DecodeRequest::new(1, IntRect::new(30, 0, 50, 10));
        let err = decode_region(Cursor::new(bytes), &req, FilterType::Bilinear).unwrap_err();
        assert!(matches!(err, DecodeError::RegionOutOfBounds { .. }));
    }

    #[test]
    fn test_decode_full_downsamples_with_ceil() {
        let bytes = png_bytes(&gradient(41, 30));
        let (req, out) = decode_full(Cursor::new(bytes), 2, FilterType::Nearest).unwrap();
        assert_eq!(req.subset, IntRect::new(0, 0, 41, 30));
        assert_eq!(req.sample_size, 2);
        assert_eq!((out.width, out.height), (21, 15));
    }

    #[test]
    fn test_sample_raster_identity() {
        let src = gradient(16, 16);
        let req = DecodeRequest::full(src.size(), 1);
        let out = sample_raster(&src, &req, FilterType::Bilinear).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn test_sample_raster_rejects_zero_sample() {
        let src = gradient(16, 16);
        let req = DecodeRequest::new(0, IntRect::new(0, 0, 4, 4));
        assert!(matches!(
            sample_raster(&src, &req, FilterType::Bilinear),
            Err(DecodeError::InvalidRequest(_))
        ));
    }
}
