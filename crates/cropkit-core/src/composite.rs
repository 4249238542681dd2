//! Result compositing: rasterize the cropped, masked output.
//!
//! # Pipeline
//!
//! 1. Target size: the region size shrunk uniformly to fit the optional
//!    maximum, rounded up to whole pixels
//! 2. Fit matrix: maps the region onto the target rectangle at the origin
//! 3. Total matrix: image transform, then fit (raw pixels to output pixels)
//! 4. Decode plan for a target-sized view through the total matrix
//! 5. Render: every output pixel is mapped back through the inverse total
//!    matrix into the decoded tile, filtered, and masked by the crop shape
//!
//! Planning ([`CompositePlan::new`]) and rendering
//! ([`CompositePlan::render`]) are split so that the decode in between can
//! run wherever the caller's image source lives.

use thiserror::Error;

use crate::decode::{DecodePlanner, DecodeRequest, DecodeResult, Raster};
use crate::geometry::{Affine, IntSize, Point, Rect, EPSILON};
use crate::session::CropSession;
use crate::shape::CropShape;
use crate::transform::Transform;
use crate::view::ViewMatrix;

/// Upper bound on supersamples per axis when the output is much smaller
/// than the tile.
const MAX_SUPERSAMPLE: u32 = 8;

/// Errors that can occur while producing the final raster.
#[derive(Debug, Error)]
pub enum CompositeError {
    /// Region (or the target size derived from it) has no area.
    #[error("Crop region is empty")]
    EmptyRegion,

    /// The output does not overlap the image, or the matrix is singular.
    #[error("No decode plan for the crop region")]
    NoDecodePlan,

    /// The image source could not provide the planned tile.
    #[error("Image source could not decode {0:?}")]
    DecodeUnavailable(DecodeRequest),

    /// The tile handed to `render` does not cover the planned request.
    #[error("Decoded tile {actual:?} does not cover planned {expected:?}")]
    TileMismatch {
        expected: DecodeRequest,
        actual: DecodeRequest,
    },

    /// Rendering task failed to complete.
    #[error("Compositing task failed: {0}")]
    Task(String),
}

/// Output size for `region`, bounded by `max_size` without upscaling.
pub fn target_size(region: &Rect, max_size: Option<IntSize>) -> IntSize {
    region
        .size()
        .coerce_at_most(max_size.map(IntSize::to_size))
        .round_up()
}

/// Everything needed to turn one decoded tile into the final raster.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositePlan {
    target: IntSize,
    total: Affine,
    inverse: Affine,
    mask_rect: Rect,
    shape: CropShape,
    request: DecodeRequest,
}

impl CompositePlan {
    /// Plan the output for `region` (transformed-image space) of an
    /// `image`-sized raw image shown through `transform`.
    ///
    /// # Errors
    ///
    /// Returns `CompositeError::EmptyRegion` when the target has no pixels
    /// and `CompositeError::NoDecodePlan` when the planner finds nothing to
    /// decode.
    pub fn new(
        transform: &Transform,
        region: &Rect,
        shape: CropShape,
        image: IntSize,
        max_size: Option<IntSize>,
        planner: &DecodePlanner,
    ) -> Result<Self, CompositeError> {
        if region.is_empty() {
            return Err(CompositeError::EmptyRegion);
        }
        let target = target_size(region, max_size);
        if target.is_empty() {
            return Err(CompositeError::EmptyRegion);
        }

        let mut fit = ViewMatrix::new();
        fit.snap_fit(region, &target.to_rect());
        let mask_rect = fit.matrix().map_rect(region);
        let total = transform.as_matrix(image).then(&fit.matrix());
        let inverse = total.invert().ok_or(CompositeError::NoDecodePlan)?;
        let request = planner
            .plan(target, image, &total)
            .ok_or(CompositeError::NoDecodePlan)?;

        Ok(Self {
            target,
            total,
            inverse,
            mask_rect,
            shape,
            request,
        })
    }

    /// Plan the output for the session's current state.
    pub fn from_session(
        session: &CropSession,
        max_size: Option<IntSize>,
        planner: &DecodePlanner,
    ) -> Result<Self, CompositeError> {
        Self::new(
            &session.transform(),
            &session.region(),
            session.shape(),
            session.src().size(),
            max_size,
            planner,
        )
    }

    pub fn target(&self) -> IntSize {
        self.target
    }

    /// The decode to request from the image source.
    pub fn request(&self) -> DecodeRequest {
        self.request
    }

    /// Raw image pixels to output pixels.
    pub fn total_matrix(&self) -> Affine {
        self.total
    }

    /// Region footprint in output pixels; the shape mask is evaluated here.
    pub fn mask_rect(&self) -> Rect {
        self.mask_rect
    }

    /// Draw `tile` through the total matrix into a fresh target-sized
    /// raster, masked by the crop shape.
    ///
    /// # Errors
    ///
    /// Returns `CompositeError::TileMismatch` when `tile` was decoded for a
    /// request that does not cover the planned one.
    pub fn render(&self, tile: &DecodeResult) -> Result<Raster, CompositeError> {
        if !tile.request.covers(&self.request) || tile.raster.is_empty() {
            return Err(CompositeError::TileMismatch {
                expected: self.request,
                actual: tile.request,
            });
        }
        let subset = tile.request.subset;
        let kx = tile.raster.width as f32 / subset.width() as f32;
        let ky = tile.raster.height as f32 / subset.height() as f32;

        // Tile pixels under one output pixel, per axis
        let (sx, sy) = self.inverse.axis_scales();
        let footprint = (sx * kx).max(sy * ky);
        let n = ((footprint - EPSILON).ceil() as u32).clamp(1, MAX_SUPERSAMPLE);

        let (width, height) = (self.target.width, self.target.height);
        let mut out = Raster::transparent(width, height);
        for y in 0..height {
            for x in 0..width {
                let coverage = self.shape.coverage(&self.mask_rect, x, y);
                if coverage <= 0.0 {
                    continue;
                }
                let mut acc = [0.0f64; 4];
                for j in 0..n {
                    for i in 0..n {
                        let p = Point::new(
                            x as f32 + (i as f32 + 0.5) / n as f32,
                            y as f32 + (j as f32 + 0.5) / n as f32,
                        );
                        let raw = self.inverse.map_point(p);
                        let tx = (raw.x - subset.left as f32) * kx - 0.5;
                        let ty = (raw.y - subset.top as f32) * ky - 0.5;
                        let px = sample_bilinear(&tile.raster, tx, ty);
                        for (a, v) in acc.iter_mut().zip(px) {
                            *a += v;
                        }
                    }
                }
                let count = (n * n) as f64;
                let idx = (y as usize * width as usize + x as usize) * 4;
                for (c, v) in acc.iter().take(3).enumerate() {
                    out.pixels[idx + c] = (v / count).clamp(0.0, 255.0).round() as u8;
                }
                let alpha = acc[3] / count * coverage as f64;
                out.pixels[idx + 3] = alpha.clamp(0.0, 255.0).round() as u8;
            }
        }
        Ok(out)
    }
}

#[inline]
fn pixel_f64(image: &Raster, px: u32, py: u32) -> [f64; 4] {
    let p = image.pixel(px, py);
    [p[0] as f64, p[1] as f64, p[2] as f64, p[3] as f64]
}

/// Sample a pixel using bilinear interpolation, clamping to the edges.
///
/// `(x, y)` are in pixel-centre coordinates: `(0, 0)` is the centre of the
/// top-left pixel.
fn sample_bilinear(image: &Raster, x: f32, y: f32) -> [f64; 4] {
    let max_x = (image.width - 1) as f64;
    let max_y = (image.height - 1) as f64;
    let x = (x as f64).clamp(0.0, max_x);
    let y = (y as f64).clamp(0.0, max_y);

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(image.width - 1);
    let y1 = (y0 + 1).min(image.height - 1);

    // Fractional distances
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let p00 = pixel_f64(image, x0, y0);
    let p10 = pixel_f64(image, x1, y0);
    let p01 = pixel_f64(image, x0, y1);
    let p11 = pixel_f64(image, x1, y1);

    let mut result = [0.0f64; 4];
    for i in 0..4 {
        result[i] = p00[i] * (1.0 - fx) * (1.0 - fy)
            + p10[i] * fx * (1.0 - fy)
            + p01[i] * (1.0 - fx) * fy
            + p11[i] * fx * fy;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{sample_raster, FilterType};
    use crate::geometry::IntRect;

    /// 500x600 image where every pixel is distinguishable.
    fn source(width: u32, height: u32) -> Raster {
        let img = image::RgbaImage::from_fn(width, height, |x, y| {
            let block = ((x >> 8) | ((y >> 8) << 1)) as u8;
            image::Rgba([x as u8, y as u8, block * 50, 255])
        });
        Raster::from_rgba_image(img)
    }

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Raster {
        Raster::from_rgba_image(image::RgbaImage::from_pixel(
            width,
            height,
            image::Rgba(rgba),
        ))
    }

    fn decode(src: &Raster, plan: &CompositePlan) -> DecodeResult {
        let request = plan.request();
        let raster = sample_raster(src, &request, FilterType::Bilinear).unwrap();
        DecodeResult { request, raster }
    }

    #[test]
    fn test_source_blocks_are_distinct() {
        let src = source(500, 600);
        let blue: Vec<u8> = [(0, 0), (256, 0), (0, 256), (256, 256), (0, 512), (256, 512)]
            .iter()
            .map(|&(x, y)| src.pixel(x, y)[2])
            .collect();
        assert_eq!(blue, vec![0, 50, 100, 150, 200, 250]);
        assert_eq!(src.pixel(499, 599), [243, 87, 250, 255]);
    }

    #[test]
    fn test_target_size() {
        let region = Rect::new(0.0, 0.0, 4000.0, 2000.0);
        assert_eq!(target_size(&region, None), IntSize::new(4000, 2000));
        assert_eq!(
            target_size(&region, Some(IntSize::new(3000, 3000))),
            IntSize::new(3000, 1500)
        );
        let region = Rect::new(0.5, 0.0, 182.2, 143.0);
        assert_eq!(target_size(&region, None), IntSize::new(182, 143));
    }

    #[test]
    fn test_identity_output_matches_source() {
        let src = source(500, 600);
        let session = CropSession::from_size(src.size()).unwrap();
        let plan = CompositePlan::from_session(&session, None, &DecodePlanner::default()).unwrap();
        assert_eq!(plan.target(), IntSize::new(500, 600));
        assert!(plan.total_matrix().is_identity());
        assert_eq!(plan.request(), DecodeRequest::new(1, IntRect::new(0, 0, 500, 600)));

        let out = plan.render(&decode(&src, &plan)).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn test_rotate_left_flip_horizontal_crop() {
        let src = source(500, 600);
        let mut session = CropSession::from_size(src.size()).unwrap();
        session.rotate_left().unwrap();
        session.flip_horizontal().unwrap();
        session
            .set_region(Rect::new(294.0, 86.0, 476.0, 229.0))
            .unwrap();

        let plan = CompositePlan::from_session(&session, None, &DecodePlanner::default()).unwrap();
        assert_eq!(plan.target(), IntSize::new(182, 143));
        assert_eq!(
            plan.request(),
            DecodeRequest::new(1, IntRect::new(256, 0, 500, 256))
        );

        let out = plan.render(&decode(&src, &plan)).unwrap();
        assert_eq!((out.width, out.height), (182, 143));
        for j in 0..143 {
            for i in 0..182 {
                assert_eq!(
                    out.pixel(i, j),
                    src.pixel(463 - j, 255 - i),
                    "pixel ({i}, {j})"
                );
            }
        }
    }

    #[test]
    fn test_max_size_scales_down() {
        let src = solid(500, 600, [10, 20, 30, 255]);
        let session = CropSession::from_size(src.size()).unwrap();
        let plan = CompositePlan::from_session(
            &session,
            Some(IntSize::new(250, 300)),
            &DecodePlanner::default(),
        )
        .unwrap();
        assert_eq!(plan.target(), IntSize::new(250, 300));
        let out = plan.render(&decode(&src, &plan)).unwrap();
        assert_eq!((out.width, out.height), (250, 300));
        assert_eq!(out.pixel(0, 0), [10, 20, 30, 255]);
        assert_eq!(out.pixel(249, 299), [10, 20, 30, 255]);
    }

    #[test]
    fn test_circle_mask_clears_corners() {
        let src = solid(100, 100, [200, 100, 50, 255]);
        let mut session = CropSession::from_size(src.size()).unwrap();
        session.set_shape(CropShape::Circle).unwrap();
        let plan = CompositePlan::from_session(&session, None, &DecodePlanner::default()).unwrap();
        let out = plan.render(&decode(&src, &plan)).unwrap();
        assert_eq!(out.pixel(0, 0)[3], 0);
        assert_eq!(out.pixel(99, 99)[3], 0);
        assert_eq!(out.pixel(50, 50), [200, 100, 50, 255]);
    }

    #[test]
    fn test_render_rejects_uncovering_tile() {
        let src = source(500, 600);
        let session = CropSession::from_size(src.size()).unwrap();
        let plan = CompositePlan::from_session(&session, None, &DecodePlanner::default()).unwrap();
        let request = DecodeRequest::new(2, IntRect::new(0, 0, 500, 600));
        let raster = sample_raster(&src, &request, FilterType::Bilinear).unwrap();
        let err = plan.render(&DecodeResult { request, raster }).unwrap_err();
        assert!(matches!(err, CompositeError::TileMismatch { .. }));
    }

    #[test]
    fn test_empty_region_has_no_plan() {
        let err = CompositePlan::new(
            &Transform::IDENTITY,
            &Rect::new(10.0, 10.0, 10.0, 20.0),
            CropShape::Rect,
            IntSize::new(100, 100),
            None,
            &DecodePlanner::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CompositeError::EmptyRegion));
    }

    #[test]
    fn test_sample_bilinear_clamps_edges() {
        let img = solid(2, 2, [50, 60, 70, 255]);
        assert_eq!(sample_bilinear(&img, -3.0, -3.0), [50.0, 60.0, 70.0, 255.0]);
        assert_eq!(sample_bilinear(&img, 5.0, 0.5), [50.0, 60.0, 70.0, 255.0]);
    }
}
