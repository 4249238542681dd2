//! Producing the final cropped raster from a finished session.

use std::future::Future;

use cropkit_core::{CompositeError, CompositePlan, CropSession, DecodePlanner, IntSize, Raster};
use log::debug;

use crate::source::ImageSource;

/// Decode the tile `plan` asks for and composite it.
///
/// # Errors
///
/// `CompositeError::DecodeUnavailable` when the source returns nothing,
/// `CompositeError::Task` when the render task dies, and any error from
/// [`CompositePlan::render`].
pub async fn render_result(
    plan: CompositePlan,
    source: &dyn ImageSource,
) -> Result<Raster, CompositeError> {
    let request = plan.request();
    let tile = source
        .open(request)
        .await
        .ok_or(CompositeError::DecodeUnavailable(request))?;
    debug!(
        "compositing {}x{} result from sample size {} tile ({} px)",
        plan.target().width,
        plan.target().height,
        tile.request.sample_size,
        tile.raster.pixel_count()
    );
    tokio::task::spawn_blocking(move || plan.render(&tile))
        .await
        .map_err(|e| CompositeError::Task(e.to_string()))?
}

/// Crop the session's image to its current region, transform and shape.
///
/// The plan is taken from the session before the returned future first
/// polls, so the session may be dropped or edited afterwards.
pub fn create_result<'a>(
    session: &CropSession,
    source: &'a dyn ImageSource,
    max_size: Option<IntSize>,
    planner: &DecodePlanner,
) -> impl Future<Output = Result<Raster, CompositeError>> + Send + 'a {
    let plan = CompositePlan::from_session(session, max_size, planner);
    async move { render_result(plan?, source).await }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{DecodeFuture, RasterImageSource};
    use cropkit_core::{DecodeRequest, FilterType, Rect};

    fn pattern(width: u32, height: u32) -> Raster {
        Raster::from_rgba_image(image::RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) % 256) as u8, 255])
        }))
    }

    struct Broken(IntSize);

    impl ImageSource for Broken {
        fn size(&self) -> IntSize {
            self.0
        }

        fn open(&self, _request: DecodeRequest) -> DecodeFuture<'_> {
            Box::pin(async { None })
        }
    }

    #[tokio::test]
    async fn test_full_region_identity_is_source() {
        let raster = pattern(500, 600);
        let source = RasterImageSource::new(raster.clone(), FilterType::Bilinear);
        let session = CropSession::from_size(IntSize::new(500, 600)).unwrap();

        let result = create_result(&session, &source, None, &DecodePlanner::default())
            .await
            .unwrap();
        assert_eq!(result, raster);
    }

    #[tokio::test]
    async fn test_rotated_flipped_region() {
        let raster = pattern(500, 600);
        let source = RasterImageSource::new(raster.clone(), FilterType::Bilinear);
        let mut session = CropSession::from_size(IntSize::new(500, 600)).unwrap();
        session.rotate_left().unwrap();
        session.flip_horizontal().unwrap();
        session
            .set_region(Rect::new(294.0, 86.0, 476.0, 229.0))
            .unwrap();

        let result = create_result(&session, &source, None, &DecodePlanner::default())
            .await
            .unwrap();
        assert_eq!((result.width, result.height), (182, 143));
        for (i, j) in [(0, 0), (181, 0), (0, 142), (181, 142), (90, 70)] {
            assert_eq!(result.pixel(i, j), raster.pixel(463 - j, 255 - i));
        }
    }

    #[tokio::test]
    async fn test_session_edits_after_planning_are_ignored() {
        let raster = pattern(64, 64);
        let source = RasterImageSource::new(raster.clone(), FilterType::Bilinear);
        let mut session = CropSession::from_size(IntSize::new(64, 64)).unwrap();
        let pending = create_result(&session, &source, None, &DecodePlanner::default());
        session.set_region(Rect::new(0.0, 0.0, 8.0, 8.0)).unwrap();
        drop(session);

        let result = pending.await.unwrap();
        assert_eq!(result, raster);
    }

    #[tokio::test]
    async fn test_decode_miss_is_error() {
        let source = Broken(IntSize::new(100, 100));
        let session = CropSession::from_size(IntSize::new(100, 100)).unwrap();
        let result = create_result(&session, &source, None, &DecodePlanner::default()).await;
        assert!(matches!(result, Err(CompositeError::DecodeUnavailable(_))));
    }

    #[tokio::test]
    async fn test_max_size_limits_output() {
        let source = RasterImageSource::new(pattern(400, 200), FilterType::Bilinear);
        let session = CropSession::from_size(IntSize::new(400, 200)).unwrap();
        let result = create_result(
            &session,
            &source,
            Some(IntSize::new(100, 100)),
            &DecodePlanner::default(),
        )
        .await
        .unwrap();
        assert_eq!((result.width, result.height), (100, 50));
    }
}
