//! Crop flow orchestration.
//!
//! [`ImageCropper::crop`] runs one crop from start to finish: it builds the
//! image source, publishes a [`CropSession`] for the UI to edit, waits for
//! the user's decision and renders the result. Only one session is current
//! at a time; starting a new crop cancels the one in progress.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use cropkit_core::touch::{self, DragHandle};
use cropkit_core::{
    CropSession, CropperConfig, Decision, DecodePlanner, IntSize, Point, Raster, Rect,
    SessionError, ViewMatrix,
};
use log::{info, warn};
use tokio::sync::{oneshot, watch};

use crate::animation::ViewAnimator;
use crate::result::create_result;
use crate::source::{ImageSource, ImageStream, RasterImageSource, StreamImageSource};

/// How a crop flow ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CropOutcome {
    Success(Raster),
    /// Rejected by the user or superseded by a newer crop.
    Cancelled,
    /// The image source could not be created.
    LoadingError,
    /// The result could not be rendered.
    SavingError,
}

/// Background work the UI may want to show a spinner for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadingStatus {
    PreparingImage,
    SavingResult,
}

/// Shared handle to the current session and its image source.
#[derive(Clone)]
pub struct SessionHandle {
    id: u64,
    session: Arc<Mutex<CropSession>>,
    source: Arc<dyn ImageSource>,
}

impl SessionHandle {
    /// Unique per crop call; a new session never reuses an id.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn lock(&self) -> MutexGuard<'_, CropSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn source(&self) -> &Arc<dyn ImageSource> {
        &self.source
    }

    /// Accept or reject the session.
    pub fn done(&self, accept: bool) -> Result<(), SessionError> {
        self.lock().done(accept)
    }

    /// Move `drag`'s handle to `screen_pos` and write the resulting region.
    pub fn drag_to(
        &self,
        drag: &DragHandle,
        screen_pos: Point,
        view: &ViewMatrix,
    ) -> Result<(), SessionError> {
        self.lock().set_region(drag.drag_to(screen_pos, view))
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("size", &self.source.size())
            .finish_non_exhaustive()
    }
}

struct Inner {
    config: CropperConfig,
    planner: DecodePlanner,
    current: watch::Sender<Option<SessionHandle>>,
    status: watch::Sender<Option<LoadingStatus>>,
    generation: AtomicU64,
}

#[derive(Clone)]
pub struct ImageCropper {
    inner: Arc<Inner>,
}

impl Default for ImageCropper {
    fn default() -> Self {
        Self::new(CropperConfig::default())
    }
}

impl ImageCropper {
    pub fn new(config: CropperConfig) -> Self {
        let (current, _) = watch::channel(None);
        let (status, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                planner: DecodePlanner::new(config.planner),
                config,
                current,
                status,
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &CropperConfig {
        &self.inner.config
    }

    /// The session the user is editing, if any.
    pub fn session(&self) -> Option<SessionHandle> {
        self.inner.current.borrow().clone()
    }

    pub fn subscribe_session(&self) -> watch::Receiver<Option<SessionHandle>> {
        self.inner.current.subscribe()
    }

    pub fn loading_status(&self) -> Option<LoadingStatus> {
        *self.inner.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<Option<LoadingStatus>> {
        self.inner.status.subscribe()
    }

    /// Drop the current session; its `crop` call returns `Cancelled`.
    pub fn cancel(&self) {
        if self.inner.current.send_replace(None).is_some() {
            info!("crop session dismissed");
        }
    }

    fn is_latest(&self, id: u64) -> bool {
        self.inner.generation.load(Ordering::SeqCst) == id
    }

    fn set_status(&self, id: u64, status: Option<LoadingStatus>) {
        if self.is_latest(id) {
            self.inner.status.send_replace(status);
        }
    }

    fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.inner.config.settle_delay_ms)
    }

    /// Handle positions offered for dragging, on the region's unit square.
    pub fn handles(&self) -> Vec<Point> {
        touch::handles(self.inner.config.secondary_handles)
    }

    /// Start a drag on `session`'s region, if `screen_pos` is within the
    /// configured touch radius of a handle or inside the region.
    pub fn begin_drag(
        &self,
        session: &SessionHandle,
        screen_pos: Point,
        view: &ViewMatrix,
    ) -> Option<DragHandle> {
        let region = session.lock().region();
        DragHandle::begin(
            &self.handles(),
            &region,
            screen_pos,
            view,
            self.inner.config.touch_radius,
        )
    }

    /// Once a drag ends, wait out the settle delay and fit the region into
    /// `outer`.
    ///
    /// Returns false right away when auto-zoom is off, or later if the fit
    /// is preempted by another gesture.
    pub async fn end_drag(
        &self,
        session: &SessionHandle,
        animator: &ViewAnimator,
        outer: Rect,
    ) -> bool {
        if !self.inner.config.auto_zoom {
            return false;
        }
        let region = session.lock().region();
        animator.bring_to_view(region, outer, self.settle_delay()).await
    }

    /// Apply the configured aspect preset at `index`, which also locks the
    /// aspect. Returns false for an unknown preset.
    pub fn apply_aspect_preset(
        &self,
        session: &SessionHandle,
        index: usize,
    ) -> Result<bool, SessionError> {
        let Some(aspect) = self.inner.config.aspects.get(index).copied() else {
            return Ok(false);
        };
        session.lock().apply_aspect(aspect)?;
        Ok(true)
    }

    /// Switch to the configured shape preset at `index`. Returns false for
    /// an unknown preset.
    pub fn set_shape_preset(
        &self,
        session: &SessionHandle,
        index: usize,
    ) -> Result<bool, SessionError> {
        let Some(shape) = self.inner.config.shapes.get(index).copied() else {
            return Ok(false);
        };
        session.lock().set_shape(shape)?;
        Ok(true)
    }

    /// Run a full crop flow over the source built by `create_source`.
    ///
    /// The result is at most `max_size`, keeping the region's aspect. With
    /// no `max_size` the configured `max_result_size` applies.
    pub async fn crop<F, Fut>(&self, max_size: Option<IntSize>, create_source: F) -> CropOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<Arc<dyn ImageSource>>>,
    {
        let inner = &self.inner;
        let id = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if inner.current.send_replace(None).is_some() {
            info!("crop session superseded by crop {}", id);
        }
        inner.status.send_replace(Some(LoadingStatus::PreparingImage));

        let source = create_source().await;
        if !self.is_latest(id) {
            return CropOutcome::Cancelled;
        }
        let Some(source) = source else {
            warn!("could not open image for crop {}", id);
            self.set_status(id, None);
            return CropOutcome::LoadingError;
        };
        let session = match CropSession::from_size(source.size()) {
            Ok(session) => session,
            Err(e) => {
                warn!("could not start crop {}: {}", id, e);
                self.set_status(id, None);
                return CropOutcome::LoadingError;
            }
        };

        let (done_tx, done_rx) = oneshot::channel();
        let session = session.with_completion(move |decision| {
            let _ = done_tx.send(decision);
        });
        let handle = SessionHandle {
            id,
            session: Arc::new(Mutex::new(session)),
            source,
        };
        let mut current = inner.current.subscribe();
        inner.current.send_replace(Some(handle.clone()));
        let published = Published {
            current: &inner.current,
            id,
        };
        inner.status.send_replace(None);
        info!("crop session {} started", id);

        let decision = tokio::select! {
            decision = done_rx => decision.ok(),
            _ = superseded(&mut current, id) => None,
        };
        drop(published);
        if decision != Some(Decision::Accepted) {
            info!("crop session {} cancelled", id);
            return CropOutcome::Cancelled;
        }

        self.set_status(id, Some(LoadingStatus::SavingResult));
        let pending = create_result(
            &handle.lock(),
            handle.source.as_ref(),
            max_size.or(inner.config.max_result_size),
            &inner.planner,
        );
        let result = pending.await;
        self.set_status(id, None);
        match result {
            Ok(raster) => CropOutcome::Success(raster),
            Err(e) => {
                warn!("could not create crop result: {}", e);
                CropOutcome::SavingError
            }
        }
    }

    /// Crop an image that is already decoded.
    pub async fn crop_raster(&self, max_size: Option<IntSize>, raster: Raster) -> CropOutcome {
        let filter = self.inner.config.downsample_filter;
        self.crop(max_size, move || async move {
            Some(Arc::new(RasterImageSource::new(raster, filter)) as Arc<dyn ImageSource>)
        })
        .await
    }

    /// Crop an encoded image, decoding only what each view needs.
    pub async fn crop_stream<S: ImageStream>(
        &self,
        max_size: Option<IntSize>,
        stream: S,
    ) -> CropOutcome {
        let filter = self.inner.config.downsample_filter;
        self.crop(max_size, move || async move {
            StreamImageSource::new(stream, filter)
                .await
                .map(|source| Arc::new(source) as Arc<dyn ImageSource>)
        })
        .await
    }
}

/// Keeps a session published for the life of its crop call.
///
/// Clears the slot on drop unless a newer session already replaced it, so
/// a crop future dropped mid-session does not leave a dead session behind.
struct Published<'a> {
    current: &'a watch::Sender<Option<SessionHandle>>,
    id: u64,
}

impl Drop for Published<'_> {
    fn drop(&mut self) {
        let id = self.id;
        self.current.send_if_modified(|current| {
            if current.as_ref().map(SessionHandle::id) == Some(id) {
                *current = None;
                true
            } else {
                false
            }
        });
    }
}

/// Resolves once session `id` is no longer the current one.
async fn superseded(current: &mut watch::Receiver<Option<SessionHandle>>, id: u64) {
    while current.changed().await.is_ok() {
        if current.borrow_and_update().as_ref().map(SessionHandle::id) != Some(id) {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::animation::AnimationTiming;
    use crate::source::{BytesStream, DecodeFuture};
    use cropkit_core::touch::MOVE_HANDLE;
    use cropkit_core::{encode_png, DecodeRequest};

    fn pattern(width: u32, height: u32) -> Raster {
        Raster::from_rgba_image(image::RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([x as u8, y as u8, 99, 255])
        }))
    }

    struct Broken;

    impl ImageSource for Broken {
        fn size(&self) -> IntSize {
            IntSize::new(50, 50)
        }

        fn open(&self, _request: DecodeRequest) -> DecodeFuture<'_> {
            Box::pin(async { None })
        }
    }

    async fn next_session(cropper: &ImageCropper) -> SessionHandle {
        let mut rx = cropper.subscribe_session();
        let handle = rx.wait_for(Option::is_some).await.unwrap().clone();
        handle.unwrap()
    }

    /// Start a crop of a 64×48 pattern and wait for its session.
    async fn start(
        cropper: &ImageCropper,
    ) -> (tokio::task::JoinHandle<CropOutcome>, SessionHandle) {
        let task = {
            let cropper = cropper.clone();
            tokio::spawn(async move { cropper.crop_raster(None, pattern(64, 48)).await })
        };
        (task, next_session(cropper).await)
    }

    #[tokio::test(start_paused = true)]
    async fn test_accept_returns_region() {
        let cropper = ImageCropper::default();
        let task = {
            let cropper = cropper.clone();
            tokio::spawn(async move { cropper.crop_raster(None, pattern(64, 48)).await })
        };
        let handle = next_session(&cropper).await;
        assert_eq!(handle.source().size(), IntSize::new(64, 48));
        handle
            .lock()
            .set_region(Rect::new(10.0, 5.0, 30.0, 25.0))
            .unwrap();
        handle.done(true).unwrap();

        let CropOutcome::Success(raster) = task.await.unwrap() else {
            panic!("expected a result");
        };
        assert_eq!((raster.width, raster.height), (20, 20));
        assert_eq!(raster.pixel(0, 0), [10, 5, 99, 255]);
        assert!(cropper.session().is_none());
        assert_eq!(cropper.loading_status(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reject_is_cancelled() {
        let cropper = ImageCropper::default();
        let task = {
            let cropper = cropper.clone();
            tokio::spawn(async move { cropper.crop_raster(None, pattern(8, 8)).await })
        };
        let handle = next_session(&cropper).await;
        handle.done(false).unwrap();
        assert_eq!(task.await.unwrap(), CropOutcome::Cancelled);
        assert!(cropper.session().is_none());
        assert!(handle.done(true).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_crop_supersedes_session() {
        let cropper = ImageCropper::default();
        let first = {
            let cropper = cropper.clone();
            tokio::spawn(async move { cropper.crop_raster(None, pattern(8, 8)).await })
        };
        let old = next_session(&cropper).await;

        let second = {
            let cropper = cropper.clone();
            tokio::spawn(async move { cropper.crop_raster(None, pattern(16, 16)).await })
        };
        assert_eq!(first.await.unwrap(), CropOutcome::Cancelled);

        let new = next_session(&cropper).await;
        assert_ne!(new.id(), old.id());
        assert_eq!(new.source().size(), IntSize::new(16, 16));
        new.done(true).unwrap();
        assert!(matches!(second.await.unwrap(), CropOutcome::Success(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_supersede_while_preparing() {
        let cropper = ImageCropper::default();
        let slow = {
            let cropper = cropper.clone();
            tokio::spawn(async move {
                cropper
                    .crop(None, || async {
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        Some(Arc::new(RasterImageSource::new(
                            pattern(8, 8),
                            Default::default(),
                        )) as Arc<dyn ImageSource>)
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let fast = {
            let cropper = cropper.clone();
            tokio::spawn(async move { cropper.crop_raster(None, pattern(4, 4)).await })
        };

        let handle = next_session(&cropper).await;
        assert_eq!(handle.source().size(), IntSize::new(4, 4));
        assert_eq!(slow.await.unwrap(), CropOutcome::Cancelled);
        // The stale crop never replaced the newer session
        assert_eq!(cropper.session().map(|s| s.id()), Some(handle.id()));

        cropper.cancel();
        assert_eq!(fast.await.unwrap(), CropOutcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_error() {
        let cropper = ImageCropper::default();
        let outcome = cropper.crop(None, || async { None }).await;
        assert_eq!(outcome, CropOutcome::LoadingError);
        assert!(cropper.session().is_none());
        assert_eq!(cropper.loading_status(), None);
    }

    #[tokio::test]
    async fn test_unreadable_stream_is_loading_error() {
        let cropper = ImageCropper::default();
        let outcome = cropper
            .crop_stream(None, BytesStream::new(b"not an image".to_vec()))
            .await;
        assert_eq!(outcome, CropOutcome::LoadingError);
    }

    #[tokio::test]
    async fn test_stream_crop() {
        let cropper = ImageCropper::default();
        let png = encode_png(&pattern(40, 30)).unwrap();
        let task = {
            let cropper = cropper.clone();
            tokio::spawn(async move { cropper.crop_stream(None, BytesStream::new(png)).await })
        };
        let handle = next_session(&cropper).await;
        handle.done(true).unwrap();
        assert_eq!(task.await.unwrap(), CropOutcome::Success(pattern(40, 30)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_saving_error() {
        let cropper = ImageCropper::default();
        let task = {
            let cropper = cropper.clone();
            tokio::spawn(async move {
                cropper
                    .crop(None, || async { Some(Arc::new(Broken) as Arc<dyn ImageSource>) })
                    .await
            })
        };
        next_session(&cropper).await.done(true).unwrap();
        assert_eq!(task.await.unwrap(), CropOutcome::SavingError);
        assert_eq!(cropper.loading_status(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_status() {
        let cropper = ImageCropper::default();
        let task = {
            let cropper = cropper.clone();
            tokio::spawn(async move {
                cropper
                    .crop(None, || async {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Some(Arc::new(RasterImageSource::new(
                            pattern(8, 8),
                            Default::default(),
                        )) as Arc<dyn ImageSource>)
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cropper.loading_status(), Some(LoadingStatus::PreparingImage));

        let handle = next_session(&cropper).await;
        assert_eq!(cropper.loading_status(), None);

        let mut status = cropper.subscribe_status();
        handle.done(true).unwrap();
        let saving = *status
            .wait_for(|s| *s == Some(LoadingStatus::SavingResult))
            .await
            .unwrap();
        assert_eq!(saving, Some(LoadingStatus::SavingResult));
        assert!(matches!(task.await.unwrap(), CropOutcome::Success(_)));
        assert_eq!(cropper.loading_status(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_config_max_result_size_applies() {
        let mut config = CropperConfig::default();
        config.max_result_size = Some(IntSize::new(10, 10));
        let cropper = ImageCropper::new(config);
        let (task, handle) = start(&cropper).await;
        handle.done(true).unwrap();
        let CropOutcome::Success(raster) = task.await.unwrap() else {
            panic!("expected a result");
        };
        assert_eq!((raster.width, raster.height), (10, 8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_max_size_wins() {
        let mut config = CropperConfig::default();
        config.max_result_size = Some(IntSize::new(10, 10));
        let cropper = ImageCropper::new(config);
        let task = {
            let cropper = cropper.clone();
            tokio::spawn(async move {
                cropper
                    .crop_raster(Some(IntSize::new(32, 32)), pattern(64, 48))
                    .await
            })
        };
        next_session(&cropper).await.done(true).unwrap();
        let CropOutcome::Success(raster) = task.await.unwrap() else {
            panic!("expected a result");
        };
        assert_eq!((raster.width, raster.height), (32, 24));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_crop_clears_session() {
        let cropper = ImageCropper::default();
        let (task, handle) = start(&cropper).await;
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        assert!(cropper.session().is_none());
        assert!(handle.lock().is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drag_edge_handle() {
        let cropper = ImageCropper::default();
        let (task, handle) = start(&cropper).await;
        let view = ViewMatrix::new();
        let drag = cropper
            .begin_drag(&handle, Point::new(63.0, 24.0), &view)
            .unwrap();
        assert_eq!(drag.handle, Point::new(1.0, 0.5));
        handle.drag_to(&drag, Point::new(40.0, 24.0), &view).unwrap();
        assert!(handle
            .lock()
            .region()
            .approx_eq(&Rect::new(0.0, 0.0, 41.0, 48.0)));

        cropper.cancel();
        assert_eq!(task.await.unwrap(), CropOutcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_edge_handles_follow_config() {
        let mut config = CropperConfig::default();
        config.secondary_handles = false;
        let cropper = ImageCropper::new(config);
        assert_eq!(cropper.handles().len(), 4);
        let (_task, handle) = start(&cropper).await;
        let drag = cropper
            .begin_drag(&handle, Point::new(63.0, 24.0), &ViewMatrix::new())
            .unwrap();
        assert_eq!(drag.handle, MOVE_HANDLE);
        assert!(cropper
            .begin_drag(&handle, Point::new(90.0, 90.0), &ViewMatrix::new())
            .is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_drag_fits_region_after_settle() {
        let cropper = ImageCropper::default();
        let (_task, handle) = start(&cropper).await;
        assert!(cropper.apply_aspect_preset(&handle, 0).unwrap());
        let region = handle.lock().region();
        assert!(region.approx_eq(&Rect::new(8.0, 0.0, 56.0, 48.0)));

        let animator = ViewAnimator::new(AnimationTiming::default());
        let outer = Rect::new(0.0, 0.0, 100.0, 100.0);
        let started = tokio::time::Instant::now();
        assert!(cropper.end_drag(&handle, &animator, outer).await);
        assert!(started.elapsed() >= Duration::from_millis(500));
        assert!(animator.view().matrix().map_rect(&region).approx_eq(&outer));
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_drag_without_auto_zoom() {
        let mut config = CropperConfig::default();
        config.auto_zoom = false;
        let cropper = ImageCropper::new(config);
        let (_task, handle) = start(&cropper).await;
        let animator = ViewAnimator::new(AnimationTiming::default());
        let outer = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert!(!cropper.end_drag(&handle, &animator, outer).await);
        assert_eq!(animator.view().revision(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_presets_from_config() {
        let cropper = ImageCropper::default();
        let (_task, handle) = start(&cropper).await;
        assert!(cropper.apply_aspect_preset(&handle, 0).unwrap());
        assert!(handle.lock().aspect_lock());
        assert!(!cropper.apply_aspect_preset(&handle, 99).unwrap());

        let shape = cropper.config().shapes[1];
        assert!(cropper.set_shape_preset(&handle, 1).unwrap());
        assert_eq!(handle.lock().shape(), shape);
        assert!(!cropper.set_shape_preset(&handle, 99).unwrap());

        handle.done(false).unwrap();
        assert!(cropper.set_shape_preset(&handle, 0).is_err());
    }
}
