//! Progressive image loading.
//!
//! A [`ProgressiveLoader`] shows a coarse decode of the whole image as soon
//! as a viewport size is known, then chases the current view matrix with
//! finer decodes. Enhanced decodes are debounced by the settle delay so a
//! running gesture does not decode on every frame. A decode that has been
//! superseded by the time it resolves is dropped.
//!
//! The displayed tile is published on a [`watch`] channel: the enhanced
//! result when one matches the view, otherwise the coarse preview.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use cropkit_core::view::fit_target;
use cropkit_core::{Affine, CropperConfig, DecodePlanner, DecodeRequest, DecodeResult, IntSize};
use log::{debug, warn};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::source::ImageSource;

/// The tile to draw, if any.
pub type Displayed = Option<Arc<DecodeResult>>;

struct Pending {
    request: DecodeRequest,
    token: CancellationToken,
}

#[derive(Default)]
struct LoaderState {
    viewport: IntSize,
    /// Bumped whenever the viewport changes; tasks from older epochs are stale.
    epoch: u64,
    full: Option<Arc<DecodeResult>>,
    enhanced: Option<Arc<DecodeResult>>,
    last_view: Option<Affine>,
    preview: Option<CancellationToken>,
    pending: Option<Pending>,
}

impl LoaderState {
    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.token.cancel();
        }
    }
}

struct Shared {
    source: Arc<dyn ImageSource>,
    planner: DecodePlanner,
    settle_delay: Duration,
    state: Mutex<LoaderState>,
    display: watch::Sender<Displayed>,
    shutdown: CancellationToken,
}

/// Coarse-then-fine decoding for one image source.
///
/// `set_viewport` and `update_view` spawn Tokio tasks and must be called
/// from within a Tokio runtime. Dropping the loader abandons all in-flight
/// decodes.
pub struct ProgressiveLoader {
    shared: Arc<Shared>,
}

impl ProgressiveLoader {
    pub fn new(
        source: Arc<dyn ImageSource>,
        planner: DecodePlanner,
        settle_delay: Duration,
    ) -> Self {
        let (display, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                source,
                planner,
                settle_delay,
                state: Mutex::new(LoaderState::default()),
                display,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Loader using the configured planner and settle delay.
    pub fn from_config(source: Arc<dyn ImageSource>, config: &CropperConfig) -> Self {
        Self::new(
            source,
            DecodePlanner::new(config.planner),
            Duration::from_millis(config.settle_delay_ms),
        )
    }

    pub fn source(&self) -> &Arc<dyn ImageSource> {
        &self.shared.source
    }

    /// Start over for a new viewport size: drop every result and pending
    /// decode, then issue one coarse decode of the whole image fitted into
    /// `viewport`.
    pub fn set_viewport(&self, viewport: IntSize) {
        let shared = &self.shared;
        let mut state = shared.lock();
        if state.epoch != 0 && state.viewport == viewport {
            return;
        }
        state.epoch += 1;
        state.viewport = viewport;
        state.cancel_pending();
        if let Some(preview) = state.preview.take() {
            preview.cancel();
        }
        state.full = None;
        state.enhanced = None;
        shared.publish(&state);

        let image = shared.source.size().to_rect();
        let Some(fitted) = fit_target(&image, &viewport.to_rect()) else {
            debug!("empty viewport, no preview");
            return;
        };
        let fit = Affine::rect_to_rect(&image, &fitted);
        let Some(request) = shared.planner.plan(viewport, shared.source.size(), &fit) else {
            return;
        };
        debug!(
            "preview decode at sample size {} for {}x{} viewport",
            request.sample_size, viewport.width, viewport.height
        );

        let token = shared.shutdown.child_token();
        state.preview = Some(token.clone());
        let epoch = state.epoch;
        let task = shared.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = token.cancelled() => return,
                result = task.source.open(request) => result,
            };
            task.apply_preview(epoch, result);
        });
    }

    /// Follow a new image-to-screen matrix.
    pub fn update_view(&self, view: Affine) {
        let mut state = self.shared.lock();
        self.shared.update(&mut state, view);
    }

    /// The tile currently displayed.
    pub fn displayed(&self) -> Displayed {
        self.shared.display.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Displayed> {
        self.shared.display.subscribe()
    }
}

impl Drop for ProgressiveLoader {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, LoaderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &LoaderState) {
        let shown = state.enhanced.clone().or_else(|| state.full.clone());
        self.display.send_replace(shown);
    }

    fn apply_preview(self: &Arc<Self>, epoch: u64, result: Option<DecodeResult>) {
        let mut state = self.lock();
        if state.epoch != epoch {
            debug!("dropping stale preview");
            return;
        }
        state.preview = None;
        let Some(result) = result else {
            warn!("preview decode failed");
            return;
        };
        state.full = Some(Arc::new(result));
        self.publish(&state);
        let last_view = state.last_view;
        if let Some(view) = last_view {
            self.update(&mut state, view);
        }
    }

    fn update(self: &Arc<Self>, state: &mut LoaderState, view: Affine) {
        state.last_view = Some(view);
        let Some(full) = state.full.clone() else {
            return;
        };
        let Some(request) = self.planner.plan(state.viewport, self.source.size(), &view) else {
            return;
        };
        if state
            .enhanced
            .as_ref()
            .is_some_and(|enhanced| enhanced.request.covers(&request))
        {
            return;
        }
        if full.request.covers(&request) {
            debug!("preview covers view, reusing it");
            state.cancel_pending();
            state.enhanced = Some(full);
            self.publish(state);
            return;
        }
        if state
            .pending
            .as_ref()
            .is_some_and(|pending| pending.request.covers(&request))
        {
            return;
        }

        state.enhanced = None;
        self.publish(state);
        state.cancel_pending();

        let token = self.shutdown.child_token();
        state.pending = Some(Pending {
            request,
            token: token.clone(),
        });
        let epoch = state.epoch;
        let delay = self.settle_delay;
        let task = self.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = token.cancelled() => return,
                result = async {
                    tokio::time::sleep(delay).await;
                    task.source.open(request).await
                } => result,
            };
            task.apply_enhanced(epoch, &token, result);
        });
    }

    fn apply_enhanced(
        &self,
        epoch: u64,
        token: &CancellationToken,
        result: Option<DecodeResult>,
    ) {
        let mut state = self.lock();
        if token.is_cancelled() || state.epoch != epoch {
            debug!("dropping superseded decode");
            return;
        }
        state.pending = None;
        match result {
            Some(result) => {
                state.enhanced = Some(Arc::new(result));
                self.publish(&state);
            }
            None => warn!("enhanced decode failed, keeping preview"),
        }
    }
}
