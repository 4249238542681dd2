//! Animated view changes.
//!
//! [`ViewAnimator`] owns the view matrix and publishes it on a [`watch`]
//! channel. Gestures (`zoom_start`, `zoom`) and fits all go through it, so
//! any new request preempts an in-flight animation: the running animation
//! stops where it is and never applies its last frame.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use cropkit_core::{CropperConfig, Point, Rect, Transform, ViewMatrix};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Length and frame pacing of an animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationTiming {
    pub duration: Duration,
    pub frame_interval: Duration,
}

impl Default for AnimationTiming {
    fn default() -> Self {
        Self {
            duration: Duration::from_millis(300),
            frame_interval: Duration::from_millis(16),
        }
    }
}

impl AnimationTiming {
    pub fn from_config(config: &CropperConfig) -> Self {
        Self {
            duration: Duration::from_millis(config.fit_animation_ms),
            frame_interval: Duration::from_millis(config.frame_interval_ms.max(1)),
        }
    }
}

/// Call `frame` with progress in `[0, 1]` until it reaches 1.
///
/// Returns false if `token` fired first.
async fn run_frames(
    timing: AnimationTiming,
    token: &CancellationToken,
    mut frame: impl FnMut(f32),
) -> bool {
    let start = Instant::now();
    loop {
        if token.is_cancelled() {
            return false;
        }
        let p = if timing.duration.is_zero() {
            1.0
        } else {
            (start.elapsed().as_secs_f32() / timing.duration.as_secs_f32()).min(1.0)
        };
        frame(p);
        if p >= 1.0 {
            return true;
        }
        tokio::select! {
            _ = token.cancelled() => return false,
            _ = tokio::time::sleep(timing.frame_interval) => {}
        }
    }
}

pub struct ViewAnimator {
    view: watch::Sender<ViewMatrix>,
    animation: Mutex<Option<CancellationToken>>,
    timing: AnimationTiming,
}

impl ViewAnimator {
    pub fn new(timing: AnimationTiming) -> Self {
        let (view, _) = watch::channel(ViewMatrix::new());
        Self {
            view,
            animation: Mutex::new(None),
            timing,
        }
    }

    pub fn view(&self) -> ViewMatrix {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewMatrix> {
        self.view.subscribe()
    }

    /// Stop any running or scheduled animation.
    pub fn cancel(&self) {
        let slot = self.animation.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(token) = slot {
            token.cancel();
        }
    }

    /// Cancel the current animation and claim the slot for a new one.
    fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let previous = self
            .animation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }
        token
    }

    pub fn zoom_start(&self, center: Point) {
        self.cancel();
        self.view.send_modify(|view| view.zoom_start(center));
    }

    pub fn zoom(&self, center: Point, scale: f32) {
        self.cancel();
        self.view.send_modify(|view| view.zoom(center, scale));
    }

    /// Frame `inner` (screen space) inside `outer` immediately.
    pub fn snap_fit(&self, inner: &Rect, outer: &Rect) {
        self.cancel();
        self.view.send_modify(|view| view.snap_fit(inner, outer));
    }

    /// Animate the view so `inner` (screen space) fills `outer`.
    ///
    /// Returns true once the last frame is applied, false when preempted or
    /// when either rect is degenerate.
    pub async fn fit(&self, inner: Rect, outer: Rect) -> bool {
        let token = self.begin();
        self.run_fit(&token, &inner, &outer).await
    }

    /// Wait `delay`, then animate the view so `local` (transformed-image
    /// space, e.g. the crop region) fills `outer`.
    ///
    /// The region is mapped to the screen after the delay, so gestures in
    /// the meantime are taken into account. Any zoom or [`cancel`] during
    /// the delay abandons the fit.
    ///
    /// [`cancel`]: ViewAnimator::cancel
    pub async fn bring_to_view(&self, local: Rect, outer: Rect, delay: Duration) -> bool {
        let token = self.begin();
        tokio::select! {
            _ = token.cancelled() => return false,
            _ = tokio::time::sleep(delay) => {}
        }
        let inner = self.view.borrow().matrix().map_rect(&local);
        self.run_fit(&token, &inner, &outer).await
    }

    async fn run_fit(&self, token: &CancellationToken, inner: &Rect, outer: &Rect) -> bool {
        let animation = self.view.borrow().begin_fit(inner, outer);
        let Some(animation) = animation else {
            return false;
        };
        run_frames(self.timing, token, |p| {
            self.view.send_modify(|view| view.apply_fit_frame(&animation, p));
        })
        .await
    }
}

/// Step from `from` to `to`, reporting each intermediate transform.
///
/// The last call always receives exactly `to`. Drop the future to stop.
pub async fn animate_transform(
    from: Transform,
    to: Transform,
    timing: AnimationTiming,
    mut on_frame: impl FnMut(Transform),
) {
    let token = CancellationToken::new();
    run_frames(timing, &token, |p| on_frame(from.lerp(&to, p))).await;
}
