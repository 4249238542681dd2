//! Viewport pan/zoom matrix, independent of the image [`Transform`].
//!
//! [`ViewMatrix`] maps transformed-image space to screen space. It is
//! mutated in place; every mutation bumps [`ViewMatrix::revision`] so that
//! dependent computations can re-run on each update even when the resulting
//! matrix compares equal to a previous one.
//!
//! [`Transform`]: crate::transform::Transform

use crate::geometry::{Affine, Point, Rect, Size};

#[derive(Debug, Clone, Default)]
pub struct ViewMatrix {
    matrix: Affine,
    zoom_center: Point,
    revision: u64,
}

impl ViewMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matrix(&self) -> Affine {
        self.matrix
    }

    /// Screen to transformed-image matrix. Falls back to the identity when
    /// the view matrix has collapsed.
    pub fn inverse(&self) -> Affine {
        self.matrix.invert().unwrap_or_default()
    }

    /// Current zoom factor.
    pub fn scale(&self) -> f32 {
        self.matrix.scale_x()
    }

    /// Incremented on every mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn update(&mut self, delta: &Affine) {
        self.matrix = self.matrix.then(delta);
        self.revision += 1;
    }

    /// Record the pivot of a zoom gesture.
    pub fn zoom_start(&mut self, center: Point) {
        self.zoom_center = center;
    }

    /// Pan by the movement of the gesture centre and scale about it.
    pub fn zoom(&mut self, center: Point, scale: f32) {
        let pan = center - self.zoom_center;
        let delta = Affine::translation(-center.x, -center.y)
            .then(&Affine::scaling(scale, scale))
            .then(&Affine::translation(center.x, center.y))
            .then(&Affine::translation(pan.x, pan.y));
        self.update(&delta);
        self.zoom_center = center;
    }

    /// Instantly frame `inner` (screen space) centred inside `outer`.
    pub fn snap_fit(&mut self, inner: &Rect, outer: &Rect) {
        if let Some(dst) = fit_target(inner, outer) {
            self.update(&Affine::rect_to_rect(inner, &dst));
        }
    }

    /// Start an animated fit; drive it with [`ViewMatrix::apply_fit_frame`].
    pub fn begin_fit(&self, inner: &Rect, outer: &Rect) -> Option<FitAnimation> {
        let target = fit_target(inner, outer)?;
        Some(FitAnimation {
            initial: self.matrix,
            inner: *inner,
            target,
        })
    }

    /// Set the matrix to the animation's state at progress `p` in `[0, 1]`.
    pub fn apply_fit_frame(&mut self, animation: &FitAnimation, p: f32) {
        self.matrix = animation.frame(p.clamp(0.0, 1.0));
        self.revision += 1;
    }
}

/// Where `inner` lands when uniformly scaled to fit and centred in `outer`.
///
/// Returns `None` when either rectangle is degenerate.
pub fn fit_target(inner: &Rect, outer: &Rect) -> Option<Rect> {
    if inner.is_empty() || outer.is_empty() {
        return None;
    }
    let scale = (outer.width() / inner.width()).min(outer.height() / inner.height());
    Some(Rect::from_size(Size::new(inner.width() * scale, inner.height() * scale)).center_in(outer))
}

/// A pending animated fit: interpolates the framed rect from `inner` to
/// `target`, recomputing the delta from the starting matrix each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitAnimation {
    initial: Affine,
    inner: Rect,
    target: Rect,
}

impl FitAnimation {
    pub fn target(&self) -> Rect {
        self.target
    }

    pub fn frame(&self, p: f32) -> Affine {
        let current = self.inner.lerp(&self.target, p);
        self.initial.then(&Affine::rect_to_rect(&self.inner, &current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_view_is_identity() {
        let view = ViewMatrix::new();
        assert!(view.matrix().is_identity());
        assert_eq!(view.scale(), 1.0);
        assert_eq!(view.revision(), 0);
    }

    #[test]
    fn test_zoom_keeps_center_fixed() {
        let mut view = ViewMatrix::new();
        let c = Point::new(100.0, 50.0);
        view.zoom_start(c);
        view.zoom(c, 2.0);
        assert_eq!(view.matrix().map_point(c), c);
        assert_eq!(view.scale(), 2.0);
        assert_eq!(
            view.matrix().map_point(Point::new(110.0, 50.0)),
            Point::new(120.0, 50.0)
        );
    }

    #[test]
    fn test_zoom_pans_with_moving_center() {
        let mut view = ViewMatrix::new();
        view.zoom_start(Point::new(0.0, 0.0));
        view.zoom(Point::new(10.0, 5.0), 1.0);
        assert_eq!(
            view.matrix().map_point(Point::new(0.0, 0.0)),
            Point::new(10.0, 5.0)
        );
    }

    #[test]
    fn test_snap_fit_centres_and_scales() {
        let mut view = ViewMatrix::new();
        let inner = Rect::new(0.0, 0.0, 50.0, 100.0);
        let outer = Rect::new(0.0, 0.0, 400.0, 400.0);
        view.snap_fit(&inner, &outer);
        let mapped = view.matrix().map_rect(&inner);
        assert!(mapped.approx_eq(&Rect::new(100.0, 0.0, 300.0, 400.0)));
    }

    #[test]
    fn test_snap_fit_degenerate_is_noop() {
        let mut view = ViewMatrix::new();
        view.snap_fit(&Rect::new(0.0, 0.0, 0.0, 10.0), &Rect::new(0.0, 0.0, 10.0, 10.0));
        assert!(view.matrix().is_identity());
        assert_eq!(view.revision(), 0);
    }

    #[test]
    fn test_every_mutation_bumps_revision() {
        let mut view = ViewMatrix::new();
        view.zoom_start(Point::ZERO);
        view.zoom(Point::ZERO, 1.0);
        view.zoom(Point::ZERO, 1.0);
        // Matrix is unchanged but observers still see two updates
        assert!(view.matrix().is_identity());
        assert_eq!(view.revision(), 2);
    }

    #[test]
    fn test_fit_animation_endpoints() {
        let mut view = ViewMatrix::new();
        let inner = Rect::new(10.0, 10.0, 60.0, 60.0);
        let outer = Rect::new(0.0, 0.0, 200.0, 100.0);
        let anim = view.begin_fit(&inner, &outer).unwrap();

        view.apply_fit_frame(&anim, 0.0);
        assert!(view.matrix().map_rect(&inner).approx_eq(&inner));

        view.apply_fit_frame(&anim, 1.0);
        assert!(view
            .matrix()
            .map_rect(&inner)
            .approx_eq(&Rect::new(50.0, 0.0, 150.0, 100.0)));
    }
}
