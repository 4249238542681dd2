//! Crop session state for one image.
//!
//! A [`CropSession`] owns the transform, the crop region, the shape mask,
//! the aspect lock and the user's final decision. Every write goes through
//! a setter that re-derives the region, so the session always satisfies:
//!
//! - the region is non-empty
//! - the region lies inside the transformed image rect
//!
//! # State Machine
//!
//! ```text
//! Pending ──done(true)──▶ Accepted
//!    │
//!    └────done(false)──▶ Rejected
//! ```
//!
//! Both terminal states are final; mutators return
//! [`SessionError::Finished`] once the decision is made.

use std::fmt;

use log::{debug, info};
use thiserror::Error;

use crate::decode::ImageDescriptor;
use crate::geometry::{approx_eq, Affine, AspectRatio, IntSize, Rect, Size};
use crate::shape::CropShape;
use crate::transform::{transformed_image_rect, Transform};

/// The user's verdict on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Decision {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The session already received its decision.
    #[error("Session already finished: {0:?}")]
    Finished(Decision),

    /// The image has a zero dimension.
    #[error("Invalid image size: {width}x{height}")]
    InvalidImageSize { width: u32, height: u32 },
}

type CompletionFn = Box<dyn FnOnce(Decision) + Send>;

pub struct CropSession {
    src: ImageDescriptor,
    transform: Transform,
    region: Rect,
    image_rect: Rect,
    shape: CropShape,
    aspect_lock: bool,
    decision: Decision,
    on_done: Option<CompletionFn>,
}

impl fmt::Debug for CropSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CropSession")
            .field("src", &self.src)
            .field("transform", &self.transform)
            .field("region", &self.region)
            .field("shape", &self.shape)
            .field("aspect_lock", &self.aspect_lock)
            .field("decision", &self.decision)
            .finish_non_exhaustive()
    }
}

impl CropSession {
    /// Start a session with the identity transform, the whole image as
    /// region, a rectangular shape and no aspect lock.
    pub fn new(src: ImageDescriptor) -> Self {
        let image_rect = src.size().to_rect();
        Self {
            src,
            transform: Transform::IDENTITY,
            region: image_rect,
            image_rect,
            shape: CropShape::default(),
            aspect_lock: false,
            decision: Decision::Pending,
            on_done: None,
        }
    }

    pub fn from_size(size: IntSize) -> Result<Self, SessionError> {
        ImageDescriptor::new(size.width, size.height)
            .map(Self::new)
            .ok_or(SessionError::InvalidImageSize {
                width: size.width,
                height: size.height,
            })
    }

    /// Register a callback fired once, when [`CropSession::done`] is called.
    pub fn with_completion(mut self, on_done: impl FnOnce(Decision) + Send + 'static) -> Self {
        self.on_done = Some(Box::new(on_done));
        self
    }

    pub fn src(&self) -> ImageDescriptor {
        self.src
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    /// Crop region in transformed-image space.
    pub fn region(&self) -> Rect {
        self.region
    }

    pub fn shape(&self) -> CropShape {
        self.shape
    }

    pub fn aspect_lock(&self) -> bool {
        self.aspect_lock
    }

    pub fn decision(&self) -> Decision {
        self.decision
    }

    pub fn is_active(&self) -> bool {
        self.decision == Decision::Pending
    }

    /// The raw image bounds mapped through the current transform.
    pub fn image_rect(&self) -> Rect {
        self.image_rect
    }

    /// Raw image pixels to transformed-image space.
    pub fn image_matrix(&self) -> Affine {
        self.transform.as_matrix(self.src.size())
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        match self.decision {
            Decision::Pending => Ok(()),
            finished => Err(SessionError::Finished(finished)),
        }
    }

    /// Replace the transform, carrying the region along so it stays on the
    /// same image pixels.
    pub fn set_transform(&mut self, transform: Transform) -> Result<(), SessionError> {
        self.ensure_active()?;
        let size = self.src.size();
        let un_transform = self
            .transform
            .as_matrix(size)
            .invert()
            .unwrap_or(Affine::IDENTITY);
        let projected = transform
            .as_matrix(size)
            .map_rect(&un_transform.map_rect(&self.region));

        self.transform = transform;
        self.image_rect = transformed_image_rect(&transform, size);
        self.region = settle(projected, &projected, &self.image_rect);
        debug!(
            "transform set to {}deg scale ({}, {}), region {:?}",
            transform.angle_deg, transform.scale.x, transform.scale.y, self.region
        );
        Ok(())
    }

    /// Write a new region, constrained to the transformed image rect.
    ///
    /// A pure move keeps the size and is pushed back inside. A resize is
    /// clamped edge by edge, or with the aspect lock on, forced to the old
    /// aspect and shrunk to fit. A degenerate result collapses to a 1×1 box.
    pub fn set_region(&mut self, region: Rect) -> Result<(), SessionError> {
        self.ensure_active()?;
        self.region = update_region(&self.region, &region, &self.image_rect, self.aspect_lock);
        Ok(())
    }

    /// Reshape the region to `aspect`, centred in the current region.
    ///
    /// This turns the aspect lock on, so later drags keep the new aspect.
    /// The reshape itself ignores any lock already set, which lets a locked
    /// region switch between presets.
    pub fn apply_aspect(&mut self, aspect: AspectRatio) -> Result<(), SessionError> {
        self.ensure_active()?;
        let candidate = self.region.set_aspect(aspect);
        self.region = update_region(&self.region, &candidate, &self.image_rect, false);
        self.aspect_lock = true;
        Ok(())
    }

    pub fn set_shape(&mut self, shape: CropShape) -> Result<(), SessionError> {
        self.ensure_active()?;
        self.shape = shape;
        Ok(())
    }

    pub fn set_aspect_lock(&mut self, locked: bool) -> Result<(), SessionError> {
        self.ensure_active()?;
        self.aspect_lock = locked;
        Ok(())
    }

    /// Restore transform, shape, region and aspect lock to their defaults.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        self.ensure_active()?;
        self.transform = Transform::IDENTITY;
        self.image_rect = self.src.size().to_rect();
        self.region = self.image_rect;
        self.shape = CropShape::default();
        self.aspect_lock = false;
        Ok(())
    }

    /// Record the decision and fire the completion callback.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Finished` if called a second time.
    pub fn done(&mut self, accept: bool) -> Result<(), SessionError> {
        self.ensure_active()?;
        self.decision = if accept {
            Decision::Accepted
        } else {
            Decision::Rejected
        };
        info!("crop session finished: {:?}", self.decision);
        if let Some(on_done) = self.on_done.take() {
            on_done(self.decision);
        }
        Ok(())
    }

    pub fn rotate_left(&mut self) -> Result<(), SessionError> {
        self.set_transform(self.transform.rotated_left())
    }

    pub fn rotate_right(&mut self) -> Result<(), SessionError> {
        self.set_transform(self.transform.rotated_right())
    }

    pub fn flip_horizontal(&mut self) -> Result<(), SessionError> {
        self.set_transform(self.transform.flipped_horizontal())
    }

    pub fn flip_vertical(&mut self) -> Result<(), SessionError> {
        self.set_transform(self.transform.flipped_vertical())
    }
}

/// The region that results from writing `new` over `old` inside `bounds`.
pub fn update_region(old: &Rect, new: &Rect, bounds: &Rect, aspect_lock: bool) -> Rect {
    let offset_only = approx_eq(old.width(), new.width()) && approx_eq(old.height(), new.height());
    let candidate = if offset_only {
        new.constrain_offset(bounds)
    } else if aspect_lock {
        new.keep_aspect(old).scale_to_fit(bounds, old)
    } else {
        new.constrain_resize(bounds)
    };
    settle(candidate, old, bounds)
}

/// Clamp `candidate` into `bounds`, collapsing to a 1×1 box anchored
/// against `old` when nothing usable is left.
fn settle(candidate: Rect, old: &Rect, bounds: &Rect) -> Rect {
    let clamped = candidate.constrain_resize(bounds);
    if is_finite(&clamped) && !clamped.is_empty() {
        return clamped;
    }
    let anchor = if is_finite(&candidate) { candidate } else { *old };
    anchor
        .set_size(old, Size::new(1.0, 1.0))
        .constrain_offset(bounds)
        .constrain_resize(bounds)
}

fn is_finite(r: &Rect) -> bool {
    r.left.is_finite() && r.top.is_finite() && r.right.is_finite() && r.bottom.is_finite()
}


// ============================================================================
// Property-Based Tests
// ============================================================================
