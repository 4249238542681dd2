//! Image transform: quarter-turn rotation and flips around a pivot.
//!
//! # Transform Order
//!
//! Converting a [`Transform`] to a matrix against an image of size `w × h`:
//! 1. Translate the pivot (`pivot_rel * (w, h)`) to the origin
//! 2. Scale by `scale` (±1 per axis for flips)
//! 3. Rotate by `angle_deg` (positive = clockwise on screen)
//! 4. Translate back
//!
//! Rotation is only ever changed in quarter turns; free rotation is not
//! exposed.

use serde::{Deserialize, Serialize};

use crate::geometry::{lerp_angle, next90, prev90, Affine, IntSize, Point, Rect};

/// Rotation and flip applied to the raw image, around `pivot_rel`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Rotation in degrees, normalized to `(-180, 180]`.
    pub angle_deg: i32,
    /// Per-axis scale; `-1` means flipped along that axis.
    pub scale: Point,
    /// Pivot relative to the image size (`(0.5, 0.5)` = centre).
    pub pivot_rel: Point,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        angle_deg: 0,
        scale: Point::new(1.0, 1.0),
        pivot_rel: Point::new(0.5, 0.5),
    };

    /// A transform with neither rotation nor flip maps to the identity
    /// matrix regardless of its pivot.
    pub fn is_trivial(&self) -> bool {
        self.angle_deg == 0 && self.scale == Point::new(1.0, 1.0)
    }

    /// Whether the current rotation is an odd number of quarter turns.
    fn is_quarter_turned(&self) -> bool {
        (self.angle_deg / 90) % 2 != 0
    }

    /// Rotate a quarter turn counter-clockwise.
    pub fn rotated_left(&self) -> Transform {
        Transform {
            angle_deg: prev90(self.angle_deg),
            ..*self
        }
    }

    /// Rotate a quarter turn clockwise.
    pub fn rotated_right(&self) -> Transform {
        Transform {
            angle_deg: next90(self.angle_deg),
            ..*self
        }
    }

    /// Mirror along the screen's horizontal axis.
    ///
    /// After an odd number of quarter turns the screen-horizontal axis is
    /// the image's vertical axis, so the y scale is toggled instead.
    pub fn flipped_horizontal(&self) -> Transform {
        if self.is_quarter_turned() {
            self.flipped_y()
        } else {
            self.flipped_x()
        }
    }

    /// Mirror along the screen's vertical axis.
    pub fn flipped_vertical(&self) -> Transform {
        if self.is_quarter_turned() {
            self.flipped_x()
        } else {
            self.flipped_y()
        }
    }

    pub fn flipped_x(&self) -> Transform {
        Transform {
            scale: Point::new(-self.scale.x, self.scale.y),
            ..*self
        }
    }

    pub fn flipped_y(&self) -> Transform {
        Transform {
            scale: Point::new(self.scale.x, -self.scale.y),
            ..*self
        }
    }

    /// Matrix mapping raw image pixels into transformed-image space.
    pub fn as_matrix(&self, image: IntSize) -> Affine {
        if self.is_trivial() {
            return Affine::IDENTITY;
        }
        let pivot = Point::new(
            image.width as f32 * self.pivot_rel.x,
            image.height as f32 * self.pivot_rel.y,
        );
        Affine::translation(-pivot.x, -pivot.y)
            .then(&Affine::scaling(self.scale.x, self.scale.y))
            .then(&Affine::rotation_deg(self.angle_deg as f32))
            .then(&Affine::translation(pivot.x, pivot.y))
    }

    /// Interpolate towards `target`, taking the short way round for the angle.
    pub fn lerp(&self, target: &Transform, p: f32) -> Transform {
        if p <= 0.0 {
            return *self;
        }
        if p >= 1.0 {
            return *target;
        }
        Transform {
            angle_deg: lerp_angle(self.angle_deg, target.angle_deg, p),
            scale: self.scale.lerp(target.scale, p),
            pivot_rel: self.pivot_rel.lerp(target.pivot_rel, p),
        }
    }
}

/// Bounds of the whole image after applying `transform`.
pub fn transformed_image_rect(transform: &Transform, image: IntSize) -> Rect {
    transform.as_matrix(image).map_rect(&image.to_rect())
}
