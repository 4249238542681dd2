//! 2D affine matrices.
//!
//! A point maps as:
//! ```text
//! x' = a * x + c * y + tx
//! y' = b * x + d * y + ty
//! ```
//! Rotations follow the screen convention (y down): a positive angle turns
//! clockwise on screen. Quarter turns use exact sine/cosine values so that
//! rotated image bounds stay on whole pixels.

use super::{Point, Rect};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    pub fn identity() -> Self {
        Self::IDENTITY
    }

    pub fn translation(tx: f32, ty: f32) -> Self {
        Self {
            tx,
            ty,
            ..Self::IDENTITY
        }
    }

    pub fn scaling(sx: f32, sy: f32) -> Self {
        Self {
            a: sx,
            d: sy,
            ..Self::IDENTITY
        }
    }

    pub fn rotation_deg(degrees: f32) -> Self {
        let (sin, cos) = exact_sin_cos(degrees);
        Self {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            tx: 0.0,
            ty: 0.0,
        }
    }

    /// Scale-translate matrix mapping `src` onto `dst` edge for edge.
    pub fn rect_to_rect(src: &Rect, dst: &Rect) -> Self {
        let sx = dst.width() / src.width();
        let sy = dst.height() / src.height();
        Self {
            a: sx,
            b: 0.0,
            c: 0.0,
            d: sy,
            tx: dst.left - src.left * sx,
            ty: dst.top - src.top * sy,
        }
    }

    /// Compose: apply `self` first, then `next`.
    pub fn then(&self, next: &Affine) -> Affine {
        Affine {
            a: next.a * self.a + next.c * self.b,
            b: next.b * self.a + next.d * self.b,
            c: next.a * self.c + next.c * self.d,
            d: next.b * self.c + next.d * self.d,
            tx: next.a * self.tx + next.c * self.ty + next.tx,
            ty: next.b * self.tx + next.d * self.ty + next.ty,
        }
    }

    pub fn determinant(&self) -> f32 {
        self.a * self.d - self.b * self.c
    }

    /// The inverse matrix, or `None` when the matrix is singular.
    pub fn invert(&self) -> Option<Affine> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        Some(Affine {
            a: self.d / det,
            b: -self.b / det,
            c: -self.c / det,
            d: self.a / det,
            tx: (self.c * self.ty - self.d * self.tx) / det,
            ty: (self.b * self.tx - self.a * self.ty) / det,
        })
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Horizontal scale component.
    pub fn scale_x(&self) -> f32 {
        self.a
    }

    pub fn map_point(&self, p: Point) -> Point {
        Point::new(
            self.a * p.x + self.c * p.y + self.tx,
            self.b * p.x + self.d * p.y + self.ty,
        )
    }

    /// Axis-aligned bounding box of the mapped rectangle.
    pub fn map_rect(&self, r: &Rect) -> Rect {
        let corners = [
            self.map_point(Point::new(r.left, r.top)),
            self.map_point(Point::new(r.right, r.top)),
            self.map_point(Point::new(r.left, r.bottom)),
            self.map_point(Point::new(r.right, r.bottom)),
        ];
        let mut out = Rect::new(
            f32::INFINITY,
            f32::INFINITY,
            f32::NEG_INFINITY,
            f32::NEG_INFINITY,
        );
        for p in corners {
            out.left = out.left.min(p.x);
            out.top = out.top.min(p.y);
            out.right = out.right.max(p.x);
            out.bottom = out.bottom.max(p.y);
        }
        out
    }

    /// Length of the mapped unit vectors along x and y.
    pub fn axis_scales(&self) -> (f32, f32) {
        (self.a.hypot(self.b), self.c.hypot(self.d))
    }
}

fn exact_sin_cos(degrees: f32) -> (f32, f32) {
    if degrees.fract() == 0.0 {
        match (degrees as i64).rem_euclid(360) {
            0 => return (0.0, 1.0),
            90 => return (1.0, 0.0),
            180 => return (0.0, -1.0),
            270 => return (-1.0, 0.0),
            _ => {}
        }
    }
    degrees.to_radians().sin_cos()
}
