//! Geometry kernel: points, sizes, rectangles, affine matrices and the
//! scalar helpers shared by every other module.
//!
//! # Coordinate System
//!
//! - Origin is the top-left corner, y grows downwards
//! - Float rectangles are stored as edges (`left`, `top`, `right`, `bottom`)
//! - Integer rectangles use the same layout and are exclusive on the
//!   right/bottom edges
//!
//! All float comparisons go through [`approx_eq`], since transform math
//! accumulates rounding error.

mod affine;
mod rect;

pub use affine::Affine;
pub use rect::{IntRect, Rect};

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// Tolerance used for every float equality check (2^-12).
pub const EPSILON: f32 = 2.441_406_2e-4;

/// Returns true if `a` and `b` are equal within [`EPSILON`].
#[inline]
pub fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() <= EPSILON
}

/// Returns true if `v` is zero within [`EPSILON`].
#[inline]
pub fn approx_zero(v: f32) -> bool {
    v.abs() <= EPSILON
}

/// Linear interpolation between `a` and `b`.
#[inline]
pub fn lerp(a: f32, b: f32, p: f32) -> f32 {
    a + p * (b - a)
}

/// Interpolate between two angles (degrees) along the shortest path.
pub fn lerp_angle(a: i32, b: i32, p: f32) -> i32 {
    let diff = (b - a) % 360;
    let dist = (2 * diff) % 360 - diff;
    round_half_up(a as f32 + dist as f32 * p)
}

/// Normalize an angle in degrees into `(-180, 180]`.
pub fn angle_range(angle: i32) -> i32 {
    let angle = angle.rem_euclid(360);
    if angle <= 180 {
        angle
    } else {
        angle - 360
    }
}

/// Next quarter turn clockwise, normalized.
#[inline]
pub fn next90(angle: i32) -> i32 {
    angle_range(angle + 90)
}

/// Previous quarter turn (counter-clockwise), normalized.
#[inline]
pub fn prev90(angle: i32) -> i32 {
    angle_range(angle - 90)
}

/// Floor `value` to a multiple of `alignment`.
#[inline]
pub fn align_down(value: f32, alignment: u32) -> f32 {
    let k = alignment.max(1) as f32;
    (value / k).floor() * k
}

/// Ceil `value` to a multiple of `alignment`.
#[inline]
pub fn align_up(value: f32, alignment: u32) -> f32 {
    let k = alignment.max(1) as f32;
    (value / k).ceil() * k
}

/// Round `value` to the nearest multiple of `alignment` (ties to even).
#[inline]
pub fn align(value: f32, alignment: u32) -> f32 {
    let k = alignment.max(1) as f32;
    (value / k).round_ties_even() * k
}

#[inline]
fn round_half_up(v: f32) -> i32 {
    (v + 0.5).floor() as i32
}

/// A point (or offset) in float coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn approx_eq(self, other: Point) -> bool {
        approx_eq(self.x, other.x) && approx_eq(self.y, other.y)
    }

    pub fn distance_squared(self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Round both components to whole pixels.
    pub fn round(self) -> Point {
        Point::new(self.x.round(), self.y.round())
    }

    pub fn lerp(self, target: Point, p: f32) -> Point {
        Point::new(lerp(self.x, target.x, p), lerp(self.y, target.y, p))
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Point {
    type Output = Point;
    fn mul(self, rhs: f32) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

/// A float size.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn area(self) -> f32 {
        self.width * self.height
    }

    pub fn is_empty(self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn approx_eq(self, other: Size) -> bool {
        approx_eq(self.width, other.width) && approx_eq(self.height, other.height)
    }

    /// Rescale to the same area while taking `old`'s aspect ratio.
    pub fn keep_aspect(self, old: Size) -> Size {
        let a = self.area();
        Size::new(
            ((a * old.width) / old.height).sqrt(),
            ((a * old.height) / old.width).sqrt(),
        )
    }

    /// Uniformly shrink to fit inside `max` (never grows).
    pub fn coerce_at_most(self, max: Option<Size>) -> Size {
        let Some(max) = max else {
            return self;
        };
        let factor = (max.width / self.width).min(max.height / self.height);
        if factor >= 1.0 {
            return self;
        }
        self * factor
    }

    /// Round both dimensions up to whole pixels.
    pub fn round_up(self) -> IntSize {
        IntSize::new(
            self.width.ceil().max(0.0) as u32,
            self.height.ceil().max(0.0) as u32,
        )
    }

    /// Whether this size has the given aspect ratio (within epsilon).
    pub fn is_aspect(self, aspect: AspectRatio) -> bool {
        approx_zero(self.width / self.height - aspect.ratio())
    }
}

impl Mul<f32> for Size {
    type Output = Size;
    fn mul(self, rhs: f32) -> Size {
        Size::new(self.width * rhs, self.height * rhs)
    }
}

/// An integer pixel size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct IntSize {
    pub width: u32,
    pub height: u32,
}

impl IntSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Area in pixels, as f64 to avoid overflow on very large images.
    pub fn area(self) -> f64 {
        self.width as f64 * self.height as f64
    }

    pub fn to_size(self) -> Size {
        Size::new(self.width as f32, self.height as f32)
    }

    /// The rectangle `(0, 0) - (width, height)`.
    pub fn to_int_rect(self) -> IntRect {
        IntRect::new(0, 0, self.width as i32, self.height as i32)
    }

    pub fn to_rect(self) -> Rect {
        Rect::from_size(self.to_size())
    }
}

impl From<(u32, u32)> for IntSize {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width, height)
    }
}

/// Image aspect ratio, e.g. `AspectRatio::new(16, 9)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AspectRatio {
    pub x: u32,
    pub y: u32,
}

impl AspectRatio {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    pub fn ratio(self) -> f32 {
        self.x as f32 / self.y.max(1) as f32
    }
}
