//! Rectangle algebra used by the crop region and the decode planner.
//!
//! The crop-specific operations ([`Rect::constrain_offset`],
//! [`Rect::constrain_resize`], [`Rect::resize`], [`Rect::keep_aspect`],
//! [`Rect::scale_to_fit`], [`Rect::set_size`]) are pure functions: they
//! never touch hidden state and always return a new rectangle.

use serde::{Deserialize, Serialize};

use super::{align_down, align_up, approx_eq, AspectRatio, IntSize, Point, Size};

/// An axis-aligned float rectangle stored by its edges.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_origin_size(origin: Point, size: Size) -> Self {
        Self::new(
            origin.x,
            origin.y,
            origin.x + size.width,
            origin.y + size.height,
        )
    }

    /// A rectangle of `size` anchored at the origin.
    pub fn from_size(size: Size) -> Self {
        Self::new(0.0, 0.0, size.width, size.height)
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn size(&self) -> Size {
        Size::new(self.width(), self.height())
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.left, self.top)
    }

    pub fn bottom_right(&self) -> Point {
        Point::new(self.right, self.bottom)
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.left + self.right) / 2.0,
            (self.top + self.bottom) / 2.0,
        )
    }

    pub fn min_dimension(&self) -> f32 {
        self.width().abs().min(self.height().abs())
    }

    /// True when the rectangle has no positive area.
    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    /// Half-open containment: left/top edges are inside, right/bottom are not.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.left && p.x < self.right && p.y >= self.top && p.y < self.bottom
    }

    pub fn approx_eq(&self, other: &Rect) -> bool {
        approx_eq(self.left, other.left)
            && approx_eq(self.top, other.top)
            && approx_eq(self.right, other.right)
            && approx_eq(self.bottom, other.bottom)
    }

    pub fn translate(&self, dx: f32, dy: f32) -> Rect {
        Rect::new(
            self.left + dx,
            self.top + dy,
            self.right + dx,
            self.bottom + dy,
        )
    }

    pub fn translate_by(&self, offset: Point) -> Rect {
        self.translate(offset.x, offset.y)
    }

    pub fn intersect(&self, other: &Rect) -> Rect {
        Rect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        )
    }

    /// Shrink every edge inwards by `delta`.
    pub fn deflate(&self, delta: f32) -> Rect {
        Rect::new(
            self.left + delta,
            self.top + delta,
            self.right - delta,
            self.bottom - delta,
        )
    }

    /// Same size, moved to the origin.
    pub fn at_origin(&self) -> Rect {
        Rect::from_size(self.size())
    }

    /// Absolute position of a relative point (`(0, 0)` = top-left,
    /// `(1, 1)` = bottom-right).
    pub fn abs(&self, rel: Point) -> Point {
        Point::new(
            self.left + rel.x * self.width(),
            self.top + rel.y * self.height(),
        )
    }

    /// Interpolate both corners towards `target`.
    pub fn lerp(&self, target: &Rect, p: f32) -> Rect {
        let tl = self.top_left().lerp(target.top_left(), p);
        let br = self.bottom_right().lerp(target.bottom_right(), p);
        Rect::new(tl.x, tl.y, br.x, br.y)
    }

    pub fn center_in(&self, outer: &Rect) -> Rect {
        let (c, o) = (self.center(), outer.center());
        self.translate(o.x - c.x, o.y - c.y)
    }

    /// Uniformly scale (anchored top-left) so it fits inside `outer`.
    pub fn fit_in(&self, outer: &Rect) -> Rect {
        let factor = (outer.width() / self.width()).min(outer.height() / self.height());
        self.scale(factor, factor)
    }

    /// Scale the size, keeping the top-left corner.
    pub fn scale(&self, sx: f32, sy: f32) -> Rect {
        Rect::from_origin_size(
            self.top_left(),
            Size::new(self.width() * sx, self.height() * sy),
        )
    }

    /// Smallest integer rectangle containing this one.
    pub fn round_out(&self) -> IntRect {
        IntRect::new(
            self.left.floor() as i32,
            self.top.floor() as i32,
            self.right.ceil() as i32,
            self.bottom.ceil() as i32,
        )
    }

    /// Snap edges outwards to a multiple of `alignment`.
    pub fn align(&self, alignment: u32) -> Rect {
        Rect::new(
            align_down(self.left, alignment),
            align_down(self.top, alignment),
            align_up(self.right, alignment),
            align_up(self.bottom, alignment),
        )
    }

    /// Clamp each edge independently to `bounds`. May shrink the rect.
    pub fn constrain_resize(&self, bounds: &Rect) -> Rect {
        Rect::new(
            self.left.max(bounds.left),
            self.top.max(bounds.top),
            self.right.min(bounds.right),
            self.bottom.min(bounds.bottom),
        )
    }

    /// Translate minimally so the rect lies inside `bounds`.
    ///
    /// The size never changes. When the rect is larger than `bounds` along
    /// an axis, it is aligned to the leading edge and overflows only on that
    /// axis.
    pub fn constrain_offset(&self, bounds: &Rect) -> Rect {
        let (mut l, mut t, mut r, mut b) = (self.left, self.top, self.right, self.bottom);
        if r > bounds.right {
            l -= r - bounds.right;
            r = bounds.right;
        }
        if b > bounds.bottom {
            t -= b - bounds.bottom;
            b = bounds.bottom;
        }
        if l < bounds.left {
            r += bounds.left - l;
            l = bounds.left;
        }
        if t < bounds.top {
            b += bounds.top - t;
            t = bounds.top;
        }
        Rect::new(l, t, r, b)
    }

    /// Move the edges selected by `handle` by `delta`.
    ///
    /// `handle` is a relative position on the unit square: `0` selects the
    /// left/top edge, `1` the right/bottom edge, anything else leaves that
    /// axis alone. Crossed edges are swapped so the result stays ordered.
    pub fn resize(&self, handle: Point, delta: Point) -> Rect {
        let (mut l, mut t, mut r, mut b) = (self.left, self.top, self.right, self.bottom);
        if handle.y == 1.0 {
            b += delta.y;
        } else if handle.y == 0.0 {
            t += delta.y;
        }
        if handle.x == 1.0 {
            r += delta.x;
        } else if handle.x == 0.0 {
            l += delta.x;
        }
        if l > r {
            std::mem::swap(&mut l, &mut r);
        }
        if t > b {
            std::mem::swap(&mut t, &mut b);
        }
        Rect::new(l, t, r, b)
    }

    /// Resize to `size`, anchoring on whichever edge moved least relative
    /// to `old` (the edge the user is not dragging stays fixed).
    pub fn set_size(&self, old: &Rect, size: Size) -> Rect {
        let (mut l, mut t, mut r, mut b) = (self.left, self.top, self.right, self.bottom);
        if (old.left - l).abs() < (old.right - r).abs() {
            r = l + size.width;
        } else {
            l = r - size.width;
        }
        if (old.top - t).abs() < (old.bottom - b).abs() {
            b = t + size.height;
        } else {
            t = b - size.height;
        }
        Rect::new(l, t, r, b)
    }

    /// Give the rect `old`'s aspect ratio at equal area.
    pub fn keep_aspect(&self, old: &Rect) -> Rect {
        self.set_size(old, self.size().keep_aspect(old.size()))
    }

    /// Uniformly shrink (anchored via [`Rect::set_size`]) until the rect
    /// fits inside `bounds`. No-op when it already fits or when either
    /// rect is degenerate.
    pub fn scale_to_fit(&self, bounds: &Rect, old: &Rect) -> Rect {
        let (w, h) = (self.width(), self.height());
        if w <= 0.0 || h <= 0.0 || bounds.is_empty() {
            return *self;
        }
        let factor = [
            (bounds.right - self.left) / w,
            (bounds.bottom - self.top) / h,
            (self.right - bounds.left) / w,
            (self.bottom - bounds.top) / h,
        ]
        .into_iter()
        .fold(f32::INFINITY, f32::min);
        if factor >= 1.0 {
            return *self;
        }
        self.set_size(old, self.size() * factor)
    }

    /// Largest rect with the given aspect, centred inside this one.
    pub fn set_aspect(&self, aspect: AspectRatio) -> Rect {
        let dim = self.width().max(self.height());
        Rect::from_size(Size::new(dim * aspect.ratio(), dim))
            .fit_in(self)
            .center_in(self)
    }
}

/// An integer rectangle, exclusive on the right/bottom edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct IntRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl IntRect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Size with negative extents clamped to zero.
    pub fn size(&self) -> IntSize {
        IntSize::new(self.width().max(0) as u32, self.height().max(0) as u32)
    }

    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    pub fn intersect(&self, other: &IntRect) -> IntRect {
        IntRect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        )
    }

    /// Inclusive containment: equal edges count as inside.
    pub fn contains_inclusive(&self, other: &IntRect) -> bool {
        other.left >= self.left
            && other.top >= self.top
            && other.right <= self.right
            && other.bottom <= self.bottom
    }

    pub fn to_rect(&self) -> Rect {
        Rect::new(
            self.left as f32,
            self.top as f32,
            self.right as f32,
            self.bottom as f32,
        )
    }
}


// ============================================================================
// Property-Based Tests
// ============================================================================
