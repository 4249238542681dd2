//! Crop shapes used to mask the final raster.
//!
//! A shape is evaluated against a rectangle: the shape is stretched to fill
//! that rectangle, and [`CropShape::coverage`] reports how much of a pixel
//! lies inside it.

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect};

/// Outline of a star on a 32×32 design grid.
const STAR_POINTS: [(f32, f32); 10] = [
    (31.95, 12.418_856),
    (20.632_89, 11.223_692),
    (16.0, 0.832_288_56),
    (11.367_113, 11.223_692),
    (0.050_000_03, 12.418_856),
    (8.503_064, 20.037_48),
    (6.143_160_3, 31.167_711),
    (16.0, 25.483_08),
    (25.856_84, 31.167_711),
    (23.496_937, 20.037_48),
];

/// Samples per axis when measuring pixel coverage.
const COVERAGE_SAMPLES: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CropShape {
    #[default]
    Rect,
    Circle,
    /// Rectangle with rounded corners; radius is a percentage of the
    /// shorter side.
    RoundRect { corners_percent: u8 },
    Triangle,
    Star,
}

impl CropShape {
    /// Every built-in shape, in display order.
    pub fn defaults() -> Vec<CropShape> {
        vec![
            CropShape::Rect,
            CropShape::Circle,
            CropShape::RoundRect {
                corners_percent: 15,
            },
            CropShape::Star,
            CropShape::Triangle,
        ]
    }

    /// Whether `p` lies inside the shape stretched over `rect`.
    pub fn contains(&self, rect: &Rect, p: Point) -> bool {
        match self {
            CropShape::Rect => {
                p.x >= rect.left && p.x <= rect.right && p.y >= rect.top && p.y <= rect.bottom
            }
            CropShape::Circle => {
                let c = rect.center();
                let (rx, ry) = (rect.width() / 2.0, rect.height() / 2.0);
                if rx <= 0.0 || ry <= 0.0 {
                    return false;
                }
                let (dx, dy) = ((p.x - c.x) / rx, (p.y - c.y) / ry);
                dx * dx + dy * dy <= 1.0
            }
            CropShape::RoundRect { corners_percent } => {
                round_rect_contains(rect, *corners_percent, p)
            }
            CropShape::Triangle => {
                let apex = Point::new(rect.center().x, rect.top);
                let corners = [
                    Point::new(rect.left, rect.bottom),
                    apex,
                    Point::new(rect.right, rect.bottom),
                ];
                polygon_contains(&corners, p)
            }
            CropShape::Star => {
                let (sx, sy) = (rect.width() / 32.0, rect.height() / 32.0);
                let points = STAR_POINTS
                    .map(|(x, y)| Point::new(rect.left + x * sx, rect.top + y * sy));
                polygon_contains(&points, p)
            }
        }
    }

    /// Fraction in `[0, 1]` of the unit pixel at `(x, y)` covered by the
    /// shape stretched over `rect`.
    pub fn coverage(&self, rect: &Rect, x: u32, y: u32) -> f32 {
        let (px, py) = (x as f32, y as f32);
        // Whole pixel inside a rectangle: skip sampling
        if *self == CropShape::Rect
            && px >= rect.left
            && py >= rect.top
            && px + 1.0 <= rect.right
            && py + 1.0 <= rect.bottom
        {
            return 1.0;
        }
        let n = COVERAGE_SAMPLES;
        let mut inside = 0u32;
        for sy in 0..n {
            for sx in 0..n {
                let p = Point::new(
                    px + (sx as f32 + 0.5) / n as f32,
                    py + (sy as f32 + 0.5) / n as f32,
                );
                if self.contains(rect, p) {
                    inside += 1;
                }
            }
        }
        inside as f32 / (n * n) as f32
    }
}

fn round_rect_contains(rect: &Rect, corners_percent: u8, p: Point) -> bool {
    if p.x < rect.left || p.x > rect.right || p.y < rect.top || p.y > rect.bottom {
        return false;
    }
    let radius = (rect.min_dimension() * corners_percent as f32 / 100.0)
        .min(rect.width() / 2.0)
        .min(rect.height() / 2.0);
    if radius <= 0.0 {
        return true;
    }
    // Nearest corner circle centre, clamped into the inner rectangle
    let cx = p.x.clamp(rect.left + radius, rect.right - radius);
    let cy = p.y.clamp(rect.top + radius, rect.bottom - radius);
    p.distance_squared(Point::new(cx, cy)) <= radius * radius
}

/// Even-odd point-in-polygon test.
fn polygon_contains(points: &[Point], p: Point) -> bool {
    let mut inside = false;
    let mut j = points.len() - 1;
    for i in 0..points.len() {
        let (a, b) = (points[i], points[j]);
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}
