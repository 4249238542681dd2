//! Picking and dragging crop handles.
//!
//! Handles are relative positions on the region's unit square. A drag is
//! tracked in transformed-image space: screen positions are mapped through
//! the inverse view matrix, and the touch radius (given in screen pixels) is
//! divided by the view scale so it stays the same size on screen at any
//! zoom.

use crate::geometry::{Point, Rect};
use crate::view::ViewMatrix;

/// Dragging inside the region moves it instead of resizing.
pub const MOVE_HANDLE: Point = Point::new(0.5, 0.5);

/// Corner handles.
pub const MAIN_HANDLES: [Point; 4] = [
    Point::new(0.0, 0.0),
    Point::new(1.0, 1.0),
    Point::new(1.0, 0.0),
    Point::new(0.0, 1.0),
];

/// Edge midpoint handles.
pub const SECONDARY_HANDLES: [Point; 4] = [
    Point::new(0.5, 0.0),
    Point::new(1.0, 0.5),
    Point::new(0.5, 1.0),
    Point::new(0.0, 0.5),
];

/// Active handle set.
pub fn handles(secondary: bool) -> Vec<Point> {
    let mut out = MAIN_HANDLES.to_vec();
    if secondary {
        out.extend_from_slice(&SECONDARY_HANDLES);
    }
    out
}

/// First handle within `radius_sq` of `pos`, else [`MOVE_HANDLE`] when
/// `pos` is inside `region`.
pub fn find_handle(handles: &[Point], region: &Rect, pos: Point, radius_sq: f32) -> Option<Point> {
    handles
        .iter()
        .copied()
        .find(|h| region.abs(*h).distance_squared(pos) <= radius_sq)
        .or_else(|| region.contains(pos).then_some(MOVE_HANDLE))
}

/// An in-progress drag of one handle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragHandle {
    pub handle: Point,
    pub initial_pos: Point,
    pub initial_region: Rect,
}

impl DragHandle {
    /// Start a drag at `screen_pos`, if it hits a handle or the region.
    pub fn begin(
        handles: &[Point],
        region: &Rect,
        screen_pos: Point,
        view: &ViewMatrix,
        touch_radius: f32,
    ) -> Option<DragHandle> {
        let local = view.inverse().map_point(screen_pos);
        let scale = view.scale().abs().max(f32::MIN_POSITIVE);
        let radius = touch_radius / scale;
        let handle = find_handle(handles, region, local, radius * radius)?;
        Some(DragHandle {
            handle,
            initial_pos: local,
            initial_region: *region,
        })
    }

    /// The region after dragging to `screen_pos`. Movement snaps to whole
    /// pixels.
    pub fn drag_to(&self, screen_pos: Point, view: &ViewMatrix) -> Rect {
        let local = view.inverse().map_point(screen_pos);
        let delta = (local - self.initial_pos).round();
        if self.handle == MOVE_HANDLE {
            self.initial_region.translate_by(delta)
        } else {
            self.initial_region.resize(self.handle, delta)
        }
    }
}
