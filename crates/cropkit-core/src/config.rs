//! Cropper configuration.
//!
//! Every field has a default, so hosts can store a partial JSON object and
//! load it with [`CropperConfig::from_json`].

use serde::{Deserialize, Serialize};

use crate::decode::{FilterType, PlannerConfig};
use crate::geometry::{AspectRatio, IntSize};
use crate::shape::CropShape;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropperConfig {
    /// Upper bound on the result raster; `None` keeps the region's size.
    pub max_result_size: Option<IntSize>,
    pub planner: PlannerConfig,
    /// Debounce before an enhanced decode, and hold before auto-zoom after
    /// a drag ends.
    pub settle_delay_ms: u64,
    pub fit_animation_ms: u64,
    pub frame_interval_ms: u64,
    /// Handle hit radius in screen pixels.
    pub touch_radius: f32,
    /// Also offer edge-midpoint handles.
    pub secondary_handles: bool,
    /// Re-frame the view around the region after each drag.
    pub auto_zoom: bool,
    pub aspects: Vec<AspectRatio>,
    pub shapes: Vec<CropShape>,
    /// Filter for downsampled decodes.
    pub downsample_filter: FilterType,
}

impl Default for CropperConfig {
    fn default() -> Self {
        Self {
            max_result_size: Some(IntSize::new(3000, 3000)),
            planner: PlannerConfig::default(),
            settle_delay_ms: 500,
            fit_animation_ms: 300,
            frame_interval_ms: 16,
            touch_radius: 20.0,
            secondary_handles: true,
            auto_zoom: true,
            aspects: vec![
                AspectRatio::new(1, 1),
                AspectRatio::new(16, 9),
                AspectRatio::new(4, 3),
            ],
            shapes: CropShape::defaults(),
            downsample_filter: FilterType::default(),
        }
    }
}

impl CropperConfig {
    /// Parse a (possibly partial) JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
