//! Decode planning: which subset of the raw image to decode, and at what
//! downsample factor, for a viewport looking at the image through an
//! arbitrary affine matrix.
//!
//! # Alignment
//!
//! The subset sent to the codec is snapped outwards to a block grid so that
//! small viewport moves keep producing the same request. The sample size is
//! measured on the unaligned subset, so the snapping never makes sampling
//! coarser than the view needs.

use serde::{Deserialize, Serialize};

use super::DecodeRequest;
use crate::geometry::{Affine, IntSize};

/// Tuning knobs for [`DecodePlanner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Grid, in raw image pixels, that decode subsets are snapped to.
    pub block_size: u32,
    /// Largest downsample factor ever requested.
    pub max_sample_size: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            block_size: 128,
            max_sample_size: 32,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodePlanner {
    config: PlannerConfig,
}

impl DecodePlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> PlannerConfig {
        self.config
    }

    /// Compute the decode request for a `view`-sized viewport showing an
    /// `image`-sized raw image through `image_to_view`.
    ///
    /// # Returns
    ///
    /// `None` when the viewport is empty, the matrix is not invertible, or
    /// the viewport does not overlap the image at all.
    pub fn plan(
        &self,
        view: IntSize,
        image: IntSize,
        image_to_view: &Affine,
    ) -> Option<DecodeRequest> {
        if view.is_empty() {
            return None;
        }
        let view_to_image = image_to_view.invert()?;
        let visible = view_to_image.map_rect(&view.to_rect());
        let image_rect = image.to_int_rect();

        let subset = visible
            .align(self.config.block_size)
            .round_out()
            .intersect(&image_rect);
        if subset.is_empty() {
            return None;
        }
        let exact = visible.round_out().intersect(&image_rect);
        let sample_size = self.sample_size_for(exact.size(), view);
        Some(DecodeRequest::new(sample_size, subset))
    }

    /// Downsample factor for showing `region` raw pixels on `view` screen
    /// pixels: the area ratio clamped to `[1, max_sample_size]` and rounded
    /// to the nearest power of two.
    pub fn sample_size_for(&self, region: IntSize, view: IntSize) -> u32 {
        let max = self.config.max_sample_size.max(1);
        let view_area = view.area();
        if view_area <= 0.0 {
            return 1;
        }
        let ratio = (region.area() / view_area).clamp(1.0, max as f64);
        let exponent = ratio.log2().round() as u32;
        2u32.saturating_pow(exponent).clamp(1, max)
    }
}


// ============================================================================
// Property-Based Tests
// ============================================================================
