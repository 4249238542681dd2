//! Decode pipeline for cropping.
//!
//! This module provides:
//! - Request/result types shared with image sources ([`DecodeRequest`],
//!   [`DecodeResult`], [`Raster`])
//! - The decode planner, which turns a viewport and an image-to-view matrix
//!   into a [`DecodeRequest`]
//! - A codec adapter over the `image` crate for region and full decodes
//!
//! # Requests
//!
//! A request names a subset of the raw image (in raw pixel coordinates) and
//! an integer downsample factor. One request *covers* another when it was
//! taken at the same sample size over an equal or larger subset; covered
//! requests never need a fresh decode.
//!
//! # Examples
//!
//! ```ignore
//! use cropkit_core::decode::DecodePlanner;
//! use cropkit_core::geometry::{Affine, IntSize};
//!
//! let planner = DecodePlanner::default();
//! let view = IntSize::new(800, 600);
//! let image = IntSize::new(4000, 3000);
//! let req = planner.plan(view, image, &Affine::scaling(0.2, 0.2)).unwrap();
//! assert_eq!(req.sample_size, 32);
//! ```

mod codec;
mod plan;
mod types;

pub use codec::{decode_full, decode_region, probe_size, sample_raster};
pub use plan::{DecodePlanner, PlannerConfig};
pub use types::{DecodeError, DecodeRequest, DecodeResult, FilterType, ImageDescriptor, Raster};
