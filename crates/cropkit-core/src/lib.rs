//! Cropkit Core - interactive image cropping engine
//!
//! This crate provides the synchronous half of cropkit: crop geometry,
//! rotation/flip transforms, the pan/zoom view matrix, crop session state,
//! decode planning and the result compositor. The async orchestration lives
//! in `cropkit-runtime`.
//!
//! # Coordinate Spaces
//!
//! - **Raw image space**: pixels of the decoded source image
//! - **Transformed-image space**: raw space mapped through [`Transform`];
//!   the crop region lives here
//! - **Screen space**: transformed-image space mapped through [`ViewMatrix`]

pub mod composite;
pub mod config;
pub mod decode;
pub mod encode;
pub mod geometry;
pub mod session;
pub mod shape;
pub mod touch;
pub mod transform;
pub mod view;

pub use composite::{target_size, CompositeError, CompositePlan};
pub use config::CropperConfig;
pub use decode::{
    DecodeError, DecodePlanner, DecodeRequest, DecodeResult, FilterType, ImageDescriptor,
    PlannerConfig, Raster,
};
pub use encode::{encode_jpeg, encode_png, EncodeError};
pub use geometry::{Affine, AspectRatio, IntRect, IntSize, Point, Rect, Size};
pub use session::{CropSession, Decision, SessionError};
pub use shape::CropShape;
pub use touch::DragHandle;
pub use transform::Transform;
pub use view::{FitAnimation, ViewMatrix};
