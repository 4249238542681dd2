//! Cropkit Runtime - async orchestration for cropkit
//!
//! Built on Tokio. Provides:
//! - [`ImageSource`] adapters for files, in-memory bytes and decoded rasters
//! - [`ProgressiveLoader`]: coarse preview first, debounced finer decodes after
//! - [`ViewAnimator`]: cancellable animated fits of the view matrix
//! - [`create_result`]: decode and composite the final crop
//! - [`ImageCropper`]: one crop flow at a time, from source to result
//!
//! Blocking decode and render work runs on Tokio's blocking pool.

pub mod animation;
pub mod cropper;
pub mod loader;
pub mod result;
pub mod source;

pub use animation::{animate_transform, AnimationTiming, ViewAnimator};
pub use cropper::{CropOutcome, ImageCropper, LoadingStatus, SessionHandle};
pub use loader::{Displayed, ProgressiveLoader};
pub use result::{create_result, render_result};
pub use source::{
    BytesStream, DecodeFuture, FileStream, ImageSource, ImageStream, RasterImageSource,
    StreamImageSource,
};
