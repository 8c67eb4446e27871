//! GPU backend for pickscope.
//!
//! This crate provides the wgpu side of picking:
//! - [`GpuContext`] device ownership, headless or shared with an application
//! - [`IdBufferRenderer`] for color-coded point and region picks
//! - [`RayPickPass`] for compute-shader ray picks
//! - Bounded-wait readback helpers

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
// Pixel math converts between integer and float types throughout
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::float_cmp)]

pub mod buffer;
pub mod context;
pub mod error;
pub mod id_buffer;
pub mod pick;
pub mod ray_pick;
pub mod readback;

pub use context::GpuContext;
pub use error::{RenderError, RenderResult};
pub use id_buffer::{IdBufferRenderer, IdDrawItem, TargetRole, ID_COLOR_FORMAT, ID_DEPTH_FORMAT};
pub use pick::{GpuRayHit, ObjectPickUniforms, PickCameraUniforms, RayPickUniforms};
pub use ray_pick::RayPickPass;
pub use readback::{align_bytes_per_row, map_read, wait_for_submission};
