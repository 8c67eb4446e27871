//! pickscope: GPU-assisted object picking for 3D scenes.
//!
//! Click to select the object under the pointer, drag to select everything
//! visible inside a rectangle.
//!
//! # Quick Start
//!
//! ```no_run
//! use pickscope::*;
//!
//! fn main() -> Result<()> {
//!     init_logger();
//!
//!     let mut picker = ScenePicker::headless(PickOptions::default(), 800, 600)?;
//!     let sphere = Geometry::uv_sphere(0.5, 16, 24).shared();
//!     let id = picker.add_object(sphere, Mat4::IDENTITY, "Sphere 1")?;
//!     picker.build()?;
//!
//!     let mut session = PickSession::new(picker);
//!     session.on_pointer_down(Vec2::new(400.0, 300.0));
//!     session.on_pointer_up(Vec2::new(400.0, 300.0));
//!     assert!(session.get_selection().contains(&id));
//!     Ok(())
//! }
//! ```
//!
//! # Picking paths
//!
//! - **Ray**: a screen ray traced against a two-level BVH, closest hit wins.
//!   Runs as a compute pass on the GPU, or on the host without one.
//! - **Id-buffer**: objects are drawn in flat colors encoding their
//!   identifiers, then one pixel or a rectangle is read back.

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

mod picker;
mod session;

pub use picker::ScenePicker;
pub use session::PickSession;

// Re-export core types
pub use pickscope_core::{
    decode_id, encode_id, AccelerationStructureManager, BuildError, Geometry, GestureOutcome,
    GestureState, IdColor, IdSet, ObjectId, PickCamera, PickError, PickOptions, PickRect,
    PickResult, Picker, PointPickMethod, Registry, Result, SelectionSet, Mat4, Vec2, Vec3, Vec4,
};

// Re-export render types
pub use pickscope_render::{GpuContext, TargetRole};

/// Installs `env_logger` once; later calls are no-ops. Verbosity follows `RUST_LOG`.
pub fn init_logger() {
    let _ = env_logger::try_init();
}
