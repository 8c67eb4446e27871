//! Core picking logic for pickscope.
//!
//! This crate holds everything that does not need a GPU:
//! - [`ObjectId`] allocation and the id-to-color encoding used by the id-buffer
//! - The [`Registry`] of pickable objects
//! - The two-level [`AccelerationStructureManager`] and its host traversal
//! - Screen ray generation, pick rectangles, gestures and selection state

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Accessors and constructors don't need must_use
#![allow(clippy::must_use_candidate)]
// Pixel and index math converts between integer and float types throughout
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
// Exact float comparison is intended in tests and for singular matrices
#![allow(clippy::float_cmp)]

pub mod accel;
pub mod error;
pub mod geometry;
pub mod gesture;
pub mod id;
pub mod options;
pub mod pick;
pub mod ray;
pub mod rect;
pub mod registry;
pub mod selection;

pub use accel::{AccelerationStructureManager, FlatAccel, RayHit, NON_PICKABLE};
pub use error::{BuildError, PickError, Result};
pub use geometry::{Geometry, GeometryKey};
pub use gesture::{GestureInterpreter, GestureOutcome, GestureState, Picker};
pub use id::{IdAllocator, ObjectId, MAX_OBJECT_ID};
pub use options::{PickOptions, PointPickMethod};
pub use pick::{
    color_to_index, decode_id, decode_rgba, decode_rgba_region, encode_id, index_to_color, IdColor,
    IdSet, PickResult,
};
pub use ray::{screen_ray, PickCamera, Ray};
pub use rect::PickRect;
pub use registry::{PickableObject, Registry};
pub use selection::{SelectionSet, SelectionState};

// Re-export glam types for convenience
pub use glam::{Mat4, Vec2, Vec3, Vec4};
