//! Error types for pickscope.

use std::time::Duration;

use thiserror::Error;

use crate::id::ObjectId;

/// Failure while (re)building the acceleration structure.
///
/// The manager keeps its last valid structure when a build fails, but ray
/// picking stays disabled until a later build succeeds.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    /// The geometry referenced by an object has no vertices or no triangles.
    #[error("object {0} references empty geometry")]
    EmptyGeometry(ObjectId),

    /// A triangle index points past the end of the vertex array.
    #[error("object {id} geometry has index {index} but only {vertex_count} vertices")]
    InvalidIndex {
        id: ObjectId,
        index: u32,
        vertex_count: usize,
    },

    /// The object transform contains NaN or infinite values, or is singular.
    #[error("object {0} has a non-finite or singular transform")]
    NonFiniteTransform(ObjectId),
}

/// The main error type for pickscope operations.
#[derive(Error, Debug)]
pub enum PickError {
    /// No live object carries the given identifier.
    #[error("object {0} not found")]
    ObjectNotFound(ObjectId),

    /// All 2^24 - 1 identifiers have been handed out in this session.
    #[error("object identifier space exhausted")]
    IdSpaceExhausted,

    /// Acceleration structure build failed.
    #[error("acceleration structure build failed: {0}")]
    Build(#[from] BuildError),

    /// The GPU did not signal completion within the configured bound.
    #[error("readback timed out after {0:?}")]
    ReadbackTimeout(Duration),

    /// The operation needs a GPU backend but the picker was created without one.
    #[error("GPU backend not available")]
    GpuUnavailable,

    /// Zero-sized viewport.
    #[error("invalid viewport {width}x{height}")]
    InvalidViewport { width: u32, height: u32 },

    /// Rendering error.
    #[error("render error: {0}")]
    Render(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for pickscope operations.
pub type Result<T> = std::result::Result<T, PickError>;
