//! Configuration options for picking.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Which path answers single-point picks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PointPickMethod {
    /// Trace a ray against the acceleration structure.
    Ray,
    /// Read one pixel of the id-buffer.
    #[default]
    IdBuffer,
}

/// Picking configuration.
///
/// Missing fields take their defaults when loading from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickOptions {
    /// Pointer travel in pixels below which a gesture is a click.
    pub drag_threshold: f32,

    /// Lower bound of the ray interval.
    pub t_min: f32,

    /// Upper bound of the ray interval.
    pub t_max: f32,

    /// Longest wait for GPU completion before a pick is abandoned.
    pub readback_timeout_ms: u64,

    /// Rectangles narrower or shorter than this are answered as point picks.
    pub min_region_extent: u32,

    /// Point pick path.
    pub point_pick_method: PointPickMethod,

    /// Rebuild a dirty acceleration structure before a ray pick.
    pub build_on_pick: bool,
}

impl Default for PickOptions {
    fn default() -> Self {
        Self {
            drag_threshold: 3.0,
            t_min: 0.001,
            t_max: 10_000.0,
            readback_timeout_ms: 2000,
            min_region_extent: 2,
            point_pick_method: PointPickMethod::IdBuffer,
            build_on_pick: true,
        }
    }
}

impl PickOptions {
    pub fn readback_timeout(&self) -> Duration {
        Duration::from_millis(self.readback_timeout_ms)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
