//! Object identifiers and their allocation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PickError, Result};

/// Largest identifier that fits the 24-bit color encoding.
pub const MAX_OBJECT_ID: u32 = 0x00FF_FFFF;

/// Identifier of a pickable object.
///
/// Always in `[1, MAX_OBJECT_ID]`. Zero is reserved for "no object" and can
/// never be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct ObjectId(u32);

impl ObjectId {
    /// Wraps a raw value, rejecting `0` and anything wider than 24 bits.
    #[must_use]
    pub const fn new(raw: u32) -> Option<Self> {
        if raw == 0 || raw > MAX_OBJECT_ID {
            None
        } else {
            Some(Self(raw))
        }
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl TryFrom<u32> for ObjectId {
    type Error = String;

    fn try_from(raw: u32) -> std::result::Result<Self, Self::Error> {
        Self::new(raw).ok_or_else(|| format!("object id {raw} outside [1, {MAX_OBJECT_ID}]"))
    }
}

impl From<ObjectId> for u32 {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

/// Hands out identifiers in increasing order and never reuses one.
///
/// Removing an object does not return its identifier to the pool, so a stale
/// id-buffer pixel or instance index can never alias a newer object.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: u32,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl IdAllocator {
    /// Creates an allocator starting at identifier 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next fresh identifier.
    pub fn allocate(&mut self) -> Result<ObjectId> {
        let id = ObjectId::new(self.next).ok_or(PickError::IdSpaceExhausted)?;
        self.next += 1;
        Ok(id)
    }

    /// Number of identifiers handed out so far.
    pub fn allocated(&self) -> u32 {
        self.next - 1
    }
}
