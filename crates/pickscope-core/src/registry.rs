//! Scene object registry.
//!
//! A flat table keyed by [`ObjectId`]. Every pickable object has the same
//! shape of data, so there is no per-kind dispatch here.

use std::collections::BTreeMap;
use std::sync::Arc;

use glam::Mat4;

use crate::error::{PickError, Result};
use crate::geometry::Geometry;
use crate::id::{IdAllocator, ObjectId};
use crate::pick::IdSet;

/// A scene object that can be picked.
#[derive(Debug, Clone)]
pub struct PickableObject {
    /// Unique identifier, never `0`.
    pub id: ObjectId,
    /// Shared, read-only geometry.
    pub geometry: Arc<Geometry>,
    /// Object-to-world transform.
    pub transform: Mat4,
    /// Display name.
    pub name: String,
    /// Whether picks may resolve to this object.
    ///
    /// Non-selectable objects still occlude what is behind them.
    pub selectable: bool,
}

/// Registry of all live pickable objects.
#[derive(Debug, Default)]
pub struct Registry {
    objects: BTreeMap<ObjectId, PickableObject>,
    ids: IdAllocator,
}

impl Registry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new selectable object and returns its fresh identifier.
    pub fn insert(
        &mut self,
        geometry: Arc<Geometry>,
        transform: Mat4,
        name: impl Into<String>,
    ) -> Result<ObjectId> {
        let id = self.ids.allocate()?;
        let name = name.into();
        log::debug!("registered object {id} '{name}'");
        self.objects.insert(
            id,
            PickableObject {
                id,
                geometry,
                transform,
                name,
                selectable: true,
            },
        );
        Ok(id)
    }

    /// Gets an object by identifier.
    pub fn get(&self, id: ObjectId) -> Option<&PickableObject> {
        self.objects.get(&id)
    }

    /// Checks whether an identifier belongs to a live object.
    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    /// Finds the first object with the given display name.
    pub fn find_by_name(&self, name: &str) -> Option<&PickableObject> {
        self.objects.values().find(|o| o.name == name)
    }

    /// Replaces an object's world transform.
    pub fn set_transform(&mut self, id: ObjectId, transform: Mat4) -> Result<()> {
        let object = self
            .objects
            .get_mut(&id)
            .ok_or(PickError::ObjectNotFound(id))?;
        object.transform = transform;
        Ok(())
    }

    /// Changes whether an object can be selected.
    pub fn set_selectable(&mut self, id: ObjectId, selectable: bool) -> Result<()> {
        let object = self
            .objects
            .get_mut(&id)
            .ok_or(PickError::ObjectNotFound(id))?;
        object.selectable = selectable;
        Ok(())
    }

    /// Removes an object. Its identifier is never handed out again.
    pub fn remove(&mut self, id: ObjectId) -> Option<PickableObject> {
        let removed = self.objects.remove(&id);
        if removed.is_some() {
            log::debug!("removed object {id}");
        }
        removed
    }

    /// Removes all objects without resetting identifier allocation.
    pub fn clear(&mut self) {
        self.objects.clear();
    }

    /// Returns an iterator over all objects in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &PickableObject> {
        self.objects.values()
    }

    /// Returns the total number of live objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// True when `id` belongs to a live object that picks may resolve to.
    ///
    /// Identifiers decoded from a readback can refer to objects removed after
    /// the render was recorded; those are reported as not pickable, not as
    /// an error.
    pub fn is_pickable(&self, id: ObjectId) -> bool {
        match self.objects.get(&id) {
            Some(object) => object.selectable,
            None => {
                log::debug!("dropping stale identifier {id}");
                false
            }
        }
    }

    /// Keeps only identifiers for which [`Registry::is_pickable`] holds.
    pub fn retain_live(&self, ids: impl IntoIterator<Item = ObjectId>) -> IdSet {
        ids.into_iter().filter(|&id| self.is_pickable(id)).collect()
    }
}
