//! Two-level acceleration structure for ray picking.
//!
//! One bottom-level BVH per distinct geometry, one top-level BVH over the
//! object instances. Objects that share an `Arc<Geometry>` share the
//! bottom-level structure.

mod bvh;
mod flat;

pub use bvh::{build_bvh, Aabb, BvhBuild, GpuBvhNode};
pub use flat::{
    FlatAccel, GpuBlasRange, GpuInstance, GpuTriangle, RayHit, NON_PICKABLE,
    TRAVERSAL_STACK_SIZE,
};

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use glam::Mat4;

use crate::error::{BuildError, PickError, Result};
use crate::geometry::{Geometry, GeometryKey};
use crate::id::ObjectId;
use crate::ray::Ray;

/// Triangles per bottom-level leaf.
const BLAS_LEAF_SIZE: usize = 4;
/// Instances per top-level leaf.
const TLAS_LEAF_SIZE: usize = 2;

/// A built bottom-level structure.
#[derive(Debug)]
struct Blas {
    nodes: Vec<GpuBvhNode>,
    triangles: Vec<GpuTriangle>,
    bounds: Aabb,
}

impl Blas {
    fn build(owner: ObjectId, geometry: &Geometry) -> std::result::Result<Self, BuildError> {
        if geometry.is_empty() {
            return Err(BuildError::EmptyGeometry(owner));
        }
        if let Some(index) = geometry.first_invalid_index() {
            return Err(BuildError::InvalidIndex {
                id: owner,
                index,
                vertex_count: geometry.positions.len(),
            });
        }

        let corners: Vec<[glam::Vec3; 3]> = (0..geometry.triangle_count())
            .filter_map(|i| geometry.triangle(i))
            .collect();
        let bounds: Vec<Aabb> = corners
            .iter()
            .map(|tri| Aabb::from_points(tri.iter().copied()))
            .collect();
        let build = build_bvh(&bounds, BLAS_LEAF_SIZE);
        let triangles = build
            .order
            .iter()
            .map(|&i| GpuTriangle::new(corners[i as usize]))
            .collect();
        let root_bounds = build.nodes.first().map_or_else(Aabb::empty, GpuBvhNode::aabb);

        log::debug!(
            "built bottom-level BVH: {} triangles, {} nodes, depth {}",
            corners.len(),
            build.nodes.len(),
            build.max_depth
        );
        Ok(Self {
            nodes: build.nodes,
            triangles,
            bounds: root_bounds,
        })
    }
}

/// Per-geometry bookkeeping.
#[derive(Debug)]
struct BlasSlot {
    geometry: Arc<Geometry>,
    users: usize,
    built: Option<Arc<Blas>>,
}

/// One object's placement in the top level.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub id: ObjectId,
    pub geometry: GeometryKey,
    /// Object-to-world transform.
    pub transform: Mat4,
    pub selectable: bool,
    /// Changed since the last successful build.
    pub dirty: bool,
}

impl Instance {
    /// Value written into the instance's custom index field.
    pub fn custom_index(&self) -> u32 {
        if self.selectable {
            self.id.get()
        } else {
            NON_PICKABLE
        }
    }
}

/// Owns the acceleration structures and keeps them in sync with the scene.
///
/// Edits mark the structure dirty; [`AccelerationStructureManager::build`]
/// brings it up to date. A failed build leaves ray picking disabled until
/// the next successful one.
#[derive(Debug, Default)]
pub struct AccelerationStructureManager {
    blas: HashMap<GeometryKey, BlasSlot>,
    instances: BTreeMap<ObjectId, Instance>,
    built: Option<FlatAccel>,
    ray_enabled: bool,
    dirty: bool,
    generation: u64,
}

impl AccelerationStructureManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an instance for `id`, replacing any previous one.
    pub fn add_object(
        &mut self,
        id: ObjectId,
        geometry: &Arc<Geometry>,
        transform: Mat4,
        selectable: bool,
    ) {
        if self.instances.contains_key(&id) {
            self.remove_object(id);
        }
        let key = GeometryKey::of(geometry);
        self.blas
            .entry(key)
            .or_insert_with(|| BlasSlot {
                geometry: Arc::clone(geometry),
                users: 0,
                built: None,
            })
            .users += 1;
        self.instances.insert(
            id,
            Instance {
                id,
                geometry: key,
                transform,
                selectable,
                dirty: true,
            },
        );
        self.dirty = true;
    }

    /// Replaces an instance's world transform.
    pub fn update_transform(&mut self, id: ObjectId, transform: Mat4) -> Result<()> {
        let instance = self
            .instances
            .get_mut(&id)
            .ok_or(PickError::ObjectNotFound(id))?;
        instance.transform = transform;
        instance.dirty = true;
        self.dirty = true;
        Ok(())
    }

    pub fn set_selectable(&mut self, id: ObjectId, selectable: bool) -> Result<()> {
        let instance = self
            .instances
            .get_mut(&id)
            .ok_or(PickError::ObjectNotFound(id))?;
        if instance.selectable != selectable {
            instance.selectable = selectable;
            instance.dirty = true;
            self.dirty = true;
        }
        Ok(())
    }

    /// Removes an instance. The bottom level is released with its last user.
    pub fn remove_object(&mut self, id: ObjectId) -> bool {
        let Some(instance) = self.instances.remove(&id) else {
            return false;
        };
        if let Some(slot) = self.blas.get_mut(&instance.geometry) {
            slot.users -= 1;
            if slot.users == 0 {
                self.blas.remove(&instance.geometry);
            }
        }
        self.dirty = true;
        true
    }

    /// Removes every instance.
    pub fn clear(&mut self) {
        self.instances.clear();
        self.blas.clear();
        self.dirty = true;
    }

    /// Rebuilds missing bottom levels and the whole top level.
    ///
    /// On error the previous structure is kept but not used: ray picking is
    /// disabled until a later build succeeds.
    pub fn build(&mut self) -> std::result::Result<(), BuildError> {
        match self.try_build() {
            Ok(flat) => {
                log::info!(
                    "acceleration structure built: {} instances, {} geometries, {} triangles",
                    flat.instances.len(),
                    flat.blas_ranges.len(),
                    flat.triangles.len()
                );
                self.built = Some(flat);
                self.ray_enabled = true;
                self.dirty = false;
                self.generation += 1;
                for instance in self.instances.values_mut() {
                    instance.dirty = false;
                }
                Ok(())
            }
            Err(err) => {
                log::warn!("acceleration structure build failed, ray picking disabled: {err}");
                self.ray_enabled = false;
                Err(err)
            }
        }
    }

    fn try_build(&mut self) -> std::result::Result<FlatAccel, BuildError> {
        for instance in self.instances.values() {
            if !instance.transform.is_finite() || instance.transform.determinant() == 0.0 {
                return Err(BuildError::NonFiniteTransform(instance.id));
            }
        }

        // Bottom levels are cached across builds; only new geometry is built
        for instance in self.instances.values() {
            let Some(slot) = self.blas.get_mut(&instance.geometry) else {
                continue;
            };
            if slot.built.is_none() {
                slot.built = Some(Arc::new(Blas::build(instance.id, &slot.geometry)?));
            }
        }

        let mut flat = FlatAccel::default();
        let mut blas_index: HashMap<GeometryKey, u32> = HashMap::with_capacity(self.blas.len());
        let mut blas_bounds = Vec::with_capacity(self.blas.len());
        let mut slots: Vec<_> = self.blas.iter().collect();
        slots.sort_by_key(|(key, _)| **key);
        for (key, slot) in slots {
            let Some(blas) = slot.built.as_ref() else {
                continue;
            };
            blas_index.insert(*key, flat.blas_ranges.len() as u32);
            flat.blas_ranges.push(GpuBlasRange {
                node_offset: flat.blas_nodes.len() as u32,
                node_count: blas.nodes.len() as u32,
                triangle_offset: flat.triangles.len() as u32,
                triangle_count: blas.triangles.len() as u32,
            });
            flat.blas_nodes.extend_from_slice(&blas.nodes);
            flat.triangles.extend_from_slice(&blas.triangles);
            blas_bounds.push(blas.bounds);
        }

        let mut gpu_instances = Vec::with_capacity(self.instances.len());
        let mut world_bounds = Vec::with_capacity(self.instances.len());
        for instance in self.instances.values() {
            let Some(&index) = blas_index.get(&instance.geometry) else {
                continue;
            };
            let local = blas_bounds[index as usize];
            world_bounds.push(Aabb::from_points(
                local
                    .corners()
                    .into_iter()
                    .map(|c| instance.transform.transform_point3(c)),
            ));
            gpu_instances.push(GpuInstance {
                world_to_object: instance.transform.inverse().to_cols_array_2d(),
                custom_index: instance.custom_index(),
                blas_index: index,
                _padding: [0; 2],
            });
        }

        let tlas = build_bvh(&world_bounds, TLAS_LEAF_SIZE);
        flat.instances = tlas
            .order
            .iter()
            .map(|&i| gpu_instances[i as usize])
            .collect();
        flat.tlas_nodes = tlas.nodes;
        Ok(flat)
    }

    /// Traces a ray against the last successful build.
    ///
    /// Returns `None` while ray picking is disabled.
    pub fn trace(&self, ray: &Ray, t_min: f32, t_max: f32) -> Option<RayHit> {
        if !self.ray_enabled {
            return None;
        }
        self.built.as_ref()?.trace(ray, t_min, t_max)
    }

    /// The last successfully built structure, if ray picking is enabled.
    pub fn flat(&self) -> Option<&FlatAccel> {
        self.built.as_ref().filter(|_| self.ray_enabled)
    }

    /// Incremented after every successful build.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_ray_enabled(&self) -> bool {
        self.ray_enabled
    }

    /// True when edits happened since the last successful build.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn instance(&self, id: ObjectId) -> Option<&Instance> {
        self.instances.get(&id)
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Number of distinct geometries in use.
    pub fn geometry_count(&self) -> usize {
        self.blas.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn id(raw: u32) -> ObjectId {
        ObjectId::new(raw).unwrap()
    }

    fn forward_ray() -> Ray {
        Ray::new(Vec3::ZERO, Vec3::NEG_Z)
    }

    fn quad() -> Arc<Geometry> {
        Geometry::new(
            vec![
                Vec3::new(-1.0, -1.0, 0.0),
                Vec3::new(1.0, -1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(-1.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
        .shared()
    }

    fn at_depth(z: f32) -> Mat4 {
        Mat4::from_translation(Vec3::new(0.0, 0.0, -z))
    }

    #[test]
    fn test_nearest_wins() {
        let geometry = quad();
        let mut accel = AccelerationStructureManager::new();
        // Insert the far one first so insertion order cannot decide
        accel.add_object(id(2), &geometry, at_depth(10.0), true);
        accel.add_object(id(1), &geometry, at_depth(5.0), true);
        accel.build().unwrap();

        let hit = accel.trace(&forward_ray(), 0.001, 10_000.0).unwrap();
        assert_eq!(hit.custom_index, 1);
        assert!((hit.t - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_interval_respected() {
        let mut accel = AccelerationStructureManager::new();
        accel.add_object(id(1), &quad(), at_depth(5.0), true);
        accel.build().unwrap();
        assert!(accel.trace(&forward_ray(), 0.001, 4.0).is_none());
        assert!(accel.trace(&forward_ray(), 6.0, 100.0).is_none());
    }

    #[test]
    fn test_removal_after_rebuild() {
        let geometry = quad();
        let mut accel = AccelerationStructureManager::new();
        accel.add_object(id(1), &geometry, at_depth(5.0), true);
        accel.add_object(id(2), &geometry, at_depth(10.0), true);
        accel.build().unwrap();

        assert!(accel.remove_object(id(1)));
        assert!(accel.is_dirty());
        accel.build().unwrap();
        let hit = accel.trace(&forward_ray(), 0.001, 10_000.0).unwrap();
        assert_eq!(hit.custom_index, 2);

        accel.remove_object(id(2));
        accel.build().unwrap();
        assert!(accel.trace(&forward_ray(), 0.001, 10_000.0).is_none());
        assert_eq!(accel.geometry_count(), 0);
    }

    #[test]
    fn test_transform_update() {
        let mut accel = AccelerationStructureManager::new();
        accel.add_object(id(1), &quad(), at_depth(5.0), true);
        accel.build().unwrap();
        let generation = accel.generation();

        accel
            .update_transform(id(1), Mat4::from_translation(Vec3::new(5.0, 0.0, -5.0)))
            .unwrap();
        assert!(accel.instance(id(1)).unwrap().dirty);
        accel.build().unwrap();
        assert!(accel.generation() > generation);
        assert!(!accel.instance(id(1)).unwrap().dirty);
        assert!(accel.trace(&forward_ray(), 0.001, 10_000.0).is_none());

        assert!(matches!(
            accel.update_transform(id(9), Mat4::IDENTITY),
            Err(PickError::ObjectNotFound(_))
        ));
    }

    #[test]
    fn test_scaled_instance_reports_world_distance() {
        let mut accel = AccelerationStructureManager::new();
        let transform = Mat4::from_translation(Vec3::new(0.0, 0.0, -8.0))
            * Mat4::from_scale(Vec3::splat(3.0));
        accel.add_object(id(1), &quad(), transform, true);
        accel.build().unwrap();
        let hit = accel.trace(&forward_ray(), 0.001, 100.0).unwrap();
        assert!((hit.t - 8.0).abs() < 1e-4);
    }

    #[test]
    fn test_non_selectable_occludes() {
        let geometry = quad();
        let mut accel = AccelerationStructureManager::new();
        accel.add_object(id(1), &geometry, at_depth(5.0), false);
        accel.add_object(id(2), &geometry, at_depth(10.0), true);
        accel.build().unwrap();

        let hit = accel.trace(&forward_ray(), 0.001, 100.0).unwrap();
        assert_eq!(hit.custom_index, NON_PICKABLE);
        assert!(!hit.is_pickable());

        accel.set_selectable(id(1), true).unwrap();
        assert!(accel.is_dirty());
        accel.build().unwrap();
        assert_eq!(accel.trace(&forward_ray(), 0.001, 100.0).unwrap().custom_index, 1);
    }

    #[test]
    fn test_shared_geometry_builds_once() {
        let geometry = Geometry::uv_sphere(0.5, 8, 8).shared();
        let mut accel = AccelerationStructureManager::new();
        for i in 1..=10 {
            let t = Mat4::from_translation(Vec3::new(i as f32 * 2.0, 0.0, -5.0));
            accel.add_object(id(i), &geometry, t, true);
        }
        accel.build().unwrap();
        assert_eq!(accel.geometry_count(), 1);
        let flat = accel.flat().unwrap();
        assert_eq!(flat.blas_ranges.len(), 1);
        assert_eq!(flat.instances.len(), 10);
        assert_eq!(flat.triangles.len(), geometry.triangle_count());
    }

    #[test]
    fn test_failed_build_disables_ray_picking() {
        let mut accel = AccelerationStructureManager::new();
        accel.add_object(id(1), &quad(), at_depth(5.0), true);
        accel.build().unwrap();
        assert!(accel.trace(&forward_ray(), 0.001, 100.0).is_some());

        accel.add_object(id(2), &Geometry::default().shared(), Mat4::IDENTITY, true);
        assert_eq!(accel.build(), Err(BuildError::EmptyGeometry(id(2))));
        assert!(!accel.is_ray_enabled());
        assert!(accel.trace(&forward_ray(), 0.001, 100.0).is_none());
        assert!(accel.flat().is_none());

        accel.remove_object(id(2));
        accel.build().unwrap();
        assert!(accel.is_ray_enabled());
    }

    #[test]
    fn test_invalid_transform_and_indices() {
        let mut accel = AccelerationStructureManager::new();
        accel.add_object(id(1), &quad(), Mat4::from_scale(Vec3::ZERO), true);
        assert_eq!(accel.build(), Err(BuildError::NonFiniteTransform(id(1))));

        let mut accel = AccelerationStructureManager::new();
        let broken = Geometry::new(vec![Vec3::ZERO], vec![[0, 0, 5]]).shared();
        accel.add_object(id(3), &broken, Mat4::IDENTITY, true);
        assert!(matches!(
            accel.build(),
            Err(BuildError::InvalidIndex { index: 5, .. })
        ));
    }

    #[test]
    fn test_empty_scene_misses() {
        let mut accel = AccelerationStructureManager::new();
        accel.build().unwrap();
        assert!(accel.is_ray_enabled());
        assert!(accel.trace(&forward_ray(), 0.001, 100.0).is_none());
    }

    #[test]
    fn test_many_instances_match_brute_force() {
        let geometry = Geometry::cube(0.4).shared();
        let mut accel = AccelerationStructureManager::new();
        let mut placements = Vec::new();
        for i in 0..64u32 {
            let depth = ((i * 13) % 17) as f32 + 3.0;
            let p = Vec3::new((i % 8) as f32 - 3.5, (i / 8) as f32 - 3.5, -depth);
            accel.add_object(id(i + 1), &geometry, Mat4::from_translation(p), true);
            placements.push((i + 1, p));
        }
        accel.build().unwrap();

        for sx in -4..=4 {
            for sy in -4..=4 {
                let target = Vec3::new(sx as f32 * 0.9, sy as f32 * 0.9, -10.0);
                let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), (target - Vec3::new(0.0, 0.0, 5.0)).normalize());
                let expected = placements
                    .iter()
                    .filter_map(|&(raw, p)| {
                        let local = ray.transformed(&Mat4::from_translation(-p));
                        (0..geometry.triangle_count())
                            .filter_map(|t| {
                                crate::ray::intersect_triangle(&local, geometry.triangle(t)?, 0.001, 1000.0)
                            })
                            .reduce(f32::min)
                            .map(|t| (raw, t))
                    })
                    .min_by(|a, b| a.1.total_cmp(&b.1));
                let got = accel.trace(&ray, 0.001, 1000.0).map(|h| (h.custom_index, h.t));
                match (expected, got) {
                    (None, None) => {}
                    (Some((_, te)), Some((_, tg))) => assert!((te - tg).abs() < 1e-4),
                    other => panic!("mismatch: {other:?}"),
                }
            }
        }
    }
}
