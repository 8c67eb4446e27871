//! Flattened two-level acceleration structure.
//!
//! These are the exact buffers uploaded for the compute ray pick, and
//! [`FlatAccel::trace`] walks them the same way `ray_pick.wgsl` does.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use super::bvh::GpuBvhNode;
use crate::ray::{intersect_aabb, intersect_triangle, Ray};

/// Custom index given to instances that occlude but never resolve a pick.
pub const NON_PICKABLE: u32 = u32::MAX;

/// Traversal stack depth shared with the shader.
pub const TRAVERSAL_STACK_SIZE: usize = 64;

/// Object-space triangle (48 bytes, `w` unused).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuTriangle {
    pub v0: [f32; 4],
    pub v1: [f32; 4],
    pub v2: [f32; 4],
}

impl GpuTriangle {
    pub fn new(tri: [glam::Vec3; 3]) -> Self {
        Self {
            v0: tri[0].extend(0.0).to_array(),
            v1: tri[1].extend(0.0).to_array(),
            v2: tri[2].extend(0.0).to_array(),
        }
    }

    pub fn corners(&self) -> [glam::Vec3; 3] {
        [
            glam::Vec4::from_array(self.v0).truncate(),
            glam::Vec4::from_array(self.v1).truncate(),
            glam::Vec4::from_array(self.v2).truncate(),
        ]
    }
}

/// Where one bottom-level structure lives in the shared node and triangle
/// arrays. Node children and leaf ranges are relative to these offsets.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct GpuBlasRange {
    pub node_offset: u32,
    pub node_count: u32,
    pub triangle_offset: u32,
    pub triangle_count: u32,
}

/// Top-level instance (80 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[allow(clippy::pub_underscore_fields)]
pub struct GpuInstance {
    /// Inverse of the object-to-world transform, column major.
    pub world_to_object: [[f32; 4]; 4],
    /// Object identifier, or [`NON_PICKABLE`].
    pub custom_index: u32,
    pub blas_index: u32,
    pub _padding: [u32; 2],
}

const _: () = assert!(std::mem::size_of::<GpuInstance>() == 80);

impl GpuInstance {
    pub fn world_to_object(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.world_to_object)
    }
}

/// Closest hit found by a trace.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Custom index of the hit instance; may be [`NON_PICKABLE`].
    pub custom_index: u32,
    /// Ray parameter of the hit.
    pub t: f32,
    /// Index into [`FlatAccel::instances`].
    pub instance: u32,
}

impl RayHit {
    /// True if the hit object may be reported.
    pub fn is_pickable(&self) -> bool {
        self.custom_index != NON_PICKABLE
    }
}

/// A built acceleration structure in upload layout.
#[derive(Debug, Clone, Default)]
pub struct FlatAccel {
    /// Top-level nodes over instances; leaf ranges index `instances`.
    pub tlas_nodes: Vec<GpuBvhNode>,
    /// Instances in top-level leaf order.
    pub instances: Vec<GpuInstance>,
    /// All bottom-level nodes, concatenated.
    pub blas_nodes: Vec<GpuBvhNode>,
    /// All bottom-level triangles, concatenated in leaf order.
    pub triangles: Vec<GpuTriangle>,
    pub blas_ranges: Vec<GpuBlasRange>,
}

impl FlatAccel {
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Finds the closest hit with `t` in `[t_min, t_max]`.
    ///
    /// Every candidate tightens the upper bound, so the result does not depend
    /// on traversal order.
    pub fn trace(&self, ray: &Ray, t_min: f32, t_max: f32) -> Option<RayHit> {
        if self.tlas_nodes.is_empty() {
            return None;
        }

        let mut closest = t_max;
        let mut best = None;
        let mut stack = [0u32; TRAVERSAL_STACK_SIZE];
        let mut sp = 1;

        while sp > 0 {
            sp -= 1;
            let node = self.tlas_nodes[stack[sp] as usize];
            let node_box = node.aabb();
            if intersect_aabb(ray, node_box.min, node_box.max, t_min, closest).is_none() {
                continue;
            }

            if node.is_leaf() {
                for slot in node.left..node.left + node.right {
                    let instance = &self.instances[slot as usize];
                    let local = ray.transformed(&instance.world_to_object());
                    if let Some(t) = self.trace_blas(instance.blas_index, &local, t_min, closest) {
                        closest = t;
                        best = Some(RayHit {
                            custom_index: instance.custom_index,
                            t,
                            instance: slot,
                        });
                    }
                }
            } else if sp + 2 <= TRAVERSAL_STACK_SIZE {
                stack[sp] = node.right;
                stack[sp + 1] = node.left;
                sp += 2;
            } else {
                log::warn!("top-level traversal stack overflow, subtree skipped");
            }
        }
        best
    }

    fn trace_blas(&self, blas_index: u32, ray: &Ray, t_min: f32, t_max: f32) -> Option<f32> {
        let range = self.blas_ranges.get(blas_index as usize)?;
        if range.node_count == 0 {
            return None;
        }
        let nodes = &self.blas_nodes
            [range.node_offset as usize..(range.node_offset + range.node_count) as usize];

        let mut closest = t_max;
        let mut found = None;
        let mut stack = [0u32; TRAVERSAL_STACK_SIZE];
        let mut sp = 1;

        while sp > 0 {
            sp -= 1;
            let node = nodes[stack[sp] as usize];
            let node_box = node.aabb();
            if intersect_aabb(ray, node_box.min, node_box.max, t_min, closest).is_none() {
                continue;
            }

            if node.is_leaf() {
                let first = (range.triangle_offset + node.left) as usize;
                for tri in &self.triangles[first..first + node.right as usize] {
                    if let Some(t) = intersect_triangle(ray, tri.corners(), t_min, closest) {
                        closest = t;
                        found = Some(t);
                    }
                }
            } else if sp + 2 <= TRAVERSAL_STACK_SIZE {
                stack[sp] = node.right;
                stack[sp + 1] = node.left;
                sp += 2;
            }
        }
        found
    }
}
