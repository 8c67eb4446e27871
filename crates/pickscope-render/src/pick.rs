//! GPU-side pick data layouts.
//!
//! Every struct here is uploaded as-is and must match the corresponding
//! WGSL struct in `shaders/id_buffer.wgsl` or `shaders/ray_pick.wgsl`.

use glam::{Mat4, Vec3};
use pickscope_core::{IdColor, RayHit};

/// Camera uniforms for the id-buffer pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PickCameraUniforms {
    /// Combined view-projection matrix.
    pub view_proj: [[f32; 4]; 4],
}

impl PickCameraUniforms {
    pub fn new(view_proj: Mat4) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
        }
    }
}

impl Default for PickCameraUniforms {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY)
    }
}

/// Per-object data for the id-buffer pass, indexed by instance index.
///
/// Includes the model transform since mesh positions are in object space.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectPickUniforms {
    /// Model transform matrix.
    pub model: [[f32; 4]; 4],
    /// Encoded identifier as normalized RGBA.
    pub id_color: [f32; 4],
}

impl ObjectPickUniforms {
    pub fn new(model: Mat4, color: IdColor) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            id_color: color.to_unorm(),
        }
    }
}

/// Ray query parameters for the compute pick pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[allow(clippy::pub_underscore_fields)]
pub struct RayPickUniforms {
    pub origin: [f32; 3],
    pub t_min: f32,
    pub direction: [f32; 3],
    pub t_max: f32,
    pub instance_count: u32,
    pub _padding: [u32; 3],
}

const _: () = assert!(std::mem::size_of::<RayPickUniforms>() == 48);

impl RayPickUniforms {
    pub fn new(origin: Vec3, direction: Vec3, t_min: f32, t_max: f32, instance_count: u32) -> Self {
        Self {
            origin: origin.to_array(),
            t_min,
            direction: direction.to_array(),
            t_max,
            instance_count,
            _padding: [0; 3],
        }
    }
}

/// Result written by the compute pick pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuRayHit {
    /// Non-zero when something was hit.
    pub hit: u32,
    pub custom_index: u32,
    pub t: f32,
    pub instance: u32,
}

impl GpuRayHit {
    /// Converts to the host hit type; `None` when nothing was hit.
    pub fn to_hit(self) -> Option<RayHit> {
        (self.hit != 0).then_some(RayHit {
            custom_index: self.custom_index,
            t: self.t,
            instance: self.instance,
        })
    }
}
