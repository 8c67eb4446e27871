//! Compute-shader ray pick against an uploaded [`FlatAccel`].

use std::time::Duration;

use pickscope_core::{FlatAccel, Ray, RayHit};

use crate::buffer::{create_staging_buffer, create_storage_buffer, create_uniform_buffer};
use crate::context::GpuContext;
use crate::error::RenderResult;
use crate::pick::{GpuRayHit, RayPickUniforms};
use crate::readback::map_read;

/// Uploaded acceleration structure buffers.
struct AccelBuffers {
    bind_group: wgpu::BindGroup,
    instance_count: u32,
    generation: u64,
}

/// Traces single pick rays on the GPU.
pub struct RayPickPass {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    params_buffer: wgpu::Buffer,
    result_buffer: wgpu::Buffer,
    staging_buffer: wgpu::Buffer,
    accel: Option<AccelBuffers>,
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl RayPickPass {
    pub fn new(ctx: &GpuContext) -> Self {
        let device = &ctx.device;
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Ray Pick Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/ray_pick.wgsl").into()),
        });

        // Params, five read-only structure arrays, one result
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Ray Pick Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, true),
                storage_entry(4, true),
                storage_entry(5, true),
                storage_entry(6, false),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Ray Pick Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Ray Pick Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        let params_buffer = create_uniform_buffer(
            device,
            &RayPickUniforms::new(glam::Vec3::ZERO, glam::Vec3::NEG_Z, 0.0, 0.0, 0),
            Some("Ray Pick Params"),
        );
        let hit_size = std::mem::size_of::<GpuRayHit>() as wgpu::BufferAddress;
        let result_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Ray Pick Result"),
            size: hit_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging_buffer = create_staging_buffer(device, hit_size, Some("Ray Pick Staging"));

        Self {
            pipeline,
            bind_group_layout,
            params_buffer,
            result_buffer,
            staging_buffer,
            accel: None,
        }
    }

    /// Generation of the uploaded structure, if any.
    pub fn uploaded_generation(&self) -> Option<u64> {
        self.accel.as_ref().map(|a| a.generation)
    }

    /// Uploads `flat` unless the same generation is already resident.
    pub fn upload(&mut self, ctx: &GpuContext, flat: &FlatAccel, generation: u64) {
        if self.uploaded_generation() == Some(generation) {
            return;
        }
        let device = &ctx.device;
        let tlas = create_storage_buffer(device, &flat.tlas_nodes, Some("Ray Pick TLAS Nodes"));
        let instances = create_storage_buffer(device, &flat.instances, Some("Ray Pick Instances"));
        let blas = create_storage_buffer(device, &flat.blas_nodes, Some("Ray Pick BLAS Nodes"));
        let triangles = create_storage_buffer(device, &flat.triangles, Some("Ray Pick Triangles"));
        let ranges = create_storage_buffer(device, &flat.blas_ranges, Some("Ray Pick BLAS Ranges"));

        let buffers = [
            &self.params_buffer,
            &tlas,
            &instances,
            &blas,
            &triangles,
            &ranges,
            &self.result_buffer,
        ];
        let entries: Vec<wgpu::BindGroupEntry<'_>> = buffers
            .iter()
            .enumerate()
            .map(|(binding, buffer)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Ray Pick Bind Group"),
            layout: &self.bind_group_layout,
            entries: &entries,
        });

        log::debug!(
            "uploaded acceleration structure generation {generation}: {} instances, {} triangles",
            flat.instances.len(),
            flat.triangles.len()
        );
        self.accel = Some(AccelBuffers {
            bind_group,
            instance_count: flat.instances.len() as u32,
            generation,
        });
    }

    /// Drops the uploaded structure.
    pub fn clear(&mut self) {
        self.accel = None;
    }

    /// Traces one ray and blocks until the result is back.
    ///
    /// Returns `Ok(None)` on a miss or when nothing is uploaded.
    pub fn trace(
        &self,
        ctx: &GpuContext,
        ray: &Ray,
        t_min: f32,
        t_max: f32,
        timeout: Duration,
    ) -> RenderResult<Option<RayHit>> {
        let Some(accel) = self.accel.as_ref() else {
            return Ok(None);
        };
        if accel.instance_count == 0 {
            return Ok(None);
        }

        let params = RayPickUniforms::new(ray.origin, ray.direction, t_min, t_max, accel.instance_count);
        ctx.queue
            .write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Ray Pick Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Ray Pick Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &accel.bind_group, &[]);
            pass.dispatch_workgroups(1, 1, 1);
        }
        let size = std::mem::size_of::<GpuRayHit>() as wgpu::BufferAddress;
        encoder.copy_buffer_to_buffer(&self.result_buffer, 0, &self.staging_buffer, 0, size);
        let submission = ctx.queue.submit(std::iter::once(encoder.finish()));

        let data = map_read(&ctx.device, &self.staging_buffer, size, submission, timeout)?;
        let hit: GpuRayHit = bytemuck::pod_read_unaligned(&data);
        log::debug!("gpu ray pick -> {hit:?}");
        Ok(hit.to_hit())
    }
}
