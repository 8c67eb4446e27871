//! Offscreen id-buffer rendering and readback.
//!
//! Each object is drawn in the flat color that encodes its identifier, with
//! depth testing so nearer objects win. Reading back one pixel answers a
//! point pick; reading back a rectangle answers a region pick.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use glam::{Mat4, Vec3};
use pickscope_core::{
    decode_rgba, decode_rgba_region, Geometry, GeometryKey, IdColor, IdSet, ObjectId, PickRect,
};

use crate::buffer::{create_index_buffer, create_staging_buffer, create_vertex_buffer};
use crate::context::GpuContext;
use crate::error::{RenderError, RenderResult};
use crate::pick::{ObjectPickUniforms, PickCameraUniforms};
use crate::readback::{align_bytes_per_row, map_read, wait_for_submission};

/// Color format of the id target. Unorm so stored bytes equal the encoding.
pub const ID_COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
/// Depth format of the id target.
pub const ID_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

/// Current use of the offscreen color target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetRole {
    /// Ready to be drawn into.
    #[default]
    RenderTarget,
    /// Being copied out for a readback.
    TransferSource,
}

/// One object to draw into the id-buffer.
#[derive(Debug, Clone, Copy)]
pub struct IdDrawItem<'a> {
    pub geometry: &'a Arc<Geometry>,
    /// Object-to-world transform.
    pub transform: Mat4,
    /// [`IdColor::NONE`] draws an occluder that never resolves.
    pub color: IdColor,
}

/// Uploaded geometry. Holds the `Arc` so the cache key stays unique.
struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    _geometry: Arc<Geometry>,
}

/// Color and depth targets sized to the viewport.
struct IdTargets {
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    size: (u32, u32),
}

impl IdTargets {
    fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let extent = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Id Buffer Texture"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: ID_COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());

        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Id Buffer Depth Texture"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: ID_DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            color,
            color_view,
            depth_view,
            size: (width, height),
        }
    }
}

/// Renders the id-buffer and reads it back.
pub struct IdBufferRenderer {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    camera_buffer: wgpu::Buffer,
    object_buffer: wgpu::Buffer,
    object_capacity: usize,
    bind_group: wgpu::BindGroup,
    targets: IdTargets,
    /// One aligned row, enough for a single pixel.
    point_staging: wgpu::Buffer,
    meshes: HashMap<GeometryKey, GpuMesh>,
    role: TargetRole,
    /// Last render submission, waited on before any readback.
    pending: Option<wgpu::SubmissionIndex>,
    /// Bumped whenever the targets are recreated.
    target_generation: u64,
}

impl IdBufferRenderer {
    /// Creates the pipeline and targets for a `width` x `height` viewport.
    pub fn new(ctx: &GpuContext, width: u32, height: u32) -> RenderResult<Self> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidSize { width, height });
        }
        let device = &ctx.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Id Buffer Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/id_buffer.wgsl").into()),
        });

        // Id buffer bind group layout: camera, per-object data
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Id Buffer Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Id Buffer Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Id Buffer Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x3],
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: ID_COLOR_FORMAT,
                    blend: None, // Ids must never be blended
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                // Both faces, matching the double-sided ray test
                cull_mode: None,
                ..wgpu::PrimitiveState::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: ID_DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let camera_buffer = crate::buffer::create_uniform_buffer(
            device,
            &PickCameraUniforms::default(),
            Some("Id Buffer Camera"),
        );
        let object_capacity = 64;
        let object_buffer = Self::create_object_buffer(device, object_capacity);
        let bind_group =
            Self::create_bind_group(device, &bind_group_layout, &camera_buffer, &object_buffer);

        let point_staging = create_staging_buffer(
            device,
            wgpu::BufferAddress::from(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT),
            Some("Id Buffer Point Staging"),
        );

        log::debug!("id buffer created at {width}x{height}");
        Ok(Self {
            pipeline,
            bind_group_layout,
            camera_buffer,
            object_buffer,
            object_capacity,
            bind_group,
            targets: IdTargets::new(device, width, height),
            point_staging,
            meshes: HashMap::new(),
            role: TargetRole::RenderTarget,
            pending: None,
            target_generation: 0,
        })
    }

    fn create_object_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Id Buffer Objects"),
            size: (capacity * std::mem::size_of::<ObjectPickUniforms>()) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn create_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        camera: &wgpu::Buffer,
        objects: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Id Buffer Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: objects.as_entire_binding(),
                },
            ],
        })
    }

    /// Current target size.
    pub fn size(&self) -> (u32, u32) {
        self.targets.size
    }

    /// Role the color target is currently in.
    pub fn target_role(&self) -> TargetRole {
        self.role
    }

    /// Incremented each time the targets are reallocated.
    pub fn target_generation(&self) -> u64 {
        self.target_generation
    }

    /// Matches the targets to a new viewport size. Same-size calls are no-ops.
    pub fn resize(&mut self, ctx: &GpuContext, width: u32, height: u32) -> RenderResult<()> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidSize { width, height });
        }
        // Skip if size unchanged
        if self.targets.size == (width, height) {
            return Ok(());
        }
        self.targets = IdTargets::new(&ctx.device, width, height);
        self.pending = None;
        self.target_generation += 1;
        log::debug!("id buffer resized to {width}x{height}");
        Ok(())
    }

    fn sync_meshes(&mut self, device: &wgpu::Device, items: &[IdDrawItem<'_>]) {
        let live: HashSet<GeometryKey> = items.iter().map(|i| GeometryKey::of(i.geometry)).collect();
        self.meshes.retain(|key, _| live.contains(key));

        for item in items {
            let key = GeometryKey::of(item.geometry);
            if self.meshes.contains_key(&key) {
                continue;
            }
            let geometry = item.geometry;
            if geometry.is_empty() || geometry.first_invalid_index().is_some() {
                log::warn!("skipping unusable geometry in id buffer");
                continue;
            }
            let positions: Vec<[f32; 3]> = geometry.positions.iter().map(Vec3::to_array).collect();
            let indices = geometry.flat_indices();
            self.meshes.insert(
                key,
                GpuMesh {
                    vertex_buffer: create_vertex_buffer(device, &positions, Some("Id Mesh Vertices")),
                    index_buffer: create_index_buffer(device, &indices, Some("Id Mesh Indices")),
                    index_count: indices.len() as u32,
                    _geometry: Arc::clone(geometry),
                },
            );
        }
    }

    /// Draws all items into the id target and submits the work.
    ///
    /// The target is cleared to the "no object" color first.
    pub fn render(&mut self, ctx: &GpuContext, items: &[IdDrawItem<'_>], view_proj: Mat4) {
        let device = &ctx.device;
        self.sync_meshes(device, items);

        if items.len() > self.object_capacity {
            self.object_capacity = items.len().next_power_of_two();
            self.object_buffer = Self::create_object_buffer(device, self.object_capacity);
            self.bind_group = Self::create_bind_group(
                device,
                &self.bind_group_layout,
                &self.camera_buffer,
                &self.object_buffer,
            );
        }

        let objects: Vec<ObjectPickUniforms> = items
            .iter()
            .map(|item| ObjectPickUniforms::new(item.transform, item.color))
            .collect();
        ctx.queue.write_buffer(
            &self.camera_buffer,
            0,
            bytemuck::bytes_of(&PickCameraUniforms::new(view_proj)),
        );
        if !objects.is_empty() {
            ctx.queue
                .write_buffer(&self.object_buffer, 0, bytemuck::cast_slice(&objects));
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Id Buffer Encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Id Buffer Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.targets.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK), // Background = (0,0,0)
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.targets.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            for (slot, item) in items.iter().enumerate() {
                let Some(mesh) = self.meshes.get(&GeometryKey::of(item.geometry)) else {
                    continue;
                };
                let slot = slot as u32;
                pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..mesh.index_count, 0, slot..slot + 1);
            }
        }

        self.pending = Some(ctx.queue.submit(std::iter::once(encoder.finish())));
        log::debug!("id buffer rendered {} object(s)", items.len());
    }

    fn set_role(&mut self, role: TargetRole) {
        if self.role != role {
            log::trace!("id target {:?} -> {:?}", self.role, role);
            self.role = role;
        }
    }

    /// Waits for the last render, then runs a readback with the target in its
    /// transfer role. The role is restored whatever the outcome.
    fn with_transfer<T>(
        &mut self,
        ctx: &GpuContext,
        timeout: Duration,
        read: impl FnOnce(&Self) -> RenderResult<T>,
    ) -> RenderResult<T> {
        if let Some(pending) = self.pending.take() {
            wait_for_submission(&ctx.device, pending, timeout)?;
        }
        self.set_role(TargetRole::TransferSource);
        let result = read(self);
        self.set_role(TargetRole::RenderTarget);
        result
    }

    fn copy_region(
        &self,
        ctx: &GpuContext,
        origin: (u32, u32),
        extent: (u32, u32),
        staging: &wgpu::Buffer,
        bytes_per_row: u32,
    ) -> wgpu::SubmissionIndex {
        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Id Buffer Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.targets.color,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: origin.0,
                    y: origin.1,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(extent.1),
                },
            },
            wgpu::Extent3d {
                width: extent.0,
                height: extent.1,
                depth_or_array_layers: 1,
            },
        );
        ctx.queue.submit(std::iter::once(encoder.finish()))
    }

    /// Reads the identifier at pixel `(x, y)`. Outside the target is a miss.
    pub fn read_point(
        &mut self,
        ctx: &GpuContext,
        x: u32,
        y: u32,
        timeout: Duration,
    ) -> RenderResult<Option<ObjectId>> {
        let (width, height) = self.targets.size;
        if x >= width || y >= height {
            return Ok(None);
        }

        self.with_transfer(ctx, timeout, |this| {
            let bytes_per_row = align_bytes_per_row(4);
            let submission = this.copy_region(ctx, (x, y), (1, 1), &this.point_staging, bytes_per_row);
            let data = map_read(&ctx.device, &this.point_staging, 4, submission, timeout)?;
            let id = decode_rgba([data[0], data[1], data[2], data[3]]);
            log::debug!("id buffer point ({x}, {y}) -> {id:?}");
            Ok(id)
        })
    }

    /// Reads every distinct identifier inside `rect`.
    ///
    /// The rectangle is clamped to the target; nothing left after clamping
    /// gives an empty set.
    pub fn read_region(
        &mut self,
        ctx: &GpuContext,
        rect: PickRect,
        timeout: Duration,
    ) -> RenderResult<IdSet> {
        let Some(rect) = rect.clamp_to(self.targets.size) else {
            return Ok(IdSet::new());
        };

        self.with_transfer(ctx, timeout, |this| {
            let bytes_per_row = align_bytes_per_row(rect.width * 4);
            let size = wgpu::BufferAddress::from(bytes_per_row) * wgpu::BufferAddress::from(rect.height);
            let staging = create_staging_buffer(&ctx.device, size, Some("Id Buffer Region Staging"));
            let submission = this.copy_region(
                ctx,
                rect.origin(),
                (rect.width, rect.height),
                &staging,
                bytes_per_row,
            );
            let data = map_read(&ctx.device, &staging, size, submission, timeout)?;
            let ids = decode_rgba_region(&data, rect.width, rect.height, bytes_per_row);
            log::debug!(
                "id buffer region {}x{} at {:?} -> {} id(s)",
                rect.width,
                rect.height,
                rect.origin(),
                ids.len()
            );
            Ok(ids)
        })
    }
}
