//! Scene-level picking front end.

use std::sync::Arc;

use pickscope_core::{
    encode_id, AccelerationStructureManager, Geometry, IdColor, IdSet, Mat4, ObjectId, PickCamera,
    PickError, PickOptions, PickRect, PickResult, Picker, PointPickMethod, RayHit, Registry,
    Result, Vec2,
};
use pickscope_render::{GpuContext, IdBufferRenderer, IdDrawItem, RayPickPass, TargetRole};
use pollster::FutureExt;

/// GPU resources owned by a picker.
struct GpuBackend {
    ctx: GpuContext,
    id_buffer: IdBufferRenderer,
    ray_pass: RayPickPass,
}

/// Owns the scene's picking state and answers point and region picks.
///
/// Objects are registered here; the registry, the acceleration structure and
/// the id-buffer all stay in sync through this type. Without a GPU only ray
/// picks are available, traced on the host.
pub struct ScenePicker {
    options: PickOptions,
    registry: Registry,
    accel: AccelerationStructureManager,
    camera: PickCamera,
    viewport: (u32, u32),
    gpu: Option<GpuBackend>,
}

impl ScenePicker {
    /// Creates a host-only picker. Call [`ScenePicker::resize`] before picking.
    pub fn new(options: PickOptions) -> Self {
        Self {
            options,
            registry: Registry::new(),
            accel: AccelerationStructureManager::new(),
            camera: PickCamera::default(),
            viewport: (0, 0),
            gpu: None,
        }
    }

    /// Creates a picker that renders and traces on `ctx`.
    pub fn with_gpu(options: PickOptions, ctx: GpuContext, width: u32, height: u32) -> Result<Self> {
        let id_buffer = IdBufferRenderer::new(&ctx, width, height)?;
        let ray_pass = RayPickPass::new(&ctx);
        let mut picker = Self::new(options);
        picker.viewport = (width, height);
        picker.gpu = Some(GpuBackend {
            ctx,
            id_buffer,
            ray_pass,
        });
        Ok(picker)
    }

    /// Creates a picker on a new headless device.
    pub fn headless(options: PickOptions, width: u32, height: u32) -> Result<Self> {
        let ctx = GpuContext::new_headless().block_on()?;
        Self::with_gpu(options, ctx, width, height)
    }

    pub fn options(&self) -> &PickOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut PickOptions {
        &mut self.options
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn accel(&self) -> &AccelerationStructureManager {
        &self.accel
    }

    pub fn camera(&self) -> &PickCamera {
        &self.camera
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn has_gpu(&self) -> bool {
        self.gpu.is_some()
    }

    /// Role of the id target, if there is one.
    pub fn id_target_role(&self) -> Option<TargetRole> {
        self.gpu.as_ref().map(|gpu| gpu.id_buffer.target_role())
    }

    /// Counts reallocations of the id target, if there is one.
    pub fn id_target_generation(&self) -> Option<u64> {
        self.gpu.as_ref().map(|gpu| gpu.id_buffer.target_generation())
    }

    /// Registers a selectable object and returns its fresh identifier.
    pub fn add_object(
        &mut self,
        geometry: Arc<Geometry>,
        transform: Mat4,
        name: impl Into<String>,
    ) -> Result<ObjectId> {
        let id = self
            .registry
            .insert(Arc::clone(&geometry), transform, name)?;
        self.accel.add_object(id, &geometry, transform, true);
        Ok(id)
    }

    /// Removes an object. Its identifier is never reused.
    pub fn remove_object(&mut self, id: ObjectId) -> Result<()> {
        self.registry
            .remove(id)
            .ok_or(PickError::ObjectNotFound(id))?;
        self.accel.remove_object(id);
        Ok(())
    }

    /// Moves an object.
    pub fn update_transform(&mut self, id: ObjectId, transform: Mat4) -> Result<()> {
        self.registry.set_transform(id, transform)?;
        self.accel.update_transform(id, transform)
    }

    /// Non-selectable objects still occlude but never resolve.
    pub fn set_selectable(&mut self, id: ObjectId, selectable: bool) -> Result<()> {
        self.registry.set_selectable(id, selectable)?;
        self.accel.set_selectable(id, selectable)
    }

    pub fn set_camera(&mut self, camera: PickCamera) {
        self.camera = camera;
    }

    /// Matches the viewport; the id target is only reallocated on a size change.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(PickError::InvalidViewport { width, height });
        }
        if let Some(gpu) = self.gpu.as_mut() {
            gpu.id_buffer.resize(&gpu.ctx, width, height)?;
        }
        self.viewport = (width, height);
        Ok(())
    }

    /// Rebuilds the acceleration structure and uploads it to the GPU.
    ///
    /// On failure ray picks miss until a later build succeeds.
    pub fn build(&mut self) -> Result<()> {
        let result = self.accel.build();
        if let Some(gpu) = self.gpu.as_mut() {
            match self.accel.flat() {
                Some(flat) => gpu
                    .ray_pass
                    .upload(&gpu.ctx, flat, self.accel.generation()),
                None => gpu.ray_pass.clear(),
            }
        }
        result.map_err(PickError::from)
    }

    fn check_viewport(&self) -> Result<()> {
        let (width, height) = self.viewport;
        if width == 0 || height == 0 {
            return Err(PickError::InvalidViewport { width, height });
        }
        Ok(())
    }

    /// Maps a hit to a reportable result, dropping occluders and stale ids.
    fn resolve_hit(&self, hit: Option<RayHit>) -> PickResult {
        let Some(hit) = hit.filter(RayHit::is_pickable) else {
            return PickResult::miss();
        };
        match ObjectId::new(hit.custom_index) {
            Some(id) if self.registry.is_pickable(id) => PickResult::hit(id, hit.t),
            _ => PickResult::miss(),
        }
    }

    /// Nearest object along the ray through `screen`.
    pub fn pick_ray(&mut self, screen: Vec2) -> Result<PickResult> {
        self.check_viewport()?;
        if self.options.build_on_pick && self.accel.is_dirty() {
            if let Err(err) = self.build() {
                log::warn!("rebuild before ray pick failed: {err}");
            }
        }
        if !self.accel.is_ray_enabled() {
            return Ok(PickResult::miss());
        }

        let Some(ray) = self.camera.ray(screen, self.viewport) else {
            return Ok(PickResult::miss());
        };
        let (t_min, t_max) = (self.options.t_min, self.options.t_max);

        let hit = match self.gpu.as_mut() {
            Some(gpu) => {
                if let Some(flat) = self.accel.flat() {
                    gpu.ray_pass
                        .upload(&gpu.ctx, flat, self.accel.generation());
                }
                gpu.ray_pass
                    .trace(&gpu.ctx, &ray, t_min, t_max, self.options.readback_timeout())?
            }
            None => self.accel.trace(&ray, t_min, t_max),
        };

        let result = self.resolve_hit(hit);
        log::debug!("ray pick at {screen} -> {:?}", result.id);
        Ok(result)
    }

    fn render_id_buffer(&mut self) -> Result<&mut GpuBackend> {
        let gpu = self.gpu.as_mut().ok_or(PickError::GpuUnavailable)?;
        let items: Vec<IdDrawItem<'_>> = self
            .registry
            .iter()
            .map(|object| IdDrawItem {
                geometry: &object.geometry,
                transform: object.transform,
                color: if object.selectable {
                    encode_id(object.id)
                } else {
                    IdColor::NONE
                },
            })
            .collect();
        gpu.id_buffer
            .render(&gpu.ctx, &items, self.camera.view_projection());
        Ok(gpu)
    }

    /// Object under `screen` according to the id-buffer.
    pub fn pick_id_buffer_point(&mut self, screen: Vec2) -> Result<PickResult> {
        self.check_viewport()?;
        if screen.x < 0.0 || screen.y < 0.0 {
            return Ok(PickResult::miss());
        }
        let timeout = self.options.readback_timeout();
        let gpu = self.render_id_buffer()?;
        let id = gpu
            .id_buffer
            .read_point(&gpu.ctx, screen.x as u32, screen.y as u32, timeout)?;
        Ok(PickResult::from_id(id.filter(|&id| self.registry.is_pickable(id))))
    }

    /// Single-point pick through the configured path.
    ///
    /// Id-buffer picks fall back to the ray path when there is no GPU.
    pub fn pick_point(&mut self, screen: Vec2) -> Result<PickResult> {
        match self.options.point_pick_method {
            PointPickMethod::IdBuffer if self.gpu.is_some() => self.pick_id_buffer_point(screen),
            _ => self.pick_ray(screen),
        }
    }

    /// Every object visible in the rectangle spanned by `start` and `end`.
    ///
    /// Rectangles thinner than the configured minimum extent are answered
    /// as a point pick at their center.
    pub fn pick_region(&mut self, start: Vec2, end: Vec2) -> Result<IdSet> {
        self.check_viewport()?;
        let rect = PickRect::from_points(start, end);
        if rect.is_degenerate(self.options.min_region_extent) {
            log::debug!("degenerate rectangle {rect:?}, picking a point instead");
            let result = self.pick_point(rect.center())?;
            return Ok(result.id.into_iter().collect());
        }

        let timeout = self.options.readback_timeout();
        let gpu = self.render_id_buffer()?;
        let ids = gpu.id_buffer.read_region(&gpu.ctx, rect, timeout)?;
        Ok(self.registry.retain_live(ids))
    }
}

impl Picker for ScenePicker {
    fn pick_point(&mut self, point: Vec2) -> Result<PickResult> {
        ScenePicker::pick_point(self, point)
    }

    fn pick_region(&mut self, start: Vec2, end: Vec2) -> Result<IdSet> {
        ScenePicker::pick_region(self, start, end)
    }

    fn is_live(&self, id: ObjectId) -> bool {
        self.registry.is_pickable(id)
    }
}
