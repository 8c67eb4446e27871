//! Screen-space ray generation and primitive intersection.

use glam::{Mat4, Vec2, Vec3, Vec4};

/// A ray with an origin and a direction.
///
/// Rays produced by [`screen_ray`] have a unit direction, so hit distances
/// are world-space lengths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Ray origin.
    pub origin: Vec3,
    /// Ray direction.
    pub direction: Vec3,
}

impl Ray {
    /// Creates a new ray.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Point at parameter `t`.
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Re-expresses the ray through an affine transform.
    ///
    /// The direction is not renormalized, so a parameter `t` names the same
    /// point before and after the transform.
    pub fn transformed(&self, m: &Mat4) -> Self {
        Self {
            origin: m.transform_point3(self.origin),
            direction: m.transform_vector3(self.direction),
        }
    }
}

/// Camera matrices needed to turn a screen point into a ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickCamera {
    /// World-to-view matrix.
    pub view: Mat4,
    /// View-to-clip matrix.
    pub projection: Mat4,
    /// Camera position in world space.
    pub position: Vec3,
}

impl Default for PickCamera {
    fn default() -> Self {
        Self::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y, 45f32.to_radians(), 1.0)
    }
}

impl PickCamera {
    /// Creates a camera from view and projection matrices.
    ///
    /// The position is recovered from the inverse view matrix.
    pub fn from_matrices(view: Mat4, projection: Mat4) -> Self {
        let position = view.inverse().w_axis.truncate();
        Self {
            view,
            projection,
            position,
        }
    }

    /// Right-handed perspective camera looking from `eye` at `target`.
    pub fn look_at(eye: Vec3, target: Vec3, up: Vec3, fov_y: f32, aspect: f32) -> Self {
        Self {
            view: Mat4::look_at_rh(eye, target, up),
            projection: Mat4::perspective_rh(fov_y, aspect, 0.1, 1000.0),
            position: eye,
        }
    }

    /// Combined view-projection matrix.
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Builds the pick ray through a screen point.
    pub fn ray(&self, screen: Vec2, viewport: (u32, u32)) -> Option<Ray> {
        screen_ray(
            screen,
            viewport,
            &self.projection.inverse(),
            &self.view.inverse(),
            self.position,
        )
    }

    /// Projects a world point to screen pixels (origin top-left).
    pub fn project(&self, world: Vec3, viewport: (u32, u32)) -> Option<Vec2> {
        let clip = self.view_projection() * world.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        let (w, h) = (viewport.0 as f32, viewport.1 as f32);
        Some(Vec2::new((ndc.x + 1.0) * 0.5 * w, (1.0 - ndc.y) * 0.5 * h))
    }
}

/// Maps screen pixels (origin top-left, y down) to normalized device coordinates.
pub fn screen_to_ndc(screen: Vec2, viewport: (u32, u32)) -> Option<Vec2> {
    let (width, height) = viewport;
    if width == 0 || height == 0 {
        return None;
    }
    Some(Vec2::new(
        2.0 * screen.x / width as f32 - 1.0,
        1.0 - 2.0 * screen.y / height as f32,
    ))
}

/// Builds a world-space pick ray through a screen point.
///
/// The point is mapped to NDC, unprojected through the inverse projection,
/// pointed into the scene (view-space `-Z`), taken to world space through the
/// inverse view and normalized. The origin is the camera position.
pub fn screen_ray(
    screen: Vec2,
    viewport: (u32, u32),
    inv_projection: &Mat4,
    inv_view: &Mat4,
    camera_position: Vec3,
) -> Option<Ray> {
    let ndc = screen_to_ndc(screen, viewport)?;

    let view_space = *inv_projection * Vec4::new(ndc.x, ndc.y, 0.0, 1.0);
    let view_dir = Vec4::new(view_space.x, view_space.y, -1.0, 0.0);
    let world_dir = (*inv_view * view_dir).truncate();

    let direction = world_dir.try_normalize()?;
    if !direction.is_finite() {
        return None;
    }
    Some(Ray::new(camera_position, direction))
}

/// Möller-Trumbore ray/triangle test, double-sided.
///
/// Returns the ray parameter of the hit if it lies in `[t_min, t_max]`.
pub fn intersect_triangle(ray: &Ray, tri: [Vec3; 3], t_min: f32, t_max: f32) -> Option<f32> {
    let eps = 1e-8;
    let [v0, v1, v2] = tri;
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let h = ray.direction.cross(edge2);
    let a = edge1.dot(h);
    if a.abs() < eps {
        return None;
    }
    let f = 1.0 / a;
    let s = ray.origin - v0;
    let u = f * s.dot(h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(edge1);
    let v = f * ray.direction.dot(q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = f * edge2.dot(q);
    (t >= t_min && t <= t_max).then_some(t)
}

/// Slab test against an axis-aligned box.
///
/// Returns the entry parameter clamped to `t_min` if the box overlaps
/// `[t_min, t_max]` along the ray.
pub fn intersect_aabb(ray: &Ray, min: Vec3, max: Vec3, t_min: f32, t_max: f32) -> Option<f32> {
    // Near-zero components get a huge finite inverse so 0 * inf never appears
    let inv = Vec3::select(
        ray.direction.abs().cmplt(Vec3::splat(1e-12)),
        Vec3::splat(1e30),
        ray.direction.recip(),
    );
    let t0 = (min - ray.origin) * inv;
    let t1 = (max - ray.origin) * inv;
    let near = t0.min(t1);
    let far = t0.max(t1);
    let enter = near.max_element().max(t_min);
    let exit = far.min_element().min(t_max);
    (enter <= exit).then_some(enter)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: (u32, u32) = (800, 600);

    fn camera() -> PickCamera {
        PickCamera::look_at(
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::ZERO,
            Vec3::Y,
            60f32.to_radians(),
            800.0 / 600.0,
        )
    }

    #[test]
    fn test_center_ray_points_forward() {
        let ray = camera().ray(Vec2::new(400.0, 300.0), VIEWPORT).unwrap();
        assert_eq!(ray.origin, Vec3::new(0.0, 0.0, 10.0));
        assert!((ray.direction - Vec3::NEG_Z).length() < 1e-5);
    }

    #[test]
    fn test_ray_passes_through_projected_point() {
        let cam = camera();
        let target = Vec3::new(1.5, -0.75, 2.0);
        let screen = cam.project(target, VIEWPORT).unwrap();
        let ray = cam.ray(screen, VIEWPORT).unwrap();
        let to_target = (target - ray.origin).normalize();
        assert!((ray.direction - to_target).length() < 1e-4);
    }

    #[test]
    fn test_screen_y_points_down() {
        let cam = camera();
        let top = cam.ray(Vec2::new(400.0, 0.0), VIEWPORT).unwrap();
        let bottom = cam.ray(Vec2::new(400.0, 600.0), VIEWPORT).unwrap();
        assert!(top.direction.y > 0.0);
        assert!(bottom.direction.y < 0.0);
    }

    #[test]
    fn test_zero_viewport_rejected() {
        assert!(camera().ray(Vec2::ZERO, (0, 600)).is_none());
    }

    #[test]
    fn test_from_matrices_recovers_position() {
        let eye = Vec3::new(3.0, 4.0, 5.0);
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
        let cam = PickCamera::from_matrices(view, Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0));
        assert!((cam.position - eye).length() < 1e-4);
    }

    #[test]
    fn test_triangle_hit_and_miss() {
        let tri = [
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z);
        assert_eq!(intersect_triangle(&ray, tri, 0.001, 100.0), Some(5.0));
        // Outside the interval
        assert_eq!(intersect_triangle(&ray, tri, 0.001, 4.0), None);
        // Back side is hit too
        let back = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
        assert_eq!(intersect_triangle(&back, tri, 0.001, 100.0), Some(5.0));
        let miss = Ray::new(Vec3::new(3.0, 0.0, 5.0), Vec3::NEG_Z);
        assert_eq!(intersect_triangle(&miss, tri, 0.001, 100.0), None);
    }

    #[test]
    fn test_aabb_slab() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z);
        let hit = intersect_aabb(&ray, Vec3::splat(-1.0), Vec3::splat(1.0), 0.0, 100.0);
        assert_eq!(hit, Some(4.0));
        let behind = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::Z);
        assert_eq!(
            intersect_aabb(&behind, Vec3::splat(-1.0), Vec3::splat(1.0), 0.0, 100.0),
            None
        );
        // Axis-parallel ray grazing inside a flat box
        let flat = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z);
        assert!(intersect_aabb(&flat, Vec3::new(-1.0, -1.0, 0.0), Vec3::new(1.0, 1.0, 0.0), 0.0, 100.0).is_some());
    }

    #[test]
    fn test_transformed_ray_keeps_parameter() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        let m = Mat4::from_scale(Vec3::splat(2.0));
        let local = ray.transformed(&m.inverse());
        assert!((m.transform_point3(local.at(3.0)) - ray.at(3.0)).length() < 1e-5);
    }
}
