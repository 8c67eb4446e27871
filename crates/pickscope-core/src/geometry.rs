//! Shared, immutable triangle geometry.

use std::sync::Arc;

use glam::Vec3;

/// An indexed triangle mesh in object space.
///
/// Geometry is immutable once loaded and shared between the render path and
/// the picking structures through [`Arc`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Geometry {
    /// Vertex positions.
    pub positions: Vec<Vec3>,
    /// Triangle vertex indices.
    pub indices: Vec<[u32; 3]>,
}

impl Geometry {
    /// Creates a new geometry from positions and triangles.
    pub fn new(positions: Vec<Vec3>, indices: Vec<[u32; 3]>) -> Self {
        Self { positions, indices }
    }

    /// Wraps the geometry for sharing.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Returns the number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    /// True when there is nothing to intersect or draw.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() || self.indices.is_empty()
    }

    /// Returns the first index that is out of range, if any.
    pub fn first_invalid_index(&self) -> Option<u32> {
        let n = self.positions.len();
        self.indices
            .iter()
            .flatten()
            .copied()
            .find(|&i| i as usize >= n)
    }

    /// Returns the three corners of a triangle.
    pub fn triangle(&self, tri: usize) -> Option<[Vec3; 3]> {
        let [a, b, c] = *self.indices.get(tri)?;
        Some([
            *self.positions.get(a as usize)?,
            *self.positions.get(b as usize)?,
            *self.positions.get(c as usize)?,
        ])
    }

    /// Indices flattened for an index buffer.
    pub fn flat_indices(&self) -> Vec<u32> {
        self.indices.iter().flatten().copied().collect()
    }

    /// Axis-aligned cube of half-extent `half` centered at the origin.
    pub fn cube(half: f32) -> Self {
        let h = half;
        let positions = vec![
            Vec3::new(-h, -h, -h),
            Vec3::new(h, -h, -h),
            Vec3::new(h, h, -h),
            Vec3::new(-h, h, -h),
            Vec3::new(-h, -h, h),
            Vec3::new(h, -h, h),
            Vec3::new(h, h, h),
            Vec3::new(-h, h, h),
        ];
        let indices = vec![
            [4, 5, 6],
            [4, 6, 7],
            [1, 0, 3],
            [1, 3, 2],
            [5, 1, 2],
            [5, 2, 6],
            [0, 4, 7],
            [0, 7, 3],
            [3, 7, 6],
            [3, 6, 2],
            [0, 1, 5],
            [0, 5, 4],
        ];
        Self { positions, indices }
    }

    /// UV sphere of the given radius centered at the origin.
    pub fn uv_sphere(radius: f32, rings: u32, segments: u32) -> Self {
        let rings = rings.max(2);
        let segments = segments.max(3);
        let mut positions = Vec::with_capacity(((rings + 1) * segments) as usize);
        for r in 0..=rings {
            let theta = std::f32::consts::PI * r as f32 / rings as f32;
            for s in 0..segments {
                let phi = std::f32::consts::TAU * s as f32 / segments as f32;
                positions.push(Vec3::new(
                    radius * theta.sin() * phi.cos(),
                    radius * theta.cos(),
                    radius * theta.sin() * phi.sin(),
                ));
            }
        }

        let mut indices = Vec::with_capacity((rings * segments * 2) as usize);
        for r in 0..rings {
            for s in 0..segments {
                let next = (s + 1) % segments;
                let a = r * segments + s;
                let b = r * segments + next;
                let c = (r + 1) * segments + s;
                let d = (r + 1) * segments + next;
                indices.push([a, c, b]);
                indices.push([b, c, d]);
            }
        }
        Self { positions, indices }
    }
}

/// Identity of a shared geometry, used to share bottom-level structures.
///
/// Two objects built from clones of the same `Arc<Geometry>` map to the same
/// key; equal-but-separately-allocated geometries do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryKey(usize);

impl GeometryKey {
    /// Key for a shared geometry handle.
    pub fn of(geometry: &Arc<Geometry>) -> Self {
        Self(Arc::as_ptr(geometry) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube() {
        let cube = Geometry::cube(0.5);
        assert_eq!(cube.triangle_count(), 12);
        assert!(!cube.is_empty());
        assert_eq!(cube.first_invalid_index(), None);
        assert_eq!(cube.flat_indices().len(), 36);
    }

    #[test]
    fn test_sphere_indices_valid() {
        let sphere = Geometry::uv_sphere(1.0, 8, 12);
        assert_eq!(sphere.triangle_count(), 8 * 12 * 2);
        assert_eq!(sphere.first_invalid_index(), None);
        for p in &sphere.positions {
            assert!((p.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_invalid_index_detected() {
        let g = Geometry::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![[0, 1, 3]]);
        assert_eq!(g.first_invalid_index(), Some(3));
        assert!(g.triangle(0).is_none());
    }

    #[test]
    fn test_geometry_key_identity() {
        let a = Geometry::cube(1.0).shared();
        let b = Geometry::cube(1.0).shared();
        assert_eq!(GeometryKey::of(&a), GeometryKey::of(&Arc::clone(&a)));
        assert_ne!(GeometryKey::of(&a), GeometryKey::of(&b));
    }
}
