//! Median-split BVH builder with a flattened, GPU-compatible node layout.
//!
//! The same builder indexes triangles (bottom level) and instances (top
//! level). Nodes are emitted in pre-order so the root is always node 0.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Recursion cap; a median split never gets close for realistic inputs.
const MAX_DEPTH: u32 = 64;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    /// Inverted bounds, the identity for [`Aabb::union`].
    pub const fn empty() -> Self {
        Self {
            min: Vec3::INFINITY,
            max: Vec3::NEG_INFINITY,
        }
    }

    /// Bounds of a set of points.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        points.into_iter().fold(Self::empty(), |mut aabb, p| {
            aabb.expand_point(p);
            aabb
        })
    }

    pub fn expand_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn is_valid(&self) -> bool {
        self.min.cmple(self.max).all()
    }

    /// The eight corners.
    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }
}

/// BVH node matching the WGSL `BvhNode` struct (48 bytes).
///
/// Internal nodes store child node indices in `left`/`right`; leaves store
/// the first primitive and the primitive count.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[allow(clippy::pub_underscore_fields)]
pub struct GpuBvhNode {
    pub aabb_min: [f32; 3],
    pub left: u32,
    pub aabb_max: [f32; 3],
    pub right: u32,
    /// Bit 0 set for leaves.
    pub flags: u32,
    pub _padding: [u32; 3],
}

const _: () = assert!(std::mem::size_of::<GpuBvhNode>() == 48);

impl GpuBvhNode {
    fn internal(aabb: Aabb, left: u32, right: u32) -> Self {
        Self {
            aabb_min: aabb.min.to_array(),
            left,
            aabb_max: aabb.max.to_array(),
            right,
            flags: 0,
            _padding: [0; 3],
        }
    }

    fn leaf(aabb: Aabb, first: u32, count: u32) -> Self {
        Self {
            aabb_min: aabb.min.to_array(),
            left: first,
            aabb_max: aabb.max.to_array(),
            right: count,
            flags: 1,
            _padding: [0; 3],
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.flags & 1 != 0
    }

    pub fn aabb(&self) -> Aabb {
        Aabb {
            min: Vec3::from_array(self.aabb_min),
            max: Vec3::from_array(self.aabb_max),
        }
    }
}

/// Output of [`build_bvh`].
#[derive(Debug, Clone, Default)]
pub struct BvhBuild {
    /// Nodes, root first.
    pub nodes: Vec<GpuBvhNode>,
    /// Primitive indices in leaf order; leaves refer to ranges of this.
    pub order: Vec<u32>,
    /// Deepest level reached.
    pub max_depth: u32,
}

/// Index of the largest component; ties go to the lower axis.
fn widest_axis(extent: Vec3) -> usize {
    if extent.x >= extent.y && extent.x >= extent.z {
        0
    } else if extent.y >= extent.z {
        1
    } else {
        2
    }
}

/// Builds a BVH over primitive bounds.
///
/// Returns an empty build for an empty input.
pub fn build_bvh(bounds: &[Aabb], max_leaf_size: usize) -> BvhBuild {
    let mut build = BvhBuild {
        nodes: Vec::with_capacity(bounds.len().saturating_mul(2)),
        order: (0..bounds.len() as u32).collect(),
        max_depth: 0,
    };
    if bounds.is_empty() {
        return build;
    }

    let centroids: Vec<Vec3> = bounds.iter().map(Aabb::center).collect();
    let mut ctx = BuildContext {
        bounds,
        centroids: &centroids,
        max_leaf_size: max_leaf_size.max(1),
    };
    let len = build.order.len();
    ctx.build_node(&mut build, 0, len, 0);
    build
}

struct BuildContext<'a> {
    bounds: &'a [Aabb],
    centroids: &'a [Vec3],
    max_leaf_size: usize,
}

impl BuildContext<'_> {
    fn build_node(&mut self, out: &mut BvhBuild, first: usize, count: usize, depth: u32) -> u32 {
        out.max_depth = out.max_depth.max(depth);
        let range = &mut out.order[first..first + count];
        let aabb = range
            .iter()
            .fold(Aabb::empty(), |acc, &i| acc.union(self.bounds[i as usize]));

        let node_idx = out.nodes.len() as u32;
        if count <= self.max_leaf_size || depth >= MAX_DEPTH {
            out.nodes
                .push(GpuBvhNode::leaf(aabb, first as u32, count as u32));
            return node_idx;
        }

        // Split at the median centroid along the widest centroid axis
        let centroid_bounds = Aabb::from_points(range.iter().map(|&i| self.centroids[i as usize]));
        let axis = widest_axis(centroid_bounds.extent());
        let mid = count / 2;
        let centroids = self.centroids;
        range.select_nth_unstable_by(mid, |&a, &b| {
            centroids[a as usize][axis].total_cmp(&centroids[b as usize][axis])
        });

        // Reserve the slot so the parent precedes its children
        out.nodes.push(GpuBvhNode::leaf(aabb, 0, 0));
        let left = self.build_node(out, first, mid, depth + 1);
        let right = self.build_node(out, first + mid, count - mid, depth + 1);
        out.nodes[node_idx as usize] = GpuBvhNode::internal(aabb, left, right);
        node_idx
    }
}
