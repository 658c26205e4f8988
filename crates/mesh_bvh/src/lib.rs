//! SAH bounding-volume hierarchy over triangle meshes
//!
//! Build uses the surface area heuristic: binned splits for large nodes,
//! exact sorted splits for small ones. Construction forks a worker thread
//! per subtree while a shared atomic thread budget lasts, then falls back
//! to an explicit-stack iterative build.
//!
//! Queries answer nearest ray hits and closest surface points; both are
//! what the distance-field baker needs and nothing more.

#![forbid(unsafe_code)]

mod build;
mod query;
mod triangle;

pub use query::{ClosestPoint, Hit};
pub use triangle::Triangle;

use math_util::Aabb;

/// One flat-arena node. `count > 0` marks a leaf owning
/// `tri_order[first..first + count]`; internal nodes store child indices.
#[derive(Debug, Clone, Copy)]
pub struct Node {
    pub aabb: Aabb,
    /// Leaf: first slot in `tri_order`. Internal: left child index.
    pub first_or_left: u32,
    /// Leaf: unused. Internal: right child index.
    pub right: u32,
    /// Triangle count; zero for internal nodes.
    pub count: u32,
}

impl Node {
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.count > 0
    }
}

/// Bounding-volume hierarchy over a triangle soup.
pub struct Bvh {
    pub(crate) nodes: Vec<Node>,
    /// Permutation of triangle indices; leaves reference ranges of it.
    pub(crate) tri_order: Vec<u32>,
    pub(crate) triangles: Vec<Triangle>,
}

impl Bvh {
    /// Build over `indices.len() / 3` triangles. `max_threads` bounds the
    /// number of extra worker threads forked during construction.
    pub fn build(positions: &[glam::Vec3], indices: &[u32], max_threads: usize) -> Self {
        build::build(positions, indices, max_threads)
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn triangle(&self, index: u32) -> &Triangle {
        &self.triangles[index as usize]
    }

    /// Root bounds; `None` for an empty mesh.
    pub fn bounds(&self) -> Option<Aabb> {
        self.nodes.first().map(|n| n.aabb)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn cube_mesh() -> (Vec<Vec3>, Vec<u32>) {
        let positions = vec![
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::new(1.0, -1.0, -1.0),
            Vec3::new(1.0, 1.0, -1.0),
            Vec3::new(-1.0, 1.0, -1.0),
            Vec3::new(-1.0, -1.0, 1.0),
            Vec3::new(1.0, -1.0, 1.0),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(-1.0, 1.0, 1.0),
        ];
        let indices = vec![
            0, 2, 1, 0, 3, 2, // -Z
            4, 5, 6, 4, 6, 7, // +Z
            0, 1, 5, 0, 5, 4, // -Y
            3, 6, 2, 3, 7, 6, // +Y
            0, 4, 7, 0, 7, 3, // -X
            1, 2, 6, 1, 6, 5, // +X
        ];
        (positions, indices)
    }

    #[test]
    fn test_every_triangle_in_exactly_one_leaf() {
        let (positions, indices) = cube_mesh();
        let bvh = Bvh::build(&positions, &indices, 0);
        assert_eq!(bvh.triangle_count(), 12);

        let mut seen = vec![0usize; bvh.triangle_count()];
        for node in &bvh.nodes {
            if node.is_leaf() {
                let first = node.first_or_left as usize;
                for &tri in &bvh.tri_order[first..first + node.count as usize] {
                    seen[tri as usize] += 1;
                }
            }
        }
        assert!(seen.iter().all(|&c| c == 1), "leaf coverage: {seen:?}");
    }

    #[test]
    fn test_empty_mesh() {
        let bvh = Bvh::build(&[], &[], 4);
        assert!(bvh.is_empty());
        assert!(bvh.bounds().is_none());
        let ray = math_util::Ray::new(Vec3::ZERO, Vec3::X);
        assert!(bvh.intersect(&ray, 0.0, f32::MAX).is_none());
        assert!(bvh.closest_point(Vec3::ZERO, f32::MAX).is_none());
    }

    #[test]
    fn test_parallel_build_matches_sequential() {
        let (positions, indices) = cube_mesh();
        let seq = Bvh::build(&positions, &indices, 0);
        let par = Bvh::build(&positions, &indices, 8);
        assert_eq!(seq.triangle_count(), par.triangle_count());
        // Same root bounds and same leaf coverage regardless of threading.
        assert_eq!(seq.bounds().unwrap(), par.bounds().unwrap());
        let mut a: Vec<u32> = seq.tri_order.clone();
        let mut b: Vec<u32> = par.tri_order.clone();
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }
}
