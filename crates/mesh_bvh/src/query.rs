//! Ray and closest-point queries
//!
//! Both traversals are iterative with a fixed-depth stack and visit the
//! nearer child first so the far branch can be pruned by the best result
//! found so far.

use crate::{Bvh, Node};
use glam::Vec3;
use math_util::Ray;

const MAX_STACK: usize = 64;
const RAY_EPSILON: f32 = 1e-8;

/// Nearest ray-triangle intersection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub t: f32,
    pub triangle: u32,
    /// Barycentric coordinates of the hit inside the triangle.
    pub u: f32,
    pub v: f32,
    /// True when the ray struck the triangle from its back side.
    pub backface: bool,
}

/// Nearest surface point result.
#[derive(Debug, Clone, Copy)]
pub struct ClosestPoint {
    pub point: Vec3,
    pub triangle: u32,
    pub dist_sq: f32,
}

impl Bvh {
    /// Nearest hit with `t in [max(t_min, 0), t_max]`, or `None`.
    pub fn intersect(&self, ray: &Ray, t_min: f32, t_max: f32) -> Option<Hit> {
        if self.nodes.is_empty() {
            return None;
        }
        let t_min = t_min.max(0.0);
        let mut best: Option<Hit> = None;
        let mut best_t = t_max;

        let mut stack = [0u32; MAX_STACK];
        let mut top = 0usize;
        stack[top] = 0;
        top += 1;

        while top > 0 {
            top -= 1;
            let node = &self.nodes[stack[top] as usize];
            if ray.aabb_entry(&node.aabb, t_min, best_t).is_none() {
                continue;
            }

            if node.is_leaf() {
                let first = node.first_or_left as usize;
                for &tri_index in &self.tri_order[first..first + node.count as usize] {
                    if let Some(hit) = intersect_triangle(self, tri_index, ray, t_min, best_t) {
                        best_t = hit.t;
                        best = Some(hit);
                    }
                }
            } else {
                self.push_children_near_first(node, ray, t_min, best_t, &mut stack, &mut top);
            }
        }

        best
    }

    /// Closest point on the mesh within `max_dist` of `point`, or `None`.
    pub fn closest_point(&self, point: Vec3, max_dist: f32) -> Option<ClosestPoint> {
        if self.nodes.is_empty() {
            return None;
        }
        let mut best: Option<ClosestPoint> = None;
        let mut best_dist_sq = max_dist * max_dist;

        let mut stack = [0u32; MAX_STACK];
        let mut top = 0usize;
        stack[top] = 0;
        top += 1;

        while top > 0 {
            top -= 1;
            let node = &self.nodes[stack[top] as usize];
            if node.aabb.distance_squared_to_point(point) > best_dist_sq {
                continue;
            }

            if node.is_leaf() {
                let first = node.first_or_left as usize;
                for &tri_index in &self.tri_order[first..first + node.count as usize] {
                    let closest = self.triangles[tri_index as usize].closest_point(point);
                    let dist_sq = (closest - point).length_squared();
                    if dist_sq < best_dist_sq {
                        best_dist_sq = dist_sq;
                        best = Some(ClosestPoint {
                            point: closest,
                            triangle: tri_index,
                            dist_sq,
                        });
                    }
                }
            } else {
                // Nearer child on top of the stack.
                let left = node.first_or_left;
                let right = node.right;
                let dl = self.nodes[left as usize].aabb.distance_squared_to_point(point);
                let dr = self.nodes[right as usize].aabb.distance_squared_to_point(point);
                let (near, far, d_far) = if dl <= dr {
                    (left, right, dr)
                } else {
                    (right, left, dl)
                };
                if d_far <= best_dist_sq && top < MAX_STACK {
                    stack[top] = far;
                    top += 1;
                }
                if top < MAX_STACK {
                    stack[top] = near;
                    top += 1;
                }
            }
        }

        best
    }

    fn push_children_near_first(
        &self,
        node: &Node,
        ray: &Ray,
        t_min: f32,
        t_max: f32,
        stack: &mut [u32; MAX_STACK],
        top: &mut usize,
    ) {
        let left = node.first_or_left;
        let right = node.right;
        let el = ray.aabb_entry(&self.nodes[left as usize].aabb, t_min, t_max);
        let er = ray.aabb_entry(&self.nodes[right as usize].aabb, t_min, t_max);
        // Push far child first so the near one is traversed next.
        match (el, er) {
            (Some(tl), Some(tr)) => {
                let (near, far) = if tl <= tr { (left, right) } else { (right, left) };
                if *top + 1 < MAX_STACK {
                    stack[*top] = far;
                    *top += 1;
                    stack[*top] = near;
                    *top += 1;
                }
            }
            (Some(_), None) => {
                if *top < MAX_STACK {
                    stack[*top] = left;
                    *top += 1;
                }
            }
            (None, Some(_)) => {
                if *top < MAX_STACK {
                    stack[*top] = right;
                    *top += 1;
                }
            }
            (None, None) => {}
        }
    }
}

/// Möller–Trumbore with an epsilon guard; degenerate triangles miss.
fn intersect_triangle(bvh: &Bvh, tri_index: u32, ray: &Ray, t_min: f32, t_max: f32) -> Option<Hit> {
    let tri = &bvh.triangles[tri_index as usize];
    let e1 = tri.v1 - tri.v0;
    let e2 = tri.v2 - tri.v0;
    let p = ray.dir.cross(e2);
    let det = e1.dot(p);
    if det.abs() < RAY_EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;
    let s = ray.origin - tri.v0;
    let u = s.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(e1);
    let v = ray.dir.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(q) * inv_det;
    if t < t_min || t >= t_max {
        return None;
    }
    Some(Hit {
        t,
        triangle: tri_index,
        u,
        v,
        backface: det < 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn sphere_like(rings: usize, segments: usize) -> (Vec<Vec3>, Vec<u32>) {
        // Coarse UV sphere, enough triangles to exercise traversal.
        let mut positions = Vec::new();
        for r in 0..=rings {
            let phi = std::f32::consts::PI * r as f32 / rings as f32;
            for s in 0..segments {
                let theta = std::f32::consts::TAU * s as f32 / segments as f32;
                positions.push(Vec3::new(
                    phi.sin() * theta.cos(),
                    phi.cos(),
                    phi.sin() * theta.sin(),
                ));
            }
        }
        let mut indices = Vec::new();
        for r in 0..rings {
            for s in 0..segments {
                let a = (r * segments + s) as u32;
                let b = (r * segments + (s + 1) % segments) as u32;
                let c = ((r + 1) * segments + s) as u32;
                let d = ((r + 1) * segments + (s + 1) % segments) as u32;
                indices.extend([a, b, c, b, d, c]);
            }
        }
        (positions, indices)
    }

    fn brute_force_hit(
        bvh: &Bvh,
        ray: &Ray,
        t_min: f32,
        t_max: f32,
    ) -> Option<Hit> {
        let mut best: Option<Hit> = None;
        let mut best_t = t_max;
        for i in 0..bvh.triangle_count() as u32 {
            if let Some(hit) = intersect_triangle(bvh, i, ray, t_min, best_t) {
                best_t = hit.t;
                best = Some(hit);
            }
        }
        best
    }

    #[test]
    fn test_intersect_matches_brute_force() {
        let (positions, indices) = sphere_like(8, 12);
        let bvh = Bvh::build(&positions, &indices, 0);

        let origins = [
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::new(3.0, 1.0, 2.0),
            Vec3::new(-4.0, 0.3, 0.1),
            Vec3::new(0.2, 5.0, 0.2),
        ];
        for origin in origins {
            let ray = Ray::new(origin, (-origin).normalize());
            let fast = bvh.intersect(&ray, 0.0, f32::MAX);
            let slow = brute_force_hit(&bvh, &ray, 0.0, f32::MAX);
            match (fast, slow) {
                (Some(a), Some(b)) => {
                    assert!((a.t - b.t).abs() < 1e-4, "t mismatch: {} vs {}", a.t, b.t)
                }
                (a, b) => assert_eq!(a.is_some(), b.is_some()),
            }
        }
    }

    #[test]
    fn test_miss_returns_none() {
        let (positions, indices) = sphere_like(6, 8);
        let bvh = Bvh::build(&positions, &indices, 0);
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Y);
        assert!(bvh.intersect(&ray, 0.0, f32::MAX).is_none());
    }

    #[test]
    fn test_closest_point_matches_brute_force() {
        let (positions, indices) = sphere_like(8, 12);
        let bvh = Bvh::build(&positions, &indices, 0);

        for point in [Vec3::ZERO, Vec3::new(2.0, 0.5, 0.0), Vec3::new(0.1, -3.0, 0.4)] {
            let fast = bvh.closest_point(point, f32::MAX).unwrap();
            let mut best = f32::MAX;
            for tri in &bvh.triangles {
                best = best.min((tri.closest_point(point) - point).length_squared());
            }
            assert!((fast.dist_sq - best).abs() < 1e-4);
        }
    }

    #[test]
    fn test_closest_point_respects_max_dist() {
        let (positions, indices) = sphere_like(6, 8);
        let bvh = Bvh::build(&positions, &indices, 0);
        // Unit sphere surface is ~9 away from this point; cap at 1.
        assert!(bvh.closest_point(Vec3::new(10.0, 0.0, 0.0), 1.0).is_none());
    }

    #[test]
    fn test_backface_flag() {
        let positions = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
        let indices = vec![0, 1, 2]; // normal points +Z
        let bvh = Bvh::build(&positions, &indices, 0);

        let front = Ray::new(Vec3::new(0.2, 0.2, 1.0), Vec3::NEG_Z);
        let back = Ray::new(Vec3::new(0.2, 0.2, -1.0), Vec3::Z);
        assert!(!bvh.intersect(&front, 0.0, f32::MAX).unwrap().backface);
        assert!(bvh.intersect(&back, 0.0, f32::MAX).unwrap().backface);
    }

    #[test]
    fn test_degenerate_triangle_no_hit() {
        let positions = vec![Vec3::ZERO, Vec3::X, Vec3::X * 2.0];
        let indices = vec![0, 1, 2];
        let bvh = Bvh::build(&positions, &indices, 0);
        let ray = Ray::new(Vec3::new(0.5, 0.0, -1.0), Vec3::Z);
        assert!(bvh.intersect(&ray, 0.0, f32::MAX).is_none());
    }
}
