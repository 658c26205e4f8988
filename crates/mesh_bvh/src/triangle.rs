//! Triangle data precomputed at build time

use glam::Vec3;
use math_util::Aabb;

/// A triangle with precomputed bounds and geometric normal.
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub v0: Vec3,
    pub v1: Vec3,
    pub v2: Vec3,
    /// Geometric normal; zero for degenerate triangles.
    pub normal: Vec3,
    pub aabb: Aabb,
}

impl Triangle {
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3) -> Self {
        let normal = (v1 - v0).cross(v2 - v0).normalize_or_zero();
        let mut aabb = Aabb::empty();
        aabb.expand_point(v0);
        aabb.expand_point(v1);
        aabb.expand_point(v2);
        Self { v0, v1, v2, normal, aabb }
    }

    #[inline]
    pub fn centroid(&self) -> Vec3 {
        (self.v0 + self.v1 + self.v2) / 3.0
    }

    /// Closest point on the triangle to `p` (Ericson, Real-Time Collision
    /// Detection 5.1.5).
    pub fn closest_point(&self, p: Vec3) -> Vec3 {
        let ab = self.v1 - self.v0;
        let ac = self.v2 - self.v0;
        let ap = p - self.v0;

        let d1 = ab.dot(ap);
        let d2 = ac.dot(ap);
        if d1 <= 0.0 && d2 <= 0.0 {
            return self.v0;
        }

        let bp = p - self.v1;
        let d3 = ab.dot(bp);
        let d4 = ac.dot(bp);
        if d3 >= 0.0 && d4 <= d3 {
            return self.v1;
        }

        let vc = d1 * d4 - d3 * d2;
        if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
            let denom = d1 - d3;
            let v = if denom.abs() > f32::EPSILON { d1 / denom } else { 0.0 };
            return self.v0 + ab * v;
        }

        let cp = p - self.v2;
        let d5 = ab.dot(cp);
        let d6 = ac.dot(cp);
        if d6 >= 0.0 && d5 <= d6 {
            return self.v2;
        }

        let vb = d5 * d2 - d1 * d6;
        if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
            let denom = d2 - d6;
            let w = if denom.abs() > f32::EPSILON { d2 / denom } else { 0.0 };
            return self.v0 + ac * w;
        }

        let va = d3 * d6 - d5 * d4;
        if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
            let denom = (d4 - d3) + (d5 - d6);
            let w = if denom.abs() > f32::EPSILON { (d4 - d3) / denom } else { 0.0 };
            return self.v1 + (self.v2 - self.v1) * w;
        }

        // Interior: project onto the face.
        let denom = va + vb + vc;
        if denom.abs() <= f32::EPSILON {
            return self.v0;
        }
        let v = vb / denom;
        let w = vc / denom;
        self.v0 + ab * v + ac * w
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closest_point_regions() {
        let tri = Triangle::new(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(0.0, 2.0, 0.0),
        );
        // Interior projection
        let c = tri.closest_point(Vec3::new(0.5, 0.5, 3.0));
        assert!((c - Vec3::new(0.5, 0.5, 0.0)).length() < 1e-5);
        // Vertex region
        let c = tri.closest_point(Vec3::new(-1.0, -1.0, 0.0));
        assert!((c - Vec3::ZERO).length() < 1e-5);
        // Edge region
        let c = tri.closest_point(Vec3::new(1.0, -1.0, 0.0));
        assert!((c - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_degenerate_normal_is_zero() {
        let tri = Triangle::new(Vec3::ZERO, Vec3::X, Vec3::X * 2.0);
        assert_eq!(tri.normal, Vec3::ZERO);
    }
}
