//! Ray primitives and slab tests

use crate::aabb::Aabb;
use glam::Vec3;

/// A ray with precomputed inverse direction for slab tests.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
    pub inv_dir: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, dir: Vec3) -> Self {
        Self {
            origin,
            dir,
            inv_dir: dir.recip(),
        }
    }

    /// Slab test against an AABB over [t_min, t_max].
    /// Returns the entry distance when the ray overlaps the box.
    pub fn aabb_entry(&self, aabb: &Aabb, t_min: f32, t_max: f32) -> Option<f32> {
        let t0 = (aabb.min - self.origin) * self.inv_dir;
        let t1 = (aabb.max - self.origin) * self.inv_dir;
        let lo = t0.min(t1);
        let hi = t0.max(t1);
        let enter = lo.max_element().max(t_min);
        let exit = hi.min_element().min(t_max);
        if enter <= exit {
            Some(enter)
        } else {
            None
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.dir * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_and_miss() {
        let b = Aabb::cube(Vec3::ZERO, 1.0);
        let hit = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::X);
        let miss = Ray::new(Vec3::new(-5.0, 3.0, 0.0), Vec3::X);
        assert!((hit.aabb_entry(&b, 0.0, f32::MAX).unwrap() - 4.0).abs() < 1e-5);
        assert!(miss.aabb_entry(&b, 0.0, f32::MAX).is_none());
    }

    #[test]
    fn test_origin_inside() {
        let b = Aabb::cube(Vec3::ZERO, 1.0);
        let r = Ray::new(Vec3::ZERO, Vec3::X);
        // Entry clamps to t_min when starting inside.
        assert_eq!(r.aabb_entry(&b, 0.0, f32::MAX), Some(0.0));
    }

    #[test]
    fn test_axis_parallel_ray() {
        let b = Aabb::new(Vec3::ZERO, Vec3::ONE);
        // Parallel to the box face, outside the slab: must miss.
        let r = Ray::new(Vec3::new(0.5, 2.0, 0.5), Vec3::X);
        assert!(r.aabb_entry(&b, 0.0, f32::MAX).is_none());
    }
}
