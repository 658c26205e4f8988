//! Baked voxel volume and its local-space mapping

use glam::{UVec3, Vec3};
use half::f16;
use math_util::Aabb;

/// Raw voxel payload: grid dimensions plus a mip chain of f16 texels.
/// Mip 0 is `size`, each further level halves every axis (min 1).
#[derive(Debug, Clone, PartialEq)]
pub struct SdfVolume {
    pub size: UVec3,
    pub mips: Vec<Vec<f16>>,
}

impl SdfVolume {
    pub fn mip_size(&self, level: usize) -> UVec3 {
        UVec3::new(
            (self.size.x >> level).max(1),
            (self.size.y >> level).max(1),
            (self.size.z >> level).max(1),
        )
    }

    pub fn voxel_count(&self) -> usize {
        (self.size.x * self.size.y * self.size.z) as usize
    }
}

/// A mesh's baked distance field: the volume plus the transform that maps
/// local mesh space into normalized texture space.
#[derive(Debug, Clone)]
pub struct MeshDistanceField {
    pub volume: SdfVolume,
    /// Distances are stored as `d / max_distance` remapped to [0, 1].
    pub max_distance: f32,
    pub local_to_uvw_mul: Vec3,
    pub local_to_uvw_add: Vec3,
    /// Padded local-space bounds the grid covers.
    pub local_bounds: Aabb,
}

/// The padded local-space box a bake covers for a given mesh box:
/// `max(5% of size, 0.1)` of padding per axis.
pub fn padded_bake_bounds(mesh_bounds: &Aabb) -> Aabb {
    let padding = (mesh_bounds.size() * 0.05).max(Vec3::splat(0.1));
    mesh_bounds.padded(padding)
}

impl MeshDistanceField {
    /// Rebuild the full field description around a loaded volume. The
    /// mapping constants are deterministic given the mesh bounds, so a
    /// load needs only the raw voxel payload.
    pub fn from_volume(volume: SdfVolume, mesh_bounds: &Aabb) -> Self {
        let bounds = padded_bake_bounds(mesh_bounds);
        let (mul, add) = Self::uvw_mapping(&bounds);
        Self {
            volume,
            max_distance: bounds.size().max_element(),
            local_to_uvw_mul: mul,
            local_to_uvw_add: add,
            local_bounds: bounds,
        }
    }

    /// Mapping constants for a padded local-space box.
    pub fn uvw_mapping(bounds: &Aabb) -> (Vec3, Vec3) {
        let size = bounds.size().max(Vec3::splat(f32::EPSILON));
        let mul = size.recip();
        let add = -bounds.min * mul;
        (mul, add)
    }

    pub fn voxel_size(&self) -> Vec3 {
        self.local_bounds.size() / self.volume.size.as_vec3()
    }

    /// Decode the stored value at a voxel coordinate back into a signed
    /// distance in local units.
    pub fn voxel_distance(&self, x: u32, y: u32, z: u32) -> f32 {
        let s = self.volume.size;
        let idx = (x + y * s.x + z * s.x * s.y) as usize;
        let encoded = self.volume.mips[0][idx].to_f32();
        (encoded * 2.0 - 1.0) * self.max_distance
    }

    /// Nearest-voxel sample of the signed distance at a local-space point.
    /// Points outside the grid clamp to the border voxel.
    pub fn sample_local(&self, p: Vec3) -> f32 {
        let uvw = (p * self.local_to_uvw_mul + self.local_to_uvw_add).clamp(Vec3::ZERO, Vec3::ONE);
        let s = self.volume.size.as_vec3();
        let x = (uvw.x * s.x).min(s.x - 1.0) as u32;
        let y = (uvw.y * s.y).min(s.y - 1.0) as u32;
        let z = (uvw.z * s.z).min(s.z - 1.0) as u32;
        self.voxel_distance(x, y, z)
    }
}

/// Encode a signed distance into the 16-bit normalized representation.
#[inline]
pub(crate) fn encode_distance(distance: f32, max_distance: f32) -> f16 {
    let normalized = (distance / max_distance).clamp(-1.0, 1.0);
    f16::from_f32(normalized * 0.5 + 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_symmetry() {
        let mid = encode_distance(0.0, 2.0).to_f32();
        assert!((mid - 0.5).abs() < 1e-3);
        assert!(encode_distance(2.0, 2.0).to_f32() > 0.99);
        assert!(encode_distance(-2.0, 2.0).to_f32() < 0.01);
    }

    #[test]
    fn test_uvw_mapping_corners() {
        let bounds = Aabb::new(Vec3::splat(-2.0), Vec3::splat(2.0));
        let (mul, add) = MeshDistanceField::uvw_mapping(&bounds);
        assert!((bounds.min * mul + add - Vec3::ZERO).length() < 1e-6);
        assert!((bounds.max * mul + add - Vec3::ONE).length() < 1e-6);
    }

    #[test]
    fn test_mip_size_floor() {
        let v = SdfVolume {
            size: UVec3::new(33, 16, 5),
            mips: vec![],
        };
        assert_eq!(v.mip_size(1), UVec3::new(16, 8, 2));
        assert_eq!(v.mip_size(2), UVec3::new(8, 4, 1));
    }
}
