//! Tile atlas for baked per-mesh fields
//!
//! Every baked volume is uploaded into a slot of one shared 3D texture so
//! a single binding serves the rasterize kernels. Slots are allocated
//! along X with a simple rolling offset; fields are immutable once
//! uploaded and freed only with the whole atlas.

use glam::{UVec3, Vec3};
use render_core::wgpu;
use sdf_bake::MeshDistanceField;

pub const FIELD_ATLAS_HEIGHT: u32 = 128;
pub const FIELD_ATLAS_WIDTH: u32 = 2048;

/// Placement of one baked field inside the atlas.
#[derive(Debug, Clone, Copy)]
pub struct FieldSlot {
    pub origin: UVec3,
    pub size: UVec3,
}

impl FieldSlot {
    /// Compose the field's local->UVW mapping with this slot's placement,
    /// yielding the final constants for `ObjectRasterizeData`.
    pub fn atlas_mapping(&self, field: &MeshDistanceField) -> (Vec3, Vec3) {
        let atlas_size = Vec3::new(
            FIELD_ATLAS_WIDTH as f32,
            FIELD_ATLAS_HEIGHT as f32,
            FIELD_ATLAS_HEIGHT as f32,
        );
        let scale = self.size.as_vec3() / atlas_size;
        let offset = self.origin.as_vec3() / atlas_size;
        let mul = field.local_to_uvw_mul * scale;
        let add = field.local_to_uvw_add * scale + offset;
        (mul, add)
    }
}

/// The shared field texture plus its allocator cursor.
pub struct FieldAtlas {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    cursor_x: u32,
}

impl FieldAtlas {
    pub fn new(device: &wgpu::Device) -> Self {
        // Sampled-only: baked fields are uploaded by copy and read through
        // the sampler, never written by compute.
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("sdf_field_atlas"),
            size: wgpu::Extent3d {
                width: FIELD_ATLAS_WIDTH,
                height: FIELD_ATLAS_HEIGHT,
                depth_or_array_layers: FIELD_ATLAS_HEIGHT,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: wgpu::TextureFormat::R16Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("sdf_field_sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });
        Self {
            texture,
            view,
            sampler,
            cursor_x: 0,
        }
    }

    /// Upload mip 0 of a baked field. Returns `None` when the atlas is
    /// out of space; the object then stays excluded from rasterization
    /// until the atlas is rebuilt.
    pub fn upload(&mut self, queue: &wgpu::Queue, field: &MeshDistanceField) -> Option<FieldSlot> {
        let size = field.volume.size;
        if size.y > FIELD_ATLAS_HEIGHT || size.z > FIELD_ATLAS_HEIGHT {
            log::warn!("baked field {}x{}x{} exceeds atlas slice", size.x, size.y, size.z);
            return None;
        }
        if self.cursor_x + size.x > FIELD_ATLAS_WIDTH {
            log::warn!("field atlas exhausted at {} texels", self.cursor_x);
            return None;
        }
        let slot = FieldSlot {
            origin: UVec3::new(self.cursor_x, 0, 0),
            size,
        };
        self.cursor_x += size.x;

        let mut bytes = Vec::with_capacity(field.volume.mips[0].len() * 2);
        for texel in &field.volume.mips[0] {
            bytes.extend_from_slice(&texel.to_bits().to_le_bytes());
        }
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: slot.origin.x,
                    y: 0,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            &bytes,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(size.x * 2),
                rows_per_image: Some(size.y),
            },
            wgpu::Extent3d {
                width: size.x,
                height: size.y,
                depth_or_array_layers: size.z,
            },
        );
        Some(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use half::f16;
    use math_util::Aabb;
    use sdf_bake::SdfVolume;

    #[test]
    fn test_slot_mapping_composes_offsets() {
        let bounds = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let (mul, add) = MeshDistanceField::uvw_mapping(&bounds);
        let field = MeshDistanceField {
            volume: SdfVolume {
                size: UVec3::new(64, 64, 64),
                mips: vec![vec![f16::from_f32(0.5); 64 * 64 * 64]],
            },
            max_distance: 2.0,
            local_to_uvw_mul: mul,
            local_to_uvw_add: add,
            local_bounds: bounds,
        };
        let slot = FieldSlot {
            origin: UVec3::new(128, 0, 0),
            size: UVec3::new(64, 64, 64),
        };
        let (amul, aadd) = slot.atlas_mapping(&field);
        // Local min corner lands on the slot origin, max corner on its end.
        let uvw_min = bounds.min * amul + aadd;
        let uvw_max = bounds.max * amul + aadd;
        assert!((uvw_min.x - 128.0 / 2048.0).abs() < 1e-5);
        assert!((uvw_max.x - 192.0 / 2048.0).abs() < 1e-5);
        assert!((uvw_min.y - 0.0).abs() < 1e-5);
        assert!((uvw_max.y - 0.5).abs() < 1e-5);
    }
}
