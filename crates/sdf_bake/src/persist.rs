//! Baked field persistence
//!
//! Sequential binary records: grid dimensions (u32 x3), mip count (i32),
//! then the raw f16 texels of every mip level in order. There is no
//! version header; a format change means clearing the bake directory.

use crate::volume::SdfVolume;
use glam::UVec3;
use half::f16;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// `<dir>/<name>_<millis>.sdf`
pub fn baked_file_path(dir: &Path, name: &str, bake_timestamp_millis: u64) -> PathBuf {
    dir.join(format!("{name}_{bake_timestamp_millis}.sdf"))
}

/// Best-effort write; the caller treats failure as "still needs baking".
pub fn save_volume(volume: &SdfVolume, path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;

    file.write_all(&volume.size.x.to_le_bytes())?;
    file.write_all(&volume.size.y.to_le_bytes())?;
    file.write_all(&volume.size.z.to_le_bytes())?;
    file.write_all(&(volume.mips.len() as i32).to_le_bytes())?;

    let mut bytes = Vec::new();
    for mip in &volume.mips {
        bytes.clear();
        bytes.reserve(mip.len() * 2);
        for texel in mip {
            bytes.extend_from_slice(&texel.to_bits().to_le_bytes());
        }
        file.write_all(&bytes)?;
    }
    Ok(())
}

/// Re-hydrate a baked volume. Any read or shape mismatch reads as `None`
/// so the caller re-triggers a bake instead of consuming garbage.
pub fn load_volume(path: &Path) -> Option<SdfVolume> {
    let mut data = Vec::new();
    match File::open(path).and_then(|mut f| f.read_to_end(&mut data)) {
        Ok(_) => {}
        Err(err) => {
            log::debug!("baked field {:?} unavailable: {err}", path);
            return None;
        }
    }

    let mut cursor = 0usize;
    let mut take_u32 = |data: &[u8]| -> Option<u32> {
        let bytes = data.get(cursor..cursor + 4)?;
        cursor += 4;
        Some(u32::from_le_bytes(bytes.try_into().ok()?))
    };
    let size = UVec3::new(take_u32(&data)?, take_u32(&data)?, take_u32(&data)?);
    let mip_count = take_u32(&data)? as i32;
    if mip_count <= 0 || mip_count > 3 || size.cmpeq(UVec3::ZERO).any() {
        log::warn!("baked field {:?} has invalid header", path);
        return None;
    }

    let mut volume = SdfVolume { size, mips: Vec::new() };
    for level in 0..mip_count as usize {
        let dims = volume.mip_size(level);
        let texel_count = (dims.x * dims.y * dims.z) as usize;
        let bytes = data.get(cursor..cursor + texel_count * 2)?;
        cursor += texel_count * 2;
        let mip = bytes
            .chunks_exact(2)
            .map(|b| f16::from_bits(u16::from_le_bytes([b[0], b[1]])))
            .collect();
        volume.mips.push(mip);
    }
    Some(volume)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bake::{bake, BakeConfig};
    use crate::tests::cube_mesh;
    use job_system::JobSystem;

    #[test]
    fn test_roundtrip_preserves_volume() {
        let (positions, indices) = cube_mesh(1.0);
        let jobs = JobSystem::new(2);
        let field = bake(&positions, &indices, &BakeConfig::default(), &jobs).unwrap();

        let dir = std::env::temp_dir().join("sdf_bake_roundtrip");
        let path = baked_file_path(&dir, "cube", 1234);
        save_volume(&field.volume, &path).unwrap();

        let loaded = load_volume(&path).unwrap();
        assert_eq!(loaded.size, field.volume.size);
        assert_eq!(loaded.mips.len(), field.volume.mips.len());
        for (a, b) in loaded.mips.iter().zip(&field.volume.mips) {
            assert_eq!(a, b);
        }
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_reads_as_needs_baking() {
        assert!(load_volume(Path::new("/nonexistent/cube_0.sdf")).is_none());
    }

    #[test]
    fn test_truncated_file_rejected() {
        let dir = std::env::temp_dir().join("sdf_bake_truncated");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.sdf");
        std::fs::write(&path, [1u8, 0, 0, 0, 1, 0]).unwrap();
        assert!(load_volume(&path).is_none());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_path_convention() {
        let p = baked_file_path(Path::new("sdf"), "chair", 1700000000123);
        assert_eq!(p, PathBuf::from("sdf/chair_1700000000123.sdf"));
    }
}
