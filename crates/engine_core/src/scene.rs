//! Scene model consumed by the GI pipeline

use crate::handle::{ObjectHandle, ObjectTable};
use glam::{Mat4, Vec3};
use math_util::{Aabb, Obb};
use sdf_bake::MeshDistanceField;

/// Index into the scene's mesh list.
pub type MeshId = usize;

/// Baked-field lifecycle of a mesh.
pub enum FieldState {
    /// Never baked, or the baked file was missing/unreadable.
    NeedsBake,
    Baked(MeshDistanceField),
}

impl FieldState {
    pub fn is_baked(&self) -> bool {
        matches!(self, FieldState::Baked(_))
    }

    pub fn field(&self) -> Option<&MeshDistanceField> {
        match self {
            FieldState::Baked(field) => Some(field),
            FieldState::NeedsBake => None,
        }
    }
}

/// Immutable triangle mesh plus its distance-field state.
pub struct MeshAsset {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub local_bounds: Aabb,
    pub field: FieldState,
}

impl MeshAsset {
    pub fn new(name: impl Into<String>, positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        let mut local_bounds = Aabb::empty();
        for &p in &positions {
            local_bounds.expand_point(p);
        }
        Self {
            name: name.into(),
            positions,
            indices,
            local_bounds,
            field: FieldState::NeedsBake,
        }
    }
}

/// One placed object.
pub struct SceneObject {
    pub mesh: MeshId,
    pub transform: Mat4,
    /// Bumped on every transform change; drives incremental updates.
    pub revision: u32,
    pub albedo: [f32; 4],
    pub roughness: f32,
    pub metalness: f32,
    pub emissive: f32,
}

impl SceneObject {
    pub fn new(mesh: MeshId, transform: Mat4) -> Self {
        Self {
            mesh,
            transform,
            revision: 0,
            albedo: [0.8, 0.8, 0.8, 1.0],
            roughness: 0.7,
            metalness: 0.0,
            emissive: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    Directional,
    Point,
    Spot,
}

pub struct Light {
    pub kind: LightKind,
    /// Position for point/spot, direction for directional.
    pub position: Vec3,
    pub color: Vec3,
    pub radius: f32,
    /// Bumped on any change; gates tile relighting.
    pub revision: u32,
}

/// The world as the GI systems see it.
#[derive(Default)]
pub struct Scene {
    pub meshes: Vec<MeshAsset>,
    pub objects: ObjectTable<SceneObject>,
    pub lights: Vec<Light>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mesh(&mut self, mesh: MeshAsset) -> MeshId {
        self.meshes.push(mesh);
        self.meshes.len() - 1
    }

    pub fn spawn(&mut self, object: SceneObject) -> ObjectHandle {
        self.objects.insert(object)
    }

    pub fn despawn(&mut self, handle: ObjectHandle) -> bool {
        self.objects.remove(handle).is_some()
    }

    pub fn set_transform(&mut self, handle: ObjectHandle, transform: Mat4) -> bool {
        match self.objects.get_mut(handle) {
            Some(object) => {
                object.transform = transform;
                object.revision = object.revision.wrapping_add(1);
                true
            }
            None => false,
        }
    }

    /// World-space bounds of an object.
    pub fn object_bounds(&self, object: &SceneObject) -> Option<Obb> {
        let mesh = self.meshes.get(object.mesh)?;
        Some(Obb::from_aabb_transform(&mesh.local_bounds, object.transform))
    }

    /// Union of all object bounds; drives the probe grid placement.
    pub fn world_bounds(&self) -> Aabb {
        let mut bounds = Aabb::empty();
        let mut any = false;
        for (_, object) in self.objects.iter() {
            if let Some(obb) = self.object_bounds(object) {
                let radius = obb.radius();
                bounds.expand_point(obb.center - Vec3::splat(radius));
                bounds.expand_point(obb.center + Vec3::splat(radius));
                any = true;
            }
        }
        if !any {
            bounds = Aabb::cube(Vec3::ZERO, 1.0);
        }
        bounds
    }

    pub fn pending_bake_count(&self) -> usize {
        self.meshes.iter().filter(|m| !m.field.is_baked()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_mesh() -> MeshAsset {
        MeshAsset::new(
            "tri",
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![0, 1, 2],
        )
    }

    #[test]
    fn test_mesh_bounds_computed() {
        let mesh = triangle_mesh();
        assert_eq!(mesh.local_bounds.min, Vec3::ZERO);
        assert_eq!(mesh.local_bounds.max, Vec3::new(1.0, 1.0, 0.0));
        assert!(!mesh.field.is_baked());
    }

    #[test]
    fn test_transform_bumps_revision() {
        let mut scene = Scene::new();
        let mesh = scene.add_mesh(triangle_mesh());
        let handle = scene.spawn(SceneObject::new(mesh, Mat4::IDENTITY));
        assert_eq!(scene.objects.get(handle).unwrap().revision, 0);
        scene.set_transform(handle, Mat4::from_translation(Vec3::X));
        assert_eq!(scene.objects.get(handle).unwrap().revision, 1);
    }

    #[test]
    fn test_world_bounds_covers_objects() {
        let mut scene = Scene::new();
        let mesh = scene.add_mesh(triangle_mesh());
        scene.spawn(SceneObject::new(mesh, Mat4::from_translation(Vec3::splat(10.0))));
        let bounds = scene.world_bounds();
        assert!(bounds.contains_point(Vec3::splat(10.5)));
    }

    #[test]
    fn test_empty_scene_has_fallback_bounds() {
        let scene = Scene::new();
        let bounds = scene.world_bounds();
        assert!(bounds.contains_point(Vec3::ZERO));
    }
}
