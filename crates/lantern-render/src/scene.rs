// SPDX-License-Identifier: CEPL-1.0
use std::collections::BTreeMap;
use std::sync::Arc;

use glam::Vec3;
use lantern_math::Transform;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DrawableId(u32);

impl DrawableId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshHandle(u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureHandle(u32);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLight {
    pub intensity: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self { intensity: 10.0 }
    }
}

#[derive(Clone, Debug)]
pub struct Drawable {
    id: DrawableId,
    pub mesh: Option<MeshHandle>,
    pub texture: Option<TextureHandle>,
    pub color: Vec3,
    pub transform: Transform,
    pub point_light: Option<PointLight>,
}

impl Drawable {
    pub fn id(&self) -> DrawableId {
        self.id
    }
}

/// All drawables, iterated in id order.
#[derive(Debug, Default)]
pub struct Scene {
    next_id: u32,
    drawables: BTreeMap<DrawableId, Drawable>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self) -> &mut Drawable {
        let id = DrawableId(self.next_id);
        self.next_id += 1;
        self.drawables.entry(id).or_insert(Drawable {
            id,
            mesh: None,
            texture: None,
            color: Vec3::ONE,
            transform: Transform::default(),
            point_light: None,
        })
    }

    /// A light billboard; `radius` is carried in the x scale.
    pub fn spawn_point_light(&mut self, intensity: f32, radius: f32, color: Vec3) -> &mut Drawable {
        let light = self.spawn();
        light.color = color;
        light.transform.scale.x = radius;
        light.point_light = Some(PointLight { intensity });
        light
    }

    pub fn get(&self, id: DrawableId) -> Option<&Drawable> {
        self.drawables.get(&id)
    }

    pub fn get_mut(&mut self, id: DrawableId) -> Option<&mut Drawable> {
        self.drawables.get_mut(&id)
    }

    pub fn remove(&mut self, id: DrawableId) -> Option<Drawable> {
        self.drawables.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Drawable> {
        self.drawables.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Drawable> {
        self.drawables.values_mut()
    }

    pub fn lights(&self) -> impl Iterator<Item = &Drawable> {
        self.iter().filter(|d| d.point_light.is_some())
    }

    pub fn len(&self) -> usize {
        self.drawables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drawables.is_empty()
    }
}

/// Shared meshes and textures. Drawables hold handles, the table holds the
/// assets; an `Arc` clone keeps one alive while a pass is using it.
#[derive(Debug)]
pub struct AssetTable<M, T> {
    meshes: Vec<Arc<M>>,
    textures: Vec<Arc<T>>,
}

impl<M, T> Default for AssetTable<M, T> {
    fn default() -> Self {
        Self {
            meshes: Vec::new(),
            textures: Vec::new(),
        }
    }
}

impl<M, T> AssetTable<M, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_mesh(&mut self, mesh: M) -> MeshHandle {
        self.meshes.push(Arc::new(mesh));
        MeshHandle(self.meshes.len() as u32 - 1)
    }

    pub fn insert_texture(&mut self, texture: T) -> TextureHandle {
        self.textures.push(Arc::new(texture));
        TextureHandle(self.textures.len() as u32 - 1)
    }

    pub fn mesh(&self, handle: MeshHandle) -> Option<&Arc<M>> {
        self.meshes.get(handle.0 as usize)
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&Arc<T>> {
        self.textures.get(handle.0 as usize)
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_ordered() {
        let mut scene = Scene::new();
        let a = scene.spawn().id();
        let b = scene.spawn().id();
        scene.remove(a);
        let c = scene.spawn().id();
        assert!(a < b && b < c);
        let order: Vec<_> = scene.iter().map(Drawable::id).collect();
        assert_eq!(order, vec![b, c]);
    }

    #[test]
    fn point_light_radius_lives_in_scale_x() {
        let mut scene = Scene::new();
        let id = scene.spawn_point_light(2.0, 0.25, Vec3::X).id();
        scene.spawn();
        let light = scene.get(id).unwrap();
        assert_eq!(light.transform.scale.x, 0.25);
        assert_eq!(light.point_light, Some(PointLight { intensity: 2.0 }));
        assert_eq!(scene.lights().count(), 1);
    }

    #[test]
    fn handles_share_one_asset() {
        let mut assets: AssetTable<&'static str, ()> = AssetTable::new();
        let cube = assets.insert_mesh("cube");
        let mut scene = Scene::new();
        scene.spawn().mesh = Some(cube);
        scene.spawn().mesh = Some(cube);

        let held: Vec<_> = scene
            .iter()
            .filter_map(|d| d.mesh)
            .filter_map(|h| assets.mesh(h).cloned())
            .collect();
        assert_eq!(held.len(), 2);
        assert_eq!(Arc::strong_count(&held[0]), 3);
        assert_eq!(assets.mesh_count(), 1);
    }
}
