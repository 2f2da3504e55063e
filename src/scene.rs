//! Scene contents: the transform hierarchy, resources, and draw order.

use glam::Mat4;
use hecs::Entity;

use crate::ecs::{MaterialId, MeshId, Renderable, TextureId};
use crate::error::{RenderError, Result};
use crate::gpu::GpuContext;
use crate::hierarchy::SceneGraph;
use crate::material::{GpuMaterial, Material, MaterialLayout, MaterialTextures};
use crate::mesh::Mesh;
use crate::texture::Texture;
use crate::transform::Transform;

/// Per-entity matrices handed to the model uniform slots.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct DrawItem {
    pub world: Mat4,
    pub world_inverse_transpose: Mat4,
    pub renderable: Renderable,
}

/// Everything the renderer draws besides lights and sky.
///
/// Entities are drawn in the order they were spawned.
#[derive(Default)]
pub struct Scene {
    graph: SceneGraph,
    meshes: Vec<Mesh>,
    textures: Vec<Texture>,
    materials: Vec<(Material, GpuMaterial)>,
    draw_list: Vec<Entity>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshId {
        self.meshes.push(mesh);
        MeshId(self.meshes.len() - 1)
    }

    pub fn add_texture(&mut self, texture: Texture) -> TextureId {
        self.textures.push(texture);
        TextureId(self.textures.len() - 1)
    }

    /// Builds the material's bind group. All four texture ids must exist.
    pub fn add_material(
        &mut self,
        gpu: &GpuContext,
        layout: &MaterialLayout,
        material: Material,
    ) -> Result<MaterialId> {
        let textures = MaterialTextures {
            albedo: self.texture(material.albedo)?,
            normal: self.texture(material.normal)?,
            roughness: self.texture(material.roughness)?,
            metalness: self.texture(material.metalness)?,
        };
        let gpu_material = GpuMaterial::new(gpu, layout, &material, textures);
        self.materials.push((material, gpu_material));
        Ok(MaterialId(self.materials.len() - 1))
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0).map(|(material, _)| material)
    }

    /// Edits a material's scalar parameters and uploads them.
    pub fn edit_material(
        &mut self,
        gpu: &GpuContext,
        id: MaterialId,
        edit: impl FnOnce(&mut Material),
    ) -> Result<()> {
        let (material, gpu_material) = self
            .materials
            .get_mut(id.0)
            .ok_or(RenderError::UnknownHandle {
                kind: "material",
                index: id.0,
            })?;
        edit(material);
        gpu_material.update(gpu, material);
        Ok(())
    }

    /// Spawns a drawable entity at the end of the draw list.
    pub fn spawn_entity(
        &mut self,
        transform: Transform,
        mesh: MeshId,
        material: MaterialId,
    ) -> Result<Entity> {
        self.check_handles(mesh, material)?;
        let entity = self
            .graph
            .spawn_with(transform, Renderable::new(mesh, material));
        self.draw_list.push(entity);
        Ok(entity)
    }

    /// Removes an entity; its children are detached and stay in the scene.
    pub fn despawn_entity(&mut self, entity: Entity) -> bool {
        self.draw_list.retain(|&e| e != entity);
        self.graph.despawn(entity)
    }

    /// Drawable entities in draw order.
    pub fn entities(&self) -> &[Entity] {
        &self.draw_list
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    pub fn mesh(&self, id: MeshId) -> Option<&Mesh> {
        self.meshes.get(id.0)
    }

    pub(crate) fn gpu_material(&self, id: MaterialId) -> Option<&GpuMaterial> {
        self.materials.get(id.0).map(|(_, gpu_material)| gpu_material)
    }

    /// Refreshes stale world matrices and lists what to draw, in draw order.
    pub(crate) fn draw_items(&mut self) -> Vec<DrawItem> {
        let mut items = Vec::with_capacity(self.draw_list.len());
        for &entity in &self.draw_list {
            let Some(renderable) = self
                .graph
                .world()
                .get::<&Renderable>(entity)
                .ok()
                .map(|r| *r)
            else {
                continue;
            };
            let (Some(world), Some(world_inverse_transpose)) = (
                self.graph.world_matrix(entity),
                self.graph.world_inverse_transpose(entity),
            ) else {
                continue;
            };
            items.push(DrawItem {
                world,
                world_inverse_transpose,
                renderable,
            });
        }
        items
    }

    fn texture(&self, id: TextureId) -> Result<&Texture> {
        self.textures.get(id.0).ok_or(RenderError::UnknownHandle {
            kind: "texture",
            index: id.0,
        })
    }

    fn check_handles(&self, mesh: MeshId, material: MaterialId) -> Result<()> {
        if mesh.0 >= self.meshes.len() {
            return Err(RenderError::UnknownHandle {
                kind: "mesh",
                index: mesh.0,
            });
        }
        if material.0 >= self.materials.len() {
            return Err(RenderError::UnknownHandle {
                kind: "material",
                index: material.0,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawning_with_unknown_handles_fails() {
        let mut scene = Scene::new();
        let result = scene.spawn_entity(Transform::new(), MeshId(0), MaterialId(0));
        assert!(matches!(
            result,
            Err(RenderError::UnknownHandle { kind: "mesh", index: 0 })
        ));
        assert!(scene.entities().is_empty());
        assert!(scene.graph().is_empty());
    }

    #[test]
    fn draw_items_skip_plain_transforms() {
        let mut scene = Scene::new();
        let plain = scene.graph_mut().spawn(Transform::new());
        scene.draw_list.push(plain);
        assert!(scene.draw_items().is_empty());
    }

    #[test]
    fn despawn_removes_from_draw_list() {
        let mut scene = Scene::new();
        let entity = scene.graph_mut().spawn(Transform::new());
        scene.draw_list.push(entity);
        assert!(scene.despawn_entity(entity));
        assert!(scene.entities().is_empty());
        assert!(!scene.despawn_entity(entity));
    }
}
