//! Typed resource handles and the component that makes an entity drawable.
//!
//! Meshes, textures and materials live in flat lists on the
//! [`Scene`](crate::Scene); entities refer to them through these newtypes so
//! a texture index can never be passed where a mesh is expected.

/// Handle to a mesh added with [`Scene::add_mesh`](crate::Scene::add_mesh).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshId(pub(crate) usize);

/// Handle to a texture added with [`Scene::add_texture`](crate::Scene::add_texture).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub(crate) usize);

/// Handle to a material added with [`Scene::add_material`](crate::Scene::add_material).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MaterialId(pub(crate) usize);

/// Component pairing an entity's [`Transform`](crate::Transform) with what to draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Renderable {
    pub mesh: MeshId,
    pub material: MaterialId,
}

impl Renderable {
    pub fn new(mesh: MeshId, material: MaterialId) -> Self {
        Self { mesh, material }
    }
}
