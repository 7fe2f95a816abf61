/// Draw items and the arena pools they index into.
///
/// Meshes and materials are owned by the pools; a `DrawItem` is a small
/// `Copy` record holding stable indices, so items can be sorted, shared
/// across worker threads and passed by value without lifetime ties.
use super::material::PbrMaterial;
use super::mesh::Mesh;
use glam::{Mat3, Mat4, Vec3};

/// Index of a mesh in a `MeshPool`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MeshId(pub usize);

/// Index of a material in a `MaterialPool`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaterialId(pub usize);

#[derive(Clone, Debug, Default)]
pub struct MeshPool {
    meshes: Vec<Mesh>,
}

impl MeshPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, mesh: Mesh) -> MeshId {
        self.meshes.push(mesh);
        MeshId(self.meshes.len() - 1)
    }

    #[inline]
    pub fn get(&self, id: MeshId) -> Option<&Mesh> {
        self.meshes.get(id.0)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MaterialPool {
    materials: Vec<PbrMaterial>,
}

impl MaterialPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, material: PbrMaterial) -> MaterialId {
        self.materials.push(material);
        MaterialId(self.materials.len() - 1)
    }

    #[inline]
    pub fn get(&self, id: MaterialId) -> Option<&PbrMaterial> {
        self.materials.get(id.0)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

/// One mesh drawn with one material under one transform.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DrawItem {
    pub mesh: MeshId,
    pub material: MaterialId,
    pub model: Mat4,
    /// Inverse-transpose of the model's upper 3x3.
    pub normal_matrix: Mat3,
}

impl DrawItem {
    pub fn new(mesh: MeshId, material: MaterialId, model: Mat4) -> Self {
        Self {
            mesh,
            material,
            model,
            normal_matrix: normal_matrix(&model),
        }
    }

    /// World-space translation of the item, used as its sort position.
    #[inline]
    pub fn position(&self) -> Vec3 {
        self.model.w_axis.truncate()
    }
}

/// Inverse-transpose of the upper 3x3, falling back to the plain 3x3 for
/// singular transforms.
pub fn normal_matrix(model: &Mat4) -> Mat3 {
    let m = Mat3::from_mat4(*model);
    if m.determinant().abs() > f32::EPSILON {
        m.inverse().transpose()
    } else {
        m
    }
}

/// Everything one frame draws: the pools and the flat item list.
#[derive(Clone, Debug, Default)]
pub struct RenderQueue {
    pub meshes: MeshPool,
    pub materials: MaterialPool,
    pub items: Vec<DrawItem>,
}

impl RenderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshId {
        self.meshes.add(mesh)
    }

    pub fn add_material(&mut self, material: PbrMaterial) -> MaterialId {
        self.materials.add(material)
    }

    pub fn push(&mut self, mesh: MeshId, material: MaterialId, model: Mat4) {
        self.items.push(DrawItem::new(mesh, material, model));
    }
}
