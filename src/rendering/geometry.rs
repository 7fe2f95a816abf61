/// Geometry stage: mesh + draw item -> clip-space triangles.
use super::clipper::ClipVertex;
use super::vertex_shader::VertexShader;
use crate::perf::FUNCTION_COUNTERS;
use crate::scene::{DrawItem, MaterialId, Mesh};
use crate::{count_add, count_call};
use glam::{Mat3, Mat4};

/// Three transformed corners and the material they are shaded with.
#[derive(Copy, Clone, Debug)]
pub struct Triangle {
    pub vertices: [ClipVertex; 3],
    pub material: MaterialId,
}

/// Transforms draw items into flat triangle lists.
/// Keeps a scratch buffer of transformed vertices between calls.
#[derive(Default)]
pub struct GeometryProcessor {
    scratch: Vec<ClipVertex>,
}

impl GeometryProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the triangles of `mesh` drawn by `item` to `out`.
    /// Returns the number of triangles appended. Triangles referencing a
    /// vertex past the end of the mesh are skipped.
    pub fn build(
        &mut self,
        mesh: &Mesh,
        item: &DrawItem,
        view_proj: Mat4,
        out: &mut Vec<Triangle>,
    ) -> usize {
        if mesh.vertices.is_empty() || mesh.indices.len() < 3 {
            return 0;
        }

        let shader = VertexShader::new(view_proj * item.model);
        let tangent_matrix = Mat3::from_mat4(item.model);

        self.scratch.clear();
        self.scratch.extend(mesh.vertices.iter().map(|v| {
            let position = v.position.extend(1.0);
            let tangent = (tangent_matrix * v.tangent.truncate()).normalize_or_zero();
            ClipVertex {
                clip: shader.transform(position),
                normal: (item.normal_matrix * v.normal).normalize_or_zero(),
                world: (item.model * position).truncate(),
                uv: v.uv,
                tangent: tangent.extend(v.tangent.w),
            }
        }));

        let vertex_count = self.scratch.len();
        let start = out.len();

        for tri in mesh.indices.chunks_exact(3) {
            let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            if i0 >= vertex_count || i1 >= vertex_count || i2 >= vertex_count {
                count_call!(FUNCTION_COUNTERS.triangles_skipped_indices);
                continue;
            }
            out.push(Triangle {
                vertices: [self.scratch[i0], self.scratch[i1], self.scratch[i2]],
                material: item.material,
            });
        }

        let appended = out.len() - start;
        count_add!(FUNCTION_COUNTERS.triangles_built, appended);
        appended
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{MeshId, Vertex};
    use glam::{Vec2, Vec3, Vec4};

    fn item(model: Mat4) -> DrawItem {
        DrawItem::new(MeshId(0), MaterialId(7), model)
    }

    #[test]
    fn quad_builds_two_triangles() {
        let mesh = Mesh::quad(1.0);
        let mut gp = GeometryProcessor::new();
        let mut out = Vec::new();
        let n = gp.build(&mesh, &item(Mat4::IDENTITY), Mat4::IDENTITY, &mut out);
        assert_eq!(n, 2);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|t| t.material == MaterialId(7)));
    }

    #[test]
    fn out_of_range_indices_are_skipped() {
        let mut mesh = Mesh::quad(1.0);
        mesh.indices.extend_from_slice(&[0, 1, 99]);
        let mut gp = GeometryProcessor::new();
        let mut out = Vec::new();
        assert_eq!(gp.build(&mesh, &item(Mat4::IDENTITY), Mat4::IDENTITY, &mut out), 2);
    }

    #[test]
    fn degenerate_meshes_yield_nothing() {
        let mut gp = GeometryProcessor::new();
        let mut out = Vec::new();
        let empty = Mesh::new(Vec::new(), vec![0, 1, 2]);
        assert_eq!(gp.build(&empty, &item(Mat4::IDENTITY), Mat4::IDENTITY, &mut out), 0);
        let short = Mesh::new(vec![Vertex::default(); 3], vec![0, 1]);
        assert_eq!(gp.build(&short, &item(Mat4::IDENTITY), Mat4::IDENTITY, &mut out), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn attributes_are_moved_to_world_space() {
        let v = Vertex::new(Vec3::ZERO, Vec3::Y, Vec2::new(0.25, 0.75))
            .with_tangent(Vec4::new(1.0, 0.0, 0.0, -1.0));
        let mesh = Mesh::new(vec![v; 3], vec![0, 1, 2]);
        let model = Mat4::from_translation(Vec3::new(0.0, 0.0, -3.0))
            * Mat4::from_rotation_z(std::f32::consts::FRAC_PI_2)
            * Mat4::from_scale(Vec3::splat(2.0));
        let mut gp = GeometryProcessor::new();
        let mut out = Vec::new();
        gp.build(&mesh, &item(model), Mat4::IDENTITY, &mut out);

        let c = out[0].vertices[0];
        assert!((c.world - Vec3::new(0.0, 0.0, -3.0)).length() < 1e-5);
        assert!((c.normal - Vec3::NEG_X).length() < 1e-5, "normal {:?}", c.normal);
        assert!((c.tangent.truncate() - Vec3::Y).length() < 1e-5);
        assert_eq!(c.tangent.w, -1.0);
        assert_eq!(c.uv, Vec2::new(0.25, 0.75));
        assert_eq!(c.clip.w, 1.0);
    }
}
