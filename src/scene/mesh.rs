/// Indexed triangle meshes and a few procedural generators.
use glam::{Vec2, Vec3, Vec4};
use std::f32::consts::{PI, TAU};

/// Object-space vertex.
/// `tangent.w` carries the bitangent handedness (+1 or -1).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
    pub tangent: Vec4,
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            normal: Vec3::Z,
            uv: Vec2::ZERO,
            tangent: Vec4::new(1.0, 0.0, 0.0, 1.0),
        }
    }
}

impl Vertex {
    #[inline]
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position,
            normal,
            uv,
            ..Default::default()
        }
    }

    #[inline]
    pub fn with_tangent(mut self, tangent: Vec4) -> Self {
        self.tangent = tangent;
        self
    }
}

/// Triangle-list mesh. Every three indices form one triangle.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Number of complete index triples (out-of-range indices included).
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Unit-facing square in the XY plane centered at the origin, normal +Z.
    /// UV (0,0) is the top-left corner.
    pub fn quad(half_extent: f32) -> Self {
        let h = half_extent;
        let tangent = Vec4::new(1.0, 0.0, 0.0, 1.0);
        let vertices = vec![
            Vertex::new(Vec3::new(-h, -h, 0.0), Vec3::Z, Vec2::new(0.0, 1.0)).with_tangent(tangent),
            Vertex::new(Vec3::new(h, -h, 0.0), Vec3::Z, Vec2::new(1.0, 1.0)).with_tangent(tangent),
            Vertex::new(Vec3::new(h, h, 0.0), Vec3::Z, Vec2::new(1.0, 0.0)).with_tangent(tangent),
            Vertex::new(Vec3::new(-h, h, 0.0), Vec3::Z, Vec2::new(0.0, 0.0)).with_tangent(tangent),
        ];
        Self::new(vertices, vec![0, 1, 2, 0, 2, 3])
    }

    /// Axis-aligned cube with per-face normals, UVs and tangents.
    pub fn cube(half_extent: f32) -> Self {
        // (normal, u axis, v axis) with u x v == normal so every face winds CCW.
        let faces = [
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
            (Vec3::X, Vec3::NEG_Z, Vec3::Y),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::X, Vec3::NEG_Z),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);

        for (normal, u_axis, v_axis) in faces {
            let base = vertices.len() as u32;
            let center = normal * half_extent;
            let u = u_axis * half_extent;
            let v = v_axis * half_extent;
            let tangent = u_axis.extend(1.0);

            let corners = [
                (center - u - v, Vec2::new(0.0, 1.0)),
                (center + u - v, Vec2::new(1.0, 1.0)),
                (center + u + v, Vec2::new(1.0, 0.0)),
                (center - u + v, Vec2::new(0.0, 0.0)),
            ];
            for (position, uv) in corners {
                vertices.push(Vertex::new(position, normal, uv).with_tangent(tangent));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self::new(vertices, indices)
    }

    /// Latitude/longitude sphere. `segments` around the equator, `rings` pole to pole.
    /// U wraps around the seam at +Z, V runs from the north pole (0) to the south pole (1).
    pub fn uv_sphere(radius: f32, segments: u32, rings: u32) -> Self {
        let segments = segments.max(3);
        let rings = rings.max(2);

        let mut vertices = Vec::with_capacity(((segments + 1) * (rings + 1)) as usize);
        for r in 0..=rings {
            let v = r as f32 / rings as f32;
            let phi = v * PI;
            let (sin_phi, cos_phi) = phi.sin_cos();
            for s in 0..=segments {
                let u = s as f32 / segments as f32;
                let theta = u * TAU;
                let (sin_theta, cos_theta) = theta.sin_cos();

                let normal = Vec3::new(sin_phi * sin_theta, cos_phi, sin_phi * cos_theta);
                let tangent = Vec4::new(cos_theta, 0.0, -sin_theta, 1.0);
                vertices.push(
                    Vertex::new(normal * radius, normal, Vec2::new(u, v)).with_tangent(tangent),
                );
            }
        }

        let stride = segments + 1;
        let mut indices = Vec::with_capacity((segments * rings * 6) as usize);
        for r in 0..rings {
            for s in 0..segments {
                let a = r * stride + s;
                let b = a + stride;
                indices.extend_from_slice(&[b, b + 1, a + 1, b, a + 1, a]);
            }
        }

        Self::new(vertices, indices)
    }
}
