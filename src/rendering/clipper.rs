/// Sutherland-Hodgman frustum clipping in homogeneous clip space.
///
/// A triangle is clipped in turn against `x >= -w`, `x <= w`, `y >= -w`,
/// `y <= w`, `z >= 0` and `z <= w` (depth range [0, 1]). Each plane adds at
/// most one vertex to a convex polygon, so the result never exceeds nine.
use glam::{Vec2, Vec3, Vec4};

pub const MAX_CLIP_VERTS: usize = 9;

/// Vertex carried through clipping: clip position plus every varying.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ClipVertex {
    pub clip: Vec4,
    pub normal: Vec3,
    pub world: Vec3,
    pub uv: Vec2,
    /// xyz tangent, w handedness
    pub tangent: Vec4,
}

impl ClipVertex {
    /// Interpolate every field at `t` from `self` towards `other`.
    #[inline]
    pub fn lerp(&self, other: &ClipVertex, t: f32) -> ClipVertex {
        ClipVertex {
            clip: self.clip.lerp(other.clip, t),
            normal: self.normal.lerp(other.normal, t),
            world: self.world.lerp(other.world, t),
            uv: self.uv.lerp(other.uv, t),
            tangent: self.tangent.lerp(other.tangent, t),
        }
    }
}

/// Convex polygon produced by clipping; empty or at least three vertices.
#[derive(Copy, Clone, Debug)]
pub struct ClipPolygon {
    verts: [ClipVertex; MAX_CLIP_VERTS],
    len: usize,
}

impl Default for ClipPolygon {
    fn default() -> Self {
        Self {
            verts: [ClipVertex::default(); MAX_CLIP_VERTS],
            len: 0,
        }
    }
}

impl ClipPolygon {
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn vertices(&self) -> &[ClipVertex] {
        &self.verts[..self.len]
    }

    #[inline]
    fn push(&mut self, v: ClipVertex) {
        // A convex input never overflows; a degenerate one just loses the extra vertex.
        if self.len < MAX_CLIP_VERTS {
            self.verts[self.len] = v;
            self.len += 1;
        }
    }

    /// Fan triangulation around vertex 0.
    pub fn fan(&self) -> impl Iterator<Item = [ClipVertex; 3]> + '_ {
        let v = self.vertices();
        (1..self.len.saturating_sub(1)).map(move |i| [v[0], v[i], v[i + 1]])
    }
}

/// Signed plane value; the vertex is inside when it is >= 0.
#[inline(always)]
fn plane_value(p: Vec4, plane: usize) -> f32 {
    match plane {
        0 => p.x + p.w, // left
        1 => p.w - p.x, // right
        2 => p.y + p.w, // bottom
        3 => p.w - p.y, // top
        4 => p.z,       // near
        _ => p.w - p.z, // far
    }
}

#[inline]
fn fully_inside(tri: &[ClipVertex; 3]) -> bool {
    tri.iter()
        .all(|v| (0..6).all(|plane| plane_value(v.clip, plane) >= 0.0))
}

fn clip_against_plane(input: &ClipPolygon, plane: usize, output: &mut ClipPolygon) {
    output.len = 0;
    let verts = input.vertices();
    let n = verts.len();
    if n == 0 {
        return;
    }

    let mut prev = verts[n - 1];
    let mut prev_value = plane_value(prev.clip, plane);

    for &curr in verts {
        let curr_value = plane_value(curr.clip, plane);
        let prev_inside = prev_value >= 0.0;
        let curr_inside = curr_value >= 0.0;

        match (prev_inside, curr_inside) {
            (true, true) => output.push(curr),
            (true, false) => {
                let t = prev_value / (prev_value - curr_value);
                output.push(prev.lerp(&curr, t));
            }
            (false, true) => {
                let t = prev_value / (prev_value - curr_value);
                output.push(prev.lerp(&curr, t));
                output.push(curr);
            }
            (false, false) => {}
        }

        prev = curr;
        prev_value = curr_value;
    }
}

/// Clip one triangle against the six frustum planes.
/// A triangle entirely inside comes back unchanged and in the same order.
pub fn clip_triangle(tri: &[ClipVertex; 3]) -> ClipPolygon {
    let mut a = ClipPolygon::default();
    a.verts[..3].copy_from_slice(tri);
    a.len = 3;

    if fully_inside(tri) {
        return a;
    }

    let mut b = ClipPolygon::default();
    for plane in 0..6 {
        clip_against_plane(&a, plane, &mut b);
        if b.len < 3 {
            return ClipPolygon::default();
        }
        std::mem::swap(&mut a, &mut b);
    }
    a
}
