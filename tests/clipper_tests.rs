/// Homogeneous clipping against the six view-volume planes.
/// Checks that the polygon stays inside the volume, that nothing inside is
/// lost, and that the fan covers the same area as the clipped polygon.
use glam::{Vec2, Vec3, Vec4};
use soft_pbr::rendering::{clip_triangle, ClipVertex};

fn vertex(x: f32, y: f32, z: f32, w: f32) -> ClipVertex {
    ClipVertex {
        clip: Vec4::new(x, y, z, w),
        normal: Vec3::Z,
        world: Vec3::new(x, y, z),
        uv: Vec2::new(x, y),
        tangent: Vec4::new(1.0, 0.0, 0.0, 1.0),
    }
}

fn inside_volume(c: Vec4) -> bool {
    let eps = 1e-4 * c.w.abs().max(1.0);
    c.x >= -c.w - eps
        && c.x <= c.w + eps
        && c.y >= -c.w - eps
        && c.y <= c.w + eps
        && c.z >= -eps
        && c.z <= c.w + eps
}

fn ndc_area(vertices: &[ClipVertex]) -> f32 {
    let points: Vec<Vec2> = vertices
        .iter()
        .map(|v| Vec2::new(v.clip.x / v.clip.w, v.clip.y / v.clip.w))
        .collect();
    let mut area = 0.0;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        area += a.x * b.y - b.x * a.y;
    }
    area * 0.5
}

#[test]
fn fully_inside_triangle_is_returned_unchanged() {
    let tri = [
        vertex(-0.5, -0.5, 0.5, 1.0),
        vertex(0.5, -0.5, 0.5, 1.0),
        vertex(0.0, 0.5, 0.5, 1.0),
    ];
    let polygon = clip_triangle(&tri);
    assert_eq!(polygon.vertices(), &tri[..]);
    assert_eq!(polygon.fan().count(), 1);
}

#[test]
fn triangle_outside_any_single_plane_is_removed() {
    let cases: [[ClipVertex; 3]; 6] = [
        // x < -w
        [vertex(-3.0, 0.0, 0.5, 1.0), vertex(-2.0, 1.0, 0.5, 1.0), vertex(-2.5, -1.0, 0.5, 1.0)],
        // x > w
        [vertex(3.0, 0.0, 0.5, 1.0), vertex(2.0, 1.0, 0.5, 1.0), vertex(2.5, -1.0, 0.5, 1.0)],
        // y < -w
        [vertex(0.0, -3.0, 0.5, 1.0), vertex(1.0, -2.0, 0.5, 1.0), vertex(-1.0, -2.5, 0.5, 1.0)],
        // y > w
        [vertex(0.0, 3.0, 0.5, 1.0), vertex(1.0, 2.0, 0.5, 1.0), vertex(-1.0, 2.5, 0.5, 1.0)],
        // behind the near plane
        [vertex(0.0, 0.0, -0.5, 1.0), vertex(0.5, 0.0, -0.2, 1.0), vertex(0.0, 0.5, -0.1, 1.0)],
        // beyond the far plane
        [vertex(0.0, 0.0, 1.5, 1.0), vertex(0.5, 0.0, 1.2, 1.0), vertex(0.0, 0.5, 1.1, 1.0)],
    ];
    for (i, tri) in cases.iter().enumerate() {
        let polygon = clip_triangle(tri);
        assert!(polygon.is_empty(), "case {} kept {} vertices", i, polygon.len());
        assert_eq!(polygon.fan().count(), 0);
    }
}

#[test]
fn straddling_triangle_is_cut_to_the_volume() {
    let tri = [
        vertex(-2.0, -0.5, 0.5, 1.0),
        vertex(2.5, -0.5, 0.5, 1.0),
        vertex(0.0, 3.0, 0.5, 1.0),
    ];
    let polygon = clip_triangle(&tri);
    assert!(polygon.len() >= 3);
    for v in polygon.vertices() {
        assert!(inside_volume(v.clip), "vertex {:?} left the volume", v.clip);
    }

    // Fan triangles tile the polygon exactly.
    let fan_area: f32 = polygon.fan().map(|t| ndc_area(&t)).sum();
    let polygon_area = ndc_area(polygon.vertices());
    assert!((fan_area - polygon_area).abs() < 1e-4);
    assert!(polygon_area > 0.0);
}

#[test]
fn near_plane_intersection_interpolates_attributes() {
    // Edge from z = -1 to z = 1 (w = 1) crosses z = 0 halfway.
    let tri = [
        vertex(0.0, 0.0, -1.0, 1.0),
        vertex(0.5, 0.0, 1.0, 1.0),
        vertex(0.0, 0.5, 1.0, 1.0),
    ];
    let polygon = clip_triangle(&tri);
    assert_eq!(polygon.len(), 4);
    let on_plane: Vec<&ClipVertex> = polygon
        .vertices()
        .iter()
        .filter(|v| v.clip.z.abs() < 1e-6)
        .collect();
    assert_eq!(on_plane.len(), 2);
    for v in on_plane {
        // Attributes follow the same parameter as position.
        assert!((v.uv.x - v.clip.x).abs() < 1e-6);
        assert!((v.uv.y - v.clip.y).abs() < 1e-6);
        assert!((v.world.z - v.clip.z).abs() < 1e-6);
    }
}

#[test]
fn corner_clip_never_exceeds_vertex_capacity() {
    // Large triangle crossing all four side planes.
    let tri = [
        vertex(-4.0, -3.0, 0.5, 1.0),
        vertex(5.0, -3.5, 0.5, 1.0),
        vertex(0.2, 6.0, 0.5, 1.0),
    ];
    let polygon = clip_triangle(&tri);
    assert!(polygon.len() <= 9);
    assert!(polygon.len() >= 3);
    for v in polygon.vertices() {
        assert!(inside_volume(v.clip));
    }
}
