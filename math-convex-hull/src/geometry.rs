//! Geometric utility functions

use crate::types::Vertex;

/// Signed volume of the tetrahedron (p0, p1, p2, p3).
///
/// Positive when p3 lies on the side of triangle (p0, p1, p2) that its
/// counter-clockwise normal points to.
pub fn signed_tetrahedron_volume(p0: &Vertex, p1: &Vertex, p2: &Vertex, p3: &Vertex) -> f64 {
    let v1 = p1.sub(p0);
    let v2 = p2.sub(p0);
    let v3 = p3.sub(p0);

    v1.cross(&v2).dot(&v3) / 6.0
}

/// Compute the volume of a tetrahedron formed by 4 points
pub fn tetrahedron_volume(p0: &Vertex, p1: &Vertex, p2: &Vertex, p3: &Vertex) -> f64 {
    signed_tetrahedron_volume(p0, p1, p2, p3).abs()
}

/// Compute the centroid of a set of vertices
pub fn centroid(vertices: &[Vertex]) -> Vertex {
    if vertices.is_empty() {
        return Vertex::zero();
    }
    let n = vertices.len() as f64;
    let sum = vertices
        .iter()
        .fold(Vertex::zero(), |acc, v| acc.add(v));
    sum.scale(1.0 / n)
}

/// Find the extreme points (min/max in each dimension)
pub fn find_extreme_points(vertices: &[Vertex]) -> [usize; 6] {
    let mut min_x_idx = 0;
    let mut max_x_idx = 0;
    let mut min_y_idx = 0;
    let mut max_y_idx = 0;
    let mut min_z_idx = 0;
    let mut max_z_idx = 0;

    for (i, v) in vertices.iter().enumerate() {
        if v.x < vertices[min_x_idx].x {
            min_x_idx = i;
        }
        if v.x > vertices[max_x_idx].x {
            max_x_idx = i;
        }
        if v.y < vertices[min_y_idx].y {
            min_y_idx = i;
        }
        if v.y > vertices[max_y_idx].y {
            max_y_idx = i;
        }
        if v.z < vertices[min_z_idx].z {
            min_z_idx = i;
        }
        if v.z > vertices[max_z_idx].z {
            max_z_idx = i;
        }
    }

    [
        min_x_idx, max_x_idx, min_y_idx, max_y_idx, min_z_idx, max_z_idx,
    ]
}
