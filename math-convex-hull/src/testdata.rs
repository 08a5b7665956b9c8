//! Test data for convex hull tests
//!
//! Small closed solids with known hulls, and flat slabs shaped like the
//! inlier set of a fitted plane region.

use crate::ConvexHullError;
use crate::types::Vertex;
use rand::Rng;
use std::fs;
use std::path::Path;

/// Regular tetrahedron on alternate corners of the cube `[-1, 1]^3`
pub fn tetrahedron_vertices() -> Vec<Vertex> {
    [(1.0, 1.0, 1.0), (1.0, -1.0, -1.0), (-1.0, 1.0, -1.0), (-1.0, -1.0, 1.0)]
        .into_iter()
        .map(|(x, y, z)| Vertex::new(x, y, z))
        .collect()
}

/// Corners of the axis-aligned cube of edge `size` centred on the origin
pub fn cube_vertices(size: f64) -> Vec<Vertex> {
    let h = size / 2.0;
    let sign = |bit: usize| if bit == 0 { -h } else { h };
    (0..8)
        .map(|corner| Vertex::new(sign(corner & 1), sign((corner >> 1) & 1), sign(corner >> 2)))
        .collect()
}

/// Cube corners followed by `n` uniform points strictly inside the cube
pub fn box_with_interior_points<R: Rng + ?Sized>(size: f64, n: usize, rng: &mut R) -> Vec<Vertex> {
    let inner = 0.98 * size;
    let mut vertices = cube_vertices(size);
    vertices.extend((0..n).map(|_| {
        Vertex::new(
            (rng.random::<f64>() - 0.5) * inner,
            (rng.random::<f64>() - 0.5) * inner,
            (rng.random::<f64>() - 0.5) * inner,
        )
    }));
    vertices
}

/// `n` points spread evenly over the sphere of `radius` along a golden-angle
/// spiral
pub fn fibonacci_sphere_points(n: usize, radius: f64) -> Vec<Vertex> {
    let golden_angle = std::f64::consts::PI * (3.0 - 5.0_f64.sqrt());
    (0..n)
        .map(|i| {
            let z = 1.0 - (2 * i + 1) as f64 / n as f64;
            let ring = (1.0 - z * z).sqrt();
            let angle = golden_angle * i as f64;
            Vertex::new(ring * angle.cos(), ring * angle.sin(), z).scale(radius)
        })
        .collect()
}

/// Points scattered over the rectangle `[0, width] x [0, depth]` of the
/// plane z = 0, displaced by up to `thickness / 2` along z.
///
/// This is the shape of the inlier set of a fitted plane region: flat but with
/// enough volume for a 3D hull.
pub fn planar_slab_points<R: Rng + ?Sized>(
    n: usize,
    width: f64,
    depth: f64,
    thickness: f64,
    rng: &mut R,
) -> Vec<Vertex> {
    (0..n)
        .map(|_| {
            Vertex::new(
                rng.random::<f64>() * width,
                rng.random::<f64>() * depth,
                (rng.random::<f64>() - 0.5) * thickness,
            )
        })
        .collect()
}

/// [`planar_slab_points`] rotated by `tilt` radians about the x axis, so the
/// slab normal is `(0, -sin(tilt), cos(tilt))`
pub fn tilted_slab_points<R: Rng + ?Sized>(
    n: usize,
    width: f64,
    depth: f64,
    thickness: f64,
    tilt: f64,
    rng: &mut R,
) -> Vec<Vertex> {
    let (sin, cos) = tilt.sin_cos();
    planar_slab_points(n, width, depth, thickness, rng)
        .into_iter()
        .map(|p| Vertex::new(p.x, p.y * cos - p.z * sin, p.y * sin + p.z * cos))
        .collect()
}

/// The `v x y z` records of a Wavefront OBJ file
pub fn load_obj_vertices<P: AsRef<Path>>(path: P) -> Result<Vec<Vertex>, ConvexHullError> {
    let text = fs::read_to_string(path)?;
    let vertices: Vec<Vertex> = text
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            if fields.next() != Some("v") {
                return None;
            }
            let mut coord = || fields.next()?.parse::<f64>().ok();
            Some(Vertex::new(coord()?, coord()?, coord()?))
        })
        .collect();

    if vertices.is_empty() {
        return Err(ConvexHullError::InsufficientVertices { count: 0 });
    }
    Ok(vertices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_tetrahedron_is_regular() {
        let v = tetrahedron_vertices();
        for i in 0..4 {
            for j in (i + 1)..4 {
                assert!((v[i].distance(&v[j]) - 8.0_f64.sqrt()).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_cube_vertices() {
        let vertices = cube_vertices(2.0);
        assert_eq!(vertices.len(), 8);
        for v in &vertices {
            assert!((v.magnitude() - 3.0_f64.sqrt()).abs() < 1e-10);
        }
    }

    #[test]
    fn test_interior_points_stay_inside() {
        let mut rng = StdRng::seed_from_u64(3);
        let vertices = box_with_interior_points(2.0, 200, &mut rng);
        assert_eq!(vertices.len(), 208);
        assert!(vertices[8..].iter().all(|v| v.max_abs_coord() < 1.0));
    }

    #[test]
    fn test_fibonacci_sphere_points() {
        let points = fibonacci_sphere_points(100, 2.0);
        assert_eq!(points.len(), 100);
        for p in &points {
            assert!((p.magnitude() - 2.0).abs() < 1e-10);
        }
    }

    #[test]
    fn test_planar_slab_points() {
        let mut rng = StdRng::seed_from_u64(7);
        let points = planar_slab_points(500, 2.0, 1.0, 0.02, &mut rng);
        assert_eq!(points.len(), 500);
        for p in &points {
            assert!((0.0..=2.0).contains(&p.x));
            assert!((0.0..=1.0).contains(&p.y));
            assert!(p.z.abs() <= 0.01);
        }
    }

    #[test]
    fn test_tilted_slab_stays_near_its_plane() {
        let tilt = 0.5_f64;
        let normal = Vertex::new(0.0, -tilt.sin(), tilt.cos());
        let mut rng = StdRng::seed_from_u64(8);
        for p in tilted_slab_points(300, 1.0, 1.0, 0.02, tilt, &mut rng) {
            assert!(p.dot(&normal).abs() <= 0.01 + 1e-12);
        }
    }
}
