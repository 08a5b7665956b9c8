//! Quickhull algorithm implementation for 3D convex hulls
//!
//! Based on:
//! - Barber, C.B., Dobkin, D.P., and Huhdanpaa, H.T., "The Quickhull algorithm
//!   for convex hulls," ACM Trans. on Mathematical Software, 22(4):469-483, 1996.
//!
//! Performance notes:
//! - Parallel point visibility checks with rayon above `PARALLEL_THRESHOLD`
//! - Generation-based face deletion (faces are flagged, compacted in batches)
//! - Pre-allocated scratch buffers and a reused HashMap for horizon computation
//! - Furthest outside point tracked during assignment

use crate::geometry::{centroid, find_extreme_points};
use crate::types::{ConvexHull3D, Face, Vertex};
use crate::{ConvexHullError, Result, compute_relative_epsilon, deduplicate_vertices};
use rayon::prelude::*;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

const MAX_ITERATIONS: usize = 100000;

/// Threshold for parallel processing (below this, sequential is faster)
const PARALLEL_THRESHOLD: usize = 100;

/// Internal representation of a face during hull construction
#[derive(Debug, Clone)]
struct HullFace {
    vertices: [usize; 3],
    normal: Vertex,
    d: f64, // Plane constant: normal.dot(v0)
    outside_points: Vec<usize>,
    furthest_point: Option<usize>,
    furthest_distance: f64,
    deleted: bool,
}

impl HullFace {
    fn new(v0: usize, v1: usize, v2: usize, vertices: &[Vertex]) -> Self {
        let p0 = &vertices[v0];
        let p1 = &vertices[v1];
        let p2 = &vertices[v2];

        let normal = p1
            .sub(p0)
            .cross(&p2.sub(p0))
            .try_normalize()
            .unwrap_or_else(|| Vertex::new(0.0, 0.0, 1.0));
        let d = normal.dot(p0);

        Self {
            vertices: [v0, v1, v2],
            normal,
            d,
            outside_points: Vec::new(),
            furthest_point: None,
            furthest_distance: 0.0,
            deleted: false,
        }
    }

    /// Signed distance from point to plane (positive = outside)
    #[inline]
    fn signed_distance(&self, point: &Vertex) -> f64 {
        self.normal.dot(point) - self.d
    }

    fn flip(&mut self) {
        self.vertices.swap(1, 2);
        self.normal = self.normal.scale(-1.0);
        self.d = -self.d;
    }

    fn assign_point(&mut self, point_idx: usize, distance: f64) {
        self.outside_points.push(point_idx);
        if distance > self.furthest_distance {
            self.furthest_point = Some(point_idx);
            self.furthest_distance = distance;
        }
    }

    fn remove_point(&mut self, point_idx: usize) {
        self.outside_points.retain(|&p| p != point_idx);
        if self.furthest_point == Some(point_idx) {
            self.furthest_point = None;
            self.furthest_distance = 0.0;
        }
    }

    fn furthest_point(&self, vertices: &[Vertex]) -> Option<(usize, f64)> {
        if let Some(idx) = self.furthest_point {
            return Some((idx, self.furthest_distance));
        }
        let mut max_distance = 0.0;
        let mut max_idx = None;

        for &idx in &self.outside_points {
            let distance = self.signed_distance(&vertices[idx]);
            if distance > max_distance {
                max_distance = distance;
                max_idx = Some(idx);
            }
        }

        max_idx.map(|idx| (idx, max_distance))
    }

    fn edges(&self) -> [(usize, usize); 3] {
        let [a, b, c] = self.vertices;
        [(a, b), (b, c), (c, a)]
    }

    fn to_face(&self) -> Face {
        Face::new(self.vertices[0], self.vertices[1], self.vertices[2])
    }
}

/// Undirected edge key for horizon computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct EdgeKey(usize, usize);

impl EdgeKey {
    #[inline]
    fn new(v0: usize, v1: usize) -> Self {
        if v0 < v1 { Self(v0, v1) } else { Self(v1, v0) }
    }
}

/// Scratch buffers to avoid allocations in hot loop
struct ScratchBuffers {
    visible_face_indices: Vec<usize>,
    orphaned_points: Vec<usize>,
    new_faces: Vec<HullFace>,
    edge_to_face: HashMap<EdgeKey, (usize, usize, usize)>,
    horizon_edges: Vec<(usize, usize)>,
}

impl ScratchBuffers {
    fn new() -> Self {
        Self {
            visible_face_indices: Vec::with_capacity(64),
            orphaned_points: Vec::with_capacity(256),
            new_faces: Vec::with_capacity(64),
            edge_to_face: HashMap::with_capacity(128),
            horizon_edges: Vec::with_capacity(64),
        }
    }

    fn clear(&mut self) {
        self.visible_face_indices.clear();
        self.orphaned_points.clear();
        self.new_faces.clear();
        self.edge_to_face.clear();
        self.horizon_edges.clear();
    }
}

/// Build a convex hull using the Quickhull algorithm
pub fn quickhull_3d(vertices: &[Vertex]) -> Result<ConvexHull3D> {
    if vertices.len() < 4 {
        return Err(ConvexHullError::InsufficientVertices {
            count: vertices.len(),
        });
    }

    let eps = compute_relative_epsilon(vertices);
    let unique_vertices = deduplicate_vertices(vertices, eps);

    if unique_vertices.len() < 4 {
        return Err(ConvexHullError::InsufficientVertices {
            count: unique_vertices.len(),
        });
    }

    let initial_simplex = find_initial_simplex(&unique_vertices, eps)?;
    let simplex_centroid = centroid(&initial_simplex.map(|i| unique_vertices[i]));

    let mut hull_faces = create_initial_hull(&initial_simplex, &unique_vertices, &simplex_centroid);

    let mut in_simplex = vec![false; unique_vertices.len()];
    for &idx in &initial_simplex {
        in_simplex[idx] = true;
    }
    let unprocessed_points: Vec<usize> = (0..unique_vertices.len())
        .filter(|&i| !in_simplex[i])
        .collect();

    if unprocessed_points.len() >= PARALLEL_THRESHOLD {
        assign_points_parallel(&mut hull_faces, &unique_vertices, &unprocessed_points, eps);
    } else {
        assign_points_sequential(&mut hull_faces, &unique_vertices, &unprocessed_points, eps);
    }

    let mut scratch = ScratchBuffers::new();
    let max_iterations = MAX_ITERATIONS.max(2 * unique_vertices.len());

    let mut iterations = 0;
    loop {
        iterations += 1;
        if iterations > max_iterations {
            log::error!(
                "Max iterations exceeded after {} iterations with {} faces",
                iterations,
                hull_faces.iter().filter(|f| !f.deleted).count()
            );
            return Err(ConvexHullError::MaxIterationsExceeded);
        }

        // Compact when too many faces are flagged as deleted
        let deleted_count = hull_faces.iter().filter(|f| f.deleted).count();
        if deleted_count * 10 > hull_faces.len() * 3 || (iterations % 500 == 0 && deleted_count > 0)
        {
            hull_faces.retain(|f| !f.deleted);
            log::trace!(
                "Iteration {}: {} faces, {} outside points remaining",
                iterations,
                hull_faces.len(),
                hull_faces.iter().map(|f| f.outside_points.len()).sum::<usize>()
            );
        }

        let Some((face_idx, point_idx)) = find_face_with_furthest_point(&hull_faces, &unique_vertices)
        else {
            break;
        };
        let point = unique_vertices[point_idx];

        scratch.clear();

        if hull_faces.len() >= PARALLEL_THRESHOLD {
            find_visible_faces_parallel(&hull_faces, &point, eps, &mut scratch.visible_face_indices);
        } else {
            scratch.visible_face_indices.extend(
                hull_faces
                    .iter()
                    .enumerate()
                    .filter(|(_, f)| !f.deleted && f.signed_distance(&point) > eps)
                    .map(|(i, _)| i),
            );
        }

        if scratch.visible_face_indices.is_empty() {
            hull_faces[face_idx].remove_point(point_idx);
            continue;
        }

        find_horizon(
            &hull_faces,
            &scratch.visible_face_indices,
            &mut scratch.edge_to_face,
            &mut scratch.horizon_edges,
        );

        for &visible in &scratch.visible_face_indices {
            let face = &mut hull_faces[visible];
            scratch.orphaned_points.append(&mut face.outside_points);
            face.deleted = true;
        }
        scratch.orphaned_points.retain(|&p| p != point_idx);

        // New faces keep the horizon edge direction of the visible face they
        // replace, which keeps them wound outward.
        for &(v0, v1) in &scratch.horizon_edges {
            let mut face = HullFace::new(v0, v1, point_idx, &unique_vertices);
            if face.signed_distance(&simplex_centroid) > 0.0 {
                face.flip();
            }
            scratch.new_faces.push(face);
        }

        for &orphan_idx in &scratch.orphaned_points {
            let orphan = &unique_vertices[orphan_idx];

            let target = scratch
                .new_faces
                .iter_mut()
                .chain(hull_faces.iter_mut().filter(|f| !f.deleted))
                .find(|f| f.signed_distance(orphan) > eps);

            if let Some(face) = target {
                let distance = face.signed_distance(orphan);
                face.assign_point(orphan_idx, distance);
            }
        }

        hull_faces.append(&mut scratch.new_faces);
    }

    hull_faces.retain(|f| !f.deleted);
    log::debug!(
        "Quickhull: {} input points, {} unique, {} faces after {} iterations",
        vertices.len(),
        unique_vertices.len(),
        hull_faces.len(),
        iterations
    );

    let faces: Vec<Face> = hull_faces.iter().map(HullFace::to_face).collect();
    Ok(ConvexHull3D::new(&unique_vertices, faces))
}

/// Assign points to faces in parallel.
///
/// Visibility is computed in parallel; the assignment itself is sequential so
/// the outside lists keep a deterministic order.
fn assign_points_parallel(
    hull_faces: &mut [HullFace],
    vertices: &[Vertex],
    points: &[usize],
    eps: f64,
) {
    let faces: &[HullFace] = hull_faces;
    let assignments: Vec<Option<(usize, f64)>> = points
        .par_iter()
        .map(|&point_idx| {
            let vertex = &vertices[point_idx];
            faces.iter().enumerate().find_map(|(face_idx, face)| {
                let distance = face.signed_distance(vertex);
                (distance > eps).then_some((face_idx, distance))
            })
        })
        .collect();

    for (&point_idx, assignment) in points.iter().zip(assignments) {
        if let Some((face_idx, distance)) = assignment {
            hull_faces[face_idx].assign_point(point_idx, distance);
        }
    }
}

/// Assign points to faces sequentially
fn assign_points_sequential(
    hull_faces: &mut [HullFace],
    vertices: &[Vertex],
    points: &[usize],
    eps: f64,
) {
    for &point_idx in points {
        let vertex = &vertices[point_idx];
        for face in hull_faces.iter_mut() {
            let distance = face.signed_distance(vertex);
            if distance > eps {
                face.assign_point(point_idx, distance);
                break;
            }
        }
    }
}

/// Find visible faces in parallel
fn find_visible_faces_parallel(
    hull_faces: &[HullFace],
    point: &Vertex,
    eps: f64,
    result: &mut Vec<usize>,
) {
    let visible: Vec<usize> = hull_faces
        .par_iter()
        .enumerate()
        .filter_map(|(i, face)| (!face.deleted && face.signed_distance(point) > eps).then_some(i))
        .collect();

    result.extend(visible);
}

/// Find the initial simplex (tetrahedron) to start the algorithm
fn find_initial_simplex(vertices: &[Vertex], epsilon: f64) -> Result<[usize; 4]> {
    let extremes = find_extreme_points(vertices);

    // Pair of extreme points with maximum distance
    let mut max_distance = 0.0;
    let mut v0 = 0;
    let mut v1 = 0;

    for i in 0..6 {
        for j in (i + 1)..6 {
            let dist = vertices[extremes[i]].distance(&vertices[extremes[j]]);
            if dist > max_distance {
                max_distance = dist;
                v0 = extremes[i];
                v1 = extremes[j];
            }
        }
    }

    if max_distance < epsilon {
        return Err(ConvexHullError::DegenerateConfiguration);
    }

    // Point furthest from the line v0-v1
    let line_dir = vertices[v1].sub(&vertices[v0]).scale(1.0 / max_distance);

    let mut max_distance = 0.0;
    let mut v2 = 0;

    for (i, vertex) in vertices.iter().enumerate() {
        if i == v0 || i == v1 {
            continue;
        }

        let to_point = vertex.sub(&vertices[v0]);
        let projection = line_dir.scale(to_point.dot(&line_dir));
        let dist = to_point.sub(&projection).magnitude();

        if dist > max_distance {
            max_distance = dist;
            v2 = i;
        }
    }

    if max_distance < epsilon {
        return Err(ConvexHullError::DegenerateConfiguration);
    }

    // Point furthest from the plane formed by v0, v1, v2
    let normal = vertices[v1]
        .sub(&vertices[v0])
        .cross(&vertices[v2].sub(&vertices[v0]))
        .try_normalize()
        .ok_or(ConvexHullError::DegenerateConfiguration)?;

    let mut max_distance = 0.0;
    let mut v3 = 0;

    for (i, vertex) in vertices.iter().enumerate() {
        if i == v0 || i == v1 || i == v2 {
            continue;
        }

        let dist = normal.dot(&vertex.sub(&vertices[v0])).abs();
        if dist > max_distance {
            max_distance = dist;
            v3 = i;
        }
    }

    if max_distance < epsilon {
        return Err(ConvexHullError::DegenerateConfiguration);
    }

    Ok([v0, v1, v2, v3])
}

/// Create the initial hull from the simplex, every face wound outward
fn create_initial_hull(simplex: &[usize; 4], vertices: &[Vertex], interior: &Vertex) -> Vec<HullFace> {
    let [v0, v1, v2, v3] = *simplex;

    let mut faces = vec![
        HullFace::new(v0, v1, v2, vertices),
        HullFace::new(v0, v2, v3, vertices),
        HullFace::new(v0, v3, v1, vertices),
        HullFace::new(v1, v3, v2, vertices),
    ];

    for face in &mut faces {
        if face.signed_distance(interior) > 0.0 {
            face.flip();
        }
    }

    faces
}

/// Find the live face holding the furthest outside point
fn find_face_with_furthest_point(
    hull_faces: &[HullFace],
    vertices: &[Vertex],
) -> Option<(usize, usize)> {
    let mut max_distance = 0.0;
    let mut result = None;

    for (face_idx, face) in hull_faces.iter().enumerate() {
        if face.deleted {
            continue;
        }

        if let Some((point_idx, distance)) = face.furthest_point(vertices)
            && distance > max_distance
        {
            max_distance = distance;
            result = Some((face_idx, point_idx));
        }
    }

    result
}

/// Collect the horizon: directed edges of visible faces that are not shared
/// with another visible face.
fn find_horizon(
    hull_faces: &[HullFace],
    visible_faces: &[usize],
    edge_to_face: &mut HashMap<EdgeKey, (usize, usize, usize)>,
    horizon: &mut Vec<(usize, usize)>,
) {
    edge_to_face.clear();
    horizon.clear();

    for &face_idx in visible_faces {
        for (a, b) in hull_faces[face_idx].edges() {
            match edge_to_face.entry(EdgeKey::new(a, b)) {
                Entry::Vacant(e) => {
                    e.insert((face_idx, a, b));
                }
                Entry::Occupied(e) => {
                    e.remove();
                }
            }
        }
    }

    // Sort by the owning face so the horizon order does not depend on hashing
    let mut remaining: Vec<(usize, usize, usize)> = edge_to_face.values().copied().collect();
    remaining.sort_unstable();
    horizon.extend(remaining.into_iter().map(|(_, a, b)| (a, b)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_all_inside(hull: &ConvexHull3D, points: &[Vertex]) {
        for p in points {
            assert!(
                hull.contains(p, 1e-9),
                "point {} lies {} outside the hull",
                p,
                hull.max_face_distance(p)
            );
        }
    }

    #[test]
    fn test_simple_tetrahedron() {
        let vertices = vec![
            Vertex::new(0.0, 0.0, 0.0),
            Vertex::new(1.0, 0.0, 0.0),
            Vertex::new(0.0, 1.0, 0.0),
            Vertex::new(0.0, 0.0, 1.0),
        ];

        let hull = quickhull_3d(&vertices).unwrap();
        assert_eq!(hull.num_faces(), 4);
        assert_eq!(hull.num_vertices(), 4);
        assert!((hull.volume() - 1.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_cube() {
        let vertices = vec![
            Vertex::new(0.0, 0.0, 0.0),
            Vertex::new(1.0, 0.0, 0.0),
            Vertex::new(1.0, 1.0, 0.0),
            Vertex::new(0.0, 1.0, 0.0),
            Vertex::new(0.0, 0.0, 1.0),
            Vertex::new(1.0, 0.0, 1.0),
            Vertex::new(1.0, 1.0, 1.0),
            Vertex::new(0.0, 1.0, 1.0),
        ];

        let hull = quickhull_3d(&vertices).unwrap();
        // 8 vertices and 12 triangular faces (2 per square face)
        assert_eq!(hull.num_vertices(), 8);
        assert_eq!(hull.num_faces(), 12);
        assert!((hull.volume() - 1.0).abs() < 1e-9);
        assert_all_inside(&hull, &vertices);
    }

    #[test]
    fn test_interior_points_are_dropped() {
        let mut vertices = crate::testdata::cube_vertices(2.0);
        vertices.push(Vertex::new(0.1, -0.2, 0.3));
        vertices.push(Vertex::new(0.0, 0.0, 0.0));

        let hull = quickhull_3d(&vertices).unwrap();
        assert_eq!(hull.num_vertices(), 8);
        assert_all_inside(&hull, &vertices);
    }

    #[test]
    fn test_duplicates_are_ignored() {
        let mut vertices = crate::testdata::tetrahedron_vertices();
        vertices.extend(crate::testdata::tetrahedron_vertices());

        let hull = quickhull_3d(&vertices).unwrap();
        assert_eq!(hull.num_faces(), 4);
    }

    #[test]
    fn test_outward_winding() {
        let vertices = crate::testdata::fibonacci_sphere_points(200, 1.0);
        let hull = quickhull_3d(&vertices).unwrap();
        let inside = hull.interior_point();

        for face in hull.faces() {
            let normal = face.raw_normal(hull.vertices());
            let to_inside = inside.sub(&hull.vertices()[face.v0]);
            assert!(normal.dot(&to_inside) < 0.0);
        }
        assert_all_inside(&hull, &vertices);
    }

    #[test]
    fn test_insufficient_vertices() {
        let vertices = vec![
            Vertex::new(0.0, 0.0, 0.0),
            Vertex::new(1.0, 0.0, 0.0),
            Vertex::new(0.0, 1.0, 0.0),
        ];

        let result = quickhull_3d(&vertices);
        assert!(matches!(
            result,
            Err(ConvexHullError::InsufficientVertices { count: 3 })
        ));
    }

    #[test]
    fn test_coplanar_is_degenerate() {
        let vertices: Vec<Vertex> = (0..20)
            .map(|i| Vertex::new((i % 5) as f64, (i / 5) as f64, 2.0))
            .collect();

        let result = quickhull_3d(&vertices);
        assert!(matches!(result, Err(ConvexHullError::DegenerateConfiguration)));
    }

    #[test]
    fn test_collinear_is_degenerate() {
        let vertices: Vec<Vertex> = (0..6).map(|i| Vertex::new(i as f64, i as f64, 0.0)).collect();
        let result = quickhull_3d(&vertices);
        assert!(matches!(result, Err(ConvexHullError::DegenerateConfiguration)));
    }
}
