//! Core data types for 3D convex hull computation

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A 3D vertex/point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vertex {
    /// Create a new vertex
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The origin
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Coordinates as an array
    pub fn to_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Dot product with another vertex
    pub fn dot(&self, other: &Vertex) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product with another vertex
    pub fn cross(&self, other: &Vertex) -> Vertex {
        Vertex {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    /// Subtract another vertex
    pub fn sub(&self, other: &Vertex) -> Vertex {
        Vertex {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }

    /// Add another vertex
    pub fn add(&self, other: &Vertex) -> Vertex {
        Vertex {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }

    /// Scale by a scalar
    pub fn scale(&self, s: f64) -> Vertex {
        Vertex {
            x: self.x * s,
            y: self.y * s,
            z: self.z * s,
        }
    }

    /// Compute the magnitude/length
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Normalize to unit length, or `None` if the vector is (numerically) zero
    pub fn try_normalize(&self) -> Option<Vertex> {
        let mag = self.magnitude();
        if mag > crate::EPSILON && mag.is_finite() {
            Some(self.scale(1.0 / mag))
        } else {
            None
        }
    }

    /// Distance to another vertex
    pub fn distance(&self, other: &Vertex) -> f64 {
        self.sub(other).magnitude()
    }

    /// Largest absolute coordinate
    pub fn max_abs_coord(&self) -> f64 {
        self.x.abs().max(self.y.abs()).max(self.z.abs())
    }
}

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6}, {:.6})", self.x, self.y, self.z)
    }
}

impl From<[f64; 3]> for Vertex {
    fn from(c: [f64; 3]) -> Self {
        Self::new(c[0], c[1], c[2])
    }
}

/// A face of the convex hull (triangle defined by 3 vertex indices)
///
/// Vertices are wound counter-clockwise when seen from outside the hull.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Face {
    pub v0: usize,
    pub v1: usize,
    pub v2: usize,
}

impl Face {
    /// Create a new face from three vertex indices
    pub fn new(v0: usize, v1: usize, v2: usize) -> Self {
        Self { v0, v1, v2 }
    }

    /// Get vertex indices as an array
    pub fn indices(&self) -> [usize; 3] {
        [self.v0, self.v1, self.v2]
    }

    /// Check if this face contains a vertex index
    pub fn contains(&self, v: usize) -> bool {
        self.v0 == v || self.v1 == v || self.v2 == v
    }

    /// Corner positions of this face
    pub fn corners(&self, vertices: &[Vertex]) -> [Vertex; 3] {
        [vertices[self.v0], vertices[self.v1], vertices[self.v2]]
    }

    /// Unnormalized normal (cross product of the two edges leaving `v0`)
    pub fn raw_normal(&self, vertices: &[Vertex]) -> Vertex {
        let [p0, p1, p2] = self.corners(vertices);
        p1.sub(&p0).cross(&p2.sub(&p0))
    }

    /// The three directed edges of this face
    pub fn edges(&self) -> [(usize, usize); 3] {
        [(self.v0, self.v1), (self.v1, self.v2), (self.v2, self.v0)]
    }
}

/// The result of a convex hull computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvexHull3D {
    /// Hull vertices (only those referenced by a face)
    vertices: Vec<Vertex>,
    /// Faces of the convex hull (each face is a triangle)
    faces: Vec<Face>,
}

impl ConvexHull3D {
    /// Create a hull from a vertex pool and faces indexing into it.
    ///
    /// Vertices not referenced by any face are dropped and the faces are
    /// re-indexed in order of first use.
    pub(crate) fn new(pool: &[Vertex], faces: Vec<Face>) -> Self {
        let mut remap: HashMap<usize, usize> = HashMap::with_capacity(faces.len());
        let mut vertices = Vec::new();
        let mut index_of = |old: usize| -> usize {
            *remap.entry(old).or_insert_with(|| {
                vertices.push(pool[old]);
                vertices.len() - 1
            })
        };

        let faces: Vec<Face> = faces
            .iter()
            .map(|f| Face::new(index_of(f.v0), index_of(f.v1), index_of(f.v2)))
            .collect();

        Self { vertices, faces }
    }

    /// Build a convex hull from vertices using the Quickhull algorithm
    pub fn build(vertices: &[Vertex]) -> crate::Result<Self> {
        crate::quickhull::quickhull_3d(vertices)
    }

    /// Get the vertices
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Get the faces
    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    /// Get the number of faces
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Get the number of vertices
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Mean of the hull vertices; always inside the hull
    pub fn interior_point(&self) -> Vertex {
        crate::geometry::centroid(&self.vertices)
    }

    /// Compute the volume of the convex hull
    pub fn volume(&self) -> f64 {
        let apex = self.interior_point();
        self.faces
            .iter()
            .map(|face| {
                let [v0, v1, v2] = face.corners(&self.vertices);
                crate::geometry::signed_tetrahedron_volume(&apex, &v0, &v1, &v2)
            })
            .sum::<f64>()
            .abs()
    }

    /// Compute the surface area of the convex hull
    pub fn surface_area(&self) -> f64 {
        self.faces
            .iter()
            .map(|face| face.raw_normal(&self.vertices).magnitude() / 2.0)
            .sum()
    }

    /// Largest signed distance of `point` above any face plane.
    ///
    /// Negative or zero means the point is inside or on the boundary. Faces
    /// with a degenerate normal are ignored.
    pub fn max_face_distance(&self, point: &Vertex) -> f64 {
        self.faces
            .iter()
            .filter_map(|face| {
                let normal = face.raw_normal(&self.vertices).try_normalize()?;
                Some(normal.dot(&point.sub(&self.vertices[face.v0])))
            })
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Whether `point` lies inside the hull or within `tolerance` of its boundary
    pub fn contains(&self, point: &Vertex, tolerance: f64) -> bool {
        self.max_face_distance(point) <= tolerance
    }

    /// Sum of the area-weighted facet normals (`cross / 2` per face).
    ///
    /// Zero (up to rounding) for any closed, consistently wound mesh.
    pub fn area_weighted_normal_sum(&self) -> Vertex {
        self.faces.iter().fold(Vertex::zero(), |acc, face| {
            acc.add(&face.raw_normal(&self.vertices).scale(0.5))
        })
    }
}
