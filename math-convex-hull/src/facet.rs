//! Per-facet centroid and outward normal
//!
//! The normal direction is taken from the facet winding (`cross(v1 - v0, v2 - v0)`).
//! Hulls built by this crate wind every face counter-clockwise seen from
//! outside, so the normals point away from the interior.

use crate::types::{ConvexHull3D, Vertex};
use crate::{ConvexHullError, EPSILON, Result};
use serde::{Deserialize, Serialize};

/// Derived geometry of one hull triangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FacetGeometry {
    /// Index of the face in the hull
    pub face: usize,
    /// Vertex indices, in winding order
    pub indices: [usize; 3],
    /// Mean of the three corners
    pub centroid: Vertex,
    /// Unit normal
    pub normal: Vertex,
    /// Triangle area
    pub area: f64,
}

/// Centroid, unit normal and area of the triangle (v0, v1, v2).
///
/// Fails with [`ConvexHullError::DegenerateFacet`] (tagged with `face`) when the
/// cross product is shorter than the crate tolerance.
pub fn facet_geometry(
    face: usize,
    v0: &Vertex,
    v1: &Vertex,
    v2: &Vertex,
) -> Result<(Vertex, Vertex, f64)> {
    let centroid = v0.add(v1).add(v2).scale(1.0 / 3.0);
    let raw = v1.sub(v0).cross(&v2.sub(v0));
    let length = raw.magnitude();

    if length < EPSILON || !length.is_finite() {
        return Err(ConvexHullError::DegenerateFacet { face });
    }

    Ok((centroid, raw.scale(1.0 / length), length / 2.0))
}

impl ConvexHull3D {
    /// Geometry of every face, in face order.
    ///
    /// Zero-area faces yield `Err(DegenerateFacet)` in their slot; the other
    /// faces are unaffected.
    pub fn facets(&self) -> Vec<Result<FacetGeometry>> {
        self.faces()
            .iter()
            .enumerate()
            .map(|(i, face)| {
                let [v0, v1, v2] = face.corners(self.vertices());
                let (centroid, normal, area) = facet_geometry(i, &v0, &v1, &v2)?;
                Ok(FacetGeometry {
                    face: i,
                    indices: face.indices(),
                    centroid,
                    normal,
                    area,
                })
            })
            .collect()
    }
}
