//! 3D Convex Hull and Facet Geometry Library
//!
//! This library implements the Quickhull algorithm for computing convex hulls
//! in 3D space, and the per-facet centroid/normal computation used to describe
//! the hull of a planar point region.
//!
//! # 3D Convex Hull Example
//! ```
//! use math_convex_hull::{ConvexHull3D, Vertex};
//!
//! let vertices = vec![
//!     Vertex::new(0.0, 0.0, 0.0),
//!     Vertex::new(1.0, 0.0, 0.0),
//!     Vertex::new(0.0, 1.0, 0.0),
//!     Vertex::new(0.0, 0.0, 1.0),
//! ];
//!
//! let hull = ConvexHull3D::build(&vertices).unwrap();
//! assert_eq!(hull.num_faces(), 4);
//!
//! for facet in hull.facets() {
//!     let facet = facet.unwrap();
//!     assert!((facet.normal.magnitude() - 1.0).abs() < 1e-12);
//! }
//! ```

mod export;
mod facet;
mod geometry;
mod quickhull;
mod types;

// Make testdata publicly available for tests
pub mod testdata;

pub use export::export_obj;
pub use facet::{FacetGeometry, facet_geometry};
pub use geometry::{centroid, signed_tetrahedron_volume, tetrahedron_volume};
pub use types::{ConvexHull3D, Face, Vertex};

use std::collections::HashSet;

/// Error types for convex hull operations
#[derive(Debug, thiserror::Error)]
pub enum ConvexHullError {
    #[error("Not enough vertices to form a hull (minimum 4 required, got {count})")]
    InsufficientVertices { count: usize },

    #[error("Vertices are coplanar or collinear")]
    DegenerateConfiguration,

    #[error("Maximum iterations exceeded")]
    MaxIterationsExceeded,

    #[error("Facet {face} has zero area")]
    DegenerateFacet { face: usize },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ConvexHullError {
    /// Returns `true` when the input geometry (not the environment) is at fault.
    pub fn is_degenerate(&self) -> bool {
        matches!(
            self,
            ConvexHullError::InsufficientVertices { .. }
                | ConvexHullError::DegenerateConfiguration
                | ConvexHullError::DegenerateFacet { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ConvexHullError>;

/// Numerical tolerance for floating-point comparisons
/// Used throughout the library for:
/// - Distance calculations
/// - Determinant checks
/// - Degeneracy detection
pub(crate) const EPSILON: f64 = 1e-10;

/// Scale-aware tolerance: `EPSILON` times the largest coordinate magnitude
/// (never less than `EPSILON`).
pub(crate) fn compute_relative_epsilon(vertices: &[Vertex]) -> f64 {
    let scale = vertices
        .iter()
        .map(Vertex::max_abs_coord)
        .fold(0.0_f64, f64::max);
    EPSILON * scale.max(1.0)
}

/// Remove points that coincide within `epsilon`.
///
/// Points are bucketed on a grid of cell size `epsilon`; the first point seen
/// in a cell wins. Order of the survivors is preserved.
pub(crate) fn deduplicate_vertices(vertices: &[Vertex], epsilon: f64) -> Vec<Vertex> {
    let mut seen: HashSet<(i64, i64, i64)> = HashSet::with_capacity(vertices.len());
    let cell = |c: f64| (c / epsilon).round() as i64;

    vertices
        .iter()
        .filter(|v| v.x.is_finite() && v.y.is_finite() && v.z.is_finite())
        .filter(|v| seen.insert((cell(v.x), cell(v.y), cell(v.z))))
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_epsilon_scales() {
        let small = [Vertex::new(0.1, 0.2, 0.3)];
        let large = [Vertex::new(1.0e4, -2.0e4, 0.0)];
        assert_eq!(compute_relative_epsilon(&small), EPSILON);
        assert!((compute_relative_epsilon(&large) - 2.0e4 * EPSILON).abs() < 1e-18);
    }

    #[test]
    fn test_deduplicate_vertices() {
        let vertices = [
            Vertex::new(0.0, 0.0, 0.0),
            Vertex::new(1.0, 0.0, 0.0),
            Vertex::new(0.0, 0.0, 0.0),
            Vertex::new(f64::NAN, 0.0, 0.0),
            Vertex::new(1.0, 0.0, 0.0),
        ];
        let unique = deduplicate_vertices(&vertices, EPSILON);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[1], Vertex::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_error_categories() {
        assert!(ConvexHullError::DegenerateConfiguration.is_degenerate());
        assert!(ConvexHullError::DegenerateFacet { face: 3 }.is_degenerate());
        assert!(!ConvexHullError::MaxIterationsExceeded.is_degenerate());
        assert_eq!(
            ConvexHullError::InsufficientVertices { count: 2 }.to_string(),
            "Not enough vertices to form a hull (minimum 4 required, got 2)"
        );
    }
}
