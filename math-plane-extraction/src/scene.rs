//! Geometries showing an extraction result

use crate::pipeline::{ExtractionOutput, Operation, RegionResult};
use crate::types::{Point, Rgb};
use crate::visualization::Geometry;
use math_convex_hull::ConvexHull3D;
use std::collections::BTreeSet;

/// Geometries for `output`, computed over the cloud `points`.
///
/// - load: the whole cloud
/// - single plane: the inlier cloud
/// - regions without hulls: one colored cloud per region
/// - regions with hulls: colored hull wireframes, plus red facet normals of
///   length `normal_length` from each facet centroid
pub fn scene_for(points: &[Point], output: &ExtractionOutput, normal_length: f64) -> Vec<Geometry> {
    if output.operation == Operation::Load {
        return vec![Geometry::Points {
            points: points.to_vec(),
            color: None,
        }];
    }

    let mut geometries = Vec::new();
    for region in &output.regions {
        match &region.hull {
            Some(hull) => {
                geometries.push(hull_wireframe(hull, Some(region.color)));
                if !region.facets.is_empty() {
                    geometries.push(normal_segments(region, normal_length));
                }
            }
            None => {
                let color = (output.operation != Operation::SinglePlane).then_some(region.color);
                geometries.push(Geometry::Points {
                    points: region.points(points),
                    color,
                });
            }
        }
    }
    geometries
}

/// Unique edges of the hull triangles as a line set
pub fn hull_wireframe(hull: &ConvexHull3D, color: Option<Rgb>) -> Geometry {
    let edges: BTreeSet<(usize, usize)> = hull
        .faces()
        .iter()
        .flat_map(|f| f.edges())
        .map(|(a, b)| (a.min(b), a.max(b)))
        .collect();

    Geometry::LineSet {
        points: hull.vertices().to_vec(),
        lines: edges.into_iter().map(|(a, b)| [a, b]).collect(),
        color,
    }
}

/// Red segments from each facet centroid along its normal
pub fn normal_segments(region: &RegionResult, length: f64) -> Geometry {
    let mut points = Vec::with_capacity(region.facets.len() * 2);
    let mut lines = Vec::with_capacity(region.facets.len());

    for facet in &region.facets {
        let start = points.len();
        points.push(facet.centroid);
        points.push(facet.centroid.add(&facet.normal.scale(length)));
        lines.push([start, start + 1]);
    }

    Geometry::LineSet {
        points,
        lines,
        color: Some(Rgb::RED),
    }
}
