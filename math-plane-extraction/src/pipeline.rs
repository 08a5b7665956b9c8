//! Extraction operations
//!
//! Every operation is a pure function of the point set, its parameters and
//! the random source derived from them. Nothing here stores or renders; see
//! [`crate::persistence`] and [`crate::scene`] for that.

use crate::cancel::CancelToken;
use crate::config::ExtractionParams;
use crate::error::{Diagnostic, ExtractionError, Result, Stage};
use crate::ransac::segment_plane;
use crate::regions::{RegionExtraction, extract_fixed_count, extract_regions};
use crate::types::{PlaneModel, PlaneRegion, Point, Rgb};
use math_convex_hull::{ConvexHull3D, ConvexHullError, FacetGeometry};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a run computes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operation {
    /// Load only
    Load,
    /// One plane over the whole set
    SinglePlane,
    /// Exactly `count` planes, no minimum size
    FixedCount { count: usize },
    /// Region loop bounded by the minimum region size
    Extract,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Load => write!(f, "load"),
            Operation::SinglePlane => write!(f, "single plane"),
            Operation::FixedCount { count } => write!(f, "{} planes", count),
            Operation::Extract => write!(f, "region extraction"),
        }
    }
}

/// One accepted region with its derived geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionResult {
    /// Position in acceptance order
    pub index: usize,
    pub plane: PlaneModel,
    /// Indices into the original point set
    pub inliers: Vec<usize>,
    /// Display color
    pub color: Rgb,
    /// Hull of the inliers, when requested and buildable
    pub hull: Option<ConvexHull3D>,
    /// Geometry of the non-degenerate hull facets, when normals were requested
    pub facets: Vec<FacetGeometry>,
}

impl RegionResult {
    fn new(index: usize, region: PlaneRegion) -> Self {
        Self {
            index,
            plane: region.model,
            inliers: region.inliers,
            color: Rgb::palette(index),
            hull: None,
            facets: Vec::new(),
        }
    }

    /// Inlier coordinates
    pub fn points(&self, cloud: &[Point]) -> Vec<Point> {
        self.inliers.iter().map(|&i| cloud[i]).collect()
    }
}

/// Result of one operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub operation: Operation,
    /// Size of the input point set
    pub point_count: usize,
    pub regions: Vec<RegionResult>,
    /// Discarded regions, skipped calls, failed hulls and degenerate facets
    pub diagnostics: Vec<Diagnostic>,
    /// Segmentation calls made
    pub iterations: usize,
    /// Residual size before each segmentation call
    pub residual_history: Vec<usize>,
    /// Points no region claimed
    pub residual_points: usize,
    /// Hull builds attempted
    pub hulls_attempted: usize,
}

impl ExtractionOutput {
    fn empty(operation: Operation, point_count: usize) -> Self {
        Self {
            operation,
            point_count,
            regions: Vec::new(),
            diagnostics: Vec::new(),
            iterations: 0,
            residual_history: Vec::new(),
            residual_points: point_count,
            hulls_attempted: 0,
        }
    }

    fn from_extraction(operation: Operation, point_count: usize, run: RegionExtraction) -> Self {
        Self {
            operation,
            point_count,
            regions: run
                .regions
                .into_iter()
                .enumerate()
                .map(|(i, r)| RegionResult::new(i, r))
                .collect(),
            diagnostics: run.diagnostics,
            iterations: run.iterations,
            residual_history: run.residual_history,
            residual_points: run.residual.len(),
            hulls_attempted: 0,
        }
    }

    /// Regions whose hull was built
    pub fn hull_count(&self) -> usize {
        self.regions.iter().filter(|r| r.hull.is_some()).count()
    }

    /// Facet normals across all regions
    pub fn normal_count(&self) -> usize {
        self.regions.iter().map(|r| r.facets.len()).sum()
    }
}

/// Run `operation` on `points`.
///
/// Hulls and normals are attached to the regions of any operation when
/// `params` asks for them.
pub fn run_operation(
    points: &[Point],
    operation: Operation,
    params: &ExtractionParams,
    cancel: &CancelToken,
) -> Result<ExtractionOutput> {
    let mut output = match operation {
        Operation::Load => ExtractionOutput::empty(operation, points.len()),
        Operation::SinglePlane => {
            let ransac = params.ransac();
            let fit = segment_plane(points, &ransac, &mut params.rng(), cancel)?;
            let mut output = ExtractionOutput::empty(operation, points.len());
            output.iterations = 1;
            output.residual_history.push(points.len());
            output.residual_points = points.len() - fit.inliers.len();
            output.regions.push(RegionResult::new(
                0,
                PlaneRegion {
                    model: fit.model,
                    inliers: fit.inliers,
                },
            ));
            output
        }
        Operation::FixedCount { count } => {
            let ransac = params.ransac();
            let run = extract_fixed_count(points, count, &ransac, &mut params.rng(), cancel)?;
            ExtractionOutput::from_extraction(operation, points.len(), run)
        }
        Operation::Extract => {
            params.validate()?;
            let run = extract_regions(
                points,
                &params.region_params(),
                &mut params.rng(),
                cancel,
            )?;
            ExtractionOutput::from_extraction(operation, points.len(), run)
        }
    };

    if params.wants_hull() && operation != Operation::Load {
        attach_geometry(points, &mut output, params.compute_normals, cancel)?;
    }

    for diagnostic in &output.diagnostics {
        log::warn!("{}", diagnostic);
    }
    log::info!(
        "{}: {} points -> {} regions ({} hulls, {} normals), {} unclaimed, {} diagnostics",
        output.operation,
        output.point_count,
        output.regions.len(),
        output.hull_count(),
        output.normal_count(),
        output.residual_points,
        output.diagnostics.len()
    );

    Ok(output)
}

/// Generic entry point: region loop, then hulls and normals as requested
pub fn extract(
    points: &[Point],
    params: &ExtractionParams,
    cancel: &CancelToken,
) -> Result<ExtractionOutput> {
    run_operation(points, Operation::Extract, params, cancel)
}

/// Build the hull of every region and, when asked, its facet geometry.
///
/// A region whose hull cannot be built keeps `hull: None`; a degenerate facet
/// is left out of `facets`. Both are recorded as diagnostics.
fn attach_geometry(
    points: &[Point],
    output: &mut ExtractionOutput,
    compute_normals: bool,
    cancel: &CancelToken,
) -> Result<()> {
    for region in &mut output.regions {
        cancel.check()?;
        output.hulls_attempted += 1;

        let hull = match ConvexHull3D::build(&region.points(points)) {
            Ok(hull) => hull,
            Err(source) => {
                if matches!(source, ConvexHullError::MaxIterationsExceeded) {
                    log::error!("region {}: hull iteration cap reached", region.index);
                }
                let err = ExtractionError::DegenerateGeometry {
                    region: region.index,
                    source,
                };
                output.diagnostics.push(err.to_diagnostic());
                continue;
            }
        };

        log::debug!(
            "region {}: hull with {} vertices, {} faces",
            region.index,
            hull.num_vertices(),
            hull.num_faces()
        );

        if compute_normals {
            for facet in hull.facets() {
                match facet {
                    Ok(facet) => region.facets.push(facet),
                    Err(ConvexHullError::DegenerateFacet { face }) => {
                        let err = ExtractionError::DegenerateFacet {
                            region: region.index,
                            face,
                        };
                        output.diagnostics.push(err.to_diagnostic());
                    }
                    Err(other) => {
                        output.diagnostics.push(Diagnostic::new(
                            Stage::Normals,
                            Some(region.index),
                            other.to_string(),
                        ));
                    }
                }
            }
        }

        region.hull = Some(hull);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdata;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn small_params() -> ExtractionParams {
        ExtractionParams {
            min_points_per_plane: 150,
            sample_size: 3,
            max_iterations: 300,
            ..ExtractionParams::default()
        }
        .with_seed(17)
    }

    fn scene() -> Vec<Point> {
        let mut rng = StdRng::seed_from_u64(99);
        testdata::floor_and_wall(300, 0.005, &mut rng).unwrap()
    }

    #[test]
    fn test_load_only() {
        let points = scene();
        let out = run_operation(
            &points,
            Operation::Load,
            &ExtractionParams::hull_with_normals(),
            &CancelToken::new(),
        )
        .unwrap();
        assert!(out.regions.is_empty());
        assert_eq!(out.point_count, 600);
        assert_eq!(out.hulls_attempted, 0);
    }

    #[test]
    fn test_single_plane() {
        let points = scene();
        let out = run_operation(
            &points,
            Operation::SinglePlane,
            &small_params(),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(out.regions.len(), 1);
        assert_eq!(out.iterations, 1);
        assert!(out.regions[0].inliers.len() >= 295);
        assert_eq!(out.residual_points + out.regions[0].inliers.len(), 600);
    }

    #[test]
    fn test_extract_without_hull() {
        let points = scene();
        let out = extract(&points, &small_params(), &CancelToken::new()).unwrap();
        assert_eq!(out.regions.len(), 2);
        assert_eq!(out.hulls_attempted, 0);
        assert!(out.regions.iter().all(|r| r.hull.is_none()));
        assert_ne!(out.regions[0].color, out.regions[1].color);
    }

    #[test]
    fn test_normals_imply_hull() {
        let points = scene();
        let params = ExtractionParams {
            compute_normals: true,
            ..small_params()
        };
        let out = extract(&points, &params, &CancelToken::new()).unwrap();

        assert_eq!(out.hull_count(), 2);
        for region in &out.regions {
            let hull = region.hull.as_ref().unwrap();
            assert_eq!(region.facets.len(), hull.num_faces());
            for p in region.points(&points) {
                assert!(hull.contains(&p, 1e-9));
            }
            for facet in &region.facets {
                assert_abs_diff_eq!(facet.normal.magnitude(), 1.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_hull_only_has_no_facets() {
        let points = scene();
        let params = ExtractionParams {
            compute_hull: true,
            ..small_params()
        };
        let out = extract(&points, &params, &CancelToken::new()).unwrap();
        assert_eq!(out.hull_count(), 2);
        assert_eq!(out.normal_count(), 0);
    }

    #[test]
    fn test_flat_region_keeps_no_hull() {
        // Noise-free plane: the inliers are exactly coplanar
        let points: Vec<Point> = (0..400)
            .map(|i| Point::new((i % 20) as f64 * 0.1, (i / 20) as f64 * 0.1, 1.0))
            .collect();
        let params = ExtractionParams {
            compute_normals: true,
            min_points_per_plane: 100,
            ..small_params()
        };
        let out = extract(&points, &params, &CancelToken::new()).unwrap();

        assert_eq!(out.regions.len(), 1);
        assert!(out.regions[0].hull.is_none());
        assert_eq!(out.hulls_attempted, 1);
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].stage, Stage::Hull);
        assert_eq!(out.diagnostics[0].region, Some(0));
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let points = scene();
        let params = small_params();
        let a = extract(&points, &params, &CancelToken::new()).unwrap();
        let b = extract(&points, &params, &CancelToken::new()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_params_fail_before_work() {
        let params = ExtractionParams {
            sample_size: 1,
            ..small_params()
        };
        let err = extract(&scene(), &params, &CancelToken::new()).unwrap_err();
        assert!(err.is_usage_error());
    }
}
