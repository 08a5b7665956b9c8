//! RANSAC plane segmentation
//!
//! Each trial draws `sample_size` distinct points, fits a least-squares plane
//! through them and counts the points within `distance_threshold` of it. The
//! trial with the most inliers wins; on equal counts the earliest trial wins.
//!
//! Samples are drawn from the random source sequentially, one block of trials
//! at a time, and the block is then evaluated either sequentially or with
//! rayon. Drawing before evaluating keeps the result identical in both modes
//! for a given random source.

use crate::cancel::CancelToken;
use crate::error::{ExtractionError, Result};
use crate::types::{PlaneModel, Point};
use nalgebra::{Matrix3, SymmetricEigen, Vector3};
use rand::Rng;
use rand::seq::index;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Trials drawn and evaluated together between cancellation checks
const TRIAL_BLOCK: usize = 256;

/// Relative tolerance below which a sample is considered collinear
const DEGENERACY_TOLERANCE: f64 = 1e-12;

/// Parameters of one segmentation call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RansacParams {
    /// Maximum perpendicular distance of an inlier
    pub distance_threshold: f64,
    /// Points drawn per trial (at least 3)
    pub sample_size: usize,
    /// Number of trials
    pub max_iterations: usize,
    /// Refit on the winning inliers.
    ///
    /// The refit is a least-squares fit over every inlier, so where two
    /// planes meet, points of the other plane within `distance_threshold` of
    /// the intersection pull the normal slightly towards it (one or two
    /// degrees for a 0.05 band on a 2 m patch).
    pub refine: bool,
    /// Evaluate trials with rayon
    pub parallel: bool,
}

impl RansacParams {
    pub fn new(distance_threshold: f64, sample_size: usize, max_iterations: usize) -> Self {
        Self {
            distance_threshold,
            sample_size,
            max_iterations,
            refine: true,
            parallel: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.distance_threshold.is_finite() || self.distance_threshold <= 0.0 {
            return Err(ExtractionError::invalid(
                "distance_threshold",
                format!("must be finite and > 0, got {}", self.distance_threshold),
            ));
        }
        if self.sample_size < 3 {
            return Err(ExtractionError::invalid(
                "sample_size",
                format!("must be >= 3, got {}", self.sample_size),
            ));
        }
        if self.max_iterations == 0 {
            return Err(ExtractionError::invalid("max_iterations", "must be >= 1"));
        }
        Ok(())
    }
}

/// Winning plane of a segmentation call
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneFit {
    pub model: PlaneModel,
    /// Indices into the segmented slice, ascending
    pub inliers: Vec<usize>,
    /// Trials evaluated
    pub trials: usize,
    /// Trials whose sample had no defined normal
    pub degenerate_trials: usize,
}

/// Least-squares plane through `points[indices]`.
///
/// Three points give the exact plane through them; more points use the
/// eigenvector of the smallest eigenvalue of their covariance. Returns `None`
/// when the points are coincident or collinear.
pub fn fit_plane(points: &[Point], indices: &[usize]) -> Option<PlaneModel> {
    if indices.len() < 3 {
        return None;
    }

    if let &[i0, i1, i2] = indices {
        let (p0, p1, p2) = (points[i0], points[i1], points[i2]);
        let e1 = p1.sub(&p0);
        let e2 = p2.sub(&p0);
        let raw = e1.cross(&e2);
        let scale = e1.dot(&e1).max(e2.dot(&e2));
        let length = raw.magnitude();
        if !length.is_finite() || length <= DEGENERACY_TOLERANCE * scale {
            return None;
        }
        let centroid = p0.add(&p1).add(&p2).scale(1.0 / 3.0);
        return PlaneModel::from_point_normal(&centroid, &raw);
    }

    let n = indices.len() as f64;
    let centroid = indices
        .iter()
        .fold(Point::zero(), |acc, &i| acc.add(&points[i]))
        .scale(1.0 / n);

    let mut covariance = Matrix3::<f64>::zeros();
    for &i in indices {
        let d = points[i].sub(&centroid);
        let v = Vector3::new(d.x, d.y, d.z);
        covariance += v * v.transpose();
    }

    let eigen = SymmetricEigen::new(covariance);
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));
    let [smallest, middle, largest] = order;

    // A plane needs two independent directions of spread
    let spread = eigen.eigenvalues[largest];
    let second = eigen.eigenvalues[middle];
    if !second.is_finite() || second <= DEGENERACY_TOLERANCE * spread {
        return None;
    }

    let normal = eigen.eigenvectors.column(smallest);
    PlaneModel::from_point_normal(&centroid, &Point::new(normal[0], normal[1], normal[2]))
}

/// Count points within `threshold` of `model`
fn count_inliers(points: &[Point], model: &PlaneModel, threshold: f64) -> usize {
    points
        .iter()
        .filter(|p| model.distance(p) <= threshold)
        .count()
}

/// Indices of the points within `threshold` of `model`
fn collect_inliers(points: &[Point], model: &PlaneModel, threshold: f64) -> Vec<usize> {
    points
        .iter()
        .enumerate()
        .filter(|(_, p)| model.distance(p) <= threshold)
        .map(|(i, _)| i)
        .collect()
}

/// Fit one plane to `points` by random sample consensus.
///
/// Fails with `InsufficientPoints` when there are fewer points than
/// `sample_size`, with `DegenerateSample` when every trial drew a degenerate
/// sample, and with `Cancelled` when `cancel` fires between trial blocks.
pub fn segment_plane<R: Rng + ?Sized>(
    points: &[Point],
    params: &RansacParams,
    rng: &mut R,
    cancel: &CancelToken,
) -> Result<PlaneFit> {
    params.validate()?;
    if points.len() < params.sample_size {
        return Err(ExtractionError::InsufficientPoints {
            available: points.len(),
            required: params.sample_size,
        });
    }

    let threshold = params.distance_threshold;
    let evaluate = |sample: &Vec<usize>| -> Option<(PlaneModel, usize)> {
        let model = fit_plane(points, sample)?;
        Some((model, count_inliers(points, &model, threshold)))
    };

    let mut best: Option<(PlaneModel, usize)> = None;
    let mut degenerate_trials = 0;
    let mut trials = 0;

    while trials < params.max_iterations {
        cancel.check()?;

        let block = TRIAL_BLOCK.min(params.max_iterations - trials);
        let samples: Vec<Vec<usize>> = (0..block)
            .map(|_| index::sample(rng, points.len(), params.sample_size).into_vec())
            .collect();

        let outcomes: Vec<Option<(PlaneModel, usize)>> = if params.parallel {
            samples.par_iter().map(&evaluate).collect()
        } else {
            samples.iter().map(&evaluate).collect()
        };

        for outcome in outcomes {
            match outcome {
                None => degenerate_trials += 1,
                Some((model, count)) => {
                    if best.is_none_or(|(_, best_count)| count > best_count) {
                        best = Some((model, count));
                    }
                }
            }
        }
        trials += block;
    }

    let Some((mut model, mut count)) = best else {
        return Err(ExtractionError::DegenerateSample { trials });
    };

    let mut inliers = collect_inliers(points, &model, threshold);

    if params.refine
        && let Some(refined) = fit_plane(points, &inliers)
    {
        let refined_count = count_inliers(points, &refined, threshold);
        if refined_count >= count {
            log::debug!(
                "refined plane {} -> {} ({} -> {} inliers)",
                model,
                refined,
                count,
                refined_count
            );
            model = refined;
            count = refined_count;
            inliers = collect_inliers(points, &model, threshold);
        }
    }

    debug_assert_eq!(inliers.len(), count);

    Ok(PlaneFit {
        model,
        inliers,
        trials,
        degenerate_trials,
    })
}
