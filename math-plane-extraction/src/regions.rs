//! Iterative region extraction over a shrinking residual point set

use crate::cancel::CancelToken;
use crate::error::{Diagnostic, ExtractionError, Result, Stage};
use crate::ransac::{RansacParams, segment_plane};
use crate::types::{PlaneRegion, Point};
use rand::Rng;

/// Parameters of the region loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionParams {
    /// Smallest inlier count for an accepted region
    pub min_points_per_plane: usize,
    pub ransac: RansacParams,
    /// Stop after this many accepted regions
    pub max_planes: Option<usize>,
}

impl RegionParams {
    pub fn validate(&self) -> Result<()> {
        if self.min_points_per_plane == 0 {
            return Err(ExtractionError::invalid(
                "min_points_per_plane",
                "must be >= 1",
            ));
        }
        self.ransac.validate()
    }
}

/// Regions found by one extraction run, with the loop bookkeeping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionExtraction {
    pub regions: Vec<PlaneRegion>,
    pub diagnostics: Vec<Diagnostic>,
    /// Segmentation calls made
    pub iterations: usize,
    /// Residual size before each segmentation call
    pub residual_history: Vec<usize>,
    /// Original indices of the points no region claimed
    pub residual: Vec<usize>,
}

/// Points not yet claimed by a region, with their original indices
struct Residual {
    points: Vec<Point>,
    original: Vec<usize>,
}

impl Residual {
    fn new(points: &[Point]) -> Self {
        Self {
            points: points.to_vec(),
            original: (0..points.len()).collect(),
        }
    }

    fn len(&self) -> usize {
        self.points.len()
    }

    /// Remove the points at the local indices `claimed` and return their
    /// original indices
    fn remove(&mut self, claimed: &[usize]) -> Vec<usize> {
        let mut keep = vec![true; self.points.len()];
        for &i in claimed {
            keep[i] = false;
        }
        let removed = claimed.iter().map(|&i| self.original[i]).collect();

        let (points, original) = self
            .points
            .iter()
            .zip(&self.original)
            .zip(&keep)
            .filter(|(_, kept)| **kept)
            .map(|((p, o), _)| (*p, *o))
            .unzip();
        self.points = points;
        self.original = original;

        removed
    }
}

/// Segment planes until the residual is too small or the best plane has too
/// few inliers.
///
/// A plane with fewer than `min_points_per_plane` inliers is discarded, ends
/// the loop and is reported in the diagnostics. A residual smaller than the
/// RANSAC sample ends the loop normally.
pub fn extract_regions<R: Rng + ?Sized>(
    points: &[Point],
    params: &RegionParams,
    rng: &mut R,
    cancel: &CancelToken,
) -> Result<RegionExtraction> {
    params.validate()?;

    let mut residual = Residual::new(points);
    let mut out = RegionExtraction::default();

    loop {
        cancel.check()?;

        if params
            .max_planes
            .is_some_and(|max| out.regions.len() >= max)
        {
            log::debug!("reached the cap of {} planes", out.regions.len());
            break;
        }
        if residual.len() < params.min_points_per_plane {
            log::debug!(
                "{} points left, below the minimum of {}",
                residual.len(),
                params.min_points_per_plane
            );
            break;
        }

        let region = out.regions.len();
        out.residual_history.push(residual.len());
        out.iterations += 1;

        let fit = match segment_plane(&residual.points, &params.ransac, rng, cancel) {
            Ok(fit) => fit,
            Err(ExtractionError::InsufficientPoints { .. }) => break,
            Err(err @ ExtractionError::DegenerateSample { .. }) => {
                log::warn!("region {}: {}", region, err);
                out.diagnostics.push(Diagnostic::new(
                    Stage::Segmentation,
                    Some(region),
                    err.to_string(),
                ));
                break;
            }
            Err(err) => return Err(err),
        };

        if fit.inliers.len() < params.min_points_per_plane {
            let message = format!(
                "best plane has {} inliers, below the minimum of {}; discarded",
                fit.inliers.len(),
                params.min_points_per_plane
            );
            log::debug!("region {}: {}", region, message);
            out.diagnostics
                .push(Diagnostic::new(Stage::Segmentation, Some(region), message));
            break;
        }

        let inliers = residual.remove(&fit.inliers);
        log::debug!(
            "region {}: {} inliers on {}, {} points left",
            region,
            inliers.len(),
            fit.model,
            residual.len()
        );
        out.regions.push(PlaneRegion {
            model: fit.model,
            inliers,
        });
    }

    out.residual = residual.original;
    Ok(out)
}

/// Segment exactly `count` planes, removing each plane's inliers before the
/// next call.
///
/// No minimum inlier count applies. When the residual runs short of a RANSAC
/// sample the remaining calls are skipped and reported in the diagnostics.
pub fn extract_fixed_count<R: Rng + ?Sized>(
    points: &[Point],
    count: usize,
    ransac: &RansacParams,
    rng: &mut R,
    cancel: &CancelToken,
) -> Result<RegionExtraction> {
    ransac.validate()?;

    let mut residual = Residual::new(points);
    let mut out = RegionExtraction::default();

    for call in 0..count {
        cancel.check()?;

        if residual.len() < ransac.sample_size {
            let message = format!(
                "{} points left; skipped the remaining {} of {} calls",
                residual.len(),
                count - call,
                count
            );
            log::warn!("{}", message);
            out.diagnostics
                .push(Diagnostic::new(Stage::Segmentation, Some(call), message));
            break;
        }

        out.residual_history.push(residual.len());
        out.iterations += 1;

        let fit = match segment_plane(&residual.points, ransac, rng, cancel) {
            Ok(fit) if !fit.inliers.is_empty() => fit,
            Ok(_) => {
                out.diagnostics.push(Diagnostic::new(
                    Stage::Segmentation,
                    Some(call),
                    "best plane has no inliers",
                ));
                break;
            }
            Err(err @ ExtractionError::DegenerateSample { .. }) => {
                log::warn!("call {}: {}", call, err);
                out.diagnostics.push(Diagnostic::new(
                    Stage::Segmentation,
                    Some(call),
                    err.to_string(),
                ));
                break;
            }
            Err(err) => return Err(err),
        };

        let inliers = residual.remove(&fit.inliers);
        out.regions.push(PlaneRegion {
            model: fit.model,
            inliers,
        });
    }

    out.residual = residual.original;
    Ok(out)
}
