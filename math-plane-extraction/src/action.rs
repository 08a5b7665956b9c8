//! Named requests accepted from the trigger surface

use crate::config::{ExtractionParams, PipelineConfig};
use crate::error::ExtractionError;
use crate::pipeline::Operation;
use std::fmt;
use std::str::FromStr;

/// A request to run on the active point set
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// Show the cloud and store its points
    Open,
    /// One plane over the whole cloud
    FindPlanes,
    /// A fixed number of planes
    FindMultiplePlanes,
    /// Regions down to the minimum size
    FindPointsAboveThreshold,
    /// Regions with hulls and facet normals, stored
    FindConvexHullWithNormals,
    /// The generic entry point with explicit parameters
    Extract(ExtractionParams),
}

impl Action {
    /// Names accepted by [`FromStr`]
    pub const NAMES: [&'static str; 5] = [
        "open",
        "find_planes",
        "find_multiple_planes",
        "find_points_above_threshold",
        "find_convex_hull_with_normals",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Action::Open => "open",
            Action::FindPlanes => "find_planes",
            Action::FindMultiplePlanes => "find_multiple_planes",
            Action::FindPointsAboveThreshold => "find_points_above_threshold",
            Action::FindConvexHullWithNormals => "find_convex_hull_with_normals",
            Action::Extract(_) => "extract",
        }
    }

    pub fn operation(&self, config: &PipelineConfig) -> Operation {
        match self {
            Action::Open => Operation::Load,
            Action::FindPlanes => Operation::SinglePlane,
            Action::FindMultiplePlanes => Operation::FixedCount {
                count: config.fixed_count,
            },
            Action::FindPointsAboveThreshold
            | Action::FindConvexHullWithNormals
            | Action::Extract(_) => Operation::Extract,
        }
    }

    /// Parameters of the action.
    ///
    /// Named actions use their preset, taking seed, parallelism and
    /// refinement from `config`.
    pub fn params(&self, config: &PipelineConfig) -> ExtractionParams {
        let preset = match self {
            Action::Extract(params) => return *params,
            Action::Open | Action::FindPlanes | Action::FindMultiplePlanes => {
                ExtractionParams::plane_search()
            }
            Action::FindPointsAboveThreshold => ExtractionParams::threshold(),
            Action::FindConvexHullWithNormals => ExtractionParams::hull_with_normals(),
        };
        ExtractionParams {
            seed: config.params.seed,
            parallel: config.params.parallel,
            refine: config.params.refine,
            ..preset
        }
    }

    /// Whether the loaded points are written to storage
    pub fn stores_points(&self) -> bool {
        matches!(self, Action::Open)
    }

    /// Whether region polygons and normals are written to storage
    pub fn stores_regions(&self) -> bool {
        match self {
            Action::FindConvexHullWithNormals => true,
            Action::Extract(params) => params.compute_normals,
            _ => false,
        }
    }
}

impl FromStr for Action {
    type Err = ExtractionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Action::Open),
            "find_planes" => Ok(Action::FindPlanes),
            "find_multiple_planes" => Ok(Action::FindMultiplePlanes),
            "find_points_above_threshold" => Ok(Action::FindPointsAboveThreshold),
            "find_convex_hull_with_normals" => Ok(Action::FindConvexHullWithNormals),
            other => Err(ExtractionError::UnknownAction {
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for name in Action::NAMES {
            let action: Action = name.parse().unwrap();
            assert_eq!(action.name(), name);
        }
    }

    #[test]
    fn test_unknown_action() {
        let err = "find_spheres".parse::<Action>().unwrap_err();
        assert!(matches!(err, ExtractionError::UnknownAction { ref name } if name == "find_spheres"));
        assert!("Open".parse::<Action>().is_err());
    }

    #[test]
    fn test_presets() {
        let config = PipelineConfig::default();

        let multi = Action::FindMultiplePlanes;
        assert_eq!(multi.operation(&config), Operation::FixedCount { count: 4 });
        assert_eq!(multi.params(&config).sample_size, 5);

        let hull = Action::FindConvexHullWithNormals;
        let params = hull.params(&config);
        assert_eq!(hull.operation(&config), Operation::Extract);
        assert_eq!(params.min_points_per_plane, 500);
        assert_eq!(params.sample_size, 10);
        assert_eq!(params.max_iterations, 100_000);
        assert!(params.compute_normals);
        assert!(hull.stores_regions());
        assert!(!Action::FindPointsAboveThreshold.stores_regions());
    }

    #[test]
    fn test_config_seed_reaches_presets() {
        let mut config = PipelineConfig::default();
        config.params.seed = Some(3);
        assert_eq!(Action::FindPlanes.params(&config).seed, Some(3));
    }
}
