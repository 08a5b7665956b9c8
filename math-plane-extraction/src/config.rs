//! JSON configuration for extraction runs

use crate::error::{ExtractionError, Result};
use crate::ransac::RansacParams;
use crate::regions::RegionParams;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Parameters of the generic extraction entry point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtractionParams {
    /// Smallest inlier count for an accepted region
    #[serde(default = "default_min_points")]
    pub min_points_per_plane: usize,
    /// Maximum point-to-plane distance of an inlier
    #[serde(default = "default_distance_threshold")]
    pub distance_threshold: f64,
    /// Points drawn per RANSAC trial
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
    /// RANSAC trials per plane
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Build a convex hull per accepted region
    #[serde(default)]
    pub compute_hull: bool,
    /// Compute facet normals per hull (implies `compute_hull`)
    #[serde(default)]
    pub compute_normals: bool,
    /// Refit each plane on its inliers
    #[serde(default = "default_true")]
    pub refine: bool,
    /// Evaluate RANSAC trials in parallel
    #[serde(default = "default_true")]
    pub parallel: bool,
    /// Seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,
    /// Stop after this many regions
    #[serde(default)]
    pub max_planes: Option<usize>,
}

fn default_min_points() -> usize {
    500
}

fn default_distance_threshold() -> f64 {
    0.05
}

fn default_sample_size() -> usize {
    10
}

fn default_max_iterations() -> usize {
    100_000
}

fn default_true() -> bool {
    true
}

impl Default for ExtractionParams {
    fn default() -> Self {
        Self {
            min_points_per_plane: default_min_points(),
            distance_threshold: default_distance_threshold(),
            sample_size: default_sample_size(),
            max_iterations: default_max_iterations(),
            compute_hull: false,
            compute_normals: false,
            refine: true,
            parallel: true,
            seed: None,
            max_planes: None,
        }
    }
}

impl ExtractionParams {
    /// Single and fixed-count plane search: 5-point samples, no minimum
    pub fn plane_search() -> Self {
        Self {
            min_points_per_plane: 1,
            sample_size: 5,
            ..Self::default()
        }
    }

    /// Region loop with 500-point minimum and 10-point samples
    pub fn threshold() -> Self {
        Self::default()
    }

    /// Region loop followed by hulls and facet normals
    pub fn hull_with_normals() -> Self {
        Self {
            compute_hull: true,
            compute_normals: true,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Whether hulls are built, either requested directly or needed for normals
    pub fn wants_hull(&self) -> bool {
        self.compute_hull || self.compute_normals
    }

    pub fn ransac(&self) -> RansacParams {
        RansacParams {
            distance_threshold: self.distance_threshold,
            sample_size: self.sample_size,
            max_iterations: self.max_iterations,
            refine: self.refine,
            parallel: self.parallel,
        }
    }

    pub fn region_params(&self) -> RegionParams {
        RegionParams {
            min_points_per_plane: self.min_points_per_plane,
            ransac: self.ransac(),
            max_planes: self.max_planes,
        }
    }

    /// Random source for one run: seeded when `seed` is set
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_planes == Some(0) {
            return Err(ExtractionError::invalid("max_planes", "must be >= 1"));
        }
        self.region_params().validate()
    }
}

/// Complete run configuration loaded from JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Parameters of the generic entry point
    #[serde(default)]
    pub params: ExtractionParams,
    /// Planes searched by the fixed-count operation
    #[serde(default = "default_fixed_count")]
    pub fixed_count: usize,
    /// Length of the displayed facet normal segments
    #[serde(default = "default_normal_length")]
    pub normal_length: f64,
    /// Store every point of an opened file
    #[serde(default = "default_true")]
    pub persist_points: bool,
    /// JSON store location; in-memory storage when absent
    #[serde(default)]
    pub store_path: Option<PathBuf>,
    /// Directory for HTML scenes; no rendering when absent
    #[serde(default)]
    pub html_dir: Option<PathBuf>,
}

fn default_fixed_count() -> usize {
    4
}

fn default_normal_length() -> f64 {
    0.1
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            params: ExtractionParams::default(),
            fixed_count: default_fixed_count(),
            normal_length: default_normal_length(),
            persist_points: true,
            store_path: None,
            html_dir: None,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ExtractionError::Config(format!("Failed to read config file: {}", e)))?;

        let config: PipelineConfig = serde_json::from_str(&contents)
            .map_err(|e| ExtractionError::Config(format!("Failed to parse JSON: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ExtractionError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, json)
            .map_err(|e| ExtractionError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.fixed_count == 0 {
            return Err(ExtractionError::invalid("fixed_count", "must be >= 1"));
        }
        if !self.normal_length.is_finite() || self.normal_length <= 0.0 {
            return Err(ExtractionError::invalid(
                "normal_length",
                format!("must be finite and > 0, got {}", self.normal_length),
            ));
        }
        self.params.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_defaults_from_empty_json() {
        let config: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.params.min_points_per_plane, 500);
        assert_eq!(config.params.sample_size, 10);
        assert_eq!(config.params.max_iterations, 100_000);
        assert_eq!(config.fixed_count, 4);
        assert!(config.params.refine);
    }

    #[test]
    fn test_partial_params() {
        let json = r#"{ "params": { "distance_threshold": 0.02, "compute_normals": true, "seed": 7 } }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.params.distance_threshold, 0.02);
        assert_eq!(config.params.sample_size, 10);
        assert!(config.params.wants_hull());
        assert_eq!(config.params.seed, Some(7));
    }

    #[test]
    fn test_presets() {
        let search = ExtractionParams::plane_search();
        assert_eq!(search.sample_size, 5);
        assert_eq!(search.distance_threshold, 0.05);
        assert!(!search.wants_hull());

        let hull = ExtractionParams::hull_with_normals();
        assert_eq!(hull.min_points_per_plane, 500);
        assert!(hull.compute_hull && hull.compute_normals);
    }

    #[test]
    fn test_validation() {
        let mut params = ExtractionParams::default();
        assert!(params.validate().is_ok());

        params.sample_size = 2;
        assert!(params.validate().is_err());

        params.sample_size = 3;
        params.min_points_per_plane = 0;
        assert!(params.validate().is_err());

        params.min_points_per_plane = 1;
        params.max_planes = Some(0);
        assert!(params.validate().is_err());

        let config = PipelineConfig {
            normal_length: -1.0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let params = ExtractionParams::default().with_seed(42);
        let a: u64 = params.rng().random();
        let b: u64 = params.rng().random();
        assert_eq!(a, b);
    }

    #[test]
    fn test_bad_json_is_config_error() {
        let err = serde_json::from_str::<PipelineConfig>("{ \"fixed_count\": \"four\" }");
        assert!(err.is_err());

        let missing = PipelineConfig::from_json_file("/nonexistent/config.json").unwrap_err();
        assert!(matches!(missing, ExtractionError::Config(_)));
    }
}
