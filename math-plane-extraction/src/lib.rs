//! Planar Region Extraction from Point Clouds
//!
//! Fits planes to an unorganized point cloud by random sample consensus,
//! removing each accepted plane's inliers before searching the next one. Each
//! accepted region can be wrapped in a convex hull whose facets carry outward
//! normals and centroids.
//!
//! # Example
//! ```
//! use math_plane_extraction::{CancelToken, ExtractionParams, extract, testdata};
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//!
//! let mut rng = StdRng::seed_from_u64(7);
//! let points = testdata::floor_and_wall(300, 0.01, &mut rng).unwrap();
//!
//! let params = ExtractionParams {
//!     min_points_per_plane: 200,
//!     sample_size: 3,
//!     max_iterations: 500,
//!     compute_normals: true,
//!     ..ExtractionParams::default()
//! }
//! .with_seed(1);
//!
//! let output = extract(&points, &params, &CancelToken::new()).unwrap();
//! assert_eq!(output.regions.len(), 2);
//! assert!(output.regions.iter().all(|r| r.hull.is_some()));
//! ```

pub mod action;
pub mod cancel;
pub mod config;
pub mod error;
pub mod loader;
pub mod persistence;
pub mod pipeline;
pub mod ransac;
pub mod regions;
pub mod scene;
pub mod session;
pub mod task;
pub mod testdata;
pub mod types;
pub mod visualization;

pub use action::Action;
pub use cancel::CancelToken;
pub use config::{ExtractionParams, PipelineConfig};
pub use error::{Diagnostic, ExtractionError, Result, Stage};
pub use loader::{FileLoader, LoadError, PointLoader};
pub use persistence::{
    FileId, JsonStore, MemoryStore, PersistedNormal, PersistedPolygon, PersistenceError,
    PersistenceGateway, PolygonId, persist_points, persist_regions,
};
pub use pipeline::{ExtractionOutput, Operation, RegionResult, extract, run_operation};
pub use ransac::{PlaneFit, RansacParams, fit_plane, segment_plane};
pub use regions::{RegionExtraction, RegionParams, extract_fixed_count, extract_regions};
pub use scene::scene_for;
pub use session::{Session, SharedGateway, SharedSink};
pub use task::{TaskHandle, TaskStatus};
pub use types::{PlaneModel, PlaneRegion, Point, Rgb};
pub use visualization::{Geometry, HtmlSink, NullSink, VisualizationSink};
