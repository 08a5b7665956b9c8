//! Error types for plane extraction.
//!
//! Failures that end an operation are [`ExtractionError`]s. Failures that only
//! cost one region its hull, one facet its normal, or that stop the region loop
//! early are recorded as [`Diagnostic`]s on the result instead.

use crate::loader::LoadError;
use crate::persistence::PersistenceError;
use math_convex_hull::ConvexHullError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Pipeline stage a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    Segmentation,
    Hull,
    Normals,
    Persistence,
    Visualization,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Segmentation => "segmentation",
            Stage::Hull => "hull",
            Stage::Normals => "normals",
            Stage::Persistence => "persistence",
            Stage::Visualization => "visualization",
        };
        f.write_str(name)
    }
}

/// A discarded region, skipped facet or early stop, reported with the result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub stage: Stage,
    /// Region index the entry refers to, if any
    pub region: Option<usize>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(stage: Stage, region: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            stage,
            region,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.region {
            Some(r) => write!(f, "[{} region {}] {}", self.stage, r, self.message),
            None => write!(f, "[{}] {}", self.stage, self.message),
        }
    }
}

/// Errors that can occur while extracting planar regions.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The session has no active point set.
    #[error("no file selected")]
    NoFileSelected,

    /// Fewer points than the operation needs.
    #[error("insufficient points: {available} available, {required} required")]
    InsufficientPoints {
        /// Points in the set
        available: usize,
        /// Points needed
        required: usize,
    },

    /// Every RANSAC trial drew a coincident or collinear sample.
    #[error("all {trials} RANSAC samples were degenerate")]
    DegenerateSample {
        /// Trials attempted
        trials: usize,
    },

    /// The hull of a region could not be built.
    #[error("hull of region {region} could not be built: {source}")]
    DegenerateGeometry {
        /// Region index
        region: usize,
        /// Hull builder failure
        #[source]
        source: ConvexHullError,
    },

    /// A hull facet has zero area.
    #[error("facet {face} of region {region} has zero area")]
    DegenerateFacet {
        /// Region index
        region: usize,
        /// Face index in the region hull
        face: usize,
    },

    /// A storage write failed.
    #[error("persistence failed{}: {source}", region_suffix(.region))]
    PersistenceFailure {
        /// Region being written, if the failure belongs to one
        region: Option<usize>,
        /// Gateway failure
        #[source]
        source: PersistenceError,
    },

    /// The operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// A parameter is out of range.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// The requested action name is not known.
    #[error("unknown action: {name}")]
    UnknownAction {
        /// The name as received
        name: String,
    },

    /// A configuration file could not be read or written.
    #[error("configuration error: {0}")]
    Config(String),

    /// Reading the point set failed.
    #[error("load failed: {0}")]
    Load(#[from] LoadError),

    /// The visualization sink failed.
    #[error("visualization failed: {0}")]
    Visualization(String),

    /// A background task panicked.
    #[error("task panicked: {0}")]
    TaskPanicked(String),
}

fn region_suffix(region: &Option<usize>) -> String {
    region.map(|r| format!(" for region {r}")).unwrap_or_default()
}

/// A specialized `Result` type for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractionError>;

impl ExtractionError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ExtractionError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// Returns `true` if the input geometry is at fault.
    ///
    /// This includes `DegenerateSample`, `DegenerateGeometry` and
    /// `DegenerateFacet`.
    pub fn is_degenerate(&self) -> bool {
        matches!(
            self,
            ExtractionError::DegenerateSample { .. }
                | ExtractionError::DegenerateGeometry { .. }
                | ExtractionError::DegenerateFacet { .. }
        )
    }

    /// Returns `true` if the run can go on without the affected region.
    ///
    /// Degeneracies and too-small point sets are recoverable; storage,
    /// loading, cancellation and usage errors are not.
    pub fn is_recoverable(&self) -> bool {
        self.is_degenerate() || matches!(self, ExtractionError::InsufficientPoints { .. })
    }

    /// Returns `true` if this is a caller-side usage error.
    ///
    /// This includes `NoFileSelected`, `InvalidParameter`, `UnknownAction`
    /// and `Config`.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            ExtractionError::NoFileSelected
                | ExtractionError::InvalidParameter { .. }
                | ExtractionError::UnknownAction { .. }
                | ExtractionError::Config(_)
        )
    }

    /// Stage the error belongs to, if it belongs to one
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ExtractionError::InsufficientPoints { .. } | ExtractionError::DegenerateSample { .. } => {
                Some(Stage::Segmentation)
            }
            ExtractionError::DegenerateGeometry { .. } => Some(Stage::Hull),
            ExtractionError::DegenerateFacet { .. } => Some(Stage::Normals),
            ExtractionError::PersistenceFailure { .. } => Some(Stage::Persistence),
            ExtractionError::Load(_) | ExtractionError::NoFileSelected => Some(Stage::Load),
            ExtractionError::Visualization(_) => Some(Stage::Visualization),
            _ => None,
        }
    }

    /// Region index the error is tagged with
    pub fn region(&self) -> Option<usize> {
        match self {
            ExtractionError::DegenerateGeometry { region, .. }
            | ExtractionError::DegenerateFacet { region, .. } => Some(*region),
            ExtractionError::PersistenceFailure { region, .. } => *region,
            _ => None,
        }
    }

    /// The error as a diagnostic entry, for failures that are recorded
    /// rather than returned
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::new(
            self.stage().unwrap_or(Stage::Segmentation),
            self.region(),
            self.to_string(),
        )
    }
}
