//! Error types for spatial audio processing

use bn_core::CoreError;
use thiserror::Error;

/// Spatial audio error types
#[derive(Error, Debug)]
pub enum SpatialError {
    /// Malformed catalog construction input
    #[error("Catalog configuration error: {0}")]
    Config(String),

    /// Lookup on a catalog with no entries
    #[error("Catalog has no entries")]
    EmptyCatalog,

    /// Reverberator or transition parameter out of range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Position set before a catalog is attached
    #[error("No catalog attached")]
    NotReady,

    /// A filter transition is still in flight
    #[error("Transition in progress until {until:.4}s")]
    Busy { until: f64 },

    /// Non-finite coordinate or non-positive distance
    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    /// Import data with inconsistent shape
    #[error("Malformed catalog: {0}")]
    MalformedCatalog(String),

    /// JSON decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Host graph rejected an operation
    #[error("Host error: {0}")]
    Host(#[from] CoreError),
}

impl SpatialError {
    /// Transient condition a control loop may retry
    pub fn is_transient(&self) -> bool {
        matches!(self, SpatialError::NotReady | SpatialError::Busy { .. })
    }
}

/// Result type for spatial operations
pub type SpatialResult<T> = Result<T, SpatialError>;
