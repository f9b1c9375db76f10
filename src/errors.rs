//! Centralized error handling for em_sitd
//!
//! Configuration problems (bad boundaries, empty grids, mismatched arrays) and
//! data problems (out-of-range thickness, out-of-order months) are separate
//! variants so callers can tell a broken setup from a broken input batch.

use thiserror::Error;

/// Main error type for em_sitd operations
#[derive(Debug, Error)]
pub enum EmSitdError {
    /// NetCDF file operation errors
    #[error("NetCDF error: {0}")]
    NetCDFError(#[from] netcdf::Error),

    /// I/O operation errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Array shape or dimension error
    #[error("Array error: {0}")]
    ArrayError(#[from] ndarray::ShapeError),

    /// Malformed JSON configuration
    #[error("Configuration file error: {0}")]
    ConfigFileError(#[from] serde_json::Error),

    /// Invalid run configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Variable not found in a NetCDF file
    #[error("Variable '{var}' not found in file")]
    VariableNotFound { var: String },

    /// Paired arrays or sequences disagree in length or shape
    #[error("Dimension mismatch: {what} ({left} vs {right})")]
    DimensionMismatch {
        what: String,
        left: String,
        right: String,
    },

    /// Grid has no cells
    #[error("Grid is empty")]
    EmptyGrid,

    /// Category boundaries are empty, non-finite or not strictly increasing
    #[error("Invalid category boundaries: {0}")]
    InvalidBoundaries(String),

    /// Thickness above every category boundary
    #[error("Thickness {value} m exceeds the largest category boundary {max} m")]
    OutOfRange { value: f64, max: f64 },

    /// Observation month earlier than the month being accumulated
    #[error("Observation for {got} arrived after month {current} was opened")]
    OutOfOrder { current: String, got: String },

    /// Observation position that is NaN or infinite
    #[error("Observation {index} has a non-finite position ({lon}, {lat})")]
    InvalidCoordinate { index: usize, lon: f64, lat: f64 },

    /// Unparseable observation record
    #[error("Parse error in {source_name} line {line}: {message}")]
    ParseError {
        source_name: String,
        line: usize,
        message: String,
    },

    /// Thread pool configuration error
    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),
}

/// Result type alias for em_sitd operations
pub type Result<T> = std::result::Result<T, EmSitdError>;

impl EmSitdError {
    /// True for errors caused by the run setup rather than the input data
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ConfigError(_)
                | Self::ConfigFileError(_)
                | Self::DimensionMismatch { .. }
                | Self::EmptyGrid
                | Self::InvalidBoundaries(_)
                | Self::ThreadPoolError(_)
        )
    }
}
