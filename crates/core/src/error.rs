//! Error types for LandCART

use thiserror::Error;

/// Main error type for LandCART operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Invalid valid-value range: [{lo}, {hi}] (lower bound must be below upper bound)")]
    InvalidRange { lo: f64, hi: f64 },

    #[error("Sample key '{key}' has no matching label")]
    JoinKeyMismatch { key: String },

    #[error("No training samples left after filtering")]
    EmptyTrainingSet,

    #[error("Band '{band}' is required but not present")]
    BandMismatch { band: String },

    #[error("Duplicate band name: {0}")]
    DuplicateBand(String),

    #[error("Missing value in band '{band}'")]
    MissingValue { band: String },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for LandCART operations
pub type Result<T> = std::result::Result<T, Error>;
