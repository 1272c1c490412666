//! Centralized error handling for the EarthNet toolkit
//!
//! Every fallible operation in the crate returns [`Result`], so callers get one
//! error type regardless of whether a failure came from the network, the
//! NetCDF library or the array arithmetic.

use thiserror::Error;

/// Main error type for EarthNet operations
#[derive(Debug, Error)]
pub enum EarthNetError {
    /// NetCDF file operation errors
    #[error("NetCDF error: {0}")]
    NetCDFError(#[from] netcdf::Error),

    /// I/O operation errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Array shape or dimension error
    #[error("Array error: {0}")]
    ArrayError(#[from] ndarray::ShapeError),

    /// Reading a legacy `.npz` bundle failed
    #[error("NPZ read error: {0}")]
    NpzReadError(#[from] ndarray_npy::ReadNpzError),

    /// Writing a legacy `.npz` bundle failed
    #[error("NPZ write error: {0}")]
    NpzWriteError(#[from] ndarray_npy::WriteNpzError),

    /// HTTP transfer errors from the archive downloader
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Remote object store errors
    #[error("Object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),

    /// Configuration or report (de)serialization errors
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Split name outside the fixed enumeration
    #[error("Invalid split '{split}', expected one of: {expected}")]
    InvalidSplit { split: String, expected: String },

    /// Dataset name not present in the configuration
    #[error("Unknown dataset '{dataset}'")]
    UnknownDataset { dataset: String },

    /// Variable not found in a minicube
    #[error("Variable '{var}' not found in minicube")]
    VariableNotFound { var: String },

    /// Dimension not found in variable
    #[error("Dimension '{dim}' not found in variable '{var}'")]
    DimensionNotFound { var: String, dim: String },

    /// No remote object matched a minicube id
    #[error("Minicube '{id}' not found under '{prefix}'")]
    MinicubeNotFound { id: String, prefix: String },

    /// Legacy bundle lacks the arrays a variable needs
    #[error("{0}")]
    MissingData(String),

    /// Array layout could not be interpreted or aligned
    #[error("Shape error: {message}")]
    Shape { message: String },

    /// Plot variable outside the fixed enumeration
    #[error("Invalid variable '{variable}', expected one of: rgb, ndvi, rr, pp, tg, tn, tx")]
    InvalidVariable { variable: String },

    /// Generic error for ad-hoc messages
    #[error("{0}")]
    Generic(String),
}

impl EarthNetError {
    /// Shorthand for a [`EarthNetError::Shape`] error
    pub fn shape(message: impl Into<String>) -> Self {
        EarthNetError::Shape {
            message: message.into(),
        }
    }
}

impl From<String> for EarthNetError {
    fn from(error: String) -> Self {
        EarthNetError::Generic(error)
    }
}

impl From<&str> for EarthNetError {
    fn from(error: &str) -> Self {
        EarthNetError::Generic(error.to_string())
    }
}

/// Result type alias for EarthNet operations
pub type Result<T> = std::result::Result<T, EarthNetError>;
