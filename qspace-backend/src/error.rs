//! Backend error types.

use thiserror::Error;

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Backend error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or missing configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed scan selector.
    #[error("invalid scan selector: {0}")]
    InvalidSelector(String),

    /// A backend failed while producing data for one job.
    #[error("processing error for scan {scan}: {message}")]
    Processing { scan: u32, message: String },

    /// Configuration file I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid JSON.
    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// Core library error.
    #[error("core error: {0}")]
    Core(#[from] qspace_core::Error),
}
