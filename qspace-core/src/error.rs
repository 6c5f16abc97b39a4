//! Error types for qspace-core.

use thiserror::Error;

/// Result type alias for qspace operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for qspace operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid axis range or resolution at construction.
    #[error("invalid range for axis '{label}': min {min}, max {max}, resolution {resolution}")]
    InvalidRange {
        label: String,
        min: f64,
        max: f64,
        resolution: f64,
    },

    /// Axes cannot be combined (different label or resolution).
    #[error(
        "incompatible axes: '{left_label}' (resolution {left_resolution}) \
         vs '{right_label}' (resolution {right_resolution})"
    )]
    IncompatibleAxis {
        left_label: String,
        left_resolution: f64,
        right_label: String,
        right_resolution: f64,
    },

    /// Axis collections cover different label sets.
    #[error("axis label sets differ: [{left}] vs [{right}]")]
    AxisMismatch { left: String, right: String },

    /// A restriction key lies outside the axis bounds.
    #[error("value {value} outside axis '{label}' bounds [{min}, {max}]")]
    OutOfRange {
        label: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Axis label not present in the collection.
    #[error("unknown axis label: '{0}'")]
    UnknownAxis(String),

    /// Inconsistent array lengths or ranks.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),
}
