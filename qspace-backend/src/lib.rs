//! qspace-backend: the producer side of the binning engine.
//!
//! Backends supply raw measurements; the core never reads instrument data
//! itself. A backend is two capabilities: a [`FrameSource`] that enumerates
//! jobs and yields per-frame (intensity, weight, raw-coordinate) batches,
//! and a [`CoordinateProjection`] that maps raw instrument-frame values to
//! labeled target-space coordinates. This crate defines that contract, the
//! scan-selector and destination-template handling, the project
//! configuration, and a simulated backend usable as a template.
//!

pub mod config;
mod error;
pub mod selection;
pub mod simulation;
pub mod source;

pub use config::{DispatchSection, InputConfig, ProjectConfig, ProjectionConfig};
pub use error::{Error, Result};
pub use selection::{destination_path, ScanSelection};
pub use simulation::{QProjection, SimulationConfig, SimulationSource};
pub use source::{CoordinateProjection, FrameBatch, FrameSource, Job};
