//! qspace-core: Axis algebra and weighted multidimensional histograms.
//!
//! This crate provides the binning and merge engine: discretized axes with
//! a shared grid origin, ordered axis collections with union/restriction
//! algebra, and the dense weighted-average histogram (`Space`) they index.
//!

pub mod accumulator;
pub mod axes;
pub mod axis;
pub mod error;
pub mod sample;
pub mod space;

pub use accumulator::Accumulator;
pub use axes::{Axes, AxisSelector, ResolvedKey, SpaceKey};
pub use axis::Axis;
pub use error::{Error, Result};
pub use sample::SampleBatch;
pub use space::{MaskedValues, Space};
