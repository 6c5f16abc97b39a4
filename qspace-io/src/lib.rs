//! qspace-io: HDF5 persistence for qspace histograms.
//!
//! This crate provides the persisted container: atomic full writes, axis
//! metadata reads, and windowed reads that load only the addressed
//! sub-block of a potentially multi-gigabyte result.
//!

pub mod container;
mod error;

pub use container::{read_axes, read_space, write_space, WriteOptions};
pub use error::{Error, Result};
