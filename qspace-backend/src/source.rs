//! The backend contract: job enumeration, frame production and coordinate
//! projection.

use crate::error::{Error, Result};
use crate::selection::ScanSelection;

/// Opaque descriptor for one unit of work, typically one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Job {
    /// Scan number.
    pub scan: u32,
}

/// One frame's worth of samples: parallel intensity and weight columns
/// plus the raw instrument-frame coordinate columns (angles, wavelength)
/// the projection consumes.
#[derive(Debug, Clone, Default)]
pub struct FrameBatch {
    /// Measured counts per sample.
    pub intensity: Vec<f64>,
    /// Accumulation weight per sample; all ones selects plain averaging.
    pub weight: Vec<f64>,
    /// Raw coordinate columns, each the batch length.
    pub raw: Vec<Vec<f64>>,
}

impl FrameBatch {
    /// Number of samples in the frame.
    #[must_use]
    pub fn len(&self) -> usize {
        self.intensity.len()
    }

    /// Returns true if the frame holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intensity.is_empty()
    }

    /// Checks that every column has the batch length.
    ///
    /// # Errors
    /// Returns `Config` on inconsistent column lengths.
    pub fn validate(&self) -> Result<()> {
        let n = self.len();
        if self.weight.len() != n || self.raw.iter().any(|column| column.len() != n) {
            return Err(Error::Config(format!(
                "frame batch columns disagree on sample count {n}"
            )));
        }
        Ok(())
    }
}

/// Capability to enumerate jobs and produce their frames.
pub trait FrameSource: Send + Sync {
    /// Expands a scan selection into an ordered job sequence.
    ///
    /// # Errors
    /// Returns an error when the selection cannot be mapped to jobs.
    fn jobs(&self, selection: &ScanSelection) -> Result<Vec<Job>>;

    /// Produces all frame batches for one job.
    ///
    /// # Errors
    /// Returns `Processing` when the measurement data for the job cannot
    /// be produced; the driver records the failure and skips the job.
    fn frames(&self, job: &Job) -> Result<Vec<FrameBatch>>;
}

/// Capability to map raw instrument-frame coordinates to labeled
/// target-space coordinates. Must be pure and deterministic.
pub trait CoordinateProjection: Send + Sync {
    /// Target axis labels, one per output coordinate column.
    fn labels(&self) -> &[String];

    /// Projects a frame's raw columns into one coordinate column per
    /// label, each the frame's length.
    ///
    /// # Errors
    /// Returns an error when the raw columns do not match what the
    /// projection expects.
    fn project(&self, frame: &FrameBatch) -> Result<Vec<Vec<f64>>>;
}
