//! Structure of Arrays (`SoA`) sample batches.
//!
//! A [`SampleBatch`] carries the (intensity, weight, coordinates) columns a
//! backend produces for one chunk of measurements. Columnar storage keeps
//! the accumulation hot loop cache-friendly.

use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A batch of weighted samples in `SoA` layout: parallel intensity and
/// weight columns plus one coordinate column per target-space dimension.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SampleBatch {
    /// Measured intensity per sample.
    pub intensity: Vec<f64>,
    /// Accumulation weight per sample (1.0 for plain averaging).
    pub weight: Vec<f64>,
    /// One column per axis, each the batch length.
    pub coordinates: Vec<Vec<f64>>,
}

impl SampleBatch {
    /// Creates an empty batch with the given dimensionality.
    #[must_use]
    pub fn new(rank: usize) -> Self {
        Self::with_capacity(rank, 0)
    }

    /// Creates an empty batch with reserved capacity per column.
    #[must_use]
    pub fn with_capacity(rank: usize, capacity: usize) -> Self {
        Self {
            intensity: Vec::with_capacity(capacity),
            weight: Vec::with_capacity(capacity),
            coordinates: (0..rank).map(|_| Vec::with_capacity(capacity)).collect(),
        }
    }

    /// Builds a batch from pre-assembled columns.
    ///
    /// # Errors
    /// Returns `DimensionMismatch` when column lengths disagree.
    pub fn from_columns(
        intensity: Vec<f64>,
        weight: Vec<f64>,
        coordinates: Vec<Vec<f64>>,
    ) -> Result<Self> {
        let batch = Self {
            intensity,
            weight,
            coordinates,
        };
        batch.validate()?;
        Ok(batch)
    }

    /// Number of target-space dimensions.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.coordinates.len()
    }

    /// Number of samples in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.intensity.len()
    }

    /// Returns true if the batch holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intensity.is_empty()
    }

    /// Pushes a single sample. `coordinates` must have one entry per axis.
    pub fn push(&mut self, intensity: f64, weight: f64, coordinates: &[f64]) {
        debug_assert_eq!(coordinates.len(), self.rank());
        self.intensity.push(intensity);
        self.weight.push(weight);
        for (column, &value) in self.coordinates.iter_mut().zip(coordinates) {
            column.push(value);
        }
    }

    /// Appends all samples from another batch of the same rank.
    pub fn append(&mut self, other: &SampleBatch) {
        debug_assert_eq!(other.rank(), self.rank());
        self.intensity.extend_from_slice(&other.intensity);
        self.weight.extend_from_slice(&other.weight);
        for (column, incoming) in self.coordinates.iter_mut().zip(&other.coordinates) {
            column.extend_from_slice(incoming);
        }
    }

    /// Checks that every column has the batch length.
    ///
    /// # Errors
    /// Returns `DimensionMismatch` on inconsistent column lengths.
    pub fn validate(&self) -> Result<()> {
        let n = self.intensity.len();
        if self.weight.len() != n {
            return Err(Error::DimensionMismatch(format!(
                "weight column has {} entries for {} samples",
                self.weight.len(),
                n
            )));
        }
        for (dim, column) in self.coordinates.iter().enumerate() {
            if column.len() != n {
                return Err(Error::DimensionMismatch(format!(
                    "coordinate column {dim} has {} entries for {n} samples",
                    column.len()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_batch_operations() {
        let mut batch = SampleBatch::with_capacity(2, 10);
        assert!(batch.is_empty());

        batch.push(3.0, 1.0, &[0.5, 1.5]);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.rank(), 2);
        assert!(batch.validate().is_ok());

        let mut other = SampleBatch::new(2);
        other.push(4.0, 2.0, &[0.6, 1.6]);
        batch.append(&other);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.coordinates[1], vec![1.5, 1.6]);
    }

    #[test]
    fn test_from_columns_validates_lengths() {
        let result = SampleBatch::from_columns(
            vec![1.0, 2.0],
            vec![1.0],
            vec![vec![0.0, 1.0]],
        );
        assert!(matches!(result, Err(Error::DimensionMismatch(_))));
    }
}
