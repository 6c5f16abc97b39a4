//! Open-bounds accumulation.
//!
//! Histogram bounds are usually unknown until the first batch of samples
//! arrives. The [`Accumulator`] is the open phase of the axis lifecycle: it
//! carries only labels and resolutions, creates the [`Space`] from the first
//! batch's coordinate extrema, and widens it per batch before binning with
//! fixed bounds. Finalizing yields the bounded `Space` (or nothing when no
//! sample ever landed).

use crate::axes::Axes;
use crate::axis::Axis;
use crate::error::{Error, Result};
use crate::sample::SampleBatch;
use crate::space::Space;

/// Per-worker accumulation state with auto-expanding bounds.
#[derive(Debug)]
pub struct Accumulator {
    labels: Vec<String>,
    resolutions: Vec<f64>,
    space: Option<Space>,
    binned: usize,
    dropped: usize,
}

impl Accumulator {
    /// Creates an open accumulator for the given axis labels and bin
    /// widths, one resolution per label.
    ///
    /// # Errors
    /// Returns `DimensionMismatch` when the lists disagree in length or are
    /// empty, and `InvalidRange` for a non-positive resolution.
    pub fn new(labels: &[String], resolutions: &[f64]) -> Result<Self> {
        if labels.is_empty() || labels.len() != resolutions.len() {
            return Err(Error::DimensionMismatch(format!(
                "{} labels for {} resolutions",
                labels.len(),
                resolutions.len()
            )));
        }
        for (label, &resolution) in labels.iter().zip(resolutions) {
            if !resolution.is_finite() || resolution <= 0.0 {
                return Err(Error::InvalidRange {
                    label: label.clone(),
                    min: 0.0,
                    max: 0.0,
                    resolution,
                });
            }
        }
        Ok(Self {
            labels: labels.to_vec(),
            resolutions: resolutions.to_vec(),
            space: None,
            binned: 0,
            dropped: 0,
        })
    }

    /// Number of target-space dimensions.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.labels.len()
    }

    /// Samples binned so far.
    #[must_use]
    pub fn samples_binned(&self) -> usize {
        self.binned
    }

    /// Samples dropped so far (non-finite values).
    #[must_use]
    pub fn samples_dropped(&self) -> usize {
        self.dropped
    }

    /// Bins a batch, first widening the bounds to cover its finite
    /// coordinate extrema.
    ///
    /// # Errors
    /// Returns `DimensionMismatch` for a batch of the wrong rank or with
    /// inconsistent column lengths.
    pub fn accumulate(&mut self, batch: &SampleBatch) -> Result<()> {
        batch.validate()?;
        if batch.rank() != self.rank() {
            return Err(Error::DimensionMismatch(format!(
                "batch has {} coordinate columns for {} axes",
                batch.rank(),
                self.rank()
            )));
        }
        let Some(axes) = self.batch_axes(batch)? else {
            // No usable sample in the batch.
            self.dropped += batch.len();
            return Ok(());
        };

        let space = match self.space.as_mut() {
            Some(space) => {
                space.extend_to(&axes)?;
                space
            }
            None => self.space.insert(Space::new(axes)),
        };

        let dropped = space.accumulate(batch)?;
        self.dropped += dropped;
        self.binned += batch.len() - dropped;
        Ok(())
    }

    /// Finalizes into a bounded histogram; `None` when no sample landed.
    #[must_use]
    pub fn into_space(self) -> Option<Space> {
        self.space
    }

    /// Axes covering the batch's fully-finite samples, `None` when there
    /// are none.
    fn batch_axes(&self, batch: &SampleBatch) -> Result<Option<Axes>> {
        let rank = self.rank();
        let mut lo = vec![f64::INFINITY; rank];
        let mut hi = vec![f64::NEG_INFINITY; rank];
        let mut any = false;

        'samples: for i in 0..batch.len() {
            if !batch.intensity[i].is_finite() || !batch.weight[i].is_finite() {
                continue;
            }
            for column in &batch.coordinates {
                if !column[i].is_finite() {
                    continue 'samples;
                }
            }
            for (dim, column) in batch.coordinates.iter().enumerate() {
                lo[dim] = lo[dim].min(column[i]);
                hi[dim] = hi[dim].max(column[i]);
            }
            any = true;
        }

        if !any {
            return Ok(None);
        }

        let mut axes = Vec::with_capacity(rank);
        for dim in 0..rank {
            axes.push(Axis::from_value_range(
                &self.labels[dim],
                lo[dim],
                hi[dim],
                self.resolutions[dim],
            )?);
        }
        Ok(Some(Axes::new(axes)?))
    }
}
