//! A single discretized histogram dimension.
//!
//! An [`Axis`] maps continuous coordinate values to integer bin indices on a
//! regular grid. The grid is anchored at a global origin: bounds are stored
//! as integer multiples of the resolution, so two axes with the same label
//! and resolution can never carry a fractional offset against each other.
//! That property is what makes the union of independently bounded partial
//! histograms well-defined.

use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Relative tolerance for treating two resolutions as equal.
const RESOLUTION_TOLERANCE: f64 = 1e-6;

/// Snap tolerance when deriving grid offsets from continuous bounds.
const GRID_SNAP: f64 = 1e-6;

/// One discretized dimension: an immutable value-to-index mapping over a
/// regular grid of bins of width `resolution`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Axis {
    label: String,
    /// Grid offset of the first bin (units of `resolution`).
    grid_min: i64,
    /// Grid offset of the last bin (inclusive).
    grid_max: i64,
    resolution: f64,
}

impl Axis {
    /// Creates an axis covering `[min, max]` at the given bin width.
    ///
    /// The bounds are snapped outward onto the global grid, so the returned
    /// axis may be marginally wider than requested but never narrower.
    ///
    /// # Errors
    /// Returns `InvalidRange` if `max < min`, the resolution is not a
    /// positive finite number, or either bound is not finite.
    pub fn from_value_range(label: &str, min: f64, max: f64, resolution: f64) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() || !resolution.is_finite() {
            return Err(Error::InvalidRange {
                label: label.to_string(),
                min,
                max,
                resolution,
            });
        }
        if max < min || resolution <= 0.0 {
            return Err(Error::InvalidRange {
                label: label.to_string(),
                min,
                max,
                resolution,
            });
        }

        Ok(Self {
            label: label.to_string(),
            grid_min: grid_floor(min, resolution),
            grid_max: grid_ceil(max, resolution),
            resolution,
        })
    }

    /// Returns the axis label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the bin width.
    #[must_use]
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Returns the lower bound (center of the first bin).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn min(&self) -> f64 {
        self.grid_min as f64 * self.resolution
    }

    /// Returns the upper bound (center of the last bin).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn max(&self) -> f64 {
        self.grid_max as f64 * self.resolution
    }

    /// Returns the number of bins.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn len(&self) -> usize {
        (self.grid_max - self.grid_min + 1) as usize
    }

    /// An axis always holds at least one bin.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Maps a value to its bin index, or `None` when the value is not
    /// finite or lies outside the bounds. Accumulation uses this to drop
    /// out-of-range samples silently.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn bin_of(&self, value: f64) -> Option<usize> {
        if !value.is_finite() {
            return None;
        }
        let scaled = value / self.resolution;
        // Guard against i64 overflow before converting.
        if scaled.abs() > 9.0e18 {
            return None;
        }
        let grid = scaled.round() as i64;
        if grid < self.grid_min || grid > self.grid_max {
            return None;
        }
        Some((grid - self.grid_min) as usize)
    }

    /// Maps a value to its bin index, rejecting out-of-range values.
    /// Restriction keys use this so a bad read query surfaces as an error
    /// instead of being clamped.
    ///
    /// # Errors
    /// Returns `OutOfRange` when the value falls outside `[min, max]`.
    pub fn index_of(&self, value: f64) -> Result<usize> {
        self.bin_of(value).ok_or_else(|| Error::OutOfRange {
            label: self.label.clone(),
            value,
            min: self.min(),
            max: self.max(),
        })
    }

    /// Returns the center value of a bin; exact inverse of `bin_of` for
    /// bin centers.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
    pub fn value_of(&self, index: usize) -> f64 {
        (self.grid_min + index as i64) as f64 * self.resolution
    }

    /// Returns the center value of every bin, in index order.
    #[must_use]
    pub fn bin_centers(&self) -> Vec<f64> {
        (0..self.len()).map(|i| self.value_of(i)).collect()
    }

    /// Returns the `len() + 1` bin boundary values, for plotting.
    #[must_use]
    pub fn bin_edges(&self) -> Vec<f64> {
        let half = self.resolution / 2.0;
        let mut edges: Vec<f64> = (0..self.len()).map(|i| self.value_of(i) - half).collect();
        edges.push(self.max() + half);
        edges
    }

    /// Returns true when `other` shares this axis's label and resolution.
    #[must_use]
    pub fn is_compatible(&self, other: &Self) -> bool {
        self.label == other.label
            && (self.resolution - other.resolution).abs()
                <= RESOLUTION_TOLERANCE * self.resolution
    }

    /// Combines two axes into one spanning both ranges.
    ///
    /// # Errors
    /// Returns `IncompatibleAxis` unless labels match and resolutions agree
    /// within tolerance. Grid alignment holds by construction.
    pub fn union(&self, other: &Self) -> Result<Self> {
        if !self.is_compatible(other) {
            return Err(Error::IncompatibleAxis {
                left_label: self.label.clone(),
                left_resolution: self.resolution,
                right_label: other.label.clone(),
                right_resolution: other.resolution,
            });
        }
        Ok(Self {
            label: self.label.clone(),
            grid_min: self.grid_min.min(other.grid_min),
            grid_max: self.grid_max.max(other.grid_max),
            resolution: self.resolution,
        })
    }

    /// Returns true when this axis's range fully covers `other`'s.
    #[must_use]
    pub fn covers(&self, other: &Self) -> bool {
        self.grid_min <= other.grid_min && self.grid_max >= other.grid_max
    }

    /// Returns the sub-axis over a contiguous index range. Never widens.
    ///
    /// The range must be non-empty and lie within `0..len()`; resolved keys
    /// from [`crate::Axes::resolve`] always satisfy this.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn restrict(&self, start: usize, end: usize) -> Self {
        debug_assert!(start < end && end <= self.len());
        Self {
            label: self.label.clone(),
            grid_min: self.grid_min + start as i64,
            grid_max: self.grid_min + (end - 1) as i64,
            resolution: self.resolution,
        }
    }

    /// Index offset of this axis's first bin within a covering parent axis.
    /// The parent must be compatible and cover this axis.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn offset_within(&self, parent: &Self) -> usize {
        debug_assert!(parent.is_compatible(self) && parent.covers(self));
        (self.grid_min - parent.grid_min) as usize
    }
}

#[allow(clippy::cast_possible_truncation)]
fn grid_floor(value: f64, resolution: f64) -> i64 {
    let scaled = value / resolution;
    let nearest = scaled.round();
    if (scaled - nearest).abs() < GRID_SNAP {
        nearest as i64
    } else {
        scaled.floor() as i64
    }
}

#[allow(clippy::cast_possible_truncation)]
fn grid_ceil(value: f64, resolution: f64) -> i64 {
    let scaled = value / resolution;
    let nearest = scaled.round();
    if (scaled - nearest).abs() < GRID_SNAP {
        nearest as i64
    } else {
        scaled.ceil() as i64
    }
}
