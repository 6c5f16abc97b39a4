//! Ordered axis collections and restriction keys.
//!
//! [`Axes`] fixes the dimension order of a histogram. [`SpaceKey`] selects a
//! sub-region: one selector per dimension, where a single value slices the
//! dimension away and a value range narrows it. Keys are resolved once into
//! index ranges ([`ResolvedKey`]) that both the in-memory restriction and
//! the windowed storage reads consume.

use crate::axis::Axis;
use crate::error::{Error, Result};
use std::ops::Range;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An ordered collection of axes with unique labels. The order is the
/// dimension order of the owning histogram.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Axes {
    axes: Vec<Axis>,
}

impl Axes {
    /// Creates an axis collection.
    ///
    /// # Errors
    /// Returns `DimensionMismatch` when empty or when labels repeat.
    pub fn new(axes: Vec<Axis>) -> Result<Self> {
        if axes.is_empty() {
            return Err(Error::DimensionMismatch(
                "axis collection must hold at least one axis".to_string(),
            ));
        }
        for (i, axis) in axes.iter().enumerate() {
            if axes[..i].iter().any(|a| a.label() == axis.label()) {
                return Err(Error::DimensionMismatch(format!(
                    "duplicate axis label '{}'",
                    axis.label()
                )));
            }
        }
        Ok(Self { axes })
    }

    /// Number of dimensions.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.axes.len()
    }

    /// Bin count per dimension, in order.
    #[must_use]
    pub fn shape(&self) -> Vec<usize> {
        self.axes.iter().map(Axis::len).collect()
    }

    /// The axis at a dimension position.
    #[must_use]
    pub fn get(&self, dim: usize) -> &Axis {
        &self.axes[dim]
    }

    /// Iterates the axes in dimension order.
    pub fn iter(&self) -> std::slice::Iter<'_, Axis> {
        self.axes.iter()
    }

    /// All labels in dimension order.
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        self.axes.iter().map(Axis::label).collect()
    }

    /// Finds the dimension position of a label.
    ///
    /// # Errors
    /// Returns `UnknownAxis` when the label is absent.
    pub fn index_of_label(&self, label: &str) -> Result<usize> {
        self.axes
            .iter()
            .position(|axis| axis.label() == label)
            .ok_or_else(|| Error::UnknownAxis(label.to_string()))
    }

    /// Per-label union with `other`, preserving this collection's order.
    ///
    /// # Errors
    /// Returns `AxisMismatch` when the label sets differ, or the per-axis
    /// union error when resolutions disagree.
    pub fn union(&self, other: &Self) -> Result<Self> {
        if self.rank() != other.rank()
            || other
                .axes
                .iter()
                .any(|axis| self.index_of_label(axis.label()).is_err())
        {
            return Err(Error::AxisMismatch {
                left: self.labels().join(", "),
                right: other.labels().join(", "),
            });
        }

        let mut unioned = Vec::with_capacity(self.rank());
        for axis in &self.axes {
            let position = other.index_of_label(axis.label())?;
            unioned.push(axis.union(other.get(position))?);
        }
        Ok(Self { axes: unioned })
    }

    /// A key selecting everything, as a starting point for callers that
    /// narrow individual dimensions.
    #[must_use]
    pub fn full_key(&self) -> SpaceKey {
        SpaceKey::full(self.rank())
    }

    /// Resolves a key into index ranges, slice flags and the surviving
    /// narrowed axes.
    ///
    /// # Errors
    /// Returns `DimensionMismatch` when the key rank differs from this
    /// collection's, and `OutOfRange` when a selector value falls outside
    /// its axis bounds.
    pub fn resolve(&self, key: &SpaceKey) -> Result<ResolvedKey> {
        if key.selectors.len() != self.rank() {
            return Err(Error::DimensionMismatch(format!(
                "key has {} selectors for {} axes",
                key.selectors.len(),
                self.rank()
            )));
        }

        let mut ranges = Vec::with_capacity(self.rank());
        let mut dropped = Vec::with_capacity(self.rank());
        let mut surviving = Vec::new();

        for (axis, selector) in self.axes.iter().zip(&key.selectors) {
            match selector {
                AxisSelector::All => {
                    ranges.push(0..axis.len());
                    dropped.push(false);
                    surviving.push(axis.clone());
                }
                AxisSelector::Value(value) => {
                    let index = axis.index_of(*value)?;
                    ranges.push(index..index + 1);
                    dropped.push(true);
                }
                AxisSelector::ValueRange(lo, hi) => {
                    let start = axis.index_of(*lo)?;
                    let end = axis.index_of(*hi)?;
                    if end < start {
                        return Err(Error::OutOfRange {
                            label: axis.label().to_string(),
                            value: *hi,
                            min: *lo,
                            max: axis.max(),
                        });
                    }
                    ranges.push(start..end + 1);
                    dropped.push(false);
                    surviving.push(axis.restrict(start, end + 1));
                }
            }
        }

        if surviving.is_empty() {
            return Err(Error::DimensionMismatch(
                "key slices away every dimension".to_string(),
            ));
        }

        Ok(ResolvedKey {
            ranges,
            dropped,
            axes: Self { axes: surviving },
        })
    }
}

impl<'a> IntoIterator for &'a Axes {
    type Item = &'a Axis;
    type IntoIter = std::slice::Iter<'a, Axis>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Selector for one dimension of a restriction key.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AxisSelector {
    /// Keep the whole dimension.
    All,
    /// Select a single value and drop the dimension.
    Value(f64),
    /// Keep the dimension, narrowed to an inclusive value range.
    ValueRange(f64, f64),
}

/// A restriction key: one selector per dimension, in axes order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpaceKey {
    selectors: Vec<AxisSelector>,
}

impl SpaceKey {
    /// Creates a key from explicit per-dimension selectors.
    #[must_use]
    pub fn new(selectors: Vec<AxisSelector>) -> Self {
        Self { selectors }
    }

    /// A key keeping every dimension in full.
    #[must_use]
    pub fn full(rank: usize) -> Self {
        Self {
            selectors: vec![AxisSelector::All; rank],
        }
    }

    /// Replaces the selector for one dimension.
    #[must_use]
    pub fn with(mut self, dim: usize, selector: AxisSelector) -> Self {
        self.selectors[dim] = selector;
        self
    }

    /// Number of selectors.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.selectors.len()
    }

    /// Returns true when every selector keeps its dimension in full.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.selectors
            .iter()
            .all(|selector| matches!(selector, AxisSelector::All))
    }
}

/// A key resolved against a concrete axis collection: contiguous index
/// ranges per dimension, which dimensions get sliced away, and the
/// surviving narrowed axes.
#[derive(Debug, Clone)]
pub struct ResolvedKey {
    /// Index range per original dimension.
    pub ranges: Vec<Range<usize>>,
    /// True for dimensions collapsed by a `Value` selector.
    pub dropped: Vec<bool>,
    /// Narrowed surviving axes, original order.
    pub axes: Axes,
}
