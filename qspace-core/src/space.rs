//! The N-dimensional weighted histogram.
//!
//! A [`Space`] owns two dense accumulator arrays over the Cartesian product
//! of its axes' bins: `photons` holds the weighted intensity sums and
//! `contributions` the weight sums. The logical value of a cell is
//! `photons / contributions`; a cell with zero contributions is missing,
//! not zero, and is excluded from every reduction. Accumulators are only
//! ever added to — accumulation and merge never overwrite a cell.

use crate::axes::{Axes, ResolvedKey, SpaceKey};
use crate::error::{Error, Result};
use crate::sample::SampleBatch;
use ndarray::{ArrayD, ArrayViewD, Axis as NdAxis, IxDyn, Slice, Zip};

/// Dense weighted histogram over an ordered axis collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Space {
    axes: Axes,
    photons: ArrayD<f64>,
    contributions: ArrayD<f64>,
}

/// Logical cell values plus a validity mask. Cells with zero accumulated
/// weight carry `NaN` in `values` and `false` in `valid`.
#[derive(Debug, Clone)]
pub struct MaskedValues {
    pub values: ArrayD<f64>,
    pub valid: ArrayD<bool>,
}

impl Space {
    /// Creates an empty histogram over the given axes.
    #[must_use]
    pub fn new(axes: Axes) -> Self {
        let shape = axes.shape();
        Self {
            axes,
            photons: ArrayD::zeros(IxDyn(&shape)),
            contributions: ArrayD::zeros(IxDyn(&shape)),
        }
    }

    /// Reassembles a histogram from its parts (storage reads).
    ///
    /// # Errors
    /// Returns `DimensionMismatch` when array shapes disagree with the
    /// axes' bin counts.
    pub fn from_parts(
        axes: Axes,
        photons: ArrayD<f64>,
        contributions: ArrayD<f64>,
    ) -> Result<Self> {
        let shape = axes.shape();
        if photons.shape() != shape.as_slice() || contributions.shape() != shape.as_slice() {
            return Err(Error::DimensionMismatch(format!(
                "cell array shape {:?} does not match axes shape {shape:?}",
                photons.shape()
            )));
        }
        Ok(Self {
            axes,
            photons,
            contributions,
        })
    }

    /// The axis collection, in dimension order.
    #[must_use]
    pub fn axes(&self) -> &Axes {
        &self.axes
    }

    /// Weighted intensity accumulators.
    #[must_use]
    pub fn photons(&self) -> ArrayViewD<'_, f64> {
        self.photons.view()
    }

    /// Weight accumulators.
    #[must_use]
    pub fn contributions(&self) -> ArrayViewD<'_, f64> {
        self.contributions.view()
    }

    /// Bins a batch of samples into the histogram.
    ///
    /// The single performance-critical hot loop: per sample, one bin lookup
    /// per dimension, then two accumulator adds. Samples with a non-finite
    /// intensity, weight or coordinate, or with any coordinate outside the
    /// axis bounds, are dropped; the drop count is returned.
    ///
    /// # Errors
    /// Returns `DimensionMismatch` when the batch rank or column lengths
    /// disagree with the axes.
    pub fn accumulate(&mut self, batch: &SampleBatch) -> Result<usize> {
        batch.validate()?;
        if batch.rank() != self.axes.rank() {
            return Err(Error::DimensionMismatch(format!(
                "batch has {} coordinate columns for {} axes",
                batch.rank(),
                self.axes.rank()
            )));
        }

        let mut dropped = 0usize;
        let mut index = vec![0usize; self.axes.rank()];
        'samples: for i in 0..batch.len() {
            let intensity = batch.intensity[i];
            let weight = batch.weight[i];
            if !intensity.is_finite() || !weight.is_finite() {
                dropped += 1;
                continue;
            }
            for (dim, axis) in self.axes.iter().enumerate() {
                match axis.bin_of(batch.coordinates[dim][i]) {
                    Some(bin) => index[dim] = bin,
                    None => {
                        dropped += 1;
                        continue 'samples;
                    }
                }
            }
            self.photons[index.as_slice()] += intensity * weight;
            self.contributions[index.as_slice()] += weight;
        }
        Ok(dropped)
    }

    /// Widens the histogram so its axes cover `target`, reallocating and
    /// copying existing cells to their new offsets. Bounds never shrink.
    ///
    /// # Errors
    /// Returns the axis union error when `target` is not grid-compatible.
    pub fn extend_to(&mut self, target: &Axes) -> Result<()> {
        let union = self.axes.union(target)?;
        if union == self.axes {
            return Ok(());
        }

        let shape = union.shape();
        let mut photons = ArrayD::zeros(IxDyn(&shape));
        let mut contributions = ArrayD::zeros(IxDyn(&shape));
        {
            let mut photon_block = photons.view_mut();
            let mut contribution_block = contributions.view_mut();
            for (dim, (old, new)) in self.axes.iter().zip(union.iter()).enumerate() {
                let offset = old.offset_within(new);
                let window = Slice::from(offset..offset + old.len());
                photon_block.slice_axis_inplace(NdAxis(dim), window);
                contribution_block.slice_axis_inplace(NdAxis(dim), window);
            }
            photon_block.assign(&self.photons);
            contribution_block.assign(&self.contributions);
        }

        self.axes = union;
        self.photons = photons;
        self.contributions = contributions;
        Ok(())
    }

    /// Adds another histogram's accumulators into this one, widening the
    /// axes to the union first. The other histogram may carry its axes in
    /// any dimension order; cells are matched by label. Commutative and
    /// associative up to floating-point summation order.
    ///
    /// # Errors
    /// Returns `AxisMismatch`/`IncompatibleAxis` when the two histograms do
    /// not share labels and resolutions.
    pub fn merge(&mut self, other: &Space) -> Result<()> {
        self.extend_to(&other.axes)?;

        // other's dimension position for each of our dimensions.
        let mut order = Vec::with_capacity(self.axes.rank());
        for axis in self.axes.iter() {
            order.push(other.axes.index_of_label(axis.label())?);
        }

        let mut photon_block = self.photons.view_mut();
        let mut contribution_block = self.contributions.view_mut();
        for (dim, ours) in self.axes.iter().enumerate() {
            let theirs = other.axes.get(order[dim]);
            let offset = theirs.offset_within(ours);
            let window = Slice::from(offset..offset + theirs.len());
            photon_block.slice_axis_inplace(NdAxis(dim), window);
            contribution_block.slice_axis_inplace(NdAxis(dim), window);
        }
        photon_block += &other.photons.view().permuted_axes(&order[..]);
        contribution_block += &other.contributions.view().permuted_axes(&order[..]);
        Ok(())
    }

    /// Marginalizes onto the named axes: both accumulators are summed over
    /// every other dimension. The surviving axes keep their original
    /// dimension order regardless of the argument order.
    ///
    /// # Errors
    /// Returns `UnknownAxis` for an absent label and `DimensionMismatch`
    /// for an empty or repeating label list.
    pub fn project(&self, labels: &[&str]) -> Result<Space> {
        if labels.is_empty() {
            return Err(Error::DimensionMismatch(
                "projection needs at least one axis label".to_string(),
            ));
        }
        let mut keep = Vec::with_capacity(labels.len());
        for label in labels {
            let dim = self.axes.index_of_label(label)?;
            if keep.contains(&dim) {
                return Err(Error::DimensionMismatch(format!(
                    "axis '{label}' listed twice in projection"
                )));
            }
            keep.push(dim);
        }

        let mut photons = self.photons.clone();
        let mut contributions = self.contributions.clone();
        for dim in (0..self.axes.rank()).rev() {
            if !keep.contains(&dim) {
                photons = photons.sum_axis(NdAxis(dim));
                contributions = contributions.sum_axis(NdAxis(dim));
            }
        }

        let surviving = self
            .axes
            .iter()
            .enumerate()
            .filter(|(dim, _)| keep.contains(dim))
            .map(|(_, axis)| axis.clone())
            .collect();
        Ok(Space {
            axes: Axes::new(surviving)?,
            photons,
            contributions,
        })
    }

    /// Restricts to the sub-region a key addresses, copying the covered
    /// cells and collapsing value-selected dimensions.
    ///
    /// # Errors
    /// Returns `OutOfRange` for selector values outside the axis bounds.
    pub fn restrict(&self, key: &SpaceKey) -> Result<Space> {
        let resolved = self.axes.resolve(key)?;
        let photons = sliced_owned(&self.photons, &resolved);
        let contributions = sliced_owned(&self.contributions, &resolved);
        Space::from_parts(resolved.axes, photons, contributions)
    }

    /// Logical values plus validity mask. Cells without contributions are
    /// `NaN` and flagged invalid.
    #[must_use]
    pub fn masked(&self) -> MaskedValues {
        let values = Zip::from(&self.photons)
            .and(&self.contributions)
            .map_collect(|&p, &c| if c > 0.0 { p / c } else { f64::NAN });
        let valid = self.contributions.mapv(|c| c > 0.0);
        MaskedValues { values, valid }
    }

    /// Smallest logical value over the valid cells, if any.
    #[must_use]
    pub fn min_value(&self) -> Option<f64> {
        self.fold_valid(f64::INFINITY, f64::min)
    }

    /// Largest logical value over the valid cells, if any.
    #[must_use]
    pub fn max_value(&self) -> Option<f64> {
        self.fold_valid(f64::NEG_INFINITY, f64::max)
    }

    /// Number of cells that received any weight.
    #[must_use]
    pub fn non_empty_cells(&self) -> usize {
        self.contributions.iter().filter(|&&c| c > 0.0).count()
    }

    /// Logical value of one cell, `None` when the cell is empty or the
    /// index lies outside the grid.
    #[must_use]
    pub fn value_at(&self, index: &[usize]) -> Option<f64> {
        let contributions = *self.contributions.get(index)?;
        (contributions > 0.0).then(|| self.photons[index] / contributions)
    }

    fn fold_valid(&self, init: f64, combine: fn(f64, f64) -> f64) -> Option<f64> {
        let mut any = false;
        let mut acc = init;
        for (&p, &c) in self.photons.iter().zip(self.contributions.iter()) {
            if c > 0.0 {
                acc = combine(acc, p / c);
                any = true;
            }
        }
        any.then_some(acc)
    }
}

/// Copies the sub-array a resolved key addresses, collapsing dimensions
/// marked as dropped (their range is a single bin by construction).
fn sliced_owned(array: &ArrayD<f64>, resolved: &ResolvedKey) -> ArrayD<f64> {
    let mut view = array.view();
    for (dim, range) in resolved.ranges.iter().enumerate() {
        view.slice_axis_inplace(NdAxis(dim), Slice::from(range.clone()));
    }
    for dim in (0..resolved.dropped.len()).rev() {
        if resolved.dropped[dim] {
            view = view.index_axis_move(NdAxis(dim), 0);
        }
    }
    view.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axes::AxisSelector;
    use crate::axis::Axis;
    use approx::assert_abs_diff_eq;

    fn axes_2d() -> Axes {
        Axes::new(vec![
            Axis::from_value_range("qx", 0.0, 2.0, 1.0).unwrap(),
            Axis::from_value_range("qy", 0.0, 2.0, 1.0).unwrap(),
        ])
        .unwrap()
    }

    fn batch_2d(samples: &[(f64, f64, f64, f64)]) -> SampleBatch {
        let mut batch = SampleBatch::new(2);
        for &(intensity, weight, qx, qy) in samples {
            batch.push(intensity, weight, &[qx, qy]);
        }
        batch
    }

    #[test]
    fn test_weighted_average_invariant() {
        let mut space = Space::new(axes_2d());
        let dropped = space
            .accumulate(&batch_2d(&[(2.0, 1.0, 1.0, 1.0), (4.0, 1.0, 1.0, 1.0)]))
            .unwrap();
        assert_eq!(dropped, 0);
        assert_abs_diff_eq!(space.value_at(&[1, 1]).unwrap(), 3.0);
    }

    #[test]
    fn test_accumulate_drops_bad_samples() {
        let mut space = Space::new(axes_2d());
        let dropped = space
            .accumulate(&batch_2d(&[
                (1.0, 1.0, 1.0, 1.0),
                (1.0, 1.0, 9.0, 1.0),
                (1.0, 1.0, f64::NAN, 1.0),
                (f64::INFINITY, 1.0, 1.0, 1.0),
            ]))
            .unwrap();
        assert_eq!(dropped, 3);
        assert_eq!(space.non_empty_cells(), 1);
    }

    #[test]
    fn test_accumulate_rejects_wrong_rank() {
        let mut space = Space::new(axes_2d());
        let mut batch = SampleBatch::new(1);
        batch.push(1.0, 1.0, &[1.0]);
        assert!(matches!(
            space.accumulate(&batch),
            Err(Error::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_merge_offsets_cells_correctly() {
        let mut left = Space::new(
            Axes::new(vec![Axis::from_value_range("qx", 0.0, 2.0, 1.0).unwrap()]).unwrap(),
        );
        let mut batch = SampleBatch::new(1);
        batch.push(2.0, 1.0, &[1.0]);
        left.accumulate(&batch).unwrap();

        let mut right = Space::new(
            Axes::new(vec![Axis::from_value_range("qx", 3.0, 5.0, 1.0).unwrap()]).unwrap(),
        );
        let mut batch = SampleBatch::new(1);
        batch.push(6.0, 2.0, &[4.0]);
        right.accumulate(&batch).unwrap();

        left.merge(&right).unwrap();
        assert_eq!(left.axes().shape(), vec![6]);
        assert_abs_diff_eq!(left.value_at(&[1]).unwrap(), 2.0);
        assert_abs_diff_eq!(left.value_at(&[4]).unwrap(), 6.0);
        assert_eq!(left.non_empty_cells(), 2);
    }

    #[test]
    fn test_merge_accumulates_overlapping_cells() {
        let mut left = Space::new(axes_2d());
        left.accumulate(&batch_2d(&[(2.0, 1.0, 1.0, 1.0)])).unwrap();
        let mut right = Space::new(axes_2d());
        right.accumulate(&batch_2d(&[(4.0, 3.0, 1.0, 1.0)])).unwrap();

        left.merge(&right).unwrap();
        // (2*1 + 4*3) / (1 + 3)
        assert_abs_diff_eq!(left.value_at(&[1, 1]).unwrap(), 3.5);
    }

    #[test]
    fn test_merge_aligns_axes_by_label() {
        // The incoming histogram carries the same labels in permuted
        // dimension order; cells must land by label, not by position.
        let mut left = Space::new(axes_2d());
        left.accumulate(&batch_2d(&[(2.0, 1.0, 1.0, 0.0)])).unwrap();

        let mut right = Space::new(
            Axes::new(vec![
                Axis::from_value_range("qy", 10.0, 12.0, 1.0).unwrap(),
                Axis::from_value_range("qx", 0.0, 4.0, 1.0).unwrap(),
            ])
            .unwrap(),
        );
        let mut batch = SampleBatch::new(2);
        // Columns in right's order: (qy, qx).
        batch.push(5.0, 1.0, &[11.0, 2.0]);
        right.accumulate(&batch).unwrap();

        left.merge(&right).unwrap();
        assert_eq!(left.axes().labels(), vec!["qx", "qy"]);
        assert_eq!(left.axes().shape(), vec![5, 13]);
        assert_abs_diff_eq!(left.value_at(&[2, 11]).unwrap(), 5.0);
        assert_abs_diff_eq!(left.value_at(&[1, 0]).unwrap(), 2.0);
        assert_eq!(left.non_empty_cells(), 2);
    }

    #[test]
    fn test_merge_rejects_incompatible_resolution() {
        let mut left = Space::new(axes_2d());
        let right = Space::new(
            Axes::new(vec![
                Axis::from_value_range("qx", 0.0, 2.0, 0.5).unwrap(),
                Axis::from_value_range("qy", 0.0, 2.0, 1.0).unwrap(),
            ])
            .unwrap(),
        );
        assert!(matches!(
            left.merge(&right),
            Err(Error::IncompatibleAxis { .. })
        ));
    }

    #[test]
    fn test_projection_reduces_correctly() {
        // All nine cells value 7 with weight 1; projecting onto qx must
        // keep value 7 and carry weight 3 per bin.
        let mut space = Space::new(axes_2d());
        let mut batch = SampleBatch::new(2);
        for qx in 0..3 {
            for qy in 0..3 {
                batch.push(7.0, 1.0, &[f64::from(qx), f64::from(qy)]);
            }
        }
        space.accumulate(&batch).unwrap();

        let projected = space.project(&["qx"]).unwrap();
        assert_eq!(projected.axes().labels(), vec!["qx"]);
        assert_eq!(projected.axes().shape(), vec![3]);
        for bin in 0..3 {
            assert_abs_diff_eq!(projected.value_at(&[bin]).unwrap(), 7.0);
            assert_abs_diff_eq!(projected.contributions()[[bin]], 3.0);
        }
    }

    #[test]
    fn test_projection_keeps_dimension_order() {
        let space = Space::new(axes_2d());
        let projected = space.project(&["qy", "qx"]).unwrap();
        assert_eq!(projected.axes().labels(), vec!["qx", "qy"]);
    }

    #[test]
    fn test_projection_unknown_label() {
        let space = Space::new(axes_2d());
        assert!(matches!(
            space.project(&["qz"]),
            Err(Error::UnknownAxis(_))
        ));
    }

    #[test]
    fn test_restrict_slices_and_drops() {
        let mut space = Space::new(axes_2d());
        space
            .accumulate(&batch_2d(&[(5.0, 1.0, 1.0, 2.0), (9.0, 1.0, 2.0, 2.0)]))
            .unwrap();

        let key = space
            .axes()
            .full_key()
            .with(0, AxisSelector::ValueRange(1.0, 2.0))
            .with(1, AxisSelector::Value(2.0));
        let restricted = space.restrict(&key).unwrap();
        assert_eq!(restricted.axes().labels(), vec!["qx"]);
        assert_eq!(restricted.axes().shape(), vec![2]);
        assert_abs_diff_eq!(restricted.value_at(&[0]).unwrap(), 5.0);
        assert_abs_diff_eq!(restricted.value_at(&[1]).unwrap(), 9.0);
    }

    #[test]
    fn test_masking_excludes_empty_cells() {
        let mut space = Space::new(axes_2d());
        space
            .accumulate(&batch_2d(&[(5.0, 1.0, 0.0, 0.0), (1.0, 1.0, 2.0, 2.0)]))
            .unwrap();

        let masked = space.masked();
        assert!(masked.valid[[0, 0]]);
        assert!(!masked.valid[[1, 1]]);
        assert!(masked.values[[1, 1]].is_nan());

        assert_abs_diff_eq!(space.min_value().unwrap(), 1.0);
        assert_abs_diff_eq!(space.max_value().unwrap(), 5.0);
    }

    #[test]
    fn test_value_at_out_of_bounds_is_none() {
        let mut space = Space::new(axes_2d());
        space.accumulate(&batch_2d(&[(5.0, 1.0, 0.0, 0.0)])).unwrap();
        assert_eq!(space.value_at(&[99, 0]), None);
        assert_eq!(space.value_at(&[0]), None);
        assert_abs_diff_eq!(space.value_at(&[0, 0]).unwrap(), 5.0);
    }

    #[test]
    fn test_empty_space_has_no_extrema() {
        let space = Space::new(axes_2d());
        assert_eq!(space.min_value(), None);
        assert_eq!(space.max_value(), None);
        assert_eq!(space.non_empty_cells(), 0);
    }

    #[test]
    fn test_extend_preserves_cells() {
        let mut space = Space::new(
            Axes::new(vec![Axis::from_value_range("qx", 2.0, 4.0, 1.0).unwrap()]).unwrap(),
        );
        let mut batch = SampleBatch::new(1);
        batch.push(3.0, 1.0, &[3.0]);
        space.accumulate(&batch).unwrap();

        let wider =
            Axes::new(vec![Axis::from_value_range("qx", 0.0, 8.0, 1.0).unwrap()]).unwrap();
        space.extend_to(&wider).unwrap();
        assert_eq!(space.axes().shape(), vec![9]);
        assert_abs_diff_eq!(space.value_at(&[3]).unwrap(), 3.0);
        assert_eq!(space.non_empty_cells(), 1);
    }
}
