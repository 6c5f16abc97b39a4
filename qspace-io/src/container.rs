//! HDF5 container layout and access.
//!
//! Layout: file attribute `qspace_format_version`; group `entry` holding a
//! group `axes` (one subgroup per axis, named by label, with `index`, `min`,
//! `max` and `resolution` attributes) and a dataset `counts` of shape
//! `count_1 × … × count_d × 2`, where the trailing pair is (photon
//! accumulator, contribution accumulator). The dataset is chunked so a
//! contiguous index window along any dimension can be read without touching
//! the rest.

use crate::{Error, Result};
use hdf5::types::VarLenUnicode;
use hdf5::{Dataset, File, Group};
use ndarray::{ArrayD, Axis as NdAxis, IxDyn, SliceInfo, SliceInfoElem};
use qspace_core::{Axes, Axis, Space, SpaceKey};
use std::path::{Path, PathBuf};
use std::str::FromStr;

const FORMAT_VERSION: &str = "1.0";

/// Per-dimension chunk cap for the counts dataset.
const MAX_CHUNK: usize = 64;

/// Container write configuration.
#[derive(Clone, Debug)]
pub struct WriteOptions {
    /// Explicit chunk shape override (one entry per dimension plus the
    /// trailing accumulator pair).
    pub chunk: Option<Vec<usize>>,
    /// Deflate level, `None` to disable compression.
    pub compression: Option<u8>,
    /// Enable the shuffle filter.
    pub shuffle: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            chunk: None,
            compression: Some(1),
            shuffle: true,
        }
    }
}

/// Writes a histogram to a container file atomically.
///
/// The data lands in a sibling `.partial` file first and is renamed into
/// place only after a successful close, so a crash mid-write never leaves a
/// half-written container under the final name.
///
/// # Errors
/// Returns an error if HDF5 I/O fails or the rename fails; the partial
/// file is removed on failure.
pub fn write_space<P: AsRef<Path>>(path: P, space: &Space, options: &WriteOptions) -> Result<()> {
    let path = path.as_ref();
    let partial = partial_path(path);
    if let Err(err) = write_space_into(&partial, space, options) {
        let _ = std::fs::remove_file(&partial);
        return Err(err);
    }
    std::fs::rename(&partial, path)?;
    Ok(())
}

/// Reads only the axis metadata of a container.
///
/// # Errors
/// Returns an error if the file is missing, malformed, or not a container.
pub fn read_axes<P: AsRef<Path>>(path: P) -> Result<Axes> {
    let file = File::open(path)?;
    let entry = file.group("entry")?;
    read_axes_group(&entry)
}

/// Reads a histogram from a container, in full or restricted to a key.
///
/// With a key, only the addressed hyperslab of the counts block is read;
/// the result equals `read_space(path, None)` followed by
/// `Space::restrict(key)` without ever materializing the full array.
///
/// # Errors
/// Returns an error for HDF5 failures, malformed containers, or a key
/// outside the stored axis bounds.
pub fn read_space<P: AsRef<Path>>(path: P, key: Option<&SpaceKey>) -> Result<Space> {
    let file = File::open(path)?;
    let entry = file.group("entry")?;
    let axes = read_axes_group(&entry)?;

    let counts_ds = entry.dataset("counts")?;
    let mut expected = axes.shape();
    expected.push(2);
    if counts_ds.shape() != expected {
        return Err(Error::InvalidFormat(format!(
            "counts dataset shape {:?} does not match axis metadata {expected:?}",
            counts_ds.shape()
        )));
    }

    match key {
        Some(key) if !key.is_full() => read_window(&counts_ds, &axes, key),
        _ => {
            let counts = counts_ds.read_dyn::<f64>()?;
            let (photons, contributions) = split_counts(counts);
            Ok(Space::from_parts(axes, photons, contributions)?)
        }
    }
}

fn read_window(counts_ds: &Dataset, axes: &Axes, key: &SpaceKey) -> Result<Space> {
    let resolved = axes.resolve(key)?;

    let mut elems: Vec<SliceInfoElem> = Vec::with_capacity(resolved.ranges.len() + 1);
    for range in &resolved.ranges {
        elems.push(slice_elem(range.start, Some(range.end)));
    }
    // The trailing accumulator pair is always read in full.
    elems.push(slice_elem(0, None));
    let info = SliceInfo::<_, IxDyn, IxDyn>::try_from(elems)
        .map_err(|e| Error::InvalidFormat(format!("bad window selection: {e}")))?;

    let window = counts_ds.read_slice::<f64, _, IxDyn>(info)?;
    let (mut photons, mut contributions) = split_counts(window);
    for dim in (0..resolved.dropped.len()).rev() {
        if resolved.dropped[dim] {
            photons = photons.index_axis_move(NdAxis(dim), 0);
            contributions = contributions.index_axis_move(NdAxis(dim), 0);
        }
    }
    Ok(Space::from_parts(resolved.axes, photons, contributions)?)
}

fn write_space_into(path: &Path, space: &Space, options: &WriteOptions) -> Result<()> {
    let file = File::create(path)?;
    set_attr_str_file(&file, "qspace_format_version", FORMAT_VERSION)?;

    let entry = file.create_group("entry")?;
    let axes_group = entry.create_group("axes")?;
    for (dim, axis) in space.axes().iter().enumerate() {
        let group = axes_group.create_group(axis.label())?;
        let index = i32::try_from(dim)
            .map_err(|_| Error::InvalidFormat("axis index exceeds i32 range".to_string()))?;
        group.new_attr::<i32>().create("index")?.write_scalar(&index)?;
        group
            .new_attr::<f64>()
            .create("min")?
            .write_scalar(&axis.min())?;
        group
            .new_attr::<f64>()
            .create("max")?
            .write_scalar(&axis.max())?;
        group
            .new_attr::<f64>()
            .create("resolution")?
            .write_scalar(&axis.resolution())?;
    }

    let rank = space.axes().rank();
    let mut shape = space.axes().shape();
    shape.push(2);

    let counts_ds = create_counts_dataset(&entry, &shape, options)?;
    set_dataset_units(&counts_ds, "count")?;

    let mut counts = ArrayD::<f64>::zeros(IxDyn(&shape));
    counts.index_axis_mut(NdAxis(rank), 0).assign(&space.photons());
    counts
        .index_axis_mut(NdAxis(rank), 1)
        .assign(&space.contributions());
    counts_ds.write(counts.view())?;
    Ok(())
}

fn read_axes_group(entry: &Group) -> Result<Axes> {
    let axes_group = entry.group("axes")?;
    let mut entries: Vec<(i32, Axis)> = Vec::new();
    for label in axes_group.member_names()? {
        let group = axes_group.group(&label)?;
        let index = group.attr("index")?.read_scalar::<i32>()?;
        let min = group.attr("min")?.read_scalar::<f64>()?;
        let max = group.attr("max")?.read_scalar::<f64>()?;
        let resolution = group.attr("resolution")?.read_scalar::<f64>()?;
        entries.push((index, Axis::from_value_range(&label, min, max, resolution)?));
    }

    entries.sort_by_key(|(index, _)| *index);
    for (position, (index, _)) in entries.iter().enumerate() {
        let expected = i32::try_from(position)
            .map_err(|_| Error::InvalidFormat("axis index exceeds i32 range".to_string()))?;
        if *index != expected {
            return Err(Error::InvalidFormat(format!(
                "axis index attributes are not contiguous (found {index}, expected {expected})"
            )));
        }
    }

    let axes: Vec<Axis> = entries.into_iter().map(|(_, axis)| axis).collect();
    Ok(Axes::new(axes)?)
}

fn split_counts(counts: ArrayD<f64>) -> (ArrayD<f64>, ArrayD<f64>) {
    let pair_axis = NdAxis(counts.ndim() - 1);
    let photons = counts.index_axis(pair_axis, 0).to_owned();
    let contributions = counts.index_axis(pair_axis, 1).to_owned();
    (photons, contributions)
}

#[allow(clippy::cast_possible_wrap)]
fn slice_elem(start: usize, end: Option<usize>) -> SliceInfoElem {
    SliceInfoElem::Slice {
        start: start as isize,
        end: end.map(|e| e as isize),
        step: 1,
    }
}

fn create_counts_dataset(group: &Group, shape: &[usize], options: &WriteOptions) -> Result<Dataset> {
    let chunk = options
        .chunk
        .clone()
        .unwrap_or_else(|| shape.iter().map(|&n| n.clamp(1, MAX_CHUNK)).collect());

    let mut builder = group.new_dataset::<f64>().shape(shape.to_vec()).chunk(chunk);
    if options.shuffle {
        builder = builder.shuffle();
    }
    if let Some(level) = options.compression {
        builder = builder.deflate(level);
    }
    Ok(builder.create("counts")?)
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

fn set_dataset_units(dataset: &Dataset, units: &str) -> Result<()> {
    let value = to_var_len_unicode(units)?;
    dataset
        .new_attr::<VarLenUnicode>()
        .create("units")?
        .write_scalar(&value)?;
    Ok(())
}

fn set_attr_str_file(file: &File, name: &str, value: &str) -> Result<()> {
    let value = to_var_len_unicode(value)?;
    file.new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

fn to_var_len_unicode(value: &str) -> Result<VarLenUnicode> {
    VarLenUnicode::from_str(value)
        .map_err(|e| Error::InvalidFormat(format!("invalid utf-8 attribute: {e}")))
}
