//! Full pipeline: two workers over disjoint coordinate ranges, merge,
//! persist, reload, query.

use approx::assert_abs_diff_eq;
use qspace_backend::{
    CoordinateProjection, Error as BackendError, FrameBatch, FrameSource, Job,
    Result as BackendResult, ScanSelection,
};
use qspace_core::{AxisSelector, SpaceKey};
use qspace_dispatch::{run, RunConfig};
use qspace_io::{read_axes, read_space, write_space, WriteOptions};

/// Two scans, 50 samples each, in disjoint coordinate ranges so every
/// sample's origin is unambiguous after the merge.
struct TwoScanSource;

const SAMPLES_PER_SCAN: usize = 50;

impl FrameSource for TwoScanSource {
    fn jobs(&self, selection: &ScanSelection) -> BackendResult<Vec<Job>> {
        Ok(selection.scans().iter().map(|&scan| Job { scan }).collect())
    }

    fn frames(&self, job: &Job) -> BackendResult<Vec<FrameBatch>> {
        // Scan 1 covers [0, 5), scan 2 covers [10, 15).
        let offset = match job.scan {
            1 => 0.0,
            2 => 10.0,
            other => {
                return Err(BackendError::Processing {
                    scan: other,
                    message: "unknown scan".into(),
                })
            }
        };
        let mut frame = FrameBatch::default();
        frame.raw.push(Vec::new());
        frame.raw.push(Vec::new());
        for i in 0..SAMPLES_PER_SCAN {
            let step = i as f64 * 0.1;
            frame.intensity.push(f64::from(job.scan) + step);
            frame.weight.push(1.0 + (i % 3) as f64);
            frame.raw[0].push(offset + step);
            frame.raw[1].push(offset + step * 0.5);
        }
        Ok(vec![frame])
    }
}

struct PassThrough {
    labels: Vec<String>,
}

impl PassThrough {
    fn new() -> Self {
        Self {
            labels: vec!["qx".to_string(), "qy".to_string()],
        }
    }
}

impl CoordinateProjection for PassThrough {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn project(&self, frame: &FrameBatch) -> BackendResult<Vec<Vec<f64>>> {
        Ok(frame.raw.clone())
    }
}

#[test]
fn test_process_merge_persist_reload() {
    let selection = ScanSelection::parse("1-2").unwrap();
    let config = RunConfig {
        resolutions: vec![0.5],
        parallelism: Some(2),
    };
    let output = run(&TwoScanSource, &PassThrough::new(), &selection, &config).unwrap();

    assert_eq!(output.jobs_done, 2);
    assert_eq!(output.jobs_failed, 0);
    assert_eq!(output.samples_binned, 2 * SAMPLES_PER_SCAN);
    assert_eq!(output.samples_dropped, 0);
    let merged = output.space.unwrap();

    // Single-scan runs reproduce each side of the merge.
    let single = |scan: &str| {
        let sel = ScanSelection::parse(scan).unwrap();
        run(&TwoScanSource, &PassThrough::new(), &sel, &config)
            .unwrap()
            .space
            .unwrap()
    };
    let mut left = single("1");
    let right = single("2");
    let merged_cells = merged.non_empty_cells();
    // Ranges are disjoint, so non-empty cells add up.
    assert_eq!(
        merged_cells,
        left.non_empty_cells() + right.non_empty_cells()
    );
    left.merge(&right).unwrap();
    left.extend_to(merged.axes()).unwrap();
    assert_eq!(left.axes(), merged.axes());

    // Round-trip through the container.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("merged.hdf5");
    write_space(&path, &merged, &WriteOptions::default()).unwrap();

    let axes = read_axes(&path).unwrap();
    assert_eq!(&axes, merged.axes());

    let reloaded = read_space(&path, None).unwrap();
    assert_eq!(reloaded.non_empty_cells(), merged_cells);
    let masked = reloaded.masked();
    let original = merged.masked();
    for (a, b) in masked.values.iter().zip(original.values.iter()) {
        if a.is_nan() {
            assert!(b.is_nan());
        } else {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
        }
    }

    // Weighted averages stay within the intensity range of the inputs.
    let lo = reloaded.min_value().unwrap();
    let hi = reloaded.max_value().unwrap();
    assert!(lo >= 1.0);
    assert!(hi <= 2.0 + (SAMPLES_PER_SCAN - 1) as f64 * 0.1);

    // Windowed read over scan 2's range matches restricting in memory.
    let key = SpaceKey::new(vec![
        AxisSelector::ValueRange(10.0, 14.0),
        AxisSelector::All,
    ]);
    let window = read_space(&path, Some(&key)).unwrap();
    let restricted = merged.restrict(&key).unwrap();
    assert_eq!(window.axes(), restricted.axes());
    assert_eq!(window.non_empty_cells(), restricted.non_empty_cells());
}

#[test]
fn test_failing_scan_is_reported_not_fatal() {
    let selection = ScanSelection::parse("1-3").unwrap();
    let config = RunConfig {
        resolutions: vec![0.5, 0.5],
        parallelism: None,
    };
    let output = run(&TwoScanSource, &PassThrough::new(), &selection, &config).unwrap();
    assert_eq!(output.jobs_done, 2);
    assert_eq!(output.jobs_failed, 1);
    assert!(output.warnings[0].contains("scan 3"));
    assert!(output.space.is_some());
}
