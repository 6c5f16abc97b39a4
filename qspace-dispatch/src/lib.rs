//! Parallel accumulation driver.
//!
//! Jobs fan out over a rayon pool with a private [`Accumulator`] per job,
//! then a single coordinator merges the per-job histograms. Per-job
//! failures are recorded as warnings and the job is skipped; merge
//! failures abort the run because a partially merged result would be
//! silently wrong.

use qspace_backend::{CoordinateProjection, FrameSource, Job, ScanSelection};
use qspace_core::{Accumulator, SampleBatch, Space};
use rayon::prelude::*;
use thiserror::Error as ThisError;

/// Driver errors. Per-job processing failures never surface here; they
/// become [`RunOutput::warnings`].
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("backend error: {0}")]
    Backend(#[from] qspace_backend::Error),
    #[error("histogram error: {0}")]
    Core(#[from] qspace_core::Error),
    #[error("could not build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("invalid run configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Run parameters independent of the backend.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Bin resolution per projection label, or one value for all.
    pub resolutions: Vec<f64>,
    /// Worker thread count; `None` lets rayon size the pool.
    pub parallelism: Option<usize>,
}

/// Outcome of a run: the merged histogram plus counters and any per-job
/// warnings.
#[derive(Debug)]
pub struct RunOutput {
    /// Merged histogram; `None` when no job produced a usable sample.
    pub space: Option<Space>,
    /// One entry per skipped job.
    pub warnings: Vec<String>,
    /// Jobs that completed.
    pub jobs_done: usize,
    /// Jobs that failed and were skipped.
    pub jobs_failed: usize,
    /// Samples binned across all completed jobs.
    pub samples_binned: usize,
    /// Samples dropped (non-finite values) across all completed jobs.
    pub samples_dropped: usize,
}

struct JobResult {
    space: Option<Space>,
    binned: usize,
    dropped: usize,
}

/// Processes every job in the selection and merges the results.
///
/// # Errors
/// Fails fast on invalid resolutions, a selection the backend cannot
/// expand, a pool that cannot be built, or a merge error. Individual job
/// failures are recorded in the output instead.
pub fn run(
    source: &dyn FrameSource,
    projection: &dyn CoordinateProjection,
    selection: &ScanSelection,
    config: &RunConfig,
) -> Result<RunOutput> {
    let labels = projection.labels();
    let resolutions = broadcast_resolutions(&config.resolutions, labels.len())?;
    // Validates labels and resolutions before any worker starts.
    Accumulator::new(labels, &resolutions)?;

    let jobs = source.jobs(selection)?;
    if jobs.is_empty() {
        return Err(Error::Config("selection expands to no jobs".into()));
    }

    let results: Vec<std::result::Result<JobResult, String>> = match config.parallelism {
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
            pool.install(|| process_all(&jobs, source, projection, labels, &resolutions))
        }
        None => process_all(&jobs, source, projection, labels, &resolutions),
    };

    let mut output = RunOutput {
        space: None,
        warnings: Vec::new(),
        jobs_done: 0,
        jobs_failed: 0,
        samples_binned: 0,
        samples_dropped: 0,
    };
    for result in results {
        match result {
            Ok(job_result) => {
                output.jobs_done += 1;
                output.samples_binned += job_result.binned;
                output.samples_dropped += job_result.dropped;
                if let Some(incoming) = job_result.space {
                    match output.space.as_mut() {
                        Some(merged) => merged.merge(&incoming)?,
                        None => output.space = Some(incoming),
                    }
                }
            }
            Err(warning) => {
                output.jobs_failed += 1;
                output.warnings.push(warning);
            }
        }
    }
    Ok(output)
}

fn process_all(
    jobs: &[Job],
    source: &dyn FrameSource,
    projection: &dyn CoordinateProjection,
    labels: &[String],
    resolutions: &[f64],
) -> Vec<std::result::Result<JobResult, String>> {
    jobs.par_iter()
        .map(|job| {
            process_job(job, source, projection, labels, resolutions)
                .map_err(|message| format!("scan {}: {message}", job.scan))
        })
        .collect()
}

/// Accumulates one job into a private histogram. Any failure is reported
/// as a plain message so the coordinator can skip the job.
fn process_job(
    job: &Job,
    source: &dyn FrameSource,
    projection: &dyn CoordinateProjection,
    labels: &[String],
    resolutions: &[f64],
) -> std::result::Result<JobResult, String> {
    let mut accumulator =
        Accumulator::new(labels, resolutions).map_err(|e| e.to_string())?;
    let frames = source.frames(job).map_err(|e| e.to_string())?;
    for frame in &frames {
        let coordinates = projection.project(frame).map_err(|e| e.to_string())?;
        let batch =
            SampleBatch::from_columns(frame.intensity.clone(), frame.weight.clone(), coordinates)
                .map_err(|e| e.to_string())?;
        accumulator.accumulate(&batch).map_err(|e| e.to_string())?;
    }
    Ok(JobResult {
        binned: accumulator.samples_binned(),
        dropped: accumulator.samples_dropped(),
        space: accumulator.into_space(),
    })
}

fn broadcast_resolutions(resolutions: &[f64], rank: usize) -> Result<Vec<f64>> {
    if resolutions.len() == rank {
        Ok(resolutions.to_vec())
    } else if resolutions.len() == 1 {
        Ok(vec![resolutions[0]; rank])
    } else {
        Err(Error::Config(format!(
            "{} resolutions given for {rank} projection axes",
            resolutions.len()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use qspace_backend::{Error as BackendError, FrameBatch, Result as BackendResult};

    /// Identity-projection source producing a fixed sample list per scan;
    /// scans listed in `failing` error out of `frames`.
    struct FixtureSource {
        per_scan: Vec<(u32, Vec<(f64, f64)>)>,
        failing: Vec<u32>,
    }

    impl FrameSource for FixtureSource {
        fn jobs(&self, selection: &ScanSelection) -> BackendResult<Vec<Job>> {
            Ok(selection.scans().iter().map(|&scan| Job { scan }).collect())
        }

        fn frames(&self, job: &Job) -> BackendResult<Vec<FrameBatch>> {
            if self.failing.contains(&job.scan) {
                return Err(BackendError::Processing {
                    scan: job.scan,
                    message: "detector offline".into(),
                });
            }
            let samples = self
                .per_scan
                .iter()
                .find(|(scan, _)| *scan == job.scan)
                .map(|(_, samples)| samples.clone())
                .unwrap_or_default();
            let mut frame = FrameBatch::default();
            frame.raw.push(Vec::new());
            for (value, intensity) in samples {
                frame.intensity.push(intensity);
                frame.weight.push(1.0);
                frame.raw[0].push(value);
            }
            Ok(vec![frame])
        }
    }

    struct Identity {
        labels: Vec<String>,
    }

    impl Identity {
        fn new() -> Self {
            Self {
                labels: vec!["x".to_string()],
            }
        }
    }

    impl CoordinateProjection for Identity {
        fn labels(&self) -> &[String] {
            &self.labels
        }

        fn project(&self, frame: &FrameBatch) -> BackendResult<Vec<Vec<f64>>> {
            Ok(vec![frame.raw[0].clone()])
        }
    }

    fn config() -> RunConfig {
        RunConfig {
            resolutions: vec![1.0],
            parallelism: Some(2),
        }
    }

    #[test]
    fn test_merges_disjoint_scans() {
        let source = FixtureSource {
            per_scan: vec![
                (1, vec![(0.5, 2.0), (1.5, 4.0)]),
                (2, vec![(5.5, 6.0)]),
            ],
            failing: vec![],
        };
        let selection = ScanSelection::parse("1-2").unwrap();
        let output = run(&source, &Identity::new(), &selection, &config()).unwrap();

        assert_eq!(output.jobs_done, 2);
        assert_eq!(output.jobs_failed, 0);
        assert_eq!(output.samples_binned, 3);
        let space = output.space.unwrap();
        assert_eq!(space.axes().shape(), vec![6]);
        assert_eq!(space.non_empty_cells(), 3);
        assert_abs_diff_eq!(space.value_at(&[5]).unwrap(), 6.0);
    }

    #[test]
    fn test_failed_job_is_skipped_with_warning() {
        let source = FixtureSource {
            per_scan: vec![(1, vec![(0.5, 2.0)]), (3, vec![(0.5, 4.0)])],
            failing: vec![2],
        };
        let selection = ScanSelection::parse("1-3").unwrap();
        let output = run(&source, &Identity::new(), &selection, &config()).unwrap();

        assert_eq!(output.jobs_done, 2);
        assert_eq!(output.jobs_failed, 1);
        assert_eq!(output.warnings.len(), 1);
        assert!(output.warnings[0].contains("scan 2"));
        // The two surviving scans hit the same bin.
        let space = output.space.unwrap();
        assert_abs_diff_eq!(space.value_at(&[0]).unwrap(), 3.0);
    }

    #[test]
    fn test_empty_result_when_all_samples_unusable() {
        let source = FixtureSource {
            per_scan: vec![(1, vec![(f64::NAN, 2.0)])],
            failing: vec![],
        };
        let selection = ScanSelection::parse("1").unwrap();
        let output = run(&source, &Identity::new(), &selection, &config()).unwrap();
        assert!(output.space.is_none());
        assert_eq!(output.samples_dropped, 1);
    }

    #[test]
    fn test_resolution_arity_checked_upfront() {
        let source = FixtureSource {
            per_scan: vec![],
            failing: vec![],
        };
        let selection = ScanSelection::parse("1").unwrap();
        let bad = RunConfig {
            resolutions: vec![1.0, 2.0],
            parallelism: None,
        };
        assert!(matches!(
            run(&source, &Identity::new(), &selection, &bad),
            Err(Error::Config(_))
        ));
    }
}
