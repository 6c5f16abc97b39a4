//!
//! This binary provides a CLI for binning scan data into reciprocal-space
//! histograms and inspecting the resulting files.
#![allow(clippy::uninlined_format_args, clippy::too_many_lines)]

use clap::{Parser, Subcommand};

use qspace_backend::{
    destination_path, ProjectConfig, QProjection, ScanSelection, SimulationConfig,
    SimulationSource,
};
use qspace_core::{AxisSelector, Space, SpaceKey};
use qspace_dispatch::{run, RunConfig};
use qspace_io::{read_axes, read_space, write_space, WriteOptions};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backend error: {0}")]
    Backend(#[from] qspace_backend::Error),

    #[error("Core error: {0}")]
    Core(#[from] qspace_core::Error),

    #[error("File error: {0}")]
    QspaceIo(#[from] qspace_io::Error),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] qspace_dispatch::Error),

    #[error("{0}")]
    Usage(String),
}

/// Reciprocal-space binning of angular scan data.
#[derive(Parser)]
#[command(name = "qspace")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bin the selected scans into a histogram file
    Process {
        /// Scan selection, e.g. "4-6,8"
        scans: String,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output file path; may use {first}, {last} and {range}
        #[arg(short, long)]
        output: Option<String>,

        /// Worker thread count (default: one per CPU)
        #[arg(long)]
        parallelism: Option<usize>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show information about a histogram file
    Info {
        /// Input histogram file
        input: PathBuf,

        /// Collapse onto these axes, e.g. "qx,qz"
        #[arg(long)]
        project: Option<String>,

        /// Limit an axis before reading: "label=lo:hi" or "label=value"
        #[arg(long)]
        range: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            scans,
            config,
            output,
            parallelism,
            verbose,
        } => {
            // Selector errors abort before any scan is touched.
            let selection = ScanSelection::parse(&scans)?;

            let config = match config {
                Some(path) => ProjectConfig::load(&path)?,
                None => ProjectConfig::from_json(r#"{"projection": {"resolutions": 0.01}}"#)?,
            };
            if let Some(warning) = config.unknown_key_warning() {
                eprintln!("warning: {}", warning);
            }

            let template = output
                .or_else(|| config.dispatch.destination.clone())
                .unwrap_or_else(|| "qspace_{first}-{last}.hdf5".to_string());
            let destination = destination_path(&template, &selection);

            let source = SimulationSource::new(SimulationConfig::from(&config.input));
            let projection = QProjection::new();
            let run_config = RunConfig {
                resolutions: config.projection.resolutions.clone(),
                parallelism: parallelism.or(config.dispatch.parallelism),
            };

            if verbose {
                eprintln!("Scans: {}", selection.text());
                eprintln!("Resolutions: {:?}", run_config.resolutions);
                eprintln!("Destination: {}", destination);
            }

            let start = Instant::now();
            let result = run(&source, &projection, &selection, &run_config)?;
            for warning in &result.warnings {
                eprintln!("warning: skipped {}", warning);
            }

            let Some(space) = result.space else {
                return Err(CliError::Usage(
                    "no scan produced a usable sample; nothing written".to_string(),
                ));
            };
            write_space(&destination, &space, &WriteOptions::default())?;

            let elapsed = start.elapsed();
            println!(
                "Processed {}/{} scans in {:.2}s",
                result.jobs_done,
                selection.len(),
                elapsed.as_secs_f64()
            );
            println!("Samples binned: {}", result.samples_binned);
            println!("Samples dropped: {}", result.samples_dropped);
            println!(
                "Grid: {:?} ({} non-empty cells)",
                space.axes().shape(),
                space.non_empty_cells()
            );
            println!("Wrote: {}", destination);
        }

        Commands::Info {
            input,
            project,
            range,
        } => {
            let axes = read_axes(&input)?;
            let key = build_key(&axes, &range)?;
            let space = read_space(&input, key.as_ref())?;

            let space = match project {
                Some(labels) => {
                    let labels: Vec<&str> = labels.split(',').map(str::trim).collect();
                    space.project(&labels)?
                }
                None => space,
            };

            print_info(&input, &space);
        }
    }

    Ok(())
}

/// Turns `label=lo:hi` / `label=value` arguments into a read key against
/// the file's axes. `None` means the whole file.
fn build_key(
    axes: &qspace_core::Axes,
    ranges: &[String],
) -> Result<Option<SpaceKey>> {
    if ranges.is_empty() {
        return Ok(None);
    }
    let mut key = SpaceKey::full(axes.rank());
    for spec in ranges {
        let (label, bounds) = spec.split_once('=').ok_or_else(|| {
            CliError::Usage(format!("bad range '{}', expected label=lo:hi", spec))
        })?;
        let dim = axes.index_of_label(label.trim())?;
        let selector = match bounds.split_once(':') {
            Some((lo, hi)) => {
                AxisSelector::ValueRange(parse_bound(lo, spec)?, parse_bound(hi, spec)?)
            }
            None => AxisSelector::Value(parse_bound(bounds, spec)?),
        };
        key = key.with(dim, selector);
    }
    Ok(Some(key))
}

fn parse_bound(text: &str, spec: &str) -> Result<f64> {
    text.trim()
        .parse()
        .map_err(|_| CliError::Usage(format!("bad number '{}' in range '{}'", text, spec)))
}

fn print_info(path: &Path, space: &Space) {
    println!("File: {}", path.display());
    println!("Dimensions: {}", space.axes().rank());
    for axis in space.axes().iter() {
        println!(
            "  {}: {} bins, [{:.6}, {:.6}], resolution {:.6}",
            axis.label(),
            axis.len(),
            axis.min(),
            axis.max(),
            axis.resolution()
        );
    }
    println!("Non-empty cells: {}", space.non_empty_cells());
    if let (Some(lo), Some(hi)) = (space.min_value(), space.max_value()) {
        println!("Value range: {:.6} - {:.6}", lo, hi);
    } else {
        println!("Value range: empty");
    }
}
