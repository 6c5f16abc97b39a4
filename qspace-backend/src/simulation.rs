//! Simulated diffractometer backend.
//!
//! Each scan is a random walk through angular space starting at the
//! origin; each frame is a square detector image of a ten-slit
//! interference pattern. The walk is seeded by the scan number, so a
//! scan always produces the same frames regardless of worker scheduling.

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::InputConfig;
use crate::error::{Error, Result};
use crate::selection::ScanSelection;
use crate::source::{CoordinateProjection, FrameBatch, FrameSource, Job};

const SLITS: f64 = 10.0;

/// Geometry and sizing for the simulated instrument.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Incident wavelength in angstrom.
    pub wavelength: f64,
    /// Sample-detector distance.
    pub sdd: f64,
    /// Detector pixel pitch, same units as `sdd`.
    pub pixel_size: f64,
    /// Direct-beam pixel as `[row, column]`.
    pub central_pixel: [f64; 2],
    /// Frames generated per scan.
    pub frames_per_scan: usize,
    /// Detector edge length in pixels.
    pub image_size: usize,
}

impl From<&InputConfig> for SimulationConfig {
    fn from(input: &InputConfig) -> Self {
        Self {
            wavelength: input.wavelength,
            sdd: input.sdd,
            pixel_size: input.pixel_size,
            central_pixel: input.central_pixel,
            frames_per_scan: input.frames_per_scan,
            image_size: input.image_size,
        }
    }
}

/// Frame source that synthesizes scan data instead of reading files.
#[derive(Debug, Clone)]
pub struct SimulationSource {
    config: SimulationConfig,
}

impl SimulationSource {
    #[must_use]
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    /// Generates one frame at the given sample and beam angles, all in
    /// radians. Raw columns are `[wavelength, af, delta, omega, ai]`,
    /// with the per-pixel exit angles spread around the central pixel.
    fn frame(&self, af: f64, delta: f64, ai: f64, omega: f64) -> FrameBatch {
        let n = self.config.image_size;
        let pixels = n * n;
        // Angular pitch of one pixel, in radians.
        let app = (self.config.pixel_size / self.config.sdd).atan();
        let k0 = 2.0 * PI / self.config.wavelength;

        let mut batch = FrameBatch {
            intensity: Vec::with_capacity(pixels),
            weight: Vec::with_capacity(pixels),
            raw: vec![Vec::with_capacity(pixels); 5],
        };
        #[allow(clippy::cast_precision_loss)]
        for row in 0..n {
            let pixel_af = -app * (row as f64 - self.config.central_pixel[0]) + af;
            for col in 0..n {
                let pixel_delta = app * (col as f64 - self.config.central_pixel[1]) + delta;

                let qy = k0 * (pixel_af.cos() * pixel_delta.cos() - ai.cos() * omega.cos());
                let qx = k0 * (pixel_af.cos() * pixel_delta.sin() - ai.cos() * omega.sin());
                let qz = k0 * (pixel_af.sin() + ai.sin());

                // Ten-slit interference pattern; exact slit zeros give
                // non-finite samples that the accumulator drops.
                let amplitude = (qx * SLITS).sin() / qx.sin()
                    * (qy * SLITS).sin() / qy.sin()
                    * (qz * SLITS).sin() / qz.sin();
                batch.intensity.push(amplitude.abs().powi(2));
                batch.weight.push(1.0);
                batch.raw[0].push(self.config.wavelength);
                batch.raw[1].push(pixel_af);
                batch.raw[2].push(pixel_delta);
                batch.raw[3].push(omega);
                batch.raw[4].push(ai);
            }
        }
        batch
    }
}

/// Evenly spaced walk from zero to a random endpoint below 20 degrees,
/// converted to radians.
fn angular_walk(rng: &mut StdRng, steps: usize) -> Vec<f64> {
    let end = rng.gen::<f64>() * 20.0 * PI / 180.0;
    if steps == 1 {
        return vec![0.0];
    }
    #[allow(clippy::cast_precision_loss)]
    (0..steps)
        .map(|i| end * i as f64 / (steps - 1) as f64)
        .collect()
}

impl FrameSource for SimulationSource {
    fn jobs(&self, selection: &ScanSelection) -> Result<Vec<Job>> {
        Ok(selection.scans().iter().map(|&scan| Job { scan }).collect())
    }

    fn frames(&self, job: &Job) -> Result<Vec<FrameBatch>> {
        let mut rng = StdRng::seed_from_u64(u64::from(job.scan));
        let steps = self.config.frames_per_scan;
        let aaf = angular_walk(&mut rng, steps);
        let adelta = angular_walk(&mut rng, steps);
        let aai = angular_walk(&mut rng, steps);
        let aomega = angular_walk(&mut rng, steps);

        let mut frames = Vec::with_capacity(steps);
        for i in 0..steps {
            frames.push(self.frame(aaf[i], adelta[i], aai[i], aomega[i]));
        }
        Ok(frames)
    }
}

/// Momentum-transfer projection of the angular coordinates.
#[derive(Debug, Clone)]
pub struct QProjection {
    labels: Vec<String>,
}

impl QProjection {
    #[must_use]
    pub fn new() -> Self {
        Self {
            labels: vec!["qx".to_owned(), "qy".to_owned(), "qz".to_owned()],
        }
    }
}

impl Default for QProjection {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinateProjection for QProjection {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn project(&self, frame: &FrameBatch) -> Result<Vec<Vec<f64>>> {
        if frame.raw.len() != 5 {
            return Err(Error::Config(format!(
                "q projection expects 5 raw columns, got {}",
                frame.raw.len()
            )));
        }
        frame.validate()?;
        let n = frame.len();
        let mut qx = Vec::with_capacity(n);
        let mut qy = Vec::with_capacity(n);
        let mut qz = Vec::with_capacity(n);
        for i in 0..n {
            let wavelength = frame.raw[0][i];
            let af = frame.raw[1][i];
            let delta = frame.raw[2][i];
            let omega = frame.raw[3][i];
            let ai = frame.raw[4][i];
            let k0 = 2.0 * PI / wavelength;
            qx.push(k0 * (af.cos() * delta.sin() - ai.cos() * omega.sin()));
            qy.push(k0 * (af.cos() * delta.cos() - ai.cos() * omega.cos()));
            qz.push(k0 * (af.sin() + ai.sin()));
        }
        Ok(vec![qx, qy, qz])
    }
}
