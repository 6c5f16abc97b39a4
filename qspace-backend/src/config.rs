//! Project configuration: input, projection and dispatch sections
//! loaded from a JSON file.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Input section: backend choice plus instrument geometry for the
/// simulated diffractometer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Backend name; only `simulation` is currently wired up.
    pub backend: String,
    /// Incident wavelength in angstrom.
    pub wavelength: f64,
    /// Sample-detector distance, same units as `pixel_size`.
    pub sdd: f64,
    /// Detector pixel pitch.
    pub pixel_size: f64,
    /// Direct-beam pixel as `[row, column]`.
    pub central_pixel: [f64; 2],
    /// Frames generated per scan.
    pub frames_per_scan: usize,
    /// Detector edge length in pixels (square detector).
    pub image_size: usize,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            backend: "simulation".to_owned(),
            wavelength: 1.54,
            sdd: 1000.0,
            pixel_size: 0.055,
            central_pixel: [50.0, 50.0],
            frames_per_scan: 50,
            image_size: 100,
            extra: Map::new(),
        }
    }
}

/// Projection section: which coordinate mapping to apply and at what
/// bin resolutions.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectionConfig {
    /// Projection name; only `q` is currently wired up.
    #[serde(default = "default_projection_kind")]
    pub kind: String,
    /// Bin resolution per target axis, or a single value applied to
    /// every axis.
    #[serde(deserialize_with = "resolution_list")]
    pub resolutions: Vec<f64>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

fn default_projection_kind() -> String {
    "q".to_owned()
}

/// Dispatch section: parallelism and the destination template.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DispatchSection {
    /// Worker thread count; `None` lets the pool size itself.
    pub parallelism: Option<usize>,
    /// Output path template; may use `{first}`, `{last}`, `{range}`.
    pub destination: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Complete project configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub input: InputConfig,
    pub projection: ProjectionConfig,
    #[serde(default)]
    pub dispatch: DispatchSection,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl ProjectConfig {
    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    /// Returns `Io` when the file cannot be read, `Json` on malformed
    /// JSON and `Config` on invalid values.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parses a configuration from JSON text.
    ///
    /// # Errors
    /// Returns `Json` on malformed JSON and `Config` on invalid values.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Unknown keys found anywhere in the configuration, rendered as a
    /// single warning line, or `None` when every key was recognized.
    /// Unknown keys are ignored rather than fatal so configurations can
    /// be shared with newer tool versions.
    #[must_use]
    pub fn unknown_key_warning(&self) -> Option<String> {
        let mut unknown = Vec::new();
        for key in self.extra.keys() {
            unknown.push(key.clone());
        }
        for key in self.input.extra.keys() {
            unknown.push(format!("input.{key}"));
        }
        for key in self.projection.extra.keys() {
            unknown.push(format!("projection.{key}"));
        }
        for key in self.dispatch.extra.keys() {
            unknown.push(format!("dispatch.{key}"));
        }
        if unknown.is_empty() {
            None
        } else {
            Some(format!("ignoring unknown config keys: {}", unknown.join(", ")))
        }
    }

    fn validate(&self) -> Result<()> {
        if self.input.backend != "simulation" {
            return Err(Error::Config(format!(
                "unknown backend '{}'",
                self.input.backend
            )));
        }
        if self.projection.kind != "q" {
            return Err(Error::Config(format!(
                "unknown projection '{}'",
                self.projection.kind
            )));
        }
        if self.projection.resolutions.is_empty() {
            return Err(Error::Config("no projection resolutions given".into()));
        }
        if self
            .projection
            .resolutions
            .iter()
            .any(|r| !r.is_finite() || *r <= 0.0)
        {
            return Err(Error::Config(
                "projection resolutions must be positive and finite".into(),
            ));
        }
        if self.input.frames_per_scan == 0 || self.input.image_size == 0 {
            return Err(Error::Config(
                "frames_per_scan and image_size must be nonzero".into(),
            ));
        }
        if !self.input.wavelength.is_finite() || self.input.wavelength <= 0.0 {
            return Err(Error::Config("wavelength must be positive".into()));
        }
        if self.input.sdd <= 0.0 || self.input.pixel_size <= 0.0 {
            return Err(Error::Config(
                "sdd and pixel_size must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Accepts either a single number or a list of numbers.
fn resolution_list<'de, D>(deserializer: D) -> std::result::Result<Vec<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(f64),
        Many(Vec<f64>),
    }
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}
