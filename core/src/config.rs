//! File-backed propagation settings.
//!
//! A [`PropagatorConfig`] collects everything a host needs to set up the propagation engine: the
//! gravity vector, the IMU noise model, the sample store capacity and the Allan-variance search
//! limit. Configurations are read and written as JSON, YAML or TOML, chosen by file extension.
//! Missing fields fall back to their defaults, so a calibration file only needs to carry the noise
//! block.
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::NoiseParameters;
use crate::error::{PropagationError, Result};

/// Standard gravity pointing down a z-up world frame, in m/s²
pub const DEFAULT_GRAVITY: [f64; 3] = [0.0, 0.0, -9.81];
pub const DEFAULT_DATABASE_CAPACITY: usize = 1000;
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 100;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagatorConfig {
    /// World-frame gravity vector (m/s²)
    pub gravity: Vector3<f64>,
    /// Maximum number of IMU samples retained
    pub database_capacity: usize,
    /// Largest chunk size examined by the noise estimator
    pub max_chunk_size: usize,
    /// Continuous-time noise densities
    pub noise: NoiseParameters,
}
impl Default for PropagatorConfig {
    fn default() -> Self {
        PropagatorConfig {
            gravity: Vector3::from(DEFAULT_GRAVITY),
            database_capacity: DEFAULT_DATABASE_CAPACITY,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            noise: NoiseParameters::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Format {
    Json,
    Yaml,
    Toml,
}
impl Format {
    fn from_path(path: &Path) -> io::Result<Format> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());
        match ext.as_deref() {
            Some("json") => Ok(Format::Json),
            Some("yaml") | Some("yml") => Ok(Format::Yaml),
            Some("toml") => Ok(Format::Toml),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsupported configuration file: {}", path.display()),
            )),
        }
    }
}

impl PropagatorConfig {
    /// Check every field against its documented range.
    pub fn validate(&self) -> Result<()> {
        if self.gravity.iter().any(|g| !g.is_finite()) {
            return Err(PropagationError::InvalidParameter(
                "gravity must be finite".to_string(),
            ));
        }
        if self.database_capacity < 2 {
            return Err(PropagationError::InvalidParameter(format!(
                "database_capacity must be at least 2, got {}",
                self.database_capacity
            )));
        }
        if self.max_chunk_size < 2 {
            return Err(PropagationError::InvalidParameter(format!(
                "max_chunk_size must be at least 2, got {}",
                self.max_chunk_size
            )));
        }
        self.noise.validate()
    }

    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self).map_err(io::Error::other)
    }
    pub fn from_json<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        serde_json::from_reader(file).map_err(io::Error::other)
    }
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let text = serde_yaml::to_string(self).map_err(io::Error::other)?;
        File::create(path)?.write_all(text.as_bytes())
    }
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        serde_yaml::from_reader(file).map_err(io::Error::other)
    }
    pub fn to_toml<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let text = toml::to_string(self).map_err(io::Error::other)?;
        File::create(path)?.write_all(text.as_bytes())
    }
    pub fn from_toml<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let mut text = String::new();
        File::open(path)?.read_to_string(&mut text)?;
        toml::from_str(&text).map_err(io::Error::other)
    }
    /// Write in the format named by the extension (`.json`, `.yaml`/`.yml`, `.toml`).
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();
        match Format::from_path(path)? {
            Format::Json => self.to_json(path),
            Format::Yaml => self.to_yaml(path),
            Format::Toml => self.to_toml(path),
        }
    }
    /// Read in the format named by the extension and validate the result.
    ///
    /// Out-of-range values surface as [`io::ErrorKind::InvalidData`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        let config = match Format::from_path(path)? {
            Format::Json => Self::from_json(path),
            Format::Yaml => Self::from_yaml(path),
            Format::Toml => Self::from_toml(path),
        }?;
        config
            .validate()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(config)
    }
}
