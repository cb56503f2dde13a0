//! IMU logs on disk and synthetic IMU data.
//!
//! This module provides:
//! - [`ImuRecord`], one row of an IMU CSV log with the columns
//!   `time, gyro_x, gyro_y, gyro_z, accel_x, accel_y, accel_z`
//! - [`SyntheticImu`], a seeded generator of noisy readings for a body with constant angular rate
//!   and specific force, following the same white noise plus bias random walk model the noise
//!   estimator assumes
use std::io;
use std::path::Path;

use nalgebra::Vector3;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::error::{PropagationError, Result};
use crate::{ImuSample, NoiseParameters};

/// One row of an IMU log. Times are in seconds, rates in rad/s, specific forces in m/s².
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImuRecord {
    pub time: f64,
    pub gyro_x: f64,
    pub gyro_y: f64,
    pub gyro_z: f64,
    pub accel_x: f64,
    pub accel_y: f64,
    pub accel_z: f64,
}
impl ImuRecord {
    /// Read every row of a CSV log with a header line.
    ///
    /// ```no_run
    /// use inertial::sim::ImuRecord;
    ///
    /// let records = ImuRecord::from_csv("./data/stationary.csv").unwrap();
    /// println!("Loaded {} records", records.len());
    /// ```
    pub fn from_csv<P: AsRef<Path>>(path: P) -> csv::Result<Vec<Self>> {
        let mut reader = csv::Reader::from_path(path)?;
        reader.deserialize().collect()
    }
    pub fn to_csv<P: AsRef<Path>>(records: &[Self], path: P) -> io::Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()
    }
}
impl From<ImuSample> for ImuRecord {
    fn from(sample: ImuSample) -> Self {
        let gyro = sample.gyro();
        let accel = sample.accel();
        ImuRecord {
            time: sample.timestamp(),
            gyro_x: gyro[0],
            gyro_y: gyro[1],
            gyro_z: gyro[2],
            accel_x: accel[0],
            accel_y: accel[1],
            accel_z: accel[2],
        }
    }
}
impl From<ImuRecord> for ImuSample {
    fn from(record: ImuRecord) -> Self {
        ImuSample::new(
            record.time,
            Vector3::new(record.gyro_x, record.gyro_y, record.gyro_z),
            Vector3::new(record.accel_x, record.accel_y, record.accel_z),
        )
    }
}

/// Generator of noisy IMU readings at a fixed rate.
///
/// Noise sigmas are continuous-time densities as in [`NoiseParameters`]. At sample interval `dt`
/// each reading carries white noise with deviation `σ_w / sqrt(dt)` and each bias advances by a
/// step with deviation `σ_b * sqrt(dt)`. Biases start at zero.
#[derive(Clone, Debug)]
pub struct SyntheticImu {
    pub rate_hz: f64,
    pub noise: NoiseParameters,
    /// True body angular rate (rad/s)
    pub angular_rate: Vector3<f64>,
    /// True specific force (m/s²)
    pub specific_force: Vector3<f64>,
    pub seed: u64,
}
impl Default for SyntheticImu {
    /// 100 Hz, noiseless, level and at rest under standard gravity
    fn default() -> Self {
        SyntheticImu {
            rate_hz: 100.0,
            noise: NoiseParameters::default(),
            angular_rate: Vector3::zeros(),
            specific_force: Vector3::new(0.0, 0.0, 9.81),
            seed: 42,
        }
    }
}
impl SyntheticImu {
    /// Generate `count` samples starting at time zero.
    ///
    /// # Errors
    /// [`PropagationError::InvalidParameter`] for a non-positive rate or an invalid noise sigma.
    pub fn generate(&self, count: usize) -> Result<Vec<ImuSample>> {
        if !(self.rate_hz > 0.0) || !self.rate_hz.is_finite() {
            return Err(PropagationError::InvalidParameter(format!(
                "sample rate must be positive, got {}",
                self.rate_hz
            )));
        }
        self.noise.validate()?;
        let dt = 1.0 / self.rate_hz;
        let sqrt_dt = dt.sqrt();
        let standard = Normal::new(0.0, 1.0)
            .map_err(|e| PropagationError::InvalidParameter(e.to_string()))?;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut gyro_bias = Vector3::<f64>::zeros();
        let mut accel_bias = Vector3::<f64>::zeros();
        let mut samples = Vec::with_capacity(count);
        for i in 0..count {
            let mut gyro = self.angular_rate + gyro_bias;
            let mut accel = self.specific_force + accel_bias;
            for axis in 0..3 {
                gyro[axis] += self.noise.gyro_white[axis] / sqrt_dt * standard.sample(&mut rng);
                accel[axis] += self.noise.accel_white[axis] / sqrt_dt * standard.sample(&mut rng);
                gyro_bias[axis] += self.noise.gyro_bias[axis] * sqrt_dt * standard.sample(&mut rng);
                accel_bias[axis] +=
                    self.noise.accel_bias[axis] * sqrt_dt * standard.sample(&mut rng);
            }
            samples.push(ImuSample::new(i as f64 * dt, gyro, accel));
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use tempfile::tempdir;

    #[test]
    fn csv_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("imu.csv");
        let records: Vec<ImuRecord> = (0..5)
            .map(|i| {
                let t = i as f64 * 0.005;
                ImuRecord::from(ImuSample::new(
                    t,
                    Vector3::new(0.1 * t, -0.2, 0.3),
                    Vector3::new(0.0, 0.25, 9.81 + t),
                ))
            })
            .collect();
        ImuRecord::to_csv(&records, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("time,gyro_x,gyro_y,gyro_z,accel_x,accel_y,accel_z"));
        let read = ImuRecord::from_csv(&path).unwrap();
        assert_eq!(read, records);
        let sample = ImuSample::from(read[4]);
        assert_eq!(sample.timestamp(), 0.02);
        assert_eq!(sample.accel()[2], 9.81 + 0.02);
    }
    #[test]
    fn missing_file_is_an_error() {
        assert!(ImuRecord::from_csv("does/not/exist.csv").is_err());
    }
    #[test]
    fn malformed_row_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.csv");
        std::fs::write(
            &path,
            "time,gyro_x,gyro_y,gyro_z,accel_x,accel_y,accel_z\n0.0,0,0,0,0,0,oops\n",
        )
        .unwrap();
        assert!(ImuRecord::from_csv(&path).is_err());
    }
    #[test]
    fn noiseless_generator_reproduces_truth() {
        let imu = SyntheticImu {
            rate_hz: 200.0,
            angular_rate: Vector3::new(0.0, 0.0, 0.5),
            ..Default::default()
        };
        let samples = imu.generate(4).unwrap();
        assert_eq!(samples.len(), 4);
        assert_approx_eq!(samples[3].timestamp(), 0.015, 1e-15);
        for sample in samples {
            assert_eq!(sample.gyro(), Vector3::new(0.0, 0.0, 0.5));
            assert_eq!(sample.accel(), Vector3::new(0.0, 0.0, 9.81));
        }
    }
    #[test]
    fn generator_is_seeded() {
        let imu = SyntheticImu {
            noise: NoiseParameters::isotropic(0.01, 0.001, 0.05, 0.005),
            seed: 9,
            ..Default::default()
        };
        assert_eq!(imu.generate(100).unwrap(), imu.generate(100).unwrap());
        let other = SyntheticImu { seed: 10, ..imu.clone() };
        assert_ne!(imu.generate(100).unwrap(), other.generate(100).unwrap());
    }
    #[test]
    fn white_noise_scales_with_rate() {
        let imu = SyntheticImu {
            rate_hz: 400.0,
            noise: NoiseParameters::isotropic(0.002, 0.0, 0.0, 0.0),
            ..Default::default()
        };
        let samples = imu.generate(40_000).unwrap();
        let values: Vec<f64> = samples.iter().map(|s| s.gyro()[1]).collect();
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let variance =
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
        // 0.002 rad/s/√Hz at 400 Hz is 0.04 rad/s per sample
        assert!((variance.sqrt() - 0.04).abs() < 0.04 * 0.03);
    }
    #[test]
    fn rejects_bad_rate() {
        let imu = SyntheticImu {
            rate_hz: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            imu.generate(10),
            Err(PropagationError::InvalidParameter(_))
        ));
    }
}
