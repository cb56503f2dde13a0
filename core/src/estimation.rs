//! Offline IMU noise parameter estimation.
//!
//! A stationary recording of each sensor axis is modelled as $\hat x = x + w + b$ with white noise
//! $w$ and a random-walk bias $b(k+1) = b(k) + w_b$. Averaging over longer chunks suppresses the
//! white noise but lets the random walk accumulate, so the spread of successive chunk means is
//! smallest at the chunk size where the two contributions balance. That chunk size yields both
//! deviations:
//!
//! - the white-noise deviation is the root of the mean within-chunk variance,
//! - the bias deviation is the root of the minimal Allan variance.
//!
//! [`ImuParameterEstimation`] runs the search on all six IMU axes and converts the discrete
//! deviations into the continuous-time densities held by [`NoiseParameters`].

use log::{info, warn};
use nalgebra::Vector3;

use crate::error::{PropagationError, Result};
use crate::{ImuSample, NoiseParameters};

/// Statistics of one chunk size
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChunkStatistics {
    pub chunk_size: usize,
    pub chunk_count: usize,
    /// Sample variance of the chunk means
    pub variance_of_chunk_means: f64,
    /// Average of the per-chunk sample variances
    pub mean_of_chunk_variances: f64,
    /// Mean squared difference of successive chunk means, taken about zero rather than about the
    /// mean difference
    pub allan_variance: f64,
}
impl ChunkStatistics {
    fn compute(data: &[f64], chunk_size: usize) -> Result<ChunkStatistics> {
        let chunk_count = data.len() / chunk_size;
        if chunk_count < 2 {
            return Err(PropagationError::InsufficientData {
                chunk_size,
                chunks: chunk_count,
            });
        }
        let mut means = Vec::with_capacity(chunk_count);
        let mut variance_sum = 0.0;
        for chunk in data.chunks_exact(chunk_size) {
            let (mean, variance) = mean_and_sample_variance(chunk);
            means.push(mean);
            variance_sum += variance;
        }
        let (_, variance_of_chunk_means) = mean_and_sample_variance(&means);
        let allan_variance = means
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).powi(2))
            .sum::<f64>()
            / (chunk_count - 1) as f64;
        Ok(ChunkStatistics {
            chunk_size,
            chunk_count,
            variance_of_chunk_means,
            mean_of_chunk_variances: variance_sum / chunk_count as f64,
            allan_variance,
        })
    }
}

fn mean_and_sample_variance(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, variance)
}

/// Outcome of the chunk size search on one scalar series
#[derive(Clone, Debug, PartialEq)]
pub struct AllanVarianceResult {
    /// Chunk size minimising the Allan variance
    pub chunk_size: usize,
    /// Discrete white-noise standard deviation at that chunk size
    pub noise_deviation: f64,
    /// Square root of the minimal Allan variance
    pub allan_deviation: f64,
    /// Statistics of every chunk size examined, ascending
    pub statistics: Vec<ChunkStatistics>,
}

/// Chunk size search over `2..=max_chunk_size`
#[derive(Clone, Copy, Debug)]
pub struct AllanVarianceEstimator {
    max_chunk_size: usize,
}
impl AllanVarianceEstimator {
    /// # Errors
    /// [`PropagationError::InvalidParameter`] if `max_chunk_size < 2`.
    pub fn new(max_chunk_size: usize) -> Result<AllanVarianceEstimator> {
        if max_chunk_size < 2 {
            return Err(PropagationError::InvalidParameter(format!(
                "maximum chunk size must be at least 2, got {max_chunk_size}"
            )));
        }
        Ok(AllanVarianceEstimator { max_chunk_size })
    }
    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }
    /// Split `data` into non-overlapping chunks of every size up to the maximum and keep the size
    /// with the smallest Allan variance. Ties go to the smaller chunk size; trailing samples that
    /// do not fill a whole chunk are ignored.
    ///
    /// # Errors
    /// [`PropagationError::InsufficientData`] if any chunk size yields fewer than two chunks.
    pub fn estimate(&self, data: &[f64]) -> Result<AllanVarianceResult> {
        let statistics = (2..=self.max_chunk_size)
            .map(|size| ChunkStatistics::compute(data, size))
            .collect::<Result<Vec<_>>>()?;

        let mut best = statistics[0];
        for candidate in &statistics[1..] {
            if candidate.allan_variance < best.allan_variance {
                best = *candidate;
            }
        }
        if best.chunk_size == self.max_chunk_size {
            warn!(
                "Allan variance is minimal at the largest chunk size {}; the bias estimate is an upper bound",
                self.max_chunk_size
            );
        }
        Ok(AllanVarianceResult {
            chunk_size: best.chunk_size,
            noise_deviation: best.mean_of_chunk_variances.sqrt(),
            allan_deviation: best.allan_variance.sqrt(),
            statistics,
        })
    }
}

/// Estimates all four noise groups from a stationary IMU recording.
#[derive(Clone, Copy, Debug)]
pub struct ImuParameterEstimation {
    estimator: AllanVarianceEstimator,
}
impl ImuParameterEstimation {
    pub fn new(max_chunk_size: usize) -> Result<ImuParameterEstimation> {
        Ok(ImuParameterEstimation {
            estimator: AllanVarianceEstimator::new(max_chunk_size)?,
        })
    }
    /// Continuous-time noise densities of every gyro and accelerometer axis.
    ///
    /// The discrete deviations are normalised with the mean sample interval `dt`: the white
    /// noise sigma is `noise_deviation * sqrt(dt)` and the bias sigma is
    /// `allan_deviation / sqrt(dt)`.
    ///
    /// # Errors
    /// - [`PropagationError::InsufficientData`] if the recording is too short for the chunk search.
    /// - [`PropagationError::InvalidParameter`] if the timestamps do not advance on average.
    pub fn estimate(&self, samples: &[ImuSample]) -> Result<NoiseParameters> {
        let count = samples.len();
        if count < 2 {
            return Err(PropagationError::InsufficientData {
                chunk_size: 2,
                chunks: count / 2,
            });
        }
        let dt = (samples[count - 1].timestamp() - samples[0].timestamp()) / (count - 1) as f64;
        if !(dt > 0.0) || !dt.is_finite() {
            return Err(PropagationError::InvalidParameter(format!(
                "mean sample interval must be positive, got {dt}"
            )));
        }
        let sqrt_dt = dt.sqrt();
        info!(
            "Estimating IMU noise from {} samples at {:.3} Hz",
            count,
            1.0 / dt
        );

        let mut noise = NoiseParameters::default();
        for axis in 0..3 {
            let gyro: Vec<f64> = samples.iter().map(|s| s.gyro()[axis]).collect();
            let accel: Vec<f64> = samples.iter().map(|s| s.accel()[axis]).collect();
            let gyro_result = self.estimator.estimate(&gyro)?;
            let accel_result = self.estimator.estimate(&accel)?;

            noise.gyro_white[axis] = gyro_result.noise_deviation * sqrt_dt;
            noise.gyro_bias[axis] = gyro_result.allan_deviation / sqrt_dt;
            noise.accel_white[axis] = accel_result.noise_deviation * sqrt_dt;
            noise.accel_bias[axis] = accel_result.allan_deviation / sqrt_dt;
            info!(
                "Axis {axis}: gyro chunk {} white {:e} bias {:e}, accel chunk {} white {:e} bias {:e}",
                gyro_result.chunk_size,
                noise.gyro_white[axis],
                noise.gyro_bias[axis],
                accel_result.chunk_size,
                noise.accel_white[axis],
                noise.accel_bias[axis]
            );
        }
        Ok(noise)
    }
}

/// Per-axis deviations of a stationary recording, mostly for reporting.
pub fn axis_deviations(samples: &[ImuSample]) -> (Vector3<f64>, Vector3<f64>) {
    let mut gyro = Vector3::<f64>::zeros();
    let mut accel = Vector3::<f64>::zeros();
    if samples.len() < 2 {
        return (gyro, accel);
    }
    for axis in 0..3 {
        let g: Vec<f64> = samples.iter().map(|s| s.gyro()[axis]).collect();
        let a: Vec<f64> = samples.iter().map(|s| s.accel()[axis]).collect();
        gyro[axis] = mean_and_sample_variance(&g).1.sqrt();
        accel[axis] = mean_and_sample_variance(&a).1.sqrt();
    }
    (gyro, accel)
}
