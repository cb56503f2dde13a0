//! Inertial propagation toolbox for visual-inertial and multi-state constraint filters
//!
//! This crate provides the prediction half of an error-state inertial navigation filter: given a
//! stream of timestamped gyroscope and accelerometer samples it propagates a 15-dimensional
//! navigation state, its error-state transition matrix (Jacobian), and its covariance between two
//! timestamps. The measurement update (correction) step is deliberately not part of this crate;
//! the propagated state, Jacobian and covariance are intended to be handed to an external fusion
//! stage (camera, feature tracks, or any other aiding source).
//!
//! The crate also provides an offline estimator of the IMU noise parameters (white-noise and
//! bias-instability sigmas) based on Allan-variance style analysis of a stationary recording.
//! These parameters define the continuous-time process-noise matrix used during covariance
//! propagation.
//!
//! This crate is primarily built off of:
//! - [`nalgebra`](https://crates.io/crates/nalgebra): Provides the linear algebra and quaternion types.
//! - [`rand`](https://crates.io/crates/rand) and [`rand_distr`](https://crates.io/crates/rand_distr): Synthetic IMU data generation.
//! - [`serde`](https://crates.io/crates/serde): Configuration files and CSV records.
//!
//! The propagation equations follow _A Multi-State Constraint Kalman Filter for Vision-aided
//! Inertial Navigation_ by Mourikis and Roumeliotis (ICRA 2007) together with _Indirect Kalman
//! Filter for 3D Attitude Estimation_ by Trawny and Roumeliotis. As elsewhere in this crate,
//! variables are named for the quantity they represent rather than the symbol used in the papers.
//!
//! ## Crate overview
//!
//! - [database]: Bounded, time-ordered store of IMU samples and the linear interpolator on top of it.
//! - [quaternion]: Skew-symmetric and quaternion-rate operators and the minimal (3-vector) orientation type.
//! - [equations]: Continuous-time system matrix `F`, noise mapping `G`, and the error-state residual.
//! - [ode]: State, Jacobian, and covariance derivative functions.
//! - [integrator]: Generic classical fourth order Runge-Kutta single-step solver.
//! - [propagator]: Orchestrates sample-interval by sample-interval integration.
//! - [estimation]: Allan-variance noise parameter estimation.
//! - [statistics]: Sliding-window streaming mean and variance.
//! - [config]: File-backed propagation configuration (JSON/YAML/TOML).
//! - [sim]: CSV IMU logs and a synthetic IMU generator.
//!
//! ## State definition
//!
//! The 15-state navigation vector is laid out as
//!
//! $$
//! x = [q_v, b_g, v, b_a, p]
//! $$
//!
//! Where:
//! - $q_v$ is the imaginary part of the body-to-world unit quaternion. The real part is always
//!   reconstructed as $w = \sqrt{1 - \lVert q_v \rVert^2}$ and never stored.
//! - $b_g$ is the gyroscope bias (rad/s).
//! - $v$ is the world-frame velocity (m/s).
//! - $b_a$ is the accelerometer bias (m/s²).
//! - $p$ is the world-frame position (m).
//!
//! ## Propagation equations
//!
//! With bias corrected rates $\hat\omega = \omega_m - b_g$ and specific force $\hat a = a_m - b_a$:
//!
//! $$
//! \dot q = \tfrac{1}{2} \Omega(\hat\omega) q, \quad \dot v = R(q) \hat a + g, \quad \dot p = v, \quad \dot b_g = \dot b_a = 0
//! $$
//!
//! The error state $\delta x = [\delta\theta, \delta b_g, \delta v, \delta b_a, \delta p]$ obeys
//! $\dot{\delta x} = F \delta x + G n$ and the covariance obeys
//!
//! $$
//! \dot P = F P + P F^T + G Q G^T
//! $$
//!
//! The error-state transition matrix $\Phi$ is integrated alongside as $\dot\Phi = F \Phi$.
pub mod config;
pub mod database;
pub mod equations;
pub mod error;
pub mod estimation;
pub mod integrator;
pub mod ode;
pub mod propagator;
pub mod quaternion;
pub mod sim;
pub mod statistics;

use nalgebra::{Matrix3, SMatrix, Vector3};
use serde::{Deserialize, Serialize};

use std::fmt::{self, Display};

pub use crate::database::{ImuDatabase, LinearImuInterpolator};
pub use crate::error::{PropagationError, Result};
pub use crate::propagator::ImuPropagator;

/// A single timestamped IMU reading.
///
/// The rates and specific forces are raw body-frame quantities: gravity is still contained in
/// the accelerometer reading and biases have not been removed. Samples are plain values, copied
/// freely and never mutated after construction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImuSample {
    timestamp: f64,
    gyro: Vector3<f64>,
    accel: Vector3<f64>,
}
impl ImuSample {
    /// Create a sample from a timestamp (s), an angular rate (rad/s) and a specific force (m/s²).
    ///
    /// # Example
    /// ```rust
    /// use inertial::ImuSample;
    /// use nalgebra::Vector3;
    /// let sample = ImuSample::new(
    ///     0.01,
    ///     Vector3::new(0.0, 0.0, 0.1),  // slow yaw
    ///     Vector3::new(0.0, 0.0, 9.81), // resting on a table
    /// );
    /// assert_eq!(sample.timestamp(), 0.01);
    /// ```
    pub fn new(timestamp: f64, gyro: Vector3<f64>, accel: Vector3<f64>) -> ImuSample {
        ImuSample {
            timestamp,
            gyro,
            accel,
        }
    }
    /// Timestamp in seconds
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }
    /// Angular rate in rad/s, body frame x, y, z axis
    pub fn gyro(&self) -> Vector3<f64> {
        self.gyro
    }
    /// Specific force in m/s², body frame x, y, z axis
    pub fn accel(&self) -> Vector3<f64> {
        self.accel
    }
}
impl Display for ImuSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ImuSample {{ t: {:.6} s, gyro: [{:.4}, {:.4}, {:.4}], accel: [{:.4}, {:.4}, {:.4}] }}",
            self.timestamp,
            self.gyro[0],
            self.gyro[1],
            self.gyro[2],
            self.accel[0],
            self.accel[1],
            self.accel[2]
        )
    }
}
impl From<[f64; 7]> for ImuSample {
    /// Builds a sample from `[t, gyro_x, gyro_y, gyro_z, accel_x, accel_y, accel_z]`.
    fn from(values: [f64; 7]) -> Self {
        ImuSample {
            timestamp: values[0],
            gyro: Vector3::new(values[1], values[2], values[3]),
            accel: Vector3::new(values[4], values[5], values[6]),
        }
    }
}
impl From<ImuSample> for [f64; 7] {
    fn from(sample: ImuSample) -> Self {
        [
            sample.timestamp,
            sample.gyro[0],
            sample.gyro[1],
            sample.gyro[2],
            sample.accel[0],
            sample.accel[1],
            sample.accel[2],
        ]
    }
}

/// Continuous-time IMU noise model, one sigma per axis.
///
/// The sensor model is $\hat x = x + w + b$ with $b(k+1) = b(k) + w_b$. The white-noise sigmas
/// are noise densities (rad/s/√Hz and m/s²/√Hz) and the bias sigmas are random-walk densities
/// (rad/s²/√Hz and m/s³/√Hz). Their squares populate the diagonal of the 12×12 process noise
/// matrix in the order gyro white, gyro bias, accel white, accel bias.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseParameters {
    /// Gyroscope white noise (angle random walk)
    pub gyro_white: Vector3<f64>,
    /// Gyroscope bias random walk
    pub gyro_bias: Vector3<f64>,
    /// Accelerometer white noise (velocity random walk)
    pub accel_white: Vector3<f64>,
    /// Accelerometer bias random walk
    pub accel_bias: Vector3<f64>,
}
impl NoiseParameters {
    pub fn new(
        gyro_white: Vector3<f64>,
        gyro_bias: Vector3<f64>,
        accel_white: Vector3<f64>,
        accel_bias: Vector3<f64>,
    ) -> NoiseParameters {
        NoiseParameters {
            gyro_white,
            gyro_bias,
            accel_white,
            accel_bias,
        }
    }
    /// Same sigma on all three axes of each group
    pub fn isotropic(gyro_white: f64, gyro_bias: f64, accel_white: f64, accel_bias: f64) -> Self {
        NoiseParameters {
            gyro_white: Vector3::repeat(gyro_white),
            gyro_bias: Vector3::repeat(gyro_bias),
            accel_white: Vector3::repeat(accel_white),
            accel_bias: Vector3::repeat(accel_bias),
        }
    }
    /// Check that every sigma is finite and non-negative.
    pub fn validate(&self) -> Result<()> {
        let groups = [
            ("gyro_white", &self.gyro_white),
            ("gyro_bias", &self.gyro_bias),
            ("accel_white", &self.accel_white),
            ("accel_bias", &self.accel_bias),
        ];
        for (name, sigmas) in groups {
            if sigmas.iter().any(|s| !s.is_finite() || *s < 0.0) {
                return Err(PropagationError::InvalidParameter(format!(
                    "{name} sigmas must be finite and non-negative, got [{}, {}, {}]",
                    sigmas[0], sigmas[1], sigmas[2]
                )));
            }
        }
        Ok(())
    }
    /// Build the 12×12 diagonal continuous-time process noise matrix Q.
    pub fn process_noise(&self) -> SMatrix<f64, 12, 12> {
        let mut q = SMatrix::<f64, 12, 12>::zeros();
        let groups = [
            self.gyro_white,
            self.gyro_bias,
            self.accel_white,
            self.accel_bias,
        ];
        for (block, sigmas) in groups.iter().enumerate() {
            q.fixed_view_mut::<3, 3>(3 * block, 3 * block)
                .copy_from(&Matrix3::from_diagonal(&sigmas.component_mul(sigmas)));
        }
        q
    }
}
