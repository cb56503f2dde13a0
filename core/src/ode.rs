//! Derivative functions for state, Jacobian and covariance propagation.
//!
//! Each ODE covers one IMU sample interval starting at `t0` and is evaluated at the stages of a
//! single Runge-Kutta step of length `step_size`. Callers guarantee `t0 <= t <= t0 + step_size`.
//! The ODEs borrow the [`ImuDatabase`] through a [`LinearImuInterpolator`]; the borrow checker
//! ties their lifetime to the database, so the database outlives every integration that reads it.
//!
//! The three types share no base type. They meet the integrator through the
//! [`OrdinaryDifferentialEquation`] trait, which is resolved statically.

use std::ops::{Add, Mul};

use nalgebra::{UnitQuaternion, Vector3};

use crate::ImuDatabase;
use crate::database::LinearImuInterpolator;
use crate::equations::{
    ACCEL_BIAS, GYRO_BIAS, ORIENTATION, POSITION, ProcessNoiseMatrix, StateMatrix, StateVector,
    VELOCITY, block, noise_matrix, orientation, system_matrix,
};
use crate::error::{PropagationError, Result};
use crate::quaternion::{omega, slerp};

/// First order ODE `dy/dt = f(t, y)` with a fixed initial value.
pub trait OrdinaryDifferentialEquation {
    /// Quantity being integrated
    type Value: Clone + Add<Output = Self::Value> + Mul<f64, Output = Self::Value>;
    /// Derivative at time `t`. `step_size` is the length of the step being integrated, which
    /// some equations need to locate `t` within the interval.
    fn evaluate(&self, t: f64, y: &Self::Value, step_size: f64) -> Result<Self::Value>;
    fn initial_value(&self) -> &Self::Value;
    fn t0(&self) -> f64;
}

/// Nominal state kinematics
///
/// Quaternion kinematics through Ω(ω), world-frame velocity driven by the rotated specific force
/// plus gravity, and position driven by velocity. Biases are constant.
#[derive(Clone, Debug)]
pub struct StateOde<'a> {
    initial_state: StateVector,
    t0: f64,
    gravity: Vector3<f64>,
    interpolator: LinearImuInterpolator<'a>,
}
impl<'a> StateOde<'a> {
    pub fn new(
        initial_state: StateVector,
        t0: f64,
        gravity: Vector3<f64>,
        database: &'a ImuDatabase,
    ) -> StateOde<'a> {
        StateOde {
            initial_state,
            t0,
            gravity,
            interpolator: LinearImuInterpolator::new(database),
        }
    }
}
impl OrdinaryDifferentialEquation for StateOde<'_> {
    type Value = StateVector;

    fn evaluate(&self, t: f64, y: &StateVector, _step_size: f64) -> Result<StateVector> {
        let sample = self.interpolator.imu_sample_at_time(t)?;
        let q = orientation(y)?;
        let gyro = sample.gyro() - block(y, GYRO_BIAS);
        let accel = sample.accel() - block(y, ACCEL_BIAS);

        let q_dot = 0.5 * omega(&gyro) * q.coords;
        let v_dot = q * accel + self.gravity;

        let mut dx = StateVector::zeros();
        dx.fixed_rows_mut::<3>(ORIENTATION)
            .copy_from(&q_dot.fixed_rows::<3>(0));
        dx.fixed_rows_mut::<3>(VELOCITY).copy_from(&v_dot);
        dx.fixed_rows_mut::<3>(POSITION)
            .copy_from(&block(y, VELOCITY));
        Ok(dx)
    }
    fn initial_value(&self) -> &StateVector {
        &self.initial_state
    }
    fn t0(&self) -> f64 {
        self.t0
    }
}

/// Linearisation point shared by the Jacobian and covariance equations.
///
/// Orientation inside the interval is spherically interpolated between the already known
/// interval endpoints instead of re-solving the state equation at every stage, and the biases
/// are held constant over the interval.
#[derive(Clone, Debug)]
struct Linearization<'a> {
    t0: f64,
    gyro_bias: Vector3<f64>,
    accel_bias: Vector3<f64>,
    start_orientation: UnitQuaternion<f64>,
    end_orientation: UnitQuaternion<f64>,
    interpolator: LinearImuInterpolator<'a>,
}
impl Linearization<'_> {
    fn orientation_at(&self, t: f64, step_size: f64) -> Result<UnitQuaternion<f64>> {
        if !(step_size > 0.0) {
            return Err(PropagationError::DegenerateInterval {
                start: self.t0,
                end: self.t0 + step_size,
            });
        }
        let fraction = (t - self.t0) / step_size;
        Ok(slerp(
            &self.start_orientation,
            &self.end_orientation,
            fraction,
        ))
    }
    fn orientation_and_system(
        &self,
        t: f64,
        step_size: f64,
    ) -> Result<(UnitQuaternion<f64>, StateMatrix)> {
        let q = self.orientation_at(t, step_size)?;
        let sample = self.interpolator.imu_sample_at_time(t)?;
        let f = system_matrix(
            &q,
            &(sample.gyro() - self.gyro_bias),
            &(sample.accel() - self.accel_bias),
        );
        Ok((q, f))
    }
}

/// Error-state transition matrix dynamics `Φ̇ = F Φ`
#[derive(Clone, Debug)]
pub struct JacobianOde<'a> {
    initial_jacobian: StateMatrix,
    linearization: Linearization<'a>,
}
impl<'a> JacobianOde<'a> {
    pub fn new(
        initial_jacobian: StateMatrix,
        t0: f64,
        gyro_bias: Vector3<f64>,
        accel_bias: Vector3<f64>,
        start_orientation: UnitQuaternion<f64>,
        end_orientation: UnitQuaternion<f64>,
        database: &'a ImuDatabase,
    ) -> JacobianOde<'a> {
        JacobianOde {
            initial_jacobian,
            linearization: Linearization {
                t0,
                gyro_bias,
                accel_bias,
                start_orientation,
                end_orientation,
                interpolator: LinearImuInterpolator::new(database),
            },
        }
    }
}
impl OrdinaryDifferentialEquation for JacobianOde<'_> {
    type Value = StateMatrix;

    fn evaluate(&self, t: f64, y: &StateMatrix, step_size: f64) -> Result<StateMatrix> {
        let (_, f) = self.linearization.orientation_and_system(t, step_size)?;
        Ok(f * y)
    }
    fn initial_value(&self) -> &StateMatrix {
        &self.initial_jacobian
    }
    fn t0(&self) -> f64 {
        self.linearization.t0
    }
}

/// Covariance dynamics `Ṗ = F P + P Fᵀ + G Q Gᵀ`
#[derive(Clone, Debug)]
pub struct CovarianceOde<'a> {
    initial_covariance: StateMatrix,
    process_noise: ProcessNoiseMatrix,
    linearization: Linearization<'a>,
}
impl<'a> CovarianceOde<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        initial_covariance: StateMatrix,
        t0: f64,
        gyro_bias: Vector3<f64>,
        accel_bias: Vector3<f64>,
        process_noise: ProcessNoiseMatrix,
        start_orientation: UnitQuaternion<f64>,
        end_orientation: UnitQuaternion<f64>,
        database: &'a ImuDatabase,
    ) -> CovarianceOde<'a> {
        CovarianceOde {
            initial_covariance,
            process_noise,
            linearization: Linearization {
                t0,
                gyro_bias,
                accel_bias,
                start_orientation,
                end_orientation,
                interpolator: LinearImuInterpolator::new(database),
            },
        }
    }
}
impl OrdinaryDifferentialEquation for CovarianceOde<'_> {
    type Value = StateMatrix;

    fn evaluate(&self, t: f64, y: &StateMatrix, step_size: f64) -> Result<StateMatrix> {
        let (q, f) = self.linearization.orientation_and_system(t, step_size)?;
        let g = noise_matrix(&q);
        Ok(f * y + y * f.transpose() + g * self.process_noise * g.transpose())
    }
    fn initial_value(&self) -> &StateMatrix {
        &self.initial_covariance
    }
    fn t0(&self) -> f64 {
        self.linearization.t0
    }
}
