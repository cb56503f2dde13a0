//! Sample-interval by sample-interval propagation of state, Jacobian and covariance.
//!
//! [`ImuPropagator::propagate`] walks every consecutive pair of IMU samples inside the requested
//! window and advances the three quantities with one fourth order Runge-Kutta step per pair:
//!
//! 1. the nominal state through [`StateOde`],
//! 2. the error-state transition matrix Φ through [`JacobianOde`],
//! 3. the covariance P through [`CovarianceOde`].
//!
//! The Jacobian and covariance of a sub-interval are linearised about the orientations at both
//! ends of that sub-interval and the biases at its end, so the state step always runs first.
//! Results chain into the next sub-interval. Φ therefore maps the error state at the first sample
//! to the error state at the last sample of the window.

use log::{debug, trace};
use nalgebra::Vector3;

use crate::config::PropagatorConfig;
use crate::equations::{StateMatrix, StateVector, accel_bias, gyro_bias, orientation, symmetrize};
use crate::error::{PropagationError, Result};
use crate::integrator::RungeKutta4thOrderIntegrator;
use crate::ode::{CovarianceOde, JacobianOde, StateOde};
use crate::{ImuDatabase, NoiseParameters};

/// Inertial prediction engine
///
/// Owns the gravity vector and the continuous-time noise model, and keeps the outputs of the
/// most recent successful [`ImuPropagator::propagate`] call for retrieval through accessors.
/// A single instance must not be propagated and read concurrently; independent instances share
/// nothing.
///
/// # Example
/// ```rust
/// use inertial::{ImuDatabase, ImuPropagator, NoiseParameters};
/// use inertial::ImuSample;
/// use inertial::equations::{StateMatrix, StateVector};
/// use nalgebra::Vector3;
///
/// let mut database = ImuDatabase::new(100).unwrap();
/// for i in 0..=10 {
///     let sample = ImuSample::new(0.1 * i as f64, Vector3::zeros(), Vector3::new(0.0, 0.0, 9.81));
///     database.add_imu_sample(sample).unwrap();
/// }
/// let mut propagator =
///     ImuPropagator::new(Vector3::new(0.0, 0.0, -9.81), NoiseParameters::default()).unwrap();
/// let state = propagator
///     .propagate(0.0, &StateVector::zeros(), &StateMatrix::zeros(), &database, 1.0)
///     .unwrap();
/// assert!(state.norm() < 1e-9);
/// ```
#[derive(Clone, Debug)]
pub struct ImuPropagator {
    gravity: Vector3<f64>,
    noise: NoiseParameters,
    state: StateVector,
    jacobian: StateMatrix,
    covariance: StateMatrix,
    last_timestamp: Option<f64>,
}
impl ImuPropagator {
    /// Create a propagator for a world-frame gravity vector (m/s²) and noise model.
    ///
    /// # Errors
    /// [`PropagationError::InvalidParameter`] if gravity is not finite or a noise sigma is
    /// negative or not finite.
    pub fn new(gravity: Vector3<f64>, noise: NoiseParameters) -> Result<ImuPropagator> {
        if gravity.iter().any(|g| !g.is_finite()) {
            return Err(PropagationError::InvalidParameter(format!(
                "gravity must be finite, got [{}, {}, {}]",
                gravity[0], gravity[1], gravity[2]
            )));
        }
        noise.validate()?;
        Ok(ImuPropagator {
            gravity,
            noise,
            state: StateVector::zeros(),
            jacobian: StateMatrix::identity(),
            covariance: StateMatrix::zeros(),
            last_timestamp: None,
        })
    }
    pub fn from_config(config: &PropagatorConfig) -> Result<ImuPropagator> {
        ImuPropagator::new(config.gravity, config.noise)
    }

    /// Propagate `state0` and `covariance0` across the samples stored in `[t0, t1]`.
    ///
    /// The initial values are taken to hold at the first sample inside the window, and the
    /// returned state holds at the last one (see [`ImuPropagator::last_timestamp`]). No partial
    /// step is taken towards window bounds that fall between samples.
    ///
    /// # Errors
    /// - Range errors of [`ImuDatabase::in_range`].
    /// - [`PropagationError::InsufficientSamples`] if fewer than two samples lie in the window.
    /// - Any interpolation or quaternion reconstruction error raised while integrating.
    ///
    /// On error the accessors keep reporting the previous successful call.
    pub fn propagate(
        &mut self,
        t0: f64,
        state0: &StateVector,
        covariance0: &StateMatrix,
        database: &ImuDatabase,
        t1: f64,
    ) -> Result<StateVector> {
        let samples = database.in_range(t0, t1)?;
        if samples.len() < 2 {
            return Err(PropagationError::InsufficientSamples {
                found: samples.len(),
            });
        }
        let process_noise = self.noise.process_noise();
        debug!(
            "Propagating over [{}, {}] using {} IMU samples",
            samples[0].timestamp(),
            samples[samples.len() - 1].timestamp(),
            samples.len()
        );

        let mut state = *state0;
        let mut jacobian = StateMatrix::identity();
        let mut covariance = *covariance0;
        for pair in samples.windows(2) {
            let start = pair[0].timestamp();
            let step = pair[1].timestamp() - start;

            let state_ode = StateOde::new(state, start, self.gravity, database);
            let next_state = RungeKutta4thOrderIntegrator::new(state_ode).integrate(step)?;
            let start_orientation = orientation(&state)?;
            let end_orientation = orientation(&next_state)?;
            let bg = gyro_bias(&next_state);
            let ba = accel_bias(&next_state);

            let next_jacobian = RungeKutta4thOrderIntegrator::new(JacobianOde::new(
                jacobian,
                start,
                bg,
                ba,
                start_orientation,
                end_orientation,
                database,
            ))
            .integrate(step)?;
            let next_covariance = RungeKutta4thOrderIntegrator::new(CovarianceOde::new(
                covariance,
                start,
                bg,
                ba,
                process_noise,
                start_orientation,
                end_orientation,
                database,
            ))
            .integrate(step)?;
            trace!("Integrated sub-interval [{start}, {}]", start + step);

            state = next_state;
            jacobian = next_jacobian;
            covariance = symmetrize(&next_covariance);
        }

        self.state = state;
        self.jacobian = jacobian;
        self.covariance = covariance;
        self.last_timestamp = Some(samples[samples.len() - 1].timestamp());
        Ok(state)
    }

    /// Cumulative error-state transition matrix of the last propagation
    pub fn jacobian(&self) -> &StateMatrix {
        &self.jacobian
    }
    /// Covariance at the end of the last propagation
    pub fn covariance(&self) -> &StateMatrix {
        &self.covariance
    }
    pub fn state(&self) -> &StateVector {
        &self.state
    }
    /// Timestamp of the last sample consumed, `None` before the first successful propagation
    pub fn last_timestamp(&self) -> Option<f64> {
        self.last_timestamp
    }
    pub fn gravity(&self) -> &Vector3<f64> {
        &self.gravity
    }
    pub fn noise(&self) -> &NoiseParameters {
        &self.noise
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ImuSample;
    use crate::equations::{POSITION, VELOCITY};
    use assert_approx_eq::assert_approx_eq;

    fn constant_database(
        t_start: f64,
        count: usize,
        dt: f64,
        gyro: Vector3<f64>,
        accel: Vector3<f64>,
    ) -> ImuDatabase {
        let mut db = ImuDatabase::new(count.max(2)).unwrap();
        for i in 0..count {
            db.add_imu_sample(ImuSample::new(t_start + dt * i as f64, gyro, accel))
                .unwrap();
        }
        db
    }

    #[test]
    fn rejects_invalid_construction() {
        let gravity = Vector3::new(0.0, f64::NAN, 0.0);
        assert!(ImuPropagator::new(gravity, NoiseParameters::default()).is_err());
        let noise = NoiseParameters::isotropic(-1.0, 0.0, 0.0, 0.0);
        assert!(matches!(
            ImuPropagator::new(Vector3::zeros(), noise),
            Err(PropagationError::InvalidParameter(_))
        ));
    }
    #[test]
    fn initial_accessors() {
        let propagator =
            ImuPropagator::new(Vector3::new(0.0, 0.0, -9.81), NoiseParameters::default()).unwrap();
        assert_eq!(propagator.last_timestamp(), None);
        assert_eq!(propagator.jacobian(), &StateMatrix::identity());
        assert_eq!(propagator.covariance(), &StateMatrix::zeros());
        assert_eq!(propagator.state(), &StateVector::zeros());
        assert_eq!(propagator.gravity()[2], -9.81);
    }
    #[test]
    fn from_config_uses_gravity_and_noise() {
        let config = PropagatorConfig {
            gravity: Vector3::new(0.0, 0.0, -9.8),
            noise: NoiseParameters::isotropic(0.1, 0.2, 0.3, 0.4),
            ..Default::default()
        };
        let propagator = ImuPropagator::from_config(&config).unwrap();
        assert_eq!(propagator.gravity(), &config.gravity);
        assert_eq!(propagator.noise(), &config.noise);
    }
    #[test]
    fn too_few_samples_in_window() {
        let db = constant_database(0.0, 5, 1.0, Vector3::zeros(), Vector3::zeros());
        let mut propagator = ImuPropagator::new(Vector3::zeros(), NoiseParameters::default()).unwrap();
        let result = propagator.propagate(
            1.5,
            &StateVector::zeros(),
            &StateMatrix::zeros(),
            &db,
            2.5,
        );
        assert_eq!(result, Err(PropagationError::InsufficientSamples { found: 1 }));
        let result = propagator.propagate(
            1.2,
            &StateVector::zeros(),
            &StateMatrix::zeros(),
            &db,
            1.8,
        );
        assert_eq!(result, Err(PropagationError::InsufficientSamples { found: 0 }));
    }
    #[test]
    fn coverage_errors_are_propagated() {
        let db = constant_database(1.0, 5, 1.0, Vector3::zeros(), Vector3::zeros());
        let mut propagator = ImuPropagator::new(Vector3::zeros(), NoiseParameters::default()).unwrap();
        let x = StateVector::zeros();
        let p = StateMatrix::zeros();
        assert!(matches!(
            propagator.propagate(0.5, &x, &p, &db, 3.0),
            Err(PropagationError::TimeNotCovered { .. })
        ));
        assert!(matches!(
            propagator.propagate(3.0, &x, &p, &db, 3.0),
            Err(PropagationError::DegenerateInterval { .. })
        ));
        let empty = ImuDatabase::new(4).unwrap();
        assert_eq!(
            propagator.propagate(0.0, &x, &p, &empty, 1.0),
            Err(PropagationError::EmptyDatabase)
        );
    }
    #[test]
    fn window_aligns_to_samples() {
        let accel = Vector3::new(2.0, 0.0, 0.0);
        let db = constant_database(0.0, 11, 0.1, Vector3::zeros(), accel);
        let mut propagator = ImuPropagator::new(Vector3::zeros(), NoiseParameters::default()).unwrap();
        let x = propagator
            .propagate(0.25, &StateVector::zeros(), &StateMatrix::zeros(), &db, 0.83)
            .unwrap();
        // samples 0.3 ..= 0.8 are used, 0.5 s of motion
        assert_approx_eq!(propagator.last_timestamp().unwrap(), 0.8, 1e-12);
        assert_approx_eq!(x[VELOCITY], 1.0, 1e-12);
        assert_approx_eq!(x[POSITION], 0.25, 1e-12);
        assert_eq!(propagator.state(), &x);
    }
    #[test]
    fn failed_call_keeps_previous_results() {
        let db = constant_database(0.0, 11, 0.1, Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0));
        let mut propagator = ImuPropagator::new(Vector3::zeros(), NoiseParameters::default()).unwrap();
        let good = propagator
            .propagate(0.0, &StateVector::zeros(), &StateMatrix::zeros(), &db, 1.0)
            .unwrap();
        let jacobian = *propagator.jacobian();

        let mut corrupt = StateVector::zeros();
        corrupt[0] = 1.5;
        assert!(matches!(
            propagator.propagate(0.0, &corrupt, &StateMatrix::zeros(), &db, 1.0),
            Err(PropagationError::InvalidQuaternion { .. })
        ));
        assert_eq!(propagator.state(), &good);
        assert_eq!(propagator.jacobian(), &jacobian);
        assert_approx_eq!(propagator.last_timestamp().unwrap(), 1.0, 1e-12);
    }
    #[test]
    fn covariance_stays_symmetric() {
        let db = constant_database(
            0.0,
            21,
            0.05,
            Vector3::new(0.3, -0.2, 0.5),
            Vector3::new(0.4, 0.1, 9.7),
        );
        let mut propagator = ImuPropagator::new(
            Vector3::new(0.0, 0.0, -9.81),
            NoiseParameters::isotropic(0.01, 0.001, 0.1, 0.01),
        )
        .unwrap();
        let mut p0 = StateMatrix::identity() * 1e-4;
        p0[(0, 6)] = 1e-5;
        p0[(6, 0)] = 1e-5;
        propagator
            .propagate(0.0, &StateVector::zeros(), &p0, &db, 1.0)
            .unwrap();
        let p = propagator.covariance();
        assert_eq!(p, &p.transpose());
        for i in 0..15 {
            assert!(p[(i, i)] >= p0[(i, i)]);
        }
    }
}
