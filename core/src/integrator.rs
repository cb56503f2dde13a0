//! Single-step explicit Runge-Kutta integration.

use log::trace;

use crate::error::{PropagationError, Result};
use crate::ode::OrdinaryDifferentialEquation;

/// Classical fourth order Runge-Kutta integrator over one step.
///
/// Generic over any [`OrdinaryDifferentialEquation`], so the same code advances the 15-element
/// state, the 15×15 transition matrix and the 15×15 covariance.
///
/// $$
/// \begin{aligned}
/// k_1 &= f(t_0, y_0) \\\\
/// k_2 &= f(t_0 + h/2, y_0 + k_1 h/2) \\\\
/// k_3 &= f(t_0 + h/2, y_0 + k_2 h/2) \\\\
/// k_4 &= f(t_0 + h, y_0 + k_3 h) \\\\
/// y_1 &= y_0 + \frac{h}{6}(k_1 + 2 k_2 + 2 k_3 + k_4)
/// \end{aligned}
/// $$
#[derive(Clone, Debug)]
pub struct RungeKutta4thOrderIntegrator<O: OrdinaryDifferentialEquation> {
    ode: O,
}
impl<O: OrdinaryDifferentialEquation> RungeKutta4thOrderIntegrator<O> {
    pub fn new(ode: O) -> RungeKutta4thOrderIntegrator<O> {
        RungeKutta4thOrderIntegrator { ode }
    }
    pub fn ode(&self) -> &O {
        &self.ode
    }
    /// Advance the initial value of the ODE by one step of length `step_size`.
    ///
    /// # Errors
    /// [`PropagationError::DegenerateInterval`] for a non-positive step, or whatever the ODE
    /// reports at one of its stages.
    pub fn integrate(&self, step_size: f64) -> Result<O::Value> {
        let t0 = self.ode.t0();
        if !(step_size > 0.0) {
            return Err(PropagationError::DegenerateInterval {
                start: t0,
                end: t0 + step_size,
            });
        }
        let h = step_size;
        let half = 0.5 * h;
        let y0 = self.ode.initial_value();

        let k1 = self.ode.evaluate(t0, y0, h)?;
        let k2 = self
            .ode
            .evaluate(t0 + half, &(y0.clone() + k1.clone() * half), h)?;
        let k3 = self
            .ode
            .evaluate(t0 + half, &(y0.clone() + k2.clone() * half), h)?;
        let k4 = self.ode.evaluate(t0 + h, &(y0.clone() + k3.clone() * h), h)?;
        trace!("RK4 step from t = {t0} with h = {h}");

        Ok(y0.clone() + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (h / 6.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use nalgebra::Vector2;

    /// dy/dt = λ y
    struct Exponential {
        rate: f64,
        y0: f64,
        t0: f64,
    }
    impl OrdinaryDifferentialEquation for Exponential {
        type Value = f64;
        fn evaluate(&self, _t: f64, y: &f64, _step_size: f64) -> Result<f64> {
            Ok(self.rate * y)
        }
        fn initial_value(&self) -> &f64 {
            &self.y0
        }
        fn t0(&self) -> f64 {
            self.t0
        }
    }

    /// dy/dt = t³, y independent
    struct Cubic {
        y0: f64,
    }
    impl OrdinaryDifferentialEquation for Cubic {
        type Value = f64;
        fn evaluate(&self, t: f64, _y: &f64, _step_size: f64) -> Result<f64> {
            Ok(t.powi(3))
        }
        fn initial_value(&self) -> &f64 {
            &self.y0
        }
        fn t0(&self) -> f64 {
            0.0
        }
    }

    /// Harmonic oscillator x'' = -x as a first order system
    struct Oscillator {
        y0: Vector2<f64>,
    }
    impl OrdinaryDifferentialEquation for Oscillator {
        type Value = Vector2<f64>;
        fn evaluate(&self, _t: f64, y: &Vector2<f64>, _step_size: f64) -> Result<Vector2<f64>> {
            Ok(Vector2::new(y[1], -y[0]))
        }
        fn initial_value(&self) -> &Vector2<f64> {
            &self.y0
        }
        fn t0(&self) -> f64 {
            0.0
        }
    }

    struct Failing;
    impl OrdinaryDifferentialEquation for Failing {
        type Value = f64;
        fn evaluate(&self, t: f64, _y: &f64, _step_size: f64) -> Result<f64> {
            Err(PropagationError::TimeNotCovered {
                time: t,
                oldest: 0.0,
                newest: 0.0,
            })
        }
        fn initial_value(&self) -> &f64 {
            &0.0
        }
        fn t0(&self) -> f64 {
            1.0
        }
    }

    #[test]
    fn exact_for_cubic_integrand() {
        let integrator = RungeKutta4thOrderIntegrator::new(Cubic { y0: 2.0 });
        assert_approx_eq!(integrator.integrate(1.0).unwrap(), 2.25, 1e-14);
        assert_approx_eq!(integrator.integrate(2.0).unwrap(), 6.0, 1e-12);
    }
    #[test]
    fn exponential_growth_accuracy() {
        let integrator = RungeKutta4thOrderIntegrator::new(Exponential {
            rate: 1.0,
            y0: 3.0,
            t0: 5.0,
        });
        let y = integrator.integrate(0.1).unwrap();
        // local truncation error is O(h⁵)
        assert_approx_eq!(y, 3.0 * 0.1_f64.exp(), 1e-6);
        assert_eq!(integrator.ode().t0(), 5.0);
    }
    #[test]
    fn oscillator_step_matches_taylor_expansion() {
        let integrator = RungeKutta4thOrderIntegrator::new(Oscillator {
            y0: Vector2::new(1.0, 0.0),
        });
        let y = integrator.integrate(0.05).unwrap();
        // one step reproduces the Taylor expansion of the exact solution through h⁴
        let h: f64 = 0.05;
        assert_approx_eq!(y[0], 1.0 - h.powi(2) / 2.0 + h.powi(4) / 24.0, 1e-14);
        assert_approx_eq!(y[1], -h + h.powi(3) / 6.0, 1e-14);
        // local error is about h⁵/120
        assert_approx_eq!(y[0], h.cos(), 1e-8);
        assert_approx_eq!(y[1], -h.sin(), 1e-8);
    }
    #[test]
    fn propagates_stage_errors() {
        let integrator = RungeKutta4thOrderIntegrator::new(Failing);
        assert!(matches!(
            integrator.integrate(0.1),
            Err(PropagationError::TimeNotCovered { time, .. }) if time == 1.0
        ));
    }
    #[test]
    fn rejects_non_positive_step() {
        let integrator = RungeKutta4thOrderIntegrator::new(Cubic { y0: 0.0 });
        assert!(integrator.integrate(0.0).is_err());
        assert!(integrator.integrate(-0.1).is_err());
        assert!(integrator.integrate(f64::NAN).is_err());
    }
}
