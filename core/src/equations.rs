//! Continuous-time error-state propagation equations.
//!
//! The error state is ordered like the navigation state,
//!
//! ```text
//! δx = [δθ, δb_g, δv, δb_a, δp]
//! ```
//!
//! where `δθ` is the small body-frame rotation error with `q_true = q ⊗ δq` and
//! `δq ≈ [½ δθ, 1]`. Its dynamics are `δẋ = F δx + G n` with the noise vector ordered as
//! `n = [n_g, n_wg, n_a, n_wa]` (gyro white, gyro bias walk, accel white, accel bias walk).
//!
//! # References
//! - Mourikis and Roumeliotis, _A Multi-State Constraint Kalman Filter for Vision-aided Inertial
//!   Navigation_, ICRA 2007, Section III-B.
//! - Trawny and Roumeliotis, _Indirect Kalman Filter for 3D Attitude Estimation_, 2005.

use nalgebra::{Matrix3, SMatrix, SVector, UnitQuaternion, Vector3};

use crate::error::Result;
use crate::quaternion::{MinimalQuaternion, skew};

/// Dimension of the navigation (and error) state
pub const STATE_SIZE: usize = 15;
/// Dimension of the driving noise vector
pub const NOISE_SIZE: usize = 12;

/// Start of the quaternion imaginary part (orientation error in error-state terms)
pub const ORIENTATION: usize = 0;
/// Start of the gyroscope bias block
pub const GYRO_BIAS: usize = 3;
/// Start of the velocity block
pub const VELOCITY: usize = 6;
/// Start of the accelerometer bias block
pub const ACCEL_BIAS: usize = 9;
/// Start of the position block
pub const POSITION: usize = 12;

pub type StateVector = SVector<f64, STATE_SIZE>;
pub type StateMatrix = SMatrix<f64, STATE_SIZE, STATE_SIZE>;
pub type NoiseMatrix = SMatrix<f64, STATE_SIZE, NOISE_SIZE>;
pub type ProcessNoiseMatrix = SMatrix<f64, NOISE_SIZE, NOISE_SIZE>;

/// Assemble a state vector from its components.
pub fn compose_state(
    orientation: &UnitQuaternion<f64>,
    gyro_bias: &Vector3<f64>,
    velocity: &Vector3<f64>,
    accel_bias: &Vector3<f64>,
    position: &Vector3<f64>,
) -> StateVector {
    let mut x = StateVector::zeros();
    x.fixed_rows_mut::<3>(ORIENTATION)
        .copy_from(&MinimalQuaternion::from_quaternion(orientation).imaginary());
    x.fixed_rows_mut::<3>(GYRO_BIAS).copy_from(gyro_bias);
    x.fixed_rows_mut::<3>(VELOCITY).copy_from(velocity);
    x.fixed_rows_mut::<3>(ACCEL_BIAS).copy_from(accel_bias);
    x.fixed_rows_mut::<3>(POSITION).copy_from(position);
    x
}
/// Three-element slice of the state starting at `start`
pub fn block(x: &StateVector, start: usize) -> Vector3<f64> {
    x.fixed_rows::<3>(start).into_owned()
}
/// Reconstruct the body-to-world orientation of a state vector.
///
/// # Errors
/// [`crate::PropagationError::InvalidQuaternion`] if the stored imaginary part has norm above one.
pub fn orientation(x: &StateVector) -> Result<UnitQuaternion<f64>> {
    Ok(minimal_orientation(x)?.to_quaternion())
}
/// Validated minimal orientation of a state vector.
pub fn minimal_orientation(x: &StateVector) -> Result<MinimalQuaternion> {
    MinimalQuaternion::new(block(x, ORIENTATION))
}
pub fn gyro_bias(x: &StateVector) -> Vector3<f64> {
    block(x, GYRO_BIAS)
}
pub fn velocity(x: &StateVector) -> Vector3<f64> {
    block(x, VELOCITY)
}
pub fn accel_bias(x: &StateVector) -> Vector3<f64> {
    block(x, ACCEL_BIAS)
}
pub fn position(x: &StateVector) -> Vector3<f64> {
    block(x, POSITION)
}

/// Continuous-time system matrix F of the error-state dynamics
///
/// # Arguments
/// * `orientation` - Current body-to-world orientation.
/// * `gyro` - Bias-corrected angular rate (rad/s, body frame).
/// * `accel` - Bias-corrected specific force (m/s², body frame).
///
/// # Returns
/// The 15×15 matrix with the non-zero blocks
///
/// | row \ column | δθ            | δb_g | δv | δb_a  |
/// |--------------|---------------|------|----|-------|
/// | δθ̇           | -[ω]×         | -I   |    |       |
/// | δv̇           | -R(q) [a]×    |      |    | -R(q) |
/// | δṗ           |               |      | I  |       |
pub fn system_matrix(
    orientation: &UnitQuaternion<f64>,
    gyro: &Vector3<f64>,
    accel: &Vector3<f64>,
) -> StateMatrix {
    let rotation = orientation.to_rotation_matrix().into_inner();
    let mut f = StateMatrix::zeros();
    f.fixed_view_mut::<3, 3>(ORIENTATION, ORIENTATION)
        .copy_from(&(-skew(gyro)));
    f.fixed_view_mut::<3, 3>(ORIENTATION, GYRO_BIAS)
        .copy_from(&(-Matrix3::identity()));
    f.fixed_view_mut::<3, 3>(VELOCITY, ORIENTATION)
        .copy_from(&(-rotation * skew(accel)));
    f.fixed_view_mut::<3, 3>(VELOCITY, ACCEL_BIAS)
        .copy_from(&(-rotation));
    f.fixed_view_mut::<3, 3>(POSITION, VELOCITY)
        .copy_from(&Matrix3::identity());
    f
}

/// Noise mapping matrix G
///
/// Places gyro white noise (`-I`), gyro bias walk (`I`), accel white noise (`-R(q)`) and accel
/// bias walk (`I`) onto the orientation, gyro bias, velocity and accel bias error rates.
pub fn noise_matrix(orientation: &UnitQuaternion<f64>) -> NoiseMatrix {
    let rotation = orientation.to_rotation_matrix().into_inner();
    let mut g = NoiseMatrix::zeros();
    g.fixed_view_mut::<3, 3>(ORIENTATION, 0)
        .copy_from(&(-Matrix3::identity()));
    g.fixed_view_mut::<3, 3>(GYRO_BIAS, 3)
        .copy_from(&Matrix3::identity());
    g.fixed_view_mut::<3, 3>(VELOCITY, 6).copy_from(&(-rotation));
    g.fixed_view_mut::<3, 3>(ACCEL_BIAS, 9)
        .copy_from(&Matrix3::identity());
    g
}

/// Error-state difference `left ⊖ right`
///
/// Element-wise difference of the two state vectors, with the orientation block scaled by two
/// because the stored quaternion imaginary part is a half-angle quantity.
pub fn residual(left: &StateVector, right: &StateVector) -> StateVector {
    let mut r = left - right;
    r.fixed_rows_mut::<3>(ORIENTATION).scale_mut(2.0);
    r
}

/// Symmetrize a matrix: P ← 0.5 (P + Pᵀ)
#[inline]
pub fn symmetrize(m: &StateMatrix) -> StateMatrix {
    0.5 * (m + m.transpose())
}
