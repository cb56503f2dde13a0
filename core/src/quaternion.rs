//! Orientation helpers for the minimal quaternion representation.
//!
//! The navigation state only stores the imaginary (vector) part of the body-to-world unit
//! quaternion. The scalar part is reconstructed on demand, which avoids carrying a redundant
//! fourth component that would drift off the unit sphere. Reconstruction is fallible: an
//! imaginary part with norm above one has no real solution and signals a corrupted state.
//!
//! Quaternion coefficients follow the `nalgebra` storage order `[x, y, z, w]` and the Hamilton
//! product convention.

use nalgebra::{Matrix3, Matrix4, Quaternion, UnitQuaternion, Vector3};

use crate::error::{PropagationError, Result};

/// Convert a three-element vector to a skew-symmetric (cross product) matrix
///
/// $$
/// x = \begin{bmatrix} a \\\\ b \\\\ c \end{bmatrix} \rightarrow X = \begin{bmatrix} 0 & -c & b \\\\ c & 0 & -a \\\\ -b & a & 0 \end{bmatrix}
/// $$
///
/// # Example
/// ```rust
/// use nalgebra::Vector3;
/// use inertial::quaternion::skew;
/// let a = Vector3::new(1.0, 2.0, 3.0);
/// let b = Vector3::new(-4.0, 0.5, 2.0);
/// assert!((skew(&a) * b - a.cross(&b)).norm() < 1e-12);
/// ```
pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    let mut skew: Matrix3<f64> = Matrix3::zeros();
    skew[(0, 1)] = -v[2];
    skew[(0, 2)] = v[1];
    skew[(1, 0)] = v[2];
    skew[(1, 2)] = -v[0];
    skew[(2, 0)] = -v[1];
    skew[(2, 1)] = v[0];
    skew
}

/// Quaternion kinematics operator Ω(ω) such that $\dot q = \frac{1}{2} \Omega(\omega) q$
///
/// `omega` is the body-frame angular rate. With the coefficient order `[x, y, z, w]`:
///
/// $$
/// \Omega(\omega) = \begin{bmatrix} -[\omega]_\times & \omega \\\\ -\omega^T & 0 \end{bmatrix}
/// $$
///
/// which is the matrix form of the right multiplication $q \otimes [\omega, 0]$.
pub fn omega(omega: &Vector3<f64>) -> Matrix4<f64> {
    let mut m = Matrix4::zeros();
    m.fixed_view_mut::<3, 3>(0, 0).copy_from(&(-skew(omega)));
    m.fixed_view_mut::<3, 1>(0, 3).copy_from(omega);
    m.fixed_view_mut::<1, 3>(3, 0).copy_from(&(-omega.transpose()));
    m
}

/// Reconstruct a unit quaternion from its imaginary part.
///
/// The real part is taken as the non-negative root $w = \sqrt{1 - \lVert v \rVert^2}$.
///
/// # Errors
/// [`PropagationError::InvalidQuaternion`] if $\lVert v \rVert > 1$ or `v` is not finite.
pub fn quaternion_from_imaginary(v: &Vector3<f64>) -> Result<UnitQuaternion<f64>> {
    let norm_squared = v.norm_squared();
    if !(norm_squared <= 1.0) {
        return Err(PropagationError::InvalidQuaternion {
            norm: norm_squared.sqrt(),
        });
    }
    let w = (1.0 - norm_squared).sqrt();
    Ok(UnitQuaternion::new_unchecked(Quaternion::new(
        w, v[0], v[1], v[2],
    )))
}

/// Spherical linear interpolation between two unit quaternions along the shortest arc.
///
/// `fraction` runs from 0 (`start`) to 1 (`end`). Nearly parallel inputs fall back to a
/// normalised linear blend, where the spherical weights become ill-conditioned.
pub fn slerp(
    start: &UnitQuaternion<f64>,
    end: &UnitQuaternion<f64>,
    fraction: f64,
) -> UnitQuaternion<f64> {
    let mut dot = start.coords.dot(&end.coords);
    let end_coords = if dot < 0.0 {
        dot = -dot;
        -end.coords
    } else {
        end.coords
    };
    if dot > 0.9995 {
        let blended = start.coords * (1.0 - fraction) + end_coords * fraction;
        return UnitQuaternion::from_quaternion(Quaternion::from(blended));
    }
    let theta = dot.clamp(-1.0, 1.0).acos();
    let sin_theta = theta.sin();
    let weight_start = ((1.0 - fraction) * theta).sin() / sin_theta;
    let weight_end = (fraction * theta).sin() / sin_theta;
    UnitQuaternion::from_quaternion(Quaternion::from(
        start.coords * weight_start + end_coords * weight_end,
    ))
}

/// Orientation stored as the imaginary part of a unit quaternion.
///
/// This is the value type behind the first three entries of the navigation state. It is only
/// constructed through validating constructors, so [`MinimalQuaternion::to_quaternion`] cannot
/// fail once a value exists.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MinimalQuaternion {
    imaginary: Vector3<f64>,
}
impl Default for MinimalQuaternion {
    fn default() -> Self {
        Self::identity()
    }
}
impl MinimalQuaternion {
    /// Validate and wrap an imaginary part.
    ///
    /// # Errors
    /// [`PropagationError::InvalidQuaternion`] if the norm exceeds one.
    pub fn new(imaginary: Vector3<f64>) -> Result<MinimalQuaternion> {
        quaternion_from_imaginary(&imaginary)?;
        Ok(MinimalQuaternion { imaginary })
    }
    pub fn identity() -> MinimalQuaternion {
        MinimalQuaternion {
            imaginary: Vector3::zeros(),
        }
    }
    /// Minimal form of a full quaternion. The sign is chosen so the real part is non-negative,
    /// which keeps the reconstruction unambiguous.
    pub fn from_quaternion(q: &UnitQuaternion<f64>) -> MinimalQuaternion {
        let imaginary = if q.w < 0.0 { -q.imag() } else { q.imag() };
        MinimalQuaternion { imaginary }
    }
    pub fn imaginary(&self) -> Vector3<f64> {
        self.imaginary
    }
    pub fn real(&self) -> f64 {
        (1.0 - self.imaginary.norm_squared()).max(0.0).sqrt()
    }
    pub fn to_quaternion(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::new_unchecked(Quaternion::new(
            self.real(),
            self.imaginary[0],
            self.imaginary[1],
            self.imaginary[2],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn skew_matches_cross_product() {
        let a = Vector3::new(0.3, -1.2, 2.5);
        let b = Vector3::new(4.0, 0.1, -0.7);
        let via_skew = skew(&a) * b;
        let cross = a.cross(&b);
        for i in 0..3 {
            assert_approx_eq!(via_skew[i], cross[i], 1e-12);
        }
        assert_eq!(skew(&a), -skew(&a).transpose());
    }
    #[test]
    fn omega_matches_right_multiplication() {
        let q = UnitQuaternion::from_euler_angles(0.1, -0.4, 0.7);
        let w = Vector3::new(0.2, -0.3, 0.5);
        let by_matrix = omega(&w) * q.coords;
        let by_product = q.into_inner() * Quaternion::new(0.0, w[0], w[1], w[2]);
        for i in 0..4 {
            assert_approx_eq!(by_matrix[i], by_product.coords[i], 1e-12);
        }
    }
    #[test]
    fn reconstruction_round_trip() {
        let q = UnitQuaternion::from_euler_angles(0.3, 0.2, -0.1);
        let minimal = MinimalQuaternion::from_quaternion(&q);
        let back = minimal.to_quaternion();
        assert!(back.angle_to(&q) < 1e-12);
        let from_imag = quaternion_from_imaginary(&q.imag()).unwrap();
        assert!(from_imag.angle_to(&q) < 1e-12);
    }
    #[test]
    fn negative_real_part_is_flipped() {
        let q = UnitQuaternion::new_unchecked(Quaternion::new(-0.8, 0.6, 0.0, 0.0));
        let minimal = MinimalQuaternion::from_quaternion(&q);
        assert_approx_eq!(minimal.real(), 0.8, 1e-12);
        assert_approx_eq!(minimal.imaginary()[0], -0.6, 1e-12);
        assert!(minimal.to_quaternion().angle_to(&q) < 1e-12);
    }
    #[test]
    fn reconstruction_rejects_norm_above_one() {
        let err = quaternion_from_imaginary(&Vector3::new(0.8, 0.8, 0.0)).unwrap_err();
        match err {
            PropagationError::InvalidQuaternion { norm } => assert_approx_eq!(norm, 1.1313708, 1e-6),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(MinimalQuaternion::new(Vector3::new(1.0, 1e-3, 0.0)).is_err());
        assert!(quaternion_from_imaginary(&Vector3::new(f64::NAN, 0.0, 0.0)).is_err());
        // Exactly on the unit sphere is a valid 180 degree rotation.
        let half_turn = quaternion_from_imaginary(&Vector3::new(0.0, 0.0, 1.0)).unwrap();
        assert_eq!(half_turn.w, 0.0);
    }
    #[test]
    fn slerp_endpoints_and_midpoint() {
        let a = UnitQuaternion::identity();
        let b = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 1.0);
        assert!(slerp(&a, &b, 0.0).angle_to(&a) < 1e-12);
        assert!(slerp(&a, &b, 1.0).angle_to(&b) < 1e-12);
        let mid = slerp(&a, &b, 0.5);
        let expected = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.5);
        assert!(mid.angle_to(&expected) < 1e-12);
    }
    #[test]
    fn slerp_nearly_identical_inputs() {
        let a = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.2);
        let b = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.2 + 1e-9);
        let mid = slerp(&a, &b, 0.5);
        assert_approx_eq!(mid.angle(), 0.2 + 5e-10, 1e-9);
        assert_approx_eq!(mid.norm(), 1.0, 1e-12);
    }
    #[test]
    fn slerp_takes_shortest_arc() {
        let a = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.4);
        let b = UnitQuaternion::new_unchecked(-a.into_inner());
        let mid = slerp(&a, &b, 0.5);
        assert!(mid.angle_to(&a) < 1e-9);
    }
}
