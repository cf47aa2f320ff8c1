//! Math kernel: vector/quaternion helpers built on top of `nalgebra`.
//!
//! The spec's "Vector3"/"Quaternion" data model is backed directly by
//! `nalgebra::Vector3<f64>` and `nalgebra::UnitQuaternion<f64>` — this module
//! only adds the handful of free functions whose exact semantics spec.md §4.1
//! pins down (safe normalize, renormalize-or-reset, ZYX Euler extraction,
//! angular-velocity quaternion kinematics) and that `nalgebra` leaves to the
//! caller.

use nalgebra::{Quaternion, UnitQuaternion, Vector3, Vector4};

/// Magnitude below which a vector is considered the zero vector for the
/// purposes of normalization (spec §4.1).
pub const NORMALIZE_EPSILON: f64 = 1e-12;

/// Norm below which a quaternion is considered degenerate and reset to
/// identity rather than renormalized (spec §3, Quaternion invariant).
pub const QUAT_RENORM_FLOOR: f64 = 1e-3;

/// Returns `v / |v|`, or the zero vector if `|v| < NORMALIZE_EPSILON`.
pub fn safe_normalize(v: Vector3<f64>) -> Vector3<f64> {
    let mag = v.norm();
    if mag < NORMALIZE_EPSILON {
        Vector3::zeros()
    } else {
        v / mag
    }
}

/// Renormalizes a raw (w, x, y, z) quaternion vector, resetting to identity
/// if its norm has collapsed below [`QUAT_RENORM_FLOOR`] (spec §3).
pub fn renormalize_quat_vec(q: Vector4<f64>) -> Vector4<f64> {
    let n = q.norm();
    if n < QUAT_RENORM_FLOOR {
        Vector4::new(1.0, 0.0, 0.0, 0.0)
    } else {
        q / n
    }
}

/// Builds a `UnitQuaternion` from a raw (w, x, y, z) vector, renormalizing
/// (or resetting to identity) per [`renormalize_quat_vec`] first.
pub fn unit_quat_from_raw(q: Vector4<f64>) -> UnitQuaternion<f64> {
    let q = renormalize_quat_vec(q);
    // `q` is packed (w, x, y, z); `Quaternion::new` wants (w, i, j, k).
    UnitQuaternion::from_quaternion(Quaternion::new(q[0], q[1], q[2], q[3]))
}

/// Quaternion derivative from body-frame angular velocity: `q̇ = ½·q·[0,ω]`.
///
/// Returns the raw (w, x, y, z) derivative vector; the caller integrates and
/// renormalizes (the orchestrator does this once per physics tick, not here,
/// so that intermediate RK-style evaluations stay pure).
pub fn quat_derivative(q: UnitQuaternion<f64>, angular_velocity: Vector3<f64>) -> Vector4<f64> {
    let omega_q = Quaternion::new(0.0, angular_velocity.x, angular_velocity.y, angular_velocity.z);
    let qdot = q.into_inner() * omega_q * 0.5;
    Vector4::new(qdot.w, qdot.i, qdot.j, qdot.k)
}

/// Integrates attitude forward by one step of body angular velocity using
/// the spec's first-order quaternion kinematics, normalizing the result.
pub fn integrate_attitude(
    q: UnitQuaternion<f64>,
    angular_velocity: Vector3<f64>,
    dt: f64,
) -> UnitQuaternion<f64> {
    let qdot = quat_derivative(q, angular_velocity);
    let q_vec = Vector4::new(q.w, q.i, q.j, q.k) + qdot * dt;
    unit_quat_from_raw(q_vec)
}

/// Intrinsic ZYX Euler angles (yaw, pitch, roll) extracted from a body-to-
/// inertial attitude quaternion, in radians.
pub fn euler_zyx(q: UnitQuaternion<f64>) -> (f64, f64, f64) {
    let (roll, pitch, yaw) = q.euler_angles();
    (yaw, pitch, roll)
}

/// Rotates a vector from body frame into inertial frame: `v' = q·v·q*`.
pub fn rotate_body_to_inertial(q: UnitQuaternion<f64>, v: Vector3<f64>) -> Vector3<f64> {
    q.transform_vector(&v)
}

/// Rotates a vector from inertial frame into body frame.
pub fn rotate_inertial_to_body(q: UnitQuaternion<f64>, v: Vector3<f64>) -> Vector3<f64> {
    q.inverse_transform_vector(&v)
}

/// Shortest-arc rotation vector (small-angle axis-angle, radians per axis)
/// taking `from` to `to`; used by SAS to turn a quaternion error into a
/// per-axis attitude error the attitude PIDs can consume.
pub fn small_angle_error(q_error: UnitQuaternion<f64>) -> Vector3<f64> {
    let (axis, angle) = match q_error.axis_angle() {
        Some((axis, angle)) => (axis.into_inner(), angle),
        None => (Vector3::zeros(), 0.0),
    };
    // Keep the rotation in the shortest-arc range (-pi, pi]; nalgebra's
    // axis_angle() already returns angle in [0, pi], but q_error may carry
    // the long-way-around sign in `w`, which axis_angle handles via the
    // sign of the axis — nothing further to correct here.
    axis * angle
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn safe_normalize_zero_vector() {
        let v = safe_normalize(Vector3::new(1e-13, 0.0, 0.0));
        assert_eq!(v, Vector3::zeros());
    }

    #[test]
    fn safe_normalize_unit_length() {
        let v = safe_normalize(Vector3::new(3.0, 4.0, 0.0));
        assert_relative_eq!(v.norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn renormalize_resets_near_zero_quat_to_identity() {
        let degenerate = Vector4::new(1e-4, 1e-4, 0.0, 0.0);
        let q = renormalize_quat_vec(degenerate);
        assert_eq!(q, Vector4::new(1.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn integrate_attitude_stays_unit_norm() {
        let q = UnitQuaternion::identity();
        let q2 = integrate_attitude(q, Vector3::new(0.1, 0.2, -0.3), 0.1);
        assert_relative_eq!(
            Vector4::new(q2.w, q2.i, q2.j, q2.k).norm(),
            1.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn rotate_round_trip() {
        let q = UnitQuaternion::from_euler_angles(0.1, 0.2, 0.3);
        let v = Vector3::new(1.0, 2.0, 3.0);
        let back = rotate_inertial_to_body(q, rotate_body_to_inertial(q, v));
        assert_relative_eq!(back, v, epsilon = 1e-9);
    }

    #[test]
    fn euler_zyx_pure_yaw() {
        let q = UnitQuaternion::from_euler_angles(0.0, 0.0, FRAC_PI_2);
        let (yaw, pitch, roll) = euler_zyx(q);
        assert_relative_eq!(yaw, FRAC_PI_2, epsilon = 1e-9);
        assert_relative_eq!(pitch, 0.0, epsilon = 1e-9);
        assert_relative_eq!(roll, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn small_angle_error_identity_is_zero() {
        let e = small_angle_error(UnitQuaternion::identity());
        assert_relative_eq!(e.norm(), 0.0, epsilon = 1e-9);
    }
}
