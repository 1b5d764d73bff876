// math.rs — quaternion/yaw utilities for the calibration engine
//
// Yaw here always means the rotation about the vertical (Y) axis under the
// Y-Z-X Euler decomposition. That order is a fixed contract shared with the
// pose solver that consumes corrected orientations; do not swap it for
// nalgebra's built-in roll-pitch-yaw decomposition, which uses a different
// order and breaks the reset composition rules.

use nalgebra::{UnitQuaternion, Vector3};
use std::f64::consts::TAU;

/// Default angular tolerance for calibration yaw comparisons (radians).
pub const YAW_TOLERANCE: f64 = 1e-3;

/// Below this, both yaw terms of the Y-Z-X decomposition are treated as
/// degenerate (bank angle at ±90°) and the vector fallback kicks in.
const GIMBAL_EPS: f64 = 1e-9;

/// Pure rotation about the vertical axis by `angle` radians.
pub fn yaw_quat(angle: f64) -> UnitQuaternion<f64> {
    UnitQuaternion::from_axis_angle(&Vector3::y_axis(), angle)
}

/// Wrap an angle into `[0, 2π)`.
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    // rem_euclid can round back up to exactly 2π for tiny negative inputs
    if wrapped >= TAU {
        wrapped - TAU
    } else {
        wrapped
    }
}

/// Yaw of a unit quaternion under the Y-Z-X Euler order, in `[0, 2π)`.
///
/// When the decomposition is gimbal-adjacent (bank near ±90°) this degrades
/// to the heading of a rotated body axis instead of failing; the consuming
/// pose solver cannot tolerate a missing orientation.
pub fn yaw_of(q: &UnitQuaternion<f64>) -> f64 {
    // For R = Ry(yaw) * Rz(bank) * Rx(tilt):
    //   R[0][0] =  cos(yaw) * cos(bank) = 1 - 2(j² + k²)
    //   R[2][0] = -sin(yaw) * cos(bank) = 2(ik - wj)
    let sin_yaw = 2.0 * (q.w * q.j - q.i * q.k);
    let cos_yaw = 1.0 - 2.0 * (q.j * q.j + q.k * q.k);
    if sin_yaw.abs() > GIMBAL_EPS || cos_yaw.abs() > GIMBAL_EPS {
        return wrap_angle(sin_yaw.atan2(cos_yaw));
    }

    // Bank at ±90°: take the heading of the rotated forward axis, or the
    // rotated up axis if forward ended up vertical too.
    let forward = q.transform_vector(&Vector3::z());
    if forward.x.abs() > GIMBAL_EPS || forward.z.abs() > GIMBAL_EPS {
        return wrap_angle(forward.x.atan2(forward.z));
    }
    let up = q.transform_vector(&Vector3::y());
    if up.x.abs() > GIMBAL_EPS || up.z.abs() > GIMBAL_EPS {
        return wrap_angle(up.x.atan2(up.z));
    }
    0.0
}

/// Heading of a vector projected onto the horizontal plane, in `[0, 2π)`.
/// World forward is +Z, positive yaw turns toward +X.
pub fn heading_of(v: &Vector3<f64>) -> f64 {
    if v.x.abs() <= GIMBAL_EPS && v.z.abs() <= GIMBAL_EPS {
        return 0.0;
    }
    wrap_angle(v.x.atan2(v.z))
}

/// Smallest absolute difference between two angles, accounting for
/// 2π wraparound. `0.001` and `2π − 0.001` differ by `0.002`, not `2π − 0.002`.
pub fn angle_diff(a: f64, b: f64) -> f64 {
    let d = (wrap_angle(a) - wrap_angle(b)).abs();
    d.min(TAU - d)
}

/// Wraparound-aware approximate equality of two angles.
///
/// Used only for calibration math and its tests, never for general numeric
/// comparisons. The three explicit checks cover values sitting on opposite
/// sides of the 0/2π boundary.
pub fn angles_approx_eq(a: f64, b: f64, tol: f64) -> bool {
    let a = wrap_angle(a);
    let b = wrap_angle(b);
    (a - b).abs() <= tol || (a - TAU - b).abs() <= tol || (a - (b - TAU)).abs() <= tol
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_yaw_of_pure_yaw() {
        for &angle in &[0.0, 0.5, FRAC_PI_2, PI, 4.0, TAU - 0.25] {
            assert_abs_diff_eq!(yaw_of(&yaw_quat(angle)), wrap_angle(angle), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_yaw_of_identity() {
        assert_eq!(yaw_of(&UnitQuaternion::identity()), 0.0);
    }

    #[test]
    fn test_yaw_ignores_tilt() {
        // Yaw then a moderate bank/tilt must leave the extracted yaw alone.
        let tilt = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.4)
            * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), -0.3);
        let q = yaw_quat(1.2) * tilt;
        assert_abs_diff_eq!(yaw_of(&q), 1.2, epsilon = 1e-9);
    }

    #[test]
    fn test_yaw_negative_angle_wraps() {
        assert_abs_diff_eq!(yaw_of(&yaw_quat(-0.5)), TAU - 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_gimbal_fallback_recovers_heading() {
        // Bank at exactly 90° degenerates the decomposition; the forward-axis
        // fallback still recovers the heading.
        let q = yaw_quat(1.0) * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
        assert!(angles_approx_eq(yaw_of(&q), 1.0, 1e-6));
    }

    #[test]
    fn test_gimbal_fallback_never_panics() {
        // Bank and tilt both at 90° pushes through to the up-axis fallback.
        let q = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2)
            * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), FRAC_PI_2);
        let yaw = yaw_of(&q);
        assert!(yaw.is_finite());
        assert!((0.0..TAU).contains(&yaw));
    }

    #[test]
    fn test_wraparound_distance() {
        // Per the boundary rule: 0.001 vs 2π − 0.001 differ by 0.002.
        assert_abs_diff_eq!(angle_diff(0.001, TAU - 0.001), 0.002, epsilon = 1e-12);
        assert!(!angles_approx_eq(0.001, TAU - 0.001, 1e-3));
    }

    #[test]
    fn test_wraparound_equality() {
        assert!(angles_approx_eq(TAU - 0.0005, 0.0005, 1e-3));
        assert!(angles_approx_eq(0.0005, TAU - 0.0005, 1e-3));
        assert!(angles_approx_eq(TAU - 1e-9, 0.0, 1e-3));
    }

    #[test]
    fn test_angles_approx_eq_plain() {
        assert!(angles_approx_eq(1.0, 1.0005, 1e-3));
        assert!(!angles_approx_eq(1.0, 1.1, 1e-3));
    }

    #[test]
    fn test_wrap_angle_range() {
        for &a in &[-10.0, -TAU, -1e-15, 0.0, 1.0, TAU, 10.0, 100.0] {
            let w = wrap_angle(a);
            assert!((0.0..TAU).contains(&w), "wrap_angle({}) = {}", a, w);
        }
    }

    #[test]
    fn test_heading_of_axes() {
        assert_abs_diff_eq!(heading_of(&Vector3::new(0.0, 0.0, 1.0)), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(
            heading_of(&Vector3::new(1.0, 0.0, 0.0)),
            FRAC_PI_2,
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(heading_of(&Vector3::new(0.0, 0.0, -1.0)), PI, epsilon = 1e-12);
        // Vertical vector has no heading; fall back to zero.
        assert_eq!(heading_of(&Vector3::new(0.0, 1.0, 0.0)), 0.0);
    }
}
