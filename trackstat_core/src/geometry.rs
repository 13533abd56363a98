//! Geometry kernel - pure vector math shared by the analyzers.
//!
//! Everything here is stateless and operates on `nalgebra::Vector3<f64>`.
//! The angle convention is `atan2(‖a × b‖, a · b)`, which stays accurate
//! for near-parallel and near-antiparallel vectors where the textbook
//! `acos(dot / (|a||b|))` loses precision.

use nalgebra::Vector3;

/// Unsigned angle between two 3D vectors, in `[0, pi]`.
///
/// Returns `0` for parallel vectors and `pi` for antiparallel ones.
/// A zero-length input yields `atan2(0, 0) = 0` per IEEE convention;
/// callers that need to treat degenerate vectors differently must check
/// before calling.
pub fn angle_between(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    a.cross(b).norm().atan2(a.dot(b))
}

/// Absolute angle of a displacement vector projected onto the xy plane.
pub fn absolute_angle_xy(v: &Vector3<f64>) -> f64 {
    v.y.atan2(v.x)
}

/// Absolute angle of a displacement vector projected onto the yz plane.
pub fn absolute_angle_yz(v: &Vector3<f64>) -> f64 {
    v.z.atan2(v.y)
}

/// Absolute angle of a displacement vector projected onto the zx plane.
pub fn absolute_angle_zx(v: &Vector3<f64>) -> f64 {
    v.x.atan2(v.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use std::f64::consts::PI;

    #[test]
    fn test_angle_parallel_is_zero() {
        let a = Vector3::new(1.0, 2.0, 3.0);
        let b = a * 4.5;
        assert_relative_eq!(angle_between(&a, &b), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_angle_antiparallel_is_pi() {
        let a = Vector3::new(1.0, 2.0, 3.0);
        let b = -a;
        assert_relative_eq!(angle_between(&a, &b), PI, epsilon = 1e-9);
    }

    #[test]
    fn test_angle_orthogonal() {
        let a = Vector3::new(1.0, 0.0, 0.0);
        let b = Vector3::new(0.0, 1.0, 0.0);
        assert_relative_eq!(angle_between(&a, &b), PI / 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_vector_yields_zero() {
        let zero = Vector3::zeros();
        let b = Vector3::new(1.0, 0.0, 0.0);
        assert_eq!(angle_between(&zero, &b), 0.0);
        assert_eq!(angle_between(&zero, &zero), 0.0);
    }

    #[test]
    fn test_plane_angles() {
        let v = Vector3::new(0.0, 1.0, 0.0);
        assert_relative_eq!(absolute_angle_xy(&v), PI / 2.0, epsilon = 1e-9);
        let d = Vector3::new(6.0, 6.0, 0.0);
        assert_relative_eq!(absolute_angle_xy(&d), PI / 4.0, epsilon = 1e-9);
    }

    proptest! {
        #[test]
        fn prop_angle_in_range(
            ax in -1e3f64..1e3, ay in -1e3f64..1e3, az in -1e3f64..1e3,
            bx in -1e3f64..1e3, by in -1e3f64..1e3, bz in -1e3f64..1e3,
        ) {
            let a = Vector3::new(ax, ay, az);
            let b = Vector3::new(bx, by, bz);
            let angle = angle_between(&a, &b);
            prop_assert!((0.0..=PI + 1e-9).contains(&angle));
        }

        #[test]
        fn prop_angle_symmetric(
            ax in -1e3f64..1e3, ay in -1e3f64..1e3, az in -1e3f64..1e3,
            bx in -1e3f64..1e3, by in -1e3f64..1e3, bz in -1e3f64..1e3,
        ) {
            let a = Vector3::new(ax, ay, az);
            let b = Vector3::new(bx, by, bz);
            prop_assert!((angle_between(&a, &b) - angle_between(&b, &a)).abs() < 1e-9);
        }
    }
}
