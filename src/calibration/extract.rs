//! Human-readable parameters from a decomposed camera.

use crate::camera::{
    validation, CalibrationError, CalibrationMatrix, Intrinsics, Orientation, Parameters,
    RotationMatrix, TranslationVector, GIMBAL_LOCK_TOLERANCE,
};
use log::warn;
use nalgebra::Vector2;

/// Returns `(principal_point, focal_lengths)` of a normalized calibration matrix.
pub fn extract_intrinsics(k: &CalibrationMatrix) -> (Vector2<f64>, Vector2<f64>) {
    let intrinsics = Intrinsics::from_calibration_matrix(k);
    (intrinsics.principal_point(), intrinsics.focal_lengths())
}

/// Clamps a sine into `[-1, 1]`, warning when floating noise pushed it outside.
fn clamp_sine(value: f64, name: &str) -> f64 {
    if value.abs() > 1.0 {
        warn!("{name} = {value} is outside [-1, 1], clamping");
    }
    value.clamp(-1.0, 1.0)
}

/// ZYX Tait-Bryan angles in degrees, with `R = Rz(gamma) * Ry(beta) * Rx(alpha)`.
///
/// * `beta = asin(-R[2][0])`
/// * `alpha = asin(R[2][1] / cos(beta))`
/// * `gamma = asin(R[1][0] / cos(beta))`
///
/// # Errors
///
/// * [`CalibrationError::NumericInstability`]: if `r` is not a proper rotation,
///   or at gimbal lock (`beta` = ±90°) where `alpha` and `gamma` are not separable.
pub fn extract_orientation(r: &RotationMatrix) -> Result<Orientation, CalibrationError> {
    validation::validate_rotation(r, 1e-6)?;

    let sin_beta = clamp_sine(-r[(2, 0)], "sin(beta)");
    let cos_beta = (1.0 - sin_beta * sin_beta).sqrt();
    if cos_beta < GIMBAL_LOCK_TOLERANCE {
        return Err(CalibrationError::NumericInstability(format!(
            "gimbal lock: cos(beta) = {cos_beta:e}"
        )));
    }

    let sin_alpha = clamp_sine(r[(2, 1)] / cos_beta, "sin(alpha)");
    let sin_gamma = clamp_sine(r[(1, 0)] / cos_beta, "sin(gamma)");

    Ok(Orientation {
        alpha: sin_alpha.asin().to_degrees(),
        beta: sin_beta.asin().to_degrees(),
        gamma: sin_gamma.asin().to_degrees(),
    })
}

/// Collects focal lengths, principal point, orientation and translation.
pub fn extract_parameters(
    k: &CalibrationMatrix,
    r: &RotationMatrix,
    t: &TranslationVector,
) -> Result<Parameters, CalibrationError> {
    let intrinsics = Intrinsics::from_calibration_matrix(k);
    validation::validate_intrinsics(&intrinsics)?;

    Ok(Parameters {
        intrinsics,
        orientation: extract_orientation(r)?,
        translation: [t.x, t.y, t.z],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3, Rotation3, Vector3};

    #[test]
    fn test_extract_intrinsics() {
        let k = Matrix3::new(1000.0, 0.0, 320.0, 0.0, 990.0, 240.0, 0.0, 0.0, 1.0);
        let (principal_point, focal_lengths) = extract_intrinsics(&k);

        assert_eq!(principal_point, Vector2::new(320.0, 240.0));
        assert_eq!(focal_lengths, Vector2::new(1000.0, 990.0));
    }

    #[test]
    fn test_extract_orientation_matches_euler_angles() {
        let (roll, pitch, yaw) = (0.3_f64, -0.4_f64, 1.1_f64);
        let r = *Rotation3::from_euler_angles(roll, pitch, yaw).matrix();

        let orientation = extract_orientation(&r).unwrap();
        assert_relative_eq!(orientation.alpha, roll.to_degrees(), epsilon = 1e-9);
        assert_relative_eq!(orientation.beta, pitch.to_degrees(), epsilon = 1e-9);
        assert_relative_eq!(orientation.gamma, yaw.to_degrees(), epsilon = 1e-9);
    }

    #[test]
    fn test_extract_orientation_identity() {
        let orientation = extract_orientation(&Matrix3::identity()).unwrap();
        assert_eq!(orientation.alpha, 0.0);
        assert_eq!(orientation.beta, 0.0);
        assert_eq!(orientation.gamma, 0.0);
    }

    #[test]
    fn test_extract_orientation_gimbal_lock() {
        // Ry(90°)
        #[rustfmt::skip]
        let r = Matrix3::new(
            0.0, 0.0, 1.0,
            0.0, 1.0, 0.0,
            -1.0, 0.0, 0.0,
        );
        let result = extract_orientation(&r);
        assert!(matches!(result, Err(CalibrationError::NumericInstability(_))));
    }

    #[test]
    fn test_extract_orientation_rejects_reflection() {
        let r = Matrix3::from_diagonal(&Vector3::new(1.0, -1.0, 1.0));
        assert!(extract_orientation(&r).is_err());
    }

    #[test]
    fn test_extract_parameters() {
        let k = Matrix3::new(1000.0, 0.0, 320.0, 0.0, 1000.0, 240.0, 0.0, 0.0, 1.0);
        let t = Vector3::new(0.0, 0.0, 1000.0);
        let params = extract_parameters(&k, &Matrix3::identity(), &t).unwrap();

        assert_eq!(params.focal_lengths(), Vector2::new(1000.0, 1000.0));
        assert_eq!(params.principal_point(), Vector2::new(320.0, 240.0));
        assert_eq!(params.translation, [0.0, 0.0, 1000.0]);
        assert_eq!(params.orientation.beta, 0.0);
    }
}
