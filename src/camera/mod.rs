//! Camera model types shared by the calibration pipeline.
//!
//! This module defines the error taxonomy of the crate, the fixed-size matrix
//! aliases used for the projection model, and the plain parameter records
//! (focal lengths, principal point, orientation) that are extracted from a
//! calibrated [`PinholeCamera`].

use nalgebra::{Matrix3, Matrix3x4, Vector2, Vector3};
use serde::{Deserialize, Serialize};

pub mod pinhole;

pub use pinhole::PinholeCamera;

/// 3x4 projection matrix `P`, defined up to a non-zero scale.
pub type ProjectionMatrix = Matrix3x4<f64>;
/// 3x3 upper-triangular calibration (intrinsic) matrix `K`.
pub type CalibrationMatrix = Matrix3<f64>;
/// 3x3 proper rotation matrix `R` (world to camera).
pub type RotationMatrix = Matrix3<f64>;
/// Translation `t` of the world origin expressed in camera coordinates.
pub type TranslationVector = Vector3<f64>;

/// Minimum number of correspondences for a well-posed DLT system
/// (12 unknowns, 2 equations per point).
pub const MIN_CORRESPONDENCES: usize = 6;

/// Relative threshold below which a matrix or point spread is treated as singular.
pub const SINGULARITY_TOLERANCE: f64 = 1e-12;

/// Threshold on `cos(beta)` below which Euler angle extraction is rejected.
pub const GIMBAL_LOCK_TOLERANCE: f64 = 1e-9;

/// Upper bound on QR sweeps for the symmetric eigen-solver.
pub const EIGEN_MAX_ITERATIONS: usize = 10_000;

#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error("Number of world points ({world}) and image points ({image}) do not match")]
    InputSizeMismatch { world: usize, image: usize },
    #[error("Need at least {required} calibration points, but only {found} were provided")]
    InsufficientPoints { required: usize, found: usize },
    #[error("Malformed record on line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },
    #[error("Matrix singularity detected")]
    SingularMatrix,
    #[error("Point lies on the principal plane and has no finite image")]
    DegenerateProjection,
    #[error("Vectors need to have the same dimension ({left} != {right})")]
    DimensionMismatch { left: usize, right: usize },
    #[error("Numerical error in computation: {0}")]
    NumericInstability(String),
    #[error("IO Error: {0}")]
    IOError(String),
    #[error("CSV Error: {0}")]
    CsvError(String),
    #[error("Image Error: {0}")]
    ImageError(String),
}

impl From<std::io::Error> for CalibrationError {
    fn from(err: std::io::Error) -> Self {
        CalibrationError::IOError(err.to_string())
    }
}

impl From<csv::Error> for CalibrationError {
    fn from(err: csv::Error) -> Self {
        CalibrationError::CsvError(err.to_string())
    }
}

impl From<image::ImageError> for CalibrationError {
    fn from(err: image::ImageError) -> Self {
        CalibrationError::ImageError(err.to_string())
    }
}

/// Focal lengths and principal point, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl Intrinsics {
    /// Reads the intrinsics from a normalized calibration matrix (`K[2][2] == 1`).
    pub fn from_calibration_matrix(k: &CalibrationMatrix) -> Self {
        Intrinsics {
            fx: k[(0, 0)],
            fy: k[(1, 1)],
            cx: k[(0, 2)],
            cy: k[(1, 2)],
        }
    }

    pub fn focal_lengths(&self) -> Vector2<f64> {
        Vector2::new(self.fx, self.fy)
    }

    pub fn principal_point(&self) -> Vector2<f64> {
        Vector2::new(self.cx, self.cy)
    }
}

/// Tait-Bryan angles in degrees for `R = Rz(gamma) * Ry(beta) * Rx(alpha)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

/// Human-readable calibration parameters derived from `K`, `R` and `t`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub intrinsics: Intrinsics,
    pub orientation: Orientation,
    pub translation: [f64; 3],
}

impl Parameters {
    pub fn focal_lengths(&self) -> Vector2<f64> {
        self.intrinsics.focal_lengths()
    }

    pub fn principal_point(&self) -> Vector2<f64> {
        self.intrinsics.principal_point()
    }

    pub fn translation_vector(&self) -> TranslationVector {
        Vector3::from(self.translation)
    }
}

/// Checks on decomposed camera matrices.
pub mod validation {
    use super::*;

    pub fn validate_intrinsics(intrinsics: &Intrinsics) -> Result<(), CalibrationError> {
        if !(intrinsics.fx > 0.0 && intrinsics.fy > 0.0) {
            return Err(CalibrationError::NumericInstability(format!(
                "focal lengths must be positive (fx = {}, fy = {})",
                intrinsics.fx, intrinsics.fy
            )));
        }
        if !intrinsics.cx.is_finite() || !intrinsics.cy.is_finite() {
            return Err(CalibrationError::NumericInstability(
                "principal point must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// Verifies that `r` is orthonormal with determinant +1 within `tolerance`.
    pub fn validate_rotation(r: &RotationMatrix, tolerance: f64) -> Result<(), CalibrationError> {
        if r.iter().any(|v| !v.is_finite()) {
            return Err(CalibrationError::NumericInstability(
                "rotation matrix contains non-finite entries".to_string(),
            ));
        }
        let orthogonality = (r.transpose() * r - Matrix3::identity()).norm();
        let det = r.determinant();
        if orthogonality > tolerance || (det - 1.0).abs() > tolerance {
            return Err(CalibrationError::NumericInstability(format!(
                "matrix is not a proper rotation (|RtR - I| = {orthogonality:e}, det = {det})"
            )));
        }
        Ok(())
    }

    /// `true` when the strictly lower part of `k` is zero within `tolerance`
    /// relative to the matrix norm.
    pub fn is_upper_triangular(k: &CalibrationMatrix, tolerance: f64) -> bool {
        let scale = k.norm().max(1.0);
        k[(1, 0)].abs() <= tolerance * scale
            && k[(2, 0)].abs() <= tolerance * scale
            && k[(2, 1)].abs() <= tolerance * scale
    }
}

#[cfg(test)]
mod tests {
    use super::validation::*;
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Rotation3;

    #[test]
    fn test_intrinsics_from_calibration_matrix() {
        let k = Matrix3::new(800.0, 0.5, 320.0, 0.0, 780.0, 240.0, 0.0, 0.0, 1.0);
        let intrinsics = Intrinsics::from_calibration_matrix(&k);

        assert_relative_eq!(intrinsics.fx, 800.0);
        assert_relative_eq!(intrinsics.fy, 780.0);
        assert_relative_eq!(intrinsics.principal_point(), Vector2::new(320.0, 240.0));
    }

    #[test]
    fn test_validate_intrinsics_rejects_negative_focal_length() {
        let intrinsics = Intrinsics {
            fx: -1.0,
            fy: 500.0,
            cx: 320.0,
            cy: 240.0,
        };
        assert!(matches!(
            validate_intrinsics(&intrinsics),
            Err(CalibrationError::NumericInstability(_))
        ));
    }

    #[test]
    fn test_validate_rotation() {
        let r = *Rotation3::from_euler_angles(0.1, -0.3, 0.7).matrix();
        assert!(validate_rotation(&r, 1e-9).is_ok());

        let reflection = Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, -1.0));
        assert!(validate_rotation(&reflection, 1e-9).is_err());
    }

    #[test]
    fn test_error_messages() {
        let err = CalibrationError::InsufficientPoints {
            required: 6,
            found: 4,
        };
        assert_eq!(
            err.to_string(),
            "Need at least 6 calibration points, but only 4 were provided"
        );
    }
}
