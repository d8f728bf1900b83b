//! Implements the linear pinhole camera `P = K [R | t]`.
//!
//! This module provides [`project`], the mapping of world points through an
//! arbitrary (possibly unnormalized) projection matrix, and [`PinholeCamera`],
//! the decomposed form of a calibrated projection matrix. A pinhole camera
//! assumes no lens distortion.

use crate::calibration::decomposition::decompose_projection_matrix;
use crate::calibration::extract::extract_parameters;
use crate::camera::{
    CalibrationError, CalibrationMatrix, Parameters, ProjectionMatrix, RotationMatrix,
    TranslationVector,
};
use nalgebra::{Vector2, Vector3, Vector4};

/// Projects a world point through `p` and returns its pixel coordinates.
///
/// Computes `(u', v', w') = P * [x, y, z, 1]^T` and returns `(u'/w', v'/w')`.
///
/// # Errors
///
/// * [`CalibrationError::DegenerateProjection`]: if `w'` vanishes, i.e. the point
///   lies on the principal plane of the camera and has no finite image.
///
/// # Examples
///
/// ```rust
/// use dlt_calibration::camera::pinhole::project;
/// use nalgebra::{Matrix3x4, Vector3};
///
/// #[rustfmt::skip]
/// let p = Matrix3x4::new(
///     500.0, 0.0, 320.0, 0.0,
///     0.0, 500.0, 240.0, 0.0,
///     0.0, 0.0, 1.0, 0.0,
/// );
/// let uv = project(&p, &Vector3::new(0.1, 0.2, 1.0)).unwrap();
/// assert!((uv.x - 370.0).abs() < 1e-9);
/// assert!((uv.y - 340.0).abs() < 1e-9);
/// ```
pub fn project(
    p: &ProjectionMatrix,
    point: &Vector3<f64>,
) -> Result<Vector2<f64>, CalibrationError> {
    let homogeneous = Vector4::new(point.x, point.y, point.z, 1.0);
    let image = p * homogeneous;
    let w = image.z;

    // Magnitude of the terms summed into w, so the test is scale invariant.
    let magnitude = p
        .row(2)
        .iter()
        .zip(homogeneous.iter())
        .map(|(a, b)| (a * b).abs())
        .sum::<f64>();

    if !w.is_finite() || w.abs() <= f64::EPSILON * magnitude {
        return Err(CalibrationError::DegenerateProjection);
    }

    Ok(Vector2::new(image.x / w, image.y / w))
}

/// A calibrated camera: the normalized projection matrix and its factors.
///
/// The invariant `projection == calibration * [rotation | translation]` holds
/// with `calibration[(2, 2)] == 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct PinholeCamera {
    pub projection: ProjectionMatrix,
    pub calibration: CalibrationMatrix,
    pub rotation: RotationMatrix,
    pub translation: TranslationVector,
}

impl PinholeCamera {
    /// Composes a camera from known intrinsics and extrinsics.
    pub fn new(
        calibration: CalibrationMatrix,
        rotation: RotationMatrix,
        translation: TranslationVector,
    ) -> Self {
        let mut extrinsics = ProjectionMatrix::zeros();
        extrinsics.fixed_view_mut::<3, 3>(0, 0).copy_from(&rotation);
        extrinsics.set_column(3, &translation);

        PinholeCamera {
            projection: calibration * extrinsics,
            calibration,
            rotation,
            translation,
        }
    }

    /// Decomposes an estimated projection matrix of arbitrary scale and sign.
    ///
    /// # Errors
    ///
    /// * [`CalibrationError::SingularMatrix`]: if the leading 3x3 block of `p`
    ///   is not invertible.
    pub fn from_projection_matrix(p: &ProjectionMatrix) -> Result<Self, CalibrationError> {
        decompose_projection_matrix(p)
    }

    /// See [`project`].
    pub fn project(&self, point: &Vector3<f64>) -> Result<Vector2<f64>, CalibrationError> {
        project(&self.projection, point)
    }

    /// Projects every point, failing on the first degenerate one.
    pub fn project_points(
        &self,
        points: &[Vector3<f64>],
    ) -> Result<Vec<Vector2<f64>>, CalibrationError> {
        points.iter().map(|point| self.project(point)).collect()
    }

    /// Position of the optical centre in world coordinates, `C = -R^T t`.
    pub fn camera_center(&self) -> Vector3<f64> {
        -(self.rotation.transpose() * self.translation)
    }

    /// Focal lengths, principal point, orientation and translation.
    pub fn parameters(&self) -> Result<Parameters, CalibrationError> {
        extract_parameters(&self.calibration, &self.rotation, &self.translation)
    }
}
