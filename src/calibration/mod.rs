//! The `calibration` module estimates a pinhole camera from 3D-2D correspondences.
//!
//! The pipeline follows the Direct Linear Transformation:
//!
//! 1. [`estimation`] builds the `2N x 12` homogeneous system `A p = 0`.
//! 2. [`solver`] takes the unit null-space vector of `A^T A` as the projection matrix.
//! 3. [`decomposition`] factors `P` into `K [R | t]` with sign and scale fixed.
//! 4. [`extract`] reads focal lengths, principal point and Euler angles.
//!
//! [`calibrate`] runs steps 1-3 on Hartley-conditioned coordinates and maps
//! the result back to pixel and world units.

pub mod decomposition;
pub mod estimation;
pub mod extract;
pub mod solver;

pub use decomposition::{decompose_projection_matrix, rq_decompose};
pub use estimation::{build_estimation_matrix, EstimationMatrix};
pub use extract::{extract_intrinsics, extract_orientation, extract_parameters};
pub use solver::{solve_null_space, NullSpaceSolution};

use crate::camera::{
    CalibrationError, CalibrationMatrix, PinholeCamera, ProjectionMatrix, RotationMatrix,
    TranslationVector, MIN_CORRESPONDENCES,
};
use crate::geometry::{check_depth_variation, normalize_image_points, normalize_world_points};
use log::{debug, info};
use nalgebra::{Vector2, Vector3};

/// A calibrated camera together with the fit diagnostic of the linear solve.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationResult {
    pub camera: PinholeCamera,
    /// Smallest eigenvalue of the conditioned normal-equations matrix.
    pub residual: f64,
}

impl CalibrationResult {
    /// Splits the result into `(P, K, R, t)`.
    pub fn into_parts(
        self,
    ) -> (
        ProjectionMatrix,
        CalibrationMatrix,
        RotationMatrix,
        TranslationVector,
    ) {
        let camera = self.camera;
        (
            camera.projection,
            camera.calibration,
            camera.rotation,
            camera.translation,
        )
    }
}

/// Estimates and decomposes the projection matrix from index-aligned correspondences.
///
/// # Errors
///
/// * [`CalibrationError::InputSizeMismatch`]: if the slices differ in length.
/// * [`CalibrationError::InsufficientPoints`]: if fewer than [`MIN_CORRESPONDENCES`]
///   pairs are supplied.
/// * [`CalibrationError::SingularMatrix`]: if the world points span no volume
///   (e.g. a planar target) or the estimated 3x3 block is not invertible.
/// * [`CalibrationError::NumericInstability`]: if the eigen-solve fails.
///
/// # Examples
///
/// ```rust
/// use dlt_calibration::calibration::calibrate;
/// use dlt_calibration::camera::PinholeCamera;
/// use nalgebra::{Matrix3, Vector3};
///
/// let k = Matrix3::new(1000.0, 0.0, 320.0, 0.0, 1000.0, 240.0, 0.0, 0.0, 1.0);
/// let truth = PinholeCamera::new(k, Matrix3::identity(), Vector3::new(0.0, 0.0, 1000.0));
///
/// let world: Vec<_> = (0..8)
///     .map(|i: u32| {
///         let corner = |bit: u32| ((i >> bit) & 1) as f64 * 100.0;
///         Vector3::new(corner(0), corner(1), corner(2))
///     })
///     .collect();
/// let image = truth.project_points(&world).unwrap();
///
/// let result = calibrate(&world, &image).unwrap();
/// assert!((result.camera.calibration[(0, 0)] - 1000.0).abs() < 1e-4);
/// ```
pub fn calibrate(
    world_points: &[Vector3<f64>],
    image_points: &[Vector2<f64>],
) -> Result<CalibrationResult, CalibrationError> {
    if world_points.len() != image_points.len() {
        return Err(CalibrationError::InputSizeMismatch {
            world: world_points.len(),
            image: image_points.len(),
        });
    }
    if world_points.len() < MIN_CORRESPONDENCES {
        return Err(CalibrationError::InsufficientPoints {
            required: MIN_CORRESPONDENCES,
            found: world_points.len(),
        });
    }
    check_depth_variation(world_points)?;

    info!("Calibrating from {} correspondences", world_points.len());

    let (world_normalized, world_transform) = normalize_world_points(world_points)?;
    let (image_normalized, image_transform) = normalize_image_points(image_points)?;

    let a = build_estimation_matrix(&world_normalized, &image_normalized)?;
    let solution = solve_null_space(&a)?;
    debug!("Null-space eigenvalue: {:e}", solution.eigenvalue);

    let image_transform_inv = image_transform
        .try_inverse()
        .ok_or(CalibrationError::SingularMatrix)?;
    let projection = image_transform_inv * solution.projection * world_transform;

    let camera = decompose_projection_matrix(&projection)?;
    info!(
        "Calibration finished: fx = {:.3}, fy = {:.3}, cx = {:.3}, cy = {:.3}",
        camera.calibration[(0, 0)],
        camera.calibration[(1, 1)],
        camera.calibration[(0, 2)],
        camera.calibration[(1, 2)]
    );

    Ok(CalibrationResult {
        camera,
        residual: solution.eigenvalue,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::validation::{is_upper_triangular, validate_rotation};
    use crate::geometry::reprojection_error;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3, Rotation3};

    fn reference_camera() -> PinholeCamera {
        let k = Matrix3::new(1000.0, 0.0, 320.0, 0.0, 1000.0, 240.0, 0.0, 0.0, 1.0);
        PinholeCamera::new(k, Matrix3::identity(), Vector3::new(0.0, 0.0, 1000.0))
    }

    fn cube_points() -> Vec<Vector3<f64>> {
        let mut points = Vec::new();
        for z in -1..=1 {
            for y in -1..=1 {
                for x in -1..=1 {
                    points.push(Vector3::new(x as f64 * 100.0, y as f64 * 80.0, z as f64 * 120.0));
                }
            }
        }
        points
    }

    #[test]
    fn test_calibrate_synthetic_ground_truth() {
        let truth = reference_camera();
        let world = cube_points();
        let image = truth.project_points(&world).unwrap();

        let result = calibrate(&world, &image).unwrap();
        let camera = &result.camera;

        for (w, observed) in world.iter().zip(image.iter()) {
            let predicted = camera.project(w).unwrap();
            assert!(reprojection_error(observed, &predicted) < 1e-6);
        }

        assert_relative_eq!(camera.calibration, truth.calibration, epsilon = 1e-6);
        assert_relative_eq!(camera.rotation, Matrix3::identity(), epsilon = 1e-9);
        assert_relative_eq!(camera.translation, truth.translation, epsilon = 1e-6);
        assert!(result.residual < 1e-9);
    }

    #[test]
    fn test_calibrate_rotated_camera_invariants() {
        let k = Matrix3::new(850.0, 0.0, 410.0, 0.0, 870.0, 300.0, 0.0, 0.0, 1.0);
        let r = *Rotation3::from_euler_angles(0.2, -0.3, 0.6).matrix();
        let truth = PinholeCamera::new(k, r, Vector3::new(-50.0, 30.0, 1500.0));
        let world = cube_points();
        let image = truth.project_points(&world).unwrap();

        let (p, k_est, r_est, t_est) = calibrate(&world, &image).unwrap().into_parts();

        assert!(is_upper_triangular(&k_est, 1e-12));
        assert!(k_est[(0, 0)] > 0.0 && k_est[(1, 1)] > 0.0);
        assert_relative_eq!(k_est[(2, 2)], 1.0, epsilon = 1e-12);
        assert!(validate_rotation(&r_est, 1e-9).is_ok());
        assert_relative_eq!(k_est, k, epsilon = 1e-6);
        assert_relative_eq!(r_est, r, epsilon = 1e-8);
        assert_relative_eq!(t_est, truth.translation, epsilon = 1e-5);
        assert!((p - truth.projection).norm() < 1e-8 * truth.projection.norm());
    }

    #[test]
    fn test_calibrate_input_size_mismatch() {
        let world = cube_points();
        let image = vec![Vector2::new(0.0, 0.0); world.len() - 1];

        assert!(matches!(
            calibrate(&world, &image),
            Err(CalibrationError::InputSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_calibrate_insufficient_points() {
        let truth = reference_camera();
        let world = cube_points();
        let image = truth.project_points(&world).unwrap();

        for n in 1..MIN_CORRESPONDENCES {
            assert!(matches!(
                calibrate(&world[..n], &image[..n]),
                Err(CalibrationError::InsufficientPoints { required: 6, found }) if found == n
            ));
        }
    }

    #[test]
    fn test_calibrate_planar_target_is_singular() {
        let truth = reference_camera();
        let world: Vec<_> = cube_points()
            .into_iter()
            .map(|p| Vector3::new(p.x, p.y, 0.0))
            .collect();
        let image = truth.project_points(&world).unwrap();

        assert!(matches!(
            calibrate(&world, &image),
            Err(CalibrationError::SingularMatrix)
        ));
    }
}
