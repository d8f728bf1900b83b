//! Least-squares null-space solution of the DLT system.
//!
//! The projection matrix is the unit vector `p` minimising `|A p|`, which is
//! the eigenvector of the normal-equations matrix `M = A^T A` associated with
//! its smallest eigenvalue.

use crate::calibration::estimation::EstimationMatrix;
use crate::camera::{CalibrationError, ProjectionMatrix, EIGEN_MAX_ITERATIONS, MIN_CORRESPONDENCES};
use log::{debug, warn};

/// Output of [`solve_null_space`].
#[derive(Debug, Clone, PartialEq)]
pub struct NullSpaceSolution {
    /// Unit-norm solution reshaped row-major into a 3x4 matrix.
    pub projection: ProjectionMatrix,
    /// Smallest eigenvalue of `A^T A`; close to zero for noise-free data.
    pub eigenvalue: f64,
}

/// Solves `A p ~ 0` subject to `|p| = 1`.
///
/// # Errors
///
/// * [`CalibrationError::InsufficientPoints`]: if `a` encodes fewer than
///   [`MIN_CORRESPONDENCES`] correspondences.
/// * [`CalibrationError::NumericInstability`]: if the eigen-solver does not
///   converge or yields non-finite values.
pub fn solve_null_space(a: &EstimationMatrix) -> Result<NullSpaceSolution, CalibrationError> {
    let correspondences = a.nrows() / 2;
    if correspondences < MIN_CORRESPONDENCES {
        return Err(CalibrationError::InsufficientPoints {
            required: MIN_CORRESPONDENCES,
            found: correspondences,
        });
    }
    if a.iter().any(|v| !v.is_finite()) {
        return Err(CalibrationError::NumericInstability(
            "estimation matrix contains non-finite entries".to_string(),
        ));
    }

    let normal = a.tr_mul(a);
    let eigen = normal
        .try_symmetric_eigen(f64::EPSILON, EIGEN_MAX_ITERATIONS)
        .ok_or_else(|| {
            CalibrationError::NumericInstability("symmetric eigen-solver did not converge".to_string())
        })?;

    let (index, eigenvalue) = eigen
        .eigenvalues
        .iter()
        .copied()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .ok_or_else(|| CalibrationError::NumericInstability("empty spectrum".to_string()))?;

    let vector = eigen.eigenvectors.column(index).into_owned();
    let norm = vector.norm();
    if !eigenvalue.is_finite() || !norm.is_finite() || norm <= f64::EPSILON {
        return Err(CalibrationError::NumericInstability(format!(
            "ill-defined null-space vector (eigenvalue = {eigenvalue}, norm = {norm})"
        )));
    }
    let vector = vector / norm;

    debug!("Normal matrix spectrum: {:?}", eigen.eigenvalues.as_slice());
    if eigenvalue < 0.0 {
        warn!("Smallest eigenvalue {eigenvalue:e} is negative, treating it as round-off");
    }

    Ok(NullSpaceSolution {
        projection: ProjectionMatrix::from_fn(|r, c| vector[4 * r + c]),
        eigenvalue: eigenvalue.max(0.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::estimation::build_estimation_matrix;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3x4, Vector2, Vector3};

    #[rustfmt::skip]
    fn ground_truth() -> Matrix3x4<f64> {
        Matrix3x4::new(
            1.2, 0.1, 0.3, 0.5,
            -0.2, 1.1, 0.4, -0.3,
            0.05, 0.02, 0.9, 2.0,
        )
    }

    fn correspondences(p: &Matrix3x4<f64>) -> (Vec<Vector3<f64>>, Vec<Vector2<f64>>) {
        let mut world = Vec::new();
        let mut image = Vec::new();
        for z in 0..2 {
            for y in 0..2 {
                for x in 0..3 {
                    let w = Vector3::new(x as f64 * 0.5 - 0.5, y as f64 * 0.7 - 0.35, z as f64 * 0.6);
                    let h = p * w.push(1.0);
                    world.push(w);
                    image.push(Vector2::new(h.x / h.z, h.y / h.z));
                }
            }
        }
        (world, image)
    }

    #[test]
    fn test_null_space_recovers_projection_up_to_scale() {
        let p = ground_truth();
        let (world, image) = correspondences(&p);
        let a = build_estimation_matrix(&world, &image).unwrap();

        let solution = solve_null_space(&a).unwrap();
        assert_relative_eq!(solution.projection.norm(), 1.0, epsilon = 1e-12);
        assert!(solution.eigenvalue < 1e-10);

        let expected = p / p.norm();
        let sign = solution.projection.dot(&expected).signum();
        assert_relative_eq!(solution.projection * sign, expected, epsilon = 1e-8);
    }

    #[test]
    fn test_null_space_requires_six_points() {
        let p = ground_truth();
        let (world, image) = correspondences(&p);
        let a = build_estimation_matrix(&world[..5], &image[..5]).unwrap();

        assert!(matches!(
            solve_null_space(&a),
            Err(CalibrationError::InsufficientPoints { required: 6, found: 5 })
        ));
    }

    #[test]
    fn test_null_space_rejects_non_finite_input() {
        let p = ground_truth();
        let (world, mut image) = correspondences(&p);
        image[0].x = f64::NAN;
        let a = build_estimation_matrix(&world, &image).unwrap();

        assert!(matches!(
            solve_null_space(&a),
            Err(CalibrationError::NumericInstability(_))
        ));
    }
}
