//! Construction of the homogeneous DLT system `A p = 0`.

use crate::camera::CalibrationError;
use nalgebra::{Dyn, OMatrix, Vector2, Vector3, U12};

/// The `2N x 12` estimation matrix, two rows per correspondence.
pub type EstimationMatrix = OMatrix<f64, Dyn, U12>;

/// Builds the DLT estimation matrix from index-aligned correspondences.
///
/// For a world point `(x, y, z)` observed at pixel `(u, v)` the rows
///
/// ```text
/// [x, y, z, 1, 0, 0, 0, 0, -u*x, -u*y, -u*z, -u]
/// [0, 0, 0, 0, x, y, z, 1, -v*x, -v*y, -v*z, -v]
/// ```
///
/// are appended, where `p` is the row-major flattening of the 3x4 projection
/// matrix.
///
/// # Errors
///
/// * [`CalibrationError::InputSizeMismatch`]: if the two slices differ in length.
/// * [`CalibrationError::InsufficientPoints`]: if no correspondence is supplied.
pub fn build_estimation_matrix(
    world_points: &[Vector3<f64>],
    image_points: &[Vector2<f64>],
) -> Result<EstimationMatrix, CalibrationError> {
    if world_points.len() != image_points.len() {
        return Err(CalibrationError::InputSizeMismatch {
            world: world_points.len(),
            image: image_points.len(),
        });
    }
    if world_points.is_empty() {
        return Err(CalibrationError::InsufficientPoints {
            required: 1,
            found: 0,
        });
    }

    let mut a = EstimationMatrix::zeros(2 * world_points.len());

    for (i, (world, image)) in world_points.iter().zip(image_points.iter()).enumerate() {
        let (x, y, z) = (world.x, world.y, world.z);
        let (u, v) = (image.x, image.y);

        #[rustfmt::skip]
        let rows = [
            [x, y, z, 1.0, 0.0, 0.0, 0.0, 0.0, -u * x, -u * y, -u * z, -u],
            [0.0, 0.0, 0.0, 0.0, x, y, z, 1.0, -v * x, -v * y, -v * z, -v],
        ];

        for (offset, row) in rows.iter().enumerate() {
            a.row_mut(2 * i + offset).copy_from_slice(row);
        }
    }

    Ok(a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix3x4, SVector};

    #[test]
    fn test_estimation_matrix_layout() {
        let world = [Vector3::new(1.0, 2.0, 3.0)];
        let image = [Vector2::new(10.0, 20.0)];

        let a = build_estimation_matrix(&world, &image).unwrap();
        assert_eq!(a.nrows(), 2);
        assert_eq!(a.ncols(), 12);

        let expected_u = [1.0, 2.0, 3.0, 1.0, 0.0, 0.0, 0.0, 0.0, -10.0, -20.0, -30.0, -10.0];
        let expected_v = [0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 1.0, -20.0, -40.0, -60.0, -20.0];
        for j in 0..12 {
            assert_eq!(a[(0, j)], expected_u[j]);
            assert_eq!(a[(1, j)], expected_v[j]);
        }
    }

    #[test]
    fn test_true_projection_is_in_null_space() {
        #[rustfmt::skip]
        let p = Matrix3x4::new(
            800.0, 0.0, 320.0, 50.0,
            0.0, 780.0, 240.0, -20.0,
            0.0, 0.0, 1.0, 4.0,
        );
        let world: Vec<_> = (0..8)
            .map(|i| Vector3::new(i as f64, (i * i) as f64 * 0.1, 1.0 + (i % 3) as f64))
            .collect();
        let image: Vec<_> = world
            .iter()
            .map(|w| {
                let x = p * w.push(1.0);
                Vector2::new(x.x / x.z, x.y / x.z)
            })
            .collect();

        let a = build_estimation_matrix(&world, &image).unwrap();
        let flat = SVector::<f64, 12>::from_iterator(p.transpose().iter().copied());
        let residual = (&a * flat).norm();
        let bound = 1e-12 * a.norm() * flat.norm();
        assert!(residual < bound, "residual too large: {residual}");
    }

    #[test]
    fn test_estimation_matrix_size_mismatch() {
        let world = vec![Vector3::new(0.0, 0.0, 1.0); 7];
        let image = vec![Vector2::new(0.0, 0.0); 6];

        assert!(matches!(
            build_estimation_matrix(&world, &image),
            Err(CalibrationError::InputSizeMismatch { world: 7, image: 6 })
        ));
    }
}
