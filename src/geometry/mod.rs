//! Coordinate helpers used throughout the calibration pipeline.
//!
//! Provides homogeneous/inhomogeneous conversion, Euclidean distances and the
//! Hartley conditioning applied to point sets before building the DLT system.

use crate::camera::{CalibrationError, SINGULARITY_TOLERANCE};
use log::debug;
use nalgebra::{DVector, Matrix3, Matrix4, Vector2, Vector3};

/// Appends a unit homogeneous coordinate to `v`.
pub fn to_homogeneous(v: &DVector<f64>) -> DVector<f64> {
    DVector::from_iterator(v.len() + 1, v.iter().copied().chain(std::iter::once(1.0)))
}

/// Divides all but the last coordinate of `v` by the last one.
///
/// # Errors
///
/// * [`CalibrationError::DimensionMismatch`] if `v` is empty.
/// * [`CalibrationError::DegenerateProjection`] if the last coordinate is zero
///   (a point at infinity has no inhomogeneous representation).
pub fn to_inhomogeneous(v: &DVector<f64>) -> Result<DVector<f64>, CalibrationError> {
    let n = v.len();
    if n == 0 {
        return Err(CalibrationError::DimensionMismatch { left: 0, right: 1 });
    }
    let w = v[n - 1];
    if w == 0.0 || !w.is_finite() {
        return Err(CalibrationError::DegenerateProjection);
    }
    Ok(DVector::from_iterator(
        n - 1,
        v.iter().take(n - 1).map(|v_i| v_i / w),
    ))
}

/// Euclidean (L2) distance between two points of equal dimension.
///
/// # Examples
///
/// ```rust
/// use dlt_calibration::geometry::euclidean;
///
/// let d = euclidean(&[0.0, 0.0], &[3.0, 4.0]).unwrap();
/// assert!((d - 5.0).abs() < 1e-12);
/// assert!(euclidean(&[0.0, 0.0], &[1.0, 2.0, 3.0]).is_err());
/// ```
pub fn euclidean(a: &[f64], b: &[f64]) -> Result<f64, CalibrationError> {
    if a.len() != b.len() {
        return Err(CalibrationError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    Ok(a.iter()
        .zip(b.iter())
        .map(|(a_i, b_i)| (b_i - a_i).powi(2))
        .sum::<f64>()
        .sqrt())
}

/// Pixel distance between an observed image point and its reprojection.
pub fn reprojection_error(actual: &Vector2<f64>, predicted: &Vector2<f64>) -> f64 {
    (predicted - actual).norm()
}

/// Centers 2D points on their centroid and scales them to a mean distance of `sqrt(2)`.
///
/// Returns the conditioned points together with the 3x3 transform `T` such that
/// `p_norm = T * p_homogeneous`.
pub fn normalize_image_points(
    points: &[Vector2<f64>],
) -> Result<(Vec<Vector2<f64>>, Matrix3<f64>), CalibrationError> {
    if points.is_empty() {
        return Err(CalibrationError::InsufficientPoints {
            required: 1,
            found: 0,
        });
    }

    let n = points.len() as f64;
    let centroid = points.iter().sum::<Vector2<f64>>() / n;
    let mean_dist = points.iter().map(|p| (p - centroid).norm()).sum::<f64>() / n;

    if mean_dist <= f64::EPSILON {
        return Err(CalibrationError::SingularMatrix);
    }

    let scale = 2.0_f64.sqrt() / mean_dist;
    debug!("Image point conditioning: centroid = {centroid:?}, scale = {scale}");

    #[rustfmt::skip]
    let t = Matrix3::new(
        scale, 0.0, -scale * centroid.x,
        0.0, scale, -scale * centroid.y,
        0.0, 0.0, 1.0,
    );
    let normalized = points.iter().map(|p| (p - centroid) * scale).collect();

    Ok((normalized, t))
}

/// 3D analog of [`normalize_image_points`] with a target mean distance of `sqrt(3)`.
pub fn normalize_world_points(
    points: &[Vector3<f64>],
) -> Result<(Vec<Vector3<f64>>, Matrix4<f64>), CalibrationError> {
    if points.is_empty() {
        return Err(CalibrationError::InsufficientPoints {
            required: 1,
            found: 0,
        });
    }

    let n = points.len() as f64;
    let centroid = points.iter().sum::<Vector3<f64>>() / n;
    let mean_dist = points.iter().map(|p| (p - centroid).norm()).sum::<f64>() / n;

    if mean_dist <= f64::EPSILON {
        return Err(CalibrationError::SingularMatrix);
    }

    let scale = 3.0_f64.sqrt() / mean_dist;
    debug!("World point conditioning: centroid = {centroid:?}, scale = {scale}");

    #[rustfmt::skip]
    let t = Matrix4::new(
        scale, 0.0, 0.0, -scale * centroid.x,
        0.0, scale, 0.0, -scale * centroid.y,
        0.0, 0.0, scale, -scale * centroid.z,
        0.0, 0.0, 0.0, 1.0,
    );
    let normalized = points.iter().map(|p| (p - centroid) * scale).collect();

    Ok((normalized, t))
}

/// Fails with [`CalibrationError::SingularMatrix`] unless `points` span a volume.
///
/// The DLT cannot recover the depth column of `P` from a planar, collinear or
/// coincident target, so such configurations are rejected up front.
pub fn check_depth_variation(points: &[Vector3<f64>]) -> Result<(), CalibrationError> {
    if points.is_empty() {
        return Err(CalibrationError::SingularMatrix);
    }

    let centroid = points.iter().sum::<Vector3<f64>>() / points.len() as f64;
    let scatter = points
        .iter()
        .map(|p| {
            let d = p - centroid;
            d * d.transpose()
        })
        .sum::<Matrix3<f64>>();

    let eigenvalues = scatter.symmetric_eigenvalues();
    let largest = eigenvalues.max();
    let smallest = eigenvalues.min();
    debug!("World point scatter eigenvalues: {eigenvalues:?}");

    if largest <= 0.0 || smallest <= SINGULARITY_TOLERANCE * largest {
        return Err(CalibrationError::SingularMatrix);
    }
    Ok(())
}
