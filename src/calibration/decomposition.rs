//! Factorization of a projection matrix into `K`, `R` and `t`.
//!
//! The leading 3x3 block of `P` is split by RQ factorization into an
//! upper-triangular calibration matrix and an orthogonal matrix. Sign
//! ambiguities are resolved so that `K` has a positive diagonal and `R` is a
//! proper rotation, and the scale is fixed by `K[2][2] = 1`. The resulting
//! camera satisfies `P = K [R | t]` exactly.

use crate::camera::{
    CalibrationError, CalibrationMatrix, PinholeCamera, ProjectionMatrix, RotationMatrix,
    SINGULARITY_TOLERANCE,
};
use log::debug;
use nalgebra::{Matrix3, Vector3};

/// RQ factorization `m = K * Q` with `K` upper triangular and `Q` orthogonal.
///
/// No sign convention is imposed on the diagonal of `K`.
pub fn rq_decompose(m: &Matrix3<f64>) -> (CalibrationMatrix, RotationMatrix) {
    // Row/column reversal turns the QR factorization of the flipped transpose
    // into an RQ factorization of `m`.
    #[rustfmt::skip]
    let j = Matrix3::new(
        0.0, 0.0, 1.0,
        0.0, 1.0, 0.0,
        1.0, 0.0, 0.0,
    );

    let qr = (j * m.transpose() * j).qr();
    let k = j * qr.r().transpose() * j;
    let q = j * qr.q().transpose() * j;

    (k, q)
}

/// Decomposes `p` into a normalized [`PinholeCamera`].
///
/// # Errors
///
/// * [`CalibrationError::SingularMatrix`]: if the leading 3x3 block of `p` is
///   not invertible, e.g. for a projection estimated from a planar target.
pub fn decompose_projection_matrix(p: &ProjectionMatrix) -> Result<PinholeCamera, CalibrationError> {
    if p.iter().any(|v| !v.is_finite()) {
        return Err(CalibrationError::NumericInstability(
            "projection matrix contains non-finite entries".to_string(),
        ));
    }

    let m = p.fixed_view::<3, 3>(0, 0).into_owned();
    let scale = m.norm();
    let det = m.determinant();
    if scale == 0.0 || det.abs() <= SINGULARITY_TOLERANCE * scale.powi(3) {
        debug!("Leading block is singular: det = {det:e}, norm = {scale:e}");
        return Err(CalibrationError::SingularMatrix);
    }

    let (k, r) = rq_decompose(&m);

    let signs = Vector3::from_fn(|i, _| if k[(i, i)] < 0.0 { -1.0 } else { 1.0 });
    let d = Matrix3::from_diagonal(&signs);
    let mut k = k * d;
    let mut r = d * r;
    let mut p = *p;

    if r.determinant() < 0.0 {
        // K(-R) = -M: negating the homogeneous P removes the reflection.
        debug!("Negating projection matrix to obtain a proper rotation");
        r = -r;
        p = -p;
    }

    let k22 = k[(2, 2)];
    k /= k22;
    p /= k22;
    debug!("Calibration matrix scale factor: {k22:e}");

    let translation = k
        .solve_upper_triangular(&p.column(3))
        .ok_or(CalibrationError::SingularMatrix)?;

    Ok(PinholeCamera {
        projection: p,
        calibration: k,
        rotation: r,
        translation,
    })
}
