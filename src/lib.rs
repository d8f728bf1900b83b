//! DLT Calibration Library
//!
//! Pinhole camera calibration from 3D-2D point correspondences using the
//! Direct Linear Transformation. The library provides:
//! - Estimation of the 3x4 projection matrix from at least six correspondences
//! - Decomposition into calibration matrix, rotation and translation
//! - Extraction of focal lengths, principal point and ZYX Euler angles
//! - Reprojection error statistics on held-out correspondences
//! - CSV loading of correspondences and PNG rendering of the results

pub mod calibration;
pub mod camera;
pub mod geometry;
pub mod util;

// Re-export commonly used types
pub use calibration::{calibrate, CalibrationResult};
pub use camera::pinhole::project;
pub use camera::{CalibrationError, Intrinsics, Orientation, Parameters, PinholeCamera};
pub use geometry::{euclidean, reprojection_error};
pub use util::{compute_reprojection_error, load_correspondences, ReprojectionErrorReport};
