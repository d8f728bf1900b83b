//! Validation statistics and input loading around the calibration core.

use crate::camera::pinhole::project;
use crate::camera::{CalibrationError, ProjectionMatrix};
use crate::geometry::reprojection_error;
use image::RgbImage;
use log::{debug, info};
use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::Path;

pub mod plot;

/// Number of fields in a correspondence record: `x,y,z,u,v`.
const RECORD_FIELDS: usize = 5;

/// Per-point reprojection errors (pixels) and their aggregate statistics.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ReprojectionErrorReport {
    pub errors: Vec<f64>,
    pub max: f64,
    pub mean: f64,
    pub min: f64,
    pub rmse: f64,
    pub median: f64,
}

impl fmt::Debug for ReprojectionErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Reprojection Error [ points: {}, max: {}, mean: {}, min: {}, rmse: {}, median: {} ]",
            self.errors.len(),
            self.max,
            self.mean,
            self.min,
            self.rmse,
            self.median
        )
    }
}

impl ReprojectionErrorReport {
    /// Aggregates per-point errors. Returns `None` for an empty set.
    pub fn from_errors(errors: Vec<f64>) -> Option<Self> {
        if errors.is_empty() {
            return None;
        }

        let n = errors.len() as f64;
        let mean = errors.iter().sum::<f64>() / n;
        let rmse = (errors.iter().map(|e| e.powi(2)).sum::<f64>() / n).sqrt();
        let min = errors.iter().fold(f64::INFINITY, |a, &b| a.min(b));
        let max = errors.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));

        let mut sorted = errors.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        Some(ReprojectionErrorReport {
            errors,
            max,
            mean,
            min,
            rmse,
            median,
        })
    }
}

/// Projects held-out world points through `p` and compares them with their observations.
///
/// # Errors
///
/// * [`CalibrationError::InputSizeMismatch`]: if the slices differ in length.
/// * [`CalibrationError::InsufficientPoints`]: if no correspondence is supplied.
/// * [`CalibrationError::DegenerateProjection`]: if a world point has no finite image.
pub fn compute_reprojection_error(
    p: &ProjectionMatrix,
    world_points: &[Vector3<f64>],
    image_points: &[Vector2<f64>],
) -> Result<ReprojectionErrorReport, CalibrationError> {
    if world_points.len() != image_points.len() {
        return Err(CalibrationError::InputSizeMismatch {
            world: world_points.len(),
            image: image_points.len(),
        });
    }

    let errors = world_points
        .iter()
        .zip(image_points.iter())
        .map(|(world, observed)| -> Result<f64, CalibrationError> {
            let predicted = project(p, world)?;
            Ok(reprojection_error(observed, &predicted))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let report = ReprojectionErrorReport::from_errors(errors).ok_or(
        CalibrationError::InsufficientPoints {
            required: 1,
            found: 0,
        },
    )?;
    info!("{report:?}");
    Ok(report)
}

/// Reads headerless `x,y,z,u,v` records.
///
/// Blank lines and lines starting with `#` are skipped; whitespace around
/// fields is ignored.
///
/// # Errors
///
/// * [`CalibrationError::MalformedRecord`]: if a record does not hold exactly
///   five finite numbers. `line` is 1-based.
/// * [`CalibrationError::CsvError`]: if the input cannot be tokenized.
pub fn read_correspondences<R: Read>(
    reader: R,
) -> Result<(Vec<Vector3<f64>>, Vec<Vector2<f64>>), CalibrationError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut world_points = Vec::new();
    let mut image_points = Vec::new();

    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let line = record
            .position()
            .map(|pos| pos.line() as usize)
            .unwrap_or(index + 1);

        if record.len() != RECORD_FIELDS {
            return Err(CalibrationError::MalformedRecord {
                line,
                reason: format!("expected {RECORD_FIELDS} fields, found {}", record.len()),
            });
        }

        let mut values = [0.0; RECORD_FIELDS];
        for (value, field) in values.iter_mut().zip(record.iter()) {
            *value = field
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| CalibrationError::MalformedRecord {
                    line,
                    reason: format!("'{field}' is not a finite number"),
                })?;
        }

        let [x, y, z, u, v] = values;
        world_points.push(Vector3::new(x, y, z));
        image_points.push(Vector2::new(u, v));
    }

    debug!("Read {} correspondences", world_points.len());
    Ok((world_points, image_points))
}

/// Loads correspondences from a CSV file, see [`read_correspondences`].
pub fn load_correspondences<P: AsRef<Path>>(
    path: P,
) -> Result<(Vec<Vector3<f64>>, Vec<Vector2<f64>>), CalibrationError> {
    let path = path.as_ref();
    info!("Loading correspondences from {}", path.display());
    let file = std::fs::File::open(path)?;
    read_correspondences(file)
}

/// Load an image from file path as RGB.
pub fn load_image<P: AsRef<Path>>(image_path: P) -> Result<RgbImage, CalibrationError> {
    let img = image::open(image_path)?;
    Ok(img.to_rgb8())
}
