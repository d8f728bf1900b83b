//! Rendering of calibration and validation points onto an image.
//!
//! The overlay draws, in pixel coordinates:
//! - validation ground truth as circles and their predictions as crosses, with
//!   one colour per ground-truth/prediction pair,
//! - calibration points as orange diamonds,
//! - the projected world origin as a green disc,
//! - the principal point as a magenta square.
//!
//! Without a background image, a white canvas is fitted around all points.

use crate::camera::CalibrationError;
use image::{Rgb, RgbImage};
use log::{debug, info, warn};
use nalgebra::Vector2;
use std::path::Path;

const CANVAS_MARGIN: f64 = 40.0;
const MAX_CANVAS_SIZE: f64 = 4096.0;
const DEFAULT_CANVAS: (u32, u32) = (640, 480);
const MARKER_RADIUS: i64 = 5;

const CANVAS_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const CALIBRATION_COLOR: Rgb<u8> = Rgb([255, 140, 0]);
const ORIGIN_COLOR: Rgb<u8> = Rgb([0, 160, 0]);
const PRINCIPAL_POINT_COLOR: Rgb<u8> = Rgb([255, 0, 255]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Circle,
    Cross,
    Diamond,
    Disc,
    Square,
}

/// Points to draw, all in pixel coordinates.
#[derive(Debug, Clone, Default)]
pub struct PlotData {
    pub calibration_points: Vec<Vector2<f64>>,
    pub ground_truth: Vec<Vector2<f64>>,
    pub predictions: Vec<Vector2<f64>>,
    pub principal_point: Option<Vector2<f64>>,
    pub origin: Option<Vector2<f64>>,
}

impl PlotData {
    fn points(&self) -> impl Iterator<Item = &Vector2<f64>> {
        self.calibration_points
            .iter()
            .chain(self.ground_truth.iter())
            .chain(self.predictions.iter())
            .chain(self.principal_point.iter())
            .chain(self.origin.iter())
            .filter(|p| p.x.is_finite() && p.y.is_finite())
    }
}

/// Maps pixel coordinates onto canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CanvasTransform {
    offset: Vector2<f64>,
    scale: f64,
}

impl CanvasTransform {
    fn identity() -> Self {
        CanvasTransform {
            offset: Vector2::zeros(),
            scale: 1.0,
        }
    }

    /// Fits a canvas around `points`; returns the transform and the canvas size.
    fn fit<'a>(points: impl Iterator<Item = &'a Vector2<f64>>) -> (Self, u32, u32) {
        let (min, max) = points.fold(
            (
                Vector2::repeat(f64::INFINITY),
                Vector2::repeat(f64::NEG_INFINITY),
            ),
            |(min, max), p| (min.inf(p), max.sup(p)),
        );

        if !min.x.is_finite() || !max.x.is_finite() {
            return (Self::identity(), DEFAULT_CANVAS.0, DEFAULT_CANVAS.1);
        }

        let extent = max - min + Vector2::repeat(2.0 * CANVAS_MARGIN);
        let scale = (MAX_CANVAS_SIZE / extent.x)
            .min(MAX_CANVAS_SIZE / extent.y)
            .min(1.0);
        let width = (extent.x * scale).ceil().max(1.0) as u32;
        let height = (extent.y * scale).ceil().max(1.0) as u32;

        let transform = CanvasTransform {
            offset: min - Vector2::repeat(CANVAS_MARGIN),
            scale,
        };
        (transform, width, height)
    }

    fn apply(&self, p: &Vector2<f64>) -> Option<(i64, i64)> {
        let q = (p - self.offset) * self.scale;
        if !q.x.is_finite() || !q.y.is_finite() {
            return None;
        }
        Some((q.x.round() as i64, q.y.round() as i64))
    }
}

/// Colour of the `index`-th of `count` ground-truth/prediction pairs.
pub fn pair_color(index: usize, count: usize) -> Rgb<u8> {
    let hue = 300.0 * index as f64 / count.saturating_sub(1).max(1) as f64;
    hsv_to_rgb(hue, 1.0, 0.9)
}

fn hsv_to_rgb(hue: f64, saturation: f64, value: f64) -> Rgb<u8> {
    let c = value * saturation;
    let h = (hue.rem_euclid(360.0)) / 60.0;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = value - c;
    let to_u8 = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgb([to_u8(r), to_u8(g), to_u8(b)])
}

fn put(img: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && x < img.width() as i64 && y < img.height() as i64 {
        img.put_pixel(x as u32, y as u32, color);
    }
}

/// Draws `marker` centred at `(cx, cy)`. Parts outside the image are clipped.
pub fn draw_marker(img: &mut RgbImage, cx: i64, cy: i64, marker: Marker, color: Rgb<u8>) {
    let r = MARKER_RADIUS;
    for dy in -r..=r {
        for dx in -r..=r {
            let dist = ((dx * dx + dy * dy) as f64).sqrt();
            let l1 = dx.abs() + dy.abs();
            let inside = match marker {
                Marker::Circle => (dist - r as f64).abs() <= 0.75,
                Marker::Disc => dist <= r as f64,
                Marker::Cross => (dx - dy).abs() <= 1 || (dx + dy).abs() <= 1,
                Marker::Diamond => l1 == r || l1 == r - 1,
                Marker::Square => true,
            };
            if inside {
                put(img, cx + dx, cy + dy, color);
            }
        }
    }
}

/// Renders `data` onto `background`, or onto a fitted blank canvas.
pub fn render_plot(data: &PlotData, background: Option<RgbImage>) -> RgbImage {
    let (transform, mut img) = match background {
        Some(img) => (CanvasTransform::identity(), img),
        None => {
            let (transform, width, height) = CanvasTransform::fit(data.points());
            debug!("Fitted {width}x{height} canvas, scale = {}", transform.scale);
            (transform, RgbImage::from_pixel(width, height, CANVAS_COLOR))
        }
    };

    let mut skipped = 0usize;
    let mut draw = |img: &mut RgbImage, p: &Vector2<f64>, marker: Marker, color: Rgb<u8>| {
        match transform.apply(p) {
            Some((x, y)) if x >= 0 && y >= 0 && x < img.width() as i64 && y < img.height() as i64 => {
                draw_marker(img, x, y, marker, color)
            }
            _ => skipped += 1,
        }
    };

    let pairs = data.ground_truth.len().max(data.predictions.len());
    for (i, p) in data.ground_truth.iter().enumerate() {
        draw(&mut img, p, Marker::Circle, pair_color(i, pairs));
    }
    for (i, p) in data.predictions.iter().enumerate() {
        draw(&mut img, p, Marker::Cross, pair_color(i, pairs));
    }
    for p in &data.calibration_points {
        draw(&mut img, p, Marker::Diamond, CALIBRATION_COLOR);
    }
    if let Some(origin) = &data.origin {
        draw(&mut img, origin, Marker::Disc, ORIGIN_COLOR);
    }
    if let Some(principal_point) = &data.principal_point {
        draw(&mut img, principal_point, Marker::Square, PRINCIPAL_POINT_COLOR);
    }

    if skipped > 0 {
        warn!("{skipped} point(s) fall outside the plot and were not drawn");
    }
    img
}

/// Writes a rendered plot; the format follows the file extension.
pub fn save_plot<P: AsRef<Path>>(img: &RgbImage, path: P) -> Result<(), CalibrationError> {
    let path = path.as_ref();
    img.save(path)?;
    info!("Graph written to {}", path.display());
    Ok(())
}
