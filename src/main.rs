//! Command-line front end for DLT camera calibration.
//!
//! Usage:
//! ```bash
//! dlt-calibration calibration.csv --data validation.csv --graph=frame.png -o overlay.png
//! ```
//!
//! Every CSV record is `x,y,z,u,v`: a world point and its observed pixel.

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use dlt_calibration::camera::PinholeCamera;
use dlt_calibration::util::plot::{render_plot, save_plot, PlotData};
use dlt_calibration::util::{
    compute_reprojection_error, load_correspondences, load_image, ReprojectionErrorReport,
};
use dlt_calibration::{calibrate, Parameters};
use flexi_logger::{
    colored_detailed_format, detailed_format, Duplicate, FileSpec, Logger, LoggerHandle,
};
use log::{error, info, warn};
use nalgebra::{SMatrix, Vector2, Vector3};
use serde::Serialize;
use std::path::PathBuf;

/// Pinhole camera calibration from 3D-2D correspondences
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// CSV file with the calibration correspondences
    path: PathBuf,

    /// CSV file with held-out correspondences used for validation
    #[arg(short = 'd', long)]
    data: Option<PathBuf>,

    /// Render a graph, optionally on top of a background image (use `--graph=IMAGE`)
    #[arg(short = 'g', long, num_args = 0..=1, default_missing_value = "")]
    graph: Option<String>,

    /// Output file of the graph
    #[arg(short = 'o', long, default_value = "calibration_plot.png")]
    out: PathBuf,

    /// Do not print the calibration report
    #[arg(long)]
    noprint: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Log level filter, e.g. `warn`, `info` or `debug`
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Also write logs into this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

impl Cli {
    fn background(&self) -> Option<&str> {
        self.graph.as_deref().filter(|g| !g.is_empty())
    }
}

/// Everything the tool reports about one calibration run.
#[derive(Debug, Serialize)]
struct CalibrationReport {
    projection_matrix: [[f64; 4]; 3],
    calibration_matrix: [[f64; 3]; 3],
    rotation_matrix: [[f64; 3]; 3],
    translation: [f64; 3],
    camera_center: [f64; 3],
    parameters: Option<Parameters>,
    world_origin: Option<[f64; 2]>,
    residual: f64,
    validation: Option<ReprojectionErrorReport>,
}

fn rows<const R: usize, const C: usize>(m: &SMatrix<f64, R, C>) -> [[f64; C]; R] {
    std::array::from_fn(|r| std::array::from_fn(|c| m[(r, c)]))
}

fn init_logger(cli: &Cli) -> Result<LoggerHandle, Box<dyn std::error::Error>> {
    // Palette "error;warn;info;debug;trace": bright red, orange, green, cyan, gold
    let mut logger = Logger::try_with_str(&cli.log_level)?
        .format_for_stderr(colored_detailed_format)
        .set_palette("196;208;76;39;178".to_string());

    if let Some(dir) = &cli.log_dir {
        logger = logger
            .log_to_file(
                FileSpec::default()
                    .directory(dir.clone())
                    .suppress_timestamp()
                    .suffix("log"),
            )
            .duplicate_to_stderr(Duplicate::All)
            .format_for_files(detailed_format);
    }

    Ok(logger.start()?)
}

fn print_text(camera: &PinholeCamera, report: &CalibrationReport) {
    println!("Projection matrix P:{:.3}", camera.projection);
    println!("Calibration matrix K:{:.3}", camera.calibration);
    println!("Rotation matrix R:{:.3}", camera.rotation);

    if let Some(params) = &report.parameters {
        let intrinsics = &params.intrinsics;
        println!("Focal lengths:   fx = {:.3}, fy = {:.3}", intrinsics.fx, intrinsics.fy);
        println!("Principal point: cx = {:.3}, cy = {:.3}", intrinsics.cx, intrinsics.cy);
        println!(
            "Orientation:     alpha = {:.3}°, beta = {:.3}°, gamma = {:.3}°",
            params.orientation.alpha, params.orientation.beta, params.orientation.gamma
        );
    }

    let [tx, ty, tz] = report.translation;
    println!("Translation:     [{tx:.3}, {ty:.3}, {tz:.3}]");
    let [x, y, z] = report.camera_center;
    println!("Camera center:   [{x:.3}, {y:.3}, {z:.3}]");
    if let Some([u, v]) = report.world_origin {
        println!("World origin:    ({u:.3}, {v:.3})");
    }
    println!("Residual:        {:e}", report.residual);

    if let Some(validation) = &report.validation {
        println!("Reprojection errors (px):");
        for (i, e) in validation.errors.iter().enumerate() {
            println!("  {:>4}: {e:.3}", i + 1);
        }
        println!(
            "  max = {:.3}, mean = {:.3}, min = {:.3}, rmse = {:.3}, median = {:.3}",
            validation.max, validation.mean, validation.min, validation.rmse, validation.median
        );
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let (world_points, image_points) = load_correspondences(&cli.path)?;
    let result = calibrate(&world_points, &image_points)?;
    let camera = &result.camera;

    let parameters = match camera.parameters() {
        Ok(params) => Some(params),
        Err(e) => {
            warn!("Parameters could not be extracted: {e}");
            None
        }
    };

    let world_origin = match camera.project(&Vector3::zeros()) {
        Ok(origin) => Some(origin),
        Err(e) => {
            warn!("World origin has no image: {e}");
            None
        }
    };

    let mut validation = None;
    let mut plot = PlotData {
        calibration_points: image_points,
        principal_point: Some(Vector2::new(
            camera.calibration[(0, 2)],
            camera.calibration[(1, 2)],
        )),
        origin: world_origin,
        ..Default::default()
    };

    if let Some(data) = &cli.data {
        let (world, observed) = load_correspondences(data)?;
        validation = Some(compute_reprojection_error(
            &camera.projection,
            &world,
            &observed,
        )?);
        plot.predictions = camera.project_points(&world)?;
        plot.ground_truth = observed;
    }

    let center = camera.camera_center();
    let report = CalibrationReport {
        projection_matrix: rows(&camera.projection),
        calibration_matrix: rows(&camera.calibration),
        rotation_matrix: rows(&camera.rotation),
        translation: [camera.translation.x, camera.translation.y, camera.translation.z],
        camera_center: [center.x, center.y, center.z],
        parameters,
        world_origin: world_origin.map(|o| [o.x, o.y]),
        residual: result.residual,
        validation,
    };

    if !cli.noprint {
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_text(camera, &report);
        }
    }

    if cli.graph.is_some() {
        let background = cli.background().map(load_image).transpose()?;
        let img = render_plot(&plot, background);
        save_plot(&img, &cli.out)?;
    }

    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.background().is_some() && cli.data.is_none() {
        Cli::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "a background image for --graph requires --data",
            )
            .exit();
    }

    let _logger = init_logger(&cli)?;
    info!("Calibration input: {:?}", cli.path);

    if let Err(e) = run(&cli) {
        error!("Calibration failed: {e}");
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_graph_without_background() {
        let cli = Cli::try_parse_from(["dlt-calibration", "points.csv", "--graph"]).unwrap();
        assert_eq!(cli.graph.as_deref(), Some(""));
        assert!(cli.background().is_none());
        assert_eq!(cli.out, PathBuf::from("calibration_plot.png"));
        assert_eq!(cli.log_level, "warn");
    }

    #[test]
    fn test_cli_parses_graph_with_background() {
        let cli = Cli::try_parse_from([
            "dlt-calibration",
            "points.csv",
            "--graph=frame.png",
            "-d",
            "held_out.csv",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.background(), Some("frame.png"));
        assert_eq!(cli.data, Some(PathBuf::from("held_out.csv")));
        assert!(cli.json);
        assert!(!cli.noprint);
    }

    #[test]
    fn test_rows() {
        let m = nalgebra::Matrix2x3::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        assert_eq!(rows(&m), [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }
}
