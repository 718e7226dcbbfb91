pub mod config;
pub mod detector;
pub mod error;
pub mod frame;
pub mod ocr;
pub mod processor;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use config::{load_config, save_config, ReaderConfig};
use detector::{roboflow::RoboflowDetector, Detection, FileDetector, FixedDetector, ScreenDetector};
use processor::process_image;

/// Read systolic, diastolic and pulse values from a photo of a
/// 7-segment blood-pressure monitor.
#[derive(Debug, Parser)]
#[command(name = "bpreader", version)]
struct Cli {
    /// Photo of the monitor.
    #[arg(required_unless_present = "write_config")]
    image: Option<PathBuf>,

    /// JSON config overriding the built-in constants.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Screen box in original-photo pixels as X,Y,W,H (top-left corner);
    /// skips the hosted detector.
    #[arg(long, value_parser = parse_roi, conflicts_with = "detections")]
    roi: Option<Detection>,

    /// JSON file with saved detections (bare array or `{"predictions": [...]}`).
    #[arg(long)]
    detections: Option<PathBuf>,

    /// Reject readings that are missing or outside the expected ranges.
    #[arg(long)]
    validate: bool,

    /// Write the binary mask of the screen region as PNG.
    #[arg(long)]
    dump_mask: Option<PathBuf>,

    /// Pretty-print the JSON result.
    #[arg(long)]
    pretty: bool,

    /// Write the effective config to this path.
    #[arg(long)]
    write_config: Option<PathBuf>,
}

fn parse_roi(s: &str) -> Result<Detection, String> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("expected X,Y,W,H: {e}"))?;
    let [x, y, w, h] = parts[..] else {
        return Err(format!("expected 4 comma-separated numbers, got {}", parts.len()));
    };
    if w <= 0.0 || h <= 0.0 {
        return Err("width and height must be positive".to_string());
    }
    Ok(Detection::from_top_left(x, y, w, h))
}

pub fn run() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ReaderConfig::default(),
    };
    if cli.validate {
        config.validate_ranges = true;
    }

    if let Some(path) = &cli.write_config {
        save_config(path, &config)?;
        log::info!("config written to {}", path.display());
    }

    let Some(image) = &cli.image else {
        return Ok(());
    };

    let detector: Box<dyn ScreenDetector> = if let Some(roi) = cli.roi.clone() {
        Box::new(FixedDetector {
            detections: vec![roi],
        })
    } else if let Some(path) = &cli.detections {
        Box::new(FileDetector { path: path.clone() })
    } else {
        Box::new(
            RoboflowDetector::from_env(config.detector.clone())
                .context("no --roi/--detections given and the hosted detector is not configured")?,
        )
    };

    let result = process_image(image, detector.as_ref(), &config, cli.dump_mask.as_deref());
    let json = if cli.pretty {
        serde_json::to_string_pretty(&result)
    } else {
        serde_json::to_string(&result)
    }
    .context("Serialise error")?;
    println!("{json}");
    Ok(())
}
