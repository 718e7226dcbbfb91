use std::path::Path;

use log::{info, warn};
use serde::Serialize;

use crate::config::{Expectations, ReaderConfig, ReadingExpectation};
use crate::detector::{best_detection, ScreenDetector};
use crate::error::PipelineError;
use crate::frame;
use crate::ocr::{self, assemble::encode_jpeg_b64, assemble::Readings};

/// Exactly one of these is produced per photo.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReadResult {
    Reading {
        sys: String,
        dia: String,
        pulse: String,
        #[serde(rename = "annotatedImage")]
        annotated_image: String,
    },
    Failure {
        error: String,
    },
}

impl ReadResult {
    pub fn reading(readings: Readings, annotated_image: String) -> Self {
        ReadResult::Reading {
            sys: readings.sys,
            dia: readings.dia,
            pulse: readings.pulse,
            annotated_image,
        }
    }

    pub fn failure(err: &PipelineError) -> Self {
        ReadResult::Failure {
            error: err.to_string(),
        }
    }
}

/// Locate the screen, read it, and package the outcome.
///
/// Never fails: the first stage error becomes `ReadResult::Failure`.
/// When `mask_dump` is set the binary mask is also written there as PNG.
pub fn process_image(
    photo: &Path,
    detector: &dyn ScreenDetector,
    config: &ReaderConfig,
    mask_dump: Option<&Path>,
) -> ReadResult {
    match run(photo, detector, config, mask_dump) {
        Ok(result) => result,
        Err(e) => {
            warn!("[processor] {}: {e}", photo.display());
            ReadResult::failure(&e)
        }
    }
}

fn run(
    photo: &Path,
    detector: &dyn ScreenDetector,
    config: &ReaderConfig,
    mask_dump: Option<&Path>,
) -> Result<ReadResult, PipelineError> {
    let detections = detector.detect(photo)?;
    let best = best_detection(&detections)?;
    info!(
        "[processor] {} picked box {:.0}×{:.0} at ({:.0}, {:.0}) conf={:.3} of {}",
        detector.name(),
        best.width,
        best.height,
        best.x,
        best.y,
        best.confidence,
        detections.len()
    );

    let image = frame::load_photo(photo)?;
    let working = frame::to_working(&image, config.frame.working_height);
    let roi = frame::crop_roi(&working, best)?;

    let recognition = ocr::read_roi(&roi, &working.image, config)?;

    if let Some(path) = mask_dump {
        if let Err(e) = recognition.mask.as_gray().save(path) {
            warn!("[processor] cannot write mask to {}: {e}", path.display());
        }
    }

    if config.validate_ranges {
        validate_readings(&recognition.readings, &config.expectations)?;
    }

    info!(
        "[processor] sys={:?} dia={:?} pulse={:?}",
        recognition.readings.sys, recognition.readings.dia, recognition.readings.pulse
    );
    let encoded = encode_jpeg_b64(&recognition.annotated, config.frame.jpeg_quality);
    Ok(ReadResult::reading(recognition.readings, encoded))
}

/// All three readings must be numeric and inside their expected ranges.
pub fn validate_readings(readings: &Readings, exp: &Expectations) -> Result<(), PipelineError> {
    check_reading("SYS", &readings.sys, &exp.sys)?;
    check_reading("DIA", &readings.dia, &exp.dia)?;
    check_reading("PULSE", &readings.pulse, &exp.pulse)
}

fn check_reading(label: &str, text: &str, exp: &ReadingExpectation) -> Result<(), PipelineError> {
    let value: u32 = text
        .parse()
        .map_err(|_| PipelineError::MissingReading(label.to_string()))?;
    if exp.contains(value) {
        return Ok(());
    }
    Err(PipelineError::OutOfRange(format!(
        "{label} value is out of range ({}).",
        describe_range(exp)
    )))
}

fn describe_range(exp: &ReadingExpectation) -> String {
    match (exp.min, exp.max) {
        (Some(lo), Some(hi)) => format!("{lo}-{hi}"),
        (Some(lo), None) => format!(">= {lo}"),
        (None, Some(hi)) => format!("<= {hi}"),
        (None, None) => "any".to_string(),
    }
}
