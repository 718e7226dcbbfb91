pub mod roboflow;

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

// ── Public types ─────────────────────────────────────────────────────────────

/// One candidate screen box, in original-photo pixels.
///
/// `x`/`y` are the box centre, matching the hosted detector's response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
}

impl Detection {
    /// Box given by its top-left corner, at full confidence.
    pub fn from_top_left(x: f64, y: f64, width: f64, height: f64) -> Self {
        Detection {
            x: x + width / 2.0,
            y: y + height / 2.0,
            width,
            height,
            confidence: 1.0,
            class: None,
        }
    }
}

/// Every screen locator implements this.
/// The core only ever looks at the single most confident box.
pub trait ScreenDetector {
    fn name(&self) -> &str;
    fn detect(&self, photo: &Path) -> Result<Vec<Detection>, PipelineError>;
}

/// Highest-confidence detection, or `DetectionEmpty`.
pub fn best_detection(detections: &[Detection]) -> Result<&Detection, PipelineError> {
    detections
        .iter()
        .max_by(|a, b| {
            a.confidence
                .partial_cmp(&b.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .ok_or(PipelineError::DetectionEmpty)
}

/// Detections as JSON: either a bare array or a response object with a
/// `predictions` array.
#[derive(Deserialize)]
#[serde(untagged)]
enum DetectionsDoc {
    Bare(Vec<Detection>),
    Response { predictions: Vec<Detection> },
}

pub fn parse_detections(text: &str) -> Result<Vec<Detection>, PipelineError> {
    let doc: DetectionsDoc = serde_json::from_str(text)
        .map_err(|e| PipelineError::Detector(format!("bad detections JSON: {e}")))?;
    Ok(match doc {
        DetectionsDoc::Bare(v) => v,
        DetectionsDoc::Response { predictions } => predictions,
    })
}

// ── Offline detectors ────────────────────────────────────────────────────────

/// Always returns the same boxes (e.g. a screen position given on the
/// command line).
pub struct FixedDetector {
    pub detections: Vec<Detection>,
}

impl ScreenDetector for FixedDetector {
    fn name(&self) -> &str {
        "fixed"
    }

    fn detect(&self, _photo: &Path) -> Result<Vec<Detection>, PipelineError> {
        Ok(self.detections.clone())
    }
}

/// Reads previously saved detections from a JSON file.
pub struct FileDetector {
    pub path: PathBuf,
}

impl ScreenDetector for FileDetector {
    fn name(&self) -> &str {
        "file"
    }

    fn detect(&self, _photo: &Path) -> Result<Vec<Detection>, PipelineError> {
        let text = fs::read_to_string(&self.path).map_err(|e| {
            PipelineError::Detector(format!("cannot read {}: {e}", self.path.display()))
        })?;
        let detections = parse_detections(&text)?;
        info!(
            "[detector] {} detections from {}",
            detections.len(),
            self.path.display()
        );
        Ok(detections)
    }
}
