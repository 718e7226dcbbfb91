use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::Engine;
use log::{debug, info};

use super::{parse_detections, Detection, ScreenDetector};
use crate::config::DetectorConfig;
use crate::error::PipelineError;

pub const API_KEY_VAR: &str = "ROBOFLOW_API_KEY";
pub const PROJECT_VAR: &str = "ROBOFLOW_PROJECT_ID";
pub const VERSION_VAR: &str = "ROBOFLOW_VERSION_NUMBER";

/// Hosted Roboflow object-detection model that locates the monitor screen.
pub struct RoboflowDetector {
    pub api_key: String,
    pub project: String,
    pub version: u32,
    pub settings: DetectorConfig,
}

impl RoboflowDetector {
    /// Credentials from `ROBOFLOW_API_KEY`, `ROBOFLOW_PROJECT_ID` and
    /// `ROBOFLOW_VERSION_NUMBER`.
    pub fn from_env(settings: DetectorConfig) -> Result<Self> {
        let var = |name: &str| env::var(name).with_context(|| format!("{name} is not set"));
        let version = var(VERSION_VAR)?;
        Ok(RoboflowDetector {
            api_key: var(API_KEY_VAR)?,
            project: var(PROJECT_VAR)?,
            version: version
                .trim()
                .parse()
                .with_context(|| format!("{VERSION_VAR} is not a number: {version:?}"))?,
            settings,
        })
    }

    pub fn model_url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.settings.endpoint.trim_end_matches('/'),
            self.project,
            self.version
        )
    }

    fn request(&self, photo_b64: &str) -> Result<String> {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(self.settings.timeout_secs))
            .build();
        let resp = agent
            .post(&self.model_url())
            .query("api_key", &self.api_key)
            .query("confidence", &self.settings.confidence.to_string())
            .query("overlap", &self.settings.overlap.to_string())
            .set("Content-Type", "application/x-www-form-urlencoded")
            .send_string(photo_b64)
            .context("inference request failed")?;
        resp.into_string().context("cannot read inference response")
    }
}

impl ScreenDetector for RoboflowDetector {
    fn name(&self) -> &str {
        "roboflow"
    }

    fn detect(&self, photo: &Path) -> Result<Vec<Detection>, PipelineError> {
        let bytes = fs::read(photo).map_err(|e| {
            PipelineError::ImageLoadFailure(format!("{}: {e}", photo.display()))
        })?;
        let b64 = base64::engine::general_purpose::STANDARD.encode(&bytes);

        debug!("[detector] POST {} ({} bytes)", self.model_url(), bytes.len());
        let body = self
            .request(&b64)
            .map_err(|e| PipelineError::Detector(format!("{e:#}")))?;

        let detections = parse_detections(&body)?;
        info!("[detector] roboflow returned {} boxes", detections.len());
        Ok(detections)
    }
}
