use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Plausible range for one reading.
///
/// Both bounds are optional; unset bounds impose no constraint.
/// Used by `processor::validate_readings` when range validation is enabled.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ReadingExpectation {
    /// Minimum acceptable value (inclusive).
    pub min: Option<u32>,
    /// Maximum acceptable value (inclusive).
    pub max: Option<u32>,
}

impl ReadingExpectation {
    pub fn between(min: u32, max: u32) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn contains(&self, value: u32) -> bool {
        self.min.map_or(true, |m| value >= m) && self.max.map_or(true, |m| value <= m)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Expectations {
    #[serde(default = "default_sys_range")]
    pub sys: ReadingExpectation,
    #[serde(default = "default_dia_range")]
    pub dia: ReadingExpectation,
    #[serde(default = "default_pulse_range")]
    pub pulse: ReadingExpectation,
}

fn default_sys_range() -> ReadingExpectation {
    ReadingExpectation::between(70, 260)
}

fn default_dia_range() -> ReadingExpectation {
    ReadingExpectation::between(40, 160)
}

fn default_pulse_range() -> ReadingExpectation {
    ReadingExpectation::between(30, 240)
}

impl Default for Expectations {
    fn default() -> Self {
        Self {
            sys: default_sys_range(),
            dia: default_dia_range(),
            pulse: default_pulse_range(),
        }
    }
}

/// Binarization constants for the ROI preprocessor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PreprocessConfig {
    /// CLAHE clip limit, relative to the uniform bin height of a tile.
    pub clip_limit: f32,
    /// Number of CLAHE tiles along each axis.
    pub tile_grid: u32,
    /// Median filter radius (1 → 3×3 kernel).
    pub median_radius: u32,
    /// Side (odd, in px) of the Gaussian-weighted neighbourhood used for the
    /// local threshold; the kernel has exactly this many taps.
    pub threshold_block_size: u32,
    /// Subtracted from the weighted local mean before comparing.
    pub threshold_offset: i32,
    /// Side of the square structuring element used for closing.
    pub close_kernel: u8,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            clip_limit: 2.0,
            tile_grid: 8,
            median_radius: 1,
            threshold_block_size: 21,
            threshold_offset: 10,
            close_kernel: 4,
        }
    }
}

/// Bounding-box filter for glyph candidates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GlyphConfig {
    /// Boxes must be strictly taller than this.
    pub min_height: u32,
    /// Inclusive lower bound on width/height.
    pub min_aspect: f64,
    /// Exclusive upper bound on width/height.
    pub max_aspect: f64,
}

impl Default for GlyphConfig {
    fn default() -> Self {
        Self {
            min_height: 20,
            min_aspect: 0.1,
            max_aspect: 1.0,
        }
    }
}

/// Probe geometry for the 7-segment decoder, as fractions of the glyph box.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SegmentConfig {
    /// Glyphs narrower than this (width/height) are read as `1` outright.
    pub narrow_aspect: f64,
    /// Width of the vertical bars.
    pub vertical_bar_width: f64,
    /// Thickness of the top and bottom bars.
    pub horizontal_bar_thickness: f64,
    /// Half-thickness of the middle bar around the vertical centre.
    pub middle_bar_half_thickness: f64,
    /// A probe is "on" when its foreground fraction exceeds this.
    pub on_threshold: f64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            narrow_aspect: 0.4,
            vertical_bar_width: 0.25,
            horizontal_bar_thickness: 0.15,
            middle_bar_half_thickness: 0.05,
            on_threshold: 0.45,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FrameConfig {
    /// Height (px) of the working-resolution copy the ROI is cut from.
    pub working_height: u32,
    /// JPEG quality of the annotated frame.
    pub jpeg_quality: u8,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            working_height: 500,
            jpeg_quality: 95,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectorConfig {
    /// Minimum detection confidence (percent) requested from the hosted model.
    pub confidence: u32,
    /// Maximum box overlap (percent) for the hosted model's NMS.
    pub overlap: u32,
    pub timeout_secs: u64,
    pub endpoint: String,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            confidence: 40,
            overlap: 30,
            timeout_secs: 30,
            endpoint: "https://detect.roboflow.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ReaderConfig {
    #[serde(default)]
    pub preprocess: PreprocessConfig,
    #[serde(default)]
    pub glyphs: GlyphConfig,
    #[serde(default)]
    pub segments: SegmentConfig,
    #[serde(default)]
    pub frame: FrameConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    /// Plausible ranges per reading.  Absent from older configs → monitor defaults.
    #[serde(default)]
    pub expectations: Expectations,
    /// Reject results whose readings are missing or out of range.
    #[serde(default)]
    pub validate_ranges: bool,
}

pub fn load_config(path: &Path) -> Result<ReaderConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Parse error in {}", path.display()))
}

pub fn save_config(path: &Path, config: &ReaderConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context("Cannot create dirs")?;
        }
    }
    let text = serde_json::to_string_pretty(config).context("Serialise error")?;
    fs::write(path, text).with_context(|| format!("Cannot write {}", path.display()))
}
