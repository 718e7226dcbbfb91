pub mod assemble;
pub mod glyph;
pub mod lines;
pub mod preprocess;
pub mod segments;

use std::fmt;

use crate::config::ReaderConfig;
use crate::error::PipelineError;
use assemble::Readings;
use image::{imageops, GrayImage, Luma, RgbImage};
use log::debug;
use rayon::prelude::*;

// ── Public types ─────────────────────────────────────────────────────────────

/// Grayscale crop of the working frame that is believed to hold the display,
/// plus where it was cut from (used to place annotations).
#[derive(Debug, Clone)]
pub struct Roi {
    pub image: GrayImage,
    pub offset: (u32, u32),
}

/// Foreground/background pixel grid.  Stored as a `GrayImage` holding only
/// 0 and 255 so it can be handed straight to `imageproc`.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryMask(GrayImage);

const ON: Luma<u8> = Luma([255]);

impl BinaryMask {
    /// All-background mask.
    pub fn new(width: u32, height: u32) -> Self {
        BinaryMask(GrayImage::new(width, height))
    }

    /// Any non-zero pixel becomes foreground.
    pub fn from_gray(mut gray: GrayImage) -> Self {
        for p in gray.pixels_mut() {
            if p[0] != 0 {
                *p = ON;
            }
        }
        BinaryMask(gray)
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn is_on(&self, x: u32, y: u32) -> bool {
        self.0.get_pixel(x, y)[0] != 0
    }

    #[cfg(test)]
    pub(crate) fn set(&mut self, x: u32, y: u32, on: bool) {
        self.0.put_pixel(x, y, if on { ON } else { Luma([0]) });
    }

    /// Switch on every pixel of `[x0, x1) × [y0, y1)`, clipped to the mask.
    pub fn fill(&mut self, x0: u32, y0: u32, x1: u32, y1: u32) {
        for y in y0..y1.min(self.height()) {
            for x in x0..x1.min(self.width()) {
                self.0.put_pixel(x, y, ON);
            }
        }
    }

    /// Foreground pixels inside `[x0, x1) × [y0, y1)`, clipped to the mask.
    pub fn count_on(&self, x0: u32, y0: u32, x1: u32, y1: u32) -> u32 {
        let (x1, y1) = (x1.min(self.width()), y1.min(self.height()));
        let mut total = 0;
        for y in y0..y1 {
            for x in x0..x1 {
                if self.is_on(x, y) {
                    total += 1;
                }
            }
        }
        total
    }

    pub fn is_blank(&self) -> bool {
        self.0.pixels().all(|p| p[0] == 0)
    }

    /// Copy of the pixels under `bbox`.
    pub fn crop(&self, bbox: &BoundingBox) -> BinaryMask {
        BinaryMask(imageops::crop_imm(&self.0, bbox.x, bbox.y, bbox.width, bbox.height).to_image())
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.0
    }
}

/// Axis-aligned box in ROI pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// width / height; 0 for a degenerate box.
    pub fn aspect(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }
}

/// A single candidate digit shape and the part of the mask it covers.
#[derive(Debug, Clone)]
pub struct GlyphCandidate {
    pub bbox: BoundingBox,
    pub mask: BinaryMask,
}

/// Glyphs sharing a vertical band, left to right.
#[derive(Debug, Clone, Default)]
pub struct Line {
    pub glyphs: Vec<GlyphCandidate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Digit {
    Value(u8),
    Unrecognized,
}

impl Digit {
    pub fn value(self) -> Option<u8> {
        match self {
            Digit::Value(v) => Some(v),
            Digit::Unrecognized => None,
        }
    }
}

impl fmt::Display for Digit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Digit::Value(v) => write!(f, "{v}"),
            Digit::Unrecognized => f.write_str("?"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedGlyph {
    pub bbox: BoundingBox,
    pub digit: Digit,
}

/// Everything the core produces for one ROI.
#[derive(Debug, Clone)]
pub struct Recognition {
    pub readings: Readings,
    /// Decoded glyphs per line, top to bottom.
    pub lines: Vec<Vec<DecodedGlyph>>,
    /// Working frame with boxes and digit labels drawn on it.
    pub annotated: RgbImage,
    pub mask: BinaryMask,
}

// ── Orchestration ────────────────────────────────────────────────────────────

/// Run the whole core on a cropped ROI:
/// binarize → extract glyphs → group lines → decode → assemble.
///
/// `frame` is the working-resolution image the ROI was cut from; the
/// returned annotation is drawn on a copy of it.
pub fn read_roi(
    roi: &Roi,
    frame: &RgbImage,
    config: &ReaderConfig,
) -> Result<Recognition, PipelineError> {
    let mask = preprocess::binarize(&roi.image, &config.preprocess)?;
    debug!(
        "[ocr] binarized {}×{} ROI at {:?}",
        mask.width(),
        mask.height(),
        roi.offset
    );
    read_mask(mask, roi.offset, frame, config)
}

/// Everything after binarization, starting from an existing mask.
pub fn read_mask(
    mask: BinaryMask,
    offset: (u32, u32),
    frame: &RgbImage,
    config: &ReaderConfig,
) -> Result<Recognition, PipelineError> {
    if mask.is_blank() {
        debug!("[ocr] mask has no foreground");
        return Err(PipelineError::NoGlyphsFound);
    }
    let candidates = glyph::extract_glyphs(&mask, &config.glyphs)?;
    let lines = lines::group_lines(candidates)?;
    let decoded = decode_lines(&lines, &config.segments);

    for (i, line) in decoded.iter().enumerate() {
        let shown: String = line.iter().map(|g| g.digit.to_string()).collect();
        debug!("[ocr] line {i}: {} glyphs → {shown:?}", line.len());
    }

    let readings = Readings::from_lines(&decoded);
    let annotated = assemble::annotate(frame, &decoded, offset);
    Ok(Recognition {
        readings,
        lines: decoded,
        annotated,
        mask,
    })
}

/// Glyph decodes are independent of each other, so each line is decoded in
/// parallel; `collect` keeps the left-to-right order.
fn decode_lines(
    lines: &[Line],
    config: &crate::config::SegmentConfig,
) -> Vec<Vec<DecodedGlyph>> {
    lines
        .iter()
        .map(|line| {
            line.glyphs
                .par_iter()
                .map(|g| DecodedGlyph {
                    bbox: g.bbox,
                    digit: segments::decode_glyph(g, config),
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_counts_and_crops() {
        let mut mask = BinaryMask::new(10, 10);
        mask.fill(2, 2, 6, 5);
        assert_eq!(mask.count_on(0, 0, 10, 10), 12);
        assert_eq!(mask.count_on(2, 2, 4, 3), 2);
        // Clipped to the mask instead of panicking.
        assert_eq!(mask.count_on(0, 0, 50, 50), 12);

        let sub = mask.crop(&BoundingBox::new(2, 2, 4, 3));
        assert_eq!((sub.width(), sub.height()), (4, 3));
        assert_eq!(sub.count_on(0, 0, 4, 3), 12);
    }

    #[test]
    fn from_gray_normalises_foreground() {
        let gray = GrayImage::from_fn(3, 1, |x, _| Luma([x as u8 * 7]));
        let mask = BinaryMask::from_gray(gray);
        assert!(!mask.is_on(0, 0));
        assert!(mask.is_on(1, 0));
        assert_eq!(mask.as_gray().get_pixel(2, 0)[0], 255);
    }

    #[test]
    fn digit_display() {
        assert_eq!(Digit::Value(7).to_string(), "7");
        assert_eq!(Digit::Unrecognized.to_string(), "?");
        assert_eq!(Digit::Unrecognized.value(), None);
    }

    #[test]
    fn blank_mask_reports_no_glyphs() {
        let frame = RgbImage::new(40, 40);
        let err = read_mask(BinaryMask::new(40, 40), (0, 0), &frame, &ReaderConfig::default())
            .unwrap_err();
        assert_eq!(err, PipelineError::NoGlyphsFound);
    }
}
