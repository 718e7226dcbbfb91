use bpreader_lib::config::ReaderConfig;
use bpreader_lib::detector::{Detection, FixedDetector};
use bpreader_lib::error::PipelineError;
use bpreader_lib::ocr::{read_mask, segments::pattern_for, BinaryMask, Digit};
use bpreader_lib::processor::{process_image, ReadResult};
use image::{GrayImage, Luma, RgbImage};

const GLYPH_W: u32 = 40;
const GLYPH_H: u32 = 80;
const STROKE: u32 = 8;

/// Rectangles `(x0, y0, x1, y1)` of a display-style digit whose top-left is
/// at (x, y).  Horizontal strokes run the full width, vertical strokes
/// overlap the middle bar like on a real LCD.
fn digit_strokes(digit: u8, x: u32, y: u32) -> Vec<(u32, u32, u32, u32)> {
    let (w, h, t) = (GLYPH_W, GLYPH_H, STROKE);
    if digit == 1 {
        // A one is a single narrow bar on the right of its cell.
        return vec![(x + w - 12, y, x + w, y + h)];
    }
    let half = h / 2;
    let strokes = [
        (0, 0, w, t),
        (0, 0, t, half + t / 2),
        (w - t, 0, w, half + t / 2),
        (0, half - t / 2, w, half + t / 2),
        (0, half - t / 2, t, h),
        (w - t, half - t / 2, w, h),
        (0, h - t, w, h),
    ];
    let segments = pattern_for(digit).expect("digit in table");
    segments
        .iter()
        .zip(strokes)
        .filter(|(on, _)| **on)
        .map(|(_, (x0, y0, x1, y1))| (x + x0, y + y0, x + x1, y + y1))
        .collect()
}

/// Three lines "120", "80", "72", each digit 40×80 with 20 px gaps.
fn display_layout() -> Vec<(u32, u32, u8)> {
    let mut placed = Vec::new();
    for (line, text) in ["120", "80", "72"].iter().enumerate() {
        let y = 60 + line as u32 * 140;
        for (i, ch) in text.bytes().enumerate() {
            placed.push((100 + i as u32 * 60, y, ch - b'0'));
        }
    }
    placed
}

fn display_mask(width: u32, height: u32) -> BinaryMask {
    let mut mask = BinaryMask::new(width, height);
    for (x, y, digit) in display_layout() {
        for (x0, y0, x1, y1) in digit_strokes(digit, x, y) {
            mask.fill(x0, y0, x1, y1);
        }
    }
    mask
}

/// Dark segments on a light LCD background.
fn display_photo(width: u32, height: u32) -> GrayImage {
    let mask = display_mask(width, height);
    GrayImage::from_fn(width, height, |x, y| {
        if mask.is_on(x, y) {
            Luma([35])
        } else {
            Luma([205])
        }
    })
}

#[test]
fn synthetic_display_mask_reads_120_80_72() {
    let frame = RgbImage::new(400, 500);
    let rec = read_mask(display_mask(400, 500), (0, 0), &frame, &ReaderConfig::default()).unwrap();

    assert_eq!(rec.readings.sys, "120");
    assert_eq!(rec.readings.dia, "80");
    assert_eq!(rec.readings.pulse, "72");
    assert_eq!(rec.lines.len(), 3);
    assert!(rec
        .lines
        .iter()
        .flatten()
        .all(|g| g.digit != Digit::Unrecognized));
}

#[test]
fn reading_the_same_mask_twice_is_identical() {
    let frame = RgbImage::new(400, 500);
    let cfg = ReaderConfig::default();
    let a = read_mask(display_mask(400, 500), (10, 20), &frame, &cfg).unwrap();
    let b = read_mask(display_mask(400, 500), (10, 20), &frame, &cfg).unwrap();
    assert_eq!(a.readings, b.readings);
    assert_eq!(a.lines, b.lines);
    assert_eq!(a.annotated, b.annotated);
}

#[test]
fn blank_mask_is_no_glyphs_found() {
    let frame = RgbImage::new(100, 100);
    let err = read_mask(BinaryMask::new(100, 100), (0, 0), &frame, &ReaderConfig::default())
        .unwrap_err();
    assert_eq!(err, PipelineError::NoGlyphsFound);
}

#[test]
fn photo_of_a_display_is_read_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let photo = dir.path().join("monitor.png");
    let mask_out = dir.path().join("mask.png");
    // Already at the working height, so the detector box maps 1:1.
    display_photo(400, 500).save(&photo).unwrap();

    let detector = FixedDetector {
        detections: vec![
            Detection {
                confidence: 0.2,
                ..Detection::from_top_left(0.0, 0.0, 60.0, 60.0)
            },
            Detection {
                confidence: 0.9,
                ..Detection::from_top_left(50.0, 30.0, 300.0, 420.0)
            },
        ],
    };
    let mut cfg = ReaderConfig::default();
    cfg.validate_ranges = true;

    let result = process_image(&photo, &detector, &cfg, Some(&mask_out));
    match result {
        ReadResult::Reading {
            sys,
            dia,
            pulse,
            annotated_image,
        } => {
            assert_eq!((sys.as_str(), dia.as_str(), pulse.as_str()), ("120", "80", "72"));
            assert!(!annotated_image.is_empty());
        }
        ReadResult::Failure { error } => panic!("pipeline failed: {error}"),
    }

    let mask = image::open(&mask_out).unwrap().to_luma8();
    assert_eq!(mask.dimensions(), (300, 420));
}

#[test]
fn blank_photo_reports_an_error_result() {
    let dir = tempfile::tempdir().unwrap();
    let photo = dir.path().join("blank.png");
    GrayImage::from_pixel(400, 500, Luma([180])).save(&photo).unwrap();

    let detector = FixedDetector {
        detections: vec![Detection::from_top_left(50.0, 30.0, 300.0, 420.0)],
    };
    let result = process_image(&photo, &detector, &ReaderConfig::default(), None);
    assert_eq!(
        result,
        ReadResult::Failure {
            error: PipelineError::NoGlyphsFound.to_string()
        }
    );
    assert_eq!(
        serde_json::to_string(&result).unwrap(),
        r#"{"error":"No valid digit contours found"}"#
    );
}
