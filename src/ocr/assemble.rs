use base64::Engine;
use image::{codecs::jpeg::JpegEncoder, ImageEncoder, Rgb, RgbImage};
use imageproc::{
    drawing::{draw_filled_rect_mut, draw_hollow_rect_mut},
    rect::Rect,
};
use log::warn;
use serde::Serialize;

use super::{segments, DecodedGlyph};

const GREEN: Rgb<u8> = Rgb([0, 255, 0]);

/// Label glyph size (px) and stroke.
const LABEL_W: u32 = 10;
const LABEL_H: u32 = 18;
const LABEL_STROKE: u32 = 2;

/// The three readings, by line order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Readings {
    pub sys: String,
    pub dia: String,
    pub pulse: String,
}

impl Readings {
    /// Line 0 → sys, 1 → dia, 2 → pulse.  Extra lines are ignored and
    /// missing ones stay empty.
    pub fn from_lines(lines: &[Vec<DecodedGlyph>]) -> Self {
        let mut it = lines.iter().map(|l| line_reading(l));
        Readings {
            sys: it.next().unwrap_or_default(),
            dia: it.next().unwrap_or_default(),
            pulse: it.next().unwrap_or_default(),
        }
    }
}

/// Concatenated digits of one line; unrecognized glyphs are skipped.
pub fn line_reading(line: &[DecodedGlyph]) -> String {
    line.iter()
        .filter_map(|g| g.digit.value())
        .map(|d| char::from(b'0' + d))
        .collect()
}

/// Copy of `frame` with a 2 px box and the digit value for every recognized
/// glyph.  `offset` moves ROI coordinates into frame coordinates.
pub fn annotate(frame: &RgbImage, lines: &[Vec<DecodedGlyph>], offset: (u32, u32)) -> RgbImage {
    let mut out = frame.clone();
    let (ox, oy) = (offset.0 as i32, offset.1 as i32);

    for g in lines.iter().flatten() {
        let Some(value) = g.digit.value() else {
            continue;
        };
        let x = g.bbox.x as i32 + ox;
        let y = g.bbox.y as i32 + oy;
        draw_hollow_rect_mut(&mut out, Rect::at(x, y).of_size(g.bbox.width, g.bbox.height), GREEN);
        draw_hollow_rect_mut(
            &mut out,
            Rect::at(x - 1, y - 1).of_size(g.bbox.width + 2, g.bbox.height + 2),
            GREEN,
        );
        // Label sits up and to the left of the box, bottom edge at y - 10.
        draw_label(&mut out, value, x - 10, y - 10 - LABEL_H as i32);
    }
    out
}

/// Draw `digit` as a small 7-segment figure with its top-left at (x, y).
fn draw_label(img: &mut RgbImage, digit: u8, x: i32, y: i32) {
    let Some(segments) = segments::pattern_for(digit) else {
        return;
    };
    let (w, h, t) = (LABEL_W as i32, LABEL_H as i32, LABEL_STROKE as i32);
    let half = h / 2;
    let strokes = [
        (0, 0, w, t),
        (0, 0, t, half),
        (w - t, 0, t, half),
        (0, half - t / 2, w, t),
        (0, half, t, h - half),
        (w - t, half, t, h - half),
        (0, h - t, w, t),
    ];
    for (on, (sx, sy, sw, sh)) in segments.iter().zip(strokes) {
        if *on {
            draw_filled_rect_mut(
                img,
                Rect::at(x + sx, y + sy).of_size(sw as u32, sh as u32),
                GREEN,
            );
        }
    }
}

/// Base64 JPEG of `img`; empty string if encoding fails.
pub fn encode_jpeg_b64(img: &RgbImage, quality: u8) -> String {
    let mut jpg = Vec::new();
    match JpegEncoder::new_with_quality(&mut jpg, quality.clamp(1, 100)).write_image(
        img.as_raw(),
        img.width(),
        img.height(),
        image::ExtendedColorType::Rgb8,
    ) {
        Ok(()) => base64::engine::general_purpose::STANDARD.encode(&jpg),
        Err(e) => {
            warn!("[ocr] annotated image encode failed: {e}");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::{BoundingBox, Digit};

    fn decoded(x: u32, y: u32, digit: Digit) -> DecodedGlyph {
        DecodedGlyph {
            bbox: BoundingBox::new(x, y, 20, 40),
            digit,
        }
    }

    #[test]
    fn readings_follow_line_order() {
        let lines = vec![
            vec![decoded(0, 0, Digit::Value(1)), decoded(30, 0, Digit::Value(2))],
            vec![decoded(0, 50, Digit::Value(8)), decoded(30, 50, Digit::Unrecognized)],
        ];
        let r = Readings::from_lines(&lines);
        assert_eq!(r.sys, "12");
        assert_eq!(r.dia, "8");
        assert_eq!(r.pulse, "");
    }

    #[test]
    fn lines_beyond_the_third_are_ignored() {
        let lines: Vec<Vec<DecodedGlyph>> = (0..5)
            .map(|i| vec![decoded(0, i * 50, Digit::Value(i as u8))])
            .collect();
        let r = Readings::from_lines(&lines);
        assert_eq!((r.sys.as_str(), r.dia.as_str(), r.pulse.as_str()), ("0", "1", "2"));
    }

    #[test]
    fn only_recognized_glyphs_are_drawn() {
        let frame = RgbImage::new(200, 200);
        let lines = vec![vec![
            decoded(10, 30, Digit::Value(4)),
            decoded(60, 30, Digit::Unrecognized),
        ]];
        let out = annotate(&frame, &lines, (50, 40));

        // Box corner of the recognized glyph, shifted by the offset.
        assert_eq!(*out.get_pixel(60, 70), GREEN);
        // The unrecognized one is left alone.
        assert_eq!(*out.get_pixel(110, 70), Rgb([0, 0, 0]));
        // Source frame is not modified.
        assert_eq!(*frame.get_pixel(60, 70), Rgb([0, 0, 0]));
    }

    #[test]
    fn labels_near_the_edge_are_clipped() {
        let frame = RgbImage::new(40, 60);
        let lines = vec![vec![decoded(0, 0, Digit::Value(8))]];
        let out = annotate(&frame, &lines, (0, 0));
        assert_eq!(out.dimensions(), (40, 60));
    }

    #[test]
    fn jpeg_is_base64_encoded() {
        let b64 = encode_jpeg_b64(&RgbImage::new(16, 16), 90);
        let bytes = base64::engine::general_purpose::STANDARD.decode(b64).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }
}
