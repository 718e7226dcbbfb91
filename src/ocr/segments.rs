//! 7-segment decoding.
//!
//! Segment order everywhere in this module:
//!
//! ```text
//!  ─0─
//! 1   2
//!  ─3─
//! 4   5
//!  ─6─
//! ```
//!
//! i.e. top, upper-left, upper-right, middle, lower-left, lower-right, bottom.

use super::{BinaryMask, Digit, GlyphCandidate};
use crate::config::SegmentConfig;

pub type SegmentPattern = [bool; 7];

const fn pattern(bits: [u8; 7]) -> SegmentPattern {
    let mut out = [false; 7];
    let mut i = 0;
    while i < 7 {
        out[i] = bits[i] != 0;
        i += 1;
    }
    out
}

/// Every pattern the decoder accepts.
///
/// Digit 7 appears twice: the plain three-stroke 7 and the variant that also
/// lights the upper-left bar.  Both are kept on purpose; whether displays in
/// the field actually produce the second form has not been established.
pub static DIGIT_TABLE: [(SegmentPattern, u8); 11] = [
    (pattern([1, 1, 1, 0, 1, 1, 1]), 0),
    (pattern([0, 0, 1, 0, 0, 1, 0]), 1),
    (pattern([1, 0, 1, 1, 1, 0, 1]), 2),
    (pattern([1, 0, 1, 1, 0, 1, 1]), 3),
    (pattern([0, 1, 1, 1, 0, 1, 0]), 4),
    (pattern([1, 1, 0, 1, 0, 1, 1]), 5),
    (pattern([1, 1, 0, 1, 1, 1, 1]), 6),
    (pattern([1, 0, 1, 0, 0, 1, 0]), 7),
    (pattern([1, 1, 1, 0, 0, 1, 0]), 7),
    (pattern([1, 1, 1, 1, 1, 1, 1]), 8),
    (pattern([1, 1, 1, 1, 0, 1, 1]), 9),
];

pub fn lookup(segments: &SegmentPattern) -> Digit {
    DIGIT_TABLE
        .iter()
        .find(|(p, _)| p == segments)
        .map_or(Digit::Unrecognized, |&(_, d)| Digit::Value(d))
}

/// First table pattern for `digit`, if any.
pub fn pattern_for(digit: u8) -> Option<SegmentPattern> {
    DIGIT_TABLE.iter().find(|(_, d)| *d == digit).map(|(p, _)| *p)
}

/// Half-open pixel rectangle `[x0, x1) × [y0, y1)` inside a glyph box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl Probe {
    fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Probe { x0, y0, x1, y1 }
    }

    pub fn area(&self) -> u32 {
        self.x1.saturating_sub(self.x0) * self.y1.saturating_sub(self.y0)
    }
}

/// The seven probe rectangles for a `width`×`height` glyph.
///
/// Vertical bars are `vertical_bar_width` wide and half the glyph tall.
/// The top, middle and bottom bars leave that width free on both sides so
/// they never sample the vertical strokes.
pub fn probe_regions(width: u32, height: u32, cfg: &SegmentConfig) -> [Probe; 7] {
    let (w, h) = (width, height);
    let dw = ((w as f64 * cfg.vertical_bar_width) as u32).min(w);
    let dh = ((h as f64 * cfg.horizontal_bar_thickness) as u32).min(h);
    let dhc = (h as f64 * cfg.middle_bar_half_thickness) as u32;
    let half = h / 2;
    let right = w - dw;

    [
        Probe::new(dw, 0, right, dh),
        Probe::new(0, 0, dw, half),
        Probe::new(right, 0, w, half),
        Probe::new(dw, half.saturating_sub(dhc), right, (half + dhc).min(h)),
        Probe::new(0, half, dw, h),
        Probe::new(right, half, w, h),
        Probe::new(dw, h - dh, right, h),
    ]
}

/// Which of the seven probes are mostly foreground.  Empty probes are off.
pub fn read_pattern(mask: &BinaryMask, cfg: &SegmentConfig) -> SegmentPattern {
    let probes = probe_regions(mask.width(), mask.height(), cfg);
    let mut on = [false; 7];
    for (seg, probe) in on.iter_mut().zip(probes.iter()) {
        let area = probe.area();
        if area == 0 {
            continue;
        }
        let total = mask.count_on(probe.x0, probe.y0, probe.x1, probe.y1);
        *seg = total as f64 / area as f64 > cfg.on_threshold;
    }
    on
}

/// Decode one glyph.  Narrow glyphs are a `1` by shape alone: the two
/// strokes of a 7-segment one never line up with the probe grid.
pub fn decode_glyph(glyph: &GlyphCandidate, cfg: &SegmentConfig) -> Digit {
    if glyph.bbox.aspect() < cfg.narrow_aspect {
        return Digit::Value(1);
    }
    lookup(&read_pattern(&glyph.mask, cfg))
}
