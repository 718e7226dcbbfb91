use imageproc::contours::{find_contours, BorderType};
use imageproc::point::Point;
use log::debug;

use super::{BinaryMask, BoundingBox, GlyphCandidate};
use crate::config::GlyphConfig;
use crate::error::PipelineError;

/// Find digit-shaped blobs in `mask`, sorted top-to-bottom (ties left-to-right).
///
/// Only the outermost border of each connected region is considered, so
/// holes and specks inside a glyph never become candidates of their own.
/// Boxes that are too short, too wide or too thin are dropped: mask noise,
/// display bezels, or several digits merged into one blob.
pub fn extract_glyphs(
    mask: &BinaryMask,
    cfg: &GlyphConfig,
) -> Result<Vec<GlyphCandidate>, PipelineError> {
    let contours = find_contours::<u32>(mask.as_gray());

    let mut boxes: Vec<BoundingBox> = contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter_map(|c| enclosing_box(&c.points))
        .filter(|b| is_glyph_box(b, cfg))
        .collect();

    debug!(
        "[ocr] {} outer contours, {} kept as glyph candidates",
        contours.len(),
        boxes.len()
    );

    if boxes.is_empty() {
        return Err(PipelineError::NoGlyphsFound);
    }

    boxes.sort_by_key(|b| (b.y, b.x));
    Ok(boxes
        .into_iter()
        .map(|bbox| GlyphCandidate {
            bbox,
            mask: mask.crop(&bbox),
        })
        .collect())
}

/// `height > min_height` and `min_aspect <= width/height < max_aspect`.
pub fn is_glyph_box(bbox: &BoundingBox, cfg: &GlyphConfig) -> bool {
    if bbox.height <= cfg.min_height {
        return false;
    }
    let aspect = bbox.aspect();
    aspect >= cfg.min_aspect && aspect < cfg.max_aspect
}

/// Inclusive pixel extent of a contour.
fn enclosing_box(points: &[Point<u32>]) -> Option<BoundingBox> {
    let first = points.first()?;
    let (mut min_x, mut max_x, mut min_y, mut max_y) = (first.x, first.x, first.y, first.y);
    for p in points {
        min_x = min_x.min(p.x);
        max_x = max_x.max(p.x);
        min_y = min_y.min(p.y);
        max_y = max_y.max(p.y);
    }
    Some(BoundingBox::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
}
