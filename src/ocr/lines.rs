use super::{GlyphCandidate, Line};
use crate::error::PipelineError;

/// Split top-to-bottom sorted glyphs into text lines.
///
/// Greedy band test, not clustering: a glyph joins the current line when its
/// top lies above `base_y + its own height`, where `base_y` is the top of the
/// glyph that opened the line.  Otherwise it opens a new line.  Lines are
/// assumed not to overlap vertically; a stray glyph far below the display
/// simply becomes a line of its own.
pub fn group_lines(candidates: Vec<GlyphCandidate>) -> Result<Vec<Line>, PipelineError> {
    let base_y = candidates
        .first()
        .ok_or(PipelineError::EmptyCandidateSet)?
        .bbox
        .y;

    let (mut lines, current, _) = candidates.into_iter().fold(
        (Vec::new(), Vec::new(), base_y),
        |(mut lines, mut current, base_y), glyph| {
            if glyph.bbox.y < base_y + glyph.bbox.height {
                current.push(glyph);
                (lines, current, base_y)
            } else {
                let next_base = glyph.bbox.y;
                lines.push(close_line(current));
                (lines, vec![glyph], next_base)
            }
        },
    );
    lines.push(close_line(current));
    Ok(lines)
}

fn close_line(mut glyphs: Vec<GlyphCandidate>) -> Line {
    glyphs.sort_by_key(|g| g.bbox.x);
    Line { glyphs }
}
