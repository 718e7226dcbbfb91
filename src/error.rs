use thiserror::Error;

/// Stage-level failures. Any of these aborts the remaining stages for the
/// current photo and is reported as `{"error": ...}`.
///
/// An unrecognized glyph is deliberately not listed here: it is a per-glyph
/// outcome (`Digit::Unrecognized`) and never stops the pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Detector could not find a screen in the photo.")]
    DetectionEmpty,

    #[error("Could not load image: {0}")]
    ImageLoadFailure(String),

    #[error("Detector failed: {0}")]
    Detector(String),

    #[error("Screen region is empty after scaling to the working frame.")]
    EmptyRoi,

    #[error("No valid digit contours found")]
    NoGlyphsFound,

    #[error("Sorting contours failed: no glyph candidates to group.")]
    EmptyCandidateSet,

    #[error("Missing or non-numeric {0} reading.")]
    MissingReading(String),

    #[error("{0}")]
    OutOfRange(String),
}
