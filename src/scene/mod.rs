//! Tablet scene files: binary per-page stroke and highlight data.
//!
//! Parsing sits behind [`SceneParser`] so that a reader for a newer format
//! revision can be dropped in without touching merging or PDF location.
//! Every parse failure is a compatibility problem, not a correctness one:
//! [`extract_glyph_runs`] reports it as "no highlights on this page".

mod reader;
mod v6;

use log::debug;
use serde::Serialize;

pub use v6::V6SceneParser;

/// One contiguous highlighted span as recorded by the tablet.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RawGlyphRun {
    pub text: String,
    /// Top of the first bounding rectangle, device coordinates.
    pub y: Option<f64>,
    /// Highlighter color tag.
    pub color: u32,
}

impl RawGlyphRun {
    pub fn new(text: impl Into<String>, y: Option<f64>, color: u32) -> Self {
        Self {
            text: text.into(),
            y,
            color,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("not a scene file")]
    BadHeader,

    #[error("unsupported scene format version {0}")]
    UnsupportedVersion(String),

    #[error("truncated scene data at offset {offset} (wanted {wanted} bytes)")]
    Truncated { offset: usize, wanted: usize },

    #[error("varint overflow at offset {offset}")]
    VarintOverflow { offset: usize },

    #[error("unexpected tag {found:#x} at offset {offset}, expected {expected:#x}")]
    UnexpectedTag {
        offset: usize,
        expected: u64,
        found: u64,
    },

    #[error("invalid UTF-8 text at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("item type {found} where {expected} was expected")]
    ItemTypeMismatch { expected: u8, found: u8 },
}

/// Parses one page's scene bytes into highlighted glyph runs.
pub trait SceneParser {
    fn parse_glyph_runs(&self, data: &[u8]) -> Result<Vec<RawGlyphRun>, SceneError>;
}

/// Extract highlighted runs from one scene file with the default parser.
///
/// Never fails: unreadable data yields an empty list. Runs whose text is
/// blank are dropped and surrounding whitespace is trimmed.
pub fn extract_glyph_runs(data: &[u8]) -> Vec<RawGlyphRun> {
    extract_glyph_runs_with(&V6SceneParser, data)
}

pub fn extract_glyph_runs_with<P: SceneParser + ?Sized>(
    parser: &P,
    data: &[u8],
) -> Vec<RawGlyphRun> {
    match parser.parse_glyph_runs(data) {
        Ok(runs) => runs
            .into_iter()
            .filter_map(|run| {
                let text = run.text.trim();
                if text.is_empty() {
                    None
                } else {
                    Some(RawGlyphRun::new(text, run.y, run.color))
                }
            })
            .collect(),
        Err(e) => {
            debug!("Could not parse scene data as v6 scene tree: {e}");
            Vec::new()
        }
    }
}
