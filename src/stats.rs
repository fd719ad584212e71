use serde::Serialize;

use crate::highlights::PageHighlights;

/// Highlight count at which the volume component saturates.
const VOLUME_SATURATION: f64 = 20.0;

const DENSITY_WEIGHT: f64 = 0.3;
const COVERAGE_WEIGHT: f64 = 0.4;
const VOLUME_WEIGHT: f64 = 0.3;

/// Derived counts for one document's highlights.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HighlightStats {
    pub highlight_count: usize,
    pub highlighted_pages: usize,
    pub highlight_word_count: usize,
    pub page_count: usize,
    /// 0-100
    pub engagement: u8,
}

impl HighlightStats {
    pub fn from_highlights(highlights: &PageHighlights, page_count: usize) -> Self {
        let highlight_count = highlights.total_count();
        let highlighted_pages = highlights.highlighted_pages();
        Self {
            highlight_count,
            highlighted_pages,
            highlight_word_count: highlights.word_count(),
            page_count,
            engagement: engagement_score(highlight_count, highlighted_pages, page_count),
        }
    }
}

/// How thoroughly a document was annotated, 0-100.
///
/// Weighted blend of highlights per page (saturating at one per page), the
/// fraction of pages highlighted, and the absolute highlight count
/// (saturating at twenty). A page count of zero counts as one page.
pub fn engagement_score(highlight_count: usize, highlighted_pages: usize, page_count: usize) -> u8 {
    if highlight_count == 0 {
        return 0;
    }
    let pages = page_count.max(1) as f64;
    let count = highlight_count as f64;

    let density = (count / pages).min(1.0);
    let coverage = (highlighted_pages as f64 / pages).min(1.0);
    let volume = (count / VOLUME_SATURATION).min(1.0);

    let score = (density * DENSITY_WEIGHT + coverage * COVERAGE_WEIGHT + volume * VOLUME_WEIGHT)
        * 100.0;
    score.round_ties_even().clamp(0.0, 100.0) as u8
}

/// Prefer the page count the device reported, falling back to the bundle
/// manifest when the device gave none.
pub fn effective_page_count(device_reported: Option<usize>, bundle_pages: usize) -> usize {
    match device_reported {
        Some(count) if count > 0 => count,
        _ => bundle_pages,
    }
}
