//! Mapping highlighted text back onto the original PDF's text layer.

use log::{debug, warn};
use serde::Serialize;
use std::collections::BTreeMap;

use super::recover::recover_pdf_text;
use super::types::{Quad, Rect};
use crate::settings::Calibration;

#[derive(Debug, thiserror::Error)]
pub enum LocateError {
    #[cfg(feature = "pdf")]
    #[error("PDF engine: {0}")]
    Pdf(#[from] mupdf::error::Error),

    #[error("page {index} out of range ({count} pages)")]
    PageOutOfRange { index: usize, count: usize },
}

/// Searchable text of one PDF page.
pub trait TextLayer {
    /// Page height in points.
    fn height(&self) -> f32;

    /// Plain text of the page, one text line per `\n`.
    fn text(&self) -> Result<String, LocateError>;

    /// Exact occurrences of `needle`, one quad per matched line fragment,
    /// in page order.
    fn search(&self, needle: &str) -> Result<Vec<Quad>, LocateError>;
}

/// A document whose pages expose a [`TextLayer`].
pub trait TextDocument {
    type Page: TextLayer;

    fn page_count(&self) -> usize;

    /// Load a page by 0-based index.
    fn page(&self, index: usize) -> Result<Self::Page, LocateError>;
}

/// One highlighted line as the tablet recorded it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GlyphLine {
    pub text: String,
    /// Device y-coordinate, when known.
    pub y: Option<f64>,
}

impl GlyphLine {
    pub fn new(text: impl Into<String>, y: Option<f64>) -> Self {
        Self {
            text: text.into(),
            y,
        }
    }
}

/// Highlighted lines keyed by 0-based page index.
pub type GlyphLinesByPage = BTreeMap<usize, Vec<GlyphLine>>;

/// Where a highlighted line was found in the PDF.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LocatedRegion {
    pub text: String,
    pub page_index: usize,
    pub quads: Vec<Quad>,
    pub page_height: f32,
}

impl LocatedRegion {
    /// Topmost edge of any quad.
    pub fn top(&self) -> f32 {
        self.quads
            .iter()
            .map(|q| q.rect().y0)
            .fold(f32::INFINITY, f32::min)
    }
}

/// Locate every highlighted line of every page.
///
/// Lines that cannot be found are skipped. Pages the document does not have
/// or cannot load are skipped with a warning.
pub fn locate_highlights<D: TextDocument>(
    doc: &D,
    lines_by_page: &GlyphLinesByPage,
    calibration: &Calibration,
) -> Vec<LocatedRegion> {
    let page_count = doc.page_count();
    let mut regions = Vec::new();

    for (&page_index, lines) in lines_by_page {
        if page_index >= page_count {
            debug!("Highlights on page {page_index} beyond document end ({page_count} pages)");
            continue;
        }
        let page = match doc.page(page_index) {
            Ok(page) => page,
            Err(e) => {
                warn!("Failed to load PDF page {page_index}: {e}");
                continue;
            }
        };
        regions.extend(locate_on_page(&page, page_index, lines, calibration));
    }

    regions
}

/// Locate one page's lines, never claiming the same spot twice.
pub fn locate_on_page<P: TextLayer>(
    page: &P,
    page_index: usize,
    lines: &[GlyphLine],
    calibration: &Calibration,
) -> Vec<LocatedRegion> {
    let page_height = page.height();
    let gap = page_height * calibration.cluster_gap_fraction;
    let mut page_text: Option<String> = None;
    let mut claimed: Vec<Rect> = Vec::new();
    let mut regions = Vec::new();

    for line in lines {
        let quads = find_quads(page, &line.text, &mut page_text);
        if quads.is_empty() {
            debug!("Highlight not found on page {page_index}: {:?}", line.text);
            continue;
        }

        let groups = group_quads(&quads, gap);
        let Some(selected) = select_cluster(&groups, line.y, page_height, calibration) else {
            continue;
        };

        let mut fresh = Vec::new();
        for quad in selected {
            let rect = quad.rect();
            if claimed.iter().any(|r| r.contains(rect.center())) {
                continue;
            }
            claimed.push(rect);
            fresh.push(*quad);
        }

        if !fresh.is_empty() {
            regions.push(LocatedRegion {
                text: line.text.clone(),
                page_index,
                quads: fresh,
                page_height,
            });
        }
    }

    regions
}

/// Exact search, then a second search with the PDF's own spelling of the
/// text. The page text is extracted at most once per page.
fn find_quads<P: TextLayer>(page: &P, text: &str, page_text: &mut Option<String>) -> Vec<Quad> {
    let quads = search_logged(page, text);
    if !quads.is_empty() {
        return quads;
    }

    if page_text.is_none() {
        match page.text() {
            Ok(text) => *page_text = Some(text),
            Err(e) => {
                warn!("Failed to extract page text: {e}");
                *page_text = Some(String::new());
            }
        }
    }

    page_text
        .as_deref()
        .and_then(|page_text| recover_pdf_text(page_text, text))
        .map(|recovered| search_logged(page, &recovered))
        .unwrap_or_default()
}

fn search_logged<P: TextLayer>(page: &P, text: &str) -> Vec<Quad> {
    page.search(text).unwrap_or_else(|e| {
        warn!("PDF search failed for {text:?}: {e}");
        Vec::new()
    })
}

/// Split search hits into matches. A quad continues the previous match when
/// it starts within `gap` of the previous quad's top or bottom.
pub fn group_quads(quads: &[Quad], gap: f32) -> Vec<Vec<Quad>> {
    let mut groups: Vec<Vec<Quad>> = Vec::new();
    for quad in quads {
        match groups.last_mut() {
            Some(group) => {
                let prev = group[group.len() - 1];
                if (quad.ul.y - prev.ul.y).abs() < gap || quad.ul.y - prev.lr.y < gap {
                    group.push(*quad);
                } else {
                    groups.push(vec![*quad]);
                }
            }
            None => groups.push(vec![*quad]),
        }
    }
    groups
}

/// Pick the match nearest the tablet position when the text occurs more than
/// once, otherwise the first match.
fn select_cluster<'a>(
    groups: &'a [Vec<Quad>],
    device_y: Option<f64>,
    page_height: f32,
    calibration: &Calibration,
) -> Option<&'a [Quad]> {
    let first = groups.first()?;
    let (Some(device_y), true) = (device_y, groups.len() > 1 && page_height > 0.0) else {
        return Some(first);
    };

    let expected = (device_y / calibration.device_height) * calibration.device_to_pdf_scale;
    let distance = |group: &Vec<Quad>| {
        let top = f64::from(group[0].ul.y) / f64::from(page_height);
        (top - expected).abs()
    };

    groups
        .iter()
        .min_by(|a, b| distance(*a).total_cmp(&distance(*b)))
        .map(Vec::as_slice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakePage;

    fn locate(page: &FakePage, lines: &[GlyphLine]) -> Vec<LocatedRegion> {
        locate_on_page(page, 0, lines, &Calibration::default())
    }

    fn quad_at(y: f32) -> Quad {
        Quad::from_rect(Rect::new(0.0, y, 100.0, y + 10.0))
    }

    #[test]
    fn test_exact_match_single_line() {
        let page = FakePage::new(792.0)
            .line("Results show a clear improvement", 100.0)
            .line("over the baseline approach.", 114.0);
        let regions = locate(&page, &[GlyphLine::new("clear improvement", Some(200.0))]);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].quads.len(), 1);
        assert_eq!(regions[0].text, "clear improvement");
        assert_eq!(regions[0].page_height, 792.0);
    }

    #[test]
    fn test_match_across_lines_is_one_region() {
        let page = FakePage::new(792.0)
            .line("Results show a clear improvement", 100.0)
            .line("over the baseline approach.", 114.0);
        let regions = locate(&page, &[GlyphLine::new("improvement over the", None)]);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].quads.len(), 2);
    }

    #[test]
    fn test_fuzzy_recovery_when_spacing_lost() {
        let page = FakePage::new(792.0)
            .line("Two kinds of formal proofs,", 300.0)
            .line("standard and constructive.", 314.0);
        let regions = locate(&page, &[GlyphLine::new("proofs,standard", None)]);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].quads.len(), 2);
        // the tablet's spelling is kept for export
        assert_eq!(regions[0].text, "proofs,standard");
    }

    #[test]
    fn test_fuzzy_recovery_rejoins_hyphenated_wrap() {
        let page = FakePage::new(792.0)
            .line("the study of math-", 300.0)
            .line("ematics, which is broad", 314.0);
        assert!(page.search("mathematics,which").unwrap().is_empty());
        assert_eq!(page.text().unwrap(), "the study of math-\nematics, which is broad\n");

        let regions = locate(&page, &[GlyphLine::new("mathematics,which", Some(600.0))]);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].quads.len(), 2);
        // "math" on the first line, "ematics, which" on the second
        assert_eq!(regions[0].quads[0].rect(), Rect::new(150.0, 300.0, 174.0, 312.0));
        assert_eq!(regions[0].quads[1].rect(), Rect::new(72.0, 314.0, 156.0, 326.0));
    }

    #[test]
    fn test_unmatched_text_skipped() {
        let page = FakePage::new(792.0).line("Something else entirely", 100.0);
        assert!(locate(&page, &[GlyphLine::new("not on this page", Some(10.0))]).is_empty());
        assert!(locate(&page, &[GlyphLine::new(" - ", Some(10.0))]).is_empty());
    }

    #[test]
    fn test_repeated_phrase_uses_device_position() {
        let page = FakePage::new(792.0)
            .line("the key result holds here", 100.0)
            .line("filler text in between", 250.0)
            .line("the key result holds again", 400.0);

        // 1350 / 1872 * 0.70 ≈ 0.505 ≈ 400 / 792
        let lower = locate(&page, &[GlyphLine::new("key result", Some(1350.0))]);
        assert_eq!(lower.len(), 1);
        assert_eq!(lower[0].quads[0].ul.y, 400.0);

        let upper = locate(&page, &[GlyphLine::new("key result", Some(250.0))]);
        assert_eq!(upper[0].quads[0].ul.y, 100.0);
    }

    #[test]
    fn test_repeated_phrase_without_position_takes_first() {
        let page = FakePage::new(792.0)
            .line("the key result holds here", 100.0)
            .line("the key result holds again", 400.0);
        let regions = locate(&page, &[GlyphLine::new("key result", None)]);
        assert_eq!(regions[0].quads[0].ul.y, 100.0);
    }

    #[test]
    fn test_overlapping_lines_not_highlighted_twice() {
        let page = FakePage::new(792.0).line("an important finding about data", 100.0);
        let regions = locate(
            &page,
            &[
                GlyphLine::new("an important finding about data", Some(100.0)),
                GlyphLine::new("important finding", Some(100.0)),
            ],
        );
        assert_eq!(regions.len(), 1);
    }

    #[test]
    fn test_claimed_centers_never_repeat() {
        let page = FakePage::new(792.0)
            .line("alpha beta gamma delta", 100.0)
            .line("alpha beta gamma delta", 200.0);
        let lines = vec![GlyphLine::new("beta gamma", None); 3];
        let regions = locate(&page, &lines);

        let mut claimed: Vec<Rect> = Vec::new();
        for quad in regions.iter().flat_map(|r| &r.quads) {
            let rect = quad.rect();
            assert!(!claimed.iter().any(|c| c.contains(rect.center())));
            claimed.push(rect);
        }
    }

    #[test]
    fn test_group_quads_by_vertical_gap() {
        let gap = 792.0 * 0.03;
        let quads = [quad_at(100.0), quad_at(112.0), quad_at(400.0), quad_at(412.0)];
        let groups = group_quads(&quads, gap);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[1][0].ul.y, 400.0);
        assert!(group_quads(&[], gap).is_empty());
    }

    #[test]
    fn test_group_quads_backwards_jump_stays_grouped() {
        // next column starts above the previous quad's bottom
        let groups = group_quads(&[quad_at(500.0), quad_at(80.0)], 10.0);
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_missing_pages_skipped() {
        let doc = crate::test_utils::FakeDocument::new(vec![
            FakePage::new(792.0).line("only page text", 100.0),
        ]);
        let mut lines = GlyphLinesByPage::new();
        lines.insert(0, vec![GlyphLine::new("page text", None)]);
        lines.insert(5, vec![GlyphLine::new("page text", None)]);

        let regions = locate_highlights(&doc, &lines, &Calibration::default());
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].page_index, 0);
    }

    #[test]
    fn test_region_top() {
        let region = LocatedRegion {
            text: "x".into(),
            page_index: 0,
            quads: vec![quad_at(300.0), quad_at(120.0)],
            page_height: 792.0,
        };
        assert_eq!(region.top(), 120.0);
    }
}
