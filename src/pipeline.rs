//! Whole-bundle entry points.
//!
//! Archive- and dependency-level failures come back as empty results or
//! `Err`; a bad page or an unlocatable passage only drops that page or
//! passage.

use log::{info, warn};
use std::path::Path;

use crate::bundle::DocumentBundle;
use crate::export::{PositionRecord, RenderError};
use crate::highlights::PageHighlights;
use crate::merge::merge_glyphs;
use crate::pdf::{GlyphLine, GlyphLinesByPage};
use crate::scene::extract_glyph_runs;
use crate::settings::{Calibration, HighlightStyle};
use crate::stats::{HighlightStats, effective_page_count};

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Number of pages in the bundle manifest, 0 when unreadable.
pub fn page_count(bundle_path: &Path) -> usize {
    DocumentBundle::load(bundle_path).page_count()
}

/// Cleaned highlight passages keyed by 1-based page number, stitched across
/// page breaks. Empty when the bundle cannot be read.
pub fn extract_highlights(bundle_path: &Path, calibration: &Calibration) -> PageHighlights {
    let bundle = DocumentBundle::load(bundle_path);
    let highlights = extract_highlights_from(&bundle, calibration);
    info!(
        "Extracted {} highlight(s) from {}",
        highlights.total_count(),
        display_name(bundle_path)
    );
    highlights
}

pub fn extract_highlights_from(
    bundle: &DocumentBundle,
    calibration: &Calibration,
) -> PageHighlights {
    let mut highlights = PageHighlights::new();
    for page in bundle.pages() {
        let Some(scene) = page.scene else {
            continue;
        };
        let runs = extract_glyph_runs(scene);
        if runs.is_empty() {
            continue;
        }
        highlights.insert(page.number(), merge_glyphs(&runs, calibration));
    }
    highlights.merge_across_pages();
    highlights
}

/// Raw highlighted lines keyed by 0-based page index, in scene order.
pub fn glyph_lines_by_page(bundle: &DocumentBundle) -> GlyphLinesByPage {
    let mut lines = GlyphLinesByPage::new();
    for page in bundle.pages() {
        let Some(scene) = page.scene else {
            continue;
        };
        let runs: Vec<GlyphLine> = extract_glyph_runs(scene)
            .into_iter()
            .map(|run| GlyphLine::new(run.text, run.y))
            .collect();
        if !runs.is_empty() {
            lines.insert(page.index, runs);
        }
    }
    lines
}

/// Highlights plus their statistics. A non-zero `device_page_count` takes
/// precedence over the manifest's page count.
pub fn analyze(
    bundle_path: &Path,
    calibration: &Calibration,
    device_page_count: Option<usize>,
) -> (PageHighlights, HighlightStats) {
    let bundle = DocumentBundle::load(bundle_path);
    let highlights = extract_highlights_from(&bundle, calibration);
    let pages = effective_page_count(device_page_count, bundle.page_count());
    let stats = HighlightStats::from_highlights(&highlights, pages);
    info!(
        "Extracted {} highlight(s) from {} (engagement {})",
        stats.highlight_count,
        display_name(bundle_path),
        stats.engagement
    );
    (highlights, stats)
}

/// Write a copy of the bundle's PDF with its highlights burned in, returning
/// how many regions were drawn. A bundle without highlights still yields a
/// plain copy. The output file is replaced atomically.
pub fn render_annotated_pdf(
    bundle_path: &Path,
    output_path: &Path,
    calibration: &Calibration,
    style: &HighlightStyle,
) -> Result<usize, RenderError> {
    let result = DocumentBundle::open(bundle_path)
        .map_err(RenderError::from)
        .and_then(|bundle| annotated_pdf(&bundle, calibration, style))
        .and_then(|(bytes, drawn)| {
            write_atomically(output_path, &bytes)?;
            Ok(drawn)
        });

    match &result {
        Ok(drawn) => info!(
            "Rendered annotated PDF with {drawn} highlight(s): {}",
            output_path.display()
        ),
        Err(e) => warn!(
            "Failed to render annotated PDF for {}: {e}",
            display_name(bundle_path)
        ),
    }
    result
}

/// Annotated PDF bytes and the number of regions drawn.
#[cfg(feature = "pdf")]
pub fn annotated_pdf(
    bundle: &DocumentBundle,
    calibration: &Calibration,
    style: &HighlightStyle,
) -> Result<(Vec<u8>, usize), RenderError> {
    use crate::export::annotate_pdf;
    use crate::pdf::{PdfTextDocument, locate_highlights};

    let pdf = bundle.original_pdf().ok_or(RenderError::MissingPdf)?;
    let lines = glyph_lines_by_page(bundle);
    if lines.is_empty() {
        info!("No highlights to render");
    }

    let doc = PdfTextDocument::from_bytes(pdf)?;
    let regions = locate_highlights(&doc, &lines, calibration);
    // the text layer holds the PDF open; release it before rewriting
    drop(doc);

    let bytes = annotate_pdf(pdf, &regions, calibration, style)?;
    Ok((bytes, regions.len()))
}

#[cfg(not(feature = "pdf"))]
pub fn annotated_pdf(
    _bundle: &DocumentBundle,
    _calibration: &Calibration,
    _style: &HighlightStyle,
) -> Result<(Vec<u8>, usize), RenderError> {
    Err(RenderError::PdfUnavailable)
}

/// Position records for every located highlight.
///
/// `pdf_override` replaces the bundle's embedded PDF, for when the
/// annotation target holds a different copy of the document.
pub fn extract_positions(
    bundle_path: &Path,
    pdf_override: Option<&[u8]>,
    calibration: &Calibration,
    style: &HighlightStyle,
) -> Result<Vec<PositionRecord>, RenderError> {
    let result = DocumentBundle::open(bundle_path)
        .map_err(RenderError::from)
        .and_then(|bundle| positions(&bundle, pdf_override, calibration, style));

    match &result {
        Ok(records) => info!("Extracted {} highlight position(s)", records.len()),
        Err(e) => warn!(
            "Failed to extract highlight positions for {}: {e}",
            display_name(bundle_path)
        ),
    }
    result
}

#[cfg(feature = "pdf")]
pub fn positions(
    bundle: &DocumentBundle,
    pdf_override: Option<&[u8]>,
    calibration: &Calibration,
    style: &HighlightStyle,
) -> Result<Vec<PositionRecord>, RenderError> {
    use crate::pdf::{PdfTextDocument, TextDocument, TextLayer, locate_highlights};
    use std::collections::HashMap;

    let lines = glyph_lines_by_page(bundle);
    if lines.is_empty() {
        return Ok(Vec::new());
    }

    let pdf = pdf_override
        .or_else(|| bundle.original_pdf())
        .ok_or(RenderError::MissingPdf)?;
    let doc = PdfTextDocument::from_bytes(pdf)?;
    let regions = locate_highlights(&doc, &lines, calibration);

    let mut page_texts: HashMap<usize, String> = HashMap::new();
    let mut records = Vec::with_capacity(regions.len());
    for region in &regions {
        if !page_texts.contains_key(&region.page_index) {
            let text = doc
                .page(region.page_index)
                .and_then(|page| page.text())
                .unwrap_or_else(|e| {
                    warn!("Failed to extract text of page {}: {e}", region.page_index);
                    String::new()
                });
            page_texts.insert(region.page_index, text);
        }
        let page_text = page_texts
            .get(&region.page_index)
            .map(String::as_str)
            .unwrap_or_default();
        records.push(PositionRecord::from_region(region, page_text, style));
    }
    Ok(records)
}

#[cfg(not(feature = "pdf"))]
pub fn positions(
    _bundle: &DocumentBundle,
    _pdf_override: Option<&[u8]>,
    _calibration: &Calibration,
    _style: &HighlightStyle,
) -> Result<Vec<PositionRecord>, RenderError> {
    Err(RenderError::PdfUnavailable)
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), RenderError> {
    use std::io::Write;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.persist(path)?;
    Ok(())
}
