//! MuPDF-backed text layer.

use mupdf::text_page::TextBlockType;
use mupdf::{Document, Page, TextPageFlags};

use super::locate::{LocateError, TextDocument, TextLayer};
use super::types::Quad;

/// Upper bound on hits returned by one page search.
const MAX_SEARCH_HITS: u32 = 512;

pub struct PdfTextDocument {
    doc: Document,
    page_count: usize,
}

impl PdfTextDocument {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LocateError> {
        let doc = Document::from_bytes(bytes, "application/pdf")?;
        let page_count = doc.page_count()?.max(0) as usize;
        Ok(Self { doc, page_count })
    }
}

impl TextDocument for PdfTextDocument {
    type Page = PdfTextPage;

    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page(&self, index: usize) -> Result<PdfTextPage, LocateError> {
        if index >= self.page_count {
            return Err(LocateError::PageOutOfRange {
                index,
                count: self.page_count,
            });
        }
        let page = self.doc.load_page(index as i32)?;
        let bounds = page.bounds()?;
        Ok(PdfTextPage {
            height: bounds.y1 - bounds.y0,
            page,
        })
    }
}

pub struct PdfTextPage {
    page: Page,
    height: f32,
}

impl TextLayer for PdfTextPage {
    fn height(&self) -> f32 {
        self.height
    }

    fn text(&self) -> Result<String, LocateError> {
        let text_page = self.page.to_text_page(TextPageFlags::empty())?;
        let mut text = String::new();
        for block in text_page.blocks() {
            if block.r#type() != TextBlockType::Text {
                continue;
            }
            for line in block.lines() {
                text.extend(line.chars().filter_map(|ch| ch.char()));
                text.push('\n');
            }
        }
        Ok(text)
    }

    fn search(&self, needle: &str) -> Result<Vec<Quad>, LocateError> {
        let hits = self.page.search(needle, MAX_SEARCH_HITS)?;
        Ok(hits.iter().map(Quad::from).collect())
    }
}
