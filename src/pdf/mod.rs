//! Locating highlighted text in the original PDF.

#[cfg(feature = "pdf")]
mod document;
mod locate;
mod recover;
mod types;

#[cfg(feature = "pdf")]
pub use document::{PdfTextDocument, PdfTextPage};
pub use locate::{
    GlyphLine, GlyphLinesByPage, LocateError, LocatedRegion, TextDocument, TextLayer, group_quads,
    locate_highlights, locate_on_page,
};
pub use recover::recover_pdf_text;
pub use types::*;
