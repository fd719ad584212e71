pub mod note;
#[cfg(feature = "pdf")]
pub mod overlay;
pub mod positions;
pub mod template;

pub use note::{
    DEFAULT_NOTE_TEMPLATE, NO_HIGHLIGHTS_MARKDOWN, render_highlights_html,
    render_highlights_markdown, render_note, render_note_with_template,
};
#[cfg(feature = "pdf")]
pub use overlay::annotate_pdf;
pub use positions::{ANNOTATION_TAG, PositionRecord};
pub use template::TemplateEngine;

use crate::bundle::BundleError;
use crate::pdf::LocateError;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("PDF support is not compiled in (build with the `pdf` feature)")]
    PdfUnavailable,

    #[error("bundle contains no PDF")]
    MissingPdf,

    #[error("failed to read bundle: {0}")]
    Bundle(#[from] BundleError),

    #[error("PDF text layer: {0}")]
    Locate(#[from] LocateError),

    #[cfg(feature = "pdf")]
    #[error("PDF write: {0}")]
    Write(#[from] lopdf::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to save output: {0}")]
    Persist(#[from] tempfile::PersistError),
}
