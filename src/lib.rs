pub mod bundle;
pub mod export;
pub mod highlights;
pub mod merge;
pub mod panic_handler;
pub mod pdf;
pub mod pipeline;
pub mod scene;
pub mod settings;
pub mod stats;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use bundle::{BundleError, DocumentBundle};
pub use export::{PositionRecord, RenderError};
pub use highlights::PageHighlights;
pub use scene::RawGlyphRun;
pub use settings::{Calibration, HighlightStyle, Settings};
pub use stats::HighlightStats;
