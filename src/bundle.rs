//! Tablet document bundles: a zip archive holding the original PDF, a JSON
//! manifest (`.content`) with page order, and one scene file per annotated
//! page.

use log::{debug, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid bundle archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("malformed manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("bundle has no .content manifest")]
    MissingManifest,
}

/// One manifest page, in reading order.
#[derive(Clone, Copy, Debug)]
pub struct BundlePage<'a> {
    /// 0-based position in the manifest.
    pub index: usize,
    pub id: &'a str,
    /// Scene file bytes, when the page was annotated.
    pub scene: Option<&'a [u8]>,
}

impl BundlePage<'_> {
    /// 1-based page number.
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// Bundle contents read fully into memory. The archive handle is closed
/// before construction returns.
#[derive(Clone, Debug, Default)]
pub struct DocumentBundle {
    pdf: Option<Vec<u8>>,
    page_ids: Vec<String>,
    scenes: HashMap<String, Vec<u8>>,
}

impl DocumentBundle {
    pub fn open(path: &Path) -> Result<Self, BundleError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BundleError> {
        Self::from_reader(Cursor::new(bytes))
    }

    /// Read a bundle from any seekable source.
    ///
    /// Only archive-level problems are errors. An entry that fails to
    /// decompress is logged and treated as absent, so one damaged scene
    /// file costs only its page. A missing or malformed manifest leaves the
    /// bundle with no pages; the PDF is still available.
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self, BundleError> {
        let mut archive = ZipArchive::new(reader)?;

        let mut pdf = None;
        let mut manifest = None;
        let mut scenes = HashMap::new();

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();

            if name.ends_with(".pdf") {
                if pdf.is_none() {
                    pdf = read_entry_logged(&mut entry, &name);
                }
            } else if name.ends_with(".content") {
                if manifest.is_none() {
                    manifest = Some(read_entry(&mut entry));
                }
            } else if name.ends_with(".rm") {
                let Some(stem) = Path::new(&name).file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                if !scenes.contains_key(stem) {
                    let stem = stem.to_string();
                    if let Some(data) = read_entry_logged(&mut entry, &name) {
                        scenes.insert(stem, data);
                    }
                }
            }
        }

        let page_ids = match manifest
            .unwrap_or(Err(BundleError::MissingManifest))
            .and_then(|bytes| parse_page_ids(&bytes))
        {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Could not read page order from bundle: {e}");
                Vec::new()
            }
        };

        debug!(
            "Bundle has {} page(s), {} scene file(s), pdf: {}",
            page_ids.len(),
            scenes.len(),
            pdf.is_some()
        );

        Ok(Self {
            pdf,
            page_ids,
            scenes,
        })
    }

    /// Like [`DocumentBundle::open`], but any failure yields an empty bundle.
    pub fn load(path: &Path) -> Self {
        Self::open(path).unwrap_or_else(|e| {
            warn!("Failed to read bundle {path:?}: {e}");
            Self::default()
        })
    }

    /// Number of pages listed in the manifest.
    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    pub fn original_pdf(&self) -> Option<&[u8]> {
        self.pdf.as_deref()
    }

    pub fn page_ids(&self) -> &[String] {
        &self.page_ids
    }

    /// Manifest pages in reading order. A page id listed twice only gets
    /// its scene on the first listing.
    pub fn pages(&self) -> impl Iterator<Item = BundlePage<'_>> {
        self.page_ids.iter().enumerate().map(|(index, id)| {
            let first_listing = self.page_ids.iter().position(|other| other == id) == Some(index);
            BundlePage {
                index,
                id: id.as_str(),
                scene: first_listing
                    .then(|| self.scenes.get(id))
                    .flatten()
                    .map(Vec::as_slice),
            }
        })
    }
}

fn read_entry<R: Read>(entry: &mut R) -> Result<Vec<u8>, BundleError> {
    let mut data = Vec::new();
    entry.read_to_end(&mut data)?;
    Ok(data)
}

fn read_entry_logged<R: Read>(entry: &mut R, name: &str) -> Option<Vec<u8>> {
    read_entry(entry)
        .inspect_err(|e| warn!("Skipping unreadable bundle entry {name}: {e}"))
        .ok()
}

/// Page ids come from `cPages.pages` (objects with an `id`), falling back to
/// the legacy flat `pages` list.
fn parse_page_ids(manifest: &[u8]) -> Result<Vec<String>, BundleError> {
    let content: Value = serde_json::from_slice(manifest)?;

    let structured = content
        .get("cPages")
        .and_then(|c| c.get("pages"))
        .and_then(Value::as_array)
        .filter(|pages| !pages.is_empty());
    let pages = match structured {
        Some(pages) => pages,
        None => match content.get("pages").and_then(Value::as_array) {
            Some(pages) => pages,
            None => return Ok(Vec::new()),
        },
    };

    Ok(pages.iter().map(page_id).collect())
}

fn page_id(value: &Value) -> String {
    match value {
        Value::Object(map) => map
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        Value::String(id) => id.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::BundleBuilder;
    use serde_json::json;

    #[test]
    fn test_structured_page_list() {
        let bytes = BundleBuilder::new()
            .manifest(json!({"cPages": {"pages": [{"id": "p1"}, {"id": "p2"}, {"id": "p3"}]}}))
            .pdf(b"%PDF-1.4 fake")
            .scene("p2", b"scene two")
            .build();

        let bundle = DocumentBundle::from_bytes(&bytes).unwrap();
        assert_eq!(bundle.page_count(), 3);
        assert_eq!(bundle.original_pdf(), Some(&b"%PDF-1.4 fake"[..]));

        let pages: Vec<_> = bundle.pages().collect();
        assert_eq!(pages[1].id, "p2");
        assert_eq!(pages[1].number(), 2);
        assert_eq!(pages[1].scene, Some(&b"scene two"[..]));
        assert!(pages[0].scene.is_none());
    }

    #[test]
    fn test_legacy_page_list() {
        let bytes = BundleBuilder::new()
            .manifest(json!({"pages": ["a", "b"]}))
            .build();
        let bundle = DocumentBundle::from_bytes(&bytes).unwrap();
        assert_eq!(bundle.page_ids(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_empty_structured_list_falls_back() {
        let bytes = BundleBuilder::new()
            .manifest(json!({"cPages": {"pages": []}, "pages": ["x", 7]}))
            .build();
        let bundle = DocumentBundle::from_bytes(&bytes).unwrap();
        assert_eq!(bundle.page_ids(), &["x".to_string(), "7".to_string()]);
    }

    #[test]
    fn test_unmatched_scene_ignored() {
        let bytes = BundleBuilder::new()
            .manifest(json!({"pages": ["known"]}))
            .scene("stray", b"orphan")
            .build();
        let bundle = DocumentBundle::from_bytes(&bytes).unwrap();
        assert!(bundle.pages().all(|page| page.scene.is_none()));
    }

    #[test]
    fn test_duplicate_page_id_scene_on_first_listing() {
        let bytes = BundleBuilder::new()
            .manifest(json!({"pages": ["dup", "other", "dup"]}))
            .scene("dup", b"data")
            .build();
        let bundle = DocumentBundle::from_bytes(&bytes).unwrap();
        let scenes: Vec<bool> = bundle.pages().map(|p| p.scene.is_some()).collect();
        assert_eq!(scenes, vec![true, false, false]);
    }

    #[test]
    fn test_malformed_manifest_keeps_pdf() {
        let bytes = BundleBuilder::new()
            .raw_entry("doc.content", b"{ not json")
            .pdf(b"%PDF")
            .build();
        let bundle = DocumentBundle::from_bytes(&bytes).unwrap();
        assert_eq!(bundle.page_count(), 0);
        assert!(bundle.original_pdf().is_some());
    }

    #[test]
    fn test_missing_manifest_has_no_pages() {
        let bytes = BundleBuilder::new().pdf(b"%PDF").build();
        let bundle = DocumentBundle::from_bytes(&bytes).unwrap();
        assert_eq!(bundle.page_count(), 0);
    }

    /// Flip one byte inside the stored data of `payload` so its CRC fails.
    fn damage(archive: &mut [u8], payload: &[u8]) {
        let at = archive
            .windows(payload.len())
            .position(|window| window == payload)
            .unwrap();
        archive[at] ^= 0xFF;
    }

    #[test]
    fn test_damaged_scene_costs_only_its_page() {
        let mut bytes = BundleBuilder::new()
            .stored()
            .pages(&["a", "b"])
            .scene("a", b"scene for page one")
            .scene("b", b"scene for page two")
            .build();
        damage(&mut bytes, b"scene for page two");

        let bundle = DocumentBundle::from_bytes(&bytes).unwrap();
        assert_eq!(bundle.page_count(), 2);
        let scenes: Vec<_> = bundle.pages().map(|p| p.scene).collect();
        assert_eq!(scenes, vec![Some(&b"scene for page one"[..]), None]);
    }

    #[test]
    fn test_damaged_pdf_keeps_pages() {
        let mut bytes = BundleBuilder::new()
            .stored()
            .pages(&["a"])
            .pdf(b"%PDF-1.7 damaged body")
            .scene("a", b"scene")
            .build();
        damage(&mut bytes, b"%PDF-1.7 damaged body");

        let bundle = DocumentBundle::from_bytes(&bytes).unwrap();
        assert!(bundle.original_pdf().is_none());
        assert_eq!(bundle.page_count(), 1);
        assert!(bundle.pages().next().unwrap().scene.is_some());
    }

    #[test]
    fn test_damaged_manifest_keeps_pdf() {
        let manifest = br#"{"pages": ["a", "b"]}"#;
        let mut bytes = BundleBuilder::new()
            .stored()
            .raw_entry("doc.content", manifest)
            .pdf(b"%PDF")
            .build();
        damage(&mut bytes, manifest);

        let bundle = DocumentBundle::from_bytes(&bytes).unwrap();
        assert_eq!(bundle.page_count(), 0);
        assert!(bundle.original_pdf().is_some());
    }

    #[test]
    fn test_not_a_zip_is_error() {
        assert!(matches!(
            DocumentBundle::from_bytes(b"plain text"),
            Err(BundleError::Zip(_))
        ));
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let bundle = DocumentBundle::load(Path::new("/nonexistent/bundle.zip"));
        assert_eq!(bundle.page_count(), 0);
        assert!(bundle.original_pdf().is_none());
    }
}
