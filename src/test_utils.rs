//! Fixture builders shared by unit and integration tests.

use std::io::{Cursor, Write};
use std::path::Path;

use serde_json::Value;
use zip::ZipWriter;
use zip::write::FileOptions;

use crate::pdf::{LocateError, Quad, Rect, TextDocument, TextLayer};

const SCENE_HEADER: &[u8; 43] = b"reMarkable .lines file, version=6          ";
const GLYPH_BLOCK: u8 = 0x03;

/// Builder for v6 scene files containing glyph-range highlight items.
#[derive(Default)]
pub struct SceneBuilder {
    blocks: Vec<Vec<u8>>,
}

impl SceneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highlight whose first rectangle starts at device `y`.
    pub fn glyph(mut self, text: &str, y: f64, color: u32) -> Self {
        self.blocks.push(glyph_block(Some(text), Some(y), color));
        self
    }

    /// Highlight that carries no rectangles, hence no position.
    pub fn glyph_without_rects(mut self, text: &str, color: u32) -> Self {
        self.blocks.push(glyph_block(Some(text), None, color));
        self
    }

    /// Deleted glyph item: CRDT bookkeeping only, no value.
    pub fn deleted_glyph(mut self) -> Self {
        self.blocks.push(glyph_block(None, None, 0));
        self
    }

    /// A block of some other type, like the tree and stroke blocks a real
    /// scene file is mostly made of.
    pub fn filler_block(mut self, block_type: u8) -> Self {
        self.blocks.push(block(block_type, &[0x1F, 0, 1, 0x2F, 0, 2]));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut data = SCENE_HEADER.to_vec();
        for block in self.blocks {
            data.extend(block);
        }
        data
    }
}

fn push_tag(out: &mut Vec<u8>, index: u8, kind: u8) {
    out.push((index << 4) | kind);
}

fn push_id(out: &mut Vec<u8>, index: u8, counter: u8) {
    push_tag(out, index, 0xF);
    out.extend_from_slice(&[0, counter]);
}

fn push_int(out: &mut Vec<u8>, index: u8, value: u32) {
    push_tag(out, index, 0x4);
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_subblock(out: &mut Vec<u8>, index: u8, body: &[u8]) {
    push_tag(out, index, 0xC);
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(body);
}

fn push_varuint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn block(block_type: u8, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 8);
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&[0, 1, 1, block_type]);
    out.extend_from_slice(body);
    out
}

fn glyph_block(text: Option<&str>, y: Option<f64>, color: u32) -> Vec<u8> {
    let mut body = Vec::new();
    push_id(&mut body, 1, 1);
    push_id(&mut body, 2, 12);
    push_id(&mut body, 3, 0);
    push_id(&mut body, 4, 0);
    push_int(&mut body, 5, 0);

    if let Some(text) = text {
        let mut value = vec![0x01];
        push_int(&mut value, 2, 0);
        push_int(&mut value, 3, text.chars().count() as u32);
        push_int(&mut value, 4, color);

        let mut string = Vec::new();
        push_varuint(&mut string, text.len() as u64);
        string.push(u8::from(text.is_ascii()));
        string.extend_from_slice(text.as_bytes());
        push_subblock(&mut value, 5, &string);

        if let Some(y) = y {
            let mut rects = Vec::new();
            push_varuint(&mut rects, 1);
            for v in [120.0, y, 8.0 * text.len() as f64, 34.0] {
                rects.extend_from_slice(&f64::to_le_bytes(v));
            }
            push_subblock(&mut value, 6, &rects);
        }

        push_subblock(&mut body, 6, &value);
    }

    block(GLYPH_BLOCK, &body)
}

/// Builder for tablet document bundles.
#[derive(Default)]
pub struct BundleBuilder {
    entries: Vec<(String, Vec<u8>)>,
    stored: bool,
}

impl BundleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store entries uncompressed, so their bytes appear verbatim in the
    /// archive.
    pub fn stored(mut self) -> Self {
        self.stored = true;
        self
    }

    pub fn manifest(self, content: Value) -> Self {
        let bytes = serde_json::to_vec(&content).unwrap();
        self.raw_entry("doc.content", &bytes)
    }

    /// Manifest listing `ids` in the structured page list.
    pub fn pages(self, ids: &[&str]) -> Self {
        let pages: Vec<Value> = ids.iter().map(|id| serde_json::json!({ "id": id })).collect();
        self.manifest(serde_json::json!({ "cPages": { "pages": pages } }))
    }

    pub fn pdf(self, bytes: &[u8]) -> Self {
        self.raw_entry("doc.pdf", bytes)
    }

    pub fn scene(self, page_id: &str, bytes: &[u8]) -> Self {
        self.raw_entry(&format!("doc/{page_id}.rm"), bytes)
    }

    pub fn raw_entry(mut self, name: &str, bytes: &[u8]) -> Self {
        self.entries.push((name.to_string(), bytes.to_vec()));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let method = if self.stored {
            zip::CompressionMethod::Stored
        } else {
            zip::CompressionMethod::Deflated
        };
        let options = FileOptions::default().compression_method(method);
        for (name, bytes) in &self.entries {
            zip.start_file(name.as_str(), options).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    pub fn write_to(self, path: &Path) {
        std::fs::write(path, self.build()).unwrap();
    }
}

const FAKE_LINE_HEIGHT: f32 = 12.0;
const FAKE_CHAR_WIDTH: f32 = 6.0;
const FAKE_LEFT_MARGIN: f32 = 72.0;

/// In-memory page with a deterministic search.
///
/// Lines flow into each other separated by a space, except that a line
/// ending in `-` joins the next line without the hyphen. Every character is
/// `FAKE_CHAR_WIDTH` wide, so quads cover exactly the matched characters.
#[derive(Clone, Debug)]
pub struct FakePage {
    height: f32,
    lines: Vec<(String, f32)>,
}

impl FakePage {
    pub fn new(height: f32) -> Self {
        Self {
            height,
            lines: Vec::new(),
        }
    }

    /// Add a text line whose top edge is at `y`.
    pub fn line(mut self, text: &str, y: f32) -> Self {
        self.lines.push((text.to_string(), y));
        self
    }

    /// Search text with, per byte, the (line, column) it was taken from.
    fn flow(&self) -> (String, Vec<Option<(usize, usize)>>) {
        let mut flow = String::new();
        let mut owners = Vec::new();
        for (index, (text, _)) in self.lines.iter().enumerate() {
            let last = index + 1 == self.lines.len();
            let joined = !last && text.ends_with('-');
            let body = if joined { &text[..text.len() - 1] } else { text.as_str() };

            for (column, ch) in body.chars().enumerate() {
                flow.push(ch);
                owners.push(Some((index, column)));
                owners.extend(std::iter::repeat_n(None, ch.len_utf8() - 1));
            }
            if !joined && !last {
                flow.push(' ');
                owners.push(None);
            }
        }
        (flow, owners)
    }
}

impl TextLayer for FakePage {
    fn height(&self) -> f32 {
        self.height
    }

    fn text(&self) -> Result<String, LocateError> {
        let mut text = String::new();
        for (line, _) in &self.lines {
            text.push_str(line);
            text.push('\n');
        }
        Ok(text)
    }

    fn search(&self, needle: &str) -> Result<Vec<Quad>, LocateError> {
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let (flow, owners) = self.flow();
        let mut quads = Vec::new();

        for (start, matched) in flow.match_indices(needle) {
            // (line, first column, last column) per line touched
            let mut spans: Vec<(usize, usize, usize)> = Vec::new();
            for (line, column) in owners[start..start + matched.len()].iter().flatten() {
                match spans.last_mut() {
                    Some(span) if span.0 == *line => span.2 = *column,
                    _ => spans.push((*line, *column, *column)),
                }
            }
            for (line, first, last) in spans {
                let y = self.lines[line].1;
                quads.push(Quad::from_rect(Rect::new(
                    FAKE_LEFT_MARGIN + first as f32 * FAKE_CHAR_WIDTH,
                    y,
                    FAKE_LEFT_MARGIN + (last + 1) as f32 * FAKE_CHAR_WIDTH,
                    y + FAKE_LINE_HEIGHT,
                )));
            }
        }
        Ok(quads)
    }
}

/// Pages of [`FakePage`]s.
#[derive(Clone, Debug, Default)]
pub struct FakeDocument {
    pages: Vec<FakePage>,
}

impl FakeDocument {
    pub fn new(pages: Vec<FakePage>) -> Self {
        Self { pages }
    }
}

impl TextDocument for FakeDocument {
    type Page = FakePage;

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page(&self, index: usize) -> Result<FakePage, LocateError> {
        self.pages
            .get(index)
            .cloned()
            .ok_or(LocateError::PageOutOfRange {
                index,
                count: self.pages.len(),
            })
    }
}

/// A small text PDF, one entry of `pages` per page, each a list of lines
/// set in 12pt Helvetica from the top of a US Letter page.
#[cfg(feature = "pdf")]
pub fn text_pdf(pages: &[&[&str]]) -> Vec<u8> {
    use lopdf::{Document, Object, Stream, dictionary};

    let mut doc = Document::with_version("1.7");
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();
    for lines in pages {
        let mut content = String::from("BT /F1 12 Tf 14 TL 72 720 Td\n");
        for line in *lines {
            let escaped = line
                .replace('\\', "\\\\")
                .replace('(', "\\(")
                .replace(')', "\\)");
            content.push_str(&format!("({escaped}) Tj T*\n"));
        }
        content.push_str("ET\n");

        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}
