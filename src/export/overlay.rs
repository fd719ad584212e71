//! Burning located highlights into a copy of the PDF as highlight
//! annotations.

use chrono::Local;
use log::{debug, warn};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use super::RenderError;
use crate::pdf::{LocatedRegion, Point, Quad, Rect};
use crate::settings::{Calibration, HighlightStyle};

/// US Letter, used when a page declares no box at all.
const DEFAULT_PAGE_BOX: Rect = Rect::new(0.0, 0.0, 612.0, 792.0);

/// Page tree depth beyond which box inheritance is not followed.
const MAX_INHERITANCE_DEPTH: usize = 32;

/// Print flag: annotations show up when the document is printed.
const FLAG_PRINT: i64 = 4;

/// Add one highlight annotation per region and return the saved PDF.
///
/// Quads are slimmed by `calibration.highlight_trim` first. Regions that
/// point past the last page are skipped.
pub fn annotate_pdf(
    pdf: &[u8],
    regions: &[LocatedRegion],
    calibration: &Calibration,
    style: &HighlightStyle,
) -> Result<Vec<u8>, RenderError> {
    let mut doc = Document::load_mem(pdf)?;
    let pages = doc.get_pages();
    let stamp = Local::now().format("D:%Y%m%d%H%M%S").to_string();

    for region in regions {
        let Some(&page_id) = pages.get(&((region.page_index + 1) as u32)) else {
            warn!(
                "Skipping highlight on page {}: not in PDF ({} pages)",
                region.page_index,
                pages.len()
            );
            continue;
        };

        let page_box = page_box(&doc, page_id);
        let space = PdfSpace { page_box };
        let quads: Vec<Quad> = region
            .quads
            .iter()
            .map(|quad| space.quad(&quad.slimmed(calibration.highlight_trim)))
            .collect();

        let annot = highlight_annotation(&mut doc, page_id, region, &quads, style, &stamp);
        let annot_id = doc.add_object(Object::Dictionary(annot));
        attach_annotation(&mut doc, page_id, annot_id)?;
    }

    debug!("Added {} highlight annotation(s)", regions.len());

    doc.compress();
    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

/// Maps text-layer coordinates (top-left origin, relative to the visible
/// page box) into PDF user space.
struct PdfSpace {
    page_box: Rect,
}

impl PdfSpace {
    fn point(&self, p: Point) -> Point {
        Point::new(self.page_box.x0 + p.x, self.page_box.y1 - p.y)
    }

    fn quad(&self, q: &Quad) -> Quad {
        Quad::new(
            self.point(q.ul),
            self.point(q.ur),
            self.point(q.ll),
            self.point(q.lr),
        )
    }
}

fn highlight_annotation(
    doc: &mut Document,
    page_id: ObjectId,
    region: &LocatedRegion,
    quads: &[Quad],
    style: &HighlightStyle,
    stamp: &str,
) -> Dictionary {
    let bbox = quads
        .iter()
        .map(Quad::rect)
        .reduce(|a, b| a.union(&b))
        .unwrap_or_default();

    let quad_points = quads
        .iter()
        .flat_map(|q| [q.ul, q.ur, q.ll, q.lr])
        .flat_map(|p| [Object::Real(p.x), Object::Real(p.y)])
        .collect();

    let [r, g, b] = style.overlay_color;
    let appearance = appearance_stream(quads, bbox, style);
    let appearance_id = doc.add_object(appearance);

    let mut ap = Dictionary::new();
    ap.set("N", Object::Reference(appearance_id));

    let name = format!(
        "inkmarks-{:x}",
        md5::compute(format!("{}|{}", region.page_index, region.text))
    );

    let mut annot = Dictionary::new();
    annot.set("Type", Object::Name(b"Annot".to_vec()));
    annot.set("Subtype", Object::Name(b"Highlight".to_vec()));
    annot.set("Rect", rect_array(bbox));
    annot.set("QuadPoints", Object::Array(quad_points));
    annot.set(
        "C",
        Object::Array(vec![Object::Real(r), Object::Real(g), Object::Real(b)]),
    );
    annot.set("CA", Object::Real(style.overlay_opacity));
    annot.set("F", Object::Integer(FLAG_PRINT));
    annot.set("Contents", text_string(&region.text));
    annot.set(
        "NM",
        Object::String(name.into_bytes(), StringFormat::Literal),
    );
    annot.set(
        "M",
        Object::String(stamp.as_bytes().to_vec(), StringFormat::Literal),
    );
    annot.set("P", Object::Reference(page_id));
    annot.set("AP", Object::Dictionary(ap));
    annot
}

/// Form XObject filling the quads with a multiply blend, for viewers that
/// do not synthesize highlight appearances themselves.
fn appearance_stream(quads: &[Quad], bbox: Rect, style: &HighlightStyle) -> Stream {
    let [r, g, b] = style.overlay_color;
    let mut content = format!("/GS0 gs {r} {g} {b} rg\n");
    for q in quads {
        // around the quad: ul, ur, lr, ll
        content.push_str(&format!(
            "{} {} m {} {} l {} {} l {} {} l h f\n",
            q.ul.x, q.ul.y, q.ur.x, q.ur.y, q.lr.x, q.lr.y, q.ll.x, q.ll.y
        ));
    }

    let mut gs = Dictionary::new();
    gs.set("Type", Object::Name(b"ExtGState".to_vec()));
    gs.set("CA", Object::Real(style.overlay_opacity));
    gs.set("ca", Object::Real(style.overlay_opacity));
    gs.set("BM", Object::Name(b"Multiply".to_vec()));

    let mut ext_g_state = Dictionary::new();
    ext_g_state.set("GS0", Object::Dictionary(gs));

    let mut resources = Dictionary::new();
    resources.set("ExtGState", Object::Dictionary(ext_g_state));

    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Form".to_vec()));
    dict.set("BBox", rect_array(bbox));
    dict.set("Resources", Object::Dictionary(resources));

    Stream::new(dict, content.into_bytes())
}

fn rect_array(r: Rect) -> Object {
    Object::Array(vec![
        Object::Real(r.x0),
        Object::Real(r.y0),
        Object::Real(r.x1),
        Object::Real(r.y1),
    ])
}

/// PDF text string: literal when ASCII, UTF-16BE with byte order mark
/// otherwise.
fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::String(text.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn attach_annotation(
    doc: &mut Document,
    page_id: ObjectId,
    annot_id: ObjectId,
) -> Result<(), RenderError> {
    // Annots may live in a separate array object
    let shared_array = doc
        .get_dictionary(page_id)?
        .get(b"Annots")
        .ok()
        .and_then(|annots| annots.as_reference().ok());
    if let Some(array_id) = shared_array {
        if let Ok(Object::Array(annots)) = doc.get_object_mut(array_id) {
            annots.push(Object::Reference(annot_id));
            return Ok(());
        }
    }

    let page = doc.get_dictionary_mut(page_id)?;
    let mut annots = match page.remove(b"Annots") {
        Some(Object::Array(annots)) => annots,
        _ => Vec::new(),
    };
    annots.push(Object::Reference(annot_id));
    page.set("Annots", Object::Array(annots));
    Ok(())
}

/// Visible page box: CropBox, else MediaBox, either possibly inherited from
/// the page tree.
fn page_box(doc: &Document, page_id: ObjectId) -> Rect {
    inherited_rect(doc, page_id, b"CropBox")
        .or_else(|| inherited_rect(doc, page_id, b"MediaBox"))
        .unwrap_or(DEFAULT_PAGE_BOX)
}

fn inherited_rect(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Rect> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_INHERITANCE_DEPTH {
        if let Some(rect) = node.get(key).ok().and_then(|obj| rect_value(doc, obj)) {
            return Some(rect);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn rect_value(doc: &Document, obj: &Object) -> Option<Rect> {
    let (_, obj) = doc.dereference(obj).ok()?;
    let values: Vec<f32> = obj
        .as_array()
        .ok()?
        .iter()
        .map(|v| doc.dereference(v).ok()?.1.as_float().ok())
        .collect::<Option<_>>()?;
    let [a, b, c, d] = values[..] else {
        return None;
    };
    Some(Rect::new(a.min(c), b.min(d), a.max(c), b.max(d)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::text_pdf;

    fn region(page_index: usize, rect: Rect, text: &str) -> LocatedRegion {
        LocatedRegion {
            text: text.to_string(),
            page_index,
            quads: vec![Quad::from_rect(rect)],
            page_height: 792.0,
        }
    }

    fn annotations(pdf: &[u8], page_number: u32) -> Vec<Dictionary> {
        let doc = Document::load_mem(pdf).unwrap();
        let page_id = doc.get_pages()[&page_number];
        let page = doc.get_dictionary(page_id).unwrap();
        let Ok(annots) = page.get(b"Annots") else {
            return Vec::new();
        };
        let (_, annots) = doc.dereference(annots).unwrap();
        annots
            .as_array()
            .unwrap()
            .iter()
            .map(|r| doc.get_dictionary(r.as_reference().unwrap()).unwrap().clone())
            .collect()
    }

    fn floats(obj: &Object) -> Vec<f32> {
        obj.as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_float().unwrap())
            .collect()
    }

    #[test]
    fn test_highlight_written_in_pdf_space() {
        let pdf = text_pdf(&[&["first page"], &["second page"]]);
        let regions = [region(1, Rect::new(72.0, 100.0, 172.0, 110.0), "second page")];
        let out = annotate_pdf(
            &pdf,
            &regions,
            &Calibration::default(),
            &HighlightStyle::default(),
        )
        .unwrap();

        assert!(annotations(&out, 1).is_empty());
        let annots = annotations(&out, 2);
        assert_eq!(annots.len(), 1);

        let annot = &annots[0];
        assert_eq!(annot.get(b"Subtype").unwrap().as_name().unwrap(), b"Highlight");
        // slimmed by 2pt each side, then flipped against the 792pt page
        assert_eq!(
            floats(annot.get(b"QuadPoints").unwrap()),
            vec![72.0, 690.0, 172.0, 690.0, 72.0, 684.0, 172.0, 684.0]
        );
        assert_eq!(
            floats(annot.get(b"Rect").unwrap()),
            vec![72.0, 684.0, 172.0, 690.0]
        );
        let opacity = annot.get(b"CA").unwrap().as_float().unwrap();
        assert!((opacity - HighlightStyle::default().overlay_opacity).abs() < 1e-4);
        assert!(annot.get(b"AP").is_ok());
    }

    #[test]
    fn test_regions_beyond_last_page_skipped() {
        let pdf = text_pdf(&[&["only page"]]);
        let regions = [region(4, Rect::new(0.0, 0.0, 10.0, 10.0), "ghost")];
        let out = annotate_pdf(
            &pdf,
            &regions,
            &Calibration::default(),
            &HighlightStyle::default(),
        )
        .unwrap();
        assert!(annotations(&out, 1).is_empty());
    }

    #[test]
    fn test_appends_to_existing_annotations() {
        let pdf = text_pdf(&[&["text"]]);
        let regions = [
            region(0, Rect::new(72.0, 100.0, 100.0, 110.0), "one"),
            region(0, Rect::new(72.0, 200.0, 100.0, 210.0), "two"),
        ];
        let style = HighlightStyle::default();
        let once = annotate_pdf(&pdf, &regions[..1], &Calibration::default(), &style).unwrap();
        let twice = annotate_pdf(&once, &regions[1..], &Calibration::default(), &style).unwrap();
        assert_eq!(annotations(&twice, 1).len(), 2);
    }

    #[test]
    fn test_not_a_pdf_is_error() {
        let result = annotate_pdf(
            b"garbage",
            &[],
            &Calibration::default(),
            &HighlightStyle::default(),
        );
        assert!(matches!(result, Err(RenderError::Write(_))));
    }

    #[test]
    fn test_text_string_encoding() {
        let Object::String(bytes, StringFormat::Literal) = text_string("plain") else {
            panic!("ASCII text should be a literal string");
        };
        assert_eq!(bytes, b"plain");

        let Object::String(bytes, StringFormat::Hexadecimal) = text_string("é") else {
            panic!("non-ASCII text should be a hex string");
        };
        assert_eq!(bytes, [0xFE, 0xFF, 0x00, 0xE9]);
    }

    #[test]
    fn test_inherited_media_box() {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        let page_id = doc.add_object(Object::Dictionary(page));

        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Kids", Object::Array(vec![Object::Reference(page_id)]));
        pages.set("Count", Object::Integer(1));
        pages.set(
            "MediaBox",
            Object::Array(vec![0.into(), 0.into(), 595.into(), 842.into()]),
        );
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        assert_eq!(page_box(&doc, page_id), Rect::new(0.0, 0.0, 595.0, 842.0));
    }
}
