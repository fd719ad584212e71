//! Position records for a remote annotation API.
//!
//! Rectangles are converted from the top-left-origin space the text layer
//! reports into PDF user space (origin bottom-left).

use serde::Serialize;
use serde_json::{Value, json};

use crate::pdf::{LocatedRegion, Rect};
use crate::settings::HighlightStyle;

/// Tag attached to every exported annotation so later runs can find them.
pub const ANNOTATION_TAG: &str = "inkmarks";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PositionRecord {
    pub text: String,
    pub page_index: usize,
    /// 1-based page number as a string.
    pub page_label: String,
    /// `[x0, y0, x1, y1]` in PDF user space, rounded to 3 decimals.
    pub rects: Vec<[f64; 4]>,
    /// `PPPPP|CCCCCC|TTTTT`: page, character offset, distance from bottom.
    pub sort_index: String,
    pub color: String,
}

impl PositionRecord {
    /// Build the record for one located region. `page_text` is the page's
    /// plain text, used to order highlights by reading position.
    pub fn from_region(region: &LocatedRegion, page_text: &str, style: &HighlightStyle) -> Self {
        let page_height = f64::from(region.page_height);
        let rects = region
            .quads
            .iter()
            .map(|quad| to_pdf_space(quad.rect(), page_height))
            .collect();

        let char_offset = page_text
            .find(&region.text)
            .map(|byte| page_text[..byte].chars().count())
            .unwrap_or(0);

        Self {
            text: region.text.clone(),
            page_index: region.page_index,
            page_label: (region.page_index + 1).to_string(),
            rects,
            sort_index: sort_index(region.page_index, char_offset, page_height, region.top()),
            color: style.export_color.clone(),
        }
    }

    /// JSON item for the annotation API, attached to `parent_key`.
    pub fn annotation_item(&self, parent_key: &str) -> Value {
        let position = json!({
            "pageIndex": self.page_index,
            "rects": self.rects,
        });
        json!({
            "itemType": "annotation",
            "parentItem": parent_key,
            "annotationType": "highlight",
            "annotationText": self.text,
            "annotationComment": "",
            "annotationColor": self.color,
            "annotationPageLabel": self.page_label,
            "annotationSortIndex": self.sort_index,
            "annotationPosition": position.to_string(),
            "tags": [{ "tag": ANNOTATION_TAG }],
        })
    }
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

fn to_pdf_space(rect: Rect, page_height: f64) -> [f64; 4] {
    [
        round3(f64::from(rect.x0)),
        round3(page_height - f64::from(rect.y1)),
        round3(f64::from(rect.x1)),
        round3(page_height - f64::from(rect.y0)),
    ]
}

fn sort_index(page_index: usize, char_offset: usize, page_height: f64, top: f32) -> String {
    let from_bottom = (page_height - f64::from(top)) as i64;
    format!("{page_index:05}|{char_offset:06}|{from_bottom:05}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::Quad;

    fn region(text: &str, page_index: usize, rects: &[Rect]) -> LocatedRegion {
        LocatedRegion {
            text: text.to_string(),
            page_index,
            quads: rects.iter().copied().map(Quad::from_rect).collect(),
            page_height: 792.0,
        }
    }

    #[test]
    fn test_rects_flipped_to_bottom_origin() {
        let r = region("text", 0, &[Rect::new(72.0, 100.0, 300.5, 112.25)]);
        let record = PositionRecord::from_region(&r, "", &HighlightStyle::default());
        assert_eq!(record.rects, vec![[72.0, 679.75, 300.5, 692.0]]);
    }

    #[test]
    fn test_rects_rounded() {
        let r = region("t", 0, &[Rect::new(1.23456, 0.0, 2.0, 10.0)]);
        let record = PositionRecord::from_region(&r, "", &HighlightStyle::default());
        assert_eq!(record.rects[0][0], 1.235);
    }

    #[test]
    fn test_sort_index_and_labels() {
        let page_text = "Intro line\nthe highlighted words here\n";
        let r = region(
            "highlighted words",
            2,
            &[Rect::new(72.0, 300.0, 200.0, 312.0), Rect::new(72.0, 200.0, 90.0, 212.0)],
        );
        let record = PositionRecord::from_region(&r, page_text, &HighlightStyle::default());
        assert_eq!(record.page_label, "3");
        assert_eq!(record.sort_index, "00002|000015|00592");
        assert_eq!(record.color, "#ffd400");
    }

    #[test]
    fn test_sort_index_counts_chars_not_bytes() {
        let r = region("target", 0, &[Rect::new(0.0, 0.0, 1.0, 1.0)]);
        let record = PositionRecord::from_region(&r, "éé target", &HighlightStyle::default());
        assert!(record.sort_index.contains("|000003|"));
    }

    #[test]
    fn test_text_missing_from_page_text_offset_zero() {
        let r = region("proofs,standard", 0, &[Rect::new(0.0, 92.0, 1.0, 100.0)]);
        let record = PositionRecord::from_region(&r, "proofs,\nstandard", &HighlightStyle::default());
        assert_eq!(record.sort_index, "00000|000000|00700");
    }

    #[test]
    fn test_annotation_item() {
        let r = region("quoted", 0, &[Rect::new(10.0, 20.0, 30.0, 40.0)]);
        let record = PositionRecord::from_region(&r, "", &HighlightStyle::default());
        let item = record.annotation_item("ABCD1234");

        assert_eq!(item["itemType"], "annotation");
        assert_eq!(item["parentItem"], "ABCD1234");
        assert_eq!(item["annotationType"], "highlight");
        assert_eq!(item["annotationText"], "quoted");
        assert_eq!(item["annotationComment"], "");
        assert_eq!(item["annotationPageLabel"], "1");
        assert_eq!(item["tags"][0]["tag"], ANNOTATION_TAG);

        let position: Value =
            serde_json::from_str(item["annotationPosition"].as_str().unwrap()).unwrap();
        assert_eq!(position["pageIndex"], 0);
        assert_eq!(position["rects"][0][1], 752.0);
    }
}
