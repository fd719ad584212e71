use chrono::NaiveDate;
use std::collections::HashMap;

use super::template::TemplateEngine;
use crate::highlights::PageHighlights;
use crate::stats::HighlightStats;

pub const NO_HIGHLIGHTS_MARKDOWN: &str = "*No highlights extracted.*";

/// Frontmatter and body of a reading note. Zero-valued stats render empty,
/// which drops their lines.
pub const DEFAULT_NOTE_TEMPLATE: &str = r#"---
title: "{{title}}"
date_read: {{date_read}}
engagement: {{engagement}}
highlighted_pages: {{highlighted_pages}}
highlight_word_count: {{highlight_word_count}}
page_count: {{page_count}}
---

# {{title_text}}

## Highlights

{{highlights}}
"#;

/// Quoted bullet list. Page headings appear only when more than one page
/// has highlights.
pub fn render_highlights_markdown(highlights: &PageHighlights) -> String {
    if highlights.is_empty() {
        return NO_HIGHLIGHTS_MARKDOWN.to_string();
    }

    let bullets = |passages: &[String]| {
        passages
            .iter()
            .map(|p| format!("- \"{p}\""))
            .collect::<Vec<_>>()
            .join("\n")
    };

    if highlights.highlighted_pages() == 1 {
        return highlights
            .iter()
            .map(|(_, passages)| bullets(passages))
            .collect();
    }

    highlights
        .iter()
        .map(|(page, passages)| format!("### Page {page}\n\n{}", bullets(passages)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// HTML fragment for a remote note body.
pub fn render_highlights_html(highlights: &PageHighlights) -> String {
    let mut parts = Vec::new();
    let single_page = highlights.highlighted_pages() == 1;
    if single_page {
        parts.push("<h2>Highlights</h2>".to_string());
    }
    for (page, passages) in highlights.iter() {
        if !single_page {
            parts.push(format!("<h2>Page {page}</h2>"));
        }
        for passage in passages {
            parts.push(format!("<p>&ldquo;{}&rdquo;</p>", escape_html(passage)));
        }
    }
    parts.join("\n")
}

/// Reading note with YAML frontmatter carrying the highlight stats.
pub fn render_note(
    title: &str,
    highlights: &PageHighlights,
    stats: &HighlightStats,
    date_read: NaiveDate,
) -> String {
    render_note_with_template(DEFAULT_NOTE_TEMPLATE, title, highlights, stats, date_read)
}

pub fn render_note_with_template(
    template: &str,
    title: &str,
    highlights: &PageHighlights,
    stats: &HighlightStats,
    date_read: NaiveDate,
) -> String {
    let non_zero = |n: usize| if n == 0 { String::new() } else { n.to_string() };

    let mut vars = HashMap::new();
    vars.insert("title".to_string(), escape_yaml(title));
    vars.insert("title_text".to_string(), title.to_string());
    vars.insert(
        "date_read".to_string(),
        date_read.format("%Y-%m-%d").to_string(),
    );
    vars.insert(
        "engagement".to_string(),
        non_zero(usize::from(stats.engagement)),
    );
    vars.insert(
        "highlighted_pages".to_string(),
        non_zero(stats.highlighted_pages),
    );
    vars.insert(
        "highlight_word_count".to_string(),
        non_zero(stats.highlight_word_count),
    );
    vars.insert("page_count".to_string(), non_zero(stats.page_count));
    vars.insert(
        "highlights".to_string(),
        render_highlights_markdown(highlights),
    );

    TemplateEngine::render(template, &vars)
}

fn escape_yaml(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}
