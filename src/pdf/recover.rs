//! Recovering the PDF's own spelling of a passage the tablet re-flowed.
//!
//! Tablet text drops the spaces and hyphens that the PDF keeps at line
//! breaks (`proofs,standard` for `proofs,\nstandard`, `mathematics` for
//! `math-\nematics`). Both sides are compared with whitespace and hyphens
//! removed, and the matching span of the page text is handed back in a form
//! the exact search accepts.

const SOFT_HYPHEN: char = '\u{ad}';

fn is_ignored(ch: char) -> bool {
    ch.is_whitespace() || ch == '-' || ch == SOFT_HYPHEN
}

/// Find `search` in `page_text` ignoring whitespace, hyphens and case.
///
/// Returns the matching slice of `page_text` with line-wrap hyphens removed
/// and remaining newlines turned into spaces, or `None` when there is no
/// match or nothing is left of `search` after normalization.
pub fn recover_pdf_text(page_text: &str, search: &str) -> Option<String> {
    let needle: Vec<char> = search
        .chars()
        .filter(|&c| !is_ignored(c))
        .flat_map(char::to_lowercase)
        .collect();
    if needle.is_empty() {
        return None;
    }

    // normalized char -> byte span of the source char it came from
    let mut haystack = Vec::with_capacity(page_text.len());
    let mut spans = Vec::with_capacity(page_text.len());
    for (start, ch) in page_text.char_indices() {
        if is_ignored(ch) {
            continue;
        }
        let end = start + ch.len_utf8();
        for lower in ch.to_lowercase() {
            haystack.push(lower);
            spans.push((start, end));
        }
    }

    let pos = haystack
        .windows(needle.len())
        .position(|window| window == needle.as_slice())?;
    let start = spans[pos].0;
    let end = spans[pos + needle.len() - 1].1;

    let raw = &page_text[start..end];
    Some(
        raw.replace("-\n", "")
            .replace(&format!("{SOFT_HYPHEN}\n"), "")
            .replace('\n', " "),
    )
}
