use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Characters that mark a passage as a complete sentence.
const TERMINAL_PUNCTUATION: [char; 5] = ['.', '!', '?', ':', '"'];

/// Cleaned highlight passages keyed by 1-based page number.
///
/// Pages with no passages are never stored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageHighlights {
    pages: BTreeMap<usize, Vec<String>>,
}

impl PageHighlights {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store passages for a page. An empty list removes the page.
    pub fn insert(&mut self, page: usize, passages: Vec<String>) {
        if passages.is_empty() {
            self.pages.remove(&page);
        } else {
            self.pages.insert(page, passages);
        }
    }

    pub fn get(&self, page: usize) -> Option<&[String]> {
        self.pages.get(&page).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Pages in ascending order with their passages.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[String])> {
        self.pages
            .iter()
            .map(|(page, passages)| (*page, passages.as_slice()))
    }

    pub fn page_numbers(&self) -> Vec<usize> {
        self.pages.keys().copied().collect()
    }

    pub fn total_count(&self) -> usize {
        self.pages.values().map(Vec::len).sum()
    }

    pub fn highlighted_pages(&self) -> usize {
        self.pages.len()
    }

    pub fn word_count(&self) -> usize {
        self.pages
            .values()
            .flatten()
            .map(|passage| passage.split_whitespace().count())
            .sum()
    }

    /// All passages in page order.
    pub fn flatten(&self) -> Vec<&str> {
        self.pages.values().flatten().map(String::as_str).collect()
    }

    /// Stitch sentences that continue across a page break.
    ///
    /// For each pair of consecutive page numbers, when the last passage of
    /// page N is unterminated and the first passage of page N+1 starts in
    /// lowercase, the latter is appended to the former. A page emptied this
    /// way is removed and cannot itself act as a merge source.
    pub fn merge_across_pages(&mut self) {
        if self.pages.len() < 2 {
            return;
        }

        let page_numbers = self.page_numbers();
        for pair in page_numbers.windows(2) {
            let (page, next_page) = (pair[0], pair[1]);
            if next_page != page + 1 {
                continue;
            }
            // an earlier merge may have consumed either page
            if !self.pages.contains_key(&page) || !self.pages.contains_key(&next_page) {
                continue;
            }

            let continues = match (
                self.pages.get(&page).and_then(|p| p.last()),
                self.pages.get(&next_page).and_then(|p| p.first()),
            ) {
                (Some(last), Some(first)) => is_continuation(last, first),
                _ => false,
            };
            if !continues {
                continue;
            }

            let Some(next_passages) = self.pages.get_mut(&next_page) else {
                continue;
            };
            let first = next_passages.remove(0);
            if next_passages.is_empty() {
                self.pages.remove(&next_page);
            }

            if let Some(last) = self.pages.get_mut(&page).and_then(|p| p.last_mut()) {
                let joined = format!("{} {}", last.trim_end(), first.trim_start());
                *last = joined;
            }
        }
    }
}

fn is_continuation(last: &str, first: &str) -> bool {
    let ends_mid_sentence = !last.trim_end().ends_with(TERMINAL_PUNCTUATION);
    let starts_lower = first.chars().next().is_some_and(char::is_lowercase);
    ends_mid_sentence && starts_lower
}

impl FromIterator<(usize, Vec<String>)> for PageHighlights {
    fn from_iter<I: IntoIterator<Item = (usize, Vec<String>)>>(iter: I) -> Self {
        let mut highlights = Self::new();
        for (page, passages) in iter {
            highlights.insert(page, passages);
        }
        highlights
    }
}
