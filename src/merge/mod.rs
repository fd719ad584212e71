//! Grouping raw glyph runs into readable highlight passages.

mod cleanup;

pub use cleanup::clean_highlight_text;

use std::cmp::Ordering;

use crate::scene::RawGlyphRun;
use crate::settings::Calibration;

/// Longest word overlap looked for where two runs meet.
const MAX_BOUNDARY_OVERLAP: usize = 3;

/// Merge one page's glyph runs into cleaned passages, top to bottom.
///
/// Runs are ordered by `y` so that multi-column layouts do not interleave.
/// Consecutive runs of the same color whose positions are both known and
/// closer than `calibration.max_line_gap` form a single passage. Passages
/// that clean to nothing are dropped.
pub fn merge_glyphs(runs: &[RawGlyphRun], calibration: &Calibration) -> Vec<String> {
    if runs.is_empty() {
        return Vec::new();
    }

    let mut sorted: Vec<&RawGlyphRun> = runs.iter().collect();
    // stable: runs at the same height keep their arrival order
    sorted.sort_by(|a, b| {
        a.y.unwrap_or(0.0)
            .partial_cmp(&b.y.unwrap_or(0.0))
            .unwrap_or(Ordering::Equal)
    });

    let mut passages = Vec::new();
    let mut current: Vec<&str> = vec![sorted[0].text.as_str()];
    let mut prev = sorted[0];

    for &run in &sorted[1..] {
        let same_passage = run.color == prev.color
            && match (prev.y, run.y) {
                (Some(prev_y), Some(y)) => (y - prev_y).abs() < calibration.max_line_gap,
                _ => false,
            };

        if same_passage {
            current.push(run.text.as_str());
        } else {
            passages.extend(finish_passage(&current));
            current = vec![run.text.as_str()];
        }
        prev = run;
    }
    passages.extend(finish_passage(&current));

    passages
}

fn finish_passage(parts: &[&str]) -> Option<String> {
    let cleaned = clean_highlight_text(&join_dedup(parts));
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Join run texts, dropping words the tablet repeated across the boundary.
///
/// The longest overlap (up to three words) between the tail of what has
/// been joined so far and the head of the next part wins.
pub fn join_dedup(parts: &[&str]) -> String {
    let Some((first, rest)) = parts.split_first() else {
        return String::new();
    };

    let mut result = first.to_string();
    for part in rest {
        let part_words: Vec<&str> = part.split_whitespace().collect();
        let overlap = {
            let result_words: Vec<&str> = result.split_whitespace().collect();
            let max = MAX_BOUNDARY_OVERLAP
                .min(result_words.len())
                .min(part_words.len());
            (1..=max)
                .rev()
                .find(|&n| result_words[result_words.len() - n..] == part_words[..n])
                .unwrap_or(0)
        };

        result.push(' ');
        if overlap > 0 {
            result.push_str(&part_words[overlap..].join(" "));
        } else {
            result.push_str(part);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str, y: Option<f64>, color: u32) -> RawGlyphRun {
        RawGlyphRun::new(text, y, color)
    }

    fn merge(runs: &[RawGlyphRun]) -> Vec<String> {
        merge_glyphs(runs, &Calibration::default())
    }

    #[test]
    fn test_no_runs_no_passages() {
        assert!(merge(&[]).is_empty());
    }

    #[test]
    fn test_single_clean_run_unchanged() {
        let text = "A single highlighted sentence, nothing else.";
        assert_eq!(merge(&[run(text, Some(300.0), 3)]), vec![text]);
    }

    #[test]
    fn test_adjacent_lines_join() {
        let runs = [
            run("first line of the", Some(100.0), 3),
            run("second line", Some(105.0), 3),
        ];
        assert_eq!(merge(&runs), vec!["first line of the second line"]);
    }

    #[test]
    fn test_large_gap_splits() {
        let runs = [
            run("top passage", Some(100.0), 3),
            run("bottom passage", Some(400.0), 3),
        ];
        assert_eq!(merge(&runs), vec!["top passage", "bottom passage"]);
    }

    #[test]
    fn test_gap_threshold_is_exclusive() {
        let runs = [run("a", Some(100.0), 3), run("b", Some(200.0), 3)];
        assert_eq!(merge(&runs).len(), 2);

        let runs = [run("a", Some(100.0), 3), run("b", Some(199.5), 3)];
        assert_eq!(merge(&runs), vec!["a b"]);
    }

    #[test]
    fn test_color_change_splits() {
        let runs = [
            run("yellow words", Some(100.0), 3),
            run("green words", Some(110.0), 4),
        ];
        assert_eq!(merge(&runs), vec!["yellow words", "green words"]);
    }

    #[test]
    fn test_unknown_position_never_joins() {
        let runs = [
            run("positioned", Some(10.0), 3),
            run("floating", None, 3),
        ];
        // absent y sorts as 0, ahead of the positioned run
        assert_eq!(merge(&runs), vec!["floating", "positioned"]);
    }

    #[test]
    fn test_sorted_by_position() {
        let runs = [
            run("lower", Some(900.0), 3),
            run("upper", Some(100.0), 3),
        ];
        assert_eq!(merge(&runs), vec!["upper", "lower"]);
    }

    #[test]
    fn test_custom_gap() {
        let calibration = Calibration {
            max_line_gap: 10.0,
            ..Calibration::default()
        };
        let runs = [run("one", Some(100.0), 3), run("two", Some(120.0), 3)];
        assert_eq!(merge_glyphs(&runs, &calibration).len(), 2);
    }

    #[test]
    fn test_empty_after_cleanup_dropped() {
        let runs = [run("(12)", Some(100.0), 3), run("real text", Some(800.0), 3)];
        assert_eq!(merge(&runs), vec!["real text"]);
    }

    #[test]
    fn test_join_dedup_overlap() {
        assert_eq!(
            join_dedup(&["many different species", "species or genera"]),
            "many different species or genera"
        );
        assert_eq!(
            join_dedup(&["the end of the", "of the line"]),
            "the end of the line"
        );
    }

    #[test]
    fn test_join_dedup_prefers_longest_overlap() {
        assert_eq!(join_dedup(&["a b a b", "a b c"]), "a b a b c");
    }

    #[test]
    fn test_join_dedup_without_overlap() {
        assert_eq!(join_dedup(&["left", "right"]), "left right");
        assert_eq!(join_dedup(&["only"]), "only");
        assert_eq!(join_dedup(&[]), "");
    }
}
