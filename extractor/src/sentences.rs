//! Sentence segmentation.
//!
//! Line structure is honored first: a newline ends a sentence only when the
//! accumulated line is short enough to be a heading (≤ 25 visible
//! characters); longer line breaks are soft wraps and merge into the running
//! sentence. Merged lines are then split on sentence-ending punctuation and
//! Korean terminators, and once more on enumeration markers ("1. ", "a. ",
//! "가. "), with the marker stripped from the fragment.

use once_cell::sync::Lazy;
use regex::Regex;

/// A newline after at most this many visible characters is a heading break.
const HEADING_MAX_CHARS: usize = 25;

static LEADING_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-zA-Z가-힣]\.\s*").expect("marker regex"));

/// Split raw text into cleaned sentence fragments.
pub fn split_sentences(text: &str) -> Vec<String> {
    let cleaned = text.trim();
    if cleaned.is_empty() {
        return Vec::new();
    }

    let mut out = Vec::new();
    for line in merge_lines(cleaned) {
        for candidate in split_on_terminators(&line) {
            for fragment in split_on_markers(&candidate) {
                let fragment = LEADING_MARKER.replace(fragment.trim(), "");
                let fragment = fragment.trim();
                if keep_fragment(fragment) {
                    out.push(fragment.to_string());
                }
            }
        }
    }
    out
}

/// Collapse soft line wraps; short lines (headings) stand alone.
fn merge_lines(text: &str) -> Vec<String> {
    let mut merged = Vec::new();
    let mut current = String::new();

    for piece in text.split('\n') {
        current.push_str(piece);
        let stripped = current.trim();
        if stripped.is_empty() {
            current.clear();
            continue;
        }
        if stripped.chars().count() <= HEADING_MAX_CHARS {
            merged.push(stripped.to_string());
            current.clear();
        } else {
            current.push(' ');
        }
    }
    let last = current.trim();
    if !last.is_empty() {
        merged.push(last.to_string());
    }
    merged
}

/// Split after `.` `!` `?` followed by whitespace, and after the Korean
/// declarative/polite endings "다." and "요." regardless of spacing.
fn split_on_terminators(line: &str) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    let mut pieces = Vec::new();
    let mut start = 0;

    for i in 0..chars.len() {
        let ch = chars[i];
        let is_terminator = matches!(ch, '.' | '!' | '?');
        if !is_terminator {
            continue;
        }
        let next_is_space = chars.get(i + 1).map(|c| c.is_whitespace()).unwrap_or(true);
        let korean_ending = ch == '.' && i > 0 && matches!(chars[i - 1], '다' | '요');
        if next_is_space || korean_ending {
            let piece: String = chars[start..=i].iter().collect();
            if !piece.trim().is_empty() {
                pieces.push(piece.trim().to_string());
            }
            start = i + 1;
        }
    }
    if start < chars.len() {
        let piece: String = chars[start..].iter().collect();
        if !piece.trim().is_empty() {
            pieces.push(piece.trim().to_string());
        }
    }
    pieces
}

/// Split before enumeration markers: a single alphanumeric or Hangul
/// character followed by ". " at a word boundary.
fn split_on_markers(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut cut_points = vec![0];

    for i in 0..chars.len() {
        if i == 0 {
            continue;
        }
        let at_boundary = chars[i - 1].is_whitespace();
        let is_marker = at_boundary
            && is_marker_char(chars[i])
            && chars.get(i + 1) == Some(&'.')
            && chars.get(i + 2).map(|c| c.is_whitespace()).unwrap_or(false);
        if is_marker {
            cut_points.push(i);
        }
    }
    cut_points.push(chars.len());

    cut_points
        .windows(2)
        .map(|w| chars[w[0]..w[1]].iter().collect::<String>())
        .filter(|s| !s.trim().is_empty())
        .collect()
}

fn is_marker_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || crate::tokenize::is_hangul(ch)
}

/// Drop fragments of length ≤ 1 or with ≤ 1 real (alphanumeric/Hangul) char.
fn keep_fragment(fragment: &str) -> bool {
    if fragment.chars().count() <= 1 {
        return false;
    }
    let real_chars = fragment
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || crate::tokenize::is_hangul(*c))
        .count();
    real_chars > 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_terminators() {
        let out = split_sentences("Alice is an engineer. Alice works at Acme.");
        assert_eq!(out, vec!["Alice is an engineer.", "Alice works at Acme."]);
    }

    #[test]
    fn short_lines_are_headings() {
        let out = split_sentences("개요\n고려대학교의 교풍은 야성과 정열로 대표되며 이는 오래전부터 이어져온 전통이다.");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], "개요");
    }

    #[test]
    fn long_lines_merge_across_newlines() {
        let text = "This is a single long sentence that was wrapped over\ntwo lines by the editor without ending.";
        let out = split_sentences(text);
        assert_eq!(out.len(), 1);
        assert!(out[0].contains("wrapped over two lines"));
    }

    #[test]
    fn korean_terminator_splits_without_space() {
        let out = split_sentences("교풍은 야성으로 대표된다.협동 정신도 강하다.");
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn enumeration_markers_are_stripped() {
        let out = split_sentences("목록은 다음과 같다. 1. 야성적 정열적 기질 2. 협동적 끈끈한 기질");
        assert!(out.iter().any(|s| s.starts_with("야성적")));
        assert!(out.iter().any(|s| s.starts_with("협동적")));
        assert!(out.iter().all(|s| !s.starts_with("1.")));
    }

    #[test]
    fn junk_fragments_are_dropped() {
        let out = split_sentences("a. !? ***\nReal sentence here.");
        assert_eq!(out, vec!["Real sentence here."]);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("  \n\n  ").is_empty());
    }
}
