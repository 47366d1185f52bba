//! Transcript text utilities shared by the field matchers.

use std::sync::LazyLock;

use regex::Regex;

/// Clause separators inside a captured list segment ("a, b and c").
static CLAUSE_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*(?:and\s+)?|\s+and\s+|\s+as\s+well\s+as\s+").unwrap());

/// Collapse all runs of whitespace to single spaces and trim.
///
/// Matching runs on the cleaned text; original casing is preserved so
/// extracted spans read exactly as dictated.
pub fn clean(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split a captured segment into clause items, dropping empties.
pub(crate) fn split_clauses(segment: &str) -> Vec<String> {
    CLAUSE_SPLIT
        .split(segment)
        .map(|part| part.trim().trim_matches(',').trim())
        .filter(|part| !part.is_empty())
        .map(|part| part.to_string())
        .collect()
}

/// Split text into sentences, yielding each sentence with its byte offset
/// in the input. Terminators themselves are dropped.
pub(crate) fn sentences(text: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut start = 0;
    for (idx, ch) in text.char_indices() {
        if matches!(ch, '.' | '!' | '?' | ';') {
            push_sentence(&mut out, text, start, idx);
            start = idx + ch.len_utf8();
        }
    }
    push_sentence(&mut out, text, start, text.len());
    out
}

fn push_sentence<'a>(out: &mut Vec<(usize, &'a str)>, text: &'a str, start: usize, end: usize) {
    let raw = &text[start..end];
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        let offset = start + (raw.len() - raw.trim_start().len());
        out.push((offset, trimmed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_collapses_whitespace() {
        assert_eq!(clean("  Patient\tis \n John   Doe "), "Patient is John Doe");
        assert_eq!(clean(""), "");
        assert_eq!(clean("   \n\t "), "");
    }

    #[test]
    fn test_split_clauses() {
        assert_eq!(
            split_clauses("headache, nausea and fatigue"),
            vec!["headache", "nausea", "fatigue"]
        );
        assert_eq!(
            split_clauses("twice daily with food, and continue for 10 days"),
            vec!["twice daily with food", "continue for 10 days"]
        );
        assert_eq!(split_clauses("once daily"), vec!["once daily"]);
        assert!(split_clauses("  ").is_empty());
    }

    #[test]
    fn test_sentences_with_offsets() {
        let text = "First one. Second one! Third";
        let got = sentences(text);
        assert_eq!(got.len(), 3);
        assert_eq!(got[0], (0, "First one"));
        assert_eq!(got[1], (11, "Second one"));
        assert_eq!(got[2], (23, "Third"));
        // offsets point at the sentence text itself
        assert_eq!(&text[got[1].0..got[1].0 + 6], "Second");
    }

    #[test]
    fn test_sentences_empty_input() {
        assert!(sentences("").is_empty());
        assert!(sentences(" . . ").is_empty());
    }
}
