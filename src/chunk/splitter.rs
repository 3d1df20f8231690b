//! Recursive character splitting

use unicode_segmentation::UnicodeSegmentation;

/// Separators tried in order, from largest unit to single characters
pub const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

/// Split text into chunks of at most `size` characters, then prefix every
/// chunk after the first with the last `overlap` characters of its
/// predecessor.
pub fn split_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    if size == 0 || text.trim().is_empty() {
        return Vec::new();
    }

    let chunks = split_recursive(text, SEPARATORS, size);
    apply_overlap(chunks, overlap)
}

/// Split without overlap; every piece has at most `size` characters
pub fn split_recursive(text: &str, separators: &[&str], size: usize) -> Vec<String> {
    let (separator, remaining) = pick_separator(text, separators);

    if separator.is_empty() {
        return hard_split(text, size);
    }

    let separator_len = char_len(separator);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for part in text.split(separator) {
        if part.is_empty() {
            continue;
        }

        let part_len = char_len(part);

        if part_len > size {
            push_chunk(&mut chunks, &mut current);
            current_len = 0;
            chunks.extend(split_recursive(part, remaining, size));
            continue;
        }

        let joined_len = if current.is_empty() {
            part_len
        } else {
            current_len + separator_len + part_len
        };

        if joined_len > size {
            push_chunk(&mut chunks, &mut current);
            current.push_str(part);
            current_len = part_len;
        } else {
            if !current.is_empty() {
                current.push_str(separator);
            }
            current.push_str(part);
            current_len = joined_len;
        }
    }

    push_chunk(&mut chunks, &mut current);
    chunks
}

/// Cut text into `size`-character pieces without breaking grapheme clusters.
/// A single cluster longer than `size` becomes its own piece.
fn hard_split(text: &str, size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for grapheme in text.graphemes(true) {
        let grapheme_len = char_len(grapheme);
        if current_len + grapheme_len > size && !current.is_empty() {
            push_chunk(&mut chunks, &mut current);
            current_len = 0;
        }
        current.push_str(grapheme);
        current_len += grapheme_len;
    }

    push_chunk(&mut chunks, &mut current);
    chunks
}

fn pick_separator<'a, 'b>(text: &str, separators: &'b [&'a str]) -> (&'a str, &'b [&'a str]) {
    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() || text.contains(sep) {
            return (sep, &separators[i + 1..]);
        }
    }
    ("", &[])
}

fn push_chunk(chunks: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        chunks.push(std::mem::take(current));
    }
}

fn apply_overlap(chunks: Vec<String>, overlap: usize) -> Vec<String> {
    if overlap == 0 || chunks.len() < 2 {
        return chunks;
    }

    let mut result = Vec::with_capacity(chunks.len());
    result.push(chunks[0].clone());
    for pair in chunks.windows(2) {
        let mut chunk = tail_graphemes(&pair[0], overlap).to_string();
        chunk.push_str(&pair[1]);
        result.push(chunk);
    }
    result
}

/// Longest suffix of at most `n` characters that starts on a grapheme boundary
fn tail_graphemes(text: &str, n: usize) -> &str {
    let mut start = text.len();
    let mut taken = 0usize;
    for (idx, grapheme) in text.grapheme_indices(true).rev() {
        let len = char_len(grapheme);
        if taken + len > n {
            break;
        }
        taken += len;
        start = idx;
    }
    &text[start..]
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert!(split_text("", 500, 100).is_empty());
        assert!(split_text("   \n\n  ", 500, 100).is_empty());
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        assert_eq!(split_text("Hello world.", 500, 100), vec!["Hello world."]);
    }

    #[test]
    fn test_paragraphs_are_packed() {
        let text = "aaaa\n\nbbbb\n\ncccc";
        assert_eq!(split_recursive(text, SEPARATORS, 10), vec!["aaaa\n\nbbbb", "cccc"]);
    }

    #[test]
    fn test_long_paragraph_falls_back_to_smaller_separators() {
        let text = "one two three four five six";
        let chunks = split_recursive(text, SEPARATORS, 10);
        assert_eq!(chunks, vec!["one two", "three four", "five six"]);
    }

    #[test]
    fn test_unbroken_text_terminates() {
        let text = "x".repeat(1234);
        let chunks = split_recursive(&text, SEPARATORS, 500);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chars().count(), 500);
        assert_eq!(chunks[2].chars().count(), 234);
    }

    #[test]
    fn test_chunks_never_exceed_size() {
        let text = "Lorem ipsum dolor sit amet. ".repeat(80) + "\n\n" + &"é".repeat(700);
        for chunk in split_recursive(&text, SEPARATORS, 120) {
            assert!(chunk.chars().count() <= 120, "chunk too long: {}", chunk.len());
        }
    }

    #[test]
    fn test_hard_split_keeps_graphemes() {
        // "e" + combining acute accent is one grapheme of two chars
        let text = "e\u{301}".repeat(5);
        let chunks = split_recursive(&text, &[""], 3);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 3);
            assert!(!chunk.starts_with('\u{301}'));
        }
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_text_is_kept_verbatim() {
        let text = "  indented line\n  second line ";
        assert_eq!(split_text(text, 100, 10), vec![text]);

        let chunks = split_recursive("alpha  \n\n  beta", SEPARATORS, 8);
        assert_eq!(chunks, vec!["alpha  ", "  beta"]);
    }

    #[test]
    fn test_overlap_respects_grapheme_boundaries() {
        // Each "e\u{301}" is one grapheme of two chars; a 3-char tail can only
        // hold one whole cluster
        let tail = tail_graphemes("abe\u{301}e\u{301}", 3);
        assert_eq!(tail, "e\u{301}");

        let flag = "\u{1F1EB}\u{1F1F7}"; // regional indicator pair, one grapheme
        assert_eq!(tail_graphemes(&format!("x{}", flag), 1), "");
        assert_eq!(tail_graphemes(&format!("x{}", flag), 2), flag);

        let chunks = split_text("e\u{301}e\u{301} next", 4, 3);
        assert_eq!(chunks.len(), 2);
        assert!(!chunks[1].starts_with('\u{301}'));
        assert!(chunks[1].ends_with("next"));
    }

    #[test]
    fn test_overlap_prefixes_previous_tail() {
        let text = "aaaa bbbb cccc";
        let chunks = split_text(text, 4, 2);
        assert_eq!(chunks, vec!["aaaa", "aabbbb", "bbcccc"]);
    }
}
