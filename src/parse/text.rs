//! Plain text parsing

use super::{ContentType, ParsedDocument};

/// Parse plain text content
pub fn parse_plain_text(content: &str) -> ParsedDocument {
    let text = normalize_whitespace(content);

    // Try to extract a title from the first line
    let title = text.lines().next().and_then(|line| {
        let trimmed = line.trim();
        if trimmed.chars().count() < 100 && !trimmed.is_empty() {
            Some(trimmed.to_string())
        } else {
            None
        }
    });

    ParsedDocument {
        title,
        text,
        content_type: ContentType::PlainText,
        links: Vec::new(),
    }
}

/// Normalize whitespace, keeping single line breaks and paragraph breaks
pub fn normalize_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut last_was_whitespace = true;
    let mut newline_count = 0;

    for c in text.chars() {
        if c.is_whitespace() {
            if c == '\n' {
                newline_count += 1;
            }
            last_was_whitespace = true;
        } else {
            if last_was_whitespace && !result.is_empty() {
                if newline_count >= 2 {
                    result.push_str("\n\n");
                } else if newline_count == 1 {
                    result.push('\n');
                } else {
                    result.push(' ');
                }
            }
            newline_count = 0;
            result.push(c);
            last_was_whitespace = false;
        }
    }

    result
}
