//! Markdown parsing and text extraction

use super::{normalize_whitespace, ContentType, ParsedDocument};
use crate::error::Result;
use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};

/// Parse Markdown content into plain text
pub fn parse_markdown(content: &str) -> Result<ParsedDocument> {
    let parser = Parser::new(content);
    let mut doc = ParsedDocument::new(String::new(), ContentType::Markdown);

    let mut text = String::new();
    let mut heading: Option<(HeadingLevel, String)> = None;

    for event in parser {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                heading = Some((level, String::new()));
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, heading_text)) = heading.take() {
                    let heading_text = heading_text.trim().to_string();
                    if heading_text.is_empty() {
                        continue;
                    }
                    if doc.title.is_none() && level == HeadingLevel::H1 {
                        doc.title = Some(heading_text.clone());
                    }
                    text.push_str(&heading_text);
                    text.push_str("\n\n");
                }
            }
            Event::Text(t) | Event::Code(t) => match heading {
                Some((_, ref mut heading_text)) => heading_text.push_str(&t),
                None => text.push_str(&t),
            },
            Event::SoftBreak | Event::HardBreak => text.push('\n'),
            Event::End(TagEnd::Paragraph) | Event::End(TagEnd::CodeBlock) => {
                text.push_str("\n\n");
            }
            Event::End(TagEnd::Item) => text.push('\n'),
            _ => {}
        }
    }

    doc.text = normalize_whitespace(&text);
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_markdown_basic() {
        let markdown = r#"
# Main Title

This is a paragraph with **some** text.

## Section One

- Item 1
- Item 2

[Link text](https://example.com)
"#;

        let doc = parse_markdown(markdown).unwrap();

        assert_eq!(doc.title, Some("Main Title".to_string()));
        assert!(doc.text.starts_with("Main Title\n\nThis is a paragraph with some text."));
        assert!(doc.text.contains("Item 1\nItem 2"));
        assert!(doc.text.contains("Link text"));
        assert!(!doc.text.contains("**"));
    }

    #[test]
    fn test_title_only_from_h1() {
        let doc = parse_markdown("## Not a title\n\nbody").unwrap();
        assert_eq!(doc.title, None);
    }
}
