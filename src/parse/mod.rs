//! Page parsing and text extraction
//!
//! This module handles:
//! - HTML text and link extraction
//! - Markdown processing
//! - Plain text normalization
//! - Content type detection

mod html;
mod markdown;
mod text;

pub use html::*;
pub use markdown::*;
pub use text::*;

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Content types we can parse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Html,
    Markdown,
    PlainText,
    Unknown,
}

impl ContentType {
    /// Detect content type from a URL path or file name extension
    pub fn from_path(path: &str) -> Self {
        let guess = mime_guess::from_path(path);
        match guess.first() {
            Some(mime) => Self::from_mime(mime.essence_str()),
            None => ContentType::Unknown,
        }
    }

    /// Detect content type from MIME type
    pub fn from_mime(mime: &str) -> Self {
        let mime_lower = mime.to_lowercase();
        if mime_lower.contains("text/html") || mime_lower.contains("application/xhtml") {
            ContentType::Html
        } else if mime_lower.contains("text/markdown") || mime_lower.contains("text/x-markdown") {
            ContentType::Markdown
        } else if mime_lower.contains("text/plain") {
            ContentType::PlainText
        } else {
            ContentType::Unknown
        }
    }

    /// Detect from both the MIME header and the URL path
    pub fn detect(path: Option<&str>, mime: Option<&str>) -> Self {
        // MIME takes precedence for web content
        if let Some(m) = mime {
            let detected = Self::from_mime(m);
            if detected != ContentType::Unknown {
                return detected;
            }
        }

        if let Some(p) = path {
            let detected = Self::from_path(p);
            if detected != ContentType::Unknown {
                return detected;
            }
        }

        ContentType::Unknown
    }
}

/// Parsed page with extracted content
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// Extracted title (if found)
    pub title: Option<String>,

    /// Main text content
    pub text: String,

    /// Detected content type
    pub content_type: ContentType,

    /// Links found in the page
    pub links: Vec<ExtractedLink>,
}

/// An extracted link
#[derive(Debug, Clone)]
pub struct ExtractedLink {
    /// Absolute link URL (relative links are resolved against the page)
    pub url: String,

    /// Link text
    pub text: Option<String>,

    /// Whether the link stays on the page's host
    pub is_internal: bool,
}

impl ParsedDocument {
    pub fn new(text: String, content_type: ContentType) -> Self {
        Self {
            title: None,
            text,
            content_type,
            links: Vec::new(),
        }
    }
}

/// Parse content based on detected type
pub fn parse_content(
    content: &str,
    content_type: ContentType,
    base_url: Option<&str>,
) -> Result<ParsedDocument> {
    match content_type {
        ContentType::Html => parse_html(content, base_url),
        ContentType::Markdown => parse_markdown(content),
        ContentType::PlainText | ContentType::Unknown => Ok(parse_plain_text(content)),
    }
}
