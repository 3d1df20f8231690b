//! HTML parsing and text extraction

use super::{normalize_whitespace, ContentType, ExtractedLink, ParsedDocument};
use crate::error::{Error, Result};
use html2text::render::TrivialDecorator;
use scraper::{Html, Selector};
use url::Url;

/// Elements whose text never reaches the index
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg"];

/// Wide enough that html2text never re-wraps a paragraph
const RENDER_WIDTH: usize = 1_000;

/// Parse HTML content and extract text, title and links
pub fn parse_html(content: &str, base_url: Option<&str>) -> Result<ParsedDocument> {
    let mut document = Html::parse_document(content);
    let mut doc = ParsedDocument::new(String::new(), ContentType::Html);

    // Extract title
    if let Ok(selector) = Selector::parse("title") {
        if let Some(title_elem) = document.select(&selector).next() {
            let title = collapse_spaces(&title_elem.text().collect::<String>());
            if !title.is_empty() {
                doc.title = Some(title);
            }
        }
    }

    // Extract links before hidden subtrees are dropped
    if let Ok(selector) = Selector::parse("a[href]") {
        let base = base_url.and_then(|u| Url::parse(u).ok());

        for elem in document.select(&selector) {
            if let Some(href) = elem.value().attr("href") {
                let link_text = collapse_spaces(&elem.text().collect::<String>());
                let link_text = if link_text.is_empty() { None } else { Some(link_text) };

                // Resolve relative URLs
                let url = if let Some(ref base) = base {
                    base.join(href).map(|u| u.to_string()).unwrap_or_else(|_| href.to_string())
                } else {
                    href.to_string()
                };

                let is_internal = if let Some(ref base) = base {
                    match Url::parse(&url) {
                        Ok(link_url) => link_url.host() == base.host(),
                        Err(_) => !href.contains("://"),
                    }
                } else {
                    !href.contains("://")
                };

                doc.links.push(ExtractedLink {
                    url,
                    text: link_text,
                    is_internal,
                });
            }
        }
    }

    remove_hidden(&mut document);

    // Text comes from <body>; fall back to the whole tree for fragments
    let body_selector = Selector::parse("body").ok();
    let root = body_selector
        .as_ref()
        .and_then(|s| document.select(s).next())
        .map(|e| e.html())
        .unwrap_or_else(|| document.root_element().html());

    doc.text = render_text(&root)?;
    Ok(doc)
}

/// Render an HTML fragment to plain text: blocks on their own lines,
/// paragraphs separated by one blank line, inline markup dropped
fn render_text(html: &str) -> Result<String> {
    let text = html2text::from_read_with_decorator(
        html.as_bytes(),
        RENDER_WIDTH,
        TrivialDecorator::new(),
    )
    .map_err(|e| Error::Parse(format!("HTML rendering failed: {}", e)))?;
    Ok(normalize_whitespace(&text))
}

/// Detach every script, style and similar subtree from the document
fn remove_hidden(document: &mut Html) {
    let hidden: Vec<_> = document
        .tree
        .nodes()
        .filter(|node| {
            node.value()
                .as_element()
                .is_some_and(|e| SKIPPED_ELEMENTS.contains(&e.name()))
        })
        .map(|node| node.id())
        .collect();

    for id in hidden {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

fn collapse_spaces(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
