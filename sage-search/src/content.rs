//! HTML content cleaning: strips boilerplate and returns readable text.
//!
//! Parses raw HTML, skips non-content elements (scripts, styles, navigation
//! and other page chrome), picks the main content area and returns clean
//! text bounded to a character budget so downstream summarization cost
//! stays predictable.

use scraper::{ElementRef, Html, Node, Selector};

use crate::error::{Result, SearchError};
use crate::types::PageContent;

/// Default cap on cleaned text, in characters.
pub const DEFAULT_MAX_CHARS: usize = 4_000;

/// Elements whose whole subtree is dropped.
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "noscript", "svg", "iframe", "form",
    "template",
];

/// Elements that start a new line of text.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "main", "li", "ul", "ol", "br", "h1", "h2", "h3", "h4",
    "h5", "h6", "tr", "table", "pre", "blockquote",
];

/// Content roots, most specific first.
const CONTENT_ROOTS: &[&str] = &["article", "main", "[role=\"main\"]", "body"];

/// Clean `html` fetched from `url` into readable text of at most
/// `max_chars` characters.
///
/// Truncation is silent: the only trace of it is the length of
/// [`PageContent::text`].
///
/// # Errors
///
/// Returns [`SearchError::Parse`] if no readable text remains after
/// cleaning.
pub fn clean_html(html: &str, url: &str, max_chars: usize) -> Result<PageContent> {
    let document = Html::parse_document(html);
    let title = extract_title(&document);

    let text = normalise_whitespace(&extract_main_text(&document));
    if text.is_empty() {
        return Err(SearchError::Parse("no extractable content found".into()));
    }

    let text = truncate_chars(&text, max_chars).to_owned();
    let word_count = text.split_whitespace().count();

    Ok(PageContent {
        url: url.to_owned(),
        title,
        text,
        word_count,
    })
}

/// Longest prefix of `text` holding at most `max_chars` characters.
///
/// Never splits a multi-byte character.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

fn extract_title(document: &Html) -> String {
    let Ok(selector) = Selector::parse("title") else {
        return String::new();
    };
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>())
        .unwrap_or_default()
        .trim()
        .to_owned()
}

/// Text of the first content root that has any, with chrome removed.
fn extract_main_text(document: &Html) -> String {
    for root in CONTENT_ROOTS {
        let Ok(selector) = Selector::parse(root) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let mut text = String::new();
            collect_text(element, &mut text);
            if !text.trim().is_empty() {
                return text;
            }
        }
    }
    String::new()
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_TAGS.contains(&name) {
                    continue;
                }
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                let block = BLOCK_TAGS.contains(&name);
                if block {
                    out.push('\n');
                }
                collect_text(child_el, out);
                if block {
                    out.push('\n');
                } else {
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}

/// Collapse runs of whitespace within lines and drop blank lines.
fn normalise_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
