//! The preprocess module cleans scraped script HTML before it is handed to the
//! external e-book converter.
//!
//! The steps are heuristics tuned for plain-text screenplays wrapped in `<pre>`:
//! 1. [`strip_scripts`] drops carriage returns and `<script>` blocks.
//! 2. [`sanitize_html`] reparses the document, turns empty elements into `<br>`
//!    and re-serializes it one tag per line, keeping `<pre>` content verbatim.
//! 3. [`paragraphize`] wraps blank-line separated chunks in `<p>`.
//! 4. An optional Markdown round trip flattens whatever markup is left.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector as ScraperSelector};

use crate::constants::{PARAGRAPH_SPLITTER, SCRIPT_STRIPPER};
use crate::convert::Converter;
use crate::error::ConversionError;

static SCRIPT_STRIPPER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(SCRIPT_STRIPPER).expect("Failed to compile SCRIPT_STRIPPER regex"));

static PARAGRAPH_SPLITTER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(PARAGRAPH_SPLITTER).expect("Failed to compile PARAGRAPH_SPLITTER regex")
});

static BODY_SELECTOR: Lazy<ScraperSelector> =
    Lazy::new(|| ScraperSelector::parse("body").expect("Failed to parse body selector"));

const INDENT: &str = " ";

/// Runs the whole cleanup chain on a raw script.
///
/// With `markdown_pass` set, the cleaned HTML is converted to Markdown and back
/// to HTML through `converter`.
///
/// # Errors
///
/// Returns an error only when the Markdown pass is enabled and the external
/// Markdown converter fails.
pub async fn preprocess_html(
    html: &str,
    converter: &Converter,
    markdown_pass: bool,
) -> Result<String, ConversionError> {
    let html = clean_html(html);
    if !markdown_pass {
        return Ok(html);
    }

    let markdown = html_to_markdown(&html);
    debug!("Markdown pass: {} bytes of markdown", markdown.len());
    converter.markdown_to_html(&markdown).await
}

/// Applies the in-process cleanup steps, without the Markdown pass.
pub fn clean_html(html: &str) -> String {
    paragraphize(&sanitize_html(&strip_scripts(html)))
}

/// Trims the input, removes `\r` and every `<script>` element.
pub fn strip_scripts(html: &str) -> String {
    let html = html.trim().replace('\r', "");
    SCRIPT_STRIPPER_REGEX.replace_all(&html, "").into_owned()
}

/// Reparses `html` and serializes it back with empty elements replaced by `<br>`.
///
/// Only the content of `<body>` is written, records being fragments.
/// Outside `<pre>` every tag and text run is written on its own indented line
/// and text is trimmed. Inside `<pre>` whitespace is kept as is. The `<pre>`
/// tags themselves are surrounded by blank lines. Comments and doctypes are
/// dropped.
pub fn sanitize_html(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = document
        .select(&BODY_SELECTOR)
        .next()
        .unwrap_or_else(|| document.root_element());

    let mut out = String::with_capacity(html.len());
    write_children(root, 0, &mut out);
    out.trim().to_string()
}

/// Splits on blank lines and wraps each non-empty chunk in `<p>`.
///
/// Chunks that are a bare `<pre>` or `</pre>` tag are kept unwrapped.
pub fn paragraphize(html: &str) -> String {
    PARAGRAPH_SPLITTER_REGEX
        .split(html.trim())
        .filter(|chunk| !chunk.trim().is_empty())
        .map(|chunk| {
            if is_bare_pre_tag(chunk.trim()) {
                chunk.to_string()
            } else {
                format!("<p>{chunk}</p>")
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Converts HTML to Markdown in-process.
pub fn html_to_markdown(html: &str) -> String {
    html2md::parse_html(html, false)
}

fn is_bare_pre_tag(chunk: &str) -> bool {
    if chunk == "</pre>" {
        return true;
    }
    chunk
        .strip_prefix("<pre")
        .and_then(|rest| rest.strip_suffix('>'))
        .is_some_and(|attrs| {
            (attrs.is_empty() || attrs.starts_with(char::is_whitespace))
                && !attrs.contains(['<', '>'])
        })
}

fn is_blank(element: ElementRef<'_>) -> bool {
    element.text().all(|text| text.trim().is_empty())
}

fn write_element(element: ElementRef<'_>, depth: usize, out: &mut String) {
    let indent = INDENT.repeat(depth);

    if is_blank(element) {
        out.push_str(&indent);
        out.push_str("<br>\n");
        return;
    }

    let name = element.value().name();
    if name == "pre" {
        out.push('\n');
        out.push_str(&indent);
        write_open_tag(element, out);
        out.push_str("\n\n");
        for child in element.children() {
            match child.value() {
                Node::Text(text) => out.push_str(&escape_text(text)),
                Node::Element(_) => {
                    if let Some(child) = ElementRef::wrap(child) {
                        write_inline(child, out);
                    }
                }
                _ => {}
            }
        }
        out.push_str("\n\n");
        out.push_str(&indent);
        out.push_str("</pre>\n\n");
        return;
    }

    out.push_str(&indent);
    write_open_tag(element, out);
    out.push('\n');

    write_children(element, depth + 1, out);

    out.push_str(&indent);
    out.push_str("</");
    out.push_str(name);
    out.push_str(">\n");
}

fn write_children(element: ElementRef<'_>, depth: usize, out: &mut String) {
    let indent = INDENT.repeat(depth);
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    out.push_str(&indent);
                    out.push_str(&escape_text(text));
                    out.push('\n');
                }
            }
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    write_element(child, depth, out);
                }
            }
            _ => {}
        }
    }
}

fn write_inline(element: ElementRef<'_>, out: &mut String) {
    if is_blank(element) {
        out.push_str("<br>");
        return;
    }

    write_open_tag(element, out);
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&escape_text(text)),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    write_inline(child, out);
                }
            }
            _ => {}
        }
    }
    out.push_str("</");
    out.push_str(element.value().name());
    out.push('>');
}

fn write_open_tag(element: ElementRef<'_>, out: &mut String) {
    out.push('<');
    out.push_str(element.value().name());
    for (name, value) in element.value().attrs() {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_attr(value));
        out.push('"');
    }
    out.push('>');
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
