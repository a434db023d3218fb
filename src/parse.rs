//! Pure HTML extraction helpers used while scraping.

use regex::Regex;
use scraper::{Html, Selector as ScraperSelector};
use std::collections::HashSet;
use url::Url;

use crate::record::normalize_title;

/// An anchor found on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Absolute target of the anchor.
    pub url: Url,
    /// Anchor text with whitespace collapsed.
    pub text: String,
}

/// Parses the title from HTML content
///
/// Falls back to the first `h1`, then `h2`, when `<title>` is missing or empty.
pub fn parse_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    for tag in ["title", "h1", "h2"] {
        if let Ok(tag_selector) = ScraperSelector::parse(tag)
            && let Some(tag_element) = document.select(&tag_selector).next()
        {
            let tag_text = normalize_title(&tag_element.text().collect::<Vec<_>>().join(" "));
            if !tag_text.is_empty() {
                return Some(tag_text);
            }
        }
    }

    None
}

/// Collects the anchors matching `selector`, resolved against `base_url`.
///
/// Anchors without a usable `href` are skipped and duplicate targets are
/// dropped, keeping the first occurrence.
pub fn extract_links(html: &str, base_url: &Url, selector: &ScraperSelector) -> Vec<Link> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();

    document
        .select(selector)
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?;
            let url = base_url.join(href.trim()).ok()?;
            let text = normalize_title(&anchor.text().collect::<String>());
            Some(Link { url, text })
        })
        .filter(|link| seen.insert(link.url.clone()))
        .collect()
}

/// Returns the outer HTML of every element matching `selector`, joined by newlines.
pub fn extract_fragment(html: &str, selector: &ScraperSelector) -> Option<String> {
    let document = Html::parse_document(html);
    let selected: Vec<String> = document.select(selector).map(|el| el.html()).collect();

    if selected.is_empty() {
        None
    } else {
        Some(selected.join("\n"))
    }
}

/// Returns the `src` of the first element matching `selector`, resolved against `base_url`.
pub fn extract_image_url(html: &str, base_url: &Url, selector: &ScraperSelector) -> Option<Url> {
    let document = Html::parse_document(html);

    document
        .select(selector)
        .filter_map(|el| el.value().attr("src"))
        .find_map(|src| base_url.join(src.trim()).ok())
}

/// Removes site boilerplate, such as " Script at IMSDb.", from a page title.
pub fn strip_title_suffix(title: &str, suffix: &Regex) -> String {
    normalize_title(&suffix.replace(title, ""))
}
