//! The scrape module fetches movie scripts from a website and appends them to
//! the JSON-lines record file.

use anyhow::{Context, Result};
use log::{error, info, warn};
use regex::Regex;
use scraper::Selector as ScraperSelector;
use std::collections::HashSet;
use std::path::PathBuf;
use url::Url;

use crate::fetch::Fetcher;
use crate::parse::{
    Link, extract_fragment, extract_image_url, extract_links, parse_title, strip_title_suffix,
};
use crate::record::{Record, RecordStore, normalize_title};
use crate::sitemap::extract_sitemap_urls;

/// Where the detail pages of the movies come from.
#[derive(Debug, Clone)]
pub enum Source {
    /// A listing page whose anchors lead to the detail pages.
    Index(Url),
    /// A sitemap, optionally narrowed down by a URL pattern.
    Sitemap { url: Url, filter: Option<Regex> },
}

/// CSS selectors describing the layout of the scraped site.
#[derive(Debug, Clone)]
pub struct Selectors {
    /// Anchors on the index page pointing to detail pages.
    pub index_link: ScraperSelector,
    /// Anchor on a detail page pointing to the full script. When missing or
    /// unmatched the detail page is treated as the script page.
    pub script_link: Option<ScraperSelector>,
    /// Element(s) holding the script text.
    pub script: ScraperSelector,
    /// Poster image on the detail page.
    pub poster: Option<ScraperSelector>,
}

/// Settings of a `scrape` run.
#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    pub source: Source,
    pub records_path: PathBuf,
    pub selectors: Selectors,
    /// Boilerplate removed from page titles when no anchor text is available.
    pub title_suffix: Option<Regex>,
    pub rpm: Option<u32>,
    /// Maximum number of new records to write.
    pub limit: Option<usize>,
    /// Skip titles already present in the record file.
    pub resume: bool,
}

/// Outcome of a `scrape` run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeReport {
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Pages fetched for a single movie.
#[derive(Debug, Clone)]
pub struct ScriptPages {
    /// The detail page link as discovered on the index or sitemap.
    pub link: Link,
    pub poster_url: Option<Url>,
    pub script_url: Url,
    pub script_html: String,
}

/// Scrapes every discovered script page and appends one record per script.
///
/// Pages are fetched sequentially. A page that cannot be fetched or holds no
/// script is logged and skipped. Titles written earlier in the same run are
/// skipped too, so duplicate index anchors yield a single record.
///
/// With `resume`, a link is skipped before any fetch when its anchor text (or,
/// lacking one, the title derived from its URL) is already stored, or when its
/// URL is the page URL of a stored record. Links that pass this check are
/// compared again against the title of the assembled record.
///
/// # Errors
///
/// Returns an error if:
/// * The index page or sitemap cannot be fetched
/// * The record file cannot be read (with `resume`) or written
pub async fn scrape(options: &ScrapeOptions) -> Result<ScrapeReport> {
    let fetcher = Fetcher::new(options.rpm)?;
    let store = RecordStore::new(&options.records_path);
    let (mut known_titles, known_urls) = if options.resume {
        (store.titles()?, store.urls()?)
    } else {
        (HashSet::new(), HashSet::new())
    };

    let links = discover_links(&fetcher, options).await?;
    info!("Discovered {} script pages", links.len());

    let mut report = ScrapeReport::default();
    for link in links {
        if options.limit.is_some_and(|limit| report.written >= limit) {
            info!("Reached limit of {} records", report.written);
            break;
        }

        if known_urls.contains(link.url.as_str())
            || known_titles.contains(&prefetch_title(&link))
        {
            info!("Skipping {} as already stored", link.url);
            report.skipped += 1;
            continue;
        }

        let pages = match fetch_script_pages(&fetcher, link, &options.selectors).await {
            Ok(pages) => pages,
            Err(err) => {
                error!("{err:#}");
                report.failed += 1;
                continue;
            }
        };

        let Some(record) = assemble_record(&pages, options) else {
            warn!("No script found on {}", pages.script_url);
            report.failed += 1;
            continue;
        };

        let title = record.display_title();
        if known_titles.contains(&title) {
            info!("Skipping {title} as already stored");
            report.skipped += 1;
            continue;
        }

        store
            .append(&record)
            .with_context(|| format!("Failed to store {title}"))?;
        info!("Scraped {title} from {}", pages.script_url);
        known_titles.insert(title);
        report.written += 1;
    }

    info!(
        "Scrape finished: {} written, {} skipped, {} failed",
        report.written, report.skipped, report.failed
    );
    Ok(report)
}

/// Title a link is expected to produce, known before fetching it.
fn prefetch_title(link: &Link) -> String {
    if link.text.is_empty() {
        title_from_url(&link.url)
    } else {
        link.text.clone()
    }
}

async fn discover_links(fetcher: &Fetcher, options: &ScrapeOptions) -> Result<Vec<Link>> {
    match &options.source {
        Source::Index(index_url) => {
            info!("Reading index {index_url}");
            let html = fetcher.fetch_text(index_url.as_str()).await?;
            Ok(extract_links(
                &html,
                index_url,
                &options.selectors.index_link,
            ))
        }
        Source::Sitemap { url, filter } => {
            info!("Reading sitemap {url}");
            let urls = extract_sitemap_urls(fetcher, url.as_str(), filter.as_ref()).await?;
            Ok(urls
                .iter()
                .filter_map(|url| Url::parse(url).ok())
                .map(|url| Link {
                    url,
                    text: String::new(),
                })
                .collect())
        }
    }
}

async fn fetch_script_pages(
    fetcher: &Fetcher,
    link: Link,
    selectors: &Selectors,
) -> Result<ScriptPages> {
    let detail_html = fetcher.fetch_text(link.url.as_str()).await?;

    let poster_url = selectors
        .poster
        .as_ref()
        .and_then(|selector| extract_image_url(&detail_html, &link.url, selector));

    let script_link = selectors
        .script_link
        .as_ref()
        .and_then(|selector| {
            extract_links(&detail_html, &link.url, selector)
                .into_iter()
                .next()
        });

    let (script_url, script_html) = match script_link {
        Some(script_link) => {
            let html = fetcher.fetch_text(script_link.url.as_str()).await?;
            (script_link.url, html)
        }
        None => (link.url.clone(), detail_html),
    };

    Ok(ScriptPages {
        link,
        poster_url,
        script_url,
        script_html,
    })
}

/// Builds a record from fetched pages, or `None` when the script page holds no script.
///
/// The title comes from the anchor text, else from the script page title with
/// `title_suffix` removed, else from the script URL.
pub fn assemble_record(pages: &ScriptPages, options: &ScrapeOptions) -> Option<Record> {
    let script = extract_fragment(&pages.script_html, &options.selectors.script)?;

    let title = Some(pages.link.text.clone())
        .filter(|text| !text.is_empty())
        .or_else(|| {
            parse_title(&pages.script_html).map(|title| match &options.title_suffix {
                Some(suffix) => strip_title_suffix(&title, suffix),
                None => title,
            })
        })
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| title_from_url(&pages.script_url));

    Some(Record {
        title: normalize_title(&title),
        script,
        url: Some(pages.script_url.to_string()),
        poster_url: pages.poster_url.as_ref().map(Url::to_string),
        scraped_at: Some(chrono::Utc::now()),
    })
}

fn title_from_url(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.rfind(|segment| !segment.is_empty()))
        .unwrap_or_default();
    let segment = segment
        .rsplit_once('.')
        .map_or(segment, |(stem, _)| stem);

    let escaped = segment.replace('&', "%26").replace('=', "%3D");
    let decoded = url::form_urlencoded::parse(escaped.as_bytes())
        .map(|(key, _)| key.into_owned())
        .next()
        .unwrap_or_default();

    normalize_title(&decoded.replace(['-', '_'], " "))
}
