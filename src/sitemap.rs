use std::collections::BTreeSet;

use anyhow::Result;
use log::{debug, warn};
use regex::Regex;
use sitemap::{
    reader::{SiteMapEntity, SiteMapReader},
    structs::Location,
};

use crate::fetch::Fetcher;

/// Extracts page URLs from a sitemap.
///
/// Nested sitemaps are followed. Only URLs matching `filter` are kept when a
/// filter is given. The result is sorted and free of duplicates.
///
/// # Errors
///
/// This function will return an error if there is a problem fetching any of the sitemaps.
pub async fn extract_sitemap_urls(
    fetcher: &Fetcher,
    sitemap_url: &str,
    filter: Option<&Regex>,
) -> Result<Vec<String>> {
    let mut urls = BTreeSet::new();
    let mut sitemaps_to_process = vec![sitemap_url.to_string()];
    let mut seen_sitemaps = BTreeSet::new();

    while let Some(current_sitemap) = sitemaps_to_process.pop() {
        if !seen_sitemaps.insert(current_sitemap.clone()) {
            continue;
        }

        debug!("Reading sitemap {current_sitemap}");
        let (content, _) = fetcher.fetch_bytes(&current_sitemap).await?;
        collect_entries(&content, filter, &mut urls, &mut sitemaps_to_process);
    }

    Ok(urls.into_iter().collect())
}

/// Parses one sitemap document, sorting page URLs and nested sitemaps apart.
pub fn collect_entries(
    content: &[u8],
    filter: Option<&Regex>,
    urls: &mut BTreeSet<String>,
    nested: &mut Vec<String>,
) {
    for entity in SiteMapReader::new(content) {
        match entity {
            SiteMapEntity::Url(url_entry) => {
                if let Location::Url(ref url) = url_entry.loc
                    && filter.is_none_or(|filter| filter.is_match(url.as_str()))
                {
                    urls.insert(url.to_string());
                }
            }
            SiteMapEntity::SiteMap(sitemap_entry) => {
                if let Location::Url(ref url) = sitemap_entry.loc {
                    nested.push(url.to_string());
                }
            }
            SiteMapEntity::Err(err) => warn!("Skipping sitemap entry: {err:?}"),
        }
    }
}
