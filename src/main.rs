//! scriptbook is a CLI tool that scrapes movie scripts from a website and
//! converts them into e-books.
//!
//! The tool has three commands:
//! 1. `scrape` - Fetches script pages and appends them to a JSON-lines file
//! 2. `posters` - Downloads a cover image for every stored script
//! 3. `convert` - Cleans the stored HTML and runs an external e-book converter

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Builder;
use log::LevelFilter;
use regex::Regex;
use scraper::Selector as ScraperSelector;
use url::Url;

use scriptbook::{
    ConvertTarget, Converter, EbookFormat,
    constants::{
        DEFAULT_HTML_DIR, DEFAULT_INDEX_LINK_SELECTOR, DEFAULT_INDEX_URL, DEFAULT_OUT_DIR,
        DEFAULT_POSTER_SELECTOR, DEFAULT_POSTERS_DIR, DEFAULT_RECORDS_PATH,
        DEFAULT_SCRIPT_LINK_SELECTOR, DEFAULT_SCRIPT_SELECTOR, DEFAULT_TITLE_SUFFIX,
    },
    convert::{ConvertOptions, convert},
    posters::download_posters,
    scrape::{ScrapeOptions, Selectors, Source, scrape},
};

/// A CLI tool to turn scraped movie scripts into e-books
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// The command to execute (scrape, posters or convert)
    #[command(subcommand)]
    command: Command,

    #[arg(long, short, action = clap::ArgAction::Count, help = "Output v(v...)erbosity: error (0), warn (1), info (2), debug (3), trace (4)", global = true, default_value_t = 2)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape script pages and append them as records to a JSON-lines file
    Scrape {
        /// Index page listing the movies
        #[arg(default_value = DEFAULT_INDEX_URL)]
        url: String,
        /// Path to the JSON-lines file to append records to
        #[arg(long, short = 'o', default_value = DEFAULT_RECORDS_PATH)]
        records: PathBuf,
        /// Treat URL as a sitemap instead of an index page
        #[arg(long)]
        sitemap: bool,
        /// Regex that sitemap URLs must match (sitemap mode only)
        #[arg(long)]
        url_filter: Option<String>,
        /// CSS selector of index anchors leading to detail pages
        #[arg(long, default_value = DEFAULT_INDEX_LINK_SELECTOR)]
        index_link_selector: String,
        /// CSS selector of the detail page anchor leading to the script;
        /// empty to read the script from the detail page
        #[arg(long, default_value = DEFAULT_SCRIPT_LINK_SELECTOR)]
        script_link_selector: String,
        /// CSS selector of the script text
        #[arg(long, short, default_value = DEFAULT_SCRIPT_SELECTOR)]
        selector: String,
        /// CSS selector of the poster image on the detail page; empty to disable
        #[arg(long, default_value = DEFAULT_POSTER_SELECTOR)]
        poster_selector: String,
        /// Regex removed from page titles
        #[arg(long, default_value = DEFAULT_TITLE_SUFFIX)]
        title_suffix: String,
        /// Rate limit: requests per minute (default: no limit)
        #[arg(long, short = 'r')]
        rpm: Option<u32>,
        /// Stop after writing this many records
        #[arg(long, short)]
        limit: Option<usize>,
        /// Skip titles already present in the records file
        #[arg(long)]
        resume: bool,
    },
    /// Download a poster for every record that has a poster URL
    Posters {
        /// Path to the JSON-lines file to read records from
        #[arg(long, short = 'i', default_value = DEFAULT_RECORDS_PATH)]
        records: PathBuf,
        /// Directory to save posters to
        #[arg(long, short = 'd', default_value = DEFAULT_POSTERS_DIR)]
        dir: PathBuf,
        /// Rate limit: requests per minute (default: no limit)
        #[arg(long, short = 'r')]
        rpm: Option<u32>,
        /// Download again even when a poster already exists
        #[arg(long)]
        overwrite: bool,
    },
    /// Convert stored records to e-books with an external converter
    Convert {
        /// Path to the JSON-lines file to read records from
        #[arg(long, short = 'i', default_value = DEFAULT_RECORDS_PATH)]
        records: PathBuf,
        /// Target to convert: "all" (default) or a title
        #[arg(long, short = 't', default_value = "all")]
        target: ConvertTarget,
        /// Output format: "epub" (default), "mobi", "azw3" or "pdf"
        #[arg(long, short, default_value = "epub")]
        format: EbookFormat,
        /// Directory for the raw and cleaned HTML
        #[arg(long, default_value = DEFAULT_HTML_DIR)]
        html_dir: PathBuf,
        /// Directory for the e-books
        #[arg(long, short = 'o', default_value = DEFAULT_OUT_DIR)]
        out_dir: PathBuf,
        /// Directory to look up posters in
        #[arg(long, default_value = DEFAULT_POSTERS_DIR)]
        posters_dir: PathBuf,
        /// Do not attach posters as cover art
        #[arg(long)]
        no_cover: bool,
        /// Skip the Markdown round trip and feed the cleaned HTML directly
        #[arg(long)]
        no_markdown: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    Builder::new()
        .filter_level(match cli.verbose {
            0 => LevelFilter::Error,
            1 => LevelFilter::Warn,
            2 => LevelFilter::Info,
            3 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        })
        .init();

    match cli.command {
        Command::Scrape {
            url,
            records,
            sitemap,
            url_filter,
            index_link_selector,
            script_link_selector,
            selector,
            poster_selector,
            title_suffix,
            rpm,
            limit,
            resume,
        } => {
            let selectors = Selectors {
                index_link: parse_selector(&index_link_selector)?,
                script_link: parse_optional_selector(&script_link_selector)?,
                script: parse_selector(&selector)?,
                poster: parse_optional_selector(&poster_selector)?,
            };
            let options = ScrapeOptions {
                source: parse_source(&url, sitemap, url_filter.as_deref())?,
                records_path: records,
                selectors,
                title_suffix: parse_optional_regex(&title_suffix)?,
                rpm,
                limit,
                resume,
            };
            scrape(&options).await.map(|_| ())
        }
        Command::Posters {
            records,
            dir,
            rpm,
            overwrite,
        } => download_posters(&records, &dir, rpm, overwrite)
            .await
            .map(|_| ()),
        Command::Convert {
            records,
            target,
            format,
            html_dir,
            out_dir,
            posters_dir,
            no_cover,
            no_markdown,
        } => {
            let options = ConvertOptions {
                records_path: records,
                html_dir,
                out_dir,
                posters_dir: (!no_cover).then_some(posters_dir),
                target,
                format,
                markdown_pass: !no_markdown,
                converter: Converter::from_env(),
            };
            convert(&options).await.map(|_| ())
        }
    }
}

fn parse_source(url: &str, sitemap: bool, url_filter: Option<&str>) -> Result<Source> {
    let url = Url::parse(url).map_err(|e| anyhow::anyhow!("Invalid url {url}: {e}"))?;
    if sitemap {
        Ok(Source::Sitemap {
            url,
            filter: url_filter.map(parse_regex).transpose()?,
        })
    } else {
        Ok(Source::Index(url))
    }
}

fn parse_selector(query: &str) -> Result<ScraperSelector> {
    ScraperSelector::parse(query)
        .map_err(|e| anyhow::anyhow!("Invalid CSS selector {query}: {e}"))
}

fn parse_optional_selector(query: &str) -> Result<Option<ScraperSelector>> {
    if query.trim().is_empty() {
        Ok(None)
    } else {
        parse_selector(query).map(Some)
    }
}

fn parse_regex(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| anyhow::anyhow!("Invalid regex {pattern}: {e}"))
}

fn parse_optional_regex(pattern: &str) -> Result<Option<Regex>> {
    if pattern.is_empty() {
        Ok(None)
    } else {
        parse_regex(pattern).map(Some)
    }
}
