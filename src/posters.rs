//! The posters module downloads cover images for stored records and locates
//! them again at conversion time.

use anyhow::{Context, Result};
use log::{error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

use crate::constants::POSTER_EXTENSIONS;
use crate::fetch::Fetcher;
use crate::record::RecordStore;

/// Outcome of a `posters` run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PosterReport {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Returns the first existing poster for `stem` in `posters_dir`.
pub fn find_poster(posters_dir: &Path, stem: &str) -> Option<PathBuf> {
    POSTER_EXTENSIONS
        .iter()
        .map(|ext| posters_dir.join(format!("{stem}.{ext}")))
        .find(|path| path.is_file())
}

/// Picks an image file extension from the response `Content-Type`, then from
/// the URL path, then falls back to `jpg`.
pub fn poster_extension(content_type: Option<&str>, url: &str) -> &'static str {
    let from_content_type = content_type.and_then(|content_type| {
        let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
        match mime.as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some("jpg"),
            "image/png" => Some("png"),
            "image/gif" => Some("gif"),
            "image/webp" => Some("webp"),
            _ => None,
        }
    });

    from_content_type
        .or_else(|| {
            let path = Url::parse(url).ok()?.path().to_ascii_lowercase();
            let ext = path.rsplit_once('.')?.1.to_string();
            POSTER_EXTENSIONS
                .iter()
                .find(|known| **known == ext)
                .map(|known| if *known == "jpeg" { "jpg" } else { *known })
        })
        .unwrap_or("jpg")
}

/// Downloads the poster of every record that has a `poster_url`.
///
/// Posters are saved as `<posters_dir>/<file stem>.<ext>`. Titles that already
/// have a poster are skipped unless `overwrite` is set. Failed downloads are
/// logged and skipped.
///
/// # Errors
///
/// Returns an error if the records cannot be loaded or the directory cannot be created.
pub async fn download_posters(
    records_path: &Path,
    posters_dir: &Path,
    rpm: Option<u32>,
    overwrite: bool,
) -> Result<PosterReport> {
    let records = RecordStore::new(records_path).load()?;
    fs::create_dir_all(posters_dir)
        .with_context(|| format!("Failed to create {}", posters_dir.display()))?;
    let fetcher = Fetcher::new(rpm)?;

    let mut report = PosterReport::default();
    for record in &records {
        let title = record.display_title();
        let Some(poster_url) = record.poster_url.as_deref() else {
            warn!("No poster url for {title}");
            report.skipped += 1;
            continue;
        };

        let stem = record.file_stem();
        if !overwrite && let Some(existing) = find_poster(posters_dir, &stem) {
            info!("Poster for {title} already at {}", existing.display());
            report.skipped += 1;
            continue;
        }

        match save_poster(&fetcher, poster_url, posters_dir, &stem).await {
            Ok(path) => {
                info!("Saved poster for {title} to {}", path.display());
                report.downloaded += 1;
            }
            Err(err) => {
                error!("Failed to download poster for {title}: {err:#}");
                report.failed += 1;
            }
        }
    }

    info!(
        "Posters: {} downloaded, {} skipped, {} failed",
        report.downloaded, report.skipped, report.failed
    );
    Ok(report)
}

async fn save_poster(
    fetcher: &Fetcher,
    poster_url: &str,
    posters_dir: &Path,
    stem: &str,
) -> Result<PathBuf> {
    let (bytes, content_type) = fetcher.fetch_bytes(poster_url).await?;
    anyhow::ensure!(!bytes.is_empty(), "Empty response for {poster_url}");

    let ext = poster_extension(content_type.as_deref(), poster_url);
    let path = posters_dir.join(format!("{stem}.{ext}"));
    fs::write(&path, &bytes).with_context(|| format!("Failed to write {}", path.display()))?;

    // A stale poster with another extension would shadow this one in find_poster.
    for stale in POSTER_EXTENSIONS.iter().filter(|other| **other != ext) {
        let stale = posters_dir.join(format!("{stem}.{stale}"));
        if stale.is_file() {
            fs::remove_file(&stale)
                .with_context(|| format!("Failed to remove {}", stale.display()))?;
        }
    }

    Ok(path)
}
