//! The record module stores scraped scripts as line-delimited JSON records.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// One scraped movie script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Title as found on the site, possibly with irregular whitespace.
    pub title: String,
    /// Raw HTML fragment holding the script text.
    pub script: String,
    /// Page the script was taken from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Cover image location, fetched separately by the posters command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraped_at: Option<DateTime<Utc>>,
}

impl Record {
    /// Title with whitespace runs collapsed.
    pub fn display_title(&self) -> String {
        normalize_title(&self.title)
    }

    /// Title made safe for use as a file name.
    pub fn file_stem(&self) -> String {
        file_stem(&self.title)
    }
}

/// Collapses every whitespace run into a single space and trims the ends.
pub fn normalize_title(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Converts a title into a file name stem.
///
/// Path separators, characters rejected by common file systems and control
/// characters become `_`. An empty title becomes `untitled`.
pub fn file_stem(title: &str) -> String {
    let stem: String = normalize_title(title)
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let stem = stem.trim_matches('.').to_string();

    if stem.is_empty() {
        "untitled".to_string()
    } else {
        stem
    }
}

/// Append-only store of records backed by a JSON-lines file.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    /// Binds a store to `path`. The file is created on the first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends a record as a single line of JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized or the file cannot be written.
    pub fn append(&self, record: &Record) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        file.write_all(line.as_bytes())?;

        Ok(())
    }

    /// Reads every record in file order. Blank lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a line is not a valid record.
    pub fn load(&self) -> Result<Vec<Record>> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read records from {}", self.path.display()))?;

        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                serde_json::from_str(line).with_context(|| {
                    format!("Invalid record at {}:{}", self.path.display(), index + 1)
                })
            })
            .collect()
    }

    /// Returns the normalized titles already present in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn titles(&self) -> Result<HashSet<String>> {
        match fs::metadata(&self.path) {
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(err) => return Err(err.into()),
            Ok(_) => {}
        }

        Ok(self
            .load()?
            .iter()
            .map(Record::display_title)
            .collect())
    }

    /// Returns the page URLs of the stored records. A missing file yields an empty set.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn urls(&self) -> Result<HashSet<String>> {
        if !self.path.exists() {
            return Ok(HashSet::new());
        }

        Ok(self
            .load()?
            .into_iter()
            .filter_map(|record| record.url)
            .collect())
    }
}
