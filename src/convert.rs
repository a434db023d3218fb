//! The convert module turns stored records into e-books by cleaning their HTML
//! and handing it to an external converter.

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::ChildStdin;

use crate::constants::{
    BEFORE_PREFIX, DEFAULT_EBOOK_CONVERT_BIN, DEFAULT_PANDOC_BIN, EBOOK_CONVERT_ENV_NAME,
    PANDOC_ENV_NAME,
};
use crate::error::ConversionError;
use crate::posters::find_poster;
use crate::preprocess::preprocess_html;
use crate::record::{Record, RecordStore, normalize_title};
use crate::{ConvertTarget, EbookFormat};

/// Locations of the external tools used during conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converter {
    /// HTML to e-book converter, calibre's `ebook-convert` by default.
    pub ebook_convert_bin: String,
    /// Markdown to HTML converter used by the Markdown pass.
    pub pandoc_bin: String,
}

impl Default for Converter {
    fn default() -> Self {
        Self {
            ebook_convert_bin: DEFAULT_EBOOK_CONVERT_BIN.to_string(),
            pandoc_bin: DEFAULT_PANDOC_BIN.to_string(),
        }
    }
}

/// Metadata passed along to the e-book converter.
#[derive(Debug, Clone, Default)]
pub struct BookMetadata<'a> {
    pub title: Option<&'a str>,
    pub cover: Option<&'a Path>,
}

impl Converter {
    /// Builds a converter from the environment, falling back to the default binaries.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ebook_convert_bin: std::env::var(EBOOK_CONVERT_ENV_NAME)
                .unwrap_or(defaults.ebook_convert_bin),
            pandoc_bin: std::env::var(PANDOC_ENV_NAME).unwrap_or(defaults.pandoc_bin),
        }
    }

    /// Builds the e-book converter invocation without running it.
    pub fn ebook_command(&self, input: &Path, output: &Path, metadata: &BookMetadata) -> Command {
        let mut cmd = Command::new(&self.ebook_convert_bin);
        cmd.arg(input).arg(output);
        if let Some(title) = metadata.title {
            cmd.arg("--title").arg(title);
        }
        if let Some(cover) = metadata.cover {
            cmd.arg("--cover").arg(cover);
        }
        cmd
    }

    /// Converts an HTML file on disk into an e-book at `output`.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError::Spawn`] if the converter cannot be started and
    /// [`ConversionError::Failed`] if it exits unsuccessfully.
    pub async fn convert_html_file(
        &self,
        input: &Path,
        output: &Path,
        metadata: &BookMetadata<'_>,
    ) -> Result<(), ConversionError> {
        debug!("Running {} on {}", self.ebook_convert_bin, input.display());
        let cmd = self.ebook_command(input, output, metadata);
        run(&self.ebook_convert_bin, cmd, None).await.map(|_| ())
    }

    /// Converts Markdown to an HTML fragment through the Markdown converter.
    ///
    /// # Errors
    ///
    /// Returns a [`ConversionError`] if the tool cannot be started, fails, or
    /// answers with invalid UTF-8.
    pub async fn markdown_to_html(&self, markdown: &str) -> Result<String, ConversionError> {
        let mut cmd = Command::new(&self.pandoc_bin);
        cmd.args(["--from", "markdown", "--to", "html"]);
        let output = run(&self.pandoc_bin, cmd, Some(markdown.as_bytes())).await?;

        String::from_utf8(output.stdout).map_err(|_| ConversionError::InvalidOutput {
            tool: self.pandoc_bin.clone(),
        })
    }
}

/// Runs `cmd` to completion, feeding `stdin` while stdout and stderr are drained.
async fn run(tool: &str, cmd: Command, stdin: Option<&[u8]>) -> Result<Output, ConversionError> {
    let mut cmd = tokio::process::Command::from(cmd);
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|source| ConversionError::Spawn {
        tool: tool.to_string(),
        source,
    })?;

    let pipe = child.stdin.take();
    let (written, output) = tokio::join!(feed_stdin(pipe, stdin), child.wait_with_output());

    let output = output.map_err(|source| ConversionError::Io {
        tool: tool.to_string(),
        source,
    })?;

    if !output.status.success() {
        return Err(ConversionError::Failed {
            tool: tool.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    // A tool may exit successfully without reading all of its input.
    if let Err(source) = written
        && source.kind() != ErrorKind::BrokenPipe
    {
        return Err(ConversionError::Io {
            tool: tool.to_string(),
            source,
        });
    }

    Ok(output)
}

async fn feed_stdin(pipe: Option<ChildStdin>, input: Option<&[u8]>) -> std::io::Result<()> {
    if let (Some(mut pipe), Some(input)) = (pipe, input) {
        pipe.write_all(input).await?;
        pipe.shutdown().await?;
    }
    Ok(())
}

/// Path of the e-book written for `stem`. The converter picks the output
/// format from this extension.
pub fn output_path(out_dir: &Path, stem: &str, format: EbookFormat) -> PathBuf {
    out_dir.join(format!("{stem}.{}", format.extension()))
}

/// Settings of a `convert` run.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub records_path: PathBuf,
    pub html_dir: PathBuf,
    pub out_dir: PathBuf,
    pub posters_dir: Option<PathBuf>,
    pub target: ConvertTarget,
    pub format: EbookFormat,
    pub markdown_pass: bool,
    pub converter: Converter,
}

/// Outcome of a `convert` run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConvertReport {
    pub converted: usize,
    pub failed: usize,
}

/// Converts the selected records to e-books.
///
/// Records are processed in title order. Each one leaves a raw dump and the
/// cleaned HTML in `html_dir`, and the e-book in `out_dir`. A record that
/// fails is logged and skipped.
///
/// # Errors
///
/// Returns an error if the records cannot be loaded or the output directories
/// cannot be created.
pub async fn convert(options: &ConvertOptions) -> Result<ConvertReport> {
    let store = RecordStore::new(&options.records_path);
    let mut records = store.load()?;
    records.sort_by_cached_key(Record::display_title);

    let selected = select_records(records, &options.target);
    if selected.is_empty() {
        match &options.target {
            ConvertTarget::All => info!("No records in {}", options.records_path.display()),
            ConvertTarget::Title { title } => error!("Record not found: {title}"),
        }
        return Ok(ConvertReport::default());
    }

    fs::create_dir_all(&options.html_dir)
        .with_context(|| format!("Failed to create {}", options.html_dir.display()))?;
    fs::create_dir_all(&options.out_dir)
        .with_context(|| format!("Failed to create {}", options.out_dir.display()))?;

    let total = selected.len();
    let mut report = ConvertReport::default();
    for (index, record) in selected.iter().enumerate() {
        let title = record.display_title();
        info!("[{}/{total}] Processing {title}", index + 1);

        match convert_record(record, options).await {
            Ok(path) => {
                info!("Wrote {}", path.display());
                report.converted += 1;
            }
            Err(err) => {
                error!("Failed to convert {title}: {err:#}");
                report.failed += 1;
            }
        }
    }

    info!(
        "Converted {}/{total} records ({} failed)",
        report.converted, report.failed
    );
    Ok(report)
}

/// Narrows records down to the requested target.
pub fn select_records(records: Vec<Record>, target: &ConvertTarget) -> Vec<Record> {
    match target {
        ConvertTarget::All => records,
        ConvertTarget::Title { title } => {
            let wanted = normalize_title(title);
            records
                .into_iter()
                .filter(|record| record.display_title() == wanted)
                .collect()
        }
    }
}

async fn convert_record(record: &Record, options: &ConvertOptions) -> Result<PathBuf> {
    let stem = record.file_stem();
    let title = record.display_title();

    let before_path = options
        .html_dir
        .join(format!("{BEFORE_PREFIX}{stem}.html"));
    fs::write(&before_path, &record.script)
        .with_context(|| format!("Failed to write {}", before_path.display()))?;

    let html =
        preprocess_html(&record.script, &options.converter, options.markdown_pass).await?;
    let html_path = options.html_dir.join(format!("{stem}.html"));
    fs::write(&html_path, &html)
        .with_context(|| format!("Failed to write {}", html_path.display()))?;

    let cover = options
        .posters_dir
        .as_deref()
        .and_then(|dir| find_poster(dir, &stem));
    match (&cover, &options.posters_dir) {
        (Some(cover), _) => debug!("Using cover {}", cover.display()),
        (None, Some(dir)) => warn!("No poster for {title} in {}", dir.display()),
        (None, None) => {}
    }

    let out_path = output_path(&options.out_dir, &stem, options.format);
    let metadata = BookMetadata {
        title: Some(title.as_str()),
        cover: cover.as_deref(),
    };
    options
        .converter
        .convert_html_file(&html_path, &out_path, &metadata)
        .await?;

    Ok(out_path)
}
