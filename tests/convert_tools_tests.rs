#![cfg(unix)]

use scriptbook::convert::{BookMetadata, ConvertOptions, ConvertReport, Converter, convert};
use scriptbook::error::ConversionError;
use scriptbook::record::{Record, RecordStore};
use scriptbook::{ConvertTarget, EbookFormat};
use spectral::prelude::*;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

const COPYING_CONVERTER: &str = r#"#!/bin/sh
printf '%s\n' "$@" > "$2.args"
cp "$1" "$2"
"#;
const STREAMING_PANDOC: &str = "#!/bin/sh\nexec cat\n";
const FAILING_TOOL: &str = "#!/bin/sh\necho 'cannot read input' >&2\nexit 3\n";

/// Temp dir under the target directory, as `/tmp` may be mounted `noexec`.
fn workspace() -> TempDir {
    tempfile::tempdir_in(env!("CARGO_TARGET_TMPDIR")).expect("Expected a temp dir.")
}

fn fake_tool(dir: &Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, body).expect("Expected the tool to be written.");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
        .expect("Expected the tool to be made executable.");
    path.to_string_lossy().into_owned()
}

fn record(title: &str) -> Record {
    Record {
        title: title.to_string(),
        script: format!("<pre>{title}\n\nTHE END</pre>"),
        url: None,
        poster_url: None,
        scraped_at: None,
    }
}

#[tokio::test]
async fn markdown_pass_streams_large_input() {
    let dir = workspace();
    let converter = Converter {
        ebook_convert_bin: "scriptbook-missing-ebook-convert".to_string(),
        pandoc_bin: fake_tool(dir.path(), "pandoc", STREAMING_PANDOC),
    };
    let markdown = "FADE IN: ".repeat(40_000);

    let html = tokio::time::timeout(
        Duration::from_secs(10),
        converter.markdown_to_html(&markdown),
    )
    .await
    .expect("Expected the tool to finish.")
    .expect("Expected a successful run.");

    assert_that(&html.len()).is_equal_to(markdown.len());
    assert_that(&html).is_equal_to(markdown);
}

#[tokio::test]
async fn failing_tool_reports_status_and_stderr() {
    let dir = workspace();
    let tool = fake_tool(dir.path(), "ebook-convert", FAILING_TOOL);
    let converter = Converter {
        ebook_convert_bin: tool.clone(),
        pandoc_bin: tool.clone(),
    };

    let result = converter
        .convert_html_file(
            &dir.path().join("in.html"),
            &dir.path().join("out.epub"),
            &BookMetadata::default(),
        )
        .await;

    match result {
        Err(ConversionError::Failed {
            tool: failed,
            status,
            stderr,
        }) => {
            assert_that(&failed).is_equal_to(tool);
            assert_that(&status.code()).is_equal_to(Some(3));
            assert_that(&stderr).is_equal_to("cannot read input".to_string());
        }
        other => panic!("Expected a failed run, got {other:?}"),
    }

    assert!(matches!(
        converter.markdown_to_html("# Alien").await,
        Err(ConversionError::Failed { .. })
    ));
}

#[tokio::test]
async fn convert_writes_books_and_attaches_posters() {
    let dir = workspace();
    let root = dir.path();
    let store = RecordStore::new(root.join("data_html.jsonl"));
    store.append(&record("Heat")).expect("Expected append to succeed.");
    store.append(&record("Alien")).expect("Expected append to succeed.");

    let posters_dir = root.join("posters");
    fs::create_dir_all(&posters_dir).expect("Expected the posters dir.");
    fs::write(posters_dir.join("Alien.jpg"), b"jpg").expect("Expected poster to be written.");

    let options = ConvertOptions {
        records_path: store.path().to_path_buf(),
        html_dir: root.join("html"),
        out_dir: root.join("epub"),
        posters_dir: Some(posters_dir.clone()),
        target: ConvertTarget::All,
        format: EbookFormat::Epub,
        markdown_pass: true,
        converter: Converter {
            ebook_convert_bin: fake_tool(root, "ebook-convert", COPYING_CONVERTER),
            pandoc_bin: fake_tool(root, "pandoc", STREAMING_PANDOC),
        },
    };

    let report = convert(&options).await.expect("Expected the run to complete.");

    assert_that(&report).is_equal_to(ConvertReport {
        converted: 2,
        failed: 0,
    });

    let book = fs::read_to_string(root.join("epub/Alien.epub")).expect("Expected the book.");
    let cleaned = fs::read_to_string(root.join("html/Alien.html")).expect("Expected the html.");
    assert_that(&book).is_equal_to(cleaned);
    assert_that(&book).contains("THE END");

    let alien_args =
        fs::read_to_string(root.join("epub/Alien.epub.args")).expect("Expected the arguments.");
    let alien_args: Vec<&str> = alien_args.lines().collect();
    let cover = posters_dir.join("Alien.jpg");
    assert_that(&alien_args).is_equal_to(vec![
        root.join("html/Alien.html").to_str().expect("Expected a utf-8 path."),
        root.join("epub/Alien.epub").to_str().expect("Expected a utf-8 path."),
        "--title",
        "Alien",
        "--cover",
        cover.to_str().expect("Expected a utf-8 path."),
    ]);

    let heat_args =
        fs::read_to_string(root.join("epub/Heat.epub.args")).expect("Expected the arguments.");
    assert_that(&heat_args.contains("--cover")).is_false();
    assert_that(&heat_args).contains("--title\nHeat\n");
}

#[tokio::test]
async fn convert_counts_converter_failures() {
    let dir = workspace();
    let root = dir.path();
    let store = RecordStore::new(root.join("data_html.jsonl"));
    store.append(&record("Alien")).expect("Expected append to succeed.");

    let options = ConvertOptions {
        records_path: store.path().to_path_buf(),
        html_dir: root.join("html"),
        out_dir: root.join("epub"),
        posters_dir: None,
        target: ConvertTarget::Title {
            title: "Alien".to_string(),
        },
        format: EbookFormat::Mobi,
        markdown_pass: false,
        converter: Converter {
            ebook_convert_bin: fake_tool(root, "ebook-convert", FAILING_TOOL),
            pandoc_bin: "scriptbook-missing-pandoc".to_string(),
        },
    };

    let report = convert(&options).await.expect("Expected the run to complete.");

    assert_that(&report).is_equal_to(ConvertReport {
        converted: 0,
        failed: 1,
    });
    assert_that(&root.join("html/Alien.html").is_file()).is_true();
    assert_that(&root.join("epub/Alien.mobi").exists()).is_false();
}
