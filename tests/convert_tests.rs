use scriptbook::convert::{
    BookMetadata, ConvertOptions, ConvertReport, Converter, convert, output_path, select_records,
};
use scriptbook::error::ConversionError;
use scriptbook::record::{Record, RecordStore};
use scriptbook::{ConvertTarget, EbookFormat};
use spectral::prelude::*;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

fn missing_tools() -> Converter {
    Converter {
        ebook_convert_bin: "scriptbook-missing-ebook-convert".to_string(),
        pandoc_bin: "scriptbook-missing-pandoc".to_string(),
    }
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

fn options(root: &Path, target: ConvertTarget) -> ConvertOptions {
    ConvertOptions {
        records_path: root.join("data_html.jsonl"),
        html_dir: root.join("html"),
        out_dir: root.join("epub"),
        posters_dir: Some(root.join("posters")),
        target,
        format: EbookFormat::Epub,
        markdown_pass: false,
        converter: missing_tools(),
    }
}

#[test]
fn ebook_command_passes_title_and_cover() {
    let converter = Converter::default();
    let cover = PathBuf::from("posters/Alien.jpg");
    let metadata = BookMetadata {
        title: Some("Alien"),
        cover: Some(&cover),
    };

    let cmd = converter.ebook_command(
        Path::new("html/Alien.html"),
        Path::new("epub/Alien.epub"),
        &metadata,
    );

    assert_that(&cmd.get_program()).is_equal_to(OsStr::new("ebook-convert"));
    let args: Vec<&OsStr> = cmd.get_args().collect();
    assert_that(&args).is_equal_to(vec![
        OsStr::new("html/Alien.html"),
        OsStr::new("epub/Alien.epub"),
        OsStr::new("--title"),
        OsStr::new("Alien"),
        OsStr::new("--cover"),
        OsStr::new("posters/Alien.jpg"),
    ]);
}

#[test]
fn ebook_command_without_metadata_has_only_paths() {
    let cmd = Converter::default().ebook_command(
        Path::new("in.html"),
        Path::new("out.mobi"),
        &BookMetadata::default(),
    );

    assert_that(&cmd.get_args().count()).is_equal_to(2);
}

#[tokio::test]
async fn missing_converter_is_a_spawn_error() {
    let result = missing_tools()
        .convert_html_file(
            Path::new("in.html"),
            Path::new("out.epub"),
            &BookMetadata::default(),
        )
        .await;

    assert!(matches!(
        result,
        Err(ConversionError::Spawn { ref tool, .. }) if tool == "scriptbook-missing-ebook-convert"
    ));
}

#[test]
fn output_path_keeps_dotted_titles() {
    assert_that(&output_path(Path::new("epub"), "Mr. Smith", EbookFormat::Epub))
        .is_equal_to(PathBuf::from("epub/Mr. Smith.epub"));
    assert_that(&output_path(Path::new("out"), "Alien", EbookFormat::Azw3))
        .is_equal_to(PathBuf::from("out/Alien.azw3"));
}

#[test]
fn format_and_target_parse_from_cli_strings() {
    assert_that(&".EPUB".parse::<EbookFormat>()).is_equal_to(Ok(EbookFormat::Epub));
    assert_that(&"mobi".parse::<EbookFormat>()).is_equal_to(Ok(EbookFormat::Mobi));
    assert_that(&"docx".parse::<EbookFormat>()).is_err();

    assert_that(&ConvertTarget::from("all")).is_equal_to(ConvertTarget::All);
    assert_that(&ConvertTarget::from("Alien")).is_equal_to(ConvertTarget::Title {
        title: "Alien".to_string(),
    });
}

#[test]
fn select_records_matches_normalized_title() {
    let records = vec![record("Alien"), record("Blade   Runner"), record("Heat")];

    let selected = select_records(
        records.clone(),
        &ConvertTarget::Title {
            title: " Blade Runner ".to_string(),
        },
    );
    assert_that(&selected).has_length(1);
    assert_that(&selected[0].title).is_equal_to("Blade   Runner".to_string());

    assert_that(&select_records(records, &ConvertTarget::All)).has_length(3);
}

#[tokio::test]
async fn convert_keeps_going_after_failures() {
    let dir = tempfile::tempdir().expect("Expected a temp dir.");
    let store = RecordStore::new(dir.path().join("data_html.jsonl"));
    store.append(&record("Heat")).expect("Expected append to succeed.");
    store.append(&record("Alien")).expect("Expected append to succeed.");

    let report = convert(&options(dir.path(), ConvertTarget::All))
        .await
        .expect("Expected the run to complete.");

    assert_that(&report).is_equal_to(ConvertReport {
        converted: 0,
        failed: 2,
    });

    let html_dir = dir.path().join("html");
    for title in ["Alien", "Heat"] {
        let raw = fs::read_to_string(html_dir.join(format!("BEFORE_{title}.html")))
            .expect("Expected the raw dump.");
        assert_that(&raw).is_equal_to(record(title).script);

        let cleaned = fs::read_to_string(html_dir.join(format!("{title}.html")))
            .expect("Expected the cleaned html.");
        assert_that(&cleaned).is_equal_to(format!(
            "<pre>\n\n<p>{title}</p>\n\n<p>THE END</p>\n\n</pre>"
        ));
    }
    assert_that(&dir.path().join("epub").is_dir()).is_true();
}

#[tokio::test]
async fn convert_unknown_title_does_nothing() {
    let dir = tempfile::tempdir().expect("Expected a temp dir.");
    RecordStore::new(dir.path().join("data_html.jsonl"))
        .append(&record("Alien"))
        .expect("Expected append to succeed.");

    let report = convert(&options(
        dir.path(),
        ConvertTarget::Title {
            title: "Aliens".to_string(),
        },
    ))
    .await
    .expect("Expected the run to complete.");

    assert_that(&report).is_equal_to(ConvertReport::default());
    assert_that(&dir.path().join("html").exists()).is_false();
}

#[tokio::test]
async fn convert_without_records_file_fails() {
    let dir = tempfile::tempdir().expect("Expected a temp dir.");

    assert_that(&convert(&options(dir.path(), ConvertTarget::All)).await).is_err();
}
