pub const EBOOK_CONVERT_ENV_NAME: &str = "SCRIPTBOOK_EBOOK_CONVERT";
pub const PANDOC_ENV_NAME: &str = "SCRIPTBOOK_PANDOC";

pub const DEFAULT_EBOOK_CONVERT_BIN: &str = "ebook-convert";
pub const DEFAULT_PANDOC_BIN: &str = "pandoc";

pub const USER_AGENT: &str = "scriptbook/0.1 (movie script e-book tool)";
pub(crate) const REDIRECT_LIMIT: usize = 3;
pub(crate) const REQUEST_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_RECORDS_PATH: &str = "data_html.jsonl";
pub const DEFAULT_HTML_DIR: &str = "html";
pub const DEFAULT_OUT_DIR: &str = "epub";
pub const DEFAULT_POSTERS_DIR: &str = "posters";

pub const DEFAULT_INDEX_URL: &str = "https://imsdb.com/all-scripts.html";
pub const DEFAULT_INDEX_LINK_SELECTOR: &str = r#"td > p > a[href*="Movie Scripts/"]"#;
pub const DEFAULT_SCRIPT_LINK_SELECTOR: &str = r#"a[href^="/scripts/"]"#;
pub const DEFAULT_SCRIPT_SELECTOR: &str = "td.scrtext > pre";
pub const DEFAULT_POSTER_SELECTOR: &str = r#"td[valign="top"] > img"#;
pub const DEFAULT_TITLE_SUFFIX: &str = r"(?i)\s*script at imsdb\.?\s*$";

/// Prefix of the raw script dump written next to the cleaned HTML.
pub const BEFORE_PREFIX: &str = "BEFORE_";

pub(crate) const POSTER_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

pub(crate) const SCRIPT_STRIPPER: &str = r"(?is)<script\b[^>]*>.*?</script\s*>";
pub(crate) const PARAGRAPH_SPLITTER: &str = r"\n{2,}";
