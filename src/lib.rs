//! The scriptbook library scrapes movie scripts into a JSON-lines file and
//! converts each stored script into an e-book through an external converter.

pub mod constants;
pub mod convert;
pub mod error;
pub mod fetch;
pub mod parse;
pub mod posters;
pub mod preprocess;
pub mod record;
pub mod scrape;
pub mod sitemap;

/// Enum representing the target for conversion.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub enum ConvertTarget {
    /// All stored records.
    #[default]
    All,
    /// The record with the specified title.
    Title { title: String },
}

impl From<&str> for ConvertTarget {
    fn from(value: &str) -> Self {
        match value {
            "all" => Self::All,
            title => Self::Title {
                title: title.to_string(),
            },
        }
    }
}

/// Enum representing the e-book format produced by the external converter.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum EbookFormat {
    #[default]
    Epub,
    Mobi,
    Azw3,
    Pdf,
}

impl EbookFormat {
    /// File extension the converter uses to pick the output format.
    pub fn extension(self) -> &'static str {
        match self {
            EbookFormat::Epub => "epub",
            EbookFormat::Mobi => "mobi",
            EbookFormat::Azw3 => "azw3",
            EbookFormat::Pdf => "pdf",
        }
    }
}

impl std::str::FromStr for EbookFormat {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().trim_start_matches('.').to_lowercase().as_str() {
            "epub" => Ok(EbookFormat::Epub),
            "mobi" => Ok(EbookFormat::Mobi),
            "azw3" => Ok(EbookFormat::Azw3),
            "pdf" => Ok(EbookFormat::Pdf),
            _ => Err(format!("Invalid e-book format: {}", input)),
        }
    }
}

pub use convert::{Converter, convert};
pub use error::ConversionError;
pub use posters::{download_posters, find_poster};
pub use preprocess::preprocess_html;
pub use record::{Record, RecordStore};
pub use scrape::scrape;
