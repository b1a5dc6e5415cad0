use thiserror::Error;

/// Errors that can occur while loading, parsing, or tracking an ad
#[derive(Error, Debug)]
pub enum AdError {
    #[error("Failed to parse XML: {0}")]
    XmlParse(#[from] quick_xml::Error),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Failed to fetch VAST document: {0}")]
    Fetch(String),

    #[error("Fatal playback error: {0}")]
    PlaybackFatal(String),

    #[error("Unknown error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, AdError>;
