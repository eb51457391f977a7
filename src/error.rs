use thiserror::Error;

/// Errors raised while talking to an external source.
///
/// None of these abort an aggregation cycle; the aggregator logs them and
/// falls back to the last good result for the failing source.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parsing error: {0}")]
    Parse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Not supported: {0}")]
    Unsupported(String),
}

/// Errors raised by the key-value store backing persistent caches.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
