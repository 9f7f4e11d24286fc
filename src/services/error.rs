use camino::Utf8PathBuf;
use thiserror::Error;

/// Any failure reported by the remote inference service, whether transport,
/// HTTP status, or model-side refusal.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("API key not configured (set GEMINI_API_KEY)")]
    MissingApiKey,

    #[error("Request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("{operation} request failed ({status}): {message}")]
    Api {
        operation: &'static str,
        status: u16,
        message: String,
    },

    #[error("Request was blocked: {0}")]
    Blocked(String),

    #[error("The model did not return an image{}", .0.as_deref().map(|t| format!(": {t}")).unwrap_or_default())]
    NoImage(Option<String>),

    #[error("The model returned an empty response")]
    EmptyResponse,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Local file failures: reading or decoding an upload, or writing a download.
#[derive(Error, Debug)]
pub enum LocalIoError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File is empty")]
    Empty,

    #[error("Unrecognized image format")]
    UnrecognizedFormat,

    #[error("Unsupported image format: {0} (expected PNG, JPEG or WEBP)")]
    UnsupportedFormat(String),

    #[error("Failed to decode image: {0}")]
    Decode(String),
}
