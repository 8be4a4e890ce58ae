//! Error types for the formscan-core library.

use thiserror::Error;

/// Main error type for the formscan library.
#[derive(Error, Debug)]
pub enum FormscanError {
    /// Recognition result could not be turned into a token stream.
    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    /// Extraction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to reading recognition engine output.
#[derive(Error, Debug)]
pub enum IngestError {
    /// A per-token array does not line up with `rec_texts`.
    #[error("{field} has {actual} entries, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Texts were recognized but neither boxes nor polygons were recorded.
    #[error("recognized texts have no boxes or polygons")]
    MissingBoxes,

    /// A recognition polygon without points.
    #[error("polygon {0} has no points")]
    EmptyPolygon(usize),
}

/// Hard failures inside the extraction engine.
///
/// These never leave [`crate::Extractor::extract`]; they are converted into
/// fallback output at the component boundary where they occur.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    /// A token box is non-finite or inverted.
    #[error("malformed token at index {index}: {reason}")]
    MalformedToken { index: usize, reason: String },

    /// A configured block pattern does not compile.
    #[error("invalid pattern for field {field}: {reason}")]
    InvalidPattern { field: String, reason: String },
}

/// Result type for the formscan library.
pub type Result<T> = std::result::Result<T, FormscanError>;
