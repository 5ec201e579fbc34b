//! Error types for the content extraction module

use crate::error::Error as CrateError;
use thiserror::Error;

/// Error type for content extraction
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Neither the HTML nor the PDF path handles this MIME type
    #[error("Unsupported MIME type: {0}")]
    UnsupportedMime(String),

    /// The PDF could not be opened at all
    #[error("PDF error: {0}")]
    Pdf(String),

    /// Page rendering or recognition failed
    #[error("OCR error: {0}")]
    Ocr(String),

    /// HTML could not be processed
    #[error("HTML error: {0}")]
    Html(String),

    /// Temporary file handling failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking extraction task panicked or was cancelled
    #[error("Extraction task failed: {0}")]
    Task(String),
}

impl From<ExtractError> for CrateError {
    fn from(err: ExtractError) -> Self {
        CrateError::Extract(err.to_string())
    }
}
