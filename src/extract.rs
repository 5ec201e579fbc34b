//! # Content Extraction Module
//!
//! This module turns fetched bytes into clean document text. HTML goes
//! through a readability pass with a conservative whole-page fallback; PDF
//! goes through the native text layer with an OCR fallback for scanned
//! documents.
//!
//! ## Key Components
//!
//! - `ContentExtractor`: Dispatches on MIME type and applies the extraction policy
//! - `DocumentKind`: The HTML/PDF classification of a response
//! - `OcrEngine` / `TesseractOcr`: OCR backend for image-only PDFs
//! - `ChooseFn`: Swappable policy for picking between two candidate texts

mod config;
mod error;
mod html;
mod ocr;
mod pdf;
mod policy;

pub use config::{HtmlExtractConfig, PdfExtractConfig};
pub use error::ExtractError;
pub use html::{extract_html, fallback_pass, join_blocks, readability_pass};
pub use ocr::{OcrEngine, TesseractOcr};
pub use pdf::{extract_pdf, native_text, pdf_revision};
pub use policy::{ChooseFn, prefer_longer, prefer_primary};

#[cfg(test)]
pub(crate) use pdf::tests::build_pdf;

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, instrument};
use url::Url;

/// Which extraction path a response takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Html,
    Pdf,
}

impl DocumentKind {
    /// Canonical MIME type recorded for documents of this kind
    pub fn mime(&self) -> &'static str {
        match self {
            DocumentKind::Html => "text/html",
            DocumentKind::Pdf => "application/pdf",
        }
    }

    /// Classify a response by its MIME type and URL
    pub fn classify(mime: &str, url: &str) -> Result<Self, ExtractError> {
        let mime = mime.trim().to_ascii_lowercase();
        if mime.contains("application/pdf") || url.to_ascii_lowercase().ends_with(".pdf") {
            Ok(DocumentKind::Pdf)
        } else if mime.is_empty() || mime.starts_with("text/") || mime.contains("html") {
            Ok(DocumentKind::Html)
        } else {
            Err(ExtractError::UnsupportedMime(mime))
        }
    }
}

/// MIME type from the Content-Type essence, else guessed from the URL's extension
pub fn detect_mime(content_type: Option<&str>, url: &str) -> String {
    if let Some(ct) = content_type {
        let essence = ct.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        if !essence.is_empty() {
            return essence;
        }
    }

    let path = Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string());
    let extension = Path::new(&path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("pdf") => "application/pdf",
        Some("htm") | Some("html") | Some("xhtml") => "text/html",
        Some("txt") => "text/plain",
        Some("xml") => "application/xml",
        Some("json") => "application/json",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("xls") => "application/vnd.ms-excel",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("zip") => "application/zip",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
    .to_string()
}

/// Extracts document text from fetched bytes
#[derive(Clone)]
pub struct ContentExtractor {
    html: HtmlExtractConfig,
    pdf: PdfExtractConfig,
    ocr: Option<Arc<dyn OcrEngine>>,
    choose: ChooseFn,
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self::new(HtmlExtractConfig::default(), PdfExtractConfig::default())
    }
}

impl ContentExtractor {
    /// Create an extractor; OCR uses Tesseract when enabled in `pdf`
    pub fn new(html: HtmlExtractConfig, pdf: PdfExtractConfig) -> Self {
        let ocr: Option<Arc<dyn OcrEngine>> = if pdf.ocr_enabled {
            Some(Arc::new(TesseractOcr::from_config(&pdf)))
        } else {
            None
        };
        Self {
            html,
            pdf,
            ocr,
            choose: prefer_longer,
        }
    }

    /// Replace the OCR backend
    pub fn with_ocr(mut self, ocr: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    /// Replace the policy used to pick between primary and fallback text
    pub fn with_choose(mut self, choose: ChooseFn) -> Self {
        self.choose = choose;
        self
    }

    /// HTML settings
    pub fn html_config(&self) -> &HtmlExtractConfig {
        &self.html
    }

    /// PDF settings
    pub fn pdf_config(&self) -> &PdfExtractConfig {
        &self.pdf
    }

    /// Extract text from an HTML page
    pub fn extract_html(&self, html: &str, url: &Url) -> Option<String> {
        extract_html(html, url, &self.html, self.choose)
    }

    /// Extract text from a PDF; blocking, may shell out for OCR
    pub fn extract_pdf(&self, bytes: &[u8]) -> Option<String> {
        extract_pdf(bytes, &self.pdf, self.ocr.as_deref(), self.choose)
    }

    /// Extract text for a document of `kind`, off the async runtime.
    ///
    /// `Ok(None)` means the document carried no usable text.
    #[instrument(skip(self, body), fields(url = %url, kind = ?kind, bytes = body.len()))]
    pub async fn extract(&self, kind: DocumentKind, body: Vec<u8>, url: &str) -> Result<Option<String>, ExtractError> {
        let extractor = self.clone();
        let url = url.to_string();

        let text = tokio::task::spawn_blocking(move || match kind {
            DocumentKind::Pdf => extractor.extract_pdf(&body),
            DocumentKind::Html => {
                let parsed = Url::parse(&url).map_err(|e| ExtractError::Html(format!("Bad URL {url}: {e}")));
                match parsed {
                    Ok(base) => extractor.extract_html(&String::from_utf8_lossy(&body), &base),
                    Err(e) => {
                        debug!(error = %e, "Cannot extract HTML without a base URL");
                        None
                    }
                }
            }
        })
        .await
        .map_err(|e| ExtractError::Task(e.to_string()))?;

        Ok(text.filter(|t| !t.trim().is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_mime() {
        assert_eq!(detect_mime(Some("text/HTML; charset=utf-8"), "https://e.gov/x"), "text/html");
        assert_eq!(detect_mime(None, "https://e.gov/forms/st-1.PDF"), "application/pdf");
        assert_eq!(detect_mime(Some(""), "https://e.gov/news/page.htm?x=1"), "text/html");
        assert_eq!(detect_mime(None, "https://e.gov/data.bin"), "application/octet-stream");
    }

    #[test]
    fn test_document_kind() {
        assert_eq!(DocumentKind::classify("application/pdf", "https://e.gov/x").unwrap(), DocumentKind::Pdf);
        assert_eq!(
            DocumentKind::classify("application/octet-stream", "https://e.gov/x.pdf").unwrap(),
            DocumentKind::Pdf
        );
        assert_eq!(DocumentKind::classify("text/plain", "https://e.gov/x").unwrap(), DocumentKind::Html);
        assert_eq!(DocumentKind::classify("", "https://e.gov/x").unwrap(), DocumentKind::Html);
        assert!(matches!(
            DocumentKind::classify("image/png", "https://e.gov/x.png"),
            Err(ExtractError::UnsupportedMime(_))
        ));
    }

    #[tokio::test]
    async fn test_extract_pdf_off_runtime() {
        let pdf = build_pdf(&[
            "Notice: the sales and use tax rate for the county changes on July 1.",
            "Retailers must report the new rate on the revised quarterly return.",
        ]);
        let extractor = ContentExtractor::new(
            HtmlExtractConfig::default(),
            PdfExtractConfig {
                ocr_enabled: false,
                ..PdfExtractConfig::default()
            },
        );

        let text = extractor
            .extract(DocumentKind::Pdf, pdf, "https://e.gov/notice.pdf")
            .await
            .unwrap()
            .unwrap();
        assert!(text.contains("revised quarterly return"));
    }

    #[tokio::test]
    async fn test_extract_empty_html_is_none() {
        let extractor = ContentExtractor::default();
        let text = extractor
            .extract(DocumentKind::Html, b"<html><body></body></html>".to_vec(), "https://e.gov/")
            .await
            .unwrap();
        assert!(text.is_none());
    }
}
