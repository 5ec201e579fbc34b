//! OCR for image-only PDFs
//!
//! Pages are rasterized one at a time with Poppler's `pdftoppm` and read
//! with the `tesseract` CLI. Both run synchronously; callers keep this off
//! the async runtime.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};

use super::config::PdfExtractConfig;
use super::error::ExtractError;

/// Upper bound on pages tried when the page count of a document is unknown
const UNKNOWN_PAGE_CAP: usize = 200;

/// Recognizes text in a PDF's rendered pages
pub trait OcrEngine: Send + Sync {
    /// OCR the first `page_count` pages of `pdf`, or until a page cannot be
    /// rendered when the count is unknown
    fn recognize(&self, pdf: &[u8], page_count: Option<usize>) -> Result<String, ExtractError>;
}

/// Tesseract OCR over pdftoppm-rendered pages
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    tesseract_cmd: PathBuf,
    pdftoppm_cmd: PathBuf,
    dpi: u32,
    lang: String,
    max_pages: Option<usize>,
}

impl TesseractOcr {
    /// Build from PDF extraction settings
    pub fn from_config(config: &PdfExtractConfig) -> Self {
        Self {
            tesseract_cmd: config.tesseract_cmd.clone(),
            pdftoppm_cmd: config.pdftoppm_cmd.clone(),
            dpi: config.ocr_dpi,
            lang: config.ocr_lang.clone(),
            max_pages: config.max_pages,
        }
    }

    fn ocr_page(&self, input: &Path, workdir: &Path, page: usize) -> Result<String, ExtractError> {
        let prefix = workdir.join(format!("page-{page}"));
        let page_arg = page.to_string();

        let render = Command::new(&self.pdftoppm_cmd)
            .arg("-r")
            .arg(self.dpi.to_string())
            .args(["-f", page_arg.as_str(), "-l", page_arg.as_str()])
            .args(["-singlefile", "-png"])
            .arg(input)
            .arg(&prefix)
            .output()?;
        if !render.status.success() {
            return Err(ExtractError::Ocr(format!(
                "pdftoppm failed on page {page}: {}",
                String::from_utf8_lossy(&render.stderr).trim()
            )));
        }

        let png = prefix.with_extension("png");
        let recognized = Command::new(&self.tesseract_cmd)
            .arg(&png)
            .arg("stdout")
            .args(["-l", self.lang.as_str()])
            .output()?;
        if let Err(e) = std::fs::remove_file(&png) {
            debug!(page, error = %e, "Could not remove rendered page");
        }
        if !recognized.status.success() {
            return Err(ExtractError::Ocr(format!(
                "tesseract failed on page {page}: {}",
                String::from_utf8_lossy(&recognized.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&recognized.stdout).into_owned())
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize(&self, pdf: &[u8], page_count: Option<usize>) -> Result<String, ExtractError> {
        let workdir = tempfile::tempdir()?;
        let input = workdir.path().join("input.pdf");
        std::fs::write(&input, pdf)?;

        let (last_page, known) = match page_count {
            Some(count) => (count, true),
            None => (self.max_pages.unwrap_or(UNKNOWN_PAGE_CAP), false),
        };

        let mut parts = Vec::new();
        for page in 1..=last_page {
            match self.ocr_page(&input, workdir.path(), page) {
                Ok(text) => {
                    let text = text.trim();
                    if !text.is_empty() {
                        parts.push(text.to_string());
                    }
                }
                Err(ExtractError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                    return Err(ExtractError::Ocr(format!("OCR tools not available: {e}")));
                }
                Err(e) if known => warn!(page, error = %e, "OCR error on page"),
                Err(e) => {
                    debug!(page, error = %e, "Stopping OCR at first unreadable page");
                    break;
                }
            }
        }

        Ok(parts.join("\n"))
    }
}
