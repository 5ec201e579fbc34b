//! Extraction thresholds and OCR settings

use std::path::PathBuf;

/// Thresholds for the HTML path
#[derive(Debug, Clone, PartialEq)]
pub struct HtmlExtractConfig {
    /// Below this many characters the primary pass is considered too short
    pub min_text_len: usize,

    /// Any single block longer than this is cut and suffixed with an ellipsis
    pub max_block_len: usize,
}

impl Default for HtmlExtractConfig {
    fn default() -> Self {
        Self {
            min_text_len: 400,
            max_block_len: 4000,
        }
    }
}

impl HtmlExtractConfig {
    /// Shortest result still worth returning
    pub fn floor(&self) -> usize {
        80.max(self.min_text_len / 4)
    }
}

/// Thresholds and OCR settings for the PDF path
#[derive(Debug, Clone, PartialEq)]
pub struct PdfExtractConfig {
    /// Below this many characters of native text, OCR is attempted
    pub min_text_len: usize,

    /// Whether OCR runs for image-only documents
    pub ocr_enabled: bool,

    /// Render resolution for OCR
    pub ocr_dpi: u32,

    /// Tesseract language code
    pub ocr_lang: String,

    /// Only the first N pages are read; `None` reads every page
    pub max_pages: Option<usize>,

    /// Tesseract executable
    pub tesseract_cmd: PathBuf,

    /// Poppler page rasterizer executable
    pub pdftoppm_cmd: PathBuf,
}

impl Default for PdfExtractConfig {
    fn default() -> Self {
        Self {
            min_text_len: 120,
            ocr_enabled: true,
            ocr_dpi: 300,
            ocr_lang: "eng".to_string(),
            max_pages: None,
            tesseract_cmd: PathBuf::from("tesseract"),
            pdftoppm_cmd: PathBuf::from("pdftoppm"),
        }
    }
}

impl PdfExtractConfig {
    /// Shortest result still worth returning
    pub fn floor(&self) -> usize {
        80.max(self.min_text_len / 2)
    }
}
