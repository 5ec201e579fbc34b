//! PDF to text, with OCR for image-only documents

use std::panic::{AssertUnwindSafe, catch_unwind};

use lopdf::Document;
use tracing::{debug, info, warn};

use super::config::PdfExtractConfig;
use super::ocr::OcrEngine;
use super::policy::ChooseFn;

/// Native text layer, page by page; unreadable pages are skipped.
///
/// Returns the text and the number of pages considered, or `None` for the
/// page count when the document could not be opened.
pub fn native_text(bytes: &[u8], max_pages: Option<usize>) -> (String, Option<usize>) {
    let document = match Document::load_mem(bytes) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(error = %e, "PDF could not be opened");
            return (String::new(), None);
        }
    };

    let pages: Vec<u32> = document.get_pages().keys().copied().collect();
    let limit = max_pages.map_or(pages.len(), |max| max.min(pages.len()));

    let mut parts = Vec::new();
    for &page in pages.iter().take(limit) {
        // lopdf can panic on malformed content streams
        let extracted = catch_unwind(AssertUnwindSafe(|| document.extract_text(&[page])));
        match extracted {
            Ok(Ok(text)) => {
                let text = text.trim();
                if !text.is_empty() {
                    parts.push(text.to_string());
                }
            }
            Ok(Err(e)) => warn!(page, error = %e, "PDF read error on page"),
            Err(_) => warn!(page, "PDF reader panicked on page"),
        }
    }

    (parts.join("\n"), Some(limit))
}

/// PDF version from the `%PDF-x.y` header, e.g. `"1.7"`
pub fn pdf_revision(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(1024)];
    let start = head.windows(5).position(|w| w == b"%PDF-")? + 5;
    let version: String = head[start..]
        .iter()
        .take_while(|b| b.is_ascii_digit() || **b == b'.')
        .map(|&b| char::from(b))
        .collect();
    (!version.is_empty()).then_some(version)
}

/// Extract text from a PDF, or `None` when nothing substantive is found
pub fn extract_pdf(
    bytes: &[u8],
    config: &PdfExtractConfig,
    ocr: Option<&dyn OcrEngine>,
    choose: ChooseFn,
) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }

    let (native, page_count) = native_text(bytes, config.max_pages);
    let native_len = native.chars().count();
    if native_len >= config.min_text_len {
        return Some(native);
    }

    let floor = config.floor();
    let accept = |text: &str| {
        let text = text.trim();
        (text.chars().count() >= floor).then(|| text.to_string())
    };

    let ocr = match ocr {
        Some(engine) if config.ocr_enabled => engine,
        _ => {
            debug!(chars = native_len, "PDF native text short and OCR disabled");
            return accept(&native);
        }
    };

    info!(chars = native_len, "PDF native text too short, running OCR");
    let recognized = match ocr.recognize(bytes, page_count) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "OCR failed");
            String::new()
        }
    };

    accept(choose(&native, &recognized))
}
