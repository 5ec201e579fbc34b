//! HTML to text
//!
//! The primary pass isolates the main article with readability and harvests
//! its headings, paragraphs and list items. The fallback pass takes the same
//! elements from the whole page after discarding scripts and page furniture.

use std::io::Cursor;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};
use url::Url;

use super::config::HtmlExtractConfig;
use super::error::ExtractError;
use super::policy::ChooseFn;

const BLOCK_SELECTOR: &str = "h1, h2, h3, h4, h5, h6, p, li";

/// Containers whose content never counts as document text
const EXCLUDED: [&str; 7] = ["script", "style", "noscript", "nav", "header", "footer", "aside"];

fn collect_blocks(document: &Html, skip_excluded: bool) -> Result<Vec<String>, ExtractError> {
    let selector = Selector::parse(BLOCK_SELECTOR)
        .map_err(|e| ExtractError::Html(format!("Failed to parse block selector: {}", e)))?;

    let blocks = document
        .select(&selector)
        .filter(|el| {
            !skip_excluded
                || !el
                    .ancestors()
                    .filter_map(ElementRef::wrap)
                    .any(|a| EXCLUDED.contains(&a.value().name()))
        })
        .map(|el| {
            el.text()
                .flat_map(str::split_whitespace)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|text| !text.is_empty())
        .collect();

    Ok(blocks)
}

/// Join blocks with blank lines, cutting any block longer than `max_block_len`
pub fn join_blocks<I, S>(blocks: I, max_block_len: usize) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    blocks
        .into_iter()
        .filter_map(|block| {
            let block = block.as_ref().trim();
            if block.is_empty() {
                return None;
            }
            if block.chars().count() > max_block_len {
                let cut: String = block.chars().take(max_block_len).collect();
                Some(format!("{}…", cut.trim_end()))
            } else {
                Some(block.to_string())
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Readability-isolated main content
pub fn readability_pass(html: &str, url: &Url, config: &HtmlExtractConfig) -> Result<String, ExtractError> {
    let mut cursor = Cursor::new(html.as_bytes());
    let product = readability::extractor::extract(&mut cursor, url)
        .map_err(|e| ExtractError::Html(format!("Readability failed: {:?}", e)))?;

    let main = Html::parse_fragment(&product.content);
    let blocks = collect_blocks(&main, false)?;
    Ok(join_blocks(blocks, config.max_block_len))
}

/// Whole-page pass with scripts, navigation and page chrome removed
pub fn fallback_pass(html: &str, config: &HtmlExtractConfig) -> Result<String, ExtractError> {
    let document = Html::parse_document(html);
    let blocks = collect_blocks(&document, true)?;
    Ok(join_blocks(blocks, config.max_block_len))
}

/// Extract the main text of an HTML page, or `None` when nothing substantive remains
pub fn extract_html(html: &str, url: &Url, config: &HtmlExtractConfig, choose: ChooseFn) -> Option<String> {
    if html.trim().is_empty() {
        return None;
    }

    let primary = match readability_pass(html, url, config) {
        Ok(text) => text,
        Err(e) => {
            debug!(url = %url, error = %e, "Primary HTML pass failed");
            String::new()
        }
    };

    let primary_len = primary.chars().count();
    if primary_len >= config.min_text_len {
        return Some(primary);
    }

    info!(url = %url, chars = primary_len, "Readability result too short, using fallback extractor");
    let fallback = match fallback_pass(html, config) {
        Ok(text) => text,
        Err(e) => {
            debug!(url = %url, error = %e, "Fallback HTML pass failed");
            String::new()
        }
    };

    let best = choose(&primary, &fallback).trim();
    if best.chars().count() >= config.floor() {
        Some(best.to_string())
    } else {
        None
    }
}
