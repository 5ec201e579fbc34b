//! Snapshot metadata: effective dates, form identifiers and score bonus

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref EFFECTIVE_DATE: Regex = Regex::new(
        r"(?i)(effective|begins|starting)\s*(?:on\s+)?[:\-]?\s*((\d{1,2}/\d{1,2}/\d{2,4})|([a-z]{3,9}\s+\d{1,2},\s+\d{4}))"
    )
    .expect("valid effective date pattern");
    static ref FORM_ID: Regex = Regex::new(
        r"(?i)\b(01-\d{3}|DR-\d{2,4}|ST-\d{2,4}|CDTFA-\d{2,4}|REG-\d{1,3}|[A-Z]{1,3}-\d{2,4})\b"
    )
    .expect("valid form id pattern");
}

/// Normalized text longer than this earns one extra score point
pub const MAGNITUDE_THRESHOLD: usize = 2000;

fn parse_slash_date(raw: &str) -> Option<NaiveDate> {
    let year = raw.rsplit('/').next()?;
    let format = if year.len() == 2 { "%m/%d/%y" } else { "%m/%d/%Y" };
    NaiveDate::parse_from_str(raw, format).ok()
}

fn parse_named_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    ["%B %d, %Y", "%b %d, %Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&raw, format).ok())
}

/// First date announced as effective, beginning or starting, as `YYYY-MM-DD`
pub fn find_effective_date(text: &str) -> Option<String> {
    EFFECTIVE_DATE.captures_iter(text).find_map(|caps| {
        let date = if let Some(slash) = caps.get(3) {
            parse_slash_date(slash.as_str())
        } else {
            caps.get(4).and_then(|named| parse_named_date(named.as_str()))
        };
        date.map(|d| d.format("%Y-%m-%d").to_string())
    })
}

/// First tax form identifier in the text, upper-cased
pub fn find_form_id(text: &str) -> Option<String> {
    FORM_ID.captures(text).and_then(|caps| caps.get(1)).map(|m| m.as_str().to_uppercase())
}

/// Classifier score plus the magnitude bonus for long documents
pub fn snapshot_score(base: u32, normalized: &str) -> u32 {
    if normalized.chars().count() > MAGNITUDE_THRESHOLD {
        base + 1
    } else {
        base
    }
}
