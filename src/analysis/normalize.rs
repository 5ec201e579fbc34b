//! Text canonicalization ahead of hashing and diffing

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref HORIZONTAL_WS: Regex = Regex::new(r"[ \t]+").expect("valid whitespace pattern");
    static ref BLANK_RUNS: Regex = Regex::new(r"\n{3,}").expect("valid blank-line pattern");
    static ref BOILERPLATE: Vec<Regex> = [
        r"(?i)© \d{4} state of .*",
        r"(?i)page \d+ of \d+",
        r"(?i)last updated: .*",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid boilerplate pattern"))
    .collect();
}

/// Unify line endings, collapse horizontal whitespace and blank-line runs,
/// trim, and lowercase
pub fn normalize(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let collapsed = HORIZONTAL_WS.replace_all(&unified, " ");
    let lines = collapsed.lines().map(str::trim).collect::<Vec<_>>().join("\n");
    let squeezed = BLANK_RUNS.replace_all(&lines, "\n\n");
    squeezed.trim().to_lowercase()
}

/// Remove recurring page furniture: copyright lines, page counters, "last updated" footers
pub fn strip_boilerplate(text: &str) -> String {
    BOILERPLATE
        .iter()
        .fold(text.to_string(), |acc, pattern| pattern.replace_all(&acc, "").into_owned())
}

/// `normalize` followed by `strip_boilerplate`
pub fn canonicalize(text: &str) -> String {
    strip_boilerplate(&normalize(text))
}
