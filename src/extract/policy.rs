//! Selection between two extraction candidates

/// Picks one of two candidate texts: `(primary, alternative) -> chosen`
pub type ChooseFn = for<'a> fn(&'a str, &'a str) -> &'a str;

/// Keep `primary` unless `alternative` is strictly longer
pub fn prefer_longer<'a>(primary: &'a str, alternative: &'a str) -> &'a str {
    if alternative.chars().count() > primary.chars().count() {
        alternative
    } else {
        primary
    }
}

/// Keep `primary` whenever it has any content
pub fn prefer_primary<'a>(primary: &'a str, alternative: &'a str) -> &'a str {
    if primary.trim().is_empty() {
        alternative
    } else {
        primary
    }
}
