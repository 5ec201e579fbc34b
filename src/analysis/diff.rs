//! Semantic diff rendered as capped add/remove hunks

use dissimilar::Chunk;

/// Output bounds for a rendered diff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffLimits {
    /// Characters kept from each hunk's payload
    pub context_chars: usize,

    /// Hunks kept in the rendered output
    pub max_hunks: usize,
}

impl Default for DiffLimits {
    fn default() -> Self {
        Self {
            context_chars: 400,
            max_hunks: 2000,
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Diff `old` against `new`, one `+ `/`- ` prefixed hunk per line of output
pub fn diff(old: &str, new: &str) -> String {
    diff_with_limits(old, new, DiffLimits::default())
}

/// `diff` with explicit output bounds
pub fn diff_with_limits(old: &str, new: &str, limits: DiffLimits) -> String {
    dissimilar::diff(old, new)
        .into_iter()
        .filter_map(|chunk| match chunk {
            Chunk::Equal(_) => None,
            Chunk::Insert(text) => Some(format!("+ {}", truncate_chars(text, limits.context_chars))),
            Chunk::Delete(text) => Some(format!("- {}", truncate_chars(text, limits.context_chars))),
        })
        .take(limits.max_hunks)
        .collect::<Vec<_>>()
        .join("\n")
}
