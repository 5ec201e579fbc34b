//! Per-URL outcomes and batch summaries

use std::fmt;

/// Pipeline stage a URL was in when it stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Fetching,
    Extracting,
    Normalizing,
    GateCheck,
    Persisting,
    Diffing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetching => "fetching",
            Stage::Extracting => "extracting",
            Stage::Normalizing => "normalizing",
            Stage::GateCheck => "gate_check",
            Stage::Persisting => "persisting",
            Stage::Diffing => "diffing",
        };
        f.write_str(name)
    }
}

/// Why a URL was skipped without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    RobotsDisallowed,
    NotFound,
    NoText,
    Unchanged,
    UnsupportedMime,
}

impl SkipReason {
    /// Stage at which the skip was decided
    pub fn stage(&self) -> Stage {
        match self {
            SkipReason::RobotsDisallowed | SkipReason::NotFound => Stage::Fetching,
            SkipReason::NoText | SkipReason::UnsupportedMime => Stage::Extracting,
            SkipReason::Unchanged => Stage::GateCheck,
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::RobotsDisallowed => "disallowed by robots.txt",
            SkipReason::NotFound => "not found",
            SkipReason::NoText => "no usable text",
            SkipReason::Unchanged => "unchanged",
            SkipReason::UnsupportedMime => "unsupported content type",
        };
        f.write_str(reason)
    }
}

/// Result of processing one URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlOutcome {
    /// A new document and snapshot were recorded
    Done {
        document_id: i64,
        snapshot_id: i64,
        diff_written: bool,
    },
    Skipped(SkipReason),
    Failed { stage: Stage, reason: String },
}

impl UrlOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, UrlOutcome::Failed { .. })
    }
}

impl fmt::Display for UrlOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlOutcome::Done {
                document_id,
                snapshot_id,
                diff_written,
            } => write!(
                f,
                "recorded document {} snapshot {}{}",
                document_id,
                snapshot_id,
                if *diff_written { " with diff" } else { "" }
            ),
            UrlOutcome::Skipped(reason) => write!(f, "skipped: {}", reason),
            UrlOutcome::Failed { stage, reason } => write!(f, "failed while {}: {}", stage, reason),
        }
    }
}

/// Counts of outcomes over a batch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub done: usize,
    pub diffs: usize,
    pub unchanged: usize,
    pub robots_disallowed: usize,
    pub not_found: usize,
    pub no_text: usize,
    pub unsupported_mime: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &UrlOutcome) {
        match outcome {
            UrlOutcome::Done { diff_written, .. } => {
                self.done += 1;
                if *diff_written {
                    self.diffs += 1;
                }
            }
            UrlOutcome::Skipped(SkipReason::Unchanged) => self.unchanged += 1,
            UrlOutcome::Skipped(SkipReason::RobotsDisallowed) => self.robots_disallowed += 1,
            UrlOutcome::Skipped(SkipReason::NotFound) => self.not_found += 1,
            UrlOutcome::Skipped(SkipReason::NoText) => self.no_text += 1,
            UrlOutcome::Skipped(SkipReason::UnsupportedMime) => self.unsupported_mime += 1,
            UrlOutcome::Failed { .. } => self.failed += 1,
        }
    }

    /// Skips of every kind
    pub fn skipped(&self) -> usize {
        self.unchanged + self.robots_disallowed + self.not_found + self.no_text + self.unsupported_mime
    }

    /// URLs processed
    pub fn total(&self) -> usize {
        self.done + self.skipped() + self.failed
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} urls: {} new ({} with diff), {} unchanged, {} robots, {} not found, {} no text, {} unsupported, {} failed",
            self.total(),
            self.done,
            self.diffs,
            self.unchanged,
            self.robots_disallowed,
            self.not_found,
            self.no_text,
            self.unsupported_mime,
            self.failed
        )
    }
}
