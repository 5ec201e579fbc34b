//! # Text Analysis Module
//!
//! Pure functions over extracted document text: canonicalization, content
//! hashing, line-oriented diffs, rule-based classification and snapshot
//! metadata.
//!
//! ## Key Components
//!
//! - `canonicalize`: Normalization followed by boilerplate stripping
//! - `content_hash`: SHA-256 fingerprint of canonical text
//! - `diff`: Capped `+`/`-` hunks between two versions
//! - `Classifier`: Weighted topic rules with negative short-circuit
//! - `find_effective_date` / `find_form_id`: Snapshot metadata

mod classify;
mod diff;
mod fingerprint;
mod metadata;
mod normalize;

pub use classify::{Classification, Classifier, GENERAL_TOPIC, derive_title};
pub use diff::{DiffLimits, diff, diff_with_limits};
pub use fingerprint::content_hash;
pub use metadata::{MAGNITUDE_THRESHOLD, find_effective_date, find_form_id, snapshot_score};
pub use normalize::{canonicalize, normalize, strip_boilerplate};
