//! # Change Detection Pipeline
//!
//! Drives URLs through fetch, extraction, canonicalization, the
//! idempotency gate, persistence, classification and diffing. Each URL
//! ends in a `UrlOutcome`; no single URL's failure stops a batch.
//!
//! ## Key Components
//!
//! - `Orchestrator`: Per-URL state machine and bounded-concurrency batch runner
//! - `IdempotencyGuard`: Content-hash gate against the last hash seen per URL
//! - `UrlOutcome` / `RunSummary`: What happened to each URL and in total
//! - `parse_worklist` / `load_worklist`: Line-oriented URL lists
//! - `discover_hubs`: Grows the worklist from configured hubs

mod gate;
mod hubs;
mod orchestrator;
mod outcome;
mod worklist;

pub use gate::{GateDecision, IdempotencyGuard};
pub use hubs::discover_hubs;
pub use orchestrator::Orchestrator;
pub use outcome::{RunSummary, SkipReason, Stage, UrlOutcome};
pub use worklist::{append_worklist, load_worklist, parse_worklist};
