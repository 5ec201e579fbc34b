//! # Bulletin Monitor - Regulatory Change Detection for Rust
//!
//! This crate watches government bulletin pages and documents, detects when
//! their substantive content changes, classifies the change and records a
//! diff against the previous version.
//!
//! ## Features
//!
//! - Polite crawling: robots.txt, per-domain spacing, bounded retries
//! - Headless render fallback for script-populated pages
//! - Hub discovery through feeds, sitemaps and page anchors
//! - HTML and PDF text extraction with OCR for scanned documents
//! - Content-hash idempotency so unchanged pages are never re-recorded
//! - Rule-based topic classification and capped `+`/`-` diffs
//! - LibSQL persistence and a filesystem archive for raw bytes
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use bulletin_monitor::analysis::Classifier;
//! use bulletin_monitor::crawler::{CrawlSession, CrawlerConfig, Fetcher};
//! use bulletin_monitor::extract::ContentExtractor;
//! use bulletin_monitor::pipeline::Orchestrator;
//! use bulletin_monitor::store::{Database, LocalObjectStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = CrawlSession::shared(CrawlerConfig::default())?;
//!     let db = Database::new_from_path("monitor.db").await?;
//!
//!     let orchestrator = Orchestrator::new(
//!         Fetcher::new(session),
//!         ContentExtractor::default(),
//!         Classifier::bundled()?,
//!         Arc::new(db),
//!         Arc::new(LocalObjectStore::new("raw")),
//!     );
//!
//!     let outcome = orchestrator
//!         .process_url("https://comptroller.texas.gov/taxes/publications/")
//!         .await;
//!     println!("{outcome}");
//!     Ok(())
//! }
//! ```

mod error;

pub mod analysis;
pub mod crawler;
pub mod extract;
pub mod pipeline;
pub mod rules;
pub mod store;

pub use error::{Error, Result};

/// Re-export of types module for public use
pub mod prelude {
    pub use crate::analysis::{Classification, Classifier};
    pub use crate::crawler::{CrawlSession, CrawlerConfig, Fetcher, LinkDiscoverer};
    pub use crate::error::Error;
    pub use crate::error::Result;
    pub use crate::extract::ContentExtractor;
    pub use crate::pipeline::{Orchestrator, RunSummary, UrlOutcome};
    pub use crate::store::{Database, DocumentStore, LocalObjectStore, ObjectStore};
}
