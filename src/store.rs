//! # Persistence Module
//!
//! The two collaborators the orchestrator writes through: a document store
//! for sources, documents, snapshots, diffs and per-URL hash bookkeeping,
//! and an object store that archives raw fetched bytes.
//!
//! ## Key Components
//!
//! - `DocumentStore`: Contract used by the orchestrator and idempotency gate
//! - `Database`: libsql implementation of `DocumentStore`
//! - `ObjectStore`: `put_bytes` / `presign` contract for raw archives
//! - `LocalObjectStore`: Filesystem implementation returning `file://` locators

mod database;
mod error;
mod object;
mod schema;

pub use database::Database;
pub use error::{DbError, StorageError};
pub use object::{LocalObjectStore, object_key};

use std::future::Future;

/// A document about to be recorded
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub source_id: Option<i64>,
    pub url: String,
    /// Locator of the archived raw bytes
    pub raw_uri: String,
    pub normalized_text: String,
    pub content_hash: String,
    pub mime: String,
    pub pdf_revision: Option<String>,
}

/// A classified view of a document about to be recorded
#[derive(Debug, Clone)]
pub struct NewSnapshot {
    pub document_id: i64,
    pub title: String,
    pub topic: String,
    pub score: u32,
    pub effective_date: Option<String>,
    pub form_id: Option<String>,
}

/// The latest snapshot recorded for a URL and its document's text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorSnapshot {
    pub snapshot_id: i64,
    pub text: String,
}

/// Persistence contract for the change-detection pipeline.
///
/// Documents, snapshots and diffs are never updated once written; only the
/// per-URL seen record is upserted.
pub trait DocumentStore: Send + Sync {
    /// Hash recorded by the last `touch_seen` for `url`
    fn get_last_hash(&self, url: &str) -> impl Future<Output = Result<Option<String>, DbError>> + Send;

    /// Latest snapshot for `url` with its document's normalized text
    fn get_prev_doc_text(&self, url: &str) -> impl Future<Output = Result<Option<PriorSnapshot>, DbError>> + Send;

    /// Record `hash` and the current time against `url`
    fn touch_seen(&self, url: &str, hash: &str) -> impl Future<Output = Result<(), DbError>> + Send;

    fn insert_document(&self, doc: &NewDocument) -> impl Future<Output = Result<i64, DbError>> + Send;

    fn insert_snapshot(&self, snapshot: &NewSnapshot) -> impl Future<Output = Result<i64, DbError>> + Send;

    fn insert_diff(
        &self,
        snapshot_id: i64,
        prev_snapshot_id: Option<i64>,
        diff_text: &str,
    ) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Id of the source named `name` in `jurisdiction`, creating it if needed
    fn ensure_source(
        &self,
        jurisdiction: &str,
        name: &str,
        homepage: Option<&str>,
    ) -> impl Future<Output = Result<i64, DbError>> + Send;
}

/// Archive for raw fetched bytes
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key`, returning a locator for the object
    fn put_bytes(&self, key: &str, bytes: &[u8]) -> impl Future<Output = Result<String, StorageError>> + Send;

    /// Temporary URL for reading the object stored under `key`
    fn presign(&self, key: &str) -> Result<String, StorageError>;
}
