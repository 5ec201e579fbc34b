//! Idempotency gate: skip documents whose canonical text has not changed

use tracing::debug;

use crate::analysis::content_hash;
use crate::store::{DbError, DocumentStore};

/// Hash of the current text and whether it differs from the last one seen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDecision {
    pub hash: String,
    pub changed: bool,
}

/// Compares content hashes against the last hash recorded per URL.
///
/// Only the latest hash is consulted, so a document reverting to an
/// earlier state counts as a change.
pub struct IdempotencyGuard<'a, S> {
    store: &'a S,
}

impl<'a, S: DocumentStore> IdempotencyGuard<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Hash `normalized` and compare with the last hash seen for `url`
    pub async fn should_process(&self, url: &str, normalized: &str) -> Result<GateDecision, DbError> {
        let hash = content_hash(normalized);
        let last = self.store.get_last_hash(url).await?;
        let changed = last.as_deref() != Some(hash.as_str());
        debug!(url, hash = %hash, changed, "Gate check");
        Ok(GateDecision { hash, changed })
    }

    /// Record `hash` and the current time against `url`
    pub async fn touch(&self, url: &str, hash: &str) -> Result<(), DbError> {
        self.store.touch_seen(url, hash).await
    }
}
