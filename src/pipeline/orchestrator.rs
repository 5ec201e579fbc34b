//! Per-URL change detection: fetch, extract, gate, persist, diff

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, instrument, warn};

use super::gate::IdempotencyGuard;
use super::outcome::{RunSummary, SkipReason, Stage, UrlOutcome};
use crate::analysis::{
    Classifier, DiffLimits, canonicalize, derive_title, diff_with_limits, find_effective_date, find_form_id,
    snapshot_score,
};
use crate::crawler::{CrawlError, Fetcher};
use crate::extract::{ContentExtractor, DocumentKind, ExtractError, detect_mime, pdf_revision};
use crate::rules::SourceRules;
use crate::store::{DbError, DocumentStore, NewDocument, NewSnapshot, ObjectStore, object_key};

fn skipped(reason: SkipReason) -> UrlOutcome {
    info!(stage = %reason.stage(), reason = %reason, "Skipped");
    UrlOutcome::Skipped(reason)
}

fn failed(stage: Stage, reason: impl ToString) -> UrlOutcome {
    let reason = reason.to_string();
    warn!(stage = %stage, reason = %reason, "Failed");
    UrlOutcome::Failed { stage, reason }
}

/// Sequences the pipeline for each URL and writes results through the stores
pub struct Orchestrator<S, O> {
    fetcher: Fetcher,
    extractor: ContentExtractor,
    classifier: Classifier,
    sources: Option<Arc<SourceRules>>,
    store: Arc<S>,
    objects: Arc<O>,
    diff_limits: DiffLimits,
}

impl<S, O> Orchestrator<S, O>
where
    S: DocumentStore,
    O: ObjectStore,
{
    pub fn new(
        fetcher: Fetcher,
        extractor: ContentExtractor,
        classifier: Classifier,
        store: Arc<S>,
        objects: Arc<O>,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            classifier,
            sources: None,
            store,
            objects,
            diff_limits: DiffLimits::default(),
        }
    }

    /// Attribute documents to the configured sources
    pub fn with_sources(mut self, sources: Arc<SourceRules>) -> Self {
        self.sources = Some(sources);
        self
    }

    pub fn with_diff_limits(mut self, limits: DiffLimits) -> Self {
        self.diff_limits = limits;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Run the pipeline for one URL; never returns an error, only an outcome
    #[instrument(skip(self), fields(url = %url))]
    pub async fn process_url(&self, url: &str) -> UrlOutcome {
        // Fetching
        let response = match self.fetcher.fetch(url).await {
            Ok(response) => response,
            Err(CrawlError::RobotsDisallowed(_)) => return skipped(SkipReason::RobotsDisallowed),
            Err(CrawlError::NotFound(_)) => return skipped(SkipReason::NotFound),
            Err(e) => return failed(Stage::Fetching, e),
        };

        // Extracting
        let mime = detect_mime(response.content_type().as_deref(), url);
        let kind = match DocumentKind::classify(&mime, url) {
            Ok(kind) => kind,
            Err(_) => return skipped(SkipReason::UnsupportedMime),
        };
        let body = response.body;
        let text = match self.extractor.extract(kind, body.clone(), url).await {
            Ok(Some(text)) => text,
            Ok(None) => return skipped(SkipReason::NoText),
            Err(ExtractError::UnsupportedMime(_)) => return skipped(SkipReason::UnsupportedMime),
            Err(e) => return failed(Stage::Extracting, e),
        };

        // Normalizing
        let normalized = canonicalize(&text);
        if normalized.is_empty() {
            return skipped(SkipReason::NoText);
        }

        // GateCheck
        let gate = IdempotencyGuard::new(self.store.as_ref());
        let decision = match gate.should_process(url, &normalized).await {
            Ok(decision) => decision,
            Err(e) => return failed(Stage::GateCheck, e),
        };
        if !decision.changed {
            if let Err(e) = gate.touch(url, &decision.hash).await {
                return failed(Stage::GateCheck, e);
            }
            return skipped(SkipReason::Unchanged);
        }

        // Persisting
        let record = PendingDocument {
            url,
            kind,
            body: &body,
            normalized: &normalized,
            hash: &decision.hash,
        };
        let persisted = match self.persist(&record).await {
            Ok(persisted) => persisted,
            Err((stage, reason)) => return failed(stage, reason),
        };

        // the document is committed; record its hash even if diffing fails
        if let Err(e) = gate.touch(url, &decision.hash).await {
            return failed(Stage::Persisting, e);
        }

        // Diffing
        let mut diff_written = false;
        if let Some(prior) = persisted.prior.filter(|p| !p.text.is_empty()) {
            let diff = diff_with_limits(&prior.text, &normalized, self.diff_limits);
            if let Err(e) = self
                .store
                .insert_diff(persisted.snapshot_id, Some(prior.snapshot_id), &diff)
                .await
            {
                return failed(Stage::Diffing, e);
            }
            diff_written = true;
        }

        info!(
            document_id = persisted.document_id,
            snapshot_id = persisted.snapshot_id,
            diff_written,
            "Recorded new version"
        );
        UrlOutcome::Done {
            document_id: persisted.document_id,
            snapshot_id: persisted.snapshot_id,
            diff_written,
        }
    }

    async fn persist(&self, record: &PendingDocument<'_>) -> Result<Persisted, (Stage, String)> {
        let db = |e: DbError| (Stage::Persisting, e.to_string());

        // looked up before the new snapshot exists, so it is strictly earlier
        let prior = self.store.get_prev_doc_text(record.url).await.map_err(db)?;
        let source_id = self.resolve_source(record.url).await.map_err(db)?;

        let key = object_key(record.url, record.hash).map_err(|e| (Stage::Persisting, e.to_string()))?;
        let raw_uri = self
            .objects
            .put_bytes(&key, record.body)
            .await
            .map_err(|e| (Stage::Persisting, e.to_string()))?;

        let document_id = self
            .store
            .insert_document(&NewDocument {
                source_id,
                url: record.url.to_string(),
                raw_uri,
                normalized_text: record.normalized.to_string(),
                content_hash: record.hash.to_string(),
                mime: record.kind.mime().to_string(),
                pdf_revision: match record.kind {
                    DocumentKind::Pdf => pdf_revision(record.body),
                    DocumentKind::Html => None,
                },
            })
            .await
            .map_err(db)?;

        let classification = self.classifier.classify(record.normalized);
        let snapshot_id = self
            .store
            .insert_snapshot(&NewSnapshot {
                document_id,
                title: derive_title(record.normalized),
                topic: classification.topic,
                score: snapshot_score(classification.score, record.normalized),
                effective_date: find_effective_date(record.normalized),
                form_id: find_form_id(record.normalized),
            })
            .await
            .map_err(db)?;

        Ok(Persisted {
            document_id,
            snapshot_id,
            prior,
        })
    }

    async fn resolve_source(&self, url: &str) -> Result<Option<i64>, DbError> {
        let Some(hub) = self.sources.as_ref().and_then(|s| s.rules_for_url(url)) else {
            return Ok(None);
        };
        let id = self
            .store
            .ensure_source(&hub.jurisdiction, &hub.name, Some(hub.url.as_str()))
            .await?;
        Ok(Some(id))
    }

    /// Process `urls` with up to `concurrency` in flight.
    ///
    /// Each finished URL is reported on `progress` when given. Per-domain
    /// spacing holds at any concurrency since the throttle is shared.
    pub async fn run(
        &self,
        urls: &[String],
        concurrency: usize,
        progress: Option<UnboundedSender<(String, UrlOutcome)>>,
    ) -> RunSummary {
        let mut summary = RunSummary::default();
        let mut results = stream::iter(urls)
            .map(|url| async move { (url.clone(), self.process_url(url).await) })
            .buffer_unordered(concurrency.max(1));

        while let Some((url, outcome)) = results.next().await {
            summary.record(&outcome);
            if let Some(tx) = progress.as_ref() {
                // a dropped receiver only loses progress reports
                let _ = tx.send((url, outcome));
            }
        }

        info!(%summary, "Run finished");
        summary
    }
}

struct PendingDocument<'a> {
    url: &'a str,
    kind: DocumentKind,
    body: &'a [u8],
    normalized: &'a str,
    hash: &'a str,
}

struct Persisted {
    document_id: i64,
    snapshot_id: i64,
    prior: Option<crate::store::PriorSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::{CrawlSession, CrawlerConfig, RenderMode, RetryPolicy};
    use crate::extract::{HtmlExtractConfig, PdfExtractConfig};
    use crate::store::{Database, LocalObjectStore, PriorSnapshot};
    use mockito::Server;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tempfile::{TempDir, tempdir};

    struct Harness {
        orchestrator: Orchestrator<Database, LocalObjectStore>,
        db: Arc<Database>,
        _dir: TempDir,
    }

    fn orchestrator_over<S: DocumentStore>(store: Arc<S>, dir: &TempDir) -> Orchestrator<S, LocalObjectStore> {
        let objects = Arc::new(LocalObjectStore::new(dir.path().join("raw")));

        let config = CrawlerConfig::builder()
            .default_delay(Duration::ZERO)
            .render_mode(RenderMode::Off)
            .retry(RetryPolicy::no_retry())
            .build();
        let fetcher = Fetcher::new(CrawlSession::shared(config).unwrap());
        let extractor = ContentExtractor::new(
            HtmlExtractConfig::default(),
            PdfExtractConfig {
                ocr_enabled: false,
                ..PdfExtractConfig::default()
            },
        );

        Orchestrator::new(fetcher, extractor, Classifier::bundled().unwrap(), store, objects)
    }

    async fn open_db(dir: &TempDir) -> Arc<Database> {
        Arc::new(
            Database::new_from_path(&dir.path().join("monitor.db").to_string_lossy())
                .await
                .unwrap(),
        )
    }

    async fn harness() -> Harness {
        let dir = tempdir().unwrap();
        let db = open_db(&dir).await;
        let orchestrator = orchestrator_over(db.clone(), &dir);
        Harness {
            orchestrator,
            db,
            _dir: dir,
        }
    }

    /// Database whose next `insert_diff` fails when armed
    struct FailingDiffStore {
        inner: Arc<Database>,
        fail_diff: AtomicBool,
    }

    impl DocumentStore for FailingDiffStore {
        async fn get_last_hash(&self, url: &str) -> Result<Option<String>, DbError> {
            self.inner.get_last_hash(url).await
        }

        async fn get_prev_doc_text(&self, url: &str) -> Result<Option<PriorSnapshot>, DbError> {
            self.inner.get_prev_doc_text(url).await
        }

        async fn touch_seen(&self, url: &str, hash: &str) -> Result<(), DbError> {
            self.inner.touch_seen(url, hash).await
        }

        async fn insert_document(&self, doc: &NewDocument) -> Result<i64, DbError> {
            self.inner.insert_document(doc).await
        }

        async fn insert_snapshot(&self, snapshot: &NewSnapshot) -> Result<i64, DbError> {
            self.inner.insert_snapshot(snapshot).await
        }

        async fn insert_diff(
            &self,
            snapshot_id: i64,
            prev_snapshot_id: Option<i64>,
            diff_text: &str,
        ) -> Result<(), DbError> {
            if self.fail_diff.swap(false, Ordering::SeqCst) {
                return Err(DbError::Query("diff table locked".to_string()));
            }
            self.inner.insert_diff(snapshot_id, prev_snapshot_id, diff_text).await
        }

        async fn ensure_source(&self, jurisdiction: &str, name: &str, homepage: Option<&str>) -> Result<i64, DbError> {
            self.inner.ensure_source(jurisdiction, name, homepage).await
        }
    }

    fn page(paragraph: &str) -> String {
        format!(
            "<html><head><title>Bulletin</title></head><body><nav><a href=\"/\">Home</a></nav>\
             <article><h1>Notice: Local sales tax rate change</h1>{}</article></body></html>",
            format!("<p>{}</p>", paragraph).repeat(5)
        )
    }

    const V1: &str = "Beginning July 1, the local sales and use tax rate increase of 0.25% takes effect \
                      for all retailers in the county. Report the new rate on the revised quarterly return.";
    const V2: &str = "Beginning October 1, the local sales and use tax rate increase of 0.50% takes effect \
                      for all retailers in the county. Report the new rate on the revised quarterly return.";

    #[tokio::test]
    async fn test_unchanged_content_is_recorded_once() {
        let h = harness().await;
        let mut server = Server::new_async().await;
        let _page = server
            .mock("GET", "/bulletins/rate.html")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(page(V1))
            .expect(2)
            .create_async()
            .await;
        let url = format!("{}/bulletins/rate.html", server.url());

        let first = h.orchestrator.process_url(&url).await;
        let second = h.orchestrator.process_url(&url).await;

        assert!(matches!(first, UrlOutcome::Done { diff_written: false, .. }));
        assert_eq!(second, UrlOutcome::Skipped(SkipReason::Unchanged));
        assert_eq!(h.db.count("documents").await.unwrap(), 1);
        assert_eq!(h.db.count("snapshots").await.unwrap(), 1);
        assert_eq!(h.db.count("diffs").await.unwrap(), 0);
        assert_eq!(h.db.count("seen_urls").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_changed_content_writes_diff() {
        let h = harness().await;
        let mut server = Server::new_async().await;
        let url = format!("{}/bulletins/rate.html", server.url());

        let v1 = server
            .mock("GET", "/bulletins/rate.html")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(page(V1))
            .create_async()
            .await;
        let first = h.orchestrator.process_url(&url).await;
        v1.remove_async().await;

        let _v2 = server
            .mock("GET", "/bulletins/rate.html")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(page(V2))
            .create_async()
            .await;
        let second = h.orchestrator.process_url(&url).await;

        let UrlOutcome::Done {
            snapshot_id: first_snapshot,
            ..
        } = first
        else {
            panic!("first fetch not recorded: {first:?}");
        };
        let UrlOutcome::Done {
            snapshot_id,
            diff_written,
            ..
        } = second
        else {
            panic!("second fetch not recorded: {second:?}");
        };
        assert!(diff_written);

        let (prev, diff) = h.db.get_diff(snapshot_id).await.unwrap().unwrap();
        assert_eq!(prev, Some(first_snapshot));
        assert!(diff.lines().any(|l| l.starts_with("- ")));
        assert!(diff.lines().any(|l| l.starts_with("+ ")));

        let (topic, score, effective, _) = h.db.get_snapshot(snapshot_id).await.unwrap().unwrap();
        assert_eq!(topic, "Rates");
        assert!(score >= 4);
        assert_eq!(effective, None);
    }

    #[tokio::test]
    async fn test_failed_diff_still_records_seen_hash() {
        let dir = tempdir().unwrap();
        let db = open_db(&dir).await;
        let store = Arc::new(FailingDiffStore {
            inner: db.clone(),
            fail_diff: AtomicBool::new(false),
        });
        let orchestrator = orchestrator_over(store.clone(), &dir);

        let mut server = Server::new_async().await;
        let url = format!("{}/bulletins/rate.html", server.url());

        let v1 = server
            .mock("GET", "/bulletins/rate.html")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(page(V1))
            .create_async()
            .await;
        let first = orchestrator.process_url(&url).await;
        assert!(matches!(first, UrlOutcome::Done { .. }));
        v1.remove_async().await;

        let _v2 = server
            .mock("GET", "/bulletins/rate.html")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(page(V2))
            .expect(2)
            .create_async()
            .await;

        store.fail_diff.store(true, Ordering::SeqCst);
        let second = orchestrator.process_url(&url).await;
        assert!(matches!(second, UrlOutcome::Failed { stage: Stage::Diffing, .. }));

        let third = orchestrator.process_url(&url).await;
        assert_eq!(third, UrlOutcome::Skipped(SkipReason::Unchanged));

        assert_eq!(db.count("documents").await.unwrap(), 2);
        assert_eq!(db.count("snapshots").await.unwrap(), 2);
        assert_eq!(db.count("diffs").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_batch() {
        let h = harness().await;
        let mut server = Server::new_async().await;
        let _ok = server
            .mock("GET", "/ok.html")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(page(V1))
            .create_async()
            .await;
        let _gone = server.mock("GET", "/gone.html").with_status(404).create_async().await;
        let _broken = server.mock("GET", "/broken.html").with_status(500).create_async().await;
        let _image = server
            .mock("GET", "/seal.png")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body("png")
            .create_async()
            .await;
        let _empty = server
            .mock("GET", "/empty.html")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html><body></body></html>")
            .create_async()
            .await;

        let urls: Vec<String> = ["/broken.html", "/gone.html", "/seal.png", "/empty.html", "/ok.html"]
            .iter()
            .map(|p| format!("{}{}", server.url(), p))
            .collect();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let summary = h.orchestrator.run(&urls, 2, Some(tx)).await;

        assert_eq!(summary.done, 1);
        assert_eq!(summary.not_found, 1);
        assert_eq!(summary.unsupported_mime, 1);
        assert_eq!(summary.no_text, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total(), urls.len());

        let mut reported = 0;
        while let Ok((url, outcome)) = rx.try_recv() {
            if url.ends_with("/broken.html") {
                assert!(matches!(outcome, UrlOutcome::Failed { stage: Stage::Fetching, .. }));
            }
            reported += 1;
        }
        assert_eq!(reported, urls.len());

        // a fetch failure leaves no seen record
        assert_eq!(h.db.count("seen_urls").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_source_attribution() {
        let h = harness().await;
        let mut server = Server::new_async().await;
        let _page = server
            .mock("GET", "/taxes/notice.html")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(page(V1))
            .create_async()
            .await;

        let yaml = format!(
            "states:\n  - code: tx\n    hubs:\n      - name: Comptroller\n        url: \"{}/taxes/\"\n",
            server.url()
        );
        let sources = Arc::new(SourceRules::from_yaml_str(&yaml).unwrap());
        let orchestrator = h.orchestrator.with_sources(sources);

        let outcome = orchestrator
            .process_url(&format!("{}/taxes/notice.html", server.url()))
            .await;
        assert!(matches!(outcome, UrlOutcome::Done { .. }));
        assert_eq!(orchestrator.store().count("sources").await.unwrap(), 1);

        let mut rows = orchestrator
            .store()
            .execute_query("SELECT source_id FROM documents", libsql::params![])
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        let source_id: i64 = row.get(0).unwrap();
        assert!(source_id > 0);
    }
}
