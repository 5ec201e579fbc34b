//! libsql-backed document store

use chrono::Utc;
use libsql::{Connection, Row, Rows, Value, params};
use tracing::{debug, instrument};

use super::error::DbError;
use super::schema;
use super::{DocumentStore, NewDocument, NewSnapshot, PriorSnapshot};

const COUNTED_TABLES: [&str; 5] = ["sources", "documents", "snapshots", "diffs", "seen_urls"];

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn optional_text(row: &Row, idx: i32) -> Result<Option<String>, DbError> {
    match row.get_value(idx)? {
        Value::Null => Ok(None),
        Value::Text(text) => Ok(Some(text)),
        other => Err(DbError::Data(format!("Expected text in column {}, got {:?}", idx, other))),
    }
}

async fn first_id(mut rows: Rows, what: &str) -> Result<i64, DbError> {
    match rows.next().await {
        Ok(Some(row)) => row
            .get(0)
            .map_err(|e| DbError::Data(format!("Failed to read {} id: {}", what, e))),
        Ok(None) => Err(DbError::Data(format!("No id returned for {}", what))),
        Err(e) => Err(DbError::Data(format!("Failed to get {} id: {}", what, e))),
    }
}

/// Document database on a libsql connection
#[derive(Clone)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Wrap an open connection, creating tables as needed
    #[instrument(skip(conn))]
    pub async fn new(conn: Connection) -> Result<Self, DbError> {
        schema::initialize_schema(&conn).await?;
        Ok(Self { conn })
    }

    /// Open (or create) a local database file
    pub async fn new_from_path(path: &str) -> Result<Self, DbError> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DbError::Connection(format!("Failed to open database: {}", e)))?;

        let conn = db
            .connect()
            .map_err(|e| DbError::Connection(format!("Failed to connect to database: {}", e)))?;

        Self::new(conn).await
    }

    /// Execute a custom query with parameters
    pub async fn execute_query<P>(&self, sql: &str, params: P) -> Result<Rows, DbError>
    where
        P: libsql::params::IntoParams,
    {
        self.conn
            .query(sql, params)
            .await
            .map_err(|e| DbError::Query(format!("Failed to execute query: {}", e)))
    }

    /// Number of rows in one of the pipeline tables
    pub async fn count(&self, table: &str) -> Result<i64, DbError> {
        if !COUNTED_TABLES.contains(&table) {
            return Err(DbError::Query(format!("Unknown table: {}", table)));
        }
        let rows = self
            .execute_query(&format!("SELECT COUNT(*) FROM {}", table), params![])
            .await?;
        first_id(rows, table).await
    }

    /// Previous snapshot id and text of the diff recorded for `snapshot_id`
    pub async fn get_diff(&self, snapshot_id: i64) -> Result<Option<(Option<i64>, String)>, DbError> {
        let mut rows = self
            .execute_query(
                "SELECT prev_snapshot_id, diff_text FROM diffs WHERE snapshot_id = ?",
                params![snapshot_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let prev = match row.get_value(0)? {
                    Value::Integer(id) => Some(id),
                    _ => None,
                };
                let text: String = row.get(1)?;
                Ok(Some((prev, text)))
            }
            None => Ok(None),
        }
    }

    /// Topic, score, effective date and form id of a snapshot
    pub async fn get_snapshot(
        &self,
        snapshot_id: i64,
    ) -> Result<Option<(String, i64, Option<String>, Option<String>)>, DbError> {
        let mut rows = self
            .execute_query(
                "SELECT topic, score, effective_date, form_id FROM snapshots WHERE id = ?",
                params![snapshot_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some((row.get(0)?, row.get(1)?, optional_text(&row, 2)?, optional_text(&row, 3)?))),
            None => Ok(None),
        }
    }
}

impl DocumentStore for Database {
    async fn get_last_hash(&self, url: &str) -> Result<Option<String>, DbError> {
        let mut rows = self
            .conn
            .query("SELECT last_hash FROM seen_urls WHERE url = ?", params![url])
            .await
            .map_err(|e| DbError::Query(format!("Failed to get last hash: {}", e)))?;

        match rows.next().await {
            Ok(Some(row)) => optional_text(&row, 0),
            Ok(None) => Ok(None),
            Err(e) => Err(DbError::Data(format!("Failed to read last hash: {}", e))),
        }
    }

    async fn get_prev_doc_text(&self, url: &str) -> Result<Option<PriorSnapshot>, DbError> {
        let mut rows = self
            .conn
            .query(
                "SELECT s.id, d.normalized_text
                 FROM snapshots s
                 JOIN documents d ON d.id = s.document_id
                 WHERE d.url = ?
                 ORDER BY s.captured_at DESC, s.id DESC
                 LIMIT 1",
                params![url],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to get previous snapshot: {}", e)))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(PriorSnapshot {
                snapshot_id: row.get(0)?,
                text: optional_text(&row, 1)?.unwrap_or_default(),
            })),
            Ok(None) => Ok(None),
            Err(e) => Err(DbError::Data(format!("Failed to read previous snapshot: {}", e))),
        }
    }

    async fn touch_seen(&self, url: &str, hash: &str) -> Result<(), DbError> {
        self.conn
            .execute(
                "INSERT INTO seen_urls (url, last_hash, last_fetched) VALUES (?, ?, ?)
                 ON CONFLICT(url) DO UPDATE SET
                 last_hash = excluded.last_hash,
                 last_fetched = excluded.last_fetched",
                params![url, hash, now_millis()],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to touch seen url: {}", e)))?;

        debug!(url, hash, "Touched seen url");
        Ok(())
    }

    async fn insert_document(&self, doc: &NewDocument) -> Result<i64, DbError> {
        let rows = self
            .conn
            .query(
                "INSERT INTO documents
                 (source_id, url, raw_uri, normalized_text, content_hash, mime, pdf_revision, fetched_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                 RETURNING id",
                params![
                    doc.source_id,
                    doc.url.clone(),
                    doc.raw_uri.clone(),
                    doc.normalized_text.clone(),
                    doc.content_hash.clone(),
                    doc.mime.clone(),
                    doc.pdf_revision.clone(),
                    now_millis(),
                ],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to add document: {}", e)))?;

        first_id(rows, "document").await
    }

    async fn insert_snapshot(&self, snapshot: &NewSnapshot) -> Result<i64, DbError> {
        let rows = self
            .conn
            .query(
                "INSERT INTO snapshots
                 (document_id, title, topic, score, effective_date, form_id, captured_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 RETURNING id",
                params![
                    snapshot.document_id,
                    snapshot.title.clone(),
                    snapshot.topic.clone(),
                    i64::from(snapshot.score),
                    snapshot.effective_date.clone(),
                    snapshot.form_id.clone(),
                    now_millis(),
                ],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to add snapshot: {}", e)))?;

        first_id(rows, "snapshot").await
    }

    async fn insert_diff(&self, snapshot_id: i64, prev_snapshot_id: Option<i64>, diff_text: &str) -> Result<(), DbError> {
        self.conn
            .execute(
                "INSERT INTO diffs (snapshot_id, prev_snapshot_id, diff_text) VALUES (?, ?, ?)",
                params![snapshot_id, prev_snapshot_id, diff_text],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to add diff: {}", e)))?;
        Ok(())
    }

    async fn ensure_source(&self, jurisdiction: &str, name: &str, homepage: Option<&str>) -> Result<i64, DbError> {
        self.conn
            .execute(
                "INSERT INTO sources (jurisdiction, name, homepage) VALUES (?, ?, ?)
                 ON CONFLICT(jurisdiction, name) DO UPDATE SET
                 homepage = CASE
                     WHEN sources.homepage IS NULL OR sources.homepage = '' THEN excluded.homepage
                     ELSE sources.homepage
                 END",
                params![jurisdiction, name, homepage],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to upsert source: {}", e)))?;

        let rows = self
            .conn
            .query(
                "SELECT id FROM sources WHERE jurisdiction = ? AND name = ?",
                params![jurisdiction, name],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to get source: {}", e)))?;

        first_id(rows, "source").await
    }
}
