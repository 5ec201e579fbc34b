//! Table bootstrap for the document database
//!
//! Five tables: `sources`, `documents`, `snapshots`, `diffs` and
//! `seen_urls`. Documents, snapshots and diffs are append-only; only
//! `seen_urls` is upserted and `sources.homepage` backfilled.

use libsql::{Connection, params};

use super::error::DbError;

const TABLES: [(&str, &str); 5] = [
    (
        "sources",
        "CREATE TABLE IF NOT EXISTS sources (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            jurisdiction TEXT NOT NULL,
            name TEXT NOT NULL,
            homepage TEXT,
            UNIQUE (jurisdiction, name)
        )",
    ),
    (
        "documents",
        "CREATE TABLE IF NOT EXISTS documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_id INTEGER,
            url TEXT NOT NULL,
            raw_uri TEXT NOT NULL,
            normalized_text TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            mime TEXT NOT NULL,
            pdf_revision TEXT,
            fetched_at INTEGER NOT NULL,
            FOREIGN KEY (source_id) REFERENCES sources(id)
        )",
    ),
    (
        "snapshots",
        "CREATE TABLE IF NOT EXISTS snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            document_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            topic TEXT NOT NULL,
            score INTEGER NOT NULL,
            effective_date TEXT,
            form_id TEXT,
            captured_at INTEGER NOT NULL,
            FOREIGN KEY (document_id) REFERENCES documents(id)
        )",
    ),
    (
        "diffs",
        "CREATE TABLE IF NOT EXISTS diffs (
            snapshot_id INTEGER PRIMARY KEY,
            prev_snapshot_id INTEGER,
            diff_text TEXT NOT NULL,
            FOREIGN KEY (snapshot_id) REFERENCES snapshots(id),
            FOREIGN KEY (prev_snapshot_id) REFERENCES snapshots(id)
        )",
    ),
    (
        "seen_urls",
        "CREATE TABLE IF NOT EXISTS seen_urls (
            url TEXT PRIMARY KEY,
            last_hash TEXT NOT NULL,
            last_fetched INTEGER NOT NULL
        )",
    ),
];

const INDEXES: [&str; 3] = [
    "CREATE INDEX IF NOT EXISTS idx_documents_url ON documents(url)",
    "CREATE INDEX IF NOT EXISTS idx_snapshots_document_id ON snapshots(document_id)",
    "CREATE INDEX IF NOT EXISTS idx_snapshots_captured_at ON snapshots(captured_at)",
];

/// Initialize the database schema
pub async fn initialize_schema(conn: &Connection) -> Result<(), DbError> {
    for (table, ddl) in TABLES {
        conn.execute(ddl, params![])
            .await
            .map_err(|e| DbError::Schema(format!("Failed to create {} table: {}", table, e)))?;
    }

    for ddl in INDEXES {
        conn.execute(ddl, params![])
            .await
            .map_err(|e| DbError::Schema(format!("Failed to create index: {}", e)))?;
    }

    Ok(())
}
