//! Pool construction and schema initialization.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::errors::DataResult;

const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct MetadataStore {
    pub(crate) pool: SqlitePool,
}

impl MetadataStore {
    /// Open (creating if missing) the database file and initialize the
    /// schema. WAL journaling is enabled for concurrent readers.
    pub async fn connect(path: &Path) -> DataResult<Self> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))
            .unwrap_or_else(|_| SqliteConnectOptions::new().filename(path))
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        info!("✅ SQLite metadata store ready at {}", path.display());
        Ok(store)
    }

    async fn init_schema(&self) -> DataResult<()> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS Sequence (
                name  TEXT PRIMARY KEY,
                value INTEGER NOT NULL DEFAULT 0
            )",
            "INSERT OR IGNORE INTO Sequence (name, value) VALUES ('content_id', 0)",
            "CREATE TABLE IF NOT EXISTS Brain (
                brain_id        INTEGER PRIMARY KEY AUTOINCREMENT,
                brain_name      TEXT NOT NULL,
                created_at      TEXT,
                is_important    INTEGER NOT NULL DEFAULT 0,
                deployment_type TEXT
            )",
            "CREATE TABLE IF NOT EXISTS Pdf (
                pdf_id    INTEGER PRIMARY KEY,
                pdf_title TEXT,
                pdf_date  TEXT,
                pdf_path  TEXT,
                pdf_text  TEXT,
                type      TEXT,
                brain_id  INTEGER,
                FOREIGN KEY (brain_id) REFERENCES Brain(brain_id)
            )",
            "CREATE TABLE IF NOT EXISTS TextFile (
                txt_id    INTEGER PRIMARY KEY,
                txt_title TEXT,
                txt_date  TEXT,
                txt_path  TEXT,
                txt_text  TEXT,
                type      TEXT,
                brain_id  INTEGER,
                FOREIGN KEY (brain_id) REFERENCES Brain(brain_id)
            )",
            "CREATE TABLE IF NOT EXISTS MdFile (
                md_id    INTEGER PRIMARY KEY,
                md_title TEXT,
                md_date  TEXT,
                md_path  TEXT,
                md_text  TEXT,
                type     TEXT,
                brain_id INTEGER,
                FOREIGN KEY (brain_id) REFERENCES Brain(brain_id)
            )",
            "CREATE TABLE IF NOT EXISTS DocxFile (
                docx_id    INTEGER PRIMARY KEY,
                docx_title TEXT,
                docx_date  TEXT,
                docx_path  TEXT,
                docx_text  TEXT,
                type       TEXT,
                brain_id   INTEGER,
                FOREIGN KEY (brain_id) REFERENCES Brain(brain_id)
            )",
            "CREATE TABLE IF NOT EXISTS Memo (
                memo_id    INTEGER PRIMARY KEY,
                memo_title TEXT,
                memo_date  TEXT,
                memo_path  TEXT,
                memo_text  TEXT,
                is_source  INTEGER NOT NULL DEFAULT 0,
                type       TEXT,
                brain_id   INTEGER,
                FOREIGN KEY (brain_id) REFERENCES Brain(brain_id)
            )",
            "CREATE TABLE IF NOT EXISTS ChatSession (
                session_id   INTEGER PRIMARY KEY,
                session_name TEXT,
                created_at   TEXT,
                brain_id     INTEGER,
                FOREIGN KEY (brain_id) REFERENCES Brain(brain_id)
            )",
            "CREATE TABLE IF NOT EXISTS Chat (
                chat_id          INTEGER PRIMARY KEY,
                session_id       INTEGER,
                is_ai            INTEGER NOT NULL,
                message          TEXT,
                referenced_nodes TEXT,
                accuracy         REAL,
                FOREIGN KEY (session_id) REFERENCES ChatSession(session_id)
            )",
        ];
        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Increment and return the shared content counter. Must run inside the
    /// caller's transaction so the minted id commits with its row.
    pub(crate) async fn next_content_id<'e, E>(executor: E) -> DataResult<i64>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let row = sqlx::query(
            "UPDATE Sequence SET value = value + 1 WHERE name = 'content_id' RETURNING value",
        )
        .fetch_one(executor)
        .await?;
        Ok(row.try_get::<i64, _>("value")?)
    }

    pub(crate) fn now() -> String {
        chrono::Utc::now().to_rfc3339()
    }
}

#[cfg(test)]
pub(crate) async fn test_store() -> (tempfile::TempDir, MetadataStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = MetadataStore::connect(&dir.path().join("sqlite.db"))
        .await
        .expect("connect");
    (dir, store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counter_is_monotonic() {
        let (_dir, store) = super::test_store().await;
        let mut txn = store.pool.begin().await.unwrap();
        let a = MetadataStore::next_content_id(&mut *txn).await.unwrap();
        let b = MetadataStore::next_content_id(&mut *txn).await.unwrap();
        txn.commit().await.unwrap();
        assert_eq!(b, a + 1);
    }

    #[tokio::test]
    async fn schema_init_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sqlite.db");
        let _ = MetadataStore::connect(&path).await.unwrap();
        let _ = MetadataStore::connect(&path).await.unwrap();
    }
}
