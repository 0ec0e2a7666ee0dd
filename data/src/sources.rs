//! Per-kind source tables.
//!
//! Each kind keeps its own table with prefixed columns; mixed-kind batch
//! lookups go through a UNION ALL across all five tables.

use std::collections::HashMap;

use sqlx::Row;
use tracing::info;

use mindgraph_models::SourceKind;

use crate::db::MetadataStore;
use crate::errors::{DataError, DataResult};

#[derive(Debug, Clone, serde::Serialize)]
pub struct SourceRecord {
    pub id: i64,
    pub title: String,
    pub content: Option<String>,
    pub path: Option<String>,
    pub kind: SourceKind,
    pub brain_id: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SourceMetrics {
    pub counts: HashMap<String, i64>,
    pub total: i64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct TitleHit {
    pub id: i64,
    pub title: String,
    pub kind: SourceKind,
}

/// Table name and column prefix for a kind.
pub(crate) fn table_for(kind: SourceKind) -> (&'static str, &'static str) {
    match kind {
        SourceKind::Pdf => ("Pdf", "pdf"),
        SourceKind::Txt => ("TextFile", "txt"),
        SourceKind::Md => ("MdFile", "md"),
        SourceKind::Docx => ("DocxFile", "docx"),
        SourceKind::Memo => ("Memo", "memo"),
    }
}

fn source_from_row(kind: SourceKind, row: &sqlx::sqlite::SqliteRow) -> DataResult<SourceRecord> {
    let (_, prefix) = table_for(kind);
    Ok(SourceRecord {
        id: row.try_get(format!("{prefix}_id").as_str())?,
        title: row
            .try_get::<Option<String>, _>(format!("{prefix}_title").as_str())?
            .unwrap_or_default(),
        content: row.try_get(format!("{prefix}_text").as_str())?,
        path: row.try_get(format!("{prefix}_path").as_str())?,
        kind,
        brain_id: row.try_get::<Option<i64>, _>("brain_id")?.unwrap_or_default(),
        created_at: row
            .try_get::<Option<String>, _>(format!("{prefix}_date").as_str())?
            .unwrap_or_default(),
    })
}

impl MetadataStore {
    /// Insert a source row, minting its id from the shared counter inside
    /// the same transaction.
    pub async fn create_source(
        &self,
        kind: SourceKind,
        title: &str,
        content: Option<&str>,
        path: Option<&str>,
        brain_id: i64,
    ) -> DataResult<SourceRecord> {
        let (table, prefix) = table_for(kind);
        let created_at = Self::now();

        let mut txn = self.pool.begin().await?;
        let id = Self::next_content_id(&mut *txn).await?;
        sqlx::query(&format!(
            "INSERT INTO {table} ({prefix}_id, {prefix}_title, {prefix}_date, {prefix}_path, {prefix}_text, type, brain_id) \
             VALUES (?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(id)
        .bind(title)
        .bind(&created_at)
        .bind(path)
        .bind(content)
        .bind(kind.as_str())
        .bind(brain_id)
        .execute(&mut *txn)
        .await?;
        txn.commit().await?;

        info!("✅ Created {kind} source {id} in brain {brain_id}");
        Ok(SourceRecord {
            id,
            title: title.to_string(),
            content: content.map(String::from),
            path: path.map(String::from),
            kind,
            brain_id,
            created_at,
        })
    }

    pub async fn get_source(&self, kind: SourceKind, id: i64) -> DataResult<SourceRecord> {
        let (table, prefix) = table_for(kind);
        let row = sqlx::query(&format!("SELECT * FROM {table} WHERE {prefix}_id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DataError::NotFound(format!("{kind} source {id}")))?;
        source_from_row(kind, &row)
    }

    pub async fn update_source(
        &self,
        kind: SourceKind,
        id: i64,
        title: Option<&str>,
        content: Option<&str>,
    ) -> DataResult<()> {
        let (table, prefix) = table_for(kind);
        if let Some(title) = title {
            sqlx::query(&format!(
                "UPDATE {table} SET {prefix}_title = ? WHERE {prefix}_id = ?"
            ))
            .bind(title)
            .bind(id)
            .execute(&self.pool)
            .await?;
        }
        if let Some(content) = content {
            sqlx::query(&format!(
                "UPDATE {table} SET {prefix}_text = ? WHERE {prefix}_id = ?"
            ))
            .bind(content)
            .bind(id)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    pub async fn delete_source(&self, kind: SourceKind, id: i64) -> DataResult<()> {
        let (table, prefix) = table_for(kind);
        let result = sqlx::query(&format!("DELETE FROM {table} WHERE {prefix}_id = ?"))
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DataError::NotFound(format!("{kind} source {id}")));
        }
        Ok(())
    }

    pub async fn list_sources_by_brain(
        &self,
        brain_id: i64,
        kind: SourceKind,
    ) -> DataResult<Vec<SourceRecord>> {
        let (table, prefix) = table_for(kind);
        let rows = sqlx::query(&format!(
            "SELECT * FROM {table} WHERE brain_id = ? ORDER BY {prefix}_id"
        ))
        .bind(brain_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(|row| source_from_row(kind, row)).collect()
    }

    /// Look up the kind of the source with this id, if any table holds it.
    pub async fn find_source_kind(&self, id: i64) -> DataResult<Option<SourceKind>> {
        for kind in SourceKind::ALL {
            let (table, prefix) = table_for(kind);
            let row = sqlx::query(&format!(
                "SELECT {prefix}_id FROM {table} WHERE {prefix}_id = ?"
            ))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
            if row.is_some() {
                return Ok(Some(kind));
            }
        }
        Ok(None)
    }

    /// Resolve a mixed-kind id batch to titles in one query.
    pub async fn get_titles_by_ids(&self, ids: &[i64]) -> DataResult<HashMap<i64, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT pdf_id  AS id, pdf_title  AS title FROM Pdf      WHERE pdf_id  IN ({placeholders}) \
             UNION ALL \
             SELECT txt_id  AS id, txt_title  AS title FROM TextFile WHERE txt_id  IN ({placeholders}) \
             UNION ALL \
             SELECT md_id   AS id, md_title   AS title FROM MdFile   WHERE md_id   IN ({placeholders}) \
             UNION ALL \
             SELECT docx_id AS id, docx_title AS title FROM DocxFile WHERE docx_id IN ({placeholders}) \
             UNION ALL \
             SELECT memo_id AS id, memo_title AS title FROM Memo     WHERE memo_id IN ({placeholders})"
        );

        let mut query = sqlx::query(&sql);
        for _ in 0..5 {
            for id in ids {
                query = query.bind(id);
            }
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut out = HashMap::new();
        for row in rows {
            let id: i64 = row.try_get("id")?;
            let title: Option<String> = row.try_get("title")?;
            out.insert(id, title.unwrap_or_default());
        }
        Ok(out)
    }

    /// Title search across every kind table of one brain.
    pub async fn search_titles_by_query(
        &self,
        query_text: &str,
        brain_id: i64,
    ) -> DataResult<Vec<TitleHit>> {
        let pattern = format!("%{query_text}%");
        let mut hits = Vec::new();
        for kind in SourceKind::ALL {
            let (table, prefix) = table_for(kind);
            let rows = sqlx::query(&format!(
                "SELECT {prefix}_id AS id, {prefix}_title AS title FROM {table} \
                 WHERE brain_id = ? AND {prefix}_title LIKE ? ORDER BY {prefix}_id"
            ))
            .bind(brain_id)
            .bind(&pattern)
            .fetch_all(&self.pool)
            .await?;
            for row in rows {
                hits.push(TitleHit {
                    id: row.try_get("id")?,
                    title: row.try_get::<Option<String>, _>("title")?.unwrap_or_default(),
                    kind,
                });
            }
        }
        hits.sort_by_key(|h| h.id);
        Ok(hits)
    }

    /// Per-kind source counts for one brain.
    pub async fn source_metrics(&self, brain_id: i64) -> DataResult<SourceMetrics> {
        let mut counts = HashMap::new();
        let mut total = 0;
        for kind in SourceKind::ALL {
            let (table, _) = table_for(kind);
            let row = sqlx::query(&format!(
                "SELECT COUNT(*) as count FROM {table} WHERE brain_id = ?"
            ))
            .bind(brain_id)
            .fetch_one(&self.pool)
            .await?;
            let count: i64 = row.try_get("count")?;
            counts.insert(kind.as_str().to_string(), count);
            total += count;
        }
        Ok(SourceMetrics { counts, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_store;

    #[tokio::test]
    async fn source_ids_are_unique_across_kinds() {
        let (_dir, store) = test_store().await;
        let brain = store.create_brain("b", None).await.unwrap();
        let memo = store
            .create_source(SourceKind::Memo, "m", Some("text"), None, brain.brain_id)
            .await
            .unwrap();
        let pdf = store
            .create_source(SourceKind::Pdf, "p", None, Some("/tmp/p.pdf"), brain.brain_id)
            .await
            .unwrap();
        assert_ne!(memo.id, pdf.id);
    }

    #[tokio::test]
    async fn titles_resolve_across_tables_in_one_call() {
        let (_dir, store) = test_store().await;
        let brain = store.create_brain("b", None).await.unwrap();
        let memo = store
            .create_source(SourceKind::Memo, "memo title", None, None, brain.brain_id)
            .await
            .unwrap();
        let md = store
            .create_source(SourceKind::Md, "md title", None, None, brain.brain_id)
            .await
            .unwrap();

        let titles = store.get_titles_by_ids(&[memo.id, md.id, 9999]).await.unwrap();
        assert_eq!(titles.get(&memo.id).unwrap(), "memo title");
        assert_eq!(titles.get(&md.id).unwrap(), "md title");
        assert!(!titles.contains_key(&9999));
    }

    #[tokio::test]
    async fn metrics_count_per_kind() {
        let (_dir, store) = test_store().await;
        let brain = store.create_brain("b", None).await.unwrap();
        for _ in 0..3 {
            store
                .create_source(SourceKind::Memo, "m", None, None, brain.brain_id)
                .await
                .unwrap();
        }
        store
            .create_source(SourceKind::Txt, "t", None, None, brain.brain_id)
            .await
            .unwrap();

        let metrics = store.source_metrics(brain.brain_id).await.unwrap();
        assert_eq!(metrics.counts["memo"], 3);
        assert_eq!(metrics.counts["txt"], 1);
        assert_eq!(metrics.total, 4);
    }

    #[tokio::test]
    async fn find_source_kind_scans_tables() {
        let (_dir, store) = test_store().await;
        let brain = store.create_brain("b", None).await.unwrap();
        let docx = store
            .create_source(SourceKind::Docx, "d", None, None, brain.brain_id)
            .await
            .unwrap();
        assert_eq!(
            store.find_source_kind(docx.id).await.unwrap(),
            Some(SourceKind::Docx)
        );
        assert_eq!(store.find_source_kind(12345).await.unwrap(), None);
    }

    #[tokio::test]
    async fn title_search_spans_kinds_and_scopes_by_brain() {
        let (_dir, store) = test_store().await;
        let brain = store.create_brain("b", None).await.unwrap();
        let other = store.create_brain("other", None).await.unwrap();
        store
            .create_source(SourceKind::Memo, "graph notes", None, None, brain.brain_id)
            .await
            .unwrap();
        store
            .create_source(SourceKind::Pdf, "graph paper", None, None, brain.brain_id)
            .await
            .unwrap();
        store
            .create_source(SourceKind::Memo, "graph elsewhere", None, None, other.brain_id)
            .await
            .unwrap();

        let hits = store.search_titles_by_query("graph", brain.brain_id).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.title.starts_with("graph")));

        let none = store.search_titles_by_query("missing", brain.brain_id).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn update_edits_title_and_content() {
        let (_dir, store) = test_store().await;
        let brain = store.create_brain("b", None).await.unwrap();
        let memo = store
            .create_source(SourceKind::Memo, "old", Some("old text"), None, brain.brain_id)
            .await
            .unwrap();
        store
            .update_source(SourceKind::Memo, memo.id, Some("new"), Some("new text"))
            .await
            .unwrap();
        let loaded = store.get_source(SourceKind::Memo, memo.id).await.unwrap();
        assert_eq!(loaded.title, "new");
        assert_eq!(loaded.content.as_deref(), Some("new text"));
    }
}
