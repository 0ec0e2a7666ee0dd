//! Brain (workspace) records.

use sqlx::Row;
use tracing::info;

use mindgraph_models::SourceKind;

use crate::db::MetadataStore;
use crate::errors::{DataError, DataResult};

#[derive(Debug, Clone, serde::Serialize)]
pub struct BrainRecord {
    pub brain_id: i64,
    pub brain_name: String,
    pub created_at: String,
    pub is_important: bool,
    pub deployment_type: Option<String>,
}

fn brain_from_row(row: &sqlx::sqlite::SqliteRow) -> DataResult<BrainRecord> {
    Ok(BrainRecord {
        brain_id: row.try_get("brain_id")?,
        brain_name: row.try_get("brain_name")?,
        created_at: row.try_get::<Option<String>, _>("created_at")?.unwrap_or_default(),
        is_important: row.try_get::<i64, _>("is_important")? != 0,
        deployment_type: row.try_get("deployment_type")?,
    })
}

impl MetadataStore {
    pub async fn create_brain(
        &self,
        brain_name: &str,
        deployment_type: Option<&str>,
    ) -> DataResult<BrainRecord> {
        let created_at = Self::now();
        let row = sqlx::query(
            "INSERT INTO Brain (brain_name, created_at, is_important, deployment_type) \
             VALUES (?, ?, 0, ?) RETURNING brain_id",
        )
        .bind(brain_name)
        .bind(&created_at)
        .bind(deployment_type)
        .fetch_one(&self.pool)
        .await?;
        let brain_id: i64 = row.try_get("brain_id")?;
        info!("✅ Created brain {brain_id} ({brain_name})");

        Ok(BrainRecord {
            brain_id,
            brain_name: brain_name.to_string(),
            created_at,
            is_important: false,
            deployment_type: deployment_type.map(String::from),
        })
    }

    pub async fn get_brain(&self, brain_id: i64) -> DataResult<BrainRecord> {
        let row = sqlx::query("SELECT * FROM Brain WHERE brain_id = ?")
            .bind(brain_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DataError::NotFound(format!("brain {brain_id}")))?;
        brain_from_row(&row)
    }

    pub async fn get_all_brains(&self) -> DataResult<Vec<BrainRecord>> {
        let rows = sqlx::query("SELECT * FROM Brain ORDER BY brain_id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(brain_from_row).collect()
    }

    pub async fn update_brain_name(&self, brain_id: i64, new_name: &str) -> DataResult<()> {
        let result = sqlx::query("UPDATE Brain SET brain_name = ? WHERE brain_id = ?")
            .bind(new_name)
            .bind(brain_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DataError::NotFound(format!("brain {brain_id}")));
        }
        Ok(())
    }

    pub async fn set_brain_importance(&self, brain_id: i64, important: bool) -> DataResult<()> {
        let result = sqlx::query("UPDATE Brain SET is_important = ? WHERE brain_id = ?")
            .bind(important as i64)
            .bind(brain_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DataError::NotFound(format!("brain {brain_id}")));
        }
        Ok(())
    }

    /// Remove the brain row and every owned relational record: sources of
    /// all kinds, chat sessions and their messages. Graph and vector cleanup
    /// belong to their own stores and happen at the orchestration layer.
    pub async fn delete_brain(&self, brain_id: i64) -> DataResult<()> {
        let mut txn = self.pool.begin().await?;

        for kind in SourceKind::ALL {
            let (table, _) = super::sources::table_for(kind);
            sqlx::query(&format!("DELETE FROM {table} WHERE brain_id = ?"))
                .bind(brain_id)
                .execute(&mut *txn)
                .await?;
        }
        sqlx::query(
            "DELETE FROM Chat WHERE session_id IN \
             (SELECT session_id FROM ChatSession WHERE brain_id = ?)",
        )
        .bind(brain_id)
        .execute(&mut *txn)
        .await?;
        sqlx::query("DELETE FROM ChatSession WHERE brain_id = ?")
            .bind(brain_id)
            .execute(&mut *txn)
            .await?;
        let result = sqlx::query("DELETE FROM Brain WHERE brain_id = ?")
            .bind(brain_id)
            .execute(&mut *txn)
            .await?;

        txn.commit().await?;
        if result.rows_affected() == 0 {
            return Err(DataError::NotFound(format!("brain {brain_id}")));
        }
        info!("✅ Deleted brain {brain_id} and owned records");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_store;
    use mindgraph_models::SourceKind;

    #[tokio::test]
    async fn create_get_rename_round_trip() {
        let (_dir, store) = test_store().await;
        let brain = store.create_brain("research", None).await.unwrap();
        assert!(!brain.is_important);

        store.update_brain_name(brain.brain_id, "renamed").await.unwrap();
        store.set_brain_importance(brain.brain_id, true).await.unwrap();

        let loaded = store.get_brain(brain.brain_id).await.unwrap();
        assert_eq!(loaded.brain_name, "renamed");
        assert!(loaded.is_important);
    }

    #[tokio::test]
    async fn missing_brain_is_not_found() {
        let (_dir, store) = test_store().await;
        assert!(matches!(
            store.get_brain(999).await,
            Err(DataError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_cascades_to_sources_sessions_and_chats() {
        let (_dir, store) = test_store().await;
        let brain = store.create_brain("doomed", None).await.unwrap();
        let source = store
            .create_source(SourceKind::Memo, "memo", Some("text"), None, brain.brain_id)
            .await
            .unwrap();
        let session = store.create_session("chat", brain.brain_id).await.unwrap();
        store
            .save_chat(session.session_id, false, "hello", &[], 0.0)
            .await
            .unwrap();

        store.delete_brain(brain.brain_id).await.unwrap();

        assert!(store.get_source(SourceKind::Memo, source.id).await.is_err());
        assert!(store.get_session(session.session_id).await.is_err());
        assert!(store
            .get_chat_list(session.session_id)
            .await
            .unwrap()
            .is_empty());
    }
}
