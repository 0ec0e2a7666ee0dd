//! Chat sessions and messages.

use sqlx::Row;
use tracing::info;

use mindgraph_models::ReferencedNode;

use crate::db::MetadataStore;
use crate::errors::{DataError, DataResult};

#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionRecord {
    pub session_id: i64,
    pub session_name: String,
    pub created_at: String,
    pub brain_id: i64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ChatRecord {
    pub chat_id: i64,
    pub session_id: i64,
    pub is_ai: bool,
    pub message: String,
    pub referenced_nodes: Vec<ReferencedNode>,
    pub accuracy: f64,
}

fn chat_from_row(row: &sqlx::sqlite::SqliteRow) -> DataResult<ChatRecord> {
    let raw_nodes: Option<String> = row.try_get("referenced_nodes")?;
    let referenced_nodes = match raw_nodes {
        Some(raw) if !raw.is_empty() => serde_json::from_str(&raw)?,
        _ => Vec::new(),
    };
    Ok(ChatRecord {
        chat_id: row.try_get("chat_id")?,
        session_id: row.try_get::<Option<i64>, _>("session_id")?.unwrap_or_default(),
        is_ai: row.try_get::<i64, _>("is_ai")? != 0,
        message: row.try_get::<Option<String>, _>("message")?.unwrap_or_default(),
        referenced_nodes,
        accuracy: row.try_get::<Option<f64>, _>("accuracy")?.unwrap_or(0.0),
    })
}

impl MetadataStore {
    pub async fn create_session(
        &self,
        session_name: &str,
        brain_id: i64,
    ) -> DataResult<SessionRecord> {
        let created_at = Self::now();
        let mut txn = self.pool.begin().await?;
        let session_id = Self::next_content_id(&mut *txn).await?;
        sqlx::query(
            "INSERT INTO ChatSession (session_id, session_name, created_at, brain_id) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(session_name)
        .bind(&created_at)
        .bind(brain_id)
        .execute(&mut *txn)
        .await?;
        txn.commit().await?;

        Ok(SessionRecord {
            session_id,
            session_name: session_name.to_string(),
            created_at,
            brain_id,
        })
    }

    pub async fn get_session(&self, session_id: i64) -> DataResult<SessionRecord> {
        let row = sqlx::query("SELECT * FROM ChatSession WHERE session_id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DataError::NotFound(format!("session {session_id}")))?;
        Ok(SessionRecord {
            session_id: row.try_get("session_id")?,
            session_name: row
                .try_get::<Option<String>, _>("session_name")?
                .unwrap_or_default(),
            created_at: row.try_get::<Option<String>, _>("created_at")?.unwrap_or_default(),
            brain_id: row.try_get::<Option<i64>, _>("brain_id")?.unwrap_or_default(),
        })
    }

    pub async fn list_sessions_by_brain(&self, brain_id: i64) -> DataResult<Vec<SessionRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM ChatSession WHERE brain_id = ? ORDER BY session_id",
        )
        .bind(brain_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| {
                Ok(SessionRecord {
                    session_id: row.try_get("session_id")?,
                    session_name: row
                        .try_get::<Option<String>, _>("session_name")?
                        .unwrap_or_default(),
                    created_at: row
                        .try_get::<Option<String>, _>("created_at")?
                        .unwrap_or_default(),
                    brain_id: row.try_get::<Option<i64>, _>("brain_id")?.unwrap_or_default(),
                })
            })
            .collect()
    }

    pub async fn rename_session(&self, session_id: i64, new_name: &str) -> DataResult<()> {
        let result = sqlx::query("UPDATE ChatSession SET session_name = ? WHERE session_id = ?")
            .bind(new_name)
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DataError::NotFound(format!("session {session_id}")));
        }
        Ok(())
    }

    /// Delete the session and its message log together.
    pub async fn delete_session(&self, session_id: i64) -> DataResult<()> {
        let mut txn = self.pool.begin().await?;
        sqlx::query("DELETE FROM Chat WHERE session_id = ?")
            .bind(session_id)
            .execute(&mut *txn)
            .await?;
        let result = sqlx::query("DELETE FROM ChatSession WHERE session_id = ?")
            .bind(session_id)
            .execute(&mut *txn)
            .await?;
        txn.commit().await?;
        if result.rows_affected() == 0 {
            return Err(DataError::NotFound(format!("session {session_id}")));
        }
        Ok(())
    }

    /// Persist one chat turn; the chat id is minted by the shared counter
    /// inside the insert transaction. References are stored as JSON.
    pub async fn save_chat(
        &self,
        session_id: i64,
        is_ai: bool,
        message: &str,
        referenced_nodes: &[ReferencedNode],
        accuracy: f64,
    ) -> DataResult<i64> {
        let ref_json = if referenced_nodes.is_empty() {
            None
        } else {
            Some(serde_json::to_string(referenced_nodes)?)
        };

        let mut txn = self.pool.begin().await?;
        let chat_id = Self::next_content_id(&mut *txn).await?;
        sqlx::query(
            "INSERT INTO Chat (chat_id, session_id, is_ai, message, referenced_nodes, accuracy) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(chat_id)
        .bind(session_id)
        .bind(is_ai as i64)
        .bind(message)
        .bind(ref_json)
        .bind(accuracy)
        .execute(&mut *txn)
        .await?;
        txn.commit().await?;

        info!("💾 Saved chat {chat_id} (session {session_id}, is_ai={is_ai})");
        Ok(chat_id)
    }

    /// The session's messages in insertion order.
    pub async fn get_chat_list(&self, session_id: i64) -> DataResult<Vec<ChatRecord>> {
        let rows = sqlx::query("SELECT * FROM Chat WHERE session_id = ? ORDER BY chat_id")
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(chat_from_row).collect()
    }

    pub async fn delete_chat(&self, chat_id: i64) -> DataResult<()> {
        let result = sqlx::query("DELETE FROM Chat WHERE chat_id = ?")
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DataError::NotFound(format!("chat {chat_id}")));
        }
        Ok(())
    }

    pub async fn get_chat_by_id(&self, chat_id: i64) -> DataResult<ChatRecord> {
        let row = sqlx::query("SELECT * FROM Chat WHERE chat_id = ?")
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DataError::NotFound(format!("chat {chat_id}")))?;
        chat_from_row(&row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_store;
    use mindgraph_models::{ReferencedNode, SourceRef};

    #[tokio::test]
    async fn chat_ids_increase_with_insertion_order() {
        let (_dir, store) = test_store().await;
        let brain = store.create_brain("b", None).await.unwrap();
        let session = store.create_session("s", brain.brain_id).await.unwrap();

        let first = store
            .save_chat(session.session_id, false, "question", &[], 0.0)
            .await
            .unwrap();
        let second = store
            .save_chat(session.session_id, true, "answer", &[], 0.85)
            .await
            .unwrap();
        assert!(second > first);

        let log = store.get_chat_list(session.session_id).await.unwrap();
        assert_eq!(log.len(), 2);
        assert!(!log[0].is_ai);
        assert!(log[1].is_ai);
        assert!((log[1].accuracy - 0.85).abs() < 1e-9);
    }

    #[tokio::test]
    async fn referenced_nodes_round_trip_as_json() {
        let (_dir, store) = test_store().await;
        let brain = store.create_brain("b", None).await.unwrap();
        let session = store.create_session("s", brain.brain_id).await.unwrap();

        let references = vec![ReferencedNode {
            name: "Alice".into(),
            source_ids: vec![SourceRef {
                id: "7".into(),
                title: "memo".into(),
                original_sentences: vec![],
            }],
        }];
        let chat_id = store
            .save_chat(session.session_id, true, "answer", &references, 0.5)
            .await
            .unwrap();

        let chat = store.get_chat_by_id(chat_id).await.unwrap();
        assert_eq!(chat.referenced_nodes.len(), 1);
        assert_eq!(chat.referenced_nodes[0].name, "Alice");
        assert_eq!(chat.referenced_nodes[0].source_ids[0].id, "7");
    }

    #[tokio::test]
    async fn user_turns_store_empty_references() {
        let (_dir, store) = test_store().await;
        let brain = store.create_brain("b", None).await.unwrap();
        let session = store.create_session("s", brain.brain_id).await.unwrap();
        let chat_id = store
            .save_chat(session.session_id, false, "who is alice?", &[], 0.0)
            .await
            .unwrap();
        let chat = store.get_chat_by_id(chat_id).await.unwrap();
        assert!(chat.referenced_nodes.is_empty());
    }

    #[tokio::test]
    async fn delete_chat_removes_one_turn() {
        let (_dir, store) = test_store().await;
        let brain = store.create_brain("b", None).await.unwrap();
        let session = store.create_session("s", brain.brain_id).await.unwrap();
        let first = store
            .save_chat(session.session_id, false, "q", &[], 0.0)
            .await
            .unwrap();
        store.save_chat(session.session_id, true, "a", &[], 0.5).await.unwrap();

        store.delete_chat(first).await.unwrap();
        let log = store.get_chat_list(session.session_id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert!(log[0].is_ai);

        assert!(store.delete_chat(first).await.is_err());
    }

    #[tokio::test]
    async fn delete_session_removes_log() {
        let (_dir, store) = test_store().await;
        let brain = store.create_brain("b", None).await.unwrap();
        let session = store.create_session("s", brain.brain_id).await.unwrap();
        store
            .save_chat(session.session_id, false, "hi", &[], 0.0)
            .await
            .unwrap();

        store.delete_session(session.session_id).await.unwrap();
        assert!(store.get_session(session.session_id).await.is_err());
        assert!(store
            .get_chat_list(session.session_id)
            .await
            .unwrap()
            .is_empty());
    }
}
