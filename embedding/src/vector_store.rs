//! Per-brain vector index on Qdrant.
//!
//! Collections are keyed `brain_{brain_id}` with cosine metric and the
//! encoder's dimension. The point payload is the only source of truth for
//! cross-store joins; points whose payload no longer resolves are treated as
//! orphans and skipped on read.

use qdrant_client::prelude::*;
use qdrant_client::qdrant::{
    value::Kind, vectors_config::Config, Condition, CreateCollection, Distance, Filter,
    PointStruct, SearchPoints, VectorParams, VectorsConfig,
};
use serde_json::{Map, Value as JsonValue};
use tracing::{info, warn};

use mindgraph_models::{SearchHit, VectorPointRecord};

use crate::encoder::EMBEDDING_DIM;
use crate::errors::VectorError;

type Result<T> = std::result::Result<T, VectorError>;

/// Search hits plus the scalar retrieval-quality for the whole result set.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub hits: Vec<SearchHit>,
    /// Mean of the top-k cosine scores, normalized to [0, 1]. 0 when empty.
    pub quality: f64,
}

pub struct VectorStore {
    client: QdrantClient,
}

impl VectorStore {
    pub fn new(url: &str) -> Result<Self> {
        let client = QdrantClient::from_url(url)
            .build()
            .map_err(|e| VectorError::Backend(e.to_string()))?;
        info!("🔷 Qdrant client initialized for {url}");
        Ok(Self { client })
    }

    pub fn collection_name(brain_id: &str) -> String {
        format!("brain_{brain_id}")
    }

    /// Idempotent create with cosine metric and the encoder dimension.
    pub async fn ensure_collection(&self, brain_id: &str) -> Result<()> {
        let name = Self::collection_name(brain_id);
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| VectorError::Backend(e.to_string()))?
            .collections;
        if collections.iter().any(|c| c.name == name) {
            return Ok(());
        }

        let req = CreateCollection {
            collection_name: name.clone(),
            vectors_config: Some(VectorsConfig {
                config: Some(Config::Params(VectorParams {
                    size: EMBEDDING_DIM as u64,
                    distance: Distance::Cosine.into(),
                    ..Default::default()
                })),
            }),
            ..Default::default()
        };
        self.client
            .create_collection(&req)
            .await
            .map_err(|e| VectorError::Backend(e.to_string()))?;
        info!("✅ Created vector collection {name}");
        Ok(())
    }

    /// Upsert points; an existing id has its vector and payload replaced.
    pub async fn upsert(&self, brain_id: &str, points: Vec<VectorPointRecord>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        let name = Self::collection_name(brain_id);
        let qpoints: Vec<PointStruct> = points
            .into_iter()
            .map(|p| {
                let mut payload = Map::new();
                payload.insert("name".into(), JsonValue::String(p.payload.name));
                payload.insert("description".into(), JsonValue::String(p.payload.description));
                payload.insert("source_id".into(), JsonValue::String(p.payload.source_id));
                payload.insert("brain_id".into(), JsonValue::String(p.payload.brain_id));
                payload.insert("format_index".into(), JsonValue::from(p.payload.format_index));
                PointStruct::new(p.id.to_string(), p.vector, payload)
            })
            .collect();

        self.client
            .upsert_points_blocking(name, None, qpoints, None)
            .await
            .map_err(|e| VectorError::Backend(e.to_string()))?;
        Ok(())
    }

    /// Top-k cosine search with retrieval quality.
    pub async fn search(&self, brain_id: &str, vector: Vec<f32>, k: usize) -> Result<SearchOutcome> {
        let name = Self::collection_name(brain_id);
        let response = self
            .client
            .search_points(&SearchPoints {
                collection_name: name,
                vector,
                limit: k as u64,
                with_payload: Some(true.into()),
                ..Default::default()
            })
            .await
            .map_err(|e| VectorError::Backend(e.to_string()))?;

        let mut hits = Vec::new();
        let mut scores = Vec::new();
        for point in response.result {
            let Some(node_name) = payload_str(&point.payload, "name") else {
                warn!("⚠️  Skipping vector point with no name payload");
                continue;
            };
            hits.push(SearchHit {
                name: node_name,
                description: payload_str(&point.payload, "description").unwrap_or_default(),
                source_id: payload_str(&point.payload, "source_id").unwrap_or_default(),
                score: point.score,
            });
            scores.push(point.score);
        }

        Ok(SearchOutcome {
            quality: quality_from_scores(&scores),
            hits,
        })
    }

    /// Remove every point whose payload carries this source id.
    pub async fn delete_by_source(&self, brain_id: &str, source_id: &str) -> Result<()> {
        let name = Self::collection_name(brain_id);
        let filter = Filter::must([Condition::matches("source_id", source_id.to_string())]);
        self.client
            .delete_points_blocking(name, None, &filter.into(), None)
            .await
            .map_err(|e| VectorError::Backend(e.to_string()))?;
        info!("✅ Deleted vector points for source {source_id} in brain {brain_id}");
        Ok(())
    }

    pub async fn delete_collection(&self, brain_id: &str) -> Result<()> {
        let name = Self::collection_name(brain_id);
        self.client
            .delete_collection(&name)
            .await
            .map_err(|e| VectorError::Backend(e.to_string()))?;
        info!("✅ Dropped vector collection {name}");
        Ok(())
    }
}

fn payload_str(
    payload: &std::collections::HashMap<String, qdrant_client::qdrant::Value>,
    key: &str,
) -> Option<String> {
    payload.get(key).and_then(|v| match &v.kind {
        Some(Kind::StringValue(s)) => Some(s.clone()),
        _ => None,
    })
}

/// Mean of raw cosine scores mapped from [-1, 1] onto [0, 1].
pub fn quality_from_scores(scores: &[f32]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let mean = scores.iter().map(|s| *s as f64).sum::<f64>() / scores.len() as f64;
    ((mean + 1.0) / 2.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindgraph_models::VectorPayload;
    use uuid::Uuid;

    #[test]
    fn quality_is_zero_for_empty_results() {
        assert_eq!(quality_from_scores(&[]), 0.0);
    }

    #[test]
    fn quality_normalizes_cosine_range() {
        assert!((quality_from_scores(&[1.0, 1.0]) - 1.0).abs() < 1e-9);
        assert!((quality_from_scores(&[0.0]) - 0.5).abs() < 1e-9);
        assert!((quality_from_scores(&[-1.0]) - 0.0).abs() < 1e-9);
        let q = quality_from_scores(&[0.8, 0.6]);
        assert!(q > 0.8 && q < 0.9);
    }

    #[test]
    fn collection_names_are_brain_scoped() {
        assert_eq!(VectorStore::collection_name("42"), "brain_42");
    }

    // Integration tests below need a running Qdrant at QDRANT_URL.

    #[tokio::test]
    #[ignore]
    async fn upsert_search_delete_round_trip() {
        let store = VectorStore::new("http://localhost:6334").unwrap();
        store.ensure_collection("test_vs").await.unwrap();

        let point = VectorPointRecord {
            id: Uuid::new_v4(),
            vector: vec![0.1; EMBEDDING_DIM],
            payload: VectorPayload {
                name: "Alice".into(),
                description: "Alice is an engineer.".into(),
                source_id: "7".into(),
                brain_id: "test_vs".into(),
                format_index: 0,
            },
        };
        store.upsert("test_vs", vec![point]).await.unwrap();

        let outcome = store.search("test_vs", vec![0.1; EMBEDDING_DIM], 5).await.unwrap();
        assert_eq!(outcome.hits.len(), 1);
        assert_eq!(outcome.hits[0].name, "Alice");
        assert!(outcome.quality > 0.0);

        store.delete_by_source("test_vs", "7").await.unwrap();
        let outcome = store.search("test_vs", vec![0.1; EMBEDDING_DIM], 5).await.unwrap();
        assert!(outcome.hits.is_empty());

        store.delete_collection("test_vs").await.unwrap();
    }
}
