//! Ingestion coordinator: text → extractor → graph store → vector index.
//!
//! The graph transaction commits before any vector write. If the vector
//! upsert then fails, the call reports partial success instead of rolling
//! back; a later re-ingest restores the missing points.

use std::collections::HashSet;

use tracing::{error, info};

use ai::{Backend, LlmExtractor};
use mindgraph_models::{ProcessTextRequest, ProcessTextResponse};

use crate::errors::AppError;
use crate::state::AppState;

pub async fn process_text(
    state: &AppState,
    request: ProcessTextRequest,
) -> Result<ProcessTextResponse, AppError> {
    validate(&request)?;

    let brain_id = &request.brain_id;
    let source_id = &request.source_id;
    info!("📄 Ingesting source {source_id} into brain {brain_id}");

    state.vectors.ensure_collection(brain_id).await?;

    // Absent model selects the rule-based extractor.
    let extraction = match request.model.as_deref() {
        None | Some("") => {
            extractor::extract_graph_components(
                &request.text,
                brain_id,
                source_id,
                &state.embedder,
            )
            .await?
        }
        Some(tag) => {
            let backend = Backend::parse(tag)
                .ok_or_else(|| AppError::Validation(format!("지원하지 않는 모델: {tag}")))?;
            let llm = state.llm_for(backend, None)?;
            LlmExtractor::new(llm, state.embedder.clone())
                .extract(&request.text, brain_id, source_id)
                .await?
        }
    };

    // Graph write happens-before vector writes.
    state
        .graph
        .upsert_nodes_edges(brain_id, &extraction.nodes, &extraction.edges)
        .await?;

    // Points already written in this call are never re-upserted.
    let mut written: HashSet<uuid::Uuid> = HashSet::new();
    let fresh_points: Vec<_> = extraction
        .points
        .into_iter()
        .filter(|p| written.insert(p.id))
        .collect();

    let message = match state.vectors.upsert(brain_id, fresh_points).await {
        Ok(()) => "텍스트 처리 완료, 그래프(노드와 엣지)가 생성되었고 벡터 DB에 임베딩되었습니다."
            .to_string(),
        Err(e) => {
            // Degraded state: graph-only nodes until the next ingest sweep.
            error!("⚠️  Vector upsert failed after graph commit: {e}");
            "텍스트 처리 완료 (부분 성공): 그래프는 저장되었으나 벡터 임베딩 저장에 실패했습니다."
                .to_string()
        }
    };

    Ok(ProcessTextResponse {
        message,
        nodes: extraction.nodes,
        edges: extraction.edges,
    })
}

fn validate(request: &ProcessTextRequest) -> Result<(), AppError> {
    if request.text.trim().is_empty() {
        return Err(AppError::Validation("text 파라미터가 필요합니다.".into()));
    }
    if request.source_id.is_empty() {
        return Err(AppError::Validation("source_id 파라미터가 필요합니다.".into()));
    }
    if request.brain_id.is_empty() {
        return Err(AppError::Validation("brain_id 파라미터가 필요합니다.".into()));
    }
    Ok(())
}

// Scenario tests below need live Neo4j and Qdrant plus the embedding models.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use embedding::{Embedder, VectorStore};
    use graph_rag::GraphStore;
    use mindgraph_config::AppConfig;

    async fn live_state(dir: &tempfile::TempDir) -> AppState {
        let config = AppConfig::from_env();
        let metadata = data::MetadataStore::connect(&dir.path().join("sqlite.db"))
            .await
            .expect("metadata store");
        let graph = GraphStore::connect(&config.neo4j_uri, &config.neo4j_user, &config.neo4j_password)
            .await
            .expect("neo4j");
        let vectors = VectorStore::new(&config.qdrant_url).expect("qdrant");
        let embedder = Embedder::new(&config.embedding_model_ko, &config.embedding_model_en);
        AppState { config, metadata, graph, vectors, embedder }
    }

    fn request(brain: &str, source: &str) -> ProcessTextRequest {
        ProcessTextRequest {
            text: "Alice is an engineer. Alice works at Acme.".to_string(),
            source_id: source.to_string(),
            brain_id: brain.to_string(),
            model: None,
        }
    }

    #[test]
    fn missing_fields_are_rejected() {
        let mut bad = request("42", "7");
        bad.text = "  ".into();
        assert!(matches!(validate(&bad), Err(AppError::Validation(_))));

        let mut bad = request("42", "7");
        bad.source_id.clear();
        assert!(matches!(validate(&bad), Err(AppError::Validation(_))));

        let mut bad = request("42", "7");
        bad.brain_id.clear();
        assert!(matches!(validate(&bad), Err(AppError::Validation(_))));

        assert!(validate(&request("42", "7")).is_ok());
    }

    #[tokio::test]
    #[ignore]
    async fn reingest_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let state = live_state(&dir).await;
        let brain = "ingest_test_s4";
        state.graph.delete_by_brain(brain).await.unwrap();

        let first = process_text(&state, request(brain, "7")).await.unwrap();
        let second = process_text(&state, request(brain, "7")).await.unwrap();
        assert_eq!(first.nodes.len(), second.nodes.len());

        // Each node's provenance must not duplicate across ingests.
        for node in &second.nodes {
            let stored = state.graph.get_descriptions(&node.name, brain).await.unwrap();
            let mut texts: Vec<&str> = stored.iter().map(|d| d.description.as_str()).collect();
            texts.sort_unstable();
            let before = texts.len();
            texts.dedup();
            assert_eq!(before, texts.len(), "node {} has duplicate descriptions", node.name);
        }
    }

    #[tokio::test]
    #[ignore]
    async fn source_deletion_cascades_to_both_stores() {
        let dir = tempfile::tempdir().unwrap();
        let state = live_state(&dir).await;
        let brain = "ingest_test_s3";
        state.graph.delete_by_brain(brain).await.unwrap();

        process_text(&state, request(brain, "7")).await.unwrap();
        state.graph.delete_by_source(brain, "7").await.unwrap();
        state.vectors.delete_by_source(brain, "7").await.unwrap();

        let projection = state.graph.get_graph(brain).await.unwrap();
        assert!(projection.nodes.is_empty());
        assert!(projection.links.is_empty());

        let vec = state.embedder.encode("Alice").await.unwrap();
        let outcome = state.vectors.search(brain, vec, 5).await.unwrap();
        assert!(outcome.hits.is_empty());
    }
}
