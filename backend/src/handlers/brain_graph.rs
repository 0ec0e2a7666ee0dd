//! /brainGraph endpoints: ingestion, answering, and graph lookups.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::info;

use mindgraph_models::{AnswerRequest, ProcessTextRequest};

use crate::errors::AppError;
use crate::services::{answer, ingestion};
use crate::state::AppState;

/// Ingest a text against `(brain_id, source_id)`.
pub async fn process_text(
    state: web::Data<AppState>,
    request: web::Json<ProcessTextRequest>,
) -> Result<HttpResponse, AppError> {
    let response = ingestion::process_text(&state, request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// The retrieval-answer orchestrator entry point.
pub async fn answer(
    state: web::Data<AppState>,
    request: web::Json<AnswerRequest>,
) -> Result<HttpResponse, AppError> {
    let response = answer::answer(&state, request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Full graph projection for visualization.
pub async fn get_node_edge(
    state: web::Data<AppState>,
    brain_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    info!("getNodeEdge 호출됨 - brain_id: {brain_id}");
    let graph = state.graph.get_graph(&brain_id).await?;
    Ok(HttpResponse::Ok().json(graph))
}

#[derive(Debug, Deserialize)]
pub struct NodeQuery {
    pub node_name: String,
    pub brain_id: String,
}

/// All source ids referenced by one node's descriptions, with titles.
pub async fn get_source_ids(
    state: web::Data<AppState>,
    query: web::Query<NodeQuery>,
) -> Result<HttpResponse, AppError> {
    if query.node_name.is_empty() {
        return Err(AppError::Validation("node_name 파라미터가 필요합니다.".into()));
    }
    let descriptions = state.graph.get_descriptions(&query.node_name, &query.brain_id).await?;

    let mut ids: Vec<i64> = Vec::new();
    for record in &descriptions {
        if let Ok(id) = record.source_id.parse::<i64>() {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    let titles = state.metadata.get_titles_by_ids(&ids).await?;

    let body: Vec<serde_json::Value> = ids
        .into_iter()
        .map(|id| {
            serde_json::json!({
                "id": id.to_string(),
                "title": titles.get(&id).cloned().unwrap_or_default(),
            })
        })
        .collect();
    Ok(HttpResponse::Ok().json(body))
}

/// One node's description records.
pub async fn get_node_descriptions(
    state: web::Data<AppState>,
    query: web::Query<NodeQuery>,
) -> Result<HttpResponse, AppError> {
    let descriptions = state.graph.get_descriptions(&query.node_name, &query.brain_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "node_name": query.node_name,
        "brain_id": query.brain_id,
        "descriptions": descriptions,
        "descriptions_count": descriptions.len(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct SourceQuery {
    pub source_id: String,
    pub brain_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SourceContentQuery {
    pub source_id: i64,
}

/// Names of nodes produced by one source.
pub async fn get_nodes_by_source_id(
    state: web::Data<AppState>,
    query: web::Query<SourceQuery>,
) -> Result<HttpResponse, AppError> {
    let names = state.graph.get_nodes_by_source(&query.source_id, &query.brain_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "source_id": query.source_id,
        "nodes": names,
    })))
}

/// Edges between nodes produced by one source.
pub async fn get_edges_by_source_id(
    state: web::Data<AppState>,
    query: web::Query<SourceQuery>,
) -> Result<HttpResponse, AppError> {
    let edges = state.graph.get_edges_by_source(&query.source_id, &query.brain_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "source_id": query.source_id,
        "edges": edges,
    })))
}

/// Stored text of a source, resolved across the kind tables.
pub async fn get_source_content(
    state: web::Data<AppState>,
    query: web::Query<SourceContentQuery>,
) -> Result<HttpResponse, AppError> {
    let kind = state
        .metadata
        .find_source_kind(query.source_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("source {}", query.source_id)))?;
    let source = state.metadata.get_source(kind, query.source_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "source_id": source.id,
        "title": source.title,
        "type": kind.as_str(),
        "content": source.content.unwrap_or_default(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub brain_id: i64,
}

/// Title search across the brain's sources.
pub async fn search_titles(
    state: web::Data<AppState>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, AppError> {
    if query.q.trim().is_empty() {
        return Err(AppError::Validation("q 파라미터가 필요합니다.".into()));
    }
    let hits = state.metadata.search_titles_by_query(&query.q, query.brain_id).await?;
    Ok(HttpResponse::Ok().json(hits))
}

/// Per-kind source counts for one brain.
pub async fn get_source_data_metrics(
    state: web::Data<AppState>,
    brain_id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let metrics = state.metadata.source_metrics(*brain_id).await?;
    Ok(HttpResponse::Ok().json(metrics))
}

/// Total source count for one brain.
pub async fn source_count(
    state: web::Data<AppState>,
    brain_id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let metrics = state.metadata.source_metrics(*brain_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "count": metrics.total })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/brainGraph")
            .route("/process_text", web::post().to(process_text))
            .route("/answer", web::post().to(answer))
            .route("/getNodeEdge/{brain_id}", web::get().to(get_node_edge))
            .route("/getSourceIds", web::get().to(get_source_ids))
            .route("/getNodeDescriptions", web::get().to(get_node_descriptions))
            .route("/getNodesBySourceId", web::get().to(get_nodes_by_source_id))
            .route("/getEdgesBySourceId", web::get().to(get_edges_by_source_id))
            .route("/getSourceContent", web::get().to(get_source_content))
            .route("/searchTitles", web::get().to(search_titles))
            .route(
                "/getSourceDataMetrics/{brain_id}",
                web::get().to(get_source_data_metrics),
            )
            .route("/sourceCount/{brain_id}", web::get().to(source_count)),
    );
}
