//! Per-kind source CRUD.
//!
//! Sources arrive as JSON records (title/content/path); upload handling and
//! text extraction from binary formats live outside this service.

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use mindgraph_models::SourceKind;

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSourceRequest {
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    pub brain_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSourceRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

pub async fn create_source(
    state: web::Data<AppState>,
    kind: web::Data<SourceKind>,
    request: web::Json<CreateSourceRequest>,
) -> Result<HttpResponse, AppError> {
    if request.title.trim().is_empty() {
        return Err(AppError::Validation("title 파라미터가 필요합니다.".into()));
    }
    state.metadata.get_brain(request.brain_id).await?;
    let source = state
        .metadata
        .create_source(
            **kind,
            &request.title,
            request.content.as_deref(),
            request.path.as_deref(),
            request.brain_id,
        )
        .await?;
    Ok(HttpResponse::Ok().json(source))
}

pub async fn get_source(
    state: web::Data<AppState>,
    kind: web::Data<SourceKind>,
    id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let source = state.metadata.get_source(**kind, *id).await?;
    Ok(HttpResponse::Ok().json(source))
}

pub async fn update_source(
    state: web::Data<AppState>,
    kind: web::Data<SourceKind>,
    id: web::Path<i64>,
    request: web::Json<UpdateSourceRequest>,
) -> Result<HttpResponse, AppError> {
    state
        .metadata
        .update_source(**kind, *id, request.title.as_deref(), request.content.as_deref())
        .await?;
    let source = state.metadata.get_source(**kind, *id).await?;
    Ok(HttpResponse::Ok().json(source))
}

/// Delete the metadata row and the knowledge extracted from this source.
pub async fn delete_source(
    state: web::Data<AppState>,
    kind: web::Data<SourceKind>,
    id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let source = state.metadata.get_source(**kind, *id).await?;
    let brain_key = source.brain_id.to_string();
    let source_key = source.id.to_string();

    state.graph.delete_by_source(&brain_key, &source_key).await?;
    if let Err(e) = state.vectors.delete_by_source(&brain_key, &source_key).await {
        // The brain may never have ingested anything, in which case there is
        // no collection and nothing to delete.
        tracing::warn!("Vector cleanup for source {source_key}: {e}");
    }
    state.metadata.delete_source(**kind, *id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "소스가 삭제되었습니다.",
        "id": *id,
    })))
}

pub async fn list_sources(
    state: web::Data<AppState>,
    kind: web::Data<SourceKind>,
    brain_id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let sources = state.metadata.list_sources_by_brain(*brain_id, **kind).await?;
    Ok(HttpResponse::Ok().json(sources))
}

fn kind_scope(path: &str, kind: SourceKind) -> actix_web::Scope {
    web::scope(path)
        .app_data(web::Data::new(kind))
        .route("", web::post().to(create_source))
        .route("/{id}", web::get().to(get_source))
        .route("/{id}", web::put().to(update_source))
        .route("/{id}", web::delete().to(delete_source))
        .route("/brain/{brain_id}", web::get().to(list_sources))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(kind_scope("/pdfs", SourceKind::Pdf))
        .service(kind_scope("/textfiles", SourceKind::Txt))
        .service(kind_scope("/mds", SourceKind::Md))
        .service(kind_scope("/docxs", SourceKind::Docx))
        .service(kind_scope("/memos", SourceKind::Memo));
}
