//! Brain CRUD and the cascading deletes that keep the three stores aligned.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateBrainRequest {
    pub brain_name: String,
    #[serde(default)]
    pub deployment_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBrainRequest {
    #[serde(default)]
    pub brain_name: Option<String>,
    #[serde(default)]
    pub is_important: Option<bool>,
}

pub async fn create_brain(
    state: web::Data<AppState>,
    request: web::Json<CreateBrainRequest>,
) -> Result<HttpResponse, AppError> {
    if request.brain_name.trim().is_empty() {
        return Err(AppError::Validation("brain_name 파라미터가 필요합니다.".into()));
    }
    let brain = state
        .metadata
        .create_brain(&request.brain_name, request.deployment_type.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(brain))
}

pub async fn list_brains(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let brains = state.metadata.get_all_brains().await?;
    Ok(HttpResponse::Ok().json(brains))
}

pub async fn get_brain(
    state: web::Data<AppState>,
    brain_id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let brain = state.metadata.get_brain(*brain_id).await?;
    Ok(HttpResponse::Ok().json(brain))
}

pub async fn update_brain(
    state: web::Data<AppState>,
    brain_id: web::Path<i64>,
    request: web::Json<UpdateBrainRequest>,
) -> Result<HttpResponse, AppError> {
    if let Some(name) = request.brain_name.as_deref() {
        state.metadata.update_brain_name(*brain_id, name).await?;
    }
    if let Some(important) = request.is_important {
        state.metadata.set_brain_importance(*brain_id, important).await?;
    }
    let brain = state.metadata.get_brain(*brain_id).await?;
    Ok(HttpResponse::Ok().json(brain))
}

/// Deleting a brain cascades to everything it owns: graph content, the
/// vector collection, and all relational records.
pub async fn delete_brain(
    state: web::Data<AppState>,
    brain_id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let id = *brain_id;
    let brain_key = id.to_string();

    state.graph.delete_by_brain(&brain_key).await?;
    if let Err(e) = state.vectors.delete_collection(&brain_key).await {
        // A brain that never ingested anything has no collection.
        warn!("Vector collection cleanup for brain {id}: {e}");
    }
    state.metadata.delete_brain(id).await?;

    info!("✅ Brain {id} deleted with all owned data");
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "브레인과 모든 관련 데이터가 삭제되었습니다.",
        "brain_id": id,
    })))
}

/// Remove one source's knowledge from the brain: graph records whose
/// descriptions reference it, and every vector point carrying its id.
pub async fn delete_source_db(
    state: web::Data<AppState>,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse, AppError> {
    let (brain_id, source_id) = path.into_inner();
    let brain_key = brain_id.to_string();
    let source_key = source_id.to_string();

    state.graph.delete_by_source(&brain_key, &source_key).await?;
    state.vectors.delete_by_source(&brain_key, &source_key).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "소스 데이터가 삭제되었습니다.",
        "brain_id": brain_id,
        "source_id": source_id,
    })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/brains")
            .route("", web::post().to(create_brain))
            .route("", web::get().to(list_brains))
            .route("/{brain_id}", web::get().to(get_brain))
            .route("/{brain_id}", web::patch().to(update_brain))
            .route("/{brain_id}", web::delete().to(delete_brain))
            .route(
                "/{brain_id}/deleteDB/{source_id}",
                web::delete().to(delete_source_db),
            ),
    );
}
