//! Chat session CRUD and chat-log reads.

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub session_name: String,
    pub brain_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct RenameSessionRequest {
    pub session_name: String,
}

pub async fn create_session(
    state: web::Data<AppState>,
    request: web::Json<CreateSessionRequest>,
) -> Result<HttpResponse, AppError> {
    if request.session_name.trim().is_empty() {
        return Err(AppError::Validation("session_name 파라미터가 필요합니다.".into()));
    }
    state.metadata.get_brain(request.brain_id).await?;
    let session = state
        .metadata
        .create_session(&request.session_name, request.brain_id)
        .await?;
    Ok(HttpResponse::Ok().json(session))
}

pub async fn list_sessions(
    state: web::Data<AppState>,
    brain_id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let sessions = state.metadata.list_sessions_by_brain(*brain_id).await?;
    Ok(HttpResponse::Ok().json(sessions))
}

pub async fn rename_session(
    state: web::Data<AppState>,
    session_id: web::Path<i64>,
    request: web::Json<RenameSessionRequest>,
) -> Result<HttpResponse, AppError> {
    state
        .metadata
        .rename_session(*session_id, &request.session_name)
        .await?;
    let session = state.metadata.get_session(*session_id).await?;
    Ok(HttpResponse::Ok().json(session))
}

pub async fn delete_session(
    state: web::Data<AppState>,
    session_id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    state.metadata.delete_session(*session_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "세션과 대화 기록이 삭제되었습니다.",
        "session_id": *session_id,
    })))
}

/// The session's ordered message log.
pub async fn get_chat_list(
    state: web::Data<AppState>,
    session_id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    state.metadata.get_session(*session_id).await?;
    let chats = state.metadata.get_chat_list(*session_id).await?;
    Ok(HttpResponse::Ok().json(chats))
}

pub async fn get_chat(
    state: web::Data<AppState>,
    chat_id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let chat = state.metadata.get_chat_by_id(*chat_id).await?;
    Ok(HttpResponse::Ok().json(chat))
}

pub async fn delete_chat(
    state: web::Data<AppState>,
    chat_id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    state.metadata.delete_chat(*chat_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "대화가 삭제되었습니다.",
        "chat_id": *chat_id,
    })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/chatsession")
            .route("", web::post().to(create_session))
            .route("/{brain_id}", web::get().to(list_sessions))
            .route("/{session_id}", web::patch().to(rename_session))
            .route("/{session_id}", web::delete().to(delete_session)),
    )
    .service(
        web::scope("/chat")
            .route("/message/{chat_id}", web::get().to(get_chat))
            .route("/message/{chat_id}", web::delete().to(delete_chat))
            .route("/{session_id}", web::get().to(get_chat_list)),
    );
}
