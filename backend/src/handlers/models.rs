//! Local model management (Ollama daemon).

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use ai::OllamaService;

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PullModelRequest {
    pub name: String,
}

/// Models currently available on the daemon.
pub async fn list_models(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let service = OllamaService::new(&state.config.ollama_url, &state.config.ollama_model)?;
    if !service.is_ready().await {
        return Err(AppError::Llm(ai::LlmError::Unavailable(
            "Ollama 서버에 연결할 수 없습니다.".into(),
        )));
    }
    let models = service.list_models().await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "models": models })))
}

/// Pull a model onto the daemon.
pub async fn pull_model(
    state: web::Data<AppState>,
    request: web::Json<PullModelRequest>,
) -> Result<HttpResponse, AppError> {
    if request.name.trim().is_empty() {
        return Err(AppError::Validation("name 파라미터가 필요합니다.".into()));
    }
    let service = OllamaService::new(&state.config.ollama_url, &request.name)?;
    service.pull_model().await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "모델 다운로드 완료",
        "name": request.name,
    })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/models")
            .route("", web::get().to(list_models))
            .route("/pull", web::post().to(pull_model)),
    );
}
