//! Backend error type and the JSON error contract.
//!
//! Every surfaced error carries a stable numeric code, a human message and
//! the request path. The path is attached by the wrap_fn middleware in
//! `main`, which rebuilds the response from the typed error.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Graph(#[from] graph_rag::GraphError),

    #[error(transparent)]
    Vector(#[from] embedding::VectorError),

    #[error(transparent)]
    Metadata(data::DataError),

    #[error(transparent)]
    Llm(#[from] ai::LlmError),

    #[error(transparent)]
    Extraction(#[from] extractor::ExtractionError),

    #[error(transparent)]
    Embedding(#[from] embedding::EmbeddingError),
}

impl From<data::DataError> for AppError {
    fn from(e: data::DataError) -> Self {
        match e {
            data::DataError::NotFound(what) => AppError::NotFound(what),
            other => AppError::Metadata(other),
        }
    }
}

impl AppError {
    /// Stable numeric code for client correlation.
    pub fn code(&self) -> u32 {
        match self {
            AppError::Validation(_) => 40001,
            AppError::NotFound(_) => 40401,
            AppError::Graph(_) => 50001,
            AppError::Vector(_) => 50002,
            AppError::Metadata(_) => 50003,
            AppError::Llm(_) => 50004,
            AppError::Extraction(_) => 50005,
            AppError::Embedding(_) => 50004,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// A short label for logs and recovery prompts.
    pub fn kind_label(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "InputValidation",
            AppError::NotFound(_) => "ResourceNotFound",
            AppError::Graph(_) => "GraphStoreError",
            AppError::Vector(_) => "VectorStoreError",
            AppError::Metadata(_) => "MetadataStoreError",
            AppError::Llm(_) => "LLMError",
            AppError::Extraction(_) => "ExtractionError",
            AppError::Embedding(_) => "EmbeddingError",
        }
    }

    pub fn body(&self, path: &str) -> serde_json::Value {
        serde_json::json!({
            "code": self.code(),
            "message": self.to_string(),
            "path": path,
        })
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.status()
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status()).json(self.body(""))
    }
}

/// Build the enriched response for the middleware layer.
pub fn enriched_response(err: &actix_web::Error, path: &str) -> HttpResponse {
    if let Some(app_err) = err.as_error::<AppError>() {
        return HttpResponse::build(app_err.status()).json(app_err.body(path));
    }
    let response = err.error_response();
    let status = response.status();
    HttpResponse::build(status).json(serde_json::json!({
        "code": if status.is_client_error() { 40001 } else { 50000 },
        "message": err.to_string(),
        "path": path,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_statuses_are_stable() {
        let err = AppError::Validation("text 파라미터가 필요합니다.".into());
        assert_eq!(err.code(), 40001);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = AppError::NotFound("brain 42".into());
        assert_eq!(err.code(), 40401);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = AppError::Graph(graph_rag::GraphError::Neo4j("down".into()));
        assert_eq!(err.code(), 50001);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn metadata_not_found_maps_to_client_error() {
        let err: AppError = data::DataError::NotFound("session 9".into()).into();
        assert_eq!(err.code(), 40401);
    }

    #[test]
    fn body_carries_code_message_path() {
        let err = AppError::Validation("bad".into());
        let body = err.body("/brainGraph/answer");
        assert_eq!(body["code"], 40001);
        assert_eq!(body["path"], "/brainGraph/answer");
        assert!(body["message"].as_str().is_some());
    }
}
