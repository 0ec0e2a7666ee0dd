use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM API error: {0}")]
    Api(String),

    #[error("LLM response violated the expected format: {0}")]
    MalformedResponse(String),

    #[error("LLM backend unavailable: {0}")]
    Unavailable(String),

    #[error("Embedding failed during extraction: {0}")]
    Embedding(#[from] embedding::EmbeddingError),
}
