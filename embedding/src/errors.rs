use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Model load error: {0}")]
    ModelLoad(String),

    #[error("Tokenization error: {0}")]
    Tokenization(String),

    #[error("Inference error: {0}")]
    Inference(String),
}

#[derive(Error, Debug)]
pub enum VectorError {
    #[error("Vector database error: {0}")]
    Backend(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Malformed payload on point {0}")]
    MalformedPayload(String),
}
