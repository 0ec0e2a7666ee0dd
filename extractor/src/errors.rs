use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Input text produced no usable sentences")]
    EmptyInput,

    #[error("Extraction produced no nodes")]
    EmptyResult,

    #[error("Embedding failed during extraction: {0}")]
    Embedding(#[from] embedding::EmbeddingError),
}
