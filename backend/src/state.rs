//! Shared application state, constructed once at startup.
//!
//! Client instances are concurrency-safe and shared across requests;
//! nothing here is process-global.

use std::sync::Arc;

use embedding::{Embedder, VectorStore};
use graph_rag::GraphStore;
use mindgraph_config::AppConfig;

use ai::{Backend, LlmService};

use crate::errors::AppError;

pub struct AppState {
    pub config: AppConfig,
    pub metadata: data::MetadataStore,
    pub graph: GraphStore,
    pub vectors: VectorStore,
    pub embedder: Embedder,
}

impl AppState {
    /// Build an LLM service for a request's backend/model pair, defaulting
    /// the model name from configuration.
    pub fn llm_for(
        &self,
        backend: Backend,
        model_name: Option<&str>,
    ) -> Result<Arc<dyn LlmService>, AppError> {
        let model = match (backend, model_name) {
            (_, Some(name)) if !name.is_empty() => name.to_string(),
            (Backend::OpenAi, _) => self.config.openai_model.clone(),
            (Backend::Ollama, _) => self.config.ollama_model.clone(),
        };
        Ok(ai::create_llm(backend, &model, &self.config.ollama_url)?)
    }
}
