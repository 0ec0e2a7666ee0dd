//! LLM adapter: one interface over a hosted API and a local daemon.
//!
//! [`LlmService`] carries the two primitive calls (free-form chat and
//! JSON-mode chat). Everything higher level (answer generation, graph
//! extraction, schema text, reference parsing) is built on top of them and
//! shared between backends.

pub mod errors;
pub mod extract;
pub mod ollama;
pub mod openai;
pub mod parse;
pub mod prompts;
pub mod schema_text;

use async_trait::async_trait;
use std::sync::Arc;

pub use errors::LlmError;
pub use extract::LlmExtractor;
pub use ollama::OllamaService;
pub use openai::OpenAiService;
pub use schema_text::generate_schema_text;

/// Uniform interface over the LLM backends.
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Free-form single-prompt chat; returns the model's text.
    async fn chat(&self, prompt: &str) -> Result<String, LlmError>;

    /// JSON-mode chat for structured outputs. The backend must enforce its
    /// native JSON response format; malformed output is a stage failure.
    async fn chat_json(
        &self,
        system: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<String, LlmError>;

    fn model_name(&self) -> &str;

    /// Generate the final answer from schema text, with the EOF reference
    /// sentinel contract.
    async fn generate_answer(&self, schema_text: &str, question: &str) -> Result<String, LlmError> {
        self.chat(&prompts::answer_prompt(schema_text, question)).await
    }

    /// Parse the referenced-node list out of an answer.
    fn extract_referenced_nodes(&self, llm_response: &str) -> Vec<String> {
        parse::extract_referenced_nodes(llm_response)
    }
}

/// Requested backend for a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    OpenAi,
    Ollama,
}

impl Backend {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "openai" | "gpt" => Some(Backend::OpenAi),
            "ollama" => Some(Backend::Ollama),
            _ => None,
        }
    }
}

/// Build a service for the requested backend and model.
pub fn create_llm(
    backend: Backend,
    model_name: &str,
    ollama_url: &str,
) -> Result<Arc<dyn LlmService>, LlmError> {
    match backend {
        Backend::OpenAi => Ok(Arc::new(OpenAiService::new(model_name)?)),
        Backend::Ollama => Ok(Arc::new(OllamaService::new(ollama_url, model_name)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_parsing_accepts_both_spellings() {
        assert_eq!(Backend::parse("openai"), Some(Backend::OpenAi));
        assert_eq!(Backend::parse("gpt"), Some(Backend::OpenAi));
        assert_eq!(Backend::parse("ollama"), Some(Backend::Ollama));
        assert_eq!(Backend::parse("claude"), None);
    }
}
