//! Request and response bodies for the brain-graph endpoints.

use serde::{Deserialize, Serialize};

use crate::graph::{GraphEdge, GraphNode, OriginalSentence};

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessTextRequest {
    pub text: String,
    pub source_id: String,
    pub brain_id: String,
    /// "gpt" | "ollama" | absent. Absent selects the rule-based extractor.
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessTextResponse {
    pub message: String,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnswerRequest {
    pub question: String,
    pub session_id: i64,
    pub brain_id: i64,
    /// "openai" | "ollama"
    pub model: String,
    pub model_name: String,
    #[serde(default)]
    pub use_deep_search: bool,
}

/// Per-source citation attached to a referenced node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    pub id: String,
    pub title: String,
    pub original_sentences: Vec<OriginalSentence>,
}

/// A node the LLM cited, expanded with its sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferencedNode {
    pub name: String,
    pub source_ids: Vec<SourceRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerResponse {
    pub answer: String,
    pub referenced_nodes: Vec<ReferencedNode>,
    pub chat_id: i64,
    pub accuracy: f64,
}
