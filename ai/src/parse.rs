//! Parsing of structured LLM replies.
//!
//! Models wrap JSON in prose often enough that every structured reply goes
//! through [`extract_json_block`] first. Unparseable stage replies fall back
//! to permissive defaults; the recovery plan defaults to `skip`.

use serde::Deserialize;
use tracing::warn;

/// The widest `{ ... }` block in the text, if any.
pub fn extract_json_block(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Strip a `label-name` prefix: everything up to and including the first `-`.
pub fn strip_label_prefix(name: &str) -> String {
    match name.split_once('-') {
        Some((_, rest)) => rest.trim().to_string(),
        None => name.trim().to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct ReferencedNodesPayload {
    #[serde(default)]
    referenced_nodes: Vec<String>,
}

/// Parse the JSON after the final `EOF` sentinel and return the cited node
/// names with any label prefix removed. Missing sentinel or malformed JSON
/// yields an empty list.
pub fn extract_referenced_nodes(llm_response: &str) -> Vec<String> {
    let Some(tail) = llm_response.rsplit("EOF").next() else {
        return Vec::new();
    };
    if tail.len() == llm_response.len() {
        // No sentinel at all.
        return Vec::new();
    }
    let Some(json_part) = extract_json_block(tail) else {
        return Vec::new();
    };
    match serde_json::from_str::<ReferencedNodesPayload>(json_part) {
        Ok(payload) => payload
            .referenced_nodes
            .into_iter()
            .map(|n| strip_label_prefix(&n))
            .filter(|n| !n.is_empty())
            .collect(),
        Err(e) => {
            warn!("extract_referenced_nodes: JSON 파싱 실패: {e}");
            Vec::new()
        }
    }
}

/// Stage-2 node filter reply.
#[derive(Debug, Clone, Deserialize)]
pub struct FilterResponse {
    #[serde(default)]
    pub filtered_node_names: Vec<String>,
    #[serde(default)]
    pub needs_more_search: bool,
    #[serde(default)]
    pub reason: String,
}

/// Stage-4 schema sufficiency reply. Defaults mean "sufficient, no deep
/// search", so a parse failure never escalates.
#[derive(Debug, Clone, Deserialize)]
pub struct SufficiencyResponse {
    #[serde(default = "default_true")]
    pub is_sufficient: bool,
    #[serde(default)]
    pub needs_deep_search: bool,
    #[serde(default)]
    pub missing_info: String,
    #[serde(default)]
    pub reason: String,
}

fn default_true() -> bool {
    true
}

impl Default for SufficiencyResponse {
    fn default() -> Self {
        Self {
            is_sufficient: true,
            needs_deep_search: false,
            missing_info: String::new(),
            reason: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryAction {
    Retry,
    Skip,
    Modify,
    Fallback,
}

/// Recovery-controller reply.
#[derive(Debug, Clone, Deserialize)]
pub struct RecoveryPlan {
    #[serde(default = "default_action")]
    pub recovery_action: RecoveryAction,
    #[serde(default)]
    pub modification: serde_json::Value,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub retry_params: serde_json::Value,
}

fn default_action() -> RecoveryAction {
    RecoveryAction::Skip
}

impl Default for RecoveryPlan {
    fn default() -> Self {
        Self {
            recovery_action: RecoveryAction::Skip,
            modification: serde_json::Value::Null,
            reason: "응답 파싱 실패".to_string(),
            retry_params: serde_json::Value::Null,
        }
    }
}

/// Parse a structured stage reply, falling back to `T::default()` when the
/// model's output has no usable JSON.
pub fn parse_stage_reply<T: for<'de> Deserialize<'de> + Default>(text: &str) -> T {
    extract_json_block(text)
        .and_then(|block| serde_json::from_str(block).ok())
        .unwrap_or_default()
}

impl Default for FilterResponse {
    fn default() -> Self {
        Self {
            filtered_node_names: Vec::new(),
            needs_more_search: false,
            reason: "응답 파싱 실패".to_string(),
        }
    }
}
