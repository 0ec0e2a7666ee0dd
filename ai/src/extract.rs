//! LLM-driven graph extraction.
//!
//! Long texts are pre-split with the topical chunker, each chunk goes
//! through a JSON-mode extraction call, and the validated nodes are scored
//! against the chunk's sentences to recover `original_sentences`.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use embedding::encoder::{cosine_similarity, Embedder};
use embedding::lang::detect;
use extractor::Extraction;
use mindgraph_models::{
    dedup_edges, dedup_nodes, DescriptionRecord, GraphEdge, GraphNode, OriginalSentence,
    VectorPayload, VectorPointRecord,
};

use crate::errors::LlmError;
use crate::prompts;
use crate::{parse, LlmService};

/// Texts at or above this many characters are chunked before extraction.
const CHUNKING_THRESHOLD_CHARS: usize = 2000;
/// Sentences at or above this similarity to a node's description are kept.
const SENTENCE_SCORE_THRESHOLD: f32 = 0.8;
const EXTRACTION_TEMPERATURE: f32 = 0.3;

pub struct LlmExtractor {
    llm: Arc<dyn LlmService>,
    embedder: Embedder,
}

#[derive(Debug, Deserialize)]
struct RawExtraction {
    #[serde(default)]
    nodes: Vec<serde_json::Value>,
    #[serde(default)]
    edges: Vec<serde_json::Value>,
}

impl LlmExtractor {
    pub fn new(llm: Arc<dyn LlmService>, embedder: Embedder) -> Self {
        Self { llm, embedder }
    }

    /// Extract nodes, edges and vector points from one source text.
    pub async fn extract(
        &self,
        text: &str,
        brain_id: &str,
        source_id: &str,
    ) -> Result<Extraction, LlmError> {
        let chunks = if text.chars().count() >= CHUNKING_THRESHOLD_CHARS {
            let chunks = extractor::manual_chunks(text);
            info!("✂️  Text split into {} chunks for LLM extraction", chunks.len());
            chunks
        } else {
            vec![text.to_string()]
        };

        let mut all_nodes = Vec::new();
        let mut all_edges = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            info!("Processing chunk {}/{}", i + 1, chunks.len());
            let (mut nodes, edges) = self.extract_from_chunk(chunk, source_id).await?;
            self.attach_original_sentences(&mut nodes, chunk, source_id).await?;
            all_nodes.extend(nodes);
            all_edges.extend(edges);
        }

        let nodes = dedup_nodes(all_nodes);
        let edges = dedup_edges(all_edges);
        let points = self.build_points(&nodes, brain_id).await?;

        info!(
            "✅ LLM extraction: {} nodes, {} edges, {} vector points",
            nodes.len(),
            edges.len(),
            points.len()
        );
        Ok(Extraction { nodes, edges, points })
    }

    async fn extract_from_chunk(
        &self,
        chunk: &str,
        source_id: &str,
    ) -> Result<(Vec<GraphNode>, Vec<GraphEdge>), LlmError> {
        let reply = self
            .llm
            .chat_json(
                prompts::EXTRACTION_SYSTEM,
                &prompts::extraction_prompt(chunk),
                EXTRACTION_TEMPERATURE,
            )
            .await?;
        validate_payload(&reply, source_id)
    }

    /// Score the chunk's sentences against each node's description; keep
    /// those above the threshold, or the single best match.
    async fn attach_original_sentences(
        &self,
        nodes: &mut [GraphNode],
        chunk: &str,
        source_id: &str,
    ) -> Result<(), LlmError> {
        let sentences = extractor::manual_chunks(chunk);
        if sentences.is_empty() {
            return Ok(());
        }
        let lang = detect(chunk);
        let sentence_vecs = self.embedder.encode_batch(sentences.clone(), lang).await?;

        for node in nodes.iter_mut() {
            let Some(desc) = node.descriptions.first() else {
                continue;
            };
            let desc_vec = self.embedder.encode(&desc.description).await?;
            let scores: Vec<f32> = sentence_vecs
                .iter()
                .map(|v| cosine_similarity(v, &desc_vec))
                .collect();

            let above: Vec<(usize, f32)> = scores
                .iter()
                .copied()
                .enumerate()
                .filter(|(_, s)| *s >= SENTENCE_SCORE_THRESHOLD)
                .collect();

            let chosen: Vec<(usize, f32)> = if above.is_empty() {
                scores
                    .iter()
                    .copied()
                    .enumerate()
                    .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
                    .into_iter()
                    .collect()
            } else {
                above
            };

            node.original_sentences = chosen
                .into_iter()
                .map(|(i, score)| OriginalSentence {
                    original_sentence: sentences[i].clone(),
                    source_id: source_id.to_string(),
                    score: Some((score as f64 * 10_000.0).round() / 10_000.0),
                })
                .collect();
        }
        Ok(())
    }

    /// One point per description record; the vector embeds the name and the
    /// description text together.
    async fn build_points(
        &self,
        nodes: &[GraphNode],
        brain_id: &str,
    ) -> Result<Vec<VectorPointRecord>, LlmError> {
        let mut points = Vec::new();
        for node in nodes {
            for (format_index, record) in node
                .descriptions
                .iter()
                .enumerate()
                .filter(|(_, r)| !r.description.is_empty())
            {
                let vector = self
                    .embedder
                    .encode(&format!("{} — {}", node.name, record.description))
                    .await?;
                let payload = VectorPayload {
                    name: node.name.clone(),
                    description: record.description.clone(),
                    source_id: record.source_id.clone(),
                    brain_id: brain_id.to_string(),
                    format_index,
                };
                points.push(VectorPointRecord {
                    id: VectorPointRecord::stable_id(&payload),
                    vector,
                    payload,
                });
            }
        }
        Ok(points)
    }
}

/// Validate the extraction reply: every node needs `label` and `name`, a
/// `description` becomes a provenance record, edges must reference node
/// names present in this chunk.
fn validate_payload(
    reply: &str,
    source_id: &str,
) -> Result<(Vec<GraphNode>, Vec<GraphEdge>), LlmError> {
    let block = parse::extract_json_block(reply)
        .ok_or_else(|| LlmError::MalformedResponse("no JSON object in reply".to_string()))?;
    let raw: RawExtraction = serde_json::from_str(block)
        .map_err(|e| LlmError::MalformedResponse(format!("extraction JSON: {e}")))?;

    let mut nodes = Vec::new();
    for value in raw.nodes {
        let (Some(label), Some(name)) = (
            value.get("label").and_then(|v| v.as_str()),
            value.get("name").and_then(|v| v.as_str()),
        ) else {
            warn!("필수 필드가 누락된 노드: {value}");
            continue;
        };
        let mut node = GraphNode::new(label, name);
        // Every node keeps at least one provenance record, even when the
        // model produced no description text.
        let description = value
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        node.descriptions.push(DescriptionRecord {
            description: description.to_string(),
            source_id: source_id.to_string(),
        });
        nodes.push(node);
    }

    let node_names: Vec<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
    let mut edges = Vec::new();
    for value in raw.edges {
        let (Some(source), Some(target), Some(relation)) = (
            value.get("source").and_then(|v| v.as_str()),
            value.get("target").and_then(|v| v.as_str()),
            value.get("relation").and_then(|v| v.as_str()),
        ) else {
            warn!("필수 필드가 누락된 엣지: {value}");
            continue;
        };
        if !node_names.contains(&source) || !node_names.contains(&target) {
            warn!("잘못된 엣지 참조: {source} -> {target}");
            continue;
        }
        edges.push(GraphEdge {
            source: source.to_string(),
            target: target.to_string(),
            relation: relation.to_string(),
        });
    }

    Ok((nodes, edges))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_payload_becomes_nodes_and_edges() {
        let reply = r#"{
            "nodes": [
                {"label": "인물", "name": "Alice", "description": "엔지니어"},
                {"label": "회사", "name": "Acme", "description": "기술 회사"}
            ],
            "edges": [
                {"source": "Alice", "target": "Acme", "relation": "근무"}
            ]
        }"#;
        let (nodes, edges) = validate_payload(reply, "7").unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].descriptions[0].source_id, "7");
        assert_eq!(edges.len(), 1);
    }

    #[test]
    fn nodes_missing_required_fields_are_dropped() {
        let reply = r#"{"nodes": [{"name": "NoLabel"}, {"label": "개념", "name": "ok"}], "edges": []}"#;
        let (nodes, _) = validate_payload(reply, "7").unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name, "ok");
    }

    #[test]
    fn edges_with_unknown_endpoints_are_rejected() {
        let reply = r#"{
            "nodes": [{"label": "a", "name": "a"}],
            "edges": [
                {"source": "a", "target": "ghost", "relation": "x"},
                {"source": "a", "target": "a", "relation": "self"}
            ]
        }"#;
        let (_, edges) = validate_payload(reply, "7").unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].relation, "self");
    }

    #[test]
    fn prose_wrapped_json_still_parses() {
        let reply = "물론입니다! {\"nodes\": [{\"label\": \"x\", \"name\": \"x\"}], \"edges\": []} 입니다.";
        let (nodes, _) = validate_payload(reply, "7").unwrap();
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn non_json_reply_is_a_format_violation() {
        assert!(matches!(
            validate_payload("I cannot do that", "7"),
            Err(LlmError::MalformedResponse(_))
        ));
    }
}
