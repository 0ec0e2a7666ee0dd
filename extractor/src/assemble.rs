//! Node/edge assembly and per-keyword embedding.
//!
//! The chunking skeleton names the keywords; assembly attaches provenance
//! (up to five occurrence sentences per keyword), resolves edge relations
//! from co-occurrence sentences, and computes one embedding per node as the
//! mean of its highlighted occurrence sentences.

use futures::StreamExt;

use embedding::encoder::{mean_vector, Embedder};
use embedding::lang::detect;
use mindgraph_models::{
    DescriptionRecord, GraphEdge, GraphNode, OriginalSentence, VectorPayload, VectorPointRecord,
};

use crate::chunking::{recursive_chunking, SkeletonEdge};
use crate::errors::ExtractionError;
use crate::sentences::split_sentences;
use crate::tokenize::tokenize_sentences;

/// Sentences kept per node.
const MAX_SENTENCES_PER_NODE: usize = 5;
/// Concurrent per-keyword embedding jobs.
const EMBED_WORKERS: usize = 4;
/// Fallback relation when two keywords never share a sentence.
const DEFAULT_RELATION: &str = "관련";

#[derive(Debug)]
pub struct Extraction {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub points: Vec<VectorPointRecord>,
}

/// A node planned by the skeleton pass, before embedding.
#[derive(Debug, Clone)]
struct PlannedNode {
    name: String,
    descriptions: Vec<DescriptionRecord>,
    original_sentences: Vec<OriginalSentence>,
    /// Occurrence sentences with the keyword bracketed, for embedding.
    highlighted: Vec<String>,
}

/// Full rule-based extraction: text in, graph content and vector points out.
pub async fn extract_graph_components(
    text: &str,
    brain_id: &str,
    source_id: &str,
    embedder: &Embedder,
) -> Result<Extraction, ExtractionError> {
    let (planned, edges) = build_skeleton(text, source_id)?;
    let lang = detect(text);

    let mut jobs = futures::stream::iter(planned.into_iter().map(|node| {
        let embedder = embedder.clone();
        async move {
            let vector = if node.highlighted.is_empty() {
                None
            } else {
                let vectors = embedder.encode_batch(node.highlighted.clone(), lang).await?;
                Some(mean_vector(&vectors))
            };
            Ok::<_, embedding::EmbeddingError>((node, vector))
        }
    }))
    .buffered(EMBED_WORKERS);

    let mut nodes = Vec::new();
    let mut points = Vec::new();
    while let Some(result) = jobs.next().await {
        let (node, vector) = result?;
        if let Some(vector) = vector {
            for (format_index, record) in node
                .descriptions
                .iter()
                .enumerate()
                .filter(|(_, r)| !r.description.is_empty())
            {
                let payload = VectorPayload {
                    name: node.name.clone(),
                    description: record.description.clone(),
                    source_id: source_id.to_string(),
                    brain_id: brain_id.to_string(),
                    format_index,
                };
                points.push(VectorPointRecord {
                    id: VectorPointRecord::stable_id(&payload),
                    vector: vector.clone(),
                    payload,
                });
            }
        }
        let mut graph_node = GraphNode::new(node.name.clone(), node.name.clone());
        graph_node.descriptions = node.descriptions;
        graph_node.original_sentences = node.original_sentences;
        nodes.push(graph_node);
    }

    tracing::info!(
        "✅ Extracted {} nodes, {} edges, {} vector points",
        nodes.len(),
        edges.len(),
        points.len()
    );
    Ok(Extraction { nodes, edges, points })
}

/// The deterministic part of extraction: everything but the embeddings.
fn build_skeleton(
    text: &str,
    source_id: &str,
) -> Result<(Vec<PlannedNode>, Vec<GraphEdge>), ExtractionError> {
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return Err(ExtractionError::EmptyInput);
    }
    let tokenized = tokenize_sentences(&sentences);
    let outcome = recursive_chunking(&tokenized);

    // Fold duplicate skeleton entries (the parent keyword reappears at each
    // recursion level) into one planned node per name.
    let mut names: Vec<String> = Vec::new();
    let mut leaf_desc: Vec<Vec<usize>> = Vec::new();
    for node in &outcome.nodes {
        if node.name.is_empty() {
            continue;
        }
        match names.iter().position(|n| n == &node.name) {
            Some(pos) => leaf_desc[pos].extend(node.leaf_description.iter().copied()),
            None => {
                names.push(node.name.clone());
                leaf_desc.push(node.leaf_description.clone());
            }
        }
    }
    if names.is_empty() {
        return Err(ExtractionError::EmptyResult);
    }

    let occurrences: Vec<Vec<usize>> = names
        .iter()
        .map(|name| occurrence_indices(name, &sentences, &tokenized))
        .collect();

    let planned: Vec<PlannedNode> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let mut indices = occurrences[i].clone();
            if indices.is_empty() {
                indices = leaf_desc[i].clone();
                indices.sort_unstable();
                indices.dedup();
            }
            indices.truncate(MAX_SENTENCES_PER_NODE);
            plan_node(name, &indices, &sentences, source_id)
        })
        .collect();

    let edges = resolve_edges(&outcome.edges, &names, &occurrences, &sentences);
    Ok((planned, edges))
}

fn plan_node(
    name: &str,
    indices: &[usize],
    sentences: &[String],
    source_id: &str,
) -> PlannedNode {
    let mut descriptions = Vec::new();
    let mut original_sentences = Vec::new();
    let mut highlighted = Vec::new();

    if indices.is_empty() {
        // Keyword node without prose: keep an empty provenance record so the
        // node still knows which source produced it.
        descriptions.push(DescriptionRecord {
            description: String::new(),
            source_id: source_id.to_string(),
        });
        original_sentences.push(OriginalSentence {
            original_sentence: String::new(),
            source_id: source_id.to_string(),
            score: Some(1.0),
        });
    } else {
        for &idx in indices {
            let sentence = sentences[idx].clone();
            descriptions.push(DescriptionRecord {
                description: sentence.clone(),
                source_id: source_id.to_string(),
            });
            original_sentences.push(OriginalSentence {
                original_sentence: sentence.clone(),
                source_id: source_id.to_string(),
                score: Some(1.0),
            });
            highlighted.push(sentence.replace(name, &format!("[{name}]")));
        }
    }

    PlannedNode {
        name: name.to_string(),
        descriptions,
        original_sentences,
        highlighted,
    }
}

/// Sentence indices where the keyword occurs, by token match or substring.
fn occurrence_indices(
    name: &str,
    sentences: &[String],
    tokenized: &[crate::tokenize::TokenizedSentence],
) -> Vec<usize> {
    let mut indices = Vec::new();
    for (sentence, tokens) in sentences.iter().zip(tokenized) {
        let hit = tokens.tokens.iter().any(|t| t == name) || sentence.contains(name);
        if hit {
            indices.push(tokens.index);
        }
    }
    indices
}

/// Parent → child edges with the co-occurrence sentences as the relation,
/// falling back to the generic "관련" label.
fn resolve_edges(
    skeleton: &[SkeletonEdge],
    names: &[String],
    occurrences: &[Vec<usize>],
    sentences: &[String],
) -> Vec<GraphEdge> {
    let occurrence_of = |name: &str| -> &[usize] {
        names
            .iter()
            .position(|n| n == name)
            .map(|i| occurrences[i].as_slice())
            .unwrap_or(&[])
    };

    let mut edges: Vec<GraphEdge> = Vec::new();
    for edge in skeleton {
        if edge.source == edge.target {
            continue;
        }
        if !names.contains(&edge.source) || !names.contains(&edge.target) {
            continue;
        }
        let source_idx = occurrence_of(&edge.source);
        let target_idx = occurrence_of(&edge.target);
        let shared: String = source_idx
            .iter()
            .filter(|i| target_idx.contains(i))
            .filter_map(|&i| sentences.get(i).map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        let relation = if shared.is_empty() {
            DEFAULT_RELATION.to_string()
        } else {
            shared
        };

        let candidate = GraphEdge {
            source: edge.source.clone(),
            target: edge.target.clone(),
            relation,
        };
        if !edges
            .iter()
            .any(|e| e.source == candidate.source && e.target == candidate.target)
        {
            edges.push(candidate);
        }
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Graph databases store nodes and edges for connected data. \
        Nodes represent entities while edges represent relationships. \
        Vector search finds similar items by embedding distance. \
        Embedding models map sentences into dense vectors.";

    #[test]
    fn skeleton_nodes_carry_occurrence_sentences() {
        let (planned, _) = build_skeleton(SAMPLE, "7").unwrap();
        assert!(!planned.is_empty());
        for node in &planned {
            assert!(!node.descriptions.is_empty(), "node {} has no provenance", node.name);
            assert!(node.descriptions.len() <= MAX_SENTENCES_PER_NODE);
            assert_eq!(node.descriptions.len(), node.original_sentences.len());
            for record in &node.descriptions {
                assert_eq!(record.source_id, "7");
            }
        }
    }

    #[test]
    fn skeleton_is_deterministic_apart_from_uuids() {
        let (a, ea) = build_skeleton(SAMPLE, "7").unwrap();
        let (b, eb) = build_skeleton(SAMPLE, "7").unwrap();
        let names = |p: &[PlannedNode]| p.iter().map(|n| n.name.clone()).collect::<Vec<_>>();
        assert_eq!(names(&a), names(&b));
        assert_eq!(ea, eb);
    }

    #[test]
    fn edges_reference_planned_nodes() {
        let (planned, edges) = build_skeleton(SAMPLE, "7").unwrap();
        let names: Vec<&str> = planned.iter().map(|n| n.name.as_str()).collect();
        for edge in &edges {
            assert!(names.contains(&edge.source.as_str()));
            assert!(names.contains(&edge.target.as_str()));
            assert!(!edge.relation.is_empty());
        }
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(build_skeleton("", "7"), Err(ExtractionError::EmptyInput)));
        assert!(matches!(build_skeleton("\n \n", "7"), Err(ExtractionError::EmptyInput)));
    }

    #[test]
    fn co_occurrence_sentence_becomes_relation() {
        let names = vec!["alice".to_string(), "acme".to_string()];
        let occurrences = vec![vec![0], vec![0]];
        let sentences = vec!["Alice works at Acme.".to_string()];
        let skeleton = vec![SkeletonEdge {
            source: "alice".into(),
            target: "acme".into(),
        }];
        let edges = resolve_edges(&skeleton, &names, &occurrences, &sentences);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].relation, "Alice works at Acme.");
    }

    #[test]
    fn disjoint_keywords_fall_back_to_generic_relation() {
        let names = vec!["alice".to_string(), "bob".to_string()];
        let occurrences = vec![vec![0], vec![1]];
        let sentences = vec!["Alice here.".to_string(), "Bob there.".to_string()];
        let skeleton = vec![SkeletonEdge {
            source: "alice".into(),
            target: "bob".into(),
        }];
        let edges = resolve_edges(&skeleton, &names, &occurrences, &sentences);
        assert_eq!(edges[0].relation, DEFAULT_RELATION);
    }

    #[tokio::test]
    #[ignore] // Requires embedding model download
    async fn full_extraction_emits_points_for_described_nodes() {
        let embedder = Embedder::new(
            "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2",
            "sentence-transformers/all-MiniLM-L6-v2",
        );
        let extraction = extract_graph_components(SAMPLE, "42", "7", &embedder)
            .await
            .unwrap();
        assert!(!extraction.nodes.is_empty());
        assert!(!extraction.points.is_empty());
        for point in &extraction.points {
            assert_eq!(point.payload.brain_id, "42");
            assert_eq!(point.payload.source_id, "7");
            assert!(!point.payload.description.is_empty());
        }
    }
}
