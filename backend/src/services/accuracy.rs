//! Answer accuracy scoring.
//!
//! `Acc = 0.2·Q + 0.7·S + 0.1·C`, where Q is the retrieval quality of the
//! vector search, S the cosine similarity between the answer and the cited
//! nodes' descriptions, and C the share of schema-provided nodes that the
//! answer actually cited.

use std::collections::BTreeSet;

use ai::parse::strip_label_prefix;
use ai::prompts::REFERENCED_NODES_HEADER;
use ai::schema_text::provided_node_names;
use embedding::encoder::cosine_similarity;
use embedding::Embedder;
use graph_rag::GraphStore;

use crate::errors::AppError;

const W_Q: f64 = 0.2;
const W_S: f64 = 0.7;
const W_C: f64 = 0.1;

pub async fn compute_accuracy(
    answer: &str,
    referenced_nodes: &[String],
    brain_id: &str,
    quality: f64,
    raw_schema_text: &str,
    graph: &GraphStore,
    embedder: &Embedder,
) -> Result<f64, AppError> {
    let answer_clean = answer
        .split(REFERENCED_NODES_HEADER)
        .next()
        .unwrap_or_default()
        .trim();

    let node_names: BTreeSet<&String> = referenced_nodes.iter().collect();

    // S: similarity between the answer and the cited nodes' descriptions.
    let mut context_sentences = Vec::new();
    for name in &node_names {
        for entry in graph.get_descriptions(name, brain_id).await? {
            if !entry.description.trim().is_empty() {
                context_sentences.push(format!("{name} : {}", entry.description));
            }
        }
    }
    let context_text = context_sentences.join("\n");

    let similarity = if answer_clean.is_empty() || context_text.is_empty() {
        0.0
    } else {
        let answer_vec = embedder.encode(answer_clean).await?;
        let context_vec = embedder.encode(&context_text).await?;
        let sim = cosine_similarity(&answer_vec, &context_vec) as f64;
        (sim * 10_000.0).round() / 10_000.0
    };

    let coverage = coverage_score(referenced_nodes, raw_schema_text);

    tracing::info!(
        "📊 Q: {quality:.4}, S: {similarity:.4}, C: {coverage:.4}"
    );
    Ok(combine(quality, similarity, coverage))
}

/// C term: |cited ∩ provided| / |provided| over whitespace- and
/// label-normalized names. 0 when the schema provided nothing.
pub fn coverage_score(referenced_nodes: &[String], raw_schema_text: &str) -> f64 {
    let provided = provided_node_names(raw_schema_text);
    if provided.is_empty() {
        return 0.0;
    }
    let cited: BTreeSet<String> = referenced_nodes
        .iter()
        .map(|n| strip_label_prefix(n).replace(' ', ""))
        .filter(|n| !n.is_empty())
        .collect();
    let hits = cited.iter().filter(|n| provided.contains(*n)).count();
    hits as f64 / provided.len() as f64
}

/// Weighted sum, clamped to [0, 1], rounded to 3 decimals.
pub fn combine(quality: f64, similarity: f64, coverage: f64) -> f64 {
    let acc = (W_Q * quality + W_S * similarity + W_C * coverage).clamp(0.0, 1.0);
    (acc * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_matches_the_formula() {
        let acc = combine(0.8, 0.9, 0.5);
        let expected = 0.2 * 0.8 + 0.7 * 0.9 + 0.1 * 0.5;
        assert!((acc - expected).abs() < 1e-3);
        assert!((0.0..=1.0).contains(&acc));
    }

    #[test]
    fn combine_clamps_and_rounds() {
        assert_eq!(combine(1.0, 1.5, 1.0), 1.0);
        assert_eq!(combine(0.0, -0.5, 0.0), 0.0);
        assert_eq!(combine(0.5, 0.12345, 0.0), 0.186);
    }

    #[test]
    fn coverage_counts_normalized_intersection() {
        let schema = "Alice -> works at -> Acme\n\nAlice: engineer\nAcme: company";
        assert_eq!(coverage_score(&["Alice".into()], schema), 0.5);
        assert_eq!(
            coverage_score(&["인물-Alice".into(), "Acme".into()], schema),
            1.0
        );
        assert_eq!(coverage_score(&["Ghost".into()], schema), 0.0);
    }

    #[test]
    fn coverage_is_zero_without_provided_nodes() {
        assert_eq!(coverage_score(&["Alice".into()], ""), 0.0);
    }
}
