//! Graph and vector record types.
//!
//! Node identity is `(name, brain_id)`; the brain id is carried by the store
//! call, not the record. `descriptions` and `original_sentences` are ordered
//! sets: merging appends only entries not already present.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One provenance entry on a node: a describing sentence and the source it
/// came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptionRecord {
    pub description: String,
    pub source_id: String,
}

/// A sentence in which the node's keyword appeared, with the extraction
/// confidence. The score is dropped when sentences are returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginalSentence {
    pub original_sentence: String,
    pub source_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub label: String,
    pub name: String,
    #[serde(default)]
    pub descriptions: Vec<DescriptionRecord>,
    #[serde(default)]
    pub original_sentences: Vec<OriginalSentence>,
}

impl GraphNode {
    pub fn new(label: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            name: name.into(),
            descriptions: Vec::new(),
            original_sentences: Vec::new(),
        }
    }

    /// Append the other node's list fields, skipping entries already present.
    /// Descriptions dedup on exact record equality, sentences on the sentence
    /// string.
    pub fn merge(&mut self, other: GraphNode) {
        for desc in other.descriptions {
            if !self.descriptions.contains(&desc) {
                self.descriptions.push(desc);
            }
        }
        for orig in other.original_sentences {
            if !self
                .original_sentences
                .iter()
                .any(|o| o.original_sentence == orig.original_sentence)
            {
                self.original_sentences.push(orig);
            }
        }
    }
}

/// Directed edge; endpoints reference node names within the same brain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub relation: String,
}

/// Minimal node reference used by the full-graph projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRef {
    pub name: String,
}

/// Full projection of one brain's graph, for visualization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphProjection {
    pub nodes: Vec<NodeRef>,
    pub links: Vec<GraphEdge>,
}

/// Canonical node value returned by schema queries. Flat, keyed by name;
/// edges are resolved as (name -> name), never as object pointers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaNode {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub descriptions: Vec<DescriptionRecord>,
    #[serde(default)]
    pub original_sentences: Vec<OriginalSentence>,
}

impl SchemaNode {
    /// Whether the node carries at least one non-empty description text.
    pub fn has_description(&self) -> bool {
        self.descriptions.iter().any(|d| !d.description.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRelationship {
    pub source: String,
    pub target: String,
    pub relation: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaResult {
    pub start_nodes: Vec<SchemaNode>,
    pub related_nodes: Vec<SchemaNode>,
    pub relationships: Vec<SchemaRelationship>,
}

impl SchemaResult {
    pub fn is_empty(&self) -> bool {
        self.start_nodes.is_empty() && self.related_nodes.is_empty()
    }
}

/// Payload stored alongside every vector point; the only join key between
/// the vector index and the other stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorPayload {
    pub name: String,
    pub description: String,
    pub source_id: String,
    pub brain_id: String,
    pub format_index: usize,
}

/// One point bound for the vector index.
#[derive(Debug, Clone)]
pub struct VectorPointRecord {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: VectorPayload,
}

impl VectorPointRecord {
    /// Stable point id for a description record. Re-ingesting the same
    /// source overwrites its points instead of accumulating duplicates.
    pub fn stable_id(payload: &VectorPayload) -> Uuid {
        let name = format!(
            "{}:{}:{}:{}",
            payload.brain_id, payload.source_id, payload.name, payload.format_index
        );
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
    }
}

/// One vector-search hit, already joined to its payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub name: String,
    pub description: String,
    pub source_id: String,
    pub score: f32,
}

/// Merge duplicate nodes by `(name, label)`, folding list fields together.
pub fn dedup_nodes(nodes: Vec<GraphNode>) -> Vec<GraphNode> {
    let mut unique: Vec<GraphNode> = Vec::new();
    for node in nodes {
        if let Some(existing) = unique
            .iter_mut()
            .find(|n| n.name == node.name && n.label == node.label)
        {
            existing.merge(node);
        } else {
            unique.push(node);
        }
    }
    unique
}

/// Drop duplicate edges by `(source, target, relation)`, keeping the first.
pub fn dedup_edges(edges: Vec<GraphEdge>) -> Vec<GraphEdge> {
    let mut unique: Vec<GraphEdge> = Vec::new();
    for edge in edges {
        if !unique.contains(&edge) {
            unique.push(edge);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(text: &str, sid: &str) -> DescriptionRecord {
        DescriptionRecord {
            description: text.to_string(),
            source_id: sid.to_string(),
        }
    }

    fn sentence(text: &str, sid: &str) -> OriginalSentence {
        OriginalSentence {
            original_sentence: text.to_string(),
            source_id: sid.to_string(),
            score: Some(1.0),
        }
    }

    #[test]
    fn merge_appends_without_duplicates() {
        let mut a = GraphNode::new("Alice", "Alice");
        a.descriptions.push(desc("Alice is an engineer.", "7"));
        a.original_sentences.push(sentence("Alice is an engineer.", "7"));

        let mut b = GraphNode::new("Alice", "Alice");
        b.descriptions.push(desc("Alice is an engineer.", "7"));
        b.descriptions.push(desc("Alice works at Acme.", "7"));
        b.original_sentences.push(sentence("Alice works at Acme.", "7"));

        a.merge(b);
        assert_eq!(a.descriptions.len(), 2);
        assert_eq!(a.original_sentences.len(), 2);
    }

    #[test]
    fn merge_dedups_sentences_by_text_only() {
        let mut a = GraphNode::new("n", "n");
        a.original_sentences.push(sentence("same", "1"));

        let mut b = GraphNode::new("n", "n");
        let mut dup = sentence("same", "2");
        dup.score = Some(0.5);
        b.original_sentences.push(dup);

        a.merge(b);
        assert_eq!(a.original_sentences.len(), 1);
        assert_eq!(a.original_sentences[0].source_id, "1");
    }

    #[test]
    fn dedup_nodes_folds_descriptions() {
        let mut n1 = GraphNode::new("개념", "인공지능");
        n1.descriptions.push(desc("a", "1"));
        let mut n2 = GraphNode::new("개념", "인공지능");
        n2.descriptions.push(desc("b", "1"));

        let merged = dedup_nodes(vec![n1, n2]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].descriptions.len(), 2);
    }

    #[test]
    fn dedup_edges_keeps_first() {
        let e = |r: &str| GraphEdge {
            source: "a".into(),
            target: "b".into(),
            relation: r.into(),
        };
        let edges = dedup_edges(vec![e("x"), e("x"), e("y")]);
        assert_eq!(edges.len(), 2);
    }

    #[test]
    fn stable_point_ids_depend_on_identity_fields() {
        let payload = VectorPayload {
            name: "Alice".into(),
            description: "Alice is an engineer.".into(),
            source_id: "7".into(),
            brain_id: "42".into(),
            format_index: 0,
        };
        let a = VectorPointRecord::stable_id(&payload);
        let b = VectorPointRecord::stable_id(&payload);
        assert_eq!(a, b);

        let other = VectorPayload {
            format_index: 1,
            ..payload
        };
        assert_ne!(a, VectorPointRecord::stable_id(&other));
    }

    #[test]
    fn schema_node_description_presence() {
        let mut node = SchemaNode {
            name: "n".into(),
            label: "n".into(),
            descriptions: vec![desc("", "1")],
            original_sentences: vec![],
        };
        assert!(!node.has_description());
        node.descriptions.push(desc("real text", "1"));
        assert!(node.has_description());
    }
}
