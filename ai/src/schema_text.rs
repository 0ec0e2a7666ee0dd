//! Two-part textual rendering of a subgraph, fed to the LLM as context.
//!
//! Top: relation lines `start -> relation -> end`, deduplicated and sorted.
//! Bottom: one line per node, `name: descriptions` (deduplicated, joined
//! with spaces), for every node whether or not it has relations.

use std::collections::BTreeSet;

use mindgraph_models::{SchemaNode, SchemaRelationship};

/// Shown when the subgraph renders to nothing at all.
pub const EMPTY_SCHEMA_TEXT: &str = "컨텍스트에서 해당 정보를 찾을 수 없습니다.";

/// Relation label used when an edge has no relation text.
const DEFAULT_RELATION_LABEL: &str = "관계";

pub fn generate_schema_text(
    nodes: &[SchemaNode],
    related_nodes: &[SchemaNode],
    relationships: &[SchemaRelationship],
) -> String {
    // Collect all nodes keyed by name, start nodes first.
    let mut all_nodes: Vec<&SchemaNode> = Vec::new();
    for node in nodes.iter().chain(related_nodes) {
        let name = normalize_space(&node.name);
        if name.is_empty() {
            continue;
        }
        if !all_nodes.iter().any(|n| normalize_space(&n.name) == name) {
            all_nodes.push(node);
        }
    }

    let relation_lines: BTreeSet<String> = relationships
        .iter()
        .map(|rel| {
            let start = fallback_if_empty(&rel.source);
            let end = fallback_if_empty(&rel.target);
            let label = if rel.relation.trim().is_empty() {
                DEFAULT_RELATION_LABEL.to_string()
            } else {
                normalize_space(&rel.relation)
            };
            format!("{start} -> {label} -> {end}")
        })
        .collect();

    let mut node_entries: Vec<(String, String)> = all_nodes
        .iter()
        .map(|n| (normalize_space(&n.name), description_text(n)))
        .collect();
    node_entries.sort_by(|a, b| a.0.cmp(&b.0));
    let node_lines: Vec<String> = node_entries
        .into_iter()
        .map(|(name, desc)| {
            if desc.is_empty() {
                format!("{name}:")
            } else {
                format!("{name}: {desc}")
            }
        })
        .collect();

    let top = relation_lines.into_iter().collect::<Vec<_>>().join("\n");
    let bottom = node_lines.join("\n");

    match (top.is_empty(), bottom.is_empty()) {
        (false, false) => format!("{top}\n\n{bottom}"),
        (false, true) => top,
        (true, false) => bottom,
        (true, true) => EMPTY_SCHEMA_TEXT.to_string(),
    }
}

/// Join the node's description texts, whitespace-normalized and
/// deduplicated, preserving first-seen order.
fn description_text(node: &SchemaNode) -> String {
    let mut seen: Vec<String> = Vec::new();
    for record in &node.descriptions {
        let text = normalize_space(&record.description);
        if !text.is_empty() && !seen.contains(&text) {
            seen.push(text);
        }
    }
    seen.join(" ")
}

fn normalize_space(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn fallback_if_empty(s: &str) -> String {
    let n = normalize_space(s);
    if n.is_empty() {
        "알 수 없음".to_string()
    } else {
        n
    }
}

/// Node names appearing in a schema text, for the coverage term of the
/// accuracy score: every line contributes its `name` before the colon, and
/// relation lines contribute their endpoints.
pub fn provided_node_names(schema_text: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for line in schema_text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.contains("->") {
            let mut parts = line.split("->");
            let first = parts.next().unwrap_or_default();
            let last = parts.last().unwrap_or_default();
            for endpoint in [first, last] {
                let name = crate::parse::strip_label_prefix(endpoint.trim()).replace(' ', "");
                if !name.is_empty() {
                    names.insert(name);
                }
            }
        } else if let Some((name, _)) = line.split_once(':') {
            let name = crate::parse::strip_label_prefix(name.trim()).replace(' ', "");
            if !name.is_empty() {
                names.insert(name);
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindgraph_models::DescriptionRecord;

    fn node(name: &str, descriptions: &[&str]) -> SchemaNode {
        SchemaNode {
            name: name.to_string(),
            label: name.to_string(),
            descriptions: descriptions
                .iter()
                .map(|d| DescriptionRecord {
                    description: d.to_string(),
                    source_id: "7".to_string(),
                })
                .collect(),
            original_sentences: vec![],
        }
    }

    fn rel(source: &str, target: &str, relation: &str) -> SchemaRelationship {
        SchemaRelationship {
            source: source.to_string(),
            target: target.to_string(),
            relation: relation.to_string(),
        }
    }

    #[test]
    fn renders_two_part_format() {
        let text = generate_schema_text(
            &[node("Alice", &["Alice is an engineer."])],
            &[node("Acme", &["Acme is a company."])],
            &[rel("Alice", "Acme", "works at")],
        );
        let parts: Vec<&str> = text.split("\n\n").collect();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], "Alice -> works at -> Acme");
        assert!(parts[1].contains("Alice: Alice is an engineer."));
        assert!(parts[1].contains("Acme: Acme is a company."));
    }

    #[test]
    fn relation_lines_are_deduped_and_sorted() {
        let text = generate_schema_text(
            &[node("b", &[]), node("a", &[])],
            &[],
            &[rel("b", "a", "x"), rel("a", "b", "x"), rel("b", "a", "x")],
        );
        let top: Vec<&str> = text.split("\n\n").next().unwrap().lines().collect();
        assert_eq!(top, vec!["a -> x -> b", "b -> x -> a"]);
    }

    #[test]
    fn nodes_without_relations_still_render() {
        let text = generate_schema_text(&[node("solo", &["alone"])], &[], &[]);
        assert_eq!(text, "solo: alone");
    }

    #[test]
    fn empty_description_renders_bare_colon() {
        let text = generate_schema_text(&[node("stub", &[""])], &[], &[]);
        assert_eq!(text, "stub:");
    }

    #[test]
    fn duplicate_descriptions_collapse() {
        let text = generate_schema_text(&[node("n", &["same", "same", "other"])], &[], &[]);
        assert_eq!(text, "n: same other");
    }

    #[test]
    fn empty_subgraph_renders_placeholder() {
        assert_eq!(generate_schema_text(&[], &[], &[]), EMPTY_SCHEMA_TEXT);
    }

    #[test]
    fn missing_relation_label_falls_back() {
        let text = generate_schema_text(
            &[node("a", &[]), node("b", &[])],
            &[],
            &[rel("a", "b", " ")],
        );
        assert!(text.starts_with("a -> 관계 -> b"));
    }

    #[test]
    fn provided_names_cover_both_parts() {
        let text = "Alice -> works at -> Acme\n\nAlice: engineer\n인물-Bob: person";
        let names = provided_node_names(text);
        assert!(names.contains("Alice"));
        assert!(names.contains("Acme"));
        assert!(names.contains("Bob"));
    }
}
