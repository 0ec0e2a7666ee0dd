//! Neo4j-backed graph store.
//!
//! Works against a local Bolt endpoint or a hosted instance. Node and edge
//! writes of one ingestion commit in a single transaction.

use std::collections::{HashMap, HashSet};

use neo4rs::{query, ConfigBuilder, Graph};
use tracing::{info, warn};

use mindgraph_models::{
    DescriptionRecord, GraphEdge, GraphNode, GraphProjection, NodeRef, OriginalSentence,
    SchemaNode, SchemaRelationship, SchemaResult,
};

use crate::errors::{GraphError, GraphResult};
use crate::records;

/// Walk cap when looking for a described node from an empty start node.
const SCHEMA_WALK_DEPTH: usize = 5;
/// Deep mode raises the cap instead of removing it.
const SCHEMA_WALK_DEPTH_DEEP: usize = 15;

pub struct GraphStore {
    graph: Graph,
}

impl GraphStore {
    /// Connect and verify the endpoint with a probe query.
    pub async fn connect(uri: &str, user: &str, password: &str) -> GraphResult<Self> {
        info!("🔷 Connecting to Neo4j at: {uri}");

        let config = ConfigBuilder::default()
            .uri(uri)
            .user(user)
            .password(password)
            .db("neo4j")
            .fetch_size(500)
            .max_connections(10)
            .build()
            .map_err(|e| GraphError::Neo4j(format!("Failed to build Neo4j config: {e}")))?;

        let graph = Graph::connect(config)
            .await
            .map_err(|e| GraphError::Neo4j(format!("Failed to connect to Neo4j: {e}")))?;

        let mut result = graph
            .execute(query("RETURN 1 as probe"))
            .await
            .map_err(|e| GraphError::Neo4j(format!("Connection test failed: {e}")))?;
        if result
            .next()
            .await
            .map_err(|e| GraphError::Neo4j(e.to_string()))?
            .is_some()
        {
            info!("✅ Neo4j connection established");
        }

        Ok(Self { graph })
    }

    /// Upsert nodes and edges in one transaction.
    ///
    /// Node merge is idempotent on `(name, brain_id)`: existing list fields
    /// are read first and the incoming records appended without duplicates
    /// (descriptions by record equality, sentences by sentence text), then
    /// written back wholesale inside the transaction.
    pub async fn upsert_nodes_edges(
        &self,
        brain_id: &str,
        nodes: &[GraphNode],
        edges: &[GraphEdge],
    ) -> GraphResult<()> {
        // Read-merge outside the transaction; callers serialize concurrent
        // ingestion into the same (brain, source).
        let mut merged: Vec<(String, String, Vec<String>, Vec<String>)> = Vec::new();
        for node in nodes {
            let mut current = self
                .fetch_node(&node.name, brain_id)
                .await?
                .unwrap_or_else(|| GraphNode::new(node.label.clone(), node.name.clone()));
            current.label = node.label.clone();
            current.merge(node.clone());
            merged.push((
                current.name.clone(),
                current.label.clone(),
                records::descriptions_to_json(&current.descriptions),
                records::sentences_to_json(&current.original_sentences),
            ));
        }

        let txn = self
            .graph
            .start_txn()
            .await
            .map_err(|e| GraphError::Neo4j(format!("Failed to open transaction: {e}")))?;

        for (name, label, descriptions, originals) in merged {
            txn.run(
                query(
                    "MERGE (n:Node {name: $name, brain_id: $brain_id}) \
                     SET n.label = $label, \
                         n.descriptions = $descriptions, \
                         n.original_sentences = $originals",
                )
                .param("name", name)
                .param("label", label)
                .param("brain_id", brain_id)
                .param("descriptions", descriptions)
                .param("originals", originals),
            )
            .await
            .map_err(|e| GraphError::Neo4j(format!("Node upsert failed: {e}")))?;
        }

        for edge in edges {
            txn.run(
                query(
                    "MATCH (a:Node {name: $source, brain_id: $brain_id}) \
                     MATCH (b:Node {name: $target, brain_id: $brain_id}) \
                     MERGE (a)-[r:REL {relation: $relation, brain_id: $brain_id}]->(b)",
                )
                .param("source", edge.source.clone())
                .param("target", edge.target.clone())
                .param("relation", edge.relation.clone())
                .param("brain_id", brain_id),
            )
            .await
            .map_err(|e| GraphError::Neo4j(format!("Edge upsert failed: {e}")))?;
        }

        txn.commit()
            .await
            .map_err(|e| GraphError::Neo4j(format!("Transaction commit failed: {e}")))?;
        info!("✅ Upserted {} nodes and {} edges", nodes.len(), edges.len());
        Ok(())
    }

    /// Full projection of one brain's graph for visualization.
    pub async fn get_graph(&self, brain_id: &str) -> GraphResult<GraphProjection> {
        let mut nodes = Vec::new();
        let mut result = self
            .graph
            .execute(
                query(
                    "MATCH (n:Node {brain_id: $brain_id}) \
                     RETURN DISTINCT n.name as name ORDER BY name",
                )
                .param("brain_id", brain_id),
            )
            .await
            .map_err(|e| GraphError::Neo4j(e.to_string()))?;
        while let Some(row) = result.next().await.map_err(|e| GraphError::Neo4j(e.to_string()))? {
            let name: String = row.get("name").map_err(|e| GraphError::Neo4j(e.to_string()))?;
            nodes.push(NodeRef { name });
        }

        let mut links = Vec::new();
        let mut result = self
            .graph
            .execute(
                query(
                    "MATCH (source:Node {brain_id: $brain_id})-[r:REL {brain_id: $brain_id}]->(target:Node {brain_id: $brain_id}) \
                     RETURN DISTINCT source.name as source, target.name as target, r.relation as relation \
                     ORDER BY source, target, relation",
                )
                .param("brain_id", brain_id),
            )
            .await
            .map_err(|e| GraphError::Neo4j(e.to_string()))?;
        while let Some(row) = result.next().await.map_err(|e| GraphError::Neo4j(e.to_string()))? {
            links.push(GraphEdge {
                source: row.get("source").map_err(|e| GraphError::Neo4j(e.to_string()))?,
                target: row.get("target").map_err(|e| GraphError::Neo4j(e.to_string()))?,
                relation: row
                    .get::<Option<String>>("relation")
                    .map_err(|e| GraphError::Neo4j(e.to_string()))?
                    .unwrap_or_default(),
            });
        }

        Ok(GraphProjection { nodes, links })
    }

    /// Resolve the given names and collect the schema around them.
    ///
    /// Start nodes with a non-empty description contribute themselves; empty
    /// ones are walked breadth-first (up to the mode's depth cap) until a
    /// described node appears, and the traversed nodes and relationships are
    /// included. Direct neighbors of every start node are always included.
    pub async fn query_schema_by_names(
        &self,
        brain_id: &str,
        names: &[String],
        deep: bool,
    ) -> GraphResult<SchemaResult> {
        if names.is_empty() {
            return Ok(SchemaResult::default());
        }
        let depth_cap = if deep { SCHEMA_WALK_DEPTH_DEEP } else { SCHEMA_WALK_DEPTH };

        // Resolve which names exist, keeping the caller's order.
        let mut found: HashMap<String, SchemaNode> = HashMap::new();
        let mut result = self
            .graph
            .execute(
                query(
                    "MATCH (n:Node {brain_id: $brain_id}) WHERE n.name IN $names RETURN n",
                )
                .param("brain_id", brain_id)
                .param("names", names.to_vec()),
            )
            .await
            .map_err(|e| GraphError::Neo4j(e.to_string()))?;
        while let Some(row) = result.next().await.map_err(|e| GraphError::Neo4j(e.to_string()))? {
            let node: neo4rs::Node = row.get("n").map_err(|e| GraphError::Neo4j(e.to_string()))?;
            let schema_node = schema_node_from(&node);
            found.insert(schema_node.name.clone(), schema_node);
        }

        let start_nodes: Vec<SchemaNode> = names
            .iter()
            .filter_map(|n| found.remove(n))
            .collect();
        if start_nodes.is_empty() {
            warn!("Schema query matched none of {} requested names", names.len());
            return Ok(SchemaResult::default());
        }

        let start_names: HashSet<String> = start_nodes.iter().map(|n| n.name.clone()).collect();
        let mut collected: Vec<SchemaNode> = Vec::new();
        let mut relationships: Vec<SchemaRelationship> = Vec::new();

        for start in &start_nodes {
            // Direct neighborhood, regardless of descriptions.
            let (neighbors, rels) = self
                .incident_edges(brain_id, &[start.name.clone()])
                .await?;
            extend_nodes(&mut collected, neighbors);
            extend_relationships(&mut relationships, rels);

            if !start.has_description() {
                self.walk_to_description(brain_id, start, depth_cap, &mut collected, &mut relationships)
                    .await?;
            }
        }

        let related_nodes = collected
            .into_iter()
            .filter(|n| !start_names.contains(&n.name))
            .collect();

        Ok(SchemaResult {
            start_nodes,
            related_nodes,
            relationships,
        })
    }

    /// Breadth-first walk from an undescribed start node, stopping at the
    /// first level that introduces a described node.
    async fn walk_to_description(
        &self,
        brain_id: &str,
        start: &SchemaNode,
        depth_cap: usize,
        collected: &mut Vec<SchemaNode>,
        relationships: &mut Vec<SchemaRelationship>,
    ) -> GraphResult<()> {
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(start.name.clone());
        let mut frontier = vec![start.name.clone()];

        for _ in 0..depth_cap {
            if frontier.is_empty() {
                break;
            }
            let (nodes, rels) = self.incident_edges(brain_id, &frontier).await?;
            extend_relationships(relationships, rels);

            let mut next_frontier = Vec::new();
            let mut reached_description = false;
            for node in nodes {
                if !visited.insert(node.name.clone()) {
                    continue;
                }
                if node.has_description() {
                    reached_description = true;
                }
                next_frontier.push(node.name.clone());
                extend_nodes(collected, vec![node]);
            }
            if reached_description {
                break;
            }
            frontier = next_frontier;
        }
        Ok(())
    }

    /// Nodes and relationships incident to the frontier, brain-scoped and
    /// ordered for determinism.
    async fn incident_edges(
        &self,
        brain_id: &str,
        frontier: &[String],
    ) -> GraphResult<(Vec<SchemaNode>, Vec<SchemaRelationship>)> {
        let mut nodes = Vec::new();
        let mut rels = Vec::new();

        let mut result = self
            .graph
            .execute(
                query(
                    "MATCH (a:Node {brain_id: $brain_id})-[r:REL {brain_id: $brain_id}]->(t:Node {brain_id: $brain_id}) \
                     WHERE a.name IN $frontier OR t.name IN $frontier \
                     RETURN a, t, r.relation as relation \
                     ORDER BY a.name, t.name, relation",
                )
                .param("brain_id", brain_id)
                .param("frontier", frontier.to_vec()),
            )
            .await
            .map_err(|e| GraphError::Neo4j(e.to_string()))?;

        while let Some(row) = result.next().await.map_err(|e| GraphError::Neo4j(e.to_string()))? {
            let a: neo4rs::Node = row.get("a").map_err(|e| GraphError::Neo4j(e.to_string()))?;
            let t: neo4rs::Node = row.get("t").map_err(|e| GraphError::Neo4j(e.to_string()))?;
            let relation: Option<String> =
                row.get("relation").map_err(|e| GraphError::Neo4j(e.to_string()))?;
            let a = schema_node_from(&a);
            let t = schema_node_from(&t);
            rels.push(SchemaRelationship {
                source: a.name.clone(),
                target: t.name.clone(),
                relation: relation.unwrap_or_default(),
            });
            nodes.push(a);
            nodes.push(t);
        }
        Ok((nodes, rels))
    }

    /// Parsed descriptions of one node.
    pub async fn get_descriptions(
        &self,
        node_name: &str,
        brain_id: &str,
    ) -> GraphResult<Vec<DescriptionRecord>> {
        let raw = self.fetch_raw_list(node_name, brain_id, "descriptions").await?;
        Ok(records::parse_descriptions(&raw))
    }

    /// Map several node names to the source ids referenced by their
    /// descriptions. Non-numeric source ids are skipped.
    pub async fn get_descriptions_bulk(
        &self,
        names: &[String],
        brain_id: &str,
    ) -> GraphResult<HashMap<String, Vec<i64>>> {
        let mut out: HashMap<String, Vec<i64>> = HashMap::new();
        if names.is_empty() {
            return Ok(out);
        }

        let mut result = self
            .graph
            .execute(
                query(
                    "MATCH (n:Node {brain_id: $brain_id}) WHERE n.name IN $names \
                     RETURN n.name as name, n.descriptions as descriptions",
                )
                .param("brain_id", brain_id)
                .param("names", names.to_vec()),
            )
            .await
            .map_err(|e| GraphError::Neo4j(e.to_string()))?;

        while let Some(row) = result.next().await.map_err(|e| GraphError::Neo4j(e.to_string()))? {
            let name: String = row.get("name").map_err(|e| GraphError::Neo4j(e.to_string()))?;
            let raw: Vec<String> = row
                .get::<Option<Vec<String>>>("descriptions")
                .map_err(|e| GraphError::Neo4j(e.to_string()))?
                .unwrap_or_default();
            let ids = out.entry(name).or_default();
            for record in records::parse_descriptions(&raw) {
                if let Ok(id) = record.source_id.parse::<i64>() {
                    ids.push(id);
                }
            }
        }
        Ok(out)
    }

    /// Sentences of one node filtered to a source, deduplicated by sentence
    /// text, score field stripped.
    pub async fn get_original_sentences(
        &self,
        node_name: &str,
        source_id: &str,
        brain_id: &str,
    ) -> GraphResult<Vec<OriginalSentence>> {
        let raw = self
            .fetch_raw_list(node_name, brain_id, "original_sentences")
            .await?;
        let mut seen: HashSet<String> = HashSet::new();
        let mut out = Vec::new();
        for mut record in records::parse_sentences(&raw) {
            if record.source_id != source_id {
                continue;
            }
            if !seen.insert(record.original_sentence.clone()) {
                continue;
            }
            record.score = None;
            out.push(record);
        }
        Ok(out)
    }

    /// Names of nodes whose descriptions reference this source.
    pub async fn get_nodes_by_source(
        &self,
        source_id: &str,
        brain_id: &str,
    ) -> GraphResult<Vec<String>> {
        let mut out = Vec::new();
        for (name, _, descriptions, _) in self.fetch_all_lists(brain_id).await? {
            let hit = records::parse_descriptions(&descriptions)
                .iter()
                .any(|d| d.source_id == source_id);
            if hit {
                out.push(name);
            }
        }
        Ok(out)
    }

    /// Edges between nodes that reference this source.
    pub async fn get_edges_by_source(
        &self,
        source_id: &str,
        brain_id: &str,
    ) -> GraphResult<Vec<GraphEdge>> {
        let member_names: HashSet<String> =
            self.get_nodes_by_source(source_id, brain_id).await?.into_iter().collect();
        let projection = self.get_graph(brain_id).await?;
        Ok(projection
            .links
            .into_iter()
            .filter(|e| member_names.contains(&e.source) || member_names.contains(&e.target))
            .collect())
    }

    /// Remove this source's records from every node; nodes left with no
    /// descriptions are deleted with their incident edges.
    pub async fn delete_by_source(&self, brain_id: &str, source_id: &str) -> GraphResult<()> {
        let all = self.fetch_all_lists(brain_id).await?;

        let txn = self
            .graph
            .start_txn()
            .await
            .map_err(|e| GraphError::Neo4j(format!("Failed to open transaction: {e}")))?;

        let mut removed = 0usize;
        for (name, _label, descriptions, originals) in all {
            let parsed = records::parse_descriptions(&descriptions);
            if !parsed.iter().any(|d| d.source_id == source_id) {
                continue;
            }
            let kept: Vec<DescriptionRecord> = parsed
                .into_iter()
                .filter(|d| d.source_id != source_id)
                .collect();

            if kept.is_empty() {
                txn.run(
                    query(
                        "MATCH (n:Node {name: $name, brain_id: $brain_id}) DETACH DELETE n",
                    )
                    .param("name", name)
                    .param("brain_id", brain_id),
                )
                .await
                .map_err(|e| GraphError::Neo4j(format!("Node delete failed: {e}")))?;
                removed += 1;
            } else {
                let kept_sentences: Vec<OriginalSentence> = records::parse_sentences(&originals)
                    .into_iter()
                    .filter(|s| s.source_id != source_id)
                    .collect();
                txn.run(
                    query(
                        "MATCH (n:Node {name: $name, brain_id: $brain_id}) \
                         SET n.descriptions = $descriptions, n.original_sentences = $originals",
                    )
                    .param("name", name)
                    .param("brain_id", brain_id)
                    .param("descriptions", records::descriptions_to_json(&kept))
                    .param("originals", records::sentences_to_json(&kept_sentences)),
                )
                .await
                .map_err(|e| GraphError::Neo4j(format!("Node update failed: {e}")))?;
            }
        }

        txn.commit()
            .await
            .map_err(|e| GraphError::Neo4j(format!("Transaction commit failed: {e}")))?;
        info!("✅ Removed source {source_id} from brain {brain_id} ({removed} nodes deleted)");
        Ok(())
    }

    /// Drop every node and edge of the brain.
    pub async fn delete_by_brain(&self, brain_id: &str) -> GraphResult<()> {
        self.graph
            .run(
                query("MATCH (n:Node {brain_id: $brain_id}) DETACH DELETE n")
                    .param("brain_id", brain_id),
            )
            .await
            .map_err(|e| GraphError::Neo4j(e.to_string()))?;
        info!("✅ Deleted all graph data for brain {brain_id}");
        Ok(())
    }

    async fn fetch_node(&self, name: &str, brain_id: &str) -> GraphResult<Option<GraphNode>> {
        let mut result = self
            .graph
            .execute(
                query(
                    "MATCH (n:Node {name: $name, brain_id: $brain_id}) RETURN n LIMIT 1",
                )
                .param("name", name)
                .param("brain_id", brain_id),
            )
            .await
            .map_err(|e| GraphError::Neo4j(e.to_string()))?;

        let Some(row) = result.next().await.map_err(|e| GraphError::Neo4j(e.to_string()))? else {
            return Ok(None);
        };
        let node: neo4rs::Node = row.get("n").map_err(|e| GraphError::Neo4j(e.to_string()))?;
        let schema_node = schema_node_from(&node);
        let mut graph_node = GraphNode::new(schema_node.label, schema_node.name);
        graph_node.descriptions = schema_node.descriptions;
        graph_node.original_sentences = schema_node.original_sentences;
        Ok(Some(graph_node))
    }

    async fn fetch_raw_list(
        &self,
        node_name: &str,
        brain_id: &str,
        field: &str,
    ) -> GraphResult<Vec<String>> {
        let cypher = format!(
            "MATCH (n:Node {{name: $name, brain_id: $brain_id}}) RETURN n.{field} as value"
        );
        let mut result = self
            .graph
            .execute(query(&cypher).param("name", node_name).param("brain_id", brain_id))
            .await
            .map_err(|e| GraphError::Neo4j(e.to_string()))?;

        let Some(row) = result.next().await.map_err(|e| GraphError::Neo4j(e.to_string()))? else {
            return Ok(Vec::new());
        };
        Ok(row
            .get::<Option<Vec<String>>>("value")
            .map_err(|e| GraphError::Neo4j(e.to_string()))?
            .unwrap_or_default())
    }

    async fn fetch_all_lists(
        &self,
        brain_id: &str,
    ) -> GraphResult<Vec<(String, String, Vec<String>, Vec<String>)>> {
        let mut out = Vec::new();
        let mut result = self
            .graph
            .execute(
                query(
                    "MATCH (n:Node {brain_id: $brain_id}) \
                     RETURN n.name as name, n.label as label, \
                            n.descriptions as descriptions, n.original_sentences as originals \
                     ORDER BY name",
                )
                .param("brain_id", brain_id),
            )
            .await
            .map_err(|e| GraphError::Neo4j(e.to_string()))?;

        while let Some(row) = result.next().await.map_err(|e| GraphError::Neo4j(e.to_string()))? {
            out.push((
                row.get("name").map_err(|e| GraphError::Neo4j(e.to_string()))?,
                row.get::<Option<String>>("label")
                    .map_err(|e| GraphError::Neo4j(e.to_string()))?
                    .unwrap_or_default(),
                row.get::<Option<Vec<String>>>("descriptions")
                    .map_err(|e| GraphError::Neo4j(e.to_string()))?
                    .unwrap_or_default(),
                row.get::<Option<Vec<String>>>("originals")
                    .map_err(|e| GraphError::Neo4j(e.to_string()))?
                    .unwrap_or_default(),
            ));
        }
        Ok(out)
    }
}

/// Convert a Neo4j value node into the canonical schema node.
fn schema_node_from(node: &neo4rs::Node) -> SchemaNode {
    let name: String = node.get("name").ok().unwrap_or_default();
    let label: String = node.get("label").ok().unwrap_or_else(|| name.clone());
    let descriptions: Vec<String> = node.get("descriptions").ok().unwrap_or_default();
    let originals: Vec<String> = node.get("original_sentences").ok().unwrap_or_default();
    SchemaNode {
        name,
        label,
        descriptions: records::parse_descriptions(&descriptions),
        original_sentences: records::parse_sentences(&originals),
    }
}

/// Append nodes not yet present, keyed by name; first occurrence wins.
fn extend_nodes(collected: &mut Vec<SchemaNode>, incoming: Vec<SchemaNode>) {
    for node in incoming {
        if node.name.is_empty() {
            continue;
        }
        if !collected.iter().any(|n| n.name == node.name) {
            collected.push(node);
        }
    }
}

/// Append relationships not yet present, keyed by the full triple.
fn extend_relationships(collected: &mut Vec<SchemaRelationship>, incoming: Vec<SchemaRelationship>) {
    for rel in incoming {
        if !collected.contains(&rel) {
            collected.push(rel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindgraph_models::DescriptionRecord;

    fn node(name: &str) -> SchemaNode {
        SchemaNode {
            name: name.to_string(),
            label: name.to_string(),
            descriptions: vec![DescriptionRecord {
                description: format!("{name} description"),
                source_id: "1".into(),
            }],
            original_sentences: vec![],
        }
    }

    #[test]
    fn extend_nodes_prefers_first_occurrence() {
        let mut collected = vec![node("a")];
        let mut duplicate = node("a");
        duplicate.label = "other".into();
        extend_nodes(&mut collected, vec![duplicate, node("b")]);
        assert_eq!(collected.len(), 2);
        assert_eq!(collected[0].label, "a");
    }

    #[test]
    fn extend_nodes_skips_anonymous_nodes() {
        let mut collected = Vec::new();
        let mut anon = node("x");
        anon.name = String::new();
        extend_nodes(&mut collected, vec![anon]);
        assert!(collected.is_empty());
    }

    #[test]
    fn extend_relationships_dedups_triples() {
        let rel = SchemaRelationship {
            source: "a".into(),
            target: "b".into(),
            relation: "관련".into(),
        };
        let mut collected = vec![rel.clone()];
        extend_relationships(&mut collected, vec![rel.clone()]);
        assert_eq!(collected.len(), 1);

        let other = SchemaRelationship {
            relation: "works at".into(),
            ..rel
        };
        extend_relationships(&mut collected, vec![other]);
        assert_eq!(collected.len(), 2);
    }

    // Integration tests below need a running Neo4j at NEO4J_URI.

    #[tokio::test]
    #[ignore]
    async fn upsert_is_idempotent_and_deletion_cascades() {
        let store = GraphStore::connect("bolt://localhost:7687", "neo4j", "password")
            .await
            .unwrap();
        let brain = "graph_store_test";
        store.delete_by_brain(brain).await.unwrap();

        let mut alice = GraphNode::new("Alice", "Alice");
        alice.descriptions.push(DescriptionRecord {
            description: "Alice is an engineer.".into(),
            source_id: "7".into(),
        });
        let edges = vec![GraphEdge {
            source: "Alice".into(),
            target: "Alice".into(),
            relation: "self".into(),
        }];

        store.upsert_nodes_edges(brain, &[alice.clone()], &[]).await.unwrap();
        store.upsert_nodes_edges(brain, &[alice.clone()], &edges).await.unwrap();

        let descriptions = store.get_descriptions("Alice", brain).await.unwrap();
        assert_eq!(descriptions.len(), 1, "re-ingest must not duplicate records");

        store.delete_by_source(brain, "7").await.unwrap();
        let projection = store.get_graph(brain).await.unwrap();
        assert!(projection.nodes.is_empty());
        assert!(projection.links.is_empty());
    }
}
