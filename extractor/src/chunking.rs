//! Recursive topical chunking.
//!
//! Sentences are grouped by topic-distribution similarity and the groups
//! recursed into until they bottom out, producing (a) a partition of the
//! sentence indices into leaf chunks and (b) a keyword skeleton: one parent
//! representative per level linked to one representative per group.
//!
//! The similarity threshold starts at 0.6 and grows 10% per level, so every
//! branch eventually splinters into single sentences and terminates.

use crate::tokenize::TokenizedSentence;
use crate::topics::{similarity_matrix, tfidf_keywords, TopicModel};

pub const NUM_TOPICS: usize = 5;
pub const LDA_PASSES: usize = 10;
pub const LDA_SEED: u64 = 35;
pub const INITIAL_THRESHOLD: f64 = 0.6;
const THRESHOLD_GROWTH: f64 = 1.1;
/// Past this depth, chunks below the token floor stop splitting.
const LEAF_DEPTH: usize = 5;
const LEAF_TOKEN_FLOOR: usize = 700;
/// Hard stop; unreachable in practice because the threshold passes 1.0 first.
const MAX_DEPTH: usize = 12;
/// Groups smaller than this become leaf descriptions instead of subtrees.
const SMALL_GROUP_TOKENS: usize = 30;
const TFIDF_TOPN: usize = 7;

/// A bottomed-out chunk: contiguous sentence indices and the representative
/// keyword carried down to it.
#[derive(Debug, Clone)]
pub struct LeafChunk {
    pub depth: usize,
    pub sentence_indices: Vec<usize>,
    pub keyword: String,
}

/// A keyword selected as a node. `leaf_description` holds sentence indices
/// for small groups whose whole text becomes the node's description.
#[derive(Debug, Clone)]
pub struct SkeletonNode {
    pub name: String,
    pub leaf_description: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkeletonEdge {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Default)]
pub struct ChunkOutcome {
    pub leaves: Vec<LeafChunk>,
    pub nodes: Vec<SkeletonNode>,
    pub edges: Vec<SkeletonEdge>,
}

/// Run the full chunking pass over tokenized sentences.
pub fn recursive_chunking(sentences: &[TokenizedSentence]) -> ChunkOutcome {
    let mut out = ChunkOutcome::default();
    if sentences.is_empty() {
        return out;
    }

    let docs: Vec<Vec<String>> = sentences.iter().map(|s| s.tokens.clone()).collect();
    // The topic model is fitted once on the whole text and reused at every
    // recursion depth.
    let model = TopicModel::fit(&docs, NUM_TOPICS, LDA_PASSES, LDA_SEED);
    if model.vocab_size() == 0 {
        out.leaves.push(LeafChunk {
            depth: 0,
            sentence_indices: sentences.iter().map(|s| s.index).collect(),
            keyword: String::new(),
        });
        return out;
    }

    recurse(sentences, 0, "", INITIAL_THRESHOLD, &model, &mut out);
    out
}

fn recurse(
    chunk: &[TokenizedSentence],
    depth: usize,
    carried_keyword: &str,
    threshold: f64,
    model: &TopicModel,
    out: &mut ChunkOutcome,
) {
    if depth > 0 {
        let total_tokens = token_count(chunk);
        let bottomed = chunk.len() == 1
            || (depth > LEAF_DEPTH && total_tokens < LEAF_TOKEN_FLOOR)
            || depth > MAX_DEPTH;
        if bottomed {
            out.leaves.push(LeafChunk {
                depth,
                sentence_indices: chunk.iter().map(|s| s.index).collect(),
                keyword: carried_keyword.to_string(),
            });
            return;
        }
    }

    // At the root the topic model names the whole text; below, the TF-IDF
    // representative chosen by the parent is carried in.
    let keyword = if depth == 0 {
        model.top_term(0).unwrap_or_default()
    } else {
        carried_keyword.to_string()
    };

    let vectors: Vec<Vec<f64>> = chunk
        .iter()
        .map(|s| model.topic_distribution(&s.tokens))
        .collect();
    let matrix = similarity_matrix(&vectors);
    let groups = group_contiguous(&matrix, chunk.len(), threshold);

    let parent_pos = out.nodes.len();
    out.nodes.push(SkeletonNode {
        name: keyword.clone(),
        leaf_description: Vec::new(),
    });
    let mut already: Vec<String> = vec![keyword.clone()];

    let group_tokens: Vec<Vec<String>> = groups
        .iter()
        .map(|&(start, end)| {
            chunk[start..end]
                .iter()
                .flat_map(|s| s.tokens.iter().cloned())
                .collect()
        })
        .collect();
    let topics = tfidf_keywords(&group_tokens, TFIDF_TOPN);

    enum GroupPlan {
        Recurse(String),
        LeafOnParent,
    }

    let mut plans = Vec::with_capacity(groups.len());
    for (gi, terms) in topics.iter().enumerate() {
        let (start, end) = groups[gi];
        let small = token_count(&chunk[start..end]) < SMALL_GROUP_TOKENS;
        match terms.iter().find(|t| !already.contains(*t)) {
            Some(rep) => {
                out.nodes.push(SkeletonNode {
                    name: rep.clone(),
                    leaf_description: if small {
                        chunk[start..end].iter().map(|s| s.index).collect()
                    } else {
                        Vec::new()
                    },
                });
                out.edges.push(SkeletonEdge {
                    source: keyword.clone(),
                    target: rep.clone(),
                });
                already.push(rep.clone());
                plans.push(GroupPlan::Recurse(rep.clone()));
            }
            None if small => {
                // No fresh representative: the group's text attaches to the
                // parent node instead of becoming a subtree.
                let indices: Vec<usize> = chunk[start..end].iter().map(|s| s.index).collect();
                out.nodes[parent_pos].leaf_description.extend(indices.iter().copied());
                out.leaves.push(LeafChunk {
                    depth: depth + 1,
                    sentence_indices: indices,
                    keyword: keyword.clone(),
                });
                plans.push(GroupPlan::LeafOnParent);
            }
            None => plans.push(GroupPlan::Recurse(keyword.clone())),
        }
    }

    for (gi, plan) in plans.into_iter().enumerate() {
        let (start, end) = groups[gi];
        match plan {
            GroupPlan::Recurse(rep) => recurse(
                &chunk[start..end],
                depth + 1,
                &rep,
                threshold * THRESHOLD_GROWTH,
                model,
                out,
            ),
            GroupPlan::LeafOnParent => {}
        }
    }
}

fn token_count(chunk: &[TokenizedSentence]) -> usize {
    chunk.iter().map(|s| s.tokens.len()).sum()
}

/// Greedy left-to-right grouping: the run extends while the next sentence is
/// similar to at least one current member. Returns `[start, end)` ranges.
fn group_contiguous(matrix: &[Vec<f64>], n: usize, threshold: f64) -> Vec<(usize, usize)> {
    let mut groups = Vec::new();
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && (start..end).any(|i| matrix[i][end] >= threshold) {
            end += 1;
        }
        groups.push((start, end));
        start = end;
    }
    groups
}

/// Chunk raw text and return each leaf's sentences joined back together.
/// Used to pre-split long documents before LLM extraction.
pub fn manual_chunks(text: &str) -> Vec<String> {
    let sentences = crate::sentences::split_sentences(text);
    if sentences.is_empty() {
        return Vec::new();
    }
    let tokenized = crate::tokenize::tokenize_sentences(&sentences);
    let outcome = recursive_chunking(&tokenized);

    outcome
        .leaves
        .iter()
        .map(|leaf| {
            leaf.sentence_indices
                .iter()
                .filter_map(|&i| sentences.get(i).map(String::as_str))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|c| !c.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentences::split_sentences;
    use crate::tokenize::tokenize_sentences;

    fn chunk_text(text: &str) -> (Vec<String>, ChunkOutcome) {
        let sentences = split_sentences(text);
        let tokenized = tokenize_sentences(&sentences);
        let outcome = recursive_chunking(&tokenized);
        (sentences, outcome)
    }

    const SAMPLE: &str = "Graph databases store nodes and edges for connected data. \
        Nodes represent entities while edges represent relationships. \
        Vector search finds similar items by embedding distance. \
        Embedding models map sentences into dense vectors. \
        Question answering combines retrieval with language models. \
        Retrieval quality depends on the embedding model and the index.";

    #[test]
    fn leaves_partition_the_sentence_indices() {
        let (sentences, outcome) = chunk_text(SAMPLE);
        let mut seen: Vec<usize> = outcome
            .leaves
            .iter()
            .flat_map(|l| l.sentence_indices.iter().copied())
            .collect();
        seen.sort_unstable();
        let expected: Vec<usize> = (0..sentences.len()).collect();
        assert_eq!(seen, expected, "every index appears in exactly one leaf");
    }

    #[test]
    fn chunking_is_deterministic() {
        let (_, a) = chunk_text(SAMPLE);
        let (_, b) = chunk_text(SAMPLE);
        let names = |o: &ChunkOutcome| o.nodes.iter().map(|n| n.name.clone()).collect::<Vec<_>>();
        assert_eq!(names(&a), names(&b));
        assert_eq!(a.edges, b.edges);
    }

    #[test]
    fn single_sentence_becomes_one_leaf() {
        let (sentences, outcome) = chunk_text("Alice is an engineer at Acme.");
        assert_eq!(sentences.len(), 1);
        assert_eq!(outcome.leaves.len(), 1);
        assert_eq!(outcome.leaves[0].sentence_indices, vec![0]);
    }

    #[test]
    fn skeleton_edges_connect_existing_nodes() {
        let (_, outcome) = chunk_text(SAMPLE);
        let names: Vec<&str> = outcome.nodes.iter().map(|n| n.name.as_str()).collect();
        for edge in &outcome.edges {
            assert!(names.contains(&edge.source.as_str()));
            assert!(names.contains(&edge.target.as_str()));
        }
    }

    #[test]
    fn korean_text_chunks_and_partitions() {
        let text = "고려대학교의 교풍은 야성으로 대표된다. 무섭고 사나운 호랑이가 상징이다. \
            졸업생은 교우라고 불린다. 교우 사이의 유대는 매우 강하다. \
            연구에서는 집념과 저력을 발휘한다. 장기간의 꾸준한 연구가 강점이다.";
        let (sentences, outcome) = chunk_text(text);
        assert!(sentences.len() >= 4);
        let mut seen: Vec<usize> = outcome
            .leaves
            .iter()
            .flat_map(|l| l.sentence_indices.iter().copied())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..sentences.len()).collect::<Vec<_>>());
    }

    #[test]
    fn manual_chunks_cover_the_text() {
        let chunks = manual_chunks(SAMPLE);
        assert!(!chunks.is_empty());
        let joined = chunks.join(" ");
        assert!(joined.contains("Graph databases"));
        assert!(joined.contains("Retrieval quality"));
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(manual_chunks("").is_empty());
        let outcome = recursive_chunking(&[]);
        assert!(outcome.leaves.is_empty());
        assert!(outcome.nodes.is_empty());
    }
}
