//! Topic modeling and keyword ranking.
//!
//! A small collapsed-Gibbs LDA stands in for a library implementation; the
//! sampler is seeded so a given input always yields the same topics. TF-IDF
//! ranks candidate representatives across sibling chunks.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

const ALPHA: f64 = 0.1;
const BETA: f64 = 0.01;

/// Seeded LDA over tokenized sentences.
pub struct TopicModel {
    vocab: Vec<String>,
    vocab_index: HashMap<String, usize>,
    /// Topic-word distributions, `[topic][word]`.
    phi: Vec<Vec<f64>>,
    num_topics: usize,
}

impl TopicModel {
    /// Fit on one document per sentence. `passes` full Gibbs sweeps.
    pub fn fit(docs: &[Vec<String>], num_topics: usize, passes: usize, seed: u64) -> Self {
        let mut vocab_index: HashMap<String, usize> = HashMap::new();
        let mut vocab: Vec<String> = Vec::new();
        let docs_ids: Vec<Vec<usize>> = docs
            .iter()
            .map(|doc| {
                doc.iter()
                    .map(|w| {
                        *vocab_index.entry(w.clone()).or_insert_with(|| {
                            vocab.push(w.clone());
                            vocab.len() - 1
                        })
                    })
                    .collect()
            })
            .collect();

        let v = vocab.len();
        if v == 0 {
            return Self {
                vocab,
                vocab_index,
                phi: vec![vec![]; num_topics],
                num_topics,
            };
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut n_dk = vec![vec![0usize; num_topics]; docs_ids.len()];
        let mut n_kw = vec![vec![0usize; v]; num_topics];
        let mut n_k = vec![0usize; num_topics];
        let mut assignments: Vec<Vec<usize>> = Vec::with_capacity(docs_ids.len());

        for (d, doc) in docs_ids.iter().enumerate() {
            let mut z_doc = Vec::with_capacity(doc.len());
            for &w in doc {
                let z = rng.gen_range(0..num_topics);
                n_dk[d][z] += 1;
                n_kw[z][w] += 1;
                n_k[z] += 1;
                z_doc.push(z);
            }
            assignments.push(z_doc);
        }

        let mut weights = vec![0.0f64; num_topics];
        for _ in 0..passes {
            for (d, doc) in docs_ids.iter().enumerate() {
                for (i, &w) in doc.iter().enumerate() {
                    let z_old = assignments[d][i];
                    n_dk[d][z_old] -= 1;
                    n_kw[z_old][w] -= 1;
                    n_k[z_old] -= 1;

                    let mut total = 0.0;
                    for k in 0..num_topics {
                        let weight = (n_dk[d][k] as f64 + ALPHA)
                            * (n_kw[k][w] as f64 + BETA)
                            / (n_k[k] as f64 + v as f64 * BETA);
                        weights[k] = weight;
                        total += weight;
                    }

                    let mut target = rng.gen::<f64>() * total;
                    let mut z_new = num_topics - 1;
                    for (k, weight) in weights.iter().enumerate() {
                        target -= weight;
                        if target <= 0.0 {
                            z_new = k;
                            break;
                        }
                    }

                    assignments[d][i] = z_new;
                    n_dk[d][z_new] += 1;
                    n_kw[z_new][w] += 1;
                    n_k[z_new] += 1;
                }
            }
        }

        let phi = (0..num_topics)
            .map(|k| {
                (0..v)
                    .map(|w| (n_kw[k][w] as f64 + BETA) / (n_k[k] as f64 + v as f64 * BETA))
                    .collect()
            })
            .collect();

        Self {
            vocab,
            vocab_index,
            phi,
            num_topics,
        }
    }

    /// Fold-in inference: topic weights accumulated over known words,
    /// normalized to a distribution. Uniform when nothing is in vocabulary.
    pub fn topic_distribution(&self, doc: &[String]) -> Vec<f64> {
        let mut theta = vec![ALPHA; self.num_topics];
        for word in doc {
            if let Some(&w) = self.vocab_index.get(word) {
                for k in 0..self.num_topics {
                    theta[k] += self.phi[k][w];
                }
            }
        }
        let total: f64 = theta.iter().sum();
        theta.iter().map(|t| t / total).collect()
    }

    /// Highest-probability term of a topic.
    pub fn top_term(&self, topic: usize) -> Option<String> {
        let dist = self.phi.get(topic)?;
        dist.iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(w, _)| self.vocab[w].clone())
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }
}

pub fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let nb: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

/// Pairwise cosine similarity.
pub fn similarity_matrix(vectors: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = vectors.len();
    let mut matrix = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in i..n {
            let sim = cosine(&vectors[i], &vectors[j]);
            matrix[i][j] = sim;
            matrix[j][i] = sim;
        }
    }
    matrix
}

/// Top-n TF-IDF terms per group, computed across the sibling groups.
/// Ties break on term order for determinism.
pub fn tfidf_keywords(groups: &[Vec<String>], topn: usize) -> Vec<Vec<String>> {
    let n_docs = groups.len();
    let mut doc_freq: HashMap<&str, usize> = HashMap::new();
    for group in groups {
        let mut seen: Vec<&str> = Vec::new();
        for token in group {
            if !seen.contains(&token.as_str()) {
                seen.push(token);
                *doc_freq.entry(token).or_insert(0) += 1;
            }
        }
    }

    groups
        .iter()
        .map(|group| {
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for token in group {
                *counts.entry(token).or_insert(0) += 1;
            }
            let mut scored: Vec<(&str, f64)> = counts
                .into_iter()
                .map(|(term, tf)| {
                    let df = doc_freq.get(term).copied().unwrap_or(0);
                    let idf = ((1.0 + n_docs as f64) / (1.0 + df as f64)).ln() + 1.0;
                    (term, tf as f64 * idf)
                })
                .collect();
            scored.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.0.cmp(&b.0))
            });
            scored.into_iter().take(topn).map(|(t, _)| t.to_string()).collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs() -> Vec<Vec<String>> {
        vec![
            vec!["graph".into(), "node".into(), "edge".into()],
            vec!["graph".into(), "node".into()],
            vec!["vector".into(), "search".into(), "index".into()],
            vec!["vector".into(), "index".into()],
        ]
    }

    #[test]
    fn fit_is_deterministic_for_a_seed() {
        let a = TopicModel::fit(&docs(), 5, 10, 35);
        let b = TopicModel::fit(&docs(), 5, 10, 35);
        assert_eq!(a.top_term(0), b.top_term(0));
        assert_eq!(a.topic_distribution(&docs()[0]), b.topic_distribution(&docs()[0]));
    }

    #[test]
    fn distributions_are_normalized() {
        let model = TopicModel::fit(&docs(), 5, 10, 35);
        let dist = model.topic_distribution(&docs()[0]);
        assert_eq!(dist.len(), 5);
        assert!((dist.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn empty_corpus_degrades_gracefully() {
        let model = TopicModel::fit(&[], 5, 10, 35);
        assert_eq!(model.vocab_size(), 0);
        assert!(model.top_term(0).is_none());
        let dist = model.topic_distribution(&["unseen".into()]);
        assert!((dist.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn similarity_matrix_is_symmetric_with_unit_diagonal() {
        let vectors = vec![vec![1.0, 0.0], vec![0.7, 0.3], vec![0.0, 1.0]];
        let matrix = similarity_matrix(&vectors);
        for i in 0..3 {
            assert!((matrix[i][i] - 1.0).abs() < 1e-9);
            for j in 0..3 {
                assert!((matrix[i][j] - matrix[j][i]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn tfidf_prefers_distinctive_terms() {
        let groups = vec![
            vec!["shared".into(), "alpha".into(), "alpha".into()],
            vec!["shared".into(), "beta".into()],
        ];
        let keywords = tfidf_keywords(&groups, 2);
        assert_eq!(keywords[0][0], "alpha");
        assert_eq!(keywords[1][0], "beta");
    }
}
