//! Language-routed sentence encoder (Candle inference).
//!
//! Two BERT-family models are kept behind lazy cells: a multilingual model
//! for the Korean route and an English model. Routing is by script profile;
//! anything that is neither Korean nor English falls back to the Korean
//! route, which is multilingual. The sentence embedding is the first-token
//! hidden state, L2-normalized.
//!
//! Contract: deterministic for a given input and model; batch output order
//! equals input order; empty input yields the reserved null embedding and
//! never an error. Model I/O errors propagate to the caller; retry policy
//! lives with the orchestrator, not here.

use std::sync::Arc;

use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use hf_hub::{api::sync::Api, Repo, RepoType};
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tracing::info;

use crate::errors::EmbeddingError;
use crate::lang::{self, Lang};

/// Unified embedding dimension for both routes.
pub const EMBEDDING_DIM: usize = 384;

/// Token budget per sentence; longer inputs are truncated by the tokenizer.
const MAX_TOKENS: usize = 512;

const DTYPE: DType = DType::F32;

type Result<T> = std::result::Result<T, EmbeddingError>;

struct LoadedModel {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

struct EmbedderInner {
    ko_model_id: String,
    en_model_id: String,
    ko: OnceCell<LoadedModel>,
    en: OnceCell<LoadedModel>,
    device: Device,
}

/// Thread-safe, lazily loading sentence encoder.
///
/// `Arc` interior so the encoder can be cloned into `spawn_blocking` tasks.
#[derive(Clone)]
pub struct Embedder {
    inner: Arc<EmbedderInner>,
}

impl Embedder {
    pub fn new(ko_model_id: &str, en_model_id: &str) -> Self {
        Self {
            inner: Arc::new(EmbedderInner {
                ko_model_id: ko_model_id.to_string(),
                en_model_id: en_model_id.to_string(),
                ko: OnceCell::new(),
                en: OnceCell::new(),
                device: Device::Cpu,
            }),
        }
    }

    /// The reserved embedding for empty input.
    pub fn null_embedding() -> Vec<f32> {
        vec![0.0; EMBEDDING_DIM]
    }

    /// Embed a single text, routing by detected language.
    pub async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let lang = lang::detect(text);
        let mut out = self.encode_batch(vec![text.to_string()], lang).await?;
        Ok(out.pop().unwrap_or_else(Self::null_embedding))
    }

    /// Embed a batch on the route for `lang`. Output order equals input order.
    pub async fn encode_batch(&self, texts: Vec<String>, lang: Lang) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let embedder = self.clone();
        tokio::task::spawn_blocking(move || embedder.encode_batch_sync(&texts, lang))
            .await
            .map_err(|e| EmbeddingError::Inference(format!("blocking task panicked: {e}")))?
    }

    /// Synchronous batch encode; used directly from already-blocking contexts.
    pub fn encode_batch_sync(&self, texts: &[String], lang: Lang) -> Result<Vec<Vec<f32>>> {
        // Empty strings map to the null embedding without touching the model,
        // so an all-empty batch works even when no model can be loaded.
        let live: Vec<(usize, &str)> = texts
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.trim().is_empty())
            .map(|(i, t)| (i, t.as_str()))
            .collect();

        let mut out = vec![Self::null_embedding(); texts.len()];
        if live.is_empty() {
            return Ok(out);
        }

        let loaded = self.route(lang)?;
        let vectors = encode_with_model(loaded, &live.iter().map(|(_, t)| *t).collect::<Vec<_>>())?;
        for ((idx, _), vec) in live.into_iter().zip(vectors) {
            out[idx] = vec;
        }
        Ok(out)
    }

    fn route(&self, lang: Lang) -> Result<&LoadedModel> {
        match lang {
            Lang::En => self
                .inner
                .en
                .get_or_try_init(|| load_model(&self.inner.en_model_id, &self.inner.device)),
            // Korean route doubles as the fallback for unrecognized scripts.
            Lang::Ko | Lang::Other => self
                .inner
                .ko
                .get_or_try_init(|| load_model(&self.inner.ko_model_id, &self.inner.device)),
        }
    }
}

fn download_model_files(model_id: &str) -> Result<(PathBuf, PathBuf, PathBuf)> {
    let api = Api::new().map_err(|e| EmbeddingError::ModelLoad(format!("HF API: {e}")))?;
    let repo = Repo::with_revision(model_id.to_string(), RepoType::Model, "main".to_string());
    let api_repo = api.repo(repo);

    let config = api_repo
        .get("config.json")
        .map_err(|e| EmbeddingError::ModelLoad(format!("config.json: {e}")))?;
    let tokenizer = api_repo
        .get("tokenizer.json")
        .map_err(|e| EmbeddingError::ModelLoad(format!("tokenizer.json: {e}")))?;
    let weights = api_repo
        .get("model.safetensors")
        .map_err(|e| EmbeddingError::ModelLoad(format!("model.safetensors: {e}")))?;

    Ok((config, tokenizer, weights))
}

fn load_model(model_id: &str, device: &Device) -> Result<LoadedModel> {
    info!("Loading embedding model ({model_id})...");

    let (config_path, tokenizer_path, weights_path) = download_model_files(model_id)?;

    let config_str = std::fs::read_to_string(&config_path)
        .map_err(|e| EmbeddingError::ModelLoad(format!("read config: {e}")))?;
    let config: Config = serde_json::from_str(&config_str)
        .map_err(|e| EmbeddingError::ModelLoad(format!("parse config: {e}")))?;

    let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
        .map_err(|e| EmbeddingError::ModelLoad(format!("load tokenizer: {e}")))?;
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: MAX_TOKENS,
            ..Default::default()
        }))
        .map_err(|e| EmbeddingError::ModelLoad(format!("truncation config: {e}")))?;
    tokenizer.with_padding(Some(PaddingParams {
        strategy: PaddingStrategy::BatchLongest,
        ..Default::default()
    }));

    let vb = unsafe {
        VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, device)
            .map_err(|e| EmbeddingError::ModelLoad(format!("load weights: {e}")))?
    };
    let model = BertModel::load(vb, &config)
        .map_err(|e| EmbeddingError::ModelLoad(format!("build model: {e}")))?;

    info!("Embedding model loaded ({model_id}, dim={EMBEDDING_DIM})");

    Ok(LoadedModel {
        model,
        tokenizer,
        device: device.clone(),
    })
}

/// Forward pass; the first-token ([CLS]) hidden state is the sentence vector.
fn encode_with_model(loaded: &LoadedModel, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
    let encodings = loaded
        .tokenizer
        .encode_batch(texts.to_vec(), true)
        .map_err(|e| EmbeddingError::Tokenization(e.to_string()))?;

    let token_ids: Vec<Tensor> = encodings
        .iter()
        .map(|enc| Tensor::new(enc.get_ids(), &loaded.device))
        .collect::<candle_core::Result<Vec<_>>>()
        .map_err(|e| EmbeddingError::Inference(format!("token tensor: {e}")))?;
    let attention_masks: Vec<Tensor> = encodings
        .iter()
        .map(|enc| Tensor::new(enc.get_attention_mask(), &loaded.device))
        .collect::<candle_core::Result<Vec<_>>>()
        .map_err(|e| EmbeddingError::Inference(format!("attention mask: {e}")))?;

    let token_ids = Tensor::stack(&token_ids, 0)
        .map_err(|e| EmbeddingError::Inference(format!("stack tokens: {e}")))?;
    let attention_mask = Tensor::stack(&attention_masks, 0)
        .map_err(|e| EmbeddingError::Inference(format!("stack masks: {e}")))?;
    let token_type_ids = token_ids
        .zeros_like()
        .map_err(|e| EmbeddingError::Inference(format!("token types: {e}")))?;

    let sequence_output = loaded
        .model
        .forward(&token_ids, &token_type_ids, Some(&attention_mask))
        .map_err(|e| EmbeddingError::Inference(format!("forward pass: {e}")))?;

    let first_token = sequence_output
        .i((.., 0))
        .map_err(|e| EmbeddingError::Inference(format!("first-token select: {e}")))?;
    let normalized = normalize_l2(&first_token)?;

    (0..normalized.dim(0).map_err(|e| EmbeddingError::Inference(e.to_string()))?)
        .map(|i| {
            normalized
                .get(i)
                .and_then(|t| t.to_vec1::<f32>())
                .map_err(|e| EmbeddingError::Inference(format!("convert embedding: {e}")))
        })
        .collect()
}

fn normalize_l2(v: &Tensor) -> Result<Tensor> {
    v.broadcast_div(
        &v.sqr()
            .and_then(|s| s.sum_keepdim(1))
            .and_then(|s| s.sqrt())
            .map_err(|e| EmbeddingError::Inference(format!("L2 norm: {e}")))?,
    )
    .map_err(|e| EmbeddingError::Inference(format!("L2 norm: {e}")))
}

/// Cosine similarity between two vectors of equal length.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

/// Element-wise mean of a non-empty set of equal-length vectors.
pub fn mean_vector(vectors: &[Vec<f32>]) -> Vec<f32> {
    if vectors.is_empty() {
        return Embedder::null_embedding();
    }
    let dim = vectors[0].len();
    let mut out = vec![0.0f32; dim];
    for v in vectors {
        for (o, x) in out.iter_mut().zip(v) {
            *o += x;
        }
    }
    let n = vectors.len() as f32;
    for o in out.iter_mut() {
        *o /= n;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedder() -> Embedder {
        Embedder::new(
            "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2",
            "sentence-transformers/all-MiniLM-L6-v2",
        )
    }

    #[tokio::test]
    async fn empty_input_yields_null_embedding_without_model() {
        let e = embedder();
        let out = e
            .encode_batch(vec!["".to_string(), "   ".to_string()], Lang::En)
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|v| v == &Embedder::null_embedding()));
    }

    #[test]
    fn cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn mean_vector_averages_components() {
        let mean = mean_vector(&[vec![1.0, 3.0], vec![3.0, 5.0]]);
        assert_eq!(mean, vec![2.0, 4.0]);
    }

    #[tokio::test]
    #[ignore] // Requires model download
    async fn batch_preserves_order_and_dimension() {
        let e = embedder();
        let out = e
            .encode_batch(
                vec!["first sentence".to_string(), "second sentence".to_string()],
                Lang::En,
            )
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].len(), EMBEDDING_DIM);
        assert_ne!(out[0], out[1]);
    }

    #[tokio::test]
    #[ignore] // Requires model download
    async fn deterministic_for_same_input() {
        let e = embedder();
        let a = e.encode("고려대학교").await.unwrap();
        let b = e.encode("고려대학교").await.unwrap();
        assert_eq!(a, b);
    }
}
