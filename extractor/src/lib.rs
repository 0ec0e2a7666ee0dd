//! Rule-based text-to-graph extraction.
//!
//! Pipeline: sentence segmentation → per-sentence tokenization → recursive
//! topical chunking (seeded LDA + TF-IDF representatives) → node/edge
//! assembly with per-keyword embeddings.
//!
//! With a fixed topic-model seed, identical input yields identical nodes and
//! edges apart from vector-point UUIDs.

pub mod assemble;
pub mod chunking;
pub mod errors;
pub mod sentences;
pub mod tokenize;
pub mod topics;

pub use assemble::{extract_graph_components, Extraction};
pub use chunking::manual_chunks;
pub use errors::ExtractionError;
