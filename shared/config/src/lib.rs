//! Environment-driven configuration for MindGraph.
//!
//! Every external endpoint and tunable is resolved once at startup and passed
//! through [`AppConfig`]; nothing reads the environment after boot.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP listen port
    pub port: u16,
    /// Directory holding sqlite.db and other local state
    pub data_dir: PathBuf,
    /// Neo4j bolt endpoint
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    /// Qdrant HTTP endpoint
    pub qdrant_url: String,
    /// Ollama daemon endpoint
    pub ollama_url: String,
    /// Default local model when the request does not name one
    pub ollama_model: String,
    /// Default hosted model when the request does not name one
    pub openai_model: String,
    /// HF model id for the Korean embedding route
    pub embedding_model_ko: String,
    /// HF model id for the English embedding route
    pub embedding_model_en: String,
    /// Top-k for vector search
    pub search_k: usize,
    /// Timeout applied to graph / vector / LLM calls
    pub external_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            port: env_parsed("MINDGRAPH_PORT", 8000),
            data_dir: PathBuf::from(env_or("MINDGRAPH_DATA_DIR", "data")),
            neo4j_uri: env_or("NEO4J_URI", "bolt://localhost:7687"),
            neo4j_user: env_or("NEO4J_USER", "neo4j"),
            neo4j_password: env_or("NEO4J_PASSWORD", "password"),
            qdrant_url: env_or("QDRANT_URL", "http://localhost:6334"),
            ollama_url: env_or("OLLAMA_URL", "http://localhost:11434"),
            ollama_model: env_or("OLLAMA_MODEL", "llama3.1"),
            openai_model: env_or("OPENAI_MODEL", "gpt-4o"),
            embedding_model_ko: env_or(
                "EMBEDDING_MODEL_KO",
                "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2",
            ),
            embedding_model_en: env_or("EMBEDDING_MODEL_EN", "sentence-transformers/all-MiniLM-L6-v2"),
            search_k: env_parsed("SEARCH_TOP_K", 5),
            external_timeout: Duration::from_secs(env_parsed("EXTERNAL_TIMEOUT_SECS", 120)),
        }
    }

    /// Path of the metadata database file
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("sqlite.db")
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve_without_env() {
        let config = AppConfig::from_env();
        assert!(config.port > 0);
        assert_eq!(config.sqlite_path().file_name().unwrap(), "sqlite.db");
        assert!(config.search_k >= 1);
    }
}
