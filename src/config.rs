use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable holding the embedding/generation backend key.
pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";
/// Environment variable holding the vector index key.
pub const PINECONE_API_KEY: &str = "PINECONE_API_KEY";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub fragments: FragmentsConfig,
    #[serde(default)]
    pub session: SessionConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Number of candidates requested from similarity search.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Maximum number of fragments returned for display per response.
    #[serde(default = "default_fragment_limit")]
    pub fragment_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            fragment_limit: default_fragment_limit(),
        }
    }
}

fn default_top_k() -> usize {
    20
}
fn default_fragment_limit() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_embed_model")]
    pub embed_model: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_model_url")]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            embed_model: default_embed_model(),
            chat_model: default_chat_model(),
            url: default_model_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embed_model() -> String {
    "text-embedding-004".to_string()
}
fn default_chat_model() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_model_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Vector index query endpoint host (e.g. `https://docs-abc123.svc.pinecone.io`).
    /// When absent, search goes straight to the relational fallback.
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            host: None,
            namespace: default_namespace(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_namespace() -> String {
    "ns1".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct FragmentsConfig {
    /// Base directory for filesystem-resident chunk files.
    #[serde(default = "default_fragments_dir")]
    pub dir: PathBuf,
}

impl Default for FragmentsConfig {
    fn default() -> Self {
        Self {
            dir: default_fragments_dir(),
        }
    }
}

fn default_fragments_dir() -> PathBuf {
    PathBuf::from("./data/chunks")
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Session time-to-live in seconds. The window is fixed at creation
    /// and not refreshed by appends.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_ttl_secs() -> i64 {
    1800
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.overlap must be smaller than chunking.chunk_size");
    }
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.session.ttl_secs <= 0 {
        anyhow::bail!("session.ttl_secs must be > 0");
    }

    // Missing credentials degrade the pipeline at query time; surface
    // them at startup but do not refuse to run.
    if std::env::var(GEMINI_API_KEY).is_err() {
        warn!(
            "{} not set; embedding and generation calls will fail",
            GEMINI_API_KEY
        );
    }
    if config.index.host.is_some() && std::env::var(PINECONE_API_KEY).is_err() {
        warn!(
            "{} not set; vector index queries will fall back to the local store",
            PINECONE_API_KEY
        );
    }

    Ok(config)
}
