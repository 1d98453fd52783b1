use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where index data is stored
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// Directory scanned for documents at ingestion time
    pub document_dir: PathBuf,
    /// Collection name used for the persisted index files
    pub collection: String,
    /// LLM provider configuration
    pub llm: LlmConfig,
    /// Retrieval and chunking configuration
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL for the OpenAI-compatible API
    pub base_url: String,
    /// Model name for chat
    pub chat_model: String,
    /// Model name for embeddings
    pub embedding_model: String,
    /// API key; absence degrades chat to a placeholder reply
    pub api_key: Option<String>,
    /// Embedding vector dimension
    pub embedding_dim: usize,
    /// Texts per embedding API request
    pub embedding_batch_size: usize,
    /// Per-request timeout in seconds for chat and embedding calls
    pub request_timeout_secs: u64,
}

/// Which retrieval sources a query consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrieverKind {
    VectorOnly,
    LexicalOnly,
    Hybrid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Shared boundary length, must stay below chunk_size
    pub chunk_overlap: usize,
    /// Results returned per query
    pub top_k: usize,
    /// Fusion weight applied to normalized vector scores
    pub vector_weight: f32,
    /// Fusion weight applied to normalized BM25 scores
    pub bm25_weight: f32,
    /// Retrieval source selection
    pub retriever: RetrieverKind,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:9100".to_string(),
            document_dir: PathBuf::from("./documents"),
            collection: "kb_agent".to_string(),
            llm: LlmConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            api_key: None,
            embedding_dim: 1536,
            embedding_batch_size: 64,
            request_timeout_secs: 30,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 128,
            top_k: 4,
            vector_weight: 0.6,
            bm25_weight: 0.4,
            retriever: RetrieverKind::Hybrid,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("KB_AGENT_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("KB_AGENT_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(dir) = std::env::var("KB_AGENT_DOCUMENT_DIR") {
            config.document_dir = PathBuf::from(dir);
        }
        if let Ok(name) = std::env::var("KB_AGENT_COLLECTION") {
            config.collection = name;
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Ok(model) = std::env::var("LLM_EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            if !key.is_empty() {
                config.llm.api_key = Some(key);
            }
        }
        if let Ok(dim) = std::env::var("LLM_EMBEDDING_DIM") {
            if let Ok(d) = dim.parse() {
                config.llm.embedding_dim = d;
            }
        }
        if let Ok(val) = std::env::var("LLM_EMBEDDING_BATCH_SIZE") {
            if let Ok(v) = val.parse() {
                config.llm.embedding_batch_size = v;
            }
        }
        if let Ok(val) = std::env::var("LLM_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                config.llm.request_timeout_secs = v;
            }
        }
        if let Ok(val) = std::env::var("RAG_TOP_K") {
            if let Ok(v) = val.parse() {
                config.retrieval.top_k = v;
            }
        }
        if let Ok(val) = std::env::var("RAG_CHUNK_SIZE") {
            if let Ok(v) = val.parse() {
                config.retrieval.chunk_size = v;
            }
        }
        if let Ok(val) = std::env::var("RAG_CHUNK_OVERLAP") {
            if let Ok(v) = val.parse() {
                config.retrieval.chunk_overlap = v;
            }
        }
        if let Ok(val) = std::env::var("RAG_VECTOR_WEIGHT") {
            if let Ok(v) = val.parse::<f32>() {
                if v >= 0.0 {
                    config.retrieval.vector_weight = v;
                }
            }
        }
        if let Ok(val) = std::env::var("RAG_BM25_WEIGHT") {
            if let Ok(v) = val.parse::<f32>() {
                if v >= 0.0 {
                    config.retrieval.bm25_weight = v;
                }
            }
        }
        if let Ok(val) = std::env::var("RAG_RETRIEVER") {
            match val.as_str() {
                "vector" => config.retrieval.retriever = RetrieverKind::VectorOnly,
                "bm25" => config.retrieval.retriever = RetrieverKind::LexicalOnly,
                "hybrid" => config.retrieval.retriever = RetrieverKind::Hybrid,
                other => tracing::warn!("Unknown RAG_RETRIEVER '{other}', keeping default"),
            }
        }

        config
    }

    pub fn vector_dir(&self) -> PathBuf {
        self.data_dir.join("vectors")
    }
}
