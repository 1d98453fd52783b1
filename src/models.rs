use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A source document produced by the loader. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Document {
    pub fn new(id: Option<String>, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// A bounded slice of a source document — the unit of indexing and retrieval.
/// Created by the splitter, never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub chunk_index: usize,
    pub chunk_count: usize,
    pub parent_id: Option<String>,
}

impl Chunk {
    /// Human-readable provenance label used in prompts and reply details.
    pub fn source_label(&self) -> String {
        self.metadata
            .get("file_name")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .or_else(|| self.parent_id.clone())
            .unwrap_or_else(|| "unknown source".to_string())
    }
}

/// A retrieval result: one chunk with its (possibly fused) relevance score.
/// Ephemeral, produced per query, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// How the agent produced a reply.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    Tool,
    Rag,
    Direct,
    Fallback,
    Error,
}

/// One retrieved context entry as echoed back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ContextDocument {
    pub id: Option<String>,
    pub content: String,
    pub source: String,
    pub score: f32,
}

/// Structured detail block attached to an agent reply.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplyDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_documents: Option<Vec<ContextDocument>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieved_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<bool>,
}

/// Uniform response envelope returned for every message the agent handles.
#[derive(Debug, Clone, Serialize)]
pub struct AgentReply {
    pub text: String,
    #[serde(rename = "response_kind")]
    pub kind: ResponseKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ReplyDetails>,
}

/// Chat request
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default = "default_true")]
    pub use_rag: bool,
}

fn default_true() -> bool {
    true
}

/// Ingestion summary returned by POST /api/ingest.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub indexed: usize,
}
