use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;

use crate::agent::AgentService;
use crate::chunking::{split_documents, TextSplitter};
use crate::config::Config;
use crate::llm::chat::ChatClient;
use crate::llm::embeddings::EmbeddingClient;
use crate::loader::load_directory;
use crate::models::IngestReport;
use crate::pipeline::RagPipeline;
use crate::search::bm25::{Bm25Index, Bm25Params};
use crate::search::hybrid::RetrieverBuilder;
use crate::search::vector::{Metric, VectorIndex};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub vectors: Arc<VectorIndex>,
    pub bm25: Arc<RwLock<Bm25Index>>,
    pub embedder: Arc<EmbeddingClient>,
    pub agent: Arc<AgentService>,
    pub chat_semaphore: Arc<tokio::sync::Semaphore>,
}

impl AppState {
    /// Open the persisted index, build the lexical index from the same
    /// corpus, and wire retriever → pipeline → agent from the configuration.
    pub fn new(config: Config) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(120))
            .build()?;

        let vectors = Arc::new(
            VectorIndex::open_or_create(
                &config.vector_dir(),
                &config.collection,
                config.llm.embedding_dim,
                Metric::Cosine,
            )
            .context("Failed to open vector index")?,
        );

        let bm25 = Arc::new(RwLock::new(Bm25Index::build(
            vectors.chunks(),
            Bm25Params::default(),
        )));

        let embedder = Arc::new(EmbeddingClient::new(http_client.clone(), config.llm.clone()));
        let chat = Arc::new(ChatClient::new(http_client, config.llm.clone()));

        let retriever = Arc::new(
            RetrieverBuilder::new()
                .vector(vectors.clone(), embedder.clone())
                .lexical(bm25.clone())
                .weights(
                    config.retrieval.vector_weight,
                    config.retrieval.bm25_weight,
                )
                .build(config.retrieval.retriever)
                .context("Failed to build retriever")?,
        );

        let pipeline = Arc::new(RagPipeline::new(
            retriever,
            chat.clone(),
            config.retrieval.top_k,
        ));
        let agent = Arc::new(AgentService::new(chat, Some(pipeline)));

        Ok(Self {
            config,
            vectors,
            bm25,
            embedder,
            agent,
            chat_semaphore: Arc::new(tokio::sync::Semaphore::new(3)),
        })
    }

    /// Ingest the configured document directory: load, split, embed, index,
    /// persist, and rebuild the lexical index over the grown corpus.
    pub async fn ingest(&self) -> Result<IngestReport> {
        let documents = load_directory(&self.config.document_dir);
        tracing::info!(
            "Loaded {} documents from {}",
            documents.len(),
            self.config.document_dir.display()
        );

        let splitter = TextSplitter::new(
            self.config.retrieval.chunk_size,
            self.config.retrieval.chunk_overlap,
        )
        .context("Invalid chunking configuration")?;

        let chunks = split_documents(&splitter, &documents);
        if chunks.is_empty() {
            return Ok(IngestReport {
                documents: documents.len(),
                chunks: 0,
                indexed: 0,
            });
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self
            .embedder
            .embed_many(&texts)
            .await
            .context("Embedding generation failed during ingestion")?;

        let before = self.vectors.len();
        for (chunk, embedding) in chunks.iter().cloned().zip(embeddings) {
            self.vectors.add(chunk, embedding)?;
        }
        let indexed = self.vectors.len() - before;
        self.vectors.persist().context("Failed to persist index")?;

        // Rebuild BM25 over the full post-ingestion corpus.
        let rebuilt = Bm25Index::build(self.vectors.chunks(), Bm25Params::default());
        *self.bm25.write() = rebuilt;

        tracing::info!(
            "Ingestion complete: {} chunks indexed ({} total entries)",
            indexed,
            self.vectors.len()
        );

        Ok(IngestReport {
            documents: documents.len(),
            chunks: chunks.len(),
            indexed,
        })
    }
}
