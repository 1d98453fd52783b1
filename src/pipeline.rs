//! The RAG pipeline: retrieve context, assemble a grounded prompt, delegate
//! generation, and package the result with the chunks actually used.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use crate::llm::chat::ChatClient;
use crate::models::{ContextDocument, ScoredChunk};
use crate::search::hybrid::Retriever;

const RAG_SYSTEM_PROMPT: &str =
    "You are a knowledge-base question answering assistant. Answer strictly \
     from the context supplied with each question.";

/// The sentence the generator is instructed to emit when no supplied chunk
/// answers the question.
pub const CANNOT_ANSWER: &str = "I cannot answer this question from the provided context.";

/// Everything one pipeline run produced, kept for auditability.
#[derive(Debug, Clone, Serialize)]
pub struct RagOutcome {
    pub query: String,
    pub response: String,
    pub context: Vec<ContextDocument>,
    pub retrieved_count: usize,
    pub used_count: usize,
    /// True when a retrieval source errored and the query proceeded on the
    /// surviving source.
    pub degraded: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    pub pipeline_runs: u64,
    pub retrieval_count: u64,
    pub llm_calls: u64,
    pub top_k: usize,
}

pub struct RagPipeline {
    retriever: Arc<Retriever>,
    chat: Arc<ChatClient>,
    top_k: usize,
    pipeline_runs: AtomicU64,
    retrieval_count: AtomicU64,
    llm_calls: AtomicU64,
}

impl RagPipeline {
    pub fn new(retriever: Arc<Retriever>, chat: Arc<ChatClient>, top_k: usize) -> Self {
        Self {
            retriever,
            chat,
            top_k,
            pipeline_runs: AtomicU64::new(0),
            retrieval_count: AtomicU64::new(0),
            llm_calls: AtomicU64::new(0),
        }
    }

    /// Run the full pipeline for one query. `k` overrides the configured
    /// `top_k` when given.
    ///
    /// An error here means retrieval itself failed; generation failures are
    /// the chat collaborator's never-raise contract and surface as
    /// placeholder text in the response instead.
    pub async fn run(&self, query: &str, k: Option<usize>) -> Result<RagOutcome> {
        self.pipeline_runs.fetch_add(1, Ordering::Relaxed);
        let k = k.unwrap_or(self.top_k);

        self.retrieval_count.fetch_add(1, Ordering::Relaxed);
        let retrieved = self.retriever.retrieve_with_score(query, k).await?;

        let prompt = build_prompt(query, &retrieved.hits);

        self.llm_calls.fetch_add(1, Ordering::Relaxed);
        let response = match self.chat.chat(RAG_SYSTEM_PROMPT, &prompt).await {
            Ok(text) => text,
            Err(e) => e.user_message(),
        };

        let context: Vec<ContextDocument> = retrieved
            .hits
            .iter()
            .map(|hit| ContextDocument {
                id: hit.chunk.id.clone(),
                content: hit.chunk.text.clone(),
                source: hit.chunk.source_label(),
                score: hit.score,
            })
            .collect();

        Ok(RagOutcome {
            query: query.to_string(),
            response,
            retrieved_count: context.len(),
            used_count: context.len().min(k),
            context,
            degraded: retrieved.degraded,
        })
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            pipeline_runs: self.pipeline_runs.load(Ordering::Relaxed),
            retrieval_count: self.retrieval_count.load(Ordering::Relaxed),
            llm_calls: self.llm_calls.load(Ordering::Relaxed),
            top_k: self.top_k,
        }
    }
}

/// Assemble the grounded prompt: each retrieved chunk enumerated with its
/// source, then the question, then the grounding rules.
fn build_prompt(query: &str, hits: &[ScoredChunk]) -> String {
    let mut context_block = String::new();
    if hits.is_empty() {
        context_block.push_str("(no relevant context was found for this question)\n");
    } else {
        for (i, hit) in hits.iter().enumerate() {
            let _ = write!(
                context_block,
                "Context {} (source: {}):\n{}\n\n",
                i + 1,
                hit.chunk.source_label(),
                hit.chunk.text
            );
        }
    }

    format!(
        "Answer the user's question using only the context below.\n\n\
         Context:\n{context_block}\n\
         Question: {query}\n\n\
         Rules:\n\
         1. The answer must come from the provided context; add no outside knowledge.\n\
         2. If no context is relevant, reply exactly: \"{CANNOT_ANSWER}\"\n\
         3. Keep the answer concise and answer in the language of the question.\n\
         4. You may cite sources, e.g. \"according to guide.md\"."
    )
}
