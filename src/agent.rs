//! The agent orchestrator: a per-message state machine routing between the
//! calculator tool, the RAG pipeline, and direct generation, with a
//! RAG→direct fallback on pipeline failure. Every path terminates in an
//! [`AgentReply`] — no error below this boundary reaches the caller raw.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::llm::chat::ChatClient;
use crate::models::{AgentReply, ReplyDetails, ResponseKind};
use crate::pipeline::{PipelineStats, RagPipeline};
use crate::tools::calculator;

/// Reserved prefix that routes a message to the calculator tool.
const CALC_PREFIX: &str = "calc:";

const BASE_SYSTEM_PROMPT: &str =
    "You are a knowledge-base assistant for developers. Answer questions \
     clearly and concisely, use precise terminology, and reply in the same \
     language as the user's message. If you cannot reach supporting \
     information, say so and give the most helpful answer you can.";

#[derive(Debug, Clone, Serialize)]
pub struct AgentStats {
    pub total_calls: u64,
    pub tool_replies: u64,
    pub rag_replies: u64,
    pub direct_replies: u64,
    pub fallback_replies: u64,
    pub error_replies: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<PipelineStats>,
}

pub struct AgentService {
    chat: Arc<ChatClient>,
    pipeline: Option<Arc<RagPipeline>>,
    total_calls: AtomicU64,
    tool_replies: AtomicU64,
    rag_replies: AtomicU64,
    direct_replies: AtomicU64,
    fallback_replies: AtomicU64,
    error_replies: AtomicU64,
}

impl AgentService {
    pub fn new(chat: Arc<ChatClient>, pipeline: Option<Arc<RagPipeline>>) -> Self {
        Self {
            chat,
            pipeline,
            total_calls: AtomicU64::new(0),
            tool_replies: AtomicU64::new(0),
            rag_replies: AtomicU64::new(0),
            direct_replies: AtomicU64::new(0),
            fallback_replies: AtomicU64::new(0),
            error_replies: AtomicU64::new(0),
        }
    }

    /// Handle one user message. The transition order is fixed: tool prefix
    /// first, then RAG when requested and configured, then direct
    /// generation.
    pub async fn handle_message(&self, message: &str, use_rag: bool) -> AgentReply {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        let text = message.trim();

        if text.to_lowercase().starts_with(CALC_PREFIX) {
            let expression = text[CALC_PREFIX.len()..].trim();
            return self.count(self.run_calculator(expression));
        }

        if use_rag {
            if let Some(pipeline) = &self.pipeline {
                return self.count(self.run_rag(pipeline, text).await);
            }
        }

        self.count(self.run_direct(text).await)
    }

    fn run_calculator(&self, expression: &str) -> AgentReply {
        if expression.is_empty() {
            return AgentReply {
                text: format!(
                    "Provide an expression after {CALC_PREFIX}, for example: {CALC_PREFIX} 1+2*3"
                ),
                kind: ResponseKind::Tool,
                tool_name: Some(calculator::TOOL_NAME.to_string()),
                details: None,
            };
        }

        match calculator::evaluate(expression) {
            Ok(result) => AgentReply {
                text: format!("The expression {expression} evaluates to {result}"),
                kind: ResponseKind::Tool,
                tool_name: Some(calculator::TOOL_NAME.to_string()),
                details: Some(ReplyDetails {
                    expression: Some(expression.to_string()),
                    result: Some(result),
                    ..Default::default()
                }),
            },
            Err(e) => AgentReply {
                text: format!("Calculation failed: {e}"),
                kind: ResponseKind::Error,
                tool_name: Some(calculator::TOOL_NAME.to_string()),
                details: Some(ReplyDetails {
                    expression: Some(expression.to_string()),
                    error: Some(e.to_string()),
                    ..Default::default()
                }),
            },
        }
    }

    async fn run_rag(&self, pipeline: &Arc<RagPipeline>, message: &str) -> AgentReply {
        match pipeline.run(message, None).await {
            Ok(outcome) => AgentReply {
                text: outcome.response.clone(),
                kind: ResponseKind::Rag,
                tool_name: None,
                details: Some(ReplyDetails {
                    context_documents: Some(outcome.context),
                    retrieved_count: Some(outcome.retrieved_count),
                    used_count: Some(outcome.used_count),
                    degraded: Some(outcome.degraded),
                    ..Default::default()
                }),
            },
            Err(e) => {
                tracing::warn!("RAG pipeline failed, falling back to direct generation: {e:#}");
                let text = self.generate_direct(message).await;
                AgentReply {
                    text,
                    kind: ResponseKind::Fallback,
                    tool_name: None,
                    details: Some(ReplyDetails {
                        error: Some(format!("{e:#}")),
                        ..Default::default()
                    }),
                }
            }
        }
    }

    async fn run_direct(&self, message: &str) -> AgentReply {
        AgentReply {
            text: self.generate_direct(message).await,
            kind: ResponseKind::Direct,
            tool_name: None,
            details: None,
        }
    }

    /// Direct generation with the base system prompt. Chat failures become
    /// their placeholder text here — the orchestrator boundary.
    async fn generate_direct(&self, message: &str) -> String {
        match self.chat.chat(BASE_SYSTEM_PROMPT, message).await {
            Ok(text) => text,
            Err(e) => e.user_message(),
        }
    }

    fn count(&self, reply: AgentReply) -> AgentReply {
        let counter = match reply.kind {
            ResponseKind::Tool => &self.tool_replies,
            ResponseKind::Rag => &self.rag_replies,
            ResponseKind::Direct => &self.direct_replies,
            ResponseKind::Fallback => &self.fallback_replies,
            ResponseKind::Error => &self.error_replies,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        reply
    }

    pub fn stats(&self) -> AgentStats {
        AgentStats {
            total_calls: self.total_calls.load(Ordering::Relaxed),
            tool_replies: self.tool_replies.load(Ordering::Relaxed),
            rag_replies: self.rag_replies.load(Ordering::Relaxed),
            direct_replies: self.direct_replies.load(Ordering::Relaxed),
            fallback_replies: self.fallback_replies.load(Ordering::Relaxed),
            error_replies: self.error_replies.load(Ordering::Relaxed),
            pipeline: self.pipeline.as_ref().map(|p| p.stats()),
        }
    }
}
