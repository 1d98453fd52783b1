//! # kb-agent
//!
//! A knowledge-base agent service: documents are chunked and indexed twice
//! (a persisted brute-force vector index and an in-memory BM25 index),
//! retrieved by weighted score fusion, and used to ground chat-completion
//! calls. An agent layer routes each message to a deterministic calculator
//! tool, the RAG pipeline, or direct generation, falling back to direct
//! generation when the pipeline fails.
//!
//! ## Pipeline
//!
//! ```text
//!   documents ──▶ splitter ──▶ chunks ──┬─▶ vector index (persisted)
//!                                       └─▶ BM25 index (in memory)
//!
//!   query ──▶ embed ──▶ vector search (2k) ──┐
//!         └──────────▶ BM25 search (2k) ─────┤
//!                                            ▼
//!                         min-max normalize + weighted fusion ──▶ top-k
//!                                            │
//!                                            ▼
//!                        grounded prompt ──▶ chat completion
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Typed configuration with environment loading
//! - [`models`] - Shared data types: `Document`, `Chunk`, reply envelope
//! - [`loader`] - Directory document loader (txt/md, skip-and-log)
//! - [`chunking`] - Recursive character splitter with overlap stitching
//! - [`search::vector`] - Persisted brute-force vector index
//! - [`search::bm25`] - In-crate Okapi BM25 lexical index
//! - [`search::hybrid`] - Retriever variants and score fusion
//! - [`llm`] - Embedding and chat clients for the remote LLM API
//! - [`tools`] - The grammar-restricted calculator
//! - [`pipeline`] - Retrieve → prompt → generate → package
//! - [`agent`] - Message routing state machine with fallback
//! - [`api`] - Axum HTTP handlers
//! - [`state`] - Shared application state and ingestion

pub mod agent;
pub mod api;
pub mod chunking;
pub mod config;
pub mod error;
pub mod llm;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod search;
pub mod state;
pub mod tools;
