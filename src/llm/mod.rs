//! Clients for the remote embedding and chat collaborators.

pub mod chat;
pub mod embeddings;
