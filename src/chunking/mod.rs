//! Document chunking: a recursive character splitter that descends through
//! separator levels and stitches neighboring chunks with an overlap region.

pub mod splitter;

pub use splitter::{SplitError, TextSplitter};

use crate::models::{Chunk, Document};

/// Split a batch of documents into chunks, preserving document order.
pub fn split_documents(splitter: &TextSplitter, documents: &[Document]) -> Vec<Chunk> {
    documents
        .iter()
        .flat_map(|doc| splitter.split_document(doc))
        .collect()
}
