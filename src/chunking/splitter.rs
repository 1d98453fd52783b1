use thiserror::Error;

use crate::models::{Chunk, Document};

/// Default separator priority: paragraph, line, word, character.
const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Error, PartialEq)]
pub enum SplitError {
    #[error("chunk_overlap ({overlap}) must be smaller than chunk_size ({size})")]
    OverlapTooLarge { overlap: usize, size: usize },

    #[error("chunk_size must be greater than zero")]
    ZeroChunkSize,
}

/// Recursive character splitter.
///
/// Separators are applied in priority order; a finer separator is only
/// consulted for pieces still longer than `chunk_size`. Pieces are then
/// merged greedily into chunks of at most `chunk_size` characters, and each
/// chunk after the first is prefixed with the last `chunk_overlap`
/// characters of its predecessor. Every emitted chunk therefore holds at
/// most `chunk_size + chunk_overlap` characters.
#[derive(Debug)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, SplitError> {
        Self::with_separators(
            chunk_size,
            chunk_overlap,
            DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        )
    }

    pub fn with_separators(
        chunk_size: usize,
        chunk_overlap: usize,
        separators: Vec<String>,
    ) -> Result<Self, SplitError> {
        if chunk_size == 0 {
            return Err(SplitError::ZeroChunkSize);
        }
        if chunk_overlap >= chunk_size {
            return Err(SplitError::OverlapTooLarge {
                overlap: chunk_overlap,
                size: chunk_size,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators,
        })
    }

    /// Split raw text into chunk strings. Empty input yields no chunks;
    /// chunks that are blank after trimming are dropped.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let raw = self.split_recursive(text, &self.separators);

        // Stitch boundaries: prefix each chunk with the tail of its
        // predecessor so neighboring chunks share an overlap region.
        let mut stitched = Vec::with_capacity(raw.len());
        for (i, piece) in raw.iter().enumerate() {
            if i == 0 || self.chunk_overlap == 0 {
                stitched.push(piece.clone());
            } else {
                let prev = &raw[i - 1];
                let tail: String = tail_chars(prev, self.chunk_overlap);
                stitched.push(format!("{tail}{piece}"));
            }
        }

        stitched
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    }

    /// Split a document into chunks carrying provenance metadata.
    pub fn split_document(&self, document: &Document) -> Vec<Chunk> {
        let pieces = self.split_text(&document.text);
        let chunk_count = pieces.len();

        pieces
            .into_iter()
            .enumerate()
            .map(|(i, text)| Chunk {
                id: document.id.as_ref().map(|id| format!("{id}_chunk_{i}")),
                text,
                metadata: document.metadata.clone(),
                chunk_index: i,
                chunk_count,
                parent_id: document.id.clone(),
            })
            .collect()
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let Some((sep, finer)) = separators.split_first() else {
            return hard_split(text, self.chunk_size);
        };
        if sep.is_empty() {
            return hard_split(text, self.chunk_size);
        }

        let mut pieces = Vec::new();
        for part in text.split(sep.as_str()) {
            if char_len(part) > self.chunk_size {
                // Only descend for pieces that still exceed the budget.
                pieces.extend(self.split_recursive(part, finer));
            } else {
                pieces.push(part.to_string());
            }
        }

        merge_pieces(pieces, sep, self.chunk_size)
    }
}

/// Greedily accumulate adjacent pieces (rejoined by their separator) into
/// chunks of at most `chunk_size` characters.
fn merge_pieces(pieces: Vec<String>, sep: &str, chunk_size: usize) -> Vec<String> {
    let sep_len = char_len(sep);
    let mut merged = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for piece in pieces {
        let piece_len = char_len(&piece);
        if current.is_empty() {
            current = piece;
            current_len = piece_len;
        } else if current_len + sep_len + piece_len <= chunk_size {
            current.push_str(sep);
            current.push_str(&piece);
            current_len += sep_len + piece_len;
        } else {
            merged.push(std::mem::take(&mut current));
            current = piece;
            current_len = piece_len;
        }
    }
    if !current.is_empty() {
        merged.push(current);
    }
    merged
}

/// Last-resort split at character boundaries.
fn hard_split(text: &str, chunk_size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(chunk_size)
        .map(|c| c.iter().collect())
        .collect()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// The final `n` characters of `s`, respecting UTF-8 boundaries.
fn tail_chars(s: &str, n: usize) -> String {
    let len = char_len(s);
    s.chars().skip(len.saturating_sub(n)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap_must_stay_below_chunk_size() {
        assert_eq!(
            TextSplitter::new(100, 100).unwrap_err(),
            SplitError::OverlapTooLarge {
                overlap: 100,
                size: 100
            }
        );
        assert!(TextSplitter::new(100, 120).is_err());
        assert!(TextSplitter::new(100, 99).is_ok());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        assert_eq!(TextSplitter::new(0, 0).unwrap_err(), SplitError::ZeroChunkSize);
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        let splitter = TextSplitter::new(100, 10).unwrap();
        assert!(splitter.split_text("").is_empty());
        assert!(splitter.split_text("   \n\n  ").is_empty());
    }

    #[test]
    fn test_short_text_is_a_single_chunk() {
        let splitter = TextSplitter::new(100, 10).unwrap();
        let chunks = splitter.split_text("a short paragraph");
        assert_eq!(chunks, vec!["a short paragraph".to_string()]);
    }

    #[test]
    fn test_splits_at_paragraph_boundaries_first() {
        let splitter = TextSplitter::new(30, 0).unwrap();
        let text = "first paragraph of the text\n\nsecond paragraph of the text";
        let chunks = splitter.split_text(text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "first paragraph of the text");
        assert_eq!(chunks[1], "second paragraph of the text");
    }

    #[test]
    fn test_chunk_length_invariant_holds() {
        let chunk_size = 50;
        let overlap = 10;
        let splitter = TextSplitter::new(chunk_size, overlap).unwrap();
        let words: Vec<String> = (0..200).map(|i| format!("word{i}")).collect();
        let text = words.join(" ");

        for chunk in splitter.split_text(&text) {
            assert!(
                chunk.chars().count() <= chunk_size + overlap,
                "chunk exceeded budget: {} chars",
                chunk.chars().count()
            );
        }
    }

    #[test]
    fn test_neighboring_chunks_share_overlap() {
        let splitter = TextSplitter::new(20, 8).unwrap();
        let text = "aaaa bbbb cccc dddd eeee ffff gggg hhhh iiii";
        let chunks = splitter.split_text(text);
        assert!(chunks.len() >= 2);
        // The second chunk starts with the 8-char tail of the first chunk.
        let first = &chunks[0];
        let tail: String = first
            .chars()
            .skip(first.chars().count().saturating_sub(8))
            .collect();
        assert!(
            chunks[1].starts_with(tail.trim_start()),
            "expected '{}' to start with '{}'",
            chunks[1],
            tail
        );
    }

    #[test]
    fn test_hard_split_handles_unbroken_runs() {
        let splitter = TextSplitter::new(10, 0).unwrap();
        let text = "x".repeat(35);
        let chunks = splitter.split_text(&text);
        assert_eq!(chunks.len(), 4);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
    }

    #[test]
    fn test_multibyte_text_splits_on_char_boundaries() {
        let splitter = TextSplitter::new(10, 4).unwrap();
        let text = "深度学习是机器学习的一个分支领域它试图模拟人脑的神经网络结构";
        let chunks = splitter.split_text(text);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 14);
        }
    }

    #[test]
    fn test_split_document_assigns_chunk_identity() {
        let splitter = TextSplitter::new(30, 0).unwrap();
        let doc = Document::new(
            Some("guide".into()),
            "first paragraph of the text\n\nsecond paragraph of the text",
        )
        .with_metadata("file_name", "guide.md");

        let chunks = splitter.split_document(&doc);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].id.as_deref(), Some("guide_chunk_0"));
        assert_eq!(chunks[1].id.as_deref(), Some("guide_chunk_1"));
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].chunk_count, 2);
        assert_eq!(chunks[0].parent_id.as_deref(), Some("guide"));
        assert_eq!(
            chunks[0].metadata.get("file_name").and_then(|v| v.as_str()),
            Some("guide.md")
        );
    }

    #[test]
    fn test_split_document_without_id_leaves_chunk_ids_empty() {
        let splitter = TextSplitter::new(100, 0).unwrap();
        let doc = Document::new(None, "anonymous text");
        let chunks = splitter.split_document(&doc);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].id.is_none());
        assert!(chunks[0].parent_id.is_none());
    }
}
