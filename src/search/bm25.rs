use std::collections::HashMap;

use unicode_segmentation::UnicodeSegmentation;

use crate::models::{Chunk, ScoredChunk};

/// Okapi BM25 tuning constants: `k1` controls term-frequency saturation,
/// `b` controls document-length normalization.
#[derive(Debug, Clone, Copy)]
pub struct Bm25Params {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

/// In-memory BM25 index built once from the full chunk corpus.
///
/// Tokenization is UAX-29 word segmentation (`unicode_words`), which splits
/// whitespace-delimited scripts into words and logographic scripts into
/// per-character tokens, so CJK queries score without a dedicated segmenter.
pub struct Bm25Index {
    params: Bm25Params,
    chunks: Vec<Chunk>,
    /// Per-document term frequencies, parallel to `chunks`.
    term_freqs: Vec<HashMap<String, u32>>,
    /// Number of documents each term appears in.
    doc_freqs: HashMap<String, u32>,
    doc_lens: Vec<f32>,
    avg_doc_len: f32,
}

impl Bm25Index {
    pub fn build(chunks: Vec<Chunk>, params: Bm25Params) -> Self {
        let mut term_freqs = Vec::with_capacity(chunks.len());
        let mut doc_freqs: HashMap<String, u32> = HashMap::new();
        let mut doc_lens = Vec::with_capacity(chunks.len());

        for chunk in &chunks {
            let tokens = tokenize(&chunk.text);
            doc_lens.push(tokens.len() as f32);

            let mut freqs: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *freqs.entry(token).or_insert(0) += 1;
            }
            for term in freqs.keys() {
                *doc_freqs.entry(term.clone()).or_insert(0) += 1;
            }
            term_freqs.push(freqs);
        }

        let avg_doc_len = if doc_lens.is_empty() {
            0.0
        } else {
            doc_lens.iter().sum::<f32>() / doc_lens.len() as f32
        };

        Self {
            params,
            chunks,
            term_freqs,
            doc_freqs,
            doc_lens,
            avg_doc_len,
        }
    }

    /// Score every document against `query` and return the top `k` with a
    /// positive score, descending. The stable sort keeps corpus order for
    /// tied scores.
    pub fn search(&self, query: &str, k: usize) -> Vec<ScoredChunk> {
        let scores = self.scores(query);

        let mut ranked: Vec<(usize, f32)> = scores
            .into_iter()
            .enumerate()
            .filter(|(_, score)| *score > 0.0)
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(k);

        ranked
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: self.chunks[i].clone(),
                score,
            })
            .collect()
    }

    /// Raw BM25 score of `query` against every document, in corpus order.
    pub fn scores(&self, query: &str) -> Vec<f32> {
        let n = self.chunks.len();
        let mut scores = vec![0.0f32; n];
        if n == 0 {
            return scores;
        }

        let query_terms = tokenize(query);
        let Bm25Params { k1, b } = self.params;

        for term in &query_terms {
            let Some(&df) = self.doc_freqs.get(term) else {
                continue;
            };
            // Non-negative idf variant: terms in most documents approach
            // zero weight instead of going negative and corrupting fusion.
            let idf = (1.0 + (n as f32 - df as f32 + 0.5) / (df as f32 + 0.5)).ln();

            for (i, freqs) in self.term_freqs.iter().enumerate() {
                let Some(&tf) = freqs.get(term) else {
                    continue;
                };
                let tf = tf as f32;
                let len_norm = 1.0 - b + b * self.doc_lens[i] / self.avg_doc_len.max(1e-6);
                scores[i] += idf * tf * (k1 + 1.0) / (tf + k1 * len_norm);
            }
        }

        scores
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Lowercased UAX-29 word tokens, empties filtered.
fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words()
        .map(|w| w.to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, text: &str) -> Chunk {
        Chunk {
            id: Some(id.to_string()),
            text: text.to_string(),
            metadata: Default::default(),
            chunk_index: 0,
            chunk_count: 1,
            parent_id: None,
        }
    }

    fn corpus() -> Vec<Chunk> {
        vec![
            chunk("ml", "machine learning trains models from data"),
            chunk(
                "dl",
                "deep learning uses neural networks with many layers to learn representations",
            ),
            chunk("db", "the database stores rows in pages on disk"),
        ]
    }

    #[test]
    fn test_document_with_query_terms_outscores_one_without() {
        let index = Bm25Index::build(corpus(), Bm25Params::default());
        let scores = index.scores("deep learning neural networks");

        // dl contains every query term, db contains none.
        assert!(scores[1] > scores[2]);
        assert_eq!(scores[2], 0.0);
        assert!(scores[1] > scores[0]);
    }

    #[test]
    fn test_search_returns_descending_positive_scores() {
        let index = Bm25Index::build(corpus(), Bm25Params::default());
        let results = index.search("learning", 10);

        assert_eq!(results.len(), 2);
        assert!(results[0].score >= results[1].score);
        assert!(results.iter().all(|r| r.score > 0.0));
    }

    #[test]
    fn test_tied_scores_keep_corpus_order() {
        let chunks = vec![
            chunk("first", "identical text body"),
            chunk("second", "identical text body"),
        ];
        let index = Bm25Index::build(chunks, Bm25Params::default());
        let results = index.search("identical", 10);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.id.as_deref(), Some("first"));
        assert_eq!(results[1].chunk.id.as_deref(), Some("second"));
    }

    #[test]
    fn test_truncates_to_k() {
        let chunks: Vec<Chunk> = (0..20)
            .map(|i| chunk(&format!("c{i}"), "shared token"))
            .collect();
        let index = Bm25Index::build(chunks, Bm25Params::default());
        assert_eq!(index.search("shared", 5).len(), 5);
    }

    #[test]
    fn test_empty_corpus_and_empty_query() {
        let empty = Bm25Index::build(Vec::new(), Bm25Params::default());
        assert!(empty.search("anything", 5).is_empty());

        let index = Bm25Index::build(corpus(), Bm25Params::default());
        assert!(index.search("", 5).is_empty());
        assert!(index.search("   ", 5).is_empty());
    }

    #[test]
    fn test_length_normalization_favors_shorter_documents() {
        let chunks = vec![
            chunk("short", "rust"),
            chunk(
                "long",
                "rust is mentioned here once among very many other unrelated filler words \
                 that stretch the document length well past the average",
            ),
        ];
        let index = Bm25Index::build(chunks, Bm25Params::default());
        let scores = index.scores("rust");
        assert!(scores[0] > scores[1]);
    }

    #[test]
    fn test_logographic_text_matches_per_character_tokens() {
        let chunks = vec![
            chunk("zh", "深度学习是机器学习的分支"),
            chunk("en", "a plain english sentence"),
        ];
        let index = Bm25Index::build(chunks, Bm25Params::default());
        let results = index.search("深度", 5);

        assert!(!results.is_empty());
        assert_eq!(results[0].chunk.id.as_deref(), Some("zh"));
    }

    #[test]
    fn test_tokenize_lowercases_and_drops_punctuation() {
        let tokens = tokenize("Hello, World! Rust-lang 2024");
        assert!(tokens.contains(&"hello".to_string()));
        assert!(tokens.contains(&"world".to_string()));
        assert!(!tokens.iter().any(|t| t.contains(',')));
    }
}
