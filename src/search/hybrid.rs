use std::collections::HashMap;
use std::hash::Hasher;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;
use twox_hash::XxHash64;

use crate::config::RetrieverKind;
use crate::llm::embeddings::EmbeddingClient;
use crate::models::{Chunk, ScoredChunk};
use crate::search::bm25::Bm25Index;
use crate::search::vector::VectorIndex;

/// Result of one retrieval call. `degraded` is set when a sub-retriever
/// errored and the query proceeded on the surviving source; a legitimately
/// empty source is a plain zero contribution and does not set it.
#[derive(Debug)]
pub struct RetrievalSet {
    pub hits: Vec<ScoredChunk>,
    pub degraded: bool,
    pub failures: Vec<String>,
}

/// The vector retrieval arm: embeds the query, then searches the index.
pub struct VectorArm {
    index: Arc<VectorIndex>,
    embedder: Arc<EmbeddingClient>,
}

impl VectorArm {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let embedding = self.embedder.embed_one(query).await?;
        Ok(self.index.search(&embedding, k)?)
    }
}

/// The lexical retrieval arm over the shared BM25 index. The lock allows the
/// index to be rebuilt after ingestion or deletion while queries keep a
/// consistent snapshot.
pub struct LexicalArm {
    index: Arc<RwLock<Bm25Index>>,
}

impl LexicalArm {
    fn retrieve(&self, query: &str, k: usize) -> Vec<ScoredChunk> {
        self.index.read().search(query, k)
    }
}

/// Retrieval source selection, fixed at construction time.
pub enum Retriever {
    VectorOnly(VectorArm),
    LexicalOnly(LexicalArm),
    Hybrid {
        vector: VectorArm,
        lexical: LexicalArm,
        vector_weight: f32,
        bm25_weight: f32,
    },
}

/// Explicit factory for [`Retriever`] variants.
#[derive(Default)]
pub struct RetrieverBuilder {
    vector_index: Option<Arc<VectorIndex>>,
    embedder: Option<Arc<EmbeddingClient>>,
    lexical_index: Option<Arc<RwLock<Bm25Index>>>,
    vector_weight: f32,
    bm25_weight: f32,
}

impl RetrieverBuilder {
    pub fn new() -> Self {
        Self {
            vector_weight: 0.6,
            bm25_weight: 0.4,
            ..Default::default()
        }
    }

    pub fn vector(mut self, index: Arc<VectorIndex>, embedder: Arc<EmbeddingClient>) -> Self {
        self.vector_index = Some(index);
        self.embedder = Some(embedder);
        self
    }

    pub fn lexical(mut self, index: Arc<RwLock<Bm25Index>>) -> Self {
        self.lexical_index = Some(index);
        self
    }

    pub fn weights(mut self, vector_weight: f32, bm25_weight: f32) -> Self {
        self.vector_weight = vector_weight;
        self.bm25_weight = bm25_weight;
        self
    }

    pub fn build(self, kind: RetrieverKind) -> Result<Retriever> {
        if self.vector_weight < 0.0 || self.bm25_weight < 0.0 {
            anyhow::bail!("fusion weights must be non-negative");
        }

        let vector_arm = || -> Result<VectorArm> {
            Ok(VectorArm {
                index: self
                    .vector_index
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("vector retriever requires a vector index"))?,
                embedder: self
                    .embedder
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("vector retriever requires an embedding client"))?,
            })
        };
        let lexical_arm = || -> Result<LexicalArm> {
            Ok(LexicalArm {
                index: self
                    .lexical_index
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("lexical retriever requires a BM25 index"))?,
            })
        };

        Ok(match kind {
            RetrieverKind::VectorOnly => Retriever::VectorOnly(vector_arm()?),
            RetrieverKind::LexicalOnly => Retriever::LexicalOnly(lexical_arm()?),
            RetrieverKind::Hybrid => Retriever::Hybrid {
                vector: vector_arm()?,
                lexical: lexical_arm()?,
                vector_weight: self.vector_weight,
                bm25_weight: self.bm25_weight,
            },
        })
    }
}

impl Retriever {
    /// Retrieve the `k` most relevant chunks for `query`.
    ///
    /// The hybrid variant queries both sources for `2k` candidates each (a
    /// wider recall window before fusion), min-max normalizes each score
    /// list independently, and ranks the union by the weighted sum of
    /// normalized scores.
    pub async fn retrieve_with_score(&self, query: &str, k: usize) -> Result<RetrievalSet> {
        match self {
            Retriever::VectorOnly(arm) => {
                let hits = arm.retrieve(query, k).await?;
                Ok(RetrievalSet {
                    hits,
                    degraded: false,
                    failures: Vec::new(),
                })
            }
            Retriever::LexicalOnly(arm) => Ok(RetrievalSet {
                hits: arm.retrieve(query, k),
                degraded: false,
                failures: Vec::new(),
            }),
            Retriever::Hybrid {
                vector,
                lexical,
                vector_weight,
                bm25_weight,
            } => {
                let fetch = k.saturating_mul(2).max(1);
                let mut failures = Vec::new();

                let vector_hits = match vector.retrieve(query, fetch).await {
                    Ok(hits) => hits,
                    Err(e) => {
                        tracing::warn!("Vector retrieval failed, continuing lexical-only: {e:#}");
                        failures.push(format!("vector retrieval failed: {e:#}"));
                        Vec::new()
                    }
                };
                let lexical_hits = lexical.retrieve(query, fetch);

                let degraded = !failures.is_empty();
                if degraded && lexical_hits.is_empty() && vector_hits.is_empty() {
                    anyhow::bail!(
                        "all retrieval sources failed: {}",
                        failures.join("; ")
                    );
                }

                let hits = fuse(&vector_hits, &lexical_hits, *vector_weight, *bm25_weight, k);
                Ok(RetrievalSet {
                    hits,
                    degraded,
                    failures,
                })
            }
        }
    }
}

/// Identity used to match results across the two sources: the explicit chunk
/// id when present, otherwise a stable hash of the chunk text.
pub fn chunk_identity(chunk: &Chunk) -> String {
    match &chunk.id {
        Some(id) => id.clone(),
        None => {
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(chunk.text.as_bytes());
            format!("text:{:016x}", hasher.finish())
        }
    }
}

/// Min-max normalize to [0, 1]. A list whose scores are all equal normalizes
/// every member to 1.0, which sidesteps the zero-range division.
fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }
    let min = scores.iter().cloned().fold(f32::INFINITY, f32::min);
    let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    if (max - min).abs() < f32::EPSILON {
        return vec![1.0; scores.len()];
    }
    scores.iter().map(|s| (s - min) / (max - min)).collect()
}

struct Candidate {
    chunk: Chunk,
    vector_score: f32,
    bm25_score: f32,
}

/// Weighted score fusion over the union of both result lists. Candidates are
/// registered scanning vector results first, then lexical; the stable final
/// sort therefore resolves fused-score ties to that encounter order. A chunk
/// absent from one list contributes 0.0 on that side.
pub fn fuse(
    vector_hits: &[ScoredChunk],
    lexical_hits: &[ScoredChunk],
    vector_weight: f32,
    bm25_weight: f32,
    k: usize,
) -> Vec<ScoredChunk> {
    let vector_norm = min_max_normalize(
        &vector_hits.iter().map(|h| h.score).collect::<Vec<_>>(),
    );
    let lexical_norm = min_max_normalize(
        &lexical_hits.iter().map(|h| h.score).collect::<Vec<_>>(),
    );

    let mut order: Vec<String> = Vec::new();
    let mut candidates: HashMap<String, Candidate> = HashMap::new();

    for (hit, norm) in vector_hits.iter().zip(&vector_norm) {
        let id = chunk_identity(&hit.chunk);
        let entry = candidates.entry(id.clone()).or_insert_with(|| {
            order.push(id);
            Candidate {
                chunk: hit.chunk.clone(),
                vector_score: 0.0,
                bm25_score: 0.0,
            }
        });
        entry.vector_score = entry.vector_score.max(*norm);
    }

    for (hit, norm) in lexical_hits.iter().zip(&lexical_norm) {
        let id = chunk_identity(&hit.chunk);
        let entry = candidates.entry(id.clone()).or_insert_with(|| {
            order.push(id);
            Candidate {
                chunk: hit.chunk.clone(),
                vector_score: 0.0,
                bm25_score: 0.0,
            }
        });
        entry.bm25_score = entry.bm25_score.max(*norm);
    }

    let mut fused: Vec<ScoredChunk> = order
        .into_iter()
        .filter_map(|id| {
            candidates.remove(&id).map(|c| ScoredChunk {
                score: vector_weight * c.vector_score + bm25_weight * c.bm25_score,
                chunk: c.chunk,
            })
        })
        .collect();

    fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    fused.truncate(k);
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: Option<&str>, text: &str) -> Chunk {
        Chunk {
            id: id.map(|s| s.to_string()),
            text: text.to_string(),
            metadata: Default::default(),
            chunk_index: 0,
            chunk_count: 1,
            parent_id: None,
        }
    }

    fn hit(id: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: chunk(Some(id), id),
            score,
        }
    }

    // ─── Normalization ───────────────────────────────────

    #[test]
    fn test_min_max_normalize_spans_unit_interval() {
        let norm = min_max_normalize(&[2.0, 4.0, 6.0]);
        assert_eq!(norm, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_min_max_normalize_degenerate_list_is_all_ones() {
        assert_eq!(min_max_normalize(&[3.0, 3.0, 3.0]), vec![1.0, 1.0, 1.0]);
        assert_eq!(min_max_normalize(&[7.0]), vec![1.0]);
        assert!(min_max_normalize(&[]).is_empty());
    }

    // ─── Identity ────────────────────────────────────────

    #[test]
    fn test_identity_prefers_explicit_id() {
        assert_eq!(chunk_identity(&chunk(Some("c1"), "text")), "c1");
    }

    #[test]
    fn test_identity_hash_is_stable_per_text() {
        let a = chunk_identity(&chunk(None, "same text"));
        let b = chunk_identity(&chunk(None, "same text"));
        let c = chunk_identity(&chunk(None, "other text"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("text:"));
    }

    // ─── Fusion ──────────────────────────────────────────

    #[test]
    fn test_fusion_is_weighted_sum_of_normalized_scores() {
        let vector = vec![hit("a", 1.0), hit("b", 0.0)];
        let lexical = vec![hit("b", 5.0), hit("a", 1.0)];

        let fused = fuse(&vector, &lexical, 0.6, 0.4, 10);
        let a = fused.iter().find(|h| h.chunk.id.as_deref() == Some("a")).unwrap();
        let b = fused.iter().find(|h| h.chunk.id.as_deref() == Some("b")).unwrap();

        // a: vector 1.0 normalized, lexical 0.0 normalized → 0.6
        // b: vector 0.0, lexical 1.0 → 0.4
        assert!((a.score - 0.6).abs() < 1e-6);
        assert!((b.score - 0.4).abs() < 1e-6);
        assert_eq!(fused[0].chunk.id.as_deref(), Some("a"));
    }

    #[test]
    fn test_absent_side_contributes_zero() {
        let vector = vec![hit("only-vector", 0.9)];
        let fused = fuse(&vector, &[], 0.6, 0.4, 10);
        assert_eq!(fused.len(), 1);
        // Degenerate single-entry list normalizes to 1.0 → fused = 0.6.
        assert!((fused[0].score - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_fusion_deduplicates_union_by_identity() {
        let shared_text = "both sides retrieve this chunk";
        let vector = vec![ScoredChunk {
            chunk: chunk(None, shared_text),
            score: 0.8,
        }];
        let lexical = vec![ScoredChunk {
            chunk: chunk(None, shared_text),
            score: 3.0,
        }];

        let fused = fuse(&vector, &lexical, 0.6, 0.4, 10);
        assert_eq!(fused.len(), 1);
        assert!((fused[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_tied_scores_keep_vector_then_lexical_encounter_order() {
        // Equal fused scores: both normalize to 1.0 on their only side with
        // equal weights.
        let vector = vec![hit("vec-side", 0.5)];
        let lexical = vec![hit("lex-side", 2.0)];

        let fused = fuse(&vector, &lexical, 0.5, 0.5, 10);
        assert_eq!(fused.len(), 2);
        assert!((fused[0].score - fused[1].score).abs() < 1e-6);
        assert_eq!(fused[0].chunk.id.as_deref(), Some("vec-side"));
        assert_eq!(fused[1].chunk.id.as_deref(), Some("lex-side"));
    }

    #[test]
    fn test_truncates_to_k_and_returns_everything_when_k_exceeds_union() {
        let vector = vec![hit("a", 3.0), hit("b", 2.0), hit("c", 1.0)];
        assert_eq!(fuse(&vector, &[], 1.0, 0.0, 2).len(), 2);
        assert_eq!(fuse(&vector, &[], 1.0, 0.0, 50).len(), 3);
    }

    #[test]
    fn test_fusion_monotonicity_in_vector_weight() {
        // A outranks B on the vector side, equal lexical scores. Raising the
        // vector weight must never let B overtake A.
        let vector = vec![hit("a", 0.9), hit("b", 0.3), hit("c", 0.1)];
        let lexical = vec![hit("a", 2.0), hit("b", 2.0)];

        for weight in [0.0, 0.3, 0.6, 1.0, 2.5] {
            let fused = fuse(&vector, &lexical, weight, 0.4, 10);
            let pos_a = fused
                .iter()
                .position(|h| h.chunk.id.as_deref() == Some("a"))
                .unwrap();
            let pos_b = fused
                .iter()
                .position(|h| h.chunk.id.as_deref() == Some("b"))
                .unwrap();
            assert!(pos_a < pos_b, "vector_weight={weight}: B outranked A");
        }
    }

    // ─── Builder ─────────────────────────────────────────

    #[test]
    fn test_builder_rejects_missing_lexical_index() {
        let err = RetrieverBuilder::new().build(RetrieverKind::LexicalOnly);
        assert!(err.is_err());
    }

    #[test]
    fn test_builder_rejects_negative_weights() {
        let err = RetrieverBuilder::new()
            .weights(-1.0, 0.4)
            .build(RetrieverKind::LexicalOnly);
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_lexical_only_retriever_end_to_end() {
        use crate::search::bm25::{Bm25Index, Bm25Params};

        let corpus = vec![
            chunk(Some("rust"), "rust is a systems programming language"),
            chunk(Some("cooking"), "simmer the sauce over low heat"),
        ];
        let index = Arc::new(RwLock::new(Bm25Index::build(corpus, Bm25Params::default())));
        let retriever = RetrieverBuilder::new()
            .lexical(index)
            .build(RetrieverKind::LexicalOnly)
            .unwrap();

        let set = retriever
            .retrieve_with_score("systems programming", 5)
            .await
            .unwrap();
        assert!(!set.degraded);
        assert_eq!(set.hits[0].chunk.id.as_deref(), Some("rust"));
    }
}
