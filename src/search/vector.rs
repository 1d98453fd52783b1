use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IndexError;
use crate::models::{Chunk, ScoredChunk};

/// Distance function used for brute-force search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Cosine,
    L2,
}

/// One persisted vector row. The index file is the insertion-ordered list of
/// these rows; the meta file carries the id→Chunk map and index parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredVector {
    id: String,
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexMeta {
    dimension: usize,
    metric: Metric,
    saved_at: DateTime<Utc>,
    chunks: Vec<(String, Chunk)>,
}

#[derive(Default, Debug)]
struct Inner {
    /// Insertion order; tied search scores resolve to this order.
    order: Vec<String>,
    vectors: HashMap<String, Vec<f32>>,
    chunks: HashMap<String, Chunk>,
}

/// Flat brute-force vector index with disk persistence.
///
/// Entries live in memory; `search` scans every live vector. `delete`
/// compacts and rewrites the whole index, which is O(n) — a maintenance
/// operation, not a hot path. The flat layout is the deliberate scalability
/// boundary here; swapping in an ANN structure would replace this type.
#[derive(Debug)]
pub struct VectorIndex {
    dimension: usize,
    metric: Metric,
    index_path: PathBuf,
    meta_path: PathBuf,
    inner: RwLock<Inner>,
}

impl VectorIndex {
    /// Open the collection at `dir`, loading persisted state when both
    /// collection files exist, otherwise starting empty.
    pub fn open_or_create(
        dir: &Path,
        collection: &str,
        dimension: usize,
        metric: Metric,
    ) -> Result<Self, IndexError> {
        std::fs::create_dir_all(dir)?;
        let index_path = dir.join(format!("{collection}.index.json"));
        let meta_path = dir.join(format!("{collection}.meta.json"));

        let index = Self {
            dimension,
            metric,
            index_path,
            meta_path,
            inner: RwLock::new(Inner::default()),
        };

        if index.index_path.exists() && index.meta_path.exists() {
            index.load()?;
        }

        Ok(index)
    }

    /// Add a chunk with its embedding. Returns the entry id (the chunk id if
    /// present, otherwise a fresh UUID). Re-adding an existing id is a no-op:
    /// the first write wins.
    pub fn add(&self, chunk: Chunk, vector: Vec<f32>) -> Result<String, IndexError> {
        self.check_dimension(&vector)?;

        let id = chunk
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut inner = self.inner.write();
        if inner.vectors.contains_key(&id) {
            return Ok(id);
        }
        inner.order.push(id.clone());
        inner.vectors.insert(id.clone(), vector);
        inner.chunks.insert(id.clone(), chunk);
        Ok(id)
    }

    /// Brute-force nearest-neighbor search. Scores are oriented so that a
    /// larger score is always better: cosine similarity directly, negated
    /// distance for L2. Returns at most `k` results, fewer when the index
    /// holds fewer entries; ties keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        self.check_dimension(query)?;

        let inner = self.inner.read();
        let mut scored: Vec<(f32, &String)> = inner
            .order
            .iter()
            .filter_map(|id| inner.vectors.get(id).map(|v| (self.score(query, v), id)))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .filter_map(|(score, id)| {
                inner.chunks.get(id).map(|chunk| ScoredChunk {
                    chunk: chunk.clone(),
                    score,
                })
            })
            .collect())
    }

    /// Remove one entry and rebuild the flat index from the survivors,
    /// persisting the compacted state. Returns whether the id existed.
    pub fn delete(&self, id: &str) -> Result<bool, IndexError> {
        {
            let mut inner = self.inner.write();
            if !inner.vectors.contains_key(id) {
                return Ok(false);
            }
            inner.vectors.remove(id);
            inner.chunks.remove(id);
            let survivors: Vec<String> = inner
                .order
                .iter()
                .filter(|entry| entry.as_str() != id)
                .cloned()
                .collect();
            inner.order = survivors;
        }
        self.persist()?;
        Ok(true)
    }

    /// Atomic save: both collection files are written to temporary siblings
    /// and renamed into place, so a crash mid-write never leaves a corrupt
    /// on-disk state.
    pub fn persist(&self) -> Result<(), IndexError> {
        let (rows, meta) = {
            let inner = self.inner.read();
            let rows: Vec<StoredVector> = inner
                .order
                .iter()
                .filter_map(|id| {
                    inner.vectors.get(id).map(|v| StoredVector {
                        id: id.clone(),
                        embedding: v.clone(),
                    })
                })
                .collect();
            let chunks: Vec<(String, Chunk)> = inner
                .order
                .iter()
                .filter_map(|id| inner.chunks.get(id).map(|c| (id.clone(), c.clone())))
                .collect();
            (
                rows,
                IndexMeta {
                    dimension: self.dimension,
                    metric: self.metric,
                    saved_at: Utc::now(),
                    chunks,
                },
            )
        };

        let index_json = serde_json::to_string(&rows)
            .map_err(|e| IndexError::Corrupt(format!("failed to serialize vectors: {e}")))?;
        let meta_json = serde_json::to_string(&meta)
            .map_err(|e| IndexError::Corrupt(format!("failed to serialize metadata: {e}")))?;

        write_atomic(&self.index_path, index_json.as_bytes())?;
        write_atomic(&self.meta_path, meta_json.as_bytes())?;
        Ok(())
    }

    /// Reconstruct the in-memory maps from the persisted files.
    pub fn load(&self) -> Result<(), IndexError> {
        let index_data = std::fs::read_to_string(&self.index_path)?;
        let meta_data = std::fs::read_to_string(&self.meta_path)?;

        let rows: Vec<StoredVector> = serde_json::from_str(&index_data)
            .map_err(|e| IndexError::Corrupt(format!("bad index file: {e}")))?;
        let meta: IndexMeta = serde_json::from_str(&meta_data)
            .map_err(|e| IndexError::Corrupt(format!("bad metadata file: {e}")))?;

        if meta.dimension != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: meta.dimension,
            });
        }

        let mut inner = self.inner.write();
        inner.order.clear();
        inner.vectors.clear();
        inner.chunks.clear();

        for row in rows {
            if row.embedding.len() != self.dimension {
                return Err(IndexError::Corrupt(format!(
                    "entry '{}' has {} dimensions, index expects {}",
                    row.id,
                    row.embedding.len(),
                    self.dimension
                )));
            }
            inner.order.push(row.id.clone());
            inner.vectors.insert(row.id, row.embedding);
        }
        for (id, chunk) in meta.chunks {
            inner.chunks.insert(id, chunk);
        }
        Ok(())
    }

    /// Clear in-memory state and remove the persisted collection files.
    pub fn delete_collection(&self) -> Result<(), IndexError> {
        let mut inner = self.inner.write();
        inner.order.clear();
        inner.vectors.clear();
        inner.chunks.clear();
        drop(inner);

        for path in [&self.index_path, &self.meta_path] {
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Snapshot of all stored chunks in insertion order. Used to (re)build
    /// the lexical index from the same corpus.
    pub fn chunks(&self) -> Vec<Chunk> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.chunks.get(id).cloned())
            .collect()
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), IndexError> {
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    fn score(&self, query: &[f32], entry: &[f32]) -> f32 {
        match self.metric {
            Metric::Cosine => cosine_similarity(query, entry),
            Metric::L2 => -l2_distance(query, entry),
        }
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)
}
