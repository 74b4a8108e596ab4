use crate::embeddings::Embedder;
use crate::models::{PdfChunk, ScoredChunk};
use crate::{ProviderError, StoreError};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const INDEX_FILE: &str = "index.json";
const FORMAT_VERSION: u32 = 1;

/// How `create_or_load` treats the persisted store, decided from whether a
/// store already exists on disk and whether new chunks were supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    Load,
    Rebuild,
    ErrorNoSource,
}

impl StoreMode {
    pub fn select(store_exists: bool, chunks_provided: bool) -> Self {
        match (store_exists, chunks_provided) {
            (_, true) => StoreMode::Rebuild,
            (true, false) => StoreMode::Load,
            (false, false) => StoreMode::ErrorNoSource,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreManifest {
    pub format_version: u32,
    pub embedding_model: String,
    pub dimensions: usize,
    pub chunk_count: usize,
    pub built_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    chunk: PdfChunk,
    vector: Vec<f32>,
}

/// Chunks and their embeddings, persisted as a manifest plus an index file.
#[derive(Debug)]
pub struct VectorStore {
    manifest: StoreManifest,
    entries: Vec<StoredEntry>,
}

impl VectorStore {
    pub fn build(chunks: &[PdfChunk], embedder: &dyn Embedder) -> Result<Self, StoreError> {
        if chunks.is_empty() {
            return Err(StoreError::EmptyChunkSet);
        }

        let texts: Vec<&str> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
        let vectors = embedder.embed_batch(&texts)?;

        if vectors.len() != chunks.len() {
            return Err(StoreError::Embedding(ProviderError::BackendResponse {
                backend: embedder.model_id(),
                details: format!(
                    "embedding count {} doesn't match chunk count {}",
                    vectors.len(),
                    chunks.len()
                ),
            }));
        }

        let dimensions = vectors.first().map(Vec::len).unwrap_or_default();
        if let Some(bad) = vectors.iter().find(|vector| vector.len() != dimensions) {
            return Err(StoreError::DimensionMismatch {
                expected: dimensions,
                found: bad.len(),
            });
        }

        let entries = chunks
            .iter()
            .cloned()
            .zip(vectors)
            .map(|(chunk, vector)| StoredEntry { chunk, vector })
            .collect::<Vec<_>>();

        Ok(Self {
            manifest: StoreManifest {
                format_version: FORMAT_VERSION,
                embedding_model: embedder.model_id(),
                dimensions,
                chunk_count: entries.len(),
                built_at: Utc::now(),
            },
            entries,
        })
    }

    /// Writes into a sibling staging directory and renames it over
    /// `directory`, replacing whatever was there.
    pub fn persist(&self, directory: &Path) -> Result<(), StoreError> {
        let staging = staging_path(directory);
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        fs::write(
            staging.join(MANIFEST_FILE),
            serde_json::to_vec_pretty(&self.manifest)?,
        )?;
        fs::write(staging.join(INDEX_FILE), serde_json::to_vec(&self.entries)?)?;

        if directory.exists() {
            fs::remove_dir_all(directory)?;
        }
        fs::rename(&staging, directory)?;
        Ok(())
    }

    pub fn load(directory: &Path) -> Result<Self, StoreError> {
        let manifest: StoreManifest = read_json(directory, MANIFEST_FILE)?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(corrupt(
                directory,
                format!("unsupported format version {}", manifest.format_version),
            ));
        }

        let entries: Vec<StoredEntry> = read_json(directory, INDEX_FILE)?;
        if entries.len() != manifest.chunk_count {
            return Err(corrupt(
                directory,
                format!(
                    "manifest lists {} chunks but index holds {}",
                    manifest.chunk_count,
                    entries.len()
                ),
            ));
        }
        if entries
            .iter()
            .any(|entry| entry.vector.len() != manifest.dimensions)
        {
            return Err(corrupt(directory, "vector dimensions disagree with manifest"));
        }

        Ok(Self { manifest, entries })
    }

    pub fn manifest(&self) -> &StoreManifest {
        &self.manifest
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top `k` chunks by cosine similarity; ties keep document order.
    ///
    /// A zero vector on either side scores 0.0, so chunks too short to embed
    /// still fill the result when fewer than `k` chunks score higher.
    pub fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>, StoreError> {
        if query_vector.len() != self.manifest.dimensions {
            return Err(StoreError::DimensionMismatch {
                expected: self.manifest.dimensions,
                found: query_vector.len(),
            });
        }

        let mut scored: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|entry| ScoredChunk {
                score: cosine_similarity(query_vector, &entry.vector),
                chunk: entry.chunk.clone(),
            })
            .collect();

        scored.sort_by(|left, right| right.score.total_cmp(&left.score));
        scored.truncate(k);
        Ok(scored)
    }
}

/// Read-only top-k view over a loaded store.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
    k: usize,
}

impl Retriever {
    pub(crate) fn new(store: Arc<VectorStore>, embedder: Arc<dyn Embedder>, k: usize) -> Self {
        Self { store, embedder, k }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>, StoreError> {
        let query_vector = self.embedder.embed(query)?;
        self.store.search(&query_vector, self.k)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x64 = f64::from(x);
        let y64 = f64::from(y);
        dot += x64 * y64;
        norm_a += x64 * x64;
        norm_b += y64 * y64;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    dot / denom
}

fn staging_path(directory: &Path) -> PathBuf {
    let mut name = directory
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "vector_db".into());
    name.push(".staging");
    directory.with_file_name(name)
}

fn read_json<T: DeserializeOwned>(directory: &Path, file: &str) -> Result<T, StoreError> {
    let path = directory.join(file);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == ErrorKind::NotFound => {
            return Err(corrupt(directory, format!("missing {file}")));
        }
        Err(error) => return Err(StoreError::Io(error)),
    };
    serde_json::from_slice(&bytes)
        .map_err(|error| corrupt(directory, format!("unreadable {file}: {error}")))
}

fn corrupt(directory: &Path, details: impl Into<String>) -> StoreError {
    StoreError::Corrupt {
        path: directory.display().to_string(),
        details: details.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use tempfile::tempdir;

    fn chunk(index: u64, text: &str) -> PdfChunk {
        PdfChunk {
            chunk_id: format!("chunk-{index}"),
            source_path: "/tmp/doc.pdf".to_string(),
            page: 1,
            start_index: 0,
            chunk_index: index,
            text: text.to_string(),
        }
    }

    #[test]
    fn mode_selection_covers_all_inputs() {
        assert_eq!(StoreMode::select(true, false), StoreMode::Load);
        assert_eq!(StoreMode::select(true, true), StoreMode::Rebuild);
        assert_eq!(StoreMode::select(false, true), StoreMode::Rebuild);
        assert_eq!(StoreMode::select(false, false), StoreMode::ErrorNoSource);
    }

    #[test]
    fn search_ranks_matching_chunk_first() -> Result<(), StoreError> {
        let embedder = CharacterNgramEmbedder { dimensions: 128 };
        let store = VectorStore::build(
            &[
                chunk(0, "PostgreSQL is an open source relational database."),
                chunk(1, "Bananas are a good source of potassium."),
            ],
            &embedder,
        )?;

        let query = embedder.embed("relational database PostgreSQL")?;
        let hits = store.search(&query, 1)?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.chunk_id, "chunk-0");
        Ok(())
    }

    #[test]
    fn zero_norm_chunks_still_fill_top_k() -> Result<(), StoreError> {
        let embedder = CharacterNgramEmbedder { dimensions: 64 };
        let store = VectorStore::build(
            &[chunk(0, "ok"), chunk(1, "relational database engine")],
            &embedder,
        )?;

        let hits = store.search(&embedder.embed("database")?, 2)?;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.chunk_id, "chunk-1");
        assert_eq!(hits[1].score, 0.0);

        let blank_query = store.search(&embedder.embed("hi")?, 2)?;
        assert_eq!(blank_query.len(), 2);
        assert!(blank_query.iter().all(|hit| hit.score == 0.0));
        assert_eq!(blank_query[0].chunk.chunk_id, "chunk-0");
        Ok(())
    }

    #[test]
    fn persisted_store_loads_identically() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let target = dir.path().join("vector_db");
        let embedder = CharacterNgramEmbedder { dimensions: 32 };
        let store = VectorStore::build(&[chunk(0, "alpha"), chunk(1, "beta")], &embedder)?;
        store.persist(&target)?;

        let loaded = VectorStore::load(&target)?;
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.manifest().embedding_model, "char-trigram-32");
        assert_eq!(loaded.manifest().dimensions, 32);
        assert!(!dir.path().join("vector_db.staging").exists());
        Ok(())
    }

    #[test]
    fn truncated_index_is_reported_as_corrupt() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let target = dir.path().join("vector_db");
        let embedder = CharacterNgramEmbedder { dimensions: 16 };
        VectorStore::build(&[chunk(0, "alpha")], &embedder)?.persist(&target)?;
        fs::write(target.join(INDEX_FILE), b"[{\"chunk\":")?;

        assert!(matches!(
            VectorStore::load(&target),
            Err(StoreError::Corrupt { .. })
        ));
        Ok(())
    }

    #[test]
    fn empty_directory_is_reported_as_corrupt() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        assert!(matches!(
            VectorStore::load(dir.path()),
            Err(StoreError::Corrupt { .. })
        ));
        Ok(())
    }

    #[test]
    fn query_dimension_mismatch_is_an_error() -> Result<(), StoreError> {
        let store = VectorStore::build(&[chunk(0, "alpha")], &CharacterNgramEmbedder { dimensions: 8 })?;
        assert!(matches!(
            store.search(&[1.0, 0.0], 3),
            Err(StoreError::DimensionMismatch { expected: 8, found: 2 })
        ));
        Ok(())
    }

    #[test]
    fn empty_chunk_set_is_rejected() {
        let result = VectorStore::build(&[], &CharacterNgramEmbedder::default());
        assert!(matches!(result, Err(StoreError::EmptyChunkSet)));
    }
}
