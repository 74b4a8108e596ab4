use crate::embeddings::Embedder;
use crate::store::{Retriever, StoreMode, VectorStore};
use crate::{PdfChunk, StoreError};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_PERSIST_DIRECTORY: &str = "vector_db";
pub const DEFAULT_TOP_K: usize = 4;

/// Owns the lifecycle of one persisted vector store directory.
///
/// A rebuild always replaces the previous contents entirely; there are no
/// incremental updates.
pub struct VectorStoreManager {
    embedder: Arc<dyn Embedder>,
    persist_directory: PathBuf,
    store: Option<Arc<VectorStore>>,
}

impl VectorStoreManager {
    pub fn new(embedder: Arc<dyn Embedder>, persist_directory: impl Into<PathBuf>) -> Self {
        Self {
            embedder,
            persist_directory: persist_directory.into(),
            store: None,
        }
    }

    pub fn persist_directory(&self) -> &Path {
        &self.persist_directory
    }

    pub fn store_exists(&self) -> bool {
        self.persist_directory.exists()
    }

    pub fn is_initialized(&self) -> bool {
        self.store.is_some()
    }

    /// Loads the persisted store when no chunks are given, otherwise rebuilds
    /// it from `chunks`. Returns the mode that was applied.
    pub fn create_or_load(&mut self, chunks: Option<&[PdfChunk]>) -> Result<StoreMode, StoreError> {
        let mode = StoreMode::select(self.store_exists(), chunks.is_some());

        match (mode, chunks) {
            (StoreMode::Rebuild, Some(chunks)) => {
                let store = VectorStore::build(chunks, self.embedder.as_ref())?;
                if self.store_exists() {
                    info!(path = %self.persist_directory.display(), "removing existing vector store");
                }
                store.persist(&self.persist_directory)?;
                info!(
                    path = %self.persist_directory.display(),
                    chunks = store.len(),
                    model = %store.manifest().embedding_model,
                    "created vector store"
                );
                self.store = Some(Arc::new(store));
            }
            (StoreMode::Load, _) => {
                info!(path = %self.persist_directory.display(), "loading existing vector store");
                let store = VectorStore::load(&self.persist_directory)?;
                let expected = self.embedder.model_id();
                if store.manifest().embedding_model != expected {
                    return Err(StoreError::EmbedderMismatch {
                        expected,
                        found: store.manifest().embedding_model.clone(),
                    });
                }
                self.store = Some(Arc::new(store));
            }
            _ => {
                return Err(StoreError::NoSource(
                    self.persist_directory.display().to_string(),
                ))
            }
        }

        Ok(mode)
    }

    pub fn get_retriever(&self, k: usize) -> Result<Retriever, StoreError> {
        let store = self.store.as_ref().ok_or(StoreError::NotInitialized)?;
        if k == 0 {
            return Err(StoreError::InvalidTopK);
        }
        Ok(Retriever::new(Arc::clone(store), Arc::clone(&self.embedder), k))
    }

    /// Removes the persisted directory. Returns whether anything was deleted.
    pub fn delete(&mut self) -> Result<bool, StoreError> {
        self.store = None;
        if !self.store_exists() {
            info!(path = %self.persist_directory.display(), "no vector store to delete");
            return Ok(false);
        }

        info!(path = %self.persist_directory.display(), "deleting vector store");
        fs::remove_dir_all(&self.persist_directory)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn embedder() -> Arc<dyn Embedder> {
        Arc::new(CharacterNgramEmbedder { dimensions: 64 })
    }

    fn chunks(prefix: &str, texts: &[&str]) -> Vec<PdfChunk> {
        texts
            .iter()
            .enumerate()
            .map(|(index, text)| PdfChunk {
                chunk_id: format!("{prefix}-{index}"),
                source_path: format!("/tmp/{prefix}.pdf"),
                page: 1,
                start_index: 0,
                chunk_index: index as u64,
                text: text.to_string(),
            })
            .collect()
    }

    #[test]
    fn retriever_before_initialization_is_a_config_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let manager = VectorStoreManager::new(embedder(), dir.path().join("vector_db"));
        assert!(matches!(
            manager.get_retriever(DEFAULT_TOP_K),
            Err(StoreError::NotInitialized)
        ));
        Ok(())
    }

    #[test]
    fn no_store_and_no_chunks_is_a_config_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let mut manager = VectorStoreManager::new(embedder(), dir.path().join("vector_db"));
        assert!(matches!(
            manager.create_or_load(None),
            Err(StoreError::NoSource(_))
        ));
        assert!(!manager.is_initialized());
        Ok(())
    }

    #[test]
    fn rebuild_leaves_only_the_latest_chunks() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("vector_db");

        let first = chunks("old", &["cats purr softly", "dogs bark loudly", "birds sing"]);
        let second = chunks("new", &["rust has ownership", "postgres stores rows"]);

        let mut manager = VectorStoreManager::new(embedder(), &path);
        assert_eq!(manager.create_or_load(Some(first.as_slice()))?, StoreMode::Rebuild);
        assert_eq!(manager.create_or_load(Some(second.as_slice()))?, StoreMode::Rebuild);

        let mut reloaded = VectorStoreManager::new(embedder(), &path);
        assert_eq!(reloaded.create_or_load(None)?, StoreMode::Load);

        let latest: HashSet<String> = second.iter().map(|chunk| chunk.chunk_id.clone()).collect();
        let retriever = reloaded.get_retriever(10)?;
        for query in ["cats purr", "dogs bark", "rust ownership", "birds"] {
            let hits = retriever.retrieve(query)?;
            assert!(hits.len() <= second.len());
            assert!(hits.iter().all(|hit| latest.contains(&hit.chunk.chunk_id)));
        }
        Ok(())
    }

    #[test]
    fn empty_chunk_set_keeps_existing_store() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("vector_db");
        let mut manager = VectorStoreManager::new(embedder(), &path);
        manager.create_or_load(Some(chunks("doc", &["alpha beta"]).as_slice()))?;

        assert!(matches!(
            manager.create_or_load(Some(&[][..])),
            Err(StoreError::EmptyChunkSet)
        ));
        assert!(path.join(crate::store::MANIFEST_FILE).exists());
        assert!(manager.is_initialized());
        let hits = manager.get_retriever(1)?.retrieve("alpha")?;
        assert_eq!(hits[0].chunk.text, "alpha beta");
        Ok(())
    }

    #[test]
    fn load_with_different_embedder_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("vector_db");
        VectorStoreManager::new(embedder(), &path).create_or_load(Some(chunks("doc", &["alpha"]).as_slice()))?;

        let mut other = VectorStoreManager::new(Arc::new(CharacterNgramEmbedder { dimensions: 16 }), &path);
        assert!(matches!(
            other.create_or_load(None),
            Err(StoreError::EmbedderMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn retriever_returns_at_most_k_hits() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let mut manager = VectorStoreManager::new(embedder(), dir.path().join("vector_db"));
        manager.create_or_load(Some(chunks("doc", &["one fish", "two fish", "red fish", "blue fish", "old fish"]).as_slice()))?;

        let retriever = manager.get_retriever(2)?;
        assert_eq!(retriever.k(), 2);
        assert_eq!(retriever.retrieve("fish")?.len(), 2);
        assert!(matches!(manager.get_retriever(0), Err(StoreError::InvalidTopK)));
        Ok(())
    }

    #[test]
    fn delete_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("vector_db");
        let mut manager = VectorStoreManager::new(embedder(), &path);

        assert!(!manager.delete()?);

        manager.create_or_load(Some(chunks("doc", &["alpha"]).as_slice()))?;
        assert!(manager.delete()?);
        assert!(!path.exists());
        assert!(!manager.delete()?);
        assert!(matches!(manager.get_retriever(1), Err(StoreError::NotInitialized)));
        Ok(())
    }
}
