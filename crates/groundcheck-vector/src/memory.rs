use std::collections::HashMap;

use async_trait::async_trait;
use groundcheck_core::types::{cosine, Collection, DocumentChunk, EmbeddingVector, ScoredChunk};
use groundcheck_core::ChunkStore;

/// Brute-force cosine search over chunks held in memory.
///
/// Built once, then shared read-only behind an `Arc`.
#[derive(Debug, Default, Clone)]
pub struct InMemoryChunkStore {
    collections: HashMap<Collection, Vec<DocumentChunk>>,
}

impl InMemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_chunks(chunks: impl IntoIterator<Item = DocumentChunk>) -> Self {
        let mut store = Self::new();
        for chunk in chunks {
            store.insert(chunk);
        }
        store
    }

    pub fn insert(&mut self, chunk: DocumentChunk) {
        self.collections.entry(chunk.collection).or_default().push(chunk);
    }

    pub fn len(&self, collection: Collection) -> usize {
        self.collections.get(&collection).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.collections.values().all(Vec::is_empty)
    }
}

#[async_trait]
impl ChunkStore for InMemoryChunkStore {
    async fn search(
        &self,
        collection: Collection,
        query: &EmbeddingVector,
        k: usize,
    ) -> anyhow::Result<Vec<ScoredChunk>> {
        let Some(chunks) = self.collections.get(&collection) else {
            return Ok(Vec::new());
        };
        let mut hits: Vec<ScoredChunk> = chunks
            .iter()
            .map(|c| ScoredChunk { score: cosine(query.as_slice(), c.embedding.as_slice()), chunk: c.clone() })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.chunk.id.cmp(&b.chunk.id)));
        hits.truncate(k);
        Ok(hits)
    }
}
