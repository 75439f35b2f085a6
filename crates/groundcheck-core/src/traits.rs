use async_trait::async_trait;

use crate::types::{Collection, EmbeddingVector, ScoredChunk};

/// Text → vector. Implementations must be deterministic for a fixed model.
///
/// Inference is CPU/GPU bound, so the trait is synchronous; async callers run
/// it on the blocking pool.
pub trait Embedder: Send + Sync {
    /// Stable identifier of model and version, e.g. `hashing:xxh64:d384`.
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<EmbeddingVector> {
        let mut out = self.embed_batch(&[text.to_string()])?;
        out.pop()
            .map(EmbeddingVector::from)
            .ok_or_else(|| anyhow::anyhow!("embedder '{}' returned no vector", self.model_id()))
    }
}

/// k-nearest-neighbour cosine search over one collection. Read-only.
///
/// Returned chunks carry their embeddings so the retriever can diversify.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    async fn search(
        &self,
        collection: Collection,
        query: &EmbeddingVector,
        k: usize,
    ) -> anyhow::Result<Vec<ScoredChunk>>;
}
