use std::hash::{Hash, Hasher};

use groundcheck_core::Embedder;
use twox_hash::XxHash64;

/// Projects whitespace tokens into a fixed number of buckets by xxhash and
/// L2-normalizes the result. Deterministic across runs and platforms, so
/// texts sharing tokens land close in cosine space.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
    max_len: usize,
    model_id: String,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self::with_max_len(dim, 256)
    }

    pub fn with_max_len(dim: usize, max_len: usize) -> Self {
        let dim = dim.max(1);
        Self { dim, max_len, model_id: format!("hashing:xxh64:d{dim}") }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        let lowered = text.to_lowercase();
        for (i, token) in lowered.split_whitespace().take(self.max_len).enumerate() {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric());
            if token.is_empty() {
                continue;
            }
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i % 3) as f32 * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

impl Embedder for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        self.max_len
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}
