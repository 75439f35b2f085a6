//! Embedding providers behind the [`groundcheck_core::Embedder`] trait.
//!
//! The hashing projection is always available. Local BGE-M3 inference needs
//! the `model` feature (and `metal` for Apple GPUs).

mod hashing;

#[cfg(feature = "model")]
mod device;
#[cfg(feature = "model")]
mod model;
#[cfg(feature = "model")]
mod pool;
#[cfg(feature = "model")]
mod tokenize;

use std::sync::Arc;

use anyhow::Result;
use groundcheck_core::config::{EmbeddingConfig, EmbeddingProvider};
use groundcheck_core::Embedder;
use tracing::info;

pub use hashing::HashingEmbedder;

#[cfg(feature = "model")]
pub use model::{EmbeddingModel, BGE_M3_DIM};
#[cfg(feature = "model")]
pub use pool::masked_mean_l2;

/// Builds the embedder named by configuration.
pub fn default_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider {
        EmbeddingProvider::Hashing => {
            info!(dim = config.dimension, "using hashing embedder");
            Ok(Arc::new(HashingEmbedder::with_max_len(config.dimension, config.max_len)))
        }
        EmbeddingProvider::BgeM3 => load_model(config),
    }
}

#[cfg(feature = "model")]
fn load_model(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    Ok(Arc::new(EmbeddingModel::load(config)?))
}

#[cfg(not(feature = "model"))]
fn load_model(_config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    Err(anyhow::anyhow!("bge-m3 provider requires groundcheck-embed to be built with the `model` feature"))
}
