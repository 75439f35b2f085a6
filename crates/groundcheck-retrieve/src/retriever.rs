use std::sync::Arc;
use std::time::Instant;

use groundcheck_core::config::RetrievalConfig;
use groundcheck_core::types::{Collection, EmbeddingVector, Query, RetrievalResult, ScoredChunk};
use groundcheck_core::{ChunkStore, Embedder, RetrievalError};
use tracing::{debug, error, info, warn};

use crate::merge::{dedup_best, merge_ranked};
use crate::mmr::mmr_select;

/// How many chunks each collection may contribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalLimits {
    pub knowledge: usize,
    pub conversation: usize,
}

impl RetrievalLimits {
    pub fn new(knowledge: usize, conversation: usize) -> Self {
        Self { knowledge, conversation }
    }

    pub fn total(&self) -> usize {
        self.knowledge + self.conversation
    }
}

/// Embeds the query once, searches both collections concurrently, then
/// thresholds, diversifies and merges the candidates.
///
/// Never fails: after one retry the result degrades to empty context.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn ChunkStore>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn ChunkStore>, config: &RetrievalConfig) -> Self {
        Self { embedder, store, config: config.clone() }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Knowledge slots scale with query complexity; conversation stays fixed.
    pub fn limits_for(&self, query: &Query) -> RetrievalLimits {
        RetrievalLimits {
            knowledge: self.config.knowledge_limits.for_complexity(query.complexity()),
            conversation: self.config.conversation_limit,
        }
    }

    pub async fn retrieve_adaptive(&self, query: Query) -> RetrievalResult {
        let limits = self.limits_for(&query);
        self.retrieve(query, limits).await
    }

    pub async fn retrieve(&self, query: Query, limits: RetrievalLimits) -> RetrievalResult {
        if query.text().trim().is_empty() {
            debug!(request_id = %query.id(), "empty query, skipping retrieval");
            return RetrievalResult::no_reliable_context(query);
        }
        let started = Instant::now();
        let outcome = match self.retrieve_once(&query, limits).await {
            Ok(chunks) => Ok(chunks),
            Err(first) => {
                warn!(request_id = %query.id(), error = %first, "retrieval failed, retrying once");
                tokio::time::sleep(self.config.retry_backoff()).await;
                self.retrieve_once(&query, limits).await
            }
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(chunks) => {
                info!(request_id = %query.id(), chunks = chunks.len(), elapsed_ms, "retrieved context");
                RetrievalResult::from_chunks(query, chunks)
            }
            Err(e) => {
                error!(
                    request_id = %query.id(),
                    error = %e,
                    elapsed_ms,
                    "retrieval exhausted, continuing without context"
                );
                RetrievalResult::degraded(query)
            }
        }
    }

    /// A single attempt with no retry. An empty vector means nothing cleared the threshold.
    pub async fn retrieve_once(
        &self,
        query: &Query,
        limits: RetrievalLimits,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        let vector = self.embed_query(query.text()).await?;
        let (knowledge, conversation) = tokio::try_join!(
            self.search_collection(Collection::Knowledge, &vector, limits.knowledge),
            self.search_collection(Collection::Conversation, &vector, limits.conversation),
        )?;
        debug!(
            request_id = %query.id(),
            knowledge = knowledge.len(),
            conversation = conversation.len(),
            "candidates above threshold"
        );
        if knowledge.is_empty() && conversation.is_empty() {
            return Ok(Vec::new());
        }
        let lambda = self.config.mmr_lambda;
        let knowledge = mmr_select(dedup_best(knowledge), limits.knowledge, lambda);
        let conversation = mmr_select(dedup_best(conversation), limits.conversation, lambda);
        Ok(merge_ranked(knowledge, conversation))
    }

    async fn embed_query(&self, text: &str) -> Result<EmbeddingVector, RetrievalError> {
        let embedder = Arc::clone(&self.embedder);
        let text = text.to_string();
        let probe = self.config.verify_determinism;
        let timeout = self.config.embed_timeout();
        let task = tokio::task::spawn_blocking(move || -> anyhow::Result<(EmbeddingVector, Option<EmbeddingVector>)> {
            let first = embedder.embed(&text)?;
            let second = if probe { Some(embedder.embed(&text)?) } else { None };
            Ok((first, second))
        });
        let (vector, second) = tokio::time::timeout(timeout, task)
            .await
            .map_err(|_| RetrievalError::Timeout { stage: "embedding", elapsed: timeout })?
            .map_err(|e| RetrievalError::Embedding(format!("embedding task aborted: {e}")))?
            .map_err(|e| RetrievalError::Embedding(format!("{e:#}")))?;

        if vector.dim() != self.embedder.dim() {
            return Err(RetrievalError::DimensionMismatch { got: vector.dim(), expected: self.embedder.dim() });
        }
        if let Some(second) = second {
            if !vector.bit_eq(&second) {
                return Err(RetrievalError::NonDeterministic { model: self.embedder.model_id().to_string() });
            }
        }
        Ok(vector)
    }

    async fn search_collection(
        &self,
        collection: Collection,
        vector: &EmbeddingVector,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let k = limit.saturating_mul(self.config.overfetch_factor.max(1));
        let timeout = self.config.search_timeout();
        let stage = match collection {
            Collection::Knowledge => "knowledge search",
            Collection::Conversation => "conversation search",
        };
        let hits = tokio::time::timeout(timeout, self.store.search(collection, vector, k))
            .await
            .map_err(|_| RetrievalError::Timeout { stage, elapsed: timeout })?
            .map_err(|e| RetrievalError::Search { collection: collection.to_string(), message: format!("{e:#}") })?;
        let min = self.config.min_similarity;
        Ok(hits.into_iter().filter(|h| h.score.is_finite() && h.score >= min).collect())
    }
}
