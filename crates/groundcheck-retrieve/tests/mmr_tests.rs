use std::collections::HashSet;

use groundcheck_core::types::{Collection, DocumentChunk, ScoredChunk};
use groundcheck_retrieve::{dedup_best, merge_ranked, mmr_select};
use proptest::prelude::*;

fn scored(id: &str, score: f32, v: Vec<f32>) -> ScoredChunk {
    ScoredChunk { chunk: DocumentChunk::new(id, id, v, Collection::Knowledge, "t"), score }
}

#[test]
fn mmr_prefers_diverse_over_near_duplicate() {
    let a = scored("a", 0.95, vec![0.95, 0.312, 0.0]);
    let a_dup = scored("a_dup", 0.94, vec![0.94, 0.341, 0.0]);
    let b = scored("b", 0.85, vec![0.85, -0.5268, 0.0]);
    let picked = mmr_select(vec![b, a_dup, a], 2, 0.7);
    let ids: Vec<_> = picked.iter().map(|s| s.chunk.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[test]
fn mmr_with_lambda_one_is_plain_ranking() {
    let a = scored("a", 0.95, vec![1.0, 0.0]);
    let a_dup = scored("a_dup", 0.94, vec![1.0, 0.0]);
    let b = scored("b", 0.85, vec![0.0, 1.0]);
    let picked = mmr_select(vec![b, a_dup, a], 2, 1.0);
    let ids: Vec<_> = picked.iter().map(|s| s.chunk.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "a_dup"]);
}

#[test]
fn mmr_respects_limit_and_short_input() {
    assert!(mmr_select(vec![scored("a", 0.9, vec![1.0])], 0, 0.7).is_empty());
    assert_eq!(mmr_select(vec![scored("a", 0.9, vec![1.0])], 5, 0.7).len(), 1);
}

#[test]
fn merge_orders_ties_by_id() {
    let merged = merge_ranked(vec![scored("b", 0.5, vec![1.0])], vec![scored("a", 0.5, vec![1.0])]);
    let ids: Vec<_> = merged.iter().map(|s| s.chunk.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
}

proptest! {
    #[test]
    fn dedup_keeps_exactly_one_per_id(entries in prop::collection::vec((0u8..6, 0.0f32..1.0), 0..40)) {
        let chunks: Vec<_> = entries.iter().map(|(id, s)| scored(&format!("c{id}"), *s, vec![1.0, 0.0])).collect();
        let unique: HashSet<_> = entries.iter().map(|(id, _)| *id).collect();
        let out = dedup_best(chunks);
        prop_assert_eq!(out.len(), unique.len());
        let ids: HashSet<_> = out.iter().map(|s| s.chunk.id.clone()).collect();
        prop_assert_eq!(ids.len(), out.len());
        for pair in out.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
        for hit in &out {
            let best = entries
                .iter()
                .filter(|(id, _)| format!("c{id}") == hit.chunk.id)
                .map(|(_, s)| *s)
                .fold(f32::MIN, f32::max);
            prop_assert_eq!(hit.score, best);
        }
    }

    #[test]
    fn retrieve_never_returns_duplicates(
        entries in prop::collection::vec((0u8..5, 0.4f32..1.0, any::<bool>()), 1..30)
    ) {
        use std::sync::Arc;
        use groundcheck_core::config::RetrievalConfig;
        use groundcheck_core::types::Query;
        use groundcheck_core::Embedder;
        use groundcheck_retrieve::{RetrievalLimits, Retriever};
        use groundcheck_vector::InMemoryChunkStore;

        struct Unit;
        impl Embedder for Unit {
            fn model_id(&self) -> &str { "unit" }
            fn dim(&self) -> usize { 2 }
            fn max_len(&self) -> usize { 8 }
            fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
                Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
            }
        }

        let chunks: Vec<_> = entries
            .iter()
            .map(|(id, s, conv)| {
                let collection = if *conv { Collection::Conversation } else { Collection::Knowledge };
                DocumentChunk::new(format!("c{id}"), "t", vec![*s, (1.0 - s * s).max(0.0).sqrt()], collection, "t")
            })
            .collect();
        let unique: HashSet<_> = entries.iter().map(|(id, _, _)| *id).collect();
        let config = RetrievalConfig { min_similarity: 0.0, ..RetrievalConfig::default() };
        let retriever = Retriever::new(Arc::new(Unit), Arc::new(InMemoryChunkStore::from_chunks(chunks)), &config);
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let result = rt.block_on(retriever.retrieve(Query::new("q"), RetrievalLimits::new(50, 50)));
        prop_assert_eq!(result.len(), unique.len());
    }
}
