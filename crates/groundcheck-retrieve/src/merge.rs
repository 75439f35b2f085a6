use std::cmp::Ordering;
use std::collections::HashMap;

use groundcheck_core::types::ScoredChunk;

/// Descending score, then ascending id so equal scores order stably.
pub fn by_rank(a: &ScoredChunk, b: &ScoredChunk) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.chunk.id.cmp(&b.chunk.id))
}

/// One entry per id, keeping the best-scoring copy, ranked.
pub fn dedup_best(chunks: impl IntoIterator<Item = ScoredChunk>) -> Vec<ScoredChunk> {
    let mut by_id: HashMap<String, ScoredChunk> = HashMap::new();
    for hit in chunks {
        by_id
            .entry(hit.chunk.id.clone())
            .and_modify(|old| {
                if by_rank(&hit, old) == Ordering::Less {
                    *old = hit.clone();
                }
            })
            .or_insert(hit);
    }
    let mut merged: Vec<ScoredChunk> = by_id.into_values().collect();
    merged.sort_by(by_rank);
    merged
}

/// Union of per-collection selections, deduplicated and ranked.
pub fn merge_ranked(knowledge: Vec<ScoredChunk>, conversation: Vec<ScoredChunk>) -> Vec<ScoredChunk> {
    dedup_best(knowledge.into_iter().chain(conversation))
}
