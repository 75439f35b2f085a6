use groundcheck_core::types::ScoredChunk;

use crate::merge::by_rank;

/// Maximal marginal relevance.
///
/// Seeds with the best chunk, then repeatedly takes the candidate maximizing
/// `lambda * relevance - (1 - lambda) * max_cosine_to_selected`. Candidates
/// must already be unique by id. Ties go to the higher-ranked candidate.
pub fn mmr_select(mut candidates: Vec<ScoredChunk>, limit: usize, lambda: f32) -> Vec<ScoredChunk> {
    candidates.sort_by(by_rank);
    let mut selected: Vec<ScoredChunk> = Vec::with_capacity(limit.min(candidates.len()));
    if limit == 0 || candidates.is_empty() {
        return selected;
    }
    let mut remaining = candidates;
    selected.push(remaining.remove(0));

    while selected.len() < limit && !remaining.is_empty() {
        let mut best_idx = 0;
        let mut best_value = f32::NEG_INFINITY;
        for (idx, cand) in remaining.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|s| cand.chunk.embedding.cosine(&s.chunk.embedding))
                .fold(f32::NEG_INFINITY, f32::max);
            let value = lambda * cand.score - (1.0 - lambda) * redundancy;
            if value > best_value {
                best_value = value;
                best_idx = idx;
            }
        }
        selected.push(remaining.remove(best_idx));
    }
    selected
}
