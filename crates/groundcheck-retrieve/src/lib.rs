//! Context retrieval over the knowledge and conversation collections.

mod merge;
mod mmr;
mod retriever;

pub use merge::{dedup_best, merge_ranked};
pub use mmr::mmr_select;
pub use retriever::{RetrievalLimits, Retriever};
