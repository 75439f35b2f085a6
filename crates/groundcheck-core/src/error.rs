use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid rulebook: {0}")]
    Rules(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Recorder(#[from] RecorderError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the embedding service or the similarity search.
///
/// The retriever retries once and then degrades to an empty context, so these
/// never reach the user.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("similarity search on '{collection}' failed: {message}")]
    Search { collection: String, message: String },

    #[error("{stage} timed out after {elapsed:?}")]
    Timeout { stage: &'static str, elapsed: Duration },

    #[error("embedding has dimension {got}, expected {expected}")]
    DimensionMismatch { got: usize, expected: usize },

    #[error("embedder '{model}' returned different vectors for identical input")]
    NonDeterministic { model: String },
}

/// A validator that could not produce an outcome.
#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("validator '{validator}' failed: {message}")]
    Failed { validator: String, message: String },

    #[error("validator '{validator}' panicked")]
    Panicked { validator: String },
}

impl ValidatorError {
    pub fn failed(validator: &str, message: impl Into<String>) -> Self {
        Self::Failed { validator: validator.to_string(), message: message.into() }
    }
}

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("log i/o on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("log entry {line} is corrupt: {message}")]
    Corrupt { line: usize, message: String },

    #[error("hash chain broken at seq {seq}")]
    ChainBroken { seq: u64 },

    #[error("append gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}
