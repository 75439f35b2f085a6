use groundcheck_validate::ChainError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Retrieval degraded and generation failed: nothing left to answer from.
    #[error("request {request_id} exhausted: retrieval degraded and generation failed: {message}")]
    Exhausted { request_id: Uuid, message: String },

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Setup(#[from] groundcheck_core::Error),

    #[error(transparent)]
    Recorder(#[from] groundcheck_core::RecorderError),
}
