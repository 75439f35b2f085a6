//! Request orchestration: retrieve, validate, score, fall back and record.

pub mod error;
pub mod pipeline;

pub use error::PipelineError;
pub use pipeline::{GroundingPipeline, GENERATION_FAILED};
