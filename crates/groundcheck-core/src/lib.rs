//! groundcheck-core
//!
//! Shared data model, configuration, error taxonomy and service traits for the
//! retrieval and validation pipeline.

pub mod config;
pub mod data_processor;
pub mod error;
pub mod query;
pub mod text;
pub mod traits;
pub mod types;

pub use config::{Config, Settings};
pub use error::{Error, RecorderError, Result, RetrievalError, ValidatorError};
pub use traits::{ChunkStore, Embedder};
