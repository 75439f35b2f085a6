//! Post-generation validation: the validator chain, its rulebook, the
//! confidence scorer and the fallback handler.

pub mod chain;
pub mod confidence;
pub mod fallback;
pub mod rules;
pub mod validator;
pub mod validators;

pub use chain::{ChainBuilder, ChainError, ValidatorChain};
pub use confidence::ConfidenceScorer;
pub use fallback::{FallbackHandler, NO_RELIABLE_CONTEXT};
pub use rules::{RuleBook, RuleBookHandle};
pub use validator::{SharedValidator, Stage, Validator};
