//! Append-only persistence of validation history and learning cycles, and
//! the batch analysis that turns that history into learning suggestions.

pub mod analyzer;
pub mod introspect;
pub mod log;
pub mod recorder;

pub use analyzer::{analyze_patterns, suggest_learning, LearningSuggestion, PatternReport, Priority};
pub use introspect::Introspection;
pub use log::{AppendLog, AppendOptions, Entry, VerifyReport};
pub use recorder::{LearningLog, ValidationRecorder};
