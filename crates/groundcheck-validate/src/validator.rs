use std::sync::Arc;

use groundcheck_core::types::{Severity, ValidationContext, ValidatorOutcome};
use groundcheck_core::ValidatorError;

/// One check over a draft answer.
///
/// `run` is synchronous and may be CPU-heavy; the chain calls it on the
/// blocking pool. It sees a snapshot of the context and returns an outcome;
/// any rewrite is expressed as `edits` that the chain applies.
pub trait Validator: Send + Sync {
    fn name(&self) -> &'static str;

    fn severity(&self) -> Severity;

    /// Validators that must run in an earlier stage.
    fn requires(&self) -> &'static [&'static str] {
        &[]
    }

    fn run(&self, ctx: &ValidationContext) -> Result<ValidatorOutcome, ValidatorError>;
}

pub type SharedValidator = Arc<dyn Validator>;

/// A step of the chain: one validator alone, or a group run side by side
/// whose outcomes merge in declaration order.
#[derive(Clone)]
pub enum Stage {
    Sequential(SharedValidator),
    Concurrent(Vec<SharedValidator>),
}

impl Stage {
    pub fn validators(&self) -> &[SharedValidator] {
        match self {
            Stage::Sequential(v) => std::slice::from_ref(v),
            Stage::Concurrent(vs) => vs,
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.validators().iter().map(|v| v.name()).collect()
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Sequential(v) => write!(f, "Sequential({})", v.name()),
            Stage::Concurrent(_) => write!(f, "Concurrent({:?})", self.names()),
        }
    }
}
