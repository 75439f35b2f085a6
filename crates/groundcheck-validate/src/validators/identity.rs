use std::sync::Arc;

use groundcheck_core::types::{Severity, ValidationContext, ValidatorOutcome};
use groundcheck_core::ValidatorError;

use crate::rules::RuleBookHandle;
use crate::validator::Validator;

/// Rejects drafts that match any identity rule.
#[derive(Debug)]
pub struct IdentityValidator {
    rules: Arc<RuleBookHandle>,
}

impl IdentityValidator {
    pub const NAME: &'static str = "identity";

    pub fn new(rules: Arc<RuleBookHandle>) -> Self {
        Self { rules }
    }
}

impl Validator for IdentityValidator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }

    fn run(&self, ctx: &ValidationContext) -> Result<ValidatorOutcome, ValidatorError> {
        let book = self.rules.current();
        for rule in &book.identity {
            if let Some(m) = rule.pattern.find(ctx.draft()) {
                return Ok(ValidatorOutcome::fail(Self::NAME, Severity::Critical, "identity_violation")
                    .with_detail(format!("rule '{}' matched '{}'", rule.id, m.as_str())));
            }
        }
        Ok(ValidatorOutcome::pass(Self::NAME, Severity::Critical, "consistent"))
    }
}
