use std::collections::HashSet;

use groundcheck_core::text::numbers;
use groundcheck_core::types::{Severity, ValidationContext, ValidatorOutcome};
use groundcheck_core::ValidatorError;

use crate::validator::Validator;

/// Every number in the draft must occur in some retrieved chunk.
#[derive(Debug, Default)]
pub struct NumericClaimsValidator;

impl NumericClaimsValidator {
    pub const NAME: &'static str = "numeric_claims";
}

impl Validator for NumericClaimsValidator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn severity(&self) -> Severity {
        Severity::NonCritical
    }

    fn run(&self, ctx: &ValidationContext) -> Result<ValidatorOutcome, ValidatorError> {
        let claims = numbers(ctx.draft());
        if claims.is_empty() {
            return Ok(ValidatorOutcome::pass(Self::NAME, Severity::NonCritical, "no_numbers"));
        }
        let known: HashSet<String> = ctx.retrieval().texts().flat_map(numbers).collect();
        let mut unsupported: Vec<String> = claims.into_iter().filter(|n| !known.contains(n)).collect();
        unsupported.dedup();
        if unsupported.is_empty() {
            Ok(ValidatorOutcome::pass(Self::NAME, Severity::NonCritical, "supported"))
        } else {
            Ok(ValidatorOutcome::fail(Self::NAME, Severity::NonCritical, "unsupported_number")
                .with_detail(unsupported.join(", ")))
        }
    }
}
