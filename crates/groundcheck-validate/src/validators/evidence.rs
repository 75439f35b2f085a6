use std::collections::HashSet;

use groundcheck_core::text::{content_tokens, ngrams, overlap_fraction};
use groundcheck_core::types::{Severity, ValidationContext, ValidatorOutcome};
use groundcheck_core::ValidatorError;

use crate::validator::Validator;

/// Share of the draft's content n-grams found anywhere in the context.
///
/// Low overlap is non-critical. No context at all, or a draft with no
/// content words, is critical.
#[derive(Debug)]
pub struct EvidenceOverlapValidator {
    min_overlap: f32,
    n: usize,
}

impl EvidenceOverlapValidator {
    pub const NAME: &'static str = "evidence_overlap";

    pub fn new(min_overlap: f32, n: usize) -> Self {
        Self { min_overlap, n: n.max(1) }
    }
}

impl Validator for EvidenceOverlapValidator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn severity(&self) -> Severity {
        Severity::NonCritical
    }

    fn run(&self, ctx: &ValidationContext) -> Result<ValidatorOutcome, ValidatorError> {
        let retrieval = ctx.retrieval();
        if retrieval.is_empty() {
            return Ok(ValidatorOutcome::fail(Self::NAME, Severity::Critical, "no_context"));
        }
        let answer = ngrams(&content_tokens(ctx.draft()), self.n);
        if answer.is_empty() {
            return Ok(ValidatorOutcome::fail(Self::NAME, Severity::Critical, "empty_answer"));
        }
        let evidence: HashSet<String> =
            retrieval.texts().flat_map(|t| ngrams(&content_tokens(t), self.n)).collect();
        let overlap = overlap_fraction(&answer, &evidence);
        let detail = format!("overlap {overlap:.2}, minimum {:.2}", self.min_overlap);
        if overlap >= self.min_overlap {
            Ok(ValidatorOutcome::pass(Self::NAME, Severity::NonCritical, "supported").with_detail(detail))
        } else {
            Ok(ValidatorOutcome::fail(Self::NAME, Severity::NonCritical, "low_overlap").with_detail(detail))
        }
    }
}
