use groundcheck_core::text::{citations, content_tokens, ngrams, overlap_fraction, sentences, strip_marker};
use groundcheck_core::types::{Severity, TextEdit, ValidationContext, ValidatorOutcome};
use groundcheck_core::ValidatorError;

use crate::validator::Validator;

/// With retrieved context, the draft must cite it with `[n]` markers.
#[derive(Debug)]
pub struct CitationRequiredValidator {
    min_citations: usize,
}

impl CitationRequiredValidator {
    pub const NAME: &'static str = "citation_required";

    pub fn new(min_citations: usize) -> Self {
        Self { min_citations }
    }
}

impl Validator for CitationRequiredValidator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }

    fn run(&self, ctx: &ValidationContext) -> Result<ValidatorOutcome, ValidatorError> {
        let retrieval = ctx.retrieval();
        if retrieval.is_empty() {
            return Ok(ValidatorOutcome::pass(Self::NAME, Severity::Critical, "no_context"));
        }
        let found = citations(ctx.draft());
        let valid = found.iter().filter(|c| retrieval.cited(c.marker).is_some()).count();
        let detail = format!("{valid} valid of {} markers, {} required", found.len(), self.min_citations);
        if valid >= self.min_citations {
            Ok(ValidatorOutcome::pass(Self::NAME, Severity::Critical, "cited").with_detail(detail))
        } else {
            Ok(ValidatorOutcome::fail(Self::NAME, Severity::Critical, "missing_citations").with_detail(detail))
        }
    }
}

/// Each cited sentence must share vocabulary with the chunk it cites.
/// Markers that point nowhere or at unrelated text are stripped.
#[derive(Debug)]
pub struct CitationRelevanceValidator {
    min_relevance: f32,
}

impl CitationRelevanceValidator {
    pub const NAME: &'static str = "citation_relevance";

    pub fn new(min_relevance: f32) -> Self {
        Self { min_relevance }
    }
}

impl Validator for CitationRelevanceValidator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn severity(&self) -> Severity {
        Severity::NonCritical
    }

    fn requires(&self) -> &'static [&'static str] {
        &[CitationRequiredValidator::NAME]
    }

    fn run(&self, ctx: &ValidationContext) -> Result<ValidatorOutcome, ValidatorError> {
        let retrieval = ctx.retrieval();
        if retrieval.is_empty() {
            return Ok(ValidatorOutcome::pass(Self::NAME, Severity::NonCritical, "no_context"));
        }

        let mut edits = Vec::new();
        let mut dropped: Vec<usize> = Vec::new();
        for sentence in sentences(ctx.draft()) {
            let cites = citations(sentence);
            if cites.is_empty() {
                continue;
            }
            let claim = ngrams(&content_tokens(sentence), 1);
            let mut bad: Vec<usize> = cites
                .iter()
                .filter(|c| match retrieval.cited(c.marker) {
                    None => true,
                    // a bare marker has nothing to compare
                    Some(_) if claim.is_empty() => false,
                    Some(hit) => {
                        let source = ngrams(&content_tokens(&hit.chunk.text), 1);
                        overlap_fraction(&claim, &source) < self.min_relevance
                    }
                })
                .map(|c| c.marker)
                .collect();
            if bad.is_empty() {
                continue;
            }
            bad.sort_unstable();
            bad.dedup();
            let patched = bad.iter().fold(sentence.to_string(), |s, m| strip_marker(&s, *m));
            edits.push(TextEdit::new(sentence, patched));
            dropped.extend(bad);
        }

        if edits.is_empty() {
            return Ok(ValidatorOutcome::pass(Self::NAME, Severity::NonCritical, "relevant"));
        }
        dropped.sort_unstable();
        dropped.dedup();
        let markers: Vec<String> = dropped.iter().map(|m| format!("[{m}]")).collect();
        Ok(ValidatorOutcome::fail(Self::NAME, Severity::NonCritical, "irrelevant_citation")
            .with_detail(format!("removed {}", markers.join(", ")))
            .with_edits(edits))
    }
}
