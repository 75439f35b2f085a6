use std::sync::Arc;

use groundcheck_core::types::{Severity, TextEdit, ValidationContext, ValidatorOutcome};
use groundcheck_core::ValidatorError;

use crate::rules::RuleBookHandle;
use crate::validator::Validator;

/// Rewrites phrases that claim feelings or a body, per the rulebook.
#[derive(Debug)]
pub struct AnthropomorphicValidator {
    rules: Arc<RuleBookHandle>,
}

impl AnthropomorphicValidator {
    pub const NAME: &'static str = "anthropomorphic";

    pub fn new(rules: Arc<RuleBookHandle>) -> Self {
        Self { rules }
    }
}

impl Validator for AnthropomorphicValidator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn severity(&self) -> Severity {
        Severity::NonCritical
    }

    fn run(&self, ctx: &ValidationContext) -> Result<ValidatorOutcome, ValidatorError> {
        let book = self.rules.current();
        let mut text = ctx.draft().to_string();
        let mut edits = Vec::new();
        let mut ids = Vec::new();
        // each rule sees the text as earlier rules left it
        for rule in book.anthropomorphic.iter().filter(|r| r.applies_to(ctx.locale())) {
            let found: Vec<String> = rule.pattern.find_iter(&text).map(|m| m.as_str().to_string()).collect();
            for from in found {
                let to = rule.pattern.replace(&from, rule.replacement.as_str()).into_owned();
                if to == from || !text.contains(from.as_str()) {
                    continue;
                }
                text = text.replacen(from.as_str(), &to, 1);
                edits.push(TextEdit::new(from, to));
                ids.push(rule.id.as_str());
            }
        }
        if edits.is_empty() {
            return Ok(ValidatorOutcome::pass(Self::NAME, Severity::NonCritical, "clean"));
        }
        ids.dedup();
        Ok(ValidatorOutcome::fail(Self::NAME, Severity::NonCritical, "anthropomorphic_language")
            .with_detail(ids.join(", "))
            .with_edits(edits))
    }
}
