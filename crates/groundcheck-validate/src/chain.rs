use std::collections::HashSet;
use std::sync::Arc;

use groundcheck_core::config::{ValidationConfig, ALL_VALIDATORS};
use groundcheck_core::types::{Severity, ValidationContext, ValidatorOutcome};
use groundcheck_core::ValidatorError;
use thiserror::Error;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use crate::rules::RuleBookHandle;
use crate::validator::{SharedValidator, Stage, Validator};
use crate::validators::{
    AnthropomorphicValidator, CitationRelevanceValidator, CitationRequiredValidator, EvidenceOverlapValidator,
    IdentityValidator, LanguageValidator, NumericClaimsValidator, LANGUAGE,
};

/// Invalid stage layout, detected when the chain is built.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("validator chain has no stages")]
    Empty,

    #[error("the first stage must be the 'language' validator alone, found {found}")]
    LanguageNotFirst { found: String },

    #[error("validator '{validator}' requires '{requires}' in an earlier stage")]
    MissingRequirement { validator: String, requires: String },

    #[error("validator '{0}' appears more than once")]
    Duplicate(String),

    #[error("stage {0} has no validators")]
    EmptyStage(usize),

    #[error("unknown validator '{0}'")]
    Unknown(String),
}

#[derive(Default)]
pub struct ChainBuilder {
    stages: Vec<Stage>,
}

impl ChainBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sequential<V: Validator + 'static>(self, validator: V) -> Self {
        self.stage(Stage::Sequential(Arc::new(validator)))
    }

    pub fn concurrent(self, validators: Vec<SharedValidator>) -> Self {
        self.stage(Stage::Concurrent(validators))
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn build(self) -> Result<ValidatorChain, ChainError> {
        let first = self.stages.first().ok_or(ChainError::Empty)?;
        match first {
            Stage::Sequential(v) if v.name() == LANGUAGE => {}
            other => return Err(ChainError::LanguageNotFirst { found: format!("{other:?}") }),
        }

        let mut seen: HashSet<&'static str> = HashSet::new();
        for (index, stage) in self.stages.iter().enumerate() {
            if stage.validators().is_empty() {
                return Err(ChainError::EmptyStage(index));
            }
            for v in stage.validators() {
                if let Some(missing) = v.requires().iter().find(|r| !seen.contains(*r)) {
                    return Err(ChainError::MissingRequirement {
                        validator: v.name().to_string(),
                        requires: missing.to_string(),
                    });
                }
            }
            for name in stage.names() {
                if !seen.insert(name) {
                    return Err(ChainError::Duplicate(name.to_string()));
                }
            }
        }
        Ok(ValidatorChain { stages: self.stages })
    }
}

/// Ordered stages of validators applied to one request's context.
pub struct ValidatorChain {
    stages: Vec<Stage>,
}

impl ValidatorChain {
    pub fn builder() -> ChainBuilder {
        ChainBuilder::new()
    }

    /// The production layout: language, citation_required, citation_relevance,
    /// then evidence_overlap, numeric_claims, identity and anthropomorphic
    /// side by side. Disabled validators are left out.
    pub fn standard(config: &ValidationConfig, rules: Arc<RuleBookHandle>) -> Result<Self, ChainError> {
        if let Some(unknown) = config.enabled.iter().find(|n| !ALL_VALIDATORS.contains(&n.as_str())) {
            return Err(ChainError::Unknown(unknown.clone()));
        }
        let mut builder = ChainBuilder::new().sequential(LanguageValidator::new());
        if config.is_enabled(CitationRequiredValidator::NAME) {
            builder = builder.sequential(CitationRequiredValidator::new(config.min_citations));
        }
        if config.is_enabled(CitationRelevanceValidator::NAME) {
            builder = builder.sequential(CitationRelevanceValidator::new(config.min_citation_relevance));
        }
        let mut group: Vec<SharedValidator> = Vec::new();
        if config.is_enabled(EvidenceOverlapValidator::NAME) {
            group.push(Arc::new(EvidenceOverlapValidator::new(config.min_overlap, config.ngram)));
        }
        if config.is_enabled(NumericClaimsValidator::NAME) {
            group.push(Arc::new(NumericClaimsValidator));
        }
        if config.is_enabled(IdentityValidator::NAME) {
            group.push(Arc::new(IdentityValidator::new(Arc::clone(&rules))));
        }
        if config.is_enabled(AnthropomorphicValidator::NAME) {
            group.push(Arc::new(AnthropomorphicValidator::new(rules)));
        }
        if !group.is_empty() {
            builder = builder.concurrent(group);
        }
        builder.build()
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().flat_map(|s| s.names()).collect()
    }

    /// Runs every stage in order until one records a critical failure or the
    /// deadline passes.
    ///
    /// Each validator runs on the blocking pool against a snapshot of the
    /// context taken at stage start. Errors and panics become critical
    /// `validator_error` outcomes; validators still running at the deadline
    /// get a critical `deadline_exceeded` outcome. Edits are applied to the
    /// draft in declaration order.
    pub async fn run(&self, mut ctx: ValidationContext, deadline: Instant) -> ValidationContext {
        let request_id = ctx.query().id();
        for (index, stage) in self.stages.iter().enumerate() {
            if ctx.has_critical_failure() {
                debug!(
                    %request_id,
                    remaining = self.stages.len() - index,
                    "critical failure, skipping remaining stages"
                );
                break;
            }
            run_stage(stage, &mut ctx, deadline).await;
        }
        ctx
    }

    /// Runs only the leading language stage, so a request that never reaches
    /// the full chain still carries its locale and a first `language` outcome.
    pub async fn detect(&self, mut ctx: ValidationContext, deadline: Instant) -> ValidationContext {
        if let Some(stage) = self.stages.first() {
            run_stage(stage, &mut ctx, deadline).await;
        }
        ctx
    }
}

async fn run_stage(stage: &Stage, ctx: &mut ValidationContext, deadline: Instant) {
    let snapshot = Arc::new(ctx.clone());
    let handles: Vec<_> = stage
        .validators()
        .iter()
        .map(|v| {
            let v = Arc::clone(v);
            let snap = Arc::clone(&snapshot);
            tokio::task::spawn_blocking(move || v.run(&snap))
        })
        .collect();

    let mut outcomes = Vec::with_capacity(handles.len());
    for (validator, handle) in stage.validators().iter().zip(handles) {
        let name = validator.name();
        let outcome = match timeout_at(deadline, handle).await {
            Ok(Ok(Ok(mut outcome))) => {
                outcome.validator = name.to_string();
                outcome
            }
            Ok(Ok(Err(err))) => contained(name, &err),
            Ok(Err(join)) if join.is_panic() => {
                contained(name, &ValidatorError::Panicked { validator: name.to_string() })
            }
            Ok(Err(join)) => contained(name, &ValidatorError::failed(name, join.to_string())),
            Err(_) => ValidatorOutcome::fail(name, Severity::Critical, "deadline_exceeded"),
        };
        outcomes.push(outcome);
    }

    for outcome in outcomes {
        apply(ctx, outcome);
    }
}

fn contained(name: &str, err: &ValidatorError) -> ValidatorOutcome {
    ValidatorOutcome::fail(name, Severity::Critical, "validator_error").with_detail(err.to_string())
}

fn apply(ctx: &mut ValidationContext, mut outcome: ValidatorOutcome) {
    if !outcome.edits.is_empty() {
        let mut text = ctx.draft().to_string();
        let proposed = std::mem::take(&mut outcome.edits);
        for edit in proposed {
            if edit.from.is_empty() || !text.contains(edit.from.as_str()) {
                debug!(validator = %outcome.validator, from = %edit.from, "edit no longer matches, dropped");
                continue;
            }
            text = text.replacen(edit.from.as_str(), &edit.to, 1);
            outcome.edits.push(edit);
        }
        if !outcome.edits.is_empty() {
            ctx.replace_draft(text.clone());
            outcome.patched_text = Some(text);
        }
    }
    if let Some(locale) = outcome.locale {
        ctx.set_locale(locale);
    }
    let request_id = ctx.query().id();
    if outcome.is_critical_failure() {
        warn!(%request_id, validator = %outcome.validator, reason = %outcome.reason, "critical validation failure");
    } else {
        debug!(
            %request_id,
            validator = %outcome.validator,
            passed = outcome.passed,
            reason = %outcome.reason,
            edits = outcome.edits.len(),
            "validator outcome"
        );
    }
    ctx.push_outcome(outcome);
}
