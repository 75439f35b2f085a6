use groundcheck_core::config::{ConfidenceConfig, FallbackConfig};
use groundcheck_core::types::{
    Collection, DocumentChunk, Locale, Query, RetrievalResult, ScoredChunk, Severity, ValidationContext,
    ValidatorOutcome,
};
use groundcheck_validate::{ConfidenceScorer, FallbackHandler, NO_RELIABLE_CONTEXT};

fn with_docs(n: usize, draft: &str) -> ValidationContext {
    let hits = (0..n)
        .map(|i| ScoredChunk {
            chunk: DocumentChunk::new(format!("k{i}"), "text", vec![1.0], Collection::Knowledge, "t"),
            score: 0.7,
        })
        .collect();
    ValidationContext::new(RetrievalResult::from_chunks(Query::new("q"), hits), draft)
}

fn scorer() -> ConfidenceScorer {
    ConfidenceScorer::new(&ConfidenceConfig::default())
}

#[test]
fn no_context_scores_stay_in_reserved_band() {
    let ctx = with_docs(0, "William won.");
    assert!((scorer().score(&ctx).value - 0.1).abs() < 1e-6);
    let ctx = with_docs(0, "I'm not sure who won.");
    assert!((scorer().score(&ctx).value - 0.2).abs() < 1e-6);
}

#[test]
fn single_source_all_passing_is_point_six() {
    let mut ctx = with_docs(1, "draft [1]");
    ctx.push_outcome(ValidatorOutcome::pass("citation_required", Severity::Critical, "cited"));
    ctx.push_outcome(ValidatorOutcome::pass("evidence_overlap", Severity::NonCritical, "supported"));
    let score = scorer().score(&ctx);
    assert!(score.value >= 0.5 && score.value <= 0.6, "{}", score.value);
    assert!(score.signals.iter().any(|s| s.name == "critical_checks_passed"));
}

#[test]
fn non_critical_penalties_never_drop_below_base() {
    let mut ctx = with_docs(2, "draft [1]");
    ctx.push_outcome(ValidatorOutcome::pass("identity", Severity::Critical, "consistent"));
    ctx.push_outcome(ValidatorOutcome::fail("evidence_overlap", Severity::NonCritical, "low_overlap"));
    ctx.push_outcome(ValidatorOutcome::fail("numeric_claims", Severity::NonCritical, "unsupported_number"));
    let score = scorer().score(&ctx);
    assert!(score.value >= 0.8);
    assert!(score.signals.iter().any(|s| s.name == "penalty:evidence_overlap" && (s.delta + 0.2).abs() < 1e-6));
}

#[test]
fn critical_failure_pins_to_floor() {
    let mut ctx = with_docs(3, "draft");
    ctx.push_outcome(ValidatorOutcome::fail("citation_required", Severity::Critical, "missing_citations"));
    let score = scorer().score(&ctx);
    assert!((score.value - 0.2).abs() < 1e-6);
}

#[test]
fn fallback_triggers() {
    let handler = FallbackHandler::new(&FallbackConfig::default());

    let ctx = with_docs(0, "William won.");
    assert_eq!(handler.trigger(&ctx).as_deref(), Some(NO_RELIABLE_CONTEXT));

    let ctx = with_docs(0, "I don't know who won.");
    assert_eq!(handler.trigger(&ctx), None);

    let ctx = with_docs(1, "grounded [1]");
    let answer = handler.finalize(&ctx, scorer().score(&ctx));
    assert!(!answer.fallback_fired);
    assert_eq!(answer.text, "grounded [1]");
}

#[test]
fn templates_follow_locale_and_config() {
    let handler = FallbackHandler::new(&FallbackConfig::default());
    assert!(handler.template(Locale::De).starts_with("Ich habe keine"));
    assert!(handler.template(Locale::En).contains("knowledge base"));

    let mut config = FallbackConfig { mention_learning: false, ..FallbackConfig::default() };
    config.templates.insert("fr".into(), "Pas de réponse fiable.".into());
    let handler = FallbackHandler::new(&config);
    assert_eq!(handler.template(Locale::Fr), "Pas de réponse fiable.");
    assert_eq!(handler.template(Locale::En), "I don't have reliable information to answer that accurately.");
}
