use groundcheck_core::config::ConfidenceConfig;
use groundcheck_core::text::expresses_uncertainty;
use groundcheck_core::types::{ConfidenceScore, ConfidenceSignal, Severity, ValidationContext};

const NO_CONTEXT: f32 = 0.1;
const NO_CONTEXT_UNCERTAIN: f32 = 0.2;
const SINGLE_SOURCE: f32 = 0.5;
const MULTIPLE_SOURCES: f32 = 0.8;
/// Lowest score once context exists; the band below is for no context.
const CONTEXT_FLOOR: f32 = 0.2;

/// Turns retrieval depth and validator outcomes into a bounded score.
///
/// - no context: 0.2 when the draft admits uncertainty, else 0.1
/// - one chunk: 0.5, two or more: 0.8
/// - bonus when critical checks ran and all passed
/// - per-validator penalty for each failed non-critical check, never
///   taking the score below the context base
/// - a critical failure pins the score at 0.2
#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    config: ConfidenceConfig,
}

impl ConfidenceScorer {
    pub fn new(config: &ConfidenceConfig) -> Self {
        Self { config: config.clone() }
    }

    pub fn score(&self, ctx: &ValidationContext) -> ConfidenceScore {
        let docs = ctx.retrieval().len();
        let mut signals = Vec::new();

        if docs == 0 {
            let value = if expresses_uncertainty(ctx.draft()) {
                signals.push(signal("no_context_uncertain", NO_CONTEXT_UNCERTAIN));
                NO_CONTEXT_UNCERTAIN
            } else {
                signals.push(signal("no_context", NO_CONTEXT));
                NO_CONTEXT
            };
            return ConfidenceScore { value, signals };
        }

        let base = if docs == 1 { SINGLE_SOURCE } else { MULTIPLE_SOURCES };
        signals.push(signal(if docs == 1 { "single_source" } else { "multiple_sources" }, base));
        let mut value = base;

        if ctx.has_critical_failure() {
            let delta = CONTEXT_FLOOR - base;
            signals.push(signal("critical_failure", delta));
            return finish(base + delta, signals);
        }

        let critical_ran = ctx.outcomes().iter().any(|o| o.severity == Severity::Critical);
        if critical_ran {
            value += self.config.critical_bonus;
            signals.push(signal("critical_checks_passed", self.config.critical_bonus));
        }

        for outcome in ctx.outcomes().iter().filter(|o| !o.passed && o.severity == Severity::NonCritical) {
            let penalty = self.config.penalty_for(&outcome.validator);
            value -= penalty;
            signals.push(signal(&format!("penalty:{}", outcome.validator), -penalty));
        }

        finish(value.max(base), signals)
    }
}

fn signal(name: &str, delta: f32) -> ConfidenceSignal {
    ConfidenceSignal { name: name.to_string(), delta }
}

fn finish(value: f32, signals: Vec<ConfidenceSignal>) -> ConfidenceScore {
    let value = (value.clamp(0.0, 1.0) * 1000.0).round() / 1000.0;
    ConfidenceScore { value, signals }
}
