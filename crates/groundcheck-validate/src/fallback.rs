use groundcheck_core::config::FallbackConfig;
use groundcheck_core::text::expresses_uncertainty;
use groundcheck_core::types::{ConfidenceScore, FinalAnswer, Locale, ValidationContext};
use tracing::info;

pub const NO_RELIABLE_CONTEXT: &str = "no_reliable_context";

fn builtin_template(locale: Locale) -> &'static str {
    match locale {
        Locale::En => "I don't have reliable information to answer that accurately.",
        Locale::Es => "No tengo información fiable para responder a eso con precisión.",
        Locale::Fr => "Je n'ai pas d'informations fiables pour répondre à cela avec précision.",
        Locale::De => "Ich habe keine verlässlichen Informationen, um das genau zu beantworten.",
    }
}

fn learning_note(locale: Locale) -> &'static str {
    match locale {
        Locale::En => "This question has been logged so the knowledge base can be extended to cover it.",
        Locale::Es => "Esta pregunta se ha registrado para ampliar la base de conocimiento.",
        Locale::Fr => "Cette question a été enregistrée afin d'enrichir la base de connaissances.",
        Locale::De => "Diese Frage wurde protokolliert, damit die Wissensbasis erweitert werden kann.",
    }
}

/// Replaces unsafe drafts with a localized "no reliable information" answer.
#[derive(Debug, Clone)]
pub struct FallbackHandler {
    config: FallbackConfig,
}

impl FallbackHandler {
    pub fn new(config: &FallbackConfig) -> Self {
        Self { config: config.clone() }
    }

    /// Why the draft must not be returned, if it must not.
    pub fn trigger(&self, ctx: &ValidationContext) -> Option<String> {
        if let Some(failure) = ctx.first_critical_failure() {
            return Some(failure.reason.clone());
        }
        if ctx.retrieval().no_reliable_context && !expresses_uncertainty(ctx.draft()) {
            return Some(NO_RELIABLE_CONTEXT.to_string());
        }
        None
    }

    pub fn template(&self, locale: Locale) -> String {
        let base = self
            .config
            .templates
            .get(locale.code())
            .map(String::as_str)
            .unwrap_or_else(|| builtin_template(locale));
        if self.config.mention_learning {
            format!("{} {}", base, learning_note(locale))
        } else {
            base.to_string()
        }
    }

    /// The answer for a context that has been through the chain.
    pub fn finalize(&self, ctx: &ValidationContext, confidence: ConfidenceScore) -> FinalAnswer {
        match self.trigger(ctx) {
            Some(reason) => self.fallback_answer(ctx.query().id(), ctx.locale(), reason, confidence),
            None => FinalAnswer {
                request_id: ctx.query().id(),
                text: ctx.draft().to_string(),
                fallback_fired: false,
                fallback_reason: None,
                confidence,
                locale: ctx.locale(),
            },
        }
    }

    /// A fallback answer for a known reason, e.g. when generation failed.
    pub fn fallback_answer(
        &self,
        request_id: uuid::Uuid,
        locale: Locale,
        reason: String,
        confidence: ConfidenceScore,
    ) -> FinalAnswer {
        info!(%request_id, %reason, %locale, "fallback fired");
        FinalAnswer {
            request_id,
            text: self.template(locale),
            fallback_fired: true,
            fallback_reason: Some(reason),
            confidence,
            locale,
        }
    }
}
