use groundcheck_core::text::{stopwords, words};
use groundcheck_core::types::{Locale, Severity, ValidationContext, ValidatorOutcome};
use groundcheck_core::ValidatorError;

use crate::validator::Validator;

pub const LANGUAGE: &str = "language";

/// Stopword hits needed before a draft's language counts as certain.
const CONFIDENT_HITS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub locale: Locale,
    pub hits: usize,
    pub runner_up: usize,
}

impl Detection {
    /// Enough evidence and a clear margin over the next language.
    pub fn is_confident(&self) -> bool {
        self.hits >= CONFIDENT_HITS && self.hits >= 2 * self.runner_up.max(1)
    }
}

/// Scores text against each locale's stopword profile plus a few
/// locale-specific characters. `None` when nothing matched.
pub fn detect_locale(text: &str) -> Option<Detection> {
    let tokens = words(text);
    let mut scores: Vec<(Locale, usize)> = Locale::ALL
        .iter()
        .map(|&locale| {
            let list = stopwords(locale);
            let hits = tokens.iter().filter(|t| list.contains(&t.as_str())).count();
            (locale, hits + marker_hits(text, locale))
        })
        .collect();
    // stable sort keeps Locale::ALL order on ties, so English wins a draw
    scores.sort_by(|a, b| b.1.cmp(&a.1));
    let (locale, hits) = scores[0];
    if hits == 0 {
        return None;
    }
    Some(Detection { locale, hits, runner_up: scores[1].1 })
}

fn marker_hits(text: &str, locale: Locale) -> usize {
    let markers: &[char] = match locale {
        Locale::En => &[],
        Locale::Es => &['ñ', '¿', '¡'],
        Locale::Fr => &['ç', 'è', 'ê', 'œ'],
        Locale::De => &['ß', 'ä', 'ö', 'ü'],
    };
    text.chars().filter(|c| markers.contains(c)).count().min(2)
}

/// Sets the request locale from the query (falling back to the draft) and
/// flags a draft written in a different language.
#[derive(Debug, Default)]
pub struct LanguageValidator;

impl LanguageValidator {
    pub fn new() -> Self {
        Self
    }
}

impl Validator for LanguageValidator {
    fn name(&self) -> &'static str {
        LANGUAGE
    }

    fn severity(&self) -> Severity {
        Severity::NonCritical
    }

    fn run(&self, ctx: &ValidationContext) -> Result<ValidatorOutcome, ValidatorError> {
        let from_query = detect_locale(ctx.query().text());
        let from_draft = detect_locale(ctx.draft());
        let (locale, source) = match (from_query, from_draft) {
            (Some(q), _) => (q.locale, "query"),
            (None, Some(d)) => (d.locale, "draft"),
            (None, None) => (Locale::default(), "default"),
        };

        if let (Some(q), Some(d)) = (from_query, from_draft) {
            if d.is_confident() && d.locale != q.locale {
                return Ok(ValidatorOutcome::fail(LANGUAGE, Severity::NonCritical, "language_mismatch")
                    .with_detail(format!("query in {}, answer in {}", q.locale, d.locale))
                    .with_locale(locale));
            }
        }
        Ok(ValidatorOutcome::pass(LANGUAGE, Severity::NonCritical, "detected")
            .with_detail(format!("{locale} from {source}"))
            .with_locale(locale))
    }
}
