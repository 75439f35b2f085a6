//! Query classification: length/complexity class and topical category.

use crate::text::words;
use crate::types::{QueryCategory, QueryComplexity};

const SHORT_MAX_WORDS: usize = 6;
const MEDIUM_MAX_WORDS: usize = 20;

const TECHNICAL_TERMS: &[&str] = &[
    "code", "compile", "compiler", "function", "api", "error", "bug", "install", "database",
    "server", "algorithm", "rust", "python", "javascript", "linux", "kernel", "config",
    "configure", "deploy", "docker", "network", "protocol", "memory", "thread", "async",
    "library", "crate", "query", "sql", "http", "debug", "runtime", "binary",
];

const PHILOSOPHICAL_TERMS: &[&str] = &[
    "meaning", "consciousness", "conscious", "ethics", "ethical", "moral", "morality", "exist",
    "existence", "purpose", "soul", "free", "will", "truth", "mind", "feel", "feelings",
    "believe", "belief", "sentient", "happiness", "death", "god", "reality", "self",
];

const FACTUAL_CUES: &[&str] = &[
    "who", "when", "where", "which", "capital", "population", "year", "date", "many", "much",
    "define", "definition", "invented", "founded", "born", "largest", "smallest", "distance",
    "height", "quién", "cuándo", "dónde", "qui", "quand", "où", "wer", "wann", "wo",
];

/// Short queries get fewer retrieval slots than long or multi-part ones.
pub fn classify_complexity(text: &str) -> QueryComplexity {
    let n = text.split_whitespace().count();
    let clauses = text.chars().filter(|c| matches!(c, '?' | ';')).count();
    if n <= SHORT_MAX_WORDS && clauses <= 1 {
        QueryComplexity::Short
    } else if n <= MEDIUM_MAX_WORDS && clauses <= 1 {
        QueryComplexity::Medium
    } else {
        QueryComplexity::Long
    }
}

/// Keyword vote. Ties resolve technical, then philosophical, then factual.
pub fn classify_category(text: &str) -> QueryCategory {
    let words = words(text);
    let count = |terms: &[&str]| words.iter().filter(|w| terms.contains(&w.as_str())).count();
    let technical = count(TECHNICAL_TERMS);
    let philosophical = count(PHILOSOPHICAL_TERMS);
    let factual = count(FACTUAL_CUES);

    let best = technical.max(philosophical).max(factual);
    if best == 0 {
        QueryCategory::Conversational
    } else if technical == best {
        QueryCategory::Technical
    } else if philosophical == best {
        QueryCategory::Philosophical
    } else {
        QueryCategory::Factual
    }
}
