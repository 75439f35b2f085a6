//! Lexical helpers shared by the validators and the analyzer.
//!
//! Everything here is locale-agnostic string processing: tokenization with
//! stopword removal, n-grams, `[n]` citation markers, sentence splitting and
//! number extraction.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::types::Locale;

static CITATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(\d{1,3})\]").expect("citation pattern compiles"));

static CITATION_WITH_SPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\[\d{1,3}\]").expect("citation pattern compiles"));

static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:[.,]\d+)*").expect("number pattern compiles"));

const EN_STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it",
    "its", "of", "on", "that", "the", "to", "was", "will", "with", "or", "but", "not", "this",
    "these", "they", "them", "their", "there", "then", "than", "so", "if", "when", "where", "why",
    "how", "what", "which", "who", "whom", "whose", "can", "could", "should", "would", "may",
    "might", "must", "shall", "do", "does", "did", "have", "had", "having", "i", "you", "we",
    "my", "your", "our", "me", "us", "been", "being", "were", "am", "about", "into", "also",
];

const ES_STOPWORDS: &[&str] = &[
    "el", "la", "los", "las", "un", "una", "unos", "unas", "de", "del", "y", "o", "que", "en",
    "es", "son", "por", "para", "con", "se", "su", "sus", "al", "lo", "como", "más", "pero",
    "qué", "cuál", "cómo", "dónde", "cuándo", "está", "yo", "tu", "mi",
];

const FR_STOPWORDS: &[&str] = &[
    "le", "la", "les", "un", "une", "des", "de", "du", "et", "ou", "que", "qui", "en", "est",
    "sont", "pour", "par", "avec", "se", "sa", "son", "ses", "au", "aux", "ce", "cette", "mais",
    "dans", "sur", "pas", "ne", "quel", "quelle", "comment", "où", "je", "tu", "il", "elle",
];

const DE_STOPWORDS: &[&str] = &[
    "der", "die", "das", "ein", "eine", "einen", "und", "oder", "ist", "sind", "von", "zu", "mit",
    "für", "auf", "den", "dem", "des", "im", "nicht", "aber", "wie", "was", "wo", "wann",
    "warum", "ich", "du", "er", "sie", "es", "wir", "auch", "sich", "bei",
];

const UNCERTAINTY_MARKERS: &[&str] = &[
    "i'm not sure",
    "i am not sure",
    "i don't know",
    "i do not know",
    "not certain",
    "i'm uncertain",
    "i am uncertain",
    "i cannot be sure",
    "i can't be sure",
    "i don't have reliable",
    "i do not have reliable",
    "no estoy seguro",
    "no lo sé",
    "no sé",
    "je ne suis pas sûr",
    "je ne sais pas",
    "ich bin mir nicht sicher",
    "ich weiß es nicht",
    "weiß ich nicht",
];

pub fn stopwords(locale: Locale) -> &'static [&'static str] {
    match locale {
        Locale::En => EN_STOPWORDS,
        Locale::Es => ES_STOPWORDS,
        Locale::Fr => FR_STOPWORDS,
        Locale::De => DE_STOPWORDS,
    }
}

static ALL_STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    Locale::ALL.iter().flat_map(|l| stopwords(*l).iter().copied()).collect()
});

pub fn is_stopword(word: &str) -> bool {
    ALL_STOPWORDS.contains(word)
}

/// Lowercased words, apostrophes and possessive `'s` folded away, no stopwords.
///
/// `"Paris, France's capital"` → `["paris", "france", "capital"]`.
pub fn content_tokens(text: &str) -> Vec<String> {
    words(&strip_citations(text))
        .into_iter()
        .filter(|w| !is_stopword(w))
        .collect()
}

/// Lowercased words without stopword removal.
pub fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '’'))
        .filter_map(|raw| {
            let raw = raw.trim_matches(|c: char| c == '\'' || c == '’');
            let stem = raw
                .strip_suffix("'s")
                .or_else(|| raw.strip_suffix("’s"))
                .unwrap_or(raw);
            let cleaned: String = stem.chars().filter(|c| c.is_alphanumeric()).collect();
            (!cleaned.is_empty()).then_some(cleaned)
        })
        .collect()
}

/// Contiguous n-grams joined by a single space. `n == 0` is treated as 1; a
/// token list shorter than `n` yields the whole list as one gram.
pub fn ngrams(tokens: &[String], n: usize) -> HashSet<String> {
    let n = n.max(1);
    if tokens.is_empty() {
        return HashSet::new();
    }
    if tokens.len() < n {
        return std::iter::once(tokens.join(" ")).collect();
    }
    tokens.windows(n).map(|w| w.join(" ")).collect()
}

/// Fraction of `part`'s grams present in `whole`. Empty `part` yields 0.0.
pub fn overlap_fraction(part: &HashSet<String>, whole: &HashSet<String>) -> f32 {
    if part.is_empty() {
        return 0.0;
    }
    let hits = part.iter().filter(|g| whole.contains(*g)).count();
    hits as f32 / part.len() as f32
}

/// A `[n]` marker found in text, with its byte span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Citation {
    pub marker: usize,
    pub start: usize,
    pub end: usize,
}

pub fn citations(text: &str) -> Vec<Citation> {
    CITATION_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let marker = caps.get(1)?.as_str().parse().ok()?;
            Some(Citation { marker, start: whole.start(), end: whole.end() })
        })
        .collect()
}

pub fn strip_citations(text: &str) -> String {
    CITATION_WITH_SPACE_RE.replace_all(text, "").into_owned()
}

/// Removes one specific `[n]` marker (and the whitespace before it).
pub fn strip_marker(text: &str, marker: usize) -> String {
    let re = format!(r"\s*\[{marker}\]");
    match Regex::new(&re) {
        Ok(re) => re.replace_all(text, "").into_owned(),
        Err(_) => text.to_string(),
    }
}

/// Sentences ending at `.`, `!`, `?` (followed by whitespace or end) or a newline.
pub fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut iter = text.char_indices().peekable();
    while let Some((i, c)) = iter.next() {
        let boundary = match c {
            '\n' => true,
            '.' | '!' | '?' => iter.peek().map_or(true, |(_, next)| next.is_whitespace()),
            _ => false,
        };
        if boundary {
            let end = i + c.len_utf8();
            let s = text[start..end].trim();
            if !s.is_empty() {
                out.push(s);
            }
            start = end;
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}

/// Numbers as written, with thousands separators and trailing dots removed.
pub fn numbers(text: &str) -> Vec<String> {
    NUMBER_RE
        .find_iter(&strip_citations(text))
        .map(|m| normalize_number(m.as_str()))
        .collect()
}

fn normalize_number(raw: &str) -> String {
    // "1,000" and "1.000" both mean a thousand when every group has three digits
    let groups: Vec<&str> = raw.split(|c: char| c == ',' || c == '.').collect();
    if groups.len() > 1 && groups[1..].iter().all(|g| g.len() == 3) {
        return groups.concat();
    }
    raw.replace(',', ".")
}

pub fn expresses_uncertainty(text: &str) -> bool {
    let lower = text.to_lowercase().replace('’', "'");
    UNCERTAINTY_MARKERS.iter().any(|m| lower.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn possessive_and_citations_fold_away() {
        assert_eq!(content_tokens("Paris, France's capital"), vec!["paris", "france", "capital"]);
        assert_eq!(content_tokens("Paris is the capital of France [1]"), vec!["paris", "capital", "france"]);
    }

    #[test]
    fn sentences_keep_citation_with_its_sentence() {
        let s = sentences("Rust is fast [1]. It has no GC [2]! Right?");
        assert_eq!(s, vec!["Rust is fast [1].", "It has no GC [2]!", "Right?"]);
    }

    #[test]
    fn decimals_survive_and_thousands_merge() {
        assert_eq!(numbers("3.14 and 1,000 and 2024 [3]"), vec!["3.14", "1000", "2024"]);
    }

    #[test]
    fn uncertainty_detects_curly_apostrophes() {
        assert!(expresses_uncertainty("Honestly, I’m not sure about that."));
        assert!(!expresses_uncertainty("The answer is 42."));
    }
}
