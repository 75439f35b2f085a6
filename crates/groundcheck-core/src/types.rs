//! Domain types shared by the retriever, the validator chain and the recorder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::query::{classify_category, classify_complexity};

pub type ChunkId = String;
pub type Meta = HashMap<String, String>;

/// The two logical collections the retriever searches.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Knowledge,
    Conversation,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Knowledge, Collection::Conversation];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Knowledge => "knowledge",
            Collection::Conversation => "conversation",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "knowledge" => Ok(Collection::Knowledge),
            "conversation" => Ok(Collection::Conversation),
            other => Err(format!("unknown collection '{other}'")),
        }
    }
}

/// Fixed-length embedding. The backing storage is shared and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<f32>", into = "Vec<f32>")]
pub struct EmbeddingVector(Arc<[f32]>);

impl EmbeddingVector {
    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Cosine similarity; 0.0 when dimensions differ or either side is zero.
    pub fn cosine(&self, other: &EmbeddingVector) -> f32 {
        cosine(&self.0, &other.0)
    }

    /// Bitwise equality, stricter than `==` (distinguishes `-0.0` and NaN payloads).
    pub fn bit_eq(&self, other: &EmbeddingVector) -> bool {
        self.0.len() == other.0.len()
            && self.0.iter().zip(other.0.iter()).all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

impl From<Vec<f32>> for EmbeddingVector {
    fn from(v: Vec<f32>) -> Self {
        Self(Arc::from(v))
    }
}

impl From<EmbeddingVector> for Vec<f32> {
    fn from(v: EmbeddingVector) -> Self {
        v.0.to_vec()
    }
}

pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0f32;
    let mut na = 0f32;
    let mut nb = 0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na <= f32::EPSILON || nb <= f32::EPSILON {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

/// Where a chunk came from. Filled in by the external ingestion process.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SourceMeta {
    pub origin: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub meta: Meta,
}

/// One retrievable unit of stored text.
///
/// - `id`: stable and unique within its collection
/// - `embedding`: produced by the same model the retriever queries with
/// - `source`: origin document and ingestion timestamp
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentChunk {
    pub id: ChunkId,
    pub text: String,
    pub embedding: EmbeddingVector,
    pub collection: Collection,
    #[serde(default)]
    pub source: SourceMeta,
}

impl DocumentChunk {
    pub fn new(
        id: impl Into<ChunkId>,
        text: impl Into<String>,
        embedding: impl Into<EmbeddingVector>,
        collection: Collection,
        origin: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            embedding: embedding.into(),
            collection,
            source: SourceMeta { origin: origin.into(), ..SourceMeta::default() },
        }
    }
}

/// A chunk paired with its similarity to the query. Higher is better.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QueryComplexity {
    Short,
    Medium,
    Long,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum QueryCategory {
    Factual,
    Philosophical,
    Technical,
    Conversational,
}

impl QueryCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryCategory::Factual => "factual",
            QueryCategory::Philosophical => "philosophical",
            QueryCategory::Technical => "technical",
            QueryCategory::Conversational => "conversational",
        }
    }
}

impl fmt::Display for QueryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The user's question. Complexity and category are derived once at creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Query {
    id: Uuid,
    text: String,
    complexity: QueryComplexity,
    category: QueryCategory,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), text)
    }

    pub fn with_id(id: Uuid, text: impl Into<String>) -> Self {
        let text = text.into();
        let complexity = classify_complexity(&text);
        let category = classify_category(&text);
        Self { id, text, complexity, category }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn complexity(&self) -> QueryComplexity {
        self.complexity
    }

    pub fn category(&self) -> QueryCategory {
        self.category
    }
}

/// Ranked, deduplicated context for one query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalResult {
    pub query: Query,
    pub chunks: Vec<ScoredChunk>,
    /// Nothing cleared the similarity threshold (or retrieval degraded).
    pub no_reliable_context: bool,
    /// Retrieval failed after retry and was replaced by an empty result.
    pub degraded: bool,
}

impl RetrievalResult {
    pub fn from_chunks(query: Query, chunks: Vec<ScoredChunk>) -> Self {
        let no_reliable_context = chunks.is_empty();
        Self { query, chunks, no_reliable_context, degraded: false }
    }

    pub fn no_reliable_context(query: Query) -> Self {
        Self { query, chunks: Vec::new(), no_reliable_context: true, degraded: false }
    }

    pub fn degraded(query: Query) -> Self {
        Self { query, chunks: Vec::new(), no_reliable_context: true, degraded: true }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn ids(&self) -> Vec<ChunkId> {
        self.chunks.iter().map(|c| c.chunk.id.clone()).collect()
    }

    /// Chunk addressed by a 1-based citation marker such as `[2]`.
    pub fn cited(&self, marker: usize) -> Option<&ScoredChunk> {
        marker.checked_sub(1).and_then(|i| self.chunks.get(i))
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.chunks.iter().map(|c| c.chunk.text.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Es,
    Fr,
    De,
}

impl Locale {
    pub const ALL: [Locale; 4] = [Locale::En, Locale::Es, Locale::Fr, Locale::De];

    pub fn code(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Es => "es",
            Locale::Fr => "fr",
            Locale::De => "de",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Locale::ALL
            .into_iter()
            .find(|l| l.code().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unsupported locale '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    NonCritical,
}

/// One replacement a validator applied to the draft.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextEdit {
    pub from: String,
    pub to: String,
}

impl TextEdit {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self { from: from.into(), to: to.into() }
    }
}

/// Result of running one validator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidatorOutcome {
    pub validator: String,
    pub passed: bool,
    pub severity: Severity,
    /// Machine-readable code, e.g. `missing_citations`.
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Draft text after this validator's edits were applied by the chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patched_text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edits: Vec<TextEdit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<Locale>,
}

impl ValidatorOutcome {
    pub fn pass(validator: &str, severity: Severity, reason: &str) -> Self {
        Self::new(validator, true, severity, reason)
    }

    pub fn fail(validator: &str, severity: Severity, reason: &str) -> Self {
        Self::new(validator, false, severity, reason)
    }

    fn new(validator: &str, passed: bool, severity: Severity, reason: &str) -> Self {
        Self {
            validator: validator.to_string(),
            passed,
            severity,
            reason: reason.to_string(),
            detail: None,
            patched_text: None,
            edits: Vec::new(),
            locale: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_edits(mut self, edits: Vec<TextEdit>) -> Self {
        self.edits = edits;
        self
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = Some(locale);
        self
    }

    pub fn is_critical_failure(&self) -> bool {
        !self.passed && self.severity == Severity::Critical
    }
}

/// The unit passed through the validator chain. One per request.
///
/// Outcomes can only be appended; the draft can only be replaced wholesale by
/// the chain when it applies a validator's edits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationContext {
    retrieval: RetrievalResult,
    draft: String,
    original_draft: String,
    locale: Locale,
    outcomes: Vec<ValidatorOutcome>,
}

impl ValidationContext {
    pub fn new(retrieval: RetrievalResult, draft: impl Into<String>) -> Self {
        let draft = draft.into();
        Self {
            retrieval,
            original_draft: draft.clone(),
            draft,
            locale: Locale::default(),
            outcomes: Vec::new(),
        }
    }

    pub fn query(&self) -> &Query {
        &self.retrieval.query
    }

    pub fn retrieval(&self) -> &RetrievalResult {
        &self.retrieval
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn original_draft(&self) -> &str {
        &self.original_draft
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn outcomes(&self) -> &[ValidatorOutcome] {
        &self.outcomes
    }

    pub fn set_locale(&mut self, locale: Locale) {
        self.locale = locale;
    }

    pub fn replace_draft(&mut self, text: String) {
        self.draft = text;
    }

    pub fn push_outcome(&mut self, outcome: ValidatorOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn first_critical_failure(&self) -> Option<&ValidatorOutcome> {
        self.outcomes.iter().find(|o| o.is_critical_failure())
    }

    pub fn has_critical_failure(&self) -> bool {
        self.first_critical_failure().is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfidenceSignal {
    pub name: String,
    pub delta: f32,
}

/// Bounded trust estimate in `[0, 1]` with the signals that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfidenceScore {
    pub value: f32,
    pub signals: Vec<ConfidenceSignal>,
}

/// What the caller gets back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinalAnswer {
    pub request_id: Uuid,
    pub text: String,
    pub fallback_fired: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    pub confidence: ConfidenceScore,
    pub locale: Locale,
}

/// Durable summary of one completed request. Written once, never updated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationRecord {
    pub request_id: Uuid,
    pub query: String,
    pub category: QueryCategory,
    pub complexity: QueryComplexity,
    pub locale: Locale,
    pub retrieved_ids: Vec<ChunkId>,
    pub no_reliable_context: bool,
    #[serde(default)]
    pub degraded: bool,
    pub outcomes: Vec<ValidatorOutcome>,
    pub confidence: f32,
    pub fallback_fired: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

impl ValidationRecord {
    pub fn from_request(ctx: &ValidationContext, answer: &FinalAnswer) -> Self {
        let query = ctx.query();
        Self {
            request_id: query.id(),
            query: query.text().to_string(),
            category: query.category(),
            complexity: query.complexity(),
            locale: ctx.locale(),
            retrieved_ids: ctx.retrieval().ids(),
            no_reliable_context: ctx.retrieval().no_reliable_context,
            degraded: ctx.retrieval().degraded,
            outcomes: ctx.outcomes().to_vec(),
            confidence: answer.confidence.value,
            fallback_fired: answer.fallback_fired,
            fallback_reason: answer.fallback_reason.clone(),
        }
    }
}

/// Ingestion-side counters for one learning cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LearningCycle {
    pub source: String,
    pub collection: Collection,
    pub documents: usize,
    pub chunks_added: usize,
}
