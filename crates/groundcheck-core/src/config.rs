//! Configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys separated by `__`, e.g. `APP_RETRIEVAL__MIN_SIMILARITY=0.35`).
//! The merged figment is extracted once into an immutable [`Settings`] that
//! constructors borrow; nothing reads configuration after startup.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;
use crate::types::QueryComplexity;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    /// Defaults overlaid with an inline TOML document. Used by tests and tools.
    pub fn from_toml_str(toml: &str) -> Self {
        let figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::string(toml));
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }
}

/// Everything the pipeline needs, resolved once at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub embedding: EmbeddingConfig,
    pub store: StoreConfig,
    pub retrieval: RetrievalConfig,
    pub validation: ValidationConfig,
    pub confidence: ConfidenceConfig,
    pub fallback: FallbackConfig,
    pub recorder: RecorderConfig,
    pub learning: LearningConfig,
    pub pipeline: PipelineConfig,
}

impl Settings {
    pub fn validate(&self) -> Result<(), Error> {
        let r = &self.retrieval;
        check_unit("retrieval.min_similarity", r.min_similarity)?;
        check_unit("retrieval.mmr_lambda", r.mmr_lambda)?;
        if r.overfetch_factor == 0 {
            return Err(Error::InvalidConfig("retrieval.overfetch_factor must be >= 1".into()));
        }
        let v = &self.validation;
        check_unit("validation.min_overlap", v.min_overlap)?;
        check_unit("validation.min_citation_relevance", v.min_citation_relevance)?;
        if v.ngram == 0 {
            return Err(Error::InvalidConfig("validation.ngram must be >= 1".into()));
        }
        for (name, p) in &self.confidence.penalties {
            if !(0.0..=0.5).contains(p) {
                return Err(Error::InvalidConfig(format!("confidence.penalties.{name} out of range: {p}")));
            }
        }
        let l = &self.learning;
        check_unit("learning.high_priority_rate", l.high_priority_rate)?;
        check_unit("learning.medium_priority_rate", l.medium_priority_rate)?;
        if l.medium_priority_rate > l.high_priority_rate {
            return Err(Error::InvalidConfig(
                "learning.medium_priority_rate must not exceed learning.high_priority_rate".into(),
            ));
        }
        if self.embedding.dimension == 0 {
            return Err(Error::InvalidConfig("embedding.dimension must be > 0".into()));
        }
        Ok(())
    }
}

fn check_unit(name: &str, value: f32) -> Result<(), Error> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!("{name} must be within [0, 1], got {value}")))
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingProvider {
    /// Token-hash projection; deterministic and dependency-free.
    #[default]
    Hashing,
    /// Local BGE-M3 weights (needs the `model` feature of groundcheck-embed).
    BgeM3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub dimension: usize,
    pub max_len: usize,
    pub model_dir: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { provider: EmbeddingProvider::Hashing, dimension: 384, max_len: 256, model_dir: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub uri: String,
    pub knowledge_table: String,
    pub conversation_table: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: "data/lancedb".to_string(),
            knowledge_table: "knowledge".to_string(),
            conversation_table: "conversation".to_string(),
        }
    }
}

/// Knowledge slots per query complexity class.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AdaptiveLimits {
    pub short: usize,
    pub medium: usize,
    pub long: usize,
}

impl Default for AdaptiveLimits {
    fn default() -> Self {
        Self { short: 2, medium: 3, long: 5 }
    }
}

impl AdaptiveLimits {
    pub fn for_complexity(&self, complexity: QueryComplexity) -> usize {
        match complexity {
            QueryComplexity::Short => self.short,
            QueryComplexity::Medium => self.medium,
            QueryComplexity::Long => self.long,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub min_similarity: f32,
    pub mmr_lambda: f32,
    pub overfetch_factor: usize,
    pub knowledge_limits: AdaptiveLimits,
    pub conversation_limit: usize,
    pub embed_timeout_ms: u64,
    pub search_timeout_ms: u64,
    pub retry_backoff_ms: u64,
    pub verify_determinism: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            min_similarity: 0.4,
            mmr_lambda: 0.7,
            overfetch_factor: 4,
            knowledge_limits: AdaptiveLimits::default(),
            conversation_limit: 2,
            embed_timeout_ms: 2_000,
            search_timeout_ms: 2_000,
            retry_backoff_ms: 200,
            verify_determinism: false,
        }
    }
}

impl RetrievalConfig {
    pub fn embed_timeout(&self) -> Duration {
        Duration::from_millis(self.embed_timeout_ms)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

pub const ALL_VALIDATORS: &[&str] = &[
    "language",
    "citation_required",
    "citation_relevance",
    "evidence_overlap",
    "numeric_claims",
    "identity",
    "anthropomorphic",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Validator names to run; `language` is always included.
    pub enabled: Vec<String>,
    pub rules_path: Option<String>,
    pub min_overlap: f32,
    pub ngram: usize,
    pub min_citations: usize,
    pub min_citation_relevance: f32,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: ALL_VALIDATORS.iter().map(|s| s.to_string()).collect(),
            rules_path: None,
            min_overlap: 0.3,
            ngram: 1,
            min_citations: 1,
            min_citation_relevance: 0.1,
        }
    }
}

impl ValidationConfig {
    pub fn is_enabled(&self, name: &str) -> bool {
        name == "language" || self.enabled.iter().any(|n| n == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    pub critical_bonus: f32,
    pub default_penalty: f32,
    /// Per-validator penalty for a failed non-critical outcome.
    pub penalties: BTreeMap<String, f32>,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        let penalties = [("evidence_overlap", 0.2), ("numeric_claims", 0.15)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        Self { critical_bonus: 0.1, default_penalty: 0.1, penalties }
    }
}

impl ConfidenceConfig {
    pub fn penalty_for(&self, validator: &str) -> f32 {
        self.penalties.get(validator).copied().unwrap_or(self.default_penalty)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub mention_learning: bool,
    /// Locale code → template text, replacing the built-in wording.
    pub templates: BTreeMap<String, String>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self { mention_learning: true, templates: BTreeMap::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub validation_log: String,
    pub learning_log: String,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub fsync: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            validation_log: "data/validation_log.jsonl".to_string(),
            learning_log: "data/learning_log.jsonl".to_string(),
            max_retries: 2,
            retry_backoff_ms: 50,
            fsync: false,
        }
    }
}

impl RecorderConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    pub window_days: u32,
    pub min_samples: usize,
    pub high_priority_rate: f32,
    pub medium_priority_rate: f32,
    pub default_sources: Vec<String>,
    /// Category name → sources worth ingesting for it.
    pub sources: BTreeMap<String, Vec<String>>,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            window_days: 7,
            min_samples: 3,
            high_priority_rate: 0.5,
            medium_priority_rate: 0.2,
            default_sources: vec!["curated reference documents".to_string()],
            sources: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub request_deadline_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { request_deadline_ms: 10_000 }
    }
}

impl PipelineConfig {
    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
