//! Rulebook for the identity and anthropomorphic validators.
//!
//! ```toml
//! version = 1
//!
//! [[identity]]
//! id = "claims-human"
//! pattern = "\\bI am (a )?human\\b"
//!
//! [[anthropomorphic]]
//! id = "feelings"
//! pattern = "\\bI feel\\b"
//! replacement = "it appears"
//! locale = "en"
//! ```
//!
//! Patterns are case-insensitive regular expressions. The handle swaps in a
//! freshly parsed book on [`RuleBookHandle::reload`]; readers holding the old
//! `Arc` finish with it undisturbed.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use groundcheck_core::types::Locale;
use groundcheck_core::Error;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    identity: Vec<IdentitySpec>,
    #[serde(default)]
    anthropomorphic: Vec<AnthropomorphicSpec>,
}

fn default_version() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct IdentitySpec {
    id: String,
    pattern: String,
}

#[derive(Debug, Deserialize)]
struct AnthropomorphicSpec {
    id: String,
    pattern: String,
    replacement: String,
    #[serde(default)]
    locale: Option<Locale>,
}

#[derive(Debug, Clone)]
pub struct IdentityRule {
    pub id: String,
    pub pattern: Regex,
}

#[derive(Debug, Clone)]
pub struct AnthropomorphicRule {
    pub id: String,
    pub pattern: Regex,
    pub replacement: String,
    /// `None` applies to every locale.
    pub locale: Option<Locale>,
}

impl AnthropomorphicRule {
    pub fn applies_to(&self, locale: Locale) -> bool {
        self.locale.map_or(true, |l| l == locale)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleBook {
    pub version: u32,
    pub identity: Vec<IdentityRule>,
    pub anthropomorphic: Vec<AnthropomorphicRule>,
}

impl RuleBook {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_toml_str(source: &str) -> Result<Self, Error> {
        let file: RuleFile = toml::from_str(source).map_err(|e| Error::Rules(e.to_string()))?;
        let identity = file
            .identity
            .into_iter()
            .map(|r| -> Result<IdentityRule, Error> {
                Ok(IdentityRule { pattern: compile(&r.id, &r.pattern)?, id: r.id })
            })
            .collect::<Result<Vec<_>, Error>>()?;
        let anthropomorphic = file
            .anthropomorphic
            .into_iter()
            .map(|r| -> Result<AnthropomorphicRule, Error> {
                Ok(AnthropomorphicRule {
                    pattern: compile(&r.id, &r.pattern)?,
                    id: r.id,
                    replacement: r.replacement,
                    locale: r.locale,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(Self { version: file.version, identity, anthropomorphic })
    }

    /// A missing file is an empty rulebook; an unreadable or invalid one is an error.
    pub fn load(path: &Path) -> Result<Self, Error> {
        if !path.exists() {
            warn!(path = %path.display(), "rulebook not found, identity and anthropomorphic checks will pass");
            return Ok(Self::empty());
        }
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::Rules(format!("cannot read {}: {}", path.display(), e)))?;
        let book = Self::from_toml_str(&source)?;
        info!(
            path = %path.display(),
            version = book.version,
            identity = book.identity.len(),
            anthropomorphic = book.anthropomorphic.len(),
            "loaded rulebook"
        );
        Ok(book)
    }

    pub fn len(&self) -> usize {
        self.identity.len() + self.anthropomorphic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn compile(id: &str, pattern: &str) -> Result<Regex, Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| Error::Rules(format!("rule '{id}': {e}")))
}

/// Shared, hot-reloadable rulebook.
#[derive(Debug)]
pub struct RuleBookHandle {
    path: Option<PathBuf>,
    current: RwLock<Arc<RuleBook>>,
}

impl RuleBookHandle {
    pub fn new(book: RuleBook) -> Self {
        Self { path: None, current: RwLock::new(Arc::new(book)) }
    }

    /// Loads from `path` when given; `None` means no rules.
    pub fn open(path: Option<&Path>) -> Result<Self, Error> {
        let book = match path {
            Some(p) => RuleBook::load(p)?,
            None => RuleBook::empty(),
        };
        Ok(Self { path: path.map(Path::to_path_buf), current: RwLock::new(Arc::new(book)) })
    }

    pub fn current(&self) -> Arc<RuleBook> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    pub fn replace(&self, book: RuleBook) {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(book);
    }

    /// Re-reads the file. On error the previous rulebook stays active.
    pub fn reload(&self) -> Result<Arc<RuleBook>, Error> {
        let Some(path) = &self.path else {
            return Ok(self.current());
        };
        let book = RuleBook::load(path)?;
        self.replace(book);
        Ok(self.current())
    }
}
