use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use groundcheck_core::config::LearningConfig;
use groundcheck_core::text::content_tokens;
use groundcheck_core::types::ValidationRecord;
use serde::{Deserialize, Serialize};

use crate::log::Entry;

const TOP_TERMS: usize = 5;

/// Category name used for suggestions driven by missing context.
pub const COVERAGE_GAP: &str = "coverage_gap";

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CategoryStats {
    pub total: usize,
    pub fallbacks: usize,
    pub fallback_rate: f32,
    /// Most frequent content terms of the queries that fell back.
    pub top_terms: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ReasonStats {
    pub count: usize,
    pub rate: f32,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct PatternReport {
    pub window_days: u32,
    pub total: usize,
    pub fallbacks: usize,
    pub fallback_rate: f32,
    pub no_reliable_context: usize,
    pub failure_rates_by_category: BTreeMap<String, CategoryStats>,
    pub failure_rates_by_reason: BTreeMap<String, ReasonStats>,
    /// Top terms across every query that had no reliable context.
    pub gap_terms: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LearningSuggestion {
    pub topic: String,
    pub priority: Priority,
    pub sources: Vec<String>,
    pub category: String,
    pub failure_rate: f32,
}

/// Aggregates the records of the last `window_days` days before `now`.
pub fn analyze_patterns(records: &[Entry<ValidationRecord>], window_days: u32, now: DateTime<Utc>) -> PatternReport {
    let since = now - Duration::days(i64::from(window_days));
    let window: Vec<&ValidationRecord> =
        records.iter().filter(|e| e.timestamp >= since && e.timestamp <= now).map(|e| &e.body).collect();

    let mut report = PatternReport { window_days, total: window.len(), ..PatternReport::default() };
    let mut terms: HashMap<String, HashMap<String, usize>> = HashMap::new();
    let mut gap_terms: HashMap<String, usize> = HashMap::new();

    for record in &window {
        let category = record.category.as_str().to_string();
        let stats = report.failure_rates_by_category.entry(category.clone()).or_default();
        stats.total += 1;
        if record.no_reliable_context {
            report.no_reliable_context += 1;
            for term in content_tokens(&record.query) {
                *gap_terms.entry(term).or_default() += 1;
            }
        }
        if !record.fallback_fired {
            continue;
        }
        stats.fallbacks += 1;
        report.fallbacks += 1;
        let reason = record.fallback_reason.clone().unwrap_or_else(|| "unknown".to_string());
        report.failure_rates_by_reason.entry(reason).or_default().count += 1;
        let counts = terms.entry(category).or_default();
        for term in content_tokens(&record.query) {
            *counts.entry(term).or_default() += 1;
        }
    }

    report.fallback_rate = rate(report.fallbacks, report.total);
    for (category, stats) in report.failure_rates_by_category.iter_mut() {
        stats.fallback_rate = rate(stats.fallbacks, stats.total);
        stats.top_terms = terms.remove(category).map(top_terms).unwrap_or_default();
    }
    for stats in report.failure_rates_by_reason.values_mut() {
        stats.rate = rate(stats.count, report.total);
    }
    report.gap_terms = top_terms(gap_terms);
    report
}

/// High/medium priority suggestions for weak categories, plus a coverage-gap
/// suggestion when queries often find no reliable context.
pub fn suggest_learning(report: &PatternReport, config: &LearningConfig) -> Vec<LearningSuggestion> {
    let priority_for = |rate: f32| {
        if rate >= config.high_priority_rate {
            Some(Priority::High)
        } else if rate >= config.medium_priority_rate {
            Some(Priority::Medium)
        } else {
            None
        }
    };
    let sources_for =
        |category: &str| config.sources.get(category).cloned().unwrap_or_else(|| config.default_sources.clone());

    let mut out = Vec::new();
    for (category, stats) in &report.failure_rates_by_category {
        if stats.total < config.min_samples {
            continue;
        }
        let Some(priority) = priority_for(stats.fallback_rate) else { continue };
        let topic = if stats.top_terms.is_empty() {
            category.clone()
        } else {
            format!("{}: {}", category, stats.top_terms.join(" "))
        };
        out.push(LearningSuggestion {
            topic,
            priority,
            sources: sources_for(category),
            category: category.clone(),
            failure_rate: stats.fallback_rate,
        });
    }

    let gap_rate = rate(report.no_reliable_context, report.total);
    if report.total >= config.min_samples {
        if let Some(priority) = priority_for(gap_rate) {
            let topic = if report.gap_terms.is_empty() {
                "uncovered questions".to_string()
            } else {
                format!("uncovered questions: {}", report.gap_terms.join(" "))
            };
            out.push(LearningSuggestion {
                topic,
                priority,
                sources: sources_for(COVERAGE_GAP),
                category: COVERAGE_GAP.to_string(),
                failure_rate: gap_rate,
            });
        }
    }

    out.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then(b.failure_rate.total_cmp(&a.failure_rate))
            .then_with(|| a.category.cmp(&b.category))
    });
    out
}

fn rate(part: usize, total: usize) -> f32 {
    if total == 0 {
        0.0
    } else {
        part as f32 / total as f32
    }
}

fn top_terms(counts: HashMap<String, usize>) -> Vec<String> {
    let mut counts: Vec<(String, usize)> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts.into_iter().take(TOP_TERMS).map(|(t, _)| t).collect()
}
