//! Read-only views over the validation history and the learning-cycle log.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use groundcheck_core::config::LearningConfig;
use groundcheck_core::types::{LearningCycle, ValidationRecord};
use groundcheck_core::RecorderError;
use serde::Serialize;

use crate::analyzer::{analyze_patterns, suggest_learning, LearningSuggestion};
use crate::log::{Entry, VerifyReport};
use crate::recorder::{LearningLog, ValidationRecorder};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SourceStats {
    pub source: String,
    pub cycles: usize,
    pub chunks_added: usize,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DailyMetrics {
    pub date: NaiveDate,
    pub cycles: usize,
    pub chunks_added: usize,
    pub requests: usize,
    pub fallbacks: usize,
    pub average_confidence: Option<f32>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Summary {
    pub cycles: usize,
    pub chunks_added: usize,
    pub sources: usize,
    pub requests: usize,
    pub fallback_rate: f32,
    pub average_confidence: Option<f32>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PassRate {
    pub validator: String,
    pub runs: usize,
    pub passes: usize,
    pub rate: f32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LogsReport {
    pub validation: VerifyReport,
    pub learning: VerifyReport,
}

pub struct Introspection<'a> {
    validation: &'a ValidationRecorder,
    learning: &'a LearningLog,
    config: &'a LearningConfig,
}

impl<'a> Introspection<'a> {
    pub fn new(validation: &'a ValidationRecorder, learning: &'a LearningLog, config: &'a LearningConfig) -> Self {
        Self { validation, learning, config }
    }

    /// Distinct learning sources, most recently seen first.
    pub async fn learning_sources(&self) -> Result<Vec<SourceStats>, RecorderError> {
        let mut by_source: BTreeMap<String, SourceStats> = BTreeMap::new();
        for entry in self.learning.cycles().await? {
            let stats = by_source.entry(entry.body.source.clone()).or_insert_with(|| SourceStats {
                source: entry.body.source.clone(),
                cycles: 0,
                chunks_added: 0,
                last_seen: entry.timestamp,
            });
            stats.cycles += 1;
            stats.chunks_added += entry.body.chunks_added;
            stats.last_seen = stats.last_seen.max(entry.timestamp);
        }
        let mut out: Vec<SourceStats> = by_source.into_values().collect();
        out.sort_by(|a, b| b.last_seen.cmp(&a.last_seen).then_with(|| a.source.cmp(&b.source)));
        Ok(out)
    }

    pub async fn daily_metrics(&self, date: NaiveDate) -> Result<DailyMetrics, RecorderError> {
        let mut range = self.range_metrics(date, date).await?;
        Ok(range.pop().unwrap_or_else(|| empty_day(date)))
    }

    /// One entry per day in `from..=to`, days without activity included.
    pub async fn range_metrics(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailyMetrics>, RecorderError> {
        let cycles = self.learning.cycles().await?;
        let records = self.validation.records().await?;
        Ok(from
            .iter_days()
            .take_while(|d| *d <= to)
            .map(|date| day_metrics(date, &cycles, &records))
            .collect())
    }

    pub async fn summary(&self) -> Result<Summary, RecorderError> {
        let cycles = self.learning.cycles().await?;
        let records = self.validation.records().await?;
        let mut sources: Vec<&str> = cycles.iter().map(|c| c.body.source.as_str()).collect();
        sources.sort_unstable();
        sources.dedup();
        let fallbacks = records.iter().filter(|r| r.body.fallback_fired).count();
        Ok(Summary {
            cycles: cycles.len(),
            chunks_added: cycles.iter().map(|c| c.body.chunks_added).sum(),
            sources: sources.len(),
            requests: records.len(),
            fallback_rate: if records.is_empty() { 0.0 } else { fallbacks as f32 / records.len() as f32 },
            average_confidence: average(records.iter().map(|r| r.body.confidence)),
        })
    }

    pub async fn validator_pass_rates(&self) -> Result<Vec<PassRate>, RecorderError> {
        let mut counts: BTreeMap<String, (usize, usize)> = BTreeMap::new();
        for entry in self.validation.records().await? {
            for outcome in &entry.body.outcomes {
                let slot = counts.entry(outcome.validator.clone()).or_default();
                slot.0 += 1;
                if outcome.passed {
                    slot.1 += 1;
                }
            }
        }
        Ok(counts
            .into_iter()
            .map(|(validator, (runs, passes))| PassRate { validator, runs, passes, rate: passes as f32 / runs as f32 })
            .collect())
    }

    /// Failed outcome counts keyed by reason code.
    pub async fn failure_reason_histogram(&self) -> Result<BTreeMap<String, usize>, RecorderError> {
        let mut histogram = BTreeMap::new();
        for entry in self.validation.records().await? {
            for outcome in entry.body.outcomes.iter().filter(|o| !o.passed) {
                *histogram.entry(outcome.reason.clone()).or_insert(0) += 1;
            }
        }
        Ok(histogram)
    }

    pub async fn suggestions(&self, window_days: u32) -> Result<Vec<LearningSuggestion>, RecorderError> {
        let records = self.validation.records().await?;
        let report = analyze_patterns(&records, window_days, Utc::now());
        Ok(suggest_learning(&report, self.config))
    }

    pub async fn verify(&self) -> Result<LogsReport, RecorderError> {
        Ok(LogsReport { validation: self.validation.verify().await?, learning: self.learning.verify().await? })
    }
}

fn day_metrics(date: NaiveDate, cycles: &[Entry<LearningCycle>], records: &[Entry<ValidationRecord>]) -> DailyMetrics {
    let day_cycles: Vec<_> = cycles.iter().filter(|c| c.timestamp.date_naive() == date).collect();
    let day_records: Vec<_> = records.iter().filter(|r| r.timestamp.date_naive() == date).collect();
    DailyMetrics {
        date,
        cycles: day_cycles.len(),
        chunks_added: day_cycles.iter().map(|c| c.body.chunks_added).sum(),
        requests: day_records.len(),
        fallbacks: day_records.iter().filter(|r| r.body.fallback_fired).count(),
        average_confidence: average(day_records.iter().map(|r| r.body.confidence)),
    }
}

fn empty_day(date: NaiveDate) -> DailyMetrics {
    DailyMetrics { date, cycles: 0, chunks_added: 0, requests: 0, fallbacks: 0, average_confidence: None }
}

fn average(values: impl Iterator<Item = f32>) -> Option<f32> {
    let (sum, n) = values.fold((0.0f32, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| (sum / n as f32 * 1000.0).round() / 1000.0)
}
