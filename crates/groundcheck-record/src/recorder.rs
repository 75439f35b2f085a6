use std::path::Path;

use groundcheck_core::config::{resolve_with_base, RecorderConfig};
use groundcheck_core::types::{LearningCycle, ValidationRecord};
use groundcheck_core::RecorderError;
use tracing::info;

use crate::log::{AppendLog, AppendOptions, Entry, VerifyReport};

/// Durable history of every validated request.
#[derive(Debug)]
pub struct ValidationRecorder {
    log: AppendLog<ValidationRecord>,
}

impl ValidationRecorder {
    pub async fn open(path: impl AsRef<Path>, options: AppendOptions) -> Result<Self, RecorderError> {
        Ok(Self { log: AppendLog::open(path.as_ref(), options).await? })
    }

    /// Opens `recorder.validation_log`, relative paths resolved against `base`.
    pub async fn from_config(config: &RecorderConfig, base: &Path) -> Result<Self, RecorderError> {
        Self::open(resolve_with_base(base, &config.validation_log), config.into()).await
    }

    pub async fn record(&self, record: ValidationRecord) -> Result<u64, RecorderError> {
        let request_id = record.request_id;
        let entry = self.log.append(record).await?;
        info!(%request_id, seq = entry.seq, fallback = entry.body.fallback_fired, "recorded validation");
        Ok(entry.seq)
    }

    pub async fn records(&self) -> Result<Vec<Entry<ValidationRecord>>, RecorderError> {
        self.log.snapshot().await
    }

    pub async fn verify(&self) -> Result<VerifyReport, RecorderError> {
        self.log.verify().await
    }

    pub fn path(&self) -> &Path {
        self.log.path()
    }
}

/// Ingestion-side log of learning cycles.
#[derive(Debug)]
pub struct LearningLog {
    log: AppendLog<LearningCycle>,
}

impl LearningLog {
    pub async fn open(path: impl AsRef<Path>, options: AppendOptions) -> Result<Self, RecorderError> {
        Ok(Self { log: AppendLog::open(path.as_ref(), options).await? })
    }

    pub async fn from_config(config: &RecorderConfig, base: &Path) -> Result<Self, RecorderError> {
        Self::open(resolve_with_base(base, &config.learning_log), config.into()).await
    }

    pub async fn record(&self, cycle: LearningCycle) -> Result<u64, RecorderError> {
        let entry = self.log.append(cycle).await?;
        info!(
            source = %entry.body.source,
            collection = %entry.body.collection.as_str(),
            chunks = entry.body.chunks_added,
            seq = entry.seq,
            "recorded learning cycle"
        );
        Ok(entry.seq)
    }

    pub async fn cycles(&self) -> Result<Vec<Entry<LearningCycle>>, RecorderError> {
        self.log.snapshot().await
    }

    pub async fn verify(&self) -> Result<VerifyReport, RecorderError> {
        self.log.verify().await
    }
}
