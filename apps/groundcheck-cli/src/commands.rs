use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use groundcheck_core::types::Collection;
use groundcheck_core::{ChunkStore, Settings};
use groundcheck_pipeline::GroundingPipeline;
use groundcheck_record::{analyze_patterns, suggest_learning, Introspection, LearningLog, ValidationRecorder};
use serde::Serialize;
use tracing::info;

pub struct App {
    pub settings: Settings,
    pub home: PathBuf,
}

impl App {
    pub async fn check(&self, query: &str, draft: String, show_context: bool) -> Result<()> {
        let embedder = groundcheck_embed::default_embedder(&self.settings.embedding)?;
        let store = self.open_store().await?;
        let pipeline = GroundingPipeline::from_settings(&self.settings, &self.home, embedder, store).await?;

        let retrieval = pipeline.retrieve(query).await;
        let context = show_context.then(|| {
            retrieval
                .chunks
                .iter()
                .enumerate()
                .map(|(i, hit)| {
                    serde_json::json!({
                        "marker": i + 1,
                        "id": hit.chunk.id,
                        "collection": hit.chunk.collection,
                        "score": hit.score,
                        "text": hit.chunk.text,
                    })
                })
                .collect::<Vec<_>>()
        });
        let answer = pipeline.validate(retrieval, draft).await;
        match context {
            Some(context) => print_json(&serde_json::json!({ "answer": answer, "context": context })),
            None => print_json(&answer),
        }
    }

    #[cfg(feature = "lance")]
    pub async fn ingest(
        &self,
        dir: &Path,
        collection: Collection,
        source: Option<String>,
        limit: Option<usize>,
    ) -> Result<()> {
        use groundcheck_core::data_processor::DataProcessor;
        use groundcheck_core::types::LearningCycle;
        use groundcheck_vector::LanceChunkWriter;

        let chunks = DataProcessor::new().process_directory(dir, limit)?;
        let source = source.unwrap_or_else(|| {
            dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| dir.display().to_string())
        });
        if chunks.is_empty() {
            info!(dir = %dir.display(), "nothing to ingest");
        }

        let embedder = groundcheck_embed::default_embedder(&self.settings.embedding)?;
        let table = match collection {
            Collection::Knowledge => &self.settings.store.knowledge_table,
            Collection::Conversation => &self.settings.store.conversation_table,
        };
        let uri = self.store_uri();
        let writer = LanceChunkWriter::open(&uri, table, embedder.dim()).await?.with_progress(true);
        let chunks_added = writer.index_chunks(&chunks, collection, embedder.as_ref()).await?;

        let mut documents: Vec<&str> = chunks.iter().map(|c| c.doc_id.as_str()).collect();
        documents.sort_unstable();
        documents.dedup();
        let cycle = LearningCycle { source, collection, documents: documents.len(), chunks_added };
        self.learning_log().await?.record(cycle.clone()).await?;
        print_json(&cycle)
    }

    #[cfg(not(feature = "lance"))]
    pub async fn ingest(&self, _dir: &Path, _c: Collection, _s: Option<String>, _l: Option<usize>) -> Result<()> {
        anyhow::bail!("ingest needs the LanceDB store; rebuild with --features lance")
    }

    pub async fn analyze(&self, window_days: Option<u32>) -> Result<()> {
        let records = self.recorder().await?.records().await?;
        let window = window_days.unwrap_or(self.settings.learning.window_days);
        print_json(&analyze_patterns(&records, window, Utc::now()))
    }

    pub async fn suggest(&self, window_days: Option<u32>) -> Result<()> {
        let records = self.recorder().await?.records().await?;
        let window = window_days.unwrap_or(self.settings.learning.window_days);
        let report = analyze_patterns(&records, window, Utc::now());
        print_json(&suggest_learning(&report, &self.settings.learning))
    }

    pub async fn summary(&self) -> Result<()> {
        let (recorder, learning) = self.logs().await?;
        print_json(&self.introspect(&recorder, &learning).summary().await?)
    }

    pub async fn daily(&self, date: Option<NaiveDate>) -> Result<()> {
        let (recorder, learning) = self.logs().await?;
        let date = date.unwrap_or_else(|| Utc::now().date_naive());
        print_json(&self.introspect(&recorder, &learning).daily_metrics(date).await?)
    }

    pub async fn range(&self, from: NaiveDate, to: NaiveDate) -> Result<()> {
        anyhow::ensure!(from <= to, "--from {from} is after --to {to}");
        let (recorder, learning) = self.logs().await?;
        print_json(&self.introspect(&recorder, &learning).range_metrics(from, to).await?)
    }

    pub async fn validators(&self) -> Result<()> {
        let (recorder, learning) = self.logs().await?;
        print_json(&self.introspect(&recorder, &learning).validator_pass_rates().await?)
    }

    pub async fn reasons(&self) -> Result<()> {
        let (recorder, learning) = self.logs().await?;
        print_json(&self.introspect(&recorder, &learning).failure_reason_histogram().await?)
    }

    pub async fn sources(&self) -> Result<()> {
        let (recorder, learning) = self.logs().await?;
        print_json(&self.introspect(&recorder, &learning).learning_sources().await?)
    }

    pub async fn verify(&self) -> Result<()> {
        let (recorder, learning) = self.logs().await?;
        let report = self.introspect(&recorder, &learning).verify().await.context("log verification failed")?;
        print_json(&report)
    }

    fn introspect<'a>(&'a self, recorder: &'a ValidationRecorder, learning: &'a LearningLog) -> Introspection<'a> {
        Introspection::new(recorder, learning, &self.settings.learning)
    }

    async fn recorder(&self) -> Result<ValidationRecorder> {
        Ok(ValidationRecorder::from_config(&self.settings.recorder, &self.home).await?)
    }

    async fn learning_log(&self) -> Result<LearningLog> {
        Ok(LearningLog::from_config(&self.settings.recorder, &self.home).await?)
    }

    async fn logs(&self) -> Result<(ValidationRecorder, LearningLog)> {
        Ok((self.recorder().await?, self.learning_log().await?))
    }

    #[cfg_attr(not(feature = "lance"), allow(dead_code))]
    fn store_uri(&self) -> String {
        groundcheck_core::config::resolve_with_base(&self.home, &self.settings.store.uri).to_string_lossy().to_string()
    }

    #[cfg(feature = "lance")]
    async fn open_store(&self) -> Result<Arc<dyn ChunkStore>> {
        let mut config = self.settings.store.clone();
        config.uri = self.store_uri();
        let store = groundcheck_vector::LanceChunkStore::open(&config)
            .await
            .with_context(|| format!("opening chunk store at {}", config.uri))?;
        Ok(Arc::new(store))
    }

    #[cfg(not(feature = "lance"))]
    async fn open_store(&self) -> Result<Arc<dyn ChunkStore>> {
        tracing::warn!("built without the lance feature; checking against an empty in-memory store");
        Ok(Arc::new(groundcheck_vector::InMemoryChunkStore::new()))
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
