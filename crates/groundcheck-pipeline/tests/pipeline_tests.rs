use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use groundcheck_core::config::Settings;
use groundcheck_core::types::{Collection, DocumentChunk, EmbeddingVector, Locale, ScoredChunk};
use groundcheck_core::{ChunkStore, Embedder};
use groundcheck_pipeline::{GroundingPipeline, PipelineError, GENERATION_FAILED};
use groundcheck_record::{AppendOptions, ValidationRecorder};
use groundcheck_vector::InMemoryChunkStore;
use tempfile::TempDir;

struct FixedEmbedder;

impl Embedder for FixedEmbedder {
    fn model_id(&self) -> &str { "fixed" }
    fn dim(&self) -> usize { 2 }
    fn max_len(&self) -> usize { 64 }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }
}

struct BrokenStore;

#[async_trait]
impl ChunkStore for BrokenStore {
    async fn search(&self, _c: Collection, _q: &EmbeddingVector, _k: usize) -> anyhow::Result<Vec<ScoredChunk>> {
        anyhow::bail!("store offline")
    }
}

struct SlowStore;

#[async_trait]
impl ChunkStore for SlowStore {
    async fn search(&self, _c: Collection, _q: &EmbeddingVector, _k: usize) -> anyhow::Result<Vec<ScoredChunk>> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(vec![])
    }
}

/// Unit vector whose cosine with [1, 0] is `score`.
fn at(score: f32) -> Vec<f32> {
    vec![score, (1.0 - score * score).max(0.0).sqrt()]
}

fn chunk(id: &str, text: &str, score: f32, collection: Collection) -> DocumentChunk {
    DocumentChunk::new(id, text, at(score), collection, "test")
}

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.retrieval.retry_backoff_ms = 1;
    settings
}

async fn pipeline(
    tmp: &TempDir,
    store: Arc<dyn ChunkStore>,
    settings: &Settings,
) -> (GroundingPipeline, Arc<ValidationRecorder>) {
    let recorder = Arc::new(
        ValidationRecorder::open(tmp.path().join("validation.jsonl"), AppendOptions::default()).await.unwrap(),
    );
    let pipeline = GroundingPipeline::new(
        settings,
        Arc::new(FixedEmbedder),
        store,
        Arc::new(groundcheck_validate::RuleBookHandle::new(groundcheck_validate::RuleBook::empty())),
    )
    .unwrap()
    .with_recorder(Arc::clone(&recorder));
    (pipeline, recorder)
}

#[tokio::test]
async fn no_matches_fall_back_and_are_recorded() {
    let tmp = TempDir::new().unwrap();
    let (p, recorder) = pipeline(&tmp, Arc::new(InMemoryChunkStore::new()), &settings()).await;

    let answer = p.handle("Who won the 1987 regional chess final?", "Anna Petrova won it.").await;
    assert!(answer.fallback_fired);
    assert!(answer.confidence.value <= 0.2);
    assert!(answer.text.starts_with("I don't have reliable information"));

    let records = recorder.records().await.unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0].body;
    assert!(record.no_reliable_context);
    assert!(record.fallback_fired);
    assert_eq!(record.request_id, answer.request_id);
}

#[tokio::test]
async fn uncited_draft_over_good_context_falls_back() {
    let tmp = TempDir::new().unwrap();
    let store = InMemoryChunkStore::from_chunks(vec![
        chunk("k1", "Solar panels convert sunlight into electricity.", 0.9, Collection::Knowledge),
        chunk("k2", "Photovoltaic cells are made of silicon.", 0.8, Collection::Knowledge),
        chunk("k3", "Inverters turn direct current into alternating current.", 0.7, Collection::Knowledge),
    ]);
    let (p, _) = pipeline(&tmp, Arc::new(store), &settings()).await;

    let retrieval = p.retrieve("How do solar panels turn sunlight into power for a small off grid cabin?").await;
    assert!(retrieval.len() >= 2);
    let answer = p.validate(retrieval, "Solar panels convert sunlight into electricity with silicon cells.").await;
    assert!(answer.fallback_fired);
    assert_eq!(answer.fallback_reason.as_deref(), Some("missing_citations"));
}

#[tokio::test]
async fn single_conversation_chunk_scores_in_single_source_band() {
    let tmp = TempDir::new().unwrap();
    let store = InMemoryChunkStore::from_chunks(vec![chunk(
        "c1",
        "The well pump runs on 24 volts.",
        0.55,
        Collection::Conversation,
    )]);
    let (p, _) = pipeline(&tmp, Arc::new(store), &settings()).await;

    let answer = p.handle("What voltage does the well pump use?", "The well pump runs on 24 volts [1].").await;
    assert!(!answer.fallback_fired, "{answer:?}");
    assert!(answer.confidence.value >= 0.5 && answer.confidence.value <= 0.6, "{}", answer.confidence.value);
    assert_eq!(answer.text, "The well pump runs on 24 volts [1].");
}

#[tokio::test]
async fn two_strong_sources_score_high() {
    let tmp = TempDir::new().unwrap();
    let store = InMemoryChunkStore::from_chunks(vec![
        chunk("k1", "Paris is the capital of France.", 0.9, Collection::Knowledge),
        chunk("k2", "France's capital Paris lies on the Seine.", 0.7, Collection::Knowledge),
    ]);
    let (p, _) = pipeline(&tmp, Arc::new(store), &settings()).await;

    let answer =
        p.handle("What is the capital of France?", "Paris is the capital of France [1], on the Seine [2].").await;
    assert!(!answer.fallback_fired, "{answer:?}");
    assert!(answer.confidence.value >= 0.8);
}

#[tokio::test]
async fn every_request_is_recorded_once() {
    let tmp = TempDir::new().unwrap();
    let paris = chunk("k1", "Paris is the capital of France.", 0.9, Collection::Knowledge);
    let store = InMemoryChunkStore::from_chunks(vec![paris]);
    let (p, recorder) = pipeline(&tmp, Arc::new(store), &settings()).await;

    for i in 0..5 {
        p.handle(&format!("What is the capital of France, take {i}?"), "Paris is the capital of France [1].").await;
    }
    assert_eq!(recorder.records().await.unwrap().len(), 5);
    assert_eq!(recorder.verify().await.unwrap().entries, 5);
}

#[tokio::test]
async fn failed_generation_falls_back() {
    let tmp = TempDir::new().unwrap();
    let paris = chunk("k1", "Paris is the capital of France.", 0.9, Collection::Knowledge);
    let store = InMemoryChunkStore::from_chunks(vec![paris]);
    let (p, recorder) = pipeline(&tmp, Arc::new(store), &settings()).await;

    let answer = p
        .handle_with("What is the capital of France?", |_retrieval| async {
            Err::<String, _>(anyhow::anyhow!("provider unavailable"))
        })
        .await
        .unwrap();
    assert!(answer.fallback_fired);
    assert_eq!(answer.fallback_reason.as_deref(), Some(GENERATION_FAILED));
    assert_eq!(recorder.records().await.unwrap().len(), 1);

    let answer = p
        .handle_with("What is the capital of France?", |retrieval| async move {
            Ok::<_, anyhow::Error>(format!("Paris is the capital of France [{}].", retrieval.len()))
        })
        .await
        .unwrap();
    assert!(!answer.fallback_fired, "{answer:?}");
}

#[tokio::test]
async fn failed_generation_keeps_language_first_and_answers_in_query_locale() {
    let tmp = TempDir::new().unwrap();
    let store = InMemoryChunkStore::from_chunks(vec![chunk(
        "k1",
        "París es la capital de Francia.",
        0.9,
        Collection::Knowledge,
    )]);
    let (p, recorder) = pipeline(&tmp, Arc::new(store), &settings()).await;

    let answer = p
        .handle_with("¿Cuál es la capital de Francia y por qué es tan importante?", |_retrieval| async {
            Err::<String, _>(anyhow::anyhow!("provider unavailable"))
        })
        .await
        .unwrap();
    assert!(answer.fallback_fired);
    assert_eq!(answer.fallback_reason.as_deref(), Some(GENERATION_FAILED));
    assert_eq!(answer.locale, Locale::Es);
    assert!(answer.text.starts_with("No tengo información fiable"), "{}", answer.text);

    let records = recorder.records().await.unwrap();
    let names: Vec<&str> = records[0].body.outcomes.iter().map(|o| o.validator.as_str()).collect();
    assert_eq!(names, vec!["language", "generation"]);
}

#[tokio::test]
async fn failed_generation_after_degraded_retrieval_is_exhausted() {
    let tmp = TempDir::new().unwrap();
    let (p, recorder) = pipeline(&tmp, Arc::new(BrokenStore), &settings()).await;

    let result = p
        .handle_with("What is the capital of France?", |retrieval| async move {
            assert!(retrieval.degraded);
            Err::<String, _>(anyhow::anyhow!("provider unavailable"))
        })
        .await;
    assert!(matches!(result, Err(PipelineError::Exhausted { .. })));
    assert_eq!(recorder.records().await.unwrap().len(), 1);
}

#[tokio::test]
async fn request_deadline_resolves_to_fallback() {
    let tmp = TempDir::new().unwrap();
    let mut settings = settings();
    settings.pipeline.request_deadline_ms = 50;
    let (p, recorder) = pipeline(&tmp, Arc::new(SlowStore), &settings).await;

    let answer = p.handle("What is the capital of France?", "Paris [1].").await;
    assert!(answer.fallback_fired);
    let records = recorder.records().await.unwrap();
    assert!(records[0].body.degraded);
}

#[tokio::test]
async fn from_settings_opens_the_configured_log() {
    let tmp = TempDir::new().unwrap();
    let p = GroundingPipeline::from_settings(
        &settings(),
        tmp.path(),
        Arc::new(FixedEmbedder),
        Arc::new(InMemoryChunkStore::new()),
    )
    .await
    .unwrap();
    p.handle("Who are you?", "I don't know.").await;
    assert!(tmp.path().join("data/validation_log.jsonl").exists());
    assert!(p.rules().current().is_empty());
}
