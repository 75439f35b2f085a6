use std::fs;
use std::io::Write;
use tempfile::TempDir;

use groundcheck_core::config::{expand_path, resolve_with_base, Config, EmbeddingProvider};
use groundcheck_core::data_processor::DataProcessor;
use groundcheck_core::types::{
    Collection, DocumentChunk, Query, QueryCategory, QueryComplexity, RetrievalResult, ScoredChunk,
    Severity, ValidationContext, ValidatorOutcome,
};

#[test]
fn process_directory_single_small_file() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let file_path = dir.join("a.txt");
    let mut f = fs::File::create(&file_path).unwrap();
    writeln!(f, "Short text").unwrap();

    let processor = DataProcessor::new();
    let chunks = processor.process_directory(dir, None).expect("process");

    assert_eq!(chunks.len(), 1, "one small paragraph becomes one chunk");
    assert_eq!(chunks[0].text.trim(), "Short text");
    assert_eq!(chunks[0].id, "a:0");
}

#[test]
fn process_directory_limited_two_files_limit_one() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("a.txt"), "alpha bravo").unwrap();
    fs::write(dir.join("b.txt"), "charlie delta").unwrap();

    let processor = DataProcessor::new();
    let chunks = processor.process_directory(dir, Some(1)).expect("process limited");

    let mut doc_ids = std::collections::HashSet::new();
    for c in &chunks { doc_ids.insert(c.doc_id.clone()); }
    assert_eq!(doc_ids.len(), 1, "limited to one source document");
}

#[test]
fn long_paragraph_splits_with_overlap() {
    let tmp = TempDir::new().unwrap();
    let words: Vec<String> = (0..700).map(|i| format!("w{i}")).collect();
    fs::write(tmp.path().join("long.txt"), words.join(" ")).unwrap();

    let chunks = DataProcessor::new().process_directory(tmp.path(), None).unwrap();
    assert_eq!(chunks.len(), 3);
    assert!(chunks.iter().all(|c| c.total_chunks == 3));
    // 300-word windows overlapping by 60 words
    assert!(chunks[1].text.starts_with("w240 "));
}

#[test]
fn settings_default_and_inline_overrides() {
    let settings = Config::from_toml_str(
        r#"
        [retrieval]
        min_similarity = 0.35
        [retrieval.knowledge_limits]
        long = 6
        [embedding]
        dimension = 128
        "#,
    )
    .settings()
    .expect("settings");

    assert!((settings.retrieval.min_similarity - 0.35).abs() < 1e-6);
    assert_eq!(settings.retrieval.knowledge_limits.short, 2);
    assert_eq!(settings.retrieval.knowledge_limits.long, 6);
    assert!((settings.retrieval.mmr_lambda - 0.7).abs() < 1e-6);
    assert_eq!(settings.embedding.dimension, 128);
    assert_eq!(settings.embedding.provider, EmbeddingProvider::Hashing);
    assert!(settings.validation.is_enabled("citation_relevance"));
}

#[test]
fn settings_reject_out_of_range_threshold() {
    let err = Config::from_toml_str("[retrieval]\nmin_similarity = 1.5\n").settings();
    assert!(err.is_err());
}

#[test]
fn resolve_relative_against_base() {
    let base = std::path::Path::new("/srv/groundcheck");
    assert_eq!(resolve_with_base(base, "data/log.jsonl"), base.join("data/log.jsonl"));
    assert_eq!(resolve_with_base(base, "/var/log.jsonl"), expand_path("/var/log.jsonl"));
}

#[test]
fn query_derives_classes_once() {
    let q = Query::new("What is the capital of France?");
    assert_eq!(q.complexity(), QueryComplexity::Short);
    assert_eq!(q.category(), QueryCategory::Factual);
}

#[test]
fn citations_address_retrieval_order() {
    let q = Query::new("q");
    let chunk = DocumentChunk::new("k1", "text", vec![1.0, 0.0], Collection::Knowledge, "doc");
    let result = RetrievalResult::from_chunks(q, vec![ScoredChunk { chunk, score: 0.9 }]);
    assert!(!result.no_reliable_context);
    assert_eq!(result.cited(1).map(|c| c.chunk.id.as_str()), Some("k1"));
    assert!(result.cited(0).is_none());
    assert!(result.cited(2).is_none());
}

#[test]
fn context_outcomes_append_in_order() {
    let mut ctx = ValidationContext::new(RetrievalResult::no_reliable_context(Query::new("q")), "draft");
    ctx.push_outcome(ValidatorOutcome::pass("language", Severity::NonCritical, "detected"));
    ctx.push_outcome(ValidatorOutcome::fail("identity", Severity::Critical, "identity_violation"));
    assert_eq!(ctx.outcomes()[0].validator, "language");
    assert_eq!(ctx.first_critical_failure().map(|o| o.reason.as_str()), Some("identity_violation"));
    ctx.replace_draft("patched".into());
    assert_eq!(ctx.original_draft(), "draft");
    assert_eq!(ctx.draft(), "patched");
}
