#![cfg(feature = "lance")]

use groundcheck_core::config::StoreConfig;
use groundcheck_core::data_processor::DataProcessor;
use groundcheck_core::types::Collection;
use groundcheck_core::{ChunkStore, Embedder};
use groundcheck_embed::HashingEmbedder;
use groundcheck_vector::{LanceChunkStore, LanceChunkWriter};
use tempfile::TempDir;

#[tokio::test]
async fn lancedb_write_then_search() {
    let docs = TempDir::new().expect("docs");
    std::fs::write(
        docs.path().join("fire.txt"),
        "Build a fire with dry tinder and small kindling.\n\nKeep water nearby.",
    )
    .unwrap();
    std::fs::write(docs.path().join("garden.txt"), "Tomatoes need full sun and steady watering.").unwrap();
    let chunks = DataProcessor::new().process_directory(docs.path(), None).expect("process");
    assert_eq!(chunks.len(), 3);

    let db = TempDir::new().expect("db");
    let config = StoreConfig { uri: db.path().to_string_lossy().to_string(), ..StoreConfig::default() };
    let embedder = HashingEmbedder::new(64);
    let writer = LanceChunkWriter::open(&config.uri, &config.knowledge_table, 64).await.expect("writer");
    let written = writer.index_chunks(&chunks, Collection::Knowledge, &embedder).await.expect("index");
    assert_eq!(written, 3);

    let store = LanceChunkStore::open(&config).await.expect("store");
    let q = embedder.embed("how to build a fire with tinder").unwrap();
    let hits = store.search(Collection::Knowledge, &q, 3).await.expect("search");
    assert!(!hits.is_empty());
    assert_eq!(hits[0].chunk.id, "fire:0");
    assert_eq!(hits[0].chunk.embedding.dim(), 64);
    assert!(hits[0].chunk.source.timestamp.is_some());
    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }

    // conversation table was never created
    let none = store.search(Collection::Conversation, &q, 3).await.expect("search");
    assert!(none.is_empty());
}
