use std::fs;
use std::sync::Arc;

use groundcheck_core::RecorderError;
use groundcheck_record::{AppendLog, AppendOptions};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Note {
    text: String,
    weight: f32,
}

fn note(i: usize) -> Note {
    Note { text: format!("note {i}"), weight: 0.1 * i as f32 }
}

#[tokio::test]
async fn appends_never_rewrite_earlier_bytes() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("logs/notes.jsonl");
    let log = AppendLog::<Note>::open(&path, AppendOptions::default()).await.unwrap();

    let mut previous = Vec::new();
    for i in 0..5 {
        let entry = log.append(note(i)).await.unwrap();
        assert_eq!(entry.seq, i as u64);
        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(&previous), "append {i} changed earlier bytes");
        previous = bytes;
    }

    let entries = log.snapshot().await.unwrap();
    assert_eq!(entries.len(), 5);
    assert_eq!(entries[3].body, note(3));
    assert_eq!(entries[1].prev_hash, entries[0].hash);

    let report = log.verify().await.unwrap();
    assert_eq!(report.entries, 5);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.last_hash, entries[4].hash);
}

#[tokio::test]
async fn reopen_continues_the_chain() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("notes.jsonl");
    {
        let log = AppendLog::<Note>::open(&path, AppendOptions::default()).await.unwrap();
        log.append(note(0)).await.unwrap();
        log.append(note(1)).await.unwrap();
    }
    let log = AppendLog::<Note>::open(&path, AppendOptions::default()).await.unwrap();
    let entry = log.append(note(2)).await.unwrap();
    assert_eq!(entry.seq, 2);
    assert_eq!(log.verify().await.unwrap().entries, 3);
}

#[tokio::test]
async fn rewriting_a_record_breaks_verification() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("notes.jsonl");
    let log = AppendLog::<Note>::open(&path, AppendOptions::default()).await.unwrap();
    for i in 0..3 {
        log.append(note(i)).await.unwrap();
    }

    let content = fs::read_to_string(&path).unwrap();
    fs::write(&path, content.replace("\"note 1\"", "\"note one\"")).unwrap();

    match log.verify().await {
        Err(RecorderError::ChainBroken { seq }) => assert_eq!(seq, 1),
        other => panic!("expected broken chain, got {other:?}"),
    }
}

#[tokio::test]
async fn torn_tail_is_fenced_and_skipped() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("notes.jsonl");
    {
        let log = AppendLog::<Note>::open(&path, AppendOptions::default()).await.unwrap();
        log.append(note(0)).await.unwrap();
    }
    let mut content = fs::read_to_string(&path).unwrap();
    content.push_str("{\"seq\":1,\"timest");
    fs::write(&path, content).unwrap();

    let log = AppendLog::<Note>::open(&path, AppendOptions::default()).await.unwrap();
    let entry = log.append(note(1)).await.unwrap();
    assert_eq!(entry.seq, 1);

    let entries = log.snapshot().await.unwrap();
    assert_eq!(entries.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![0, 1]);
    let report = log.verify().await.unwrap();
    assert_eq!(report.entries, 2);
    assert_eq!(report.skipped, 1);
}

#[tokio::test]
async fn missing_file_reads_as_empty() {
    let tmp = TempDir::new().unwrap();
    let log = AppendLog::<Note>::open(tmp.path().join("absent.jsonl"), AppendOptions::default()).await.unwrap();
    assert!(log.snapshot().await.unwrap().is_empty());
    assert_eq!(log.verify().await.unwrap().entries, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_are_serialized() {
    let tmp = TempDir::new().unwrap();
    let log =
        Arc::new(AppendLog::<Note>::open(tmp.path().join("notes.jsonl"), AppendOptions::default()).await.unwrap());

    let handles: Vec<_> = (0..32)
        .map(|i| {
            let log = Arc::clone(&log);
            tokio::spawn(async move { log.append(note(i)).await.map(|e| e.seq) })
        })
        .collect();
    let mut seqs = Vec::new();
    for handle in handles {
        seqs.push(handle.await.unwrap().unwrap());
    }
    seqs.sort_unstable();
    assert_eq!(seqs, (0..32).collect::<Vec<u64>>());

    let report = log.verify().await.unwrap();
    assert_eq!(report.entries, 32);
}
