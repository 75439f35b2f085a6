use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use groundcheck_core::config::RecorderConfig;
use groundcheck_core::RecorderError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// `prev_hash` of the first entry.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

const HASH_FIELD: &str = "hash";

/// One line of an append-only log: chain metadata around a flattened body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entry<T> {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub prev_hash: String,
    pub hash: String,
    #[serde(flatten)]
    pub body: T,
}

#[derive(Debug, Clone, Copy)]
pub struct AppendOptions {
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub fsync: bool,
}

impl Default for AppendOptions {
    fn default() -> Self {
        Self { max_retries: 3, retry_backoff: Duration::from_millis(50), fsync: false }
    }
}

impl From<&RecorderConfig> for AppendOptions {
    fn from(config: &RecorderConfig) -> Self {
        Self { max_retries: config.max_retries, retry_backoff: config.retry_backoff(), fsync: config.fsync }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct VerifyReport {
    pub entries: usize,
    /// Lines that were not valid entries, e.g. torn writes.
    pub skipped: usize,
    pub last_hash: String,
}

#[derive(Debug)]
struct Tail {
    next_seq: u64,
    last_hash: String,
    /// The file may end in a partial line that must be closed before appending.
    needs_fence: bool,
}

/// Append-only JSONL file with a blake3 hash chain.
///
/// Appends are serialized by an async mutex. Readers never take the lock;
/// they read up to the file length captured when they start.
#[derive(Debug)]
pub struct AppendLog<T> {
    path: PathBuf,
    options: AppendOptions,
    tail: Mutex<Tail>,
    _body: PhantomData<fn() -> T>,
}

impl<T> AppendLog<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Opens or creates the log, recovering `seq` and the last hash from its tail.
    pub async fn open(path: impl Into<PathBuf>, options: AppendOptions) -> Result<Self, RecorderError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| io_err(&path, e))?;
        }
        let bytes = read_prefix(&path, None).await?;
        let needs_fence = bytes.last().is_some_and(|b| *b != b'\n');
        let last = bytes
            .split(|b| *b == b'\n')
            .rev()
            .find_map(|line| serde_json::from_slice::<Value>(line).ok().and_then(|v| chain_fields(&v)));
        let (next_seq, last_hash) = match last {
            Some((seq, hash)) => (seq + 1, hash),
            None => (0, GENESIS_HASH.to_string()),
        };
        info!(path = %path.display(), next_seq, needs_fence, "opened append log");
        Ok(Self {
            path,
            options,
            tail: Mutex::new(Tail { next_seq, last_hash, needs_fence }),
            _body: PhantomData,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one entry and returns it. Never rewrites existing bytes.
    pub async fn append(&self, body: T) -> Result<Entry<T>, RecorderError> {
        let mut tail = self.tail.lock().await;
        let mut entry = Entry {
            seq: tail.next_seq,
            timestamp: Utc::now(),
            prev_hash: tail.last_hash.clone(),
            hash: String::new(),
            body,
        };
        // the line is written from the same value that was hashed so floats
        // round-trip to identical text
        let mut value = serde_json::to_value(&entry)?;
        entry.hash = chain_hash(&mut value);
        if let Some(map) = value.as_object_mut() {
            map.insert(HASH_FIELD.to_string(), Value::String(entry.hash.clone()));
        }
        let line = value.to_string();

        let attempts = self.options.max_retries + 1;
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            match self.write_line(&line, tail.needs_fence).await {
                Ok(()) => {
                    tail.needs_fence = false;
                    tail.next_seq += 1;
                    tail.last_hash = entry.hash.clone();
                    debug!(path = %self.path.display(), seq = entry.seq, attempt, "appended entry");
                    return Ok(entry);
                }
                Err(err) => {
                    // a partial write may have landed; close it off next time
                    tail.needs_fence = true;
                    warn!(path = %self.path.display(), attempt, error = %err, "append failed");
                    last_error = err.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(self.options.retry_backoff * attempt).await;
                    }
                }
            }
        }
        Err(RecorderError::Exhausted { attempts, last: last_error })
    }

    async fn write_line(&self, line: &str, fence: bool) -> Result<(), RecorderError> {
        let mut buf = String::with_capacity(line.len() + 2);
        if fence {
            buf.push('\n');
        }
        buf.push_str(line);
        buf.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| io_err(&self.path, e))?;
        file.write_all(buf.as_bytes()).await.map_err(|e| io_err(&self.path, e))?;
        file.flush().await.map_err(|e| io_err(&self.path, e))?;
        if self.options.fsync {
            file.sync_data().await.map_err(|e| io_err(&self.path, e))?;
        }
        Ok(())
    }

    /// Every readable entry up to the current length. Unparseable lines are skipped.
    pub async fn snapshot(&self) -> Result<Vec<Entry<T>>, RecorderError> {
        let len = captured_len(&self.path).await?;
        let bytes = read_prefix(&self.path, Some(len)).await?;
        let mut entries = Vec::new();
        let mut skipped = 0usize;
        for line in bytes.split(|b| *b == b'\n').filter(|l| !l.is_empty()) {
            match serde_json::from_slice::<Entry<T>>(line) {
                Ok(entry) => entries.push(entry),
                Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!(path = %self.path.display(), skipped, "skipped unreadable log lines");
        }
        Ok(entries)
    }

    /// Recomputes the hash chain. Torn lines are skipped; a well-formed
    /// entry that does not continue the chain is an error.
    pub async fn verify(&self) -> Result<VerifyReport, RecorderError> {
        let len = captured_len(&self.path).await?;
        let bytes = read_prefix(&self.path, Some(len)).await?;
        let mut report = VerifyReport { entries: 0, skipped: 0, last_hash: GENESIS_HASH.to_string() };
        let mut expected_seq = 0u64;
        for line in bytes.split(|b| *b == b'\n').filter(|l| !l.is_empty()) {
            let Ok(mut value) = serde_json::from_slice::<Value>(line) else {
                report.skipped += 1;
                continue;
            };
            let Some((seq, stored)) = chain_fields(&value) else {
                report.skipped += 1;
                continue;
            };
            let prev = value.get("prev_hash").and_then(Value::as_str).unwrap_or_default().to_string();
            if seq != expected_seq || prev != report.last_hash || chain_hash(&mut value) != stored {
                warn!(path = %self.path.display(), seq, "hash chain broken");
                return Err(RecorderError::ChainBroken { seq });
            }
            report.entries += 1;
            report.last_hash = stored;
            expected_seq += 1;
        }
        Ok(report)
    }
}

/// blake3 over the canonical (key-sorted) JSON of the entry without its hash.
fn chain_hash(value: &mut Value) -> String {
    if let Some(map) = value.as_object_mut() {
        map.remove(HASH_FIELD);
    }
    blake3::hash(value.to_string().as_bytes()).to_hex().to_string()
}

fn chain_fields(value: &Value) -> Option<(u64, String)> {
    let seq = value.get("seq")?.as_u64()?;
    let hash = value.get(HASH_FIELD)?.as_str()?.to_string();
    Some((seq, hash))
}

async fn captured_len(path: &Path) -> Result<u64, RecorderError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
        Err(e) => Err(io_err(path, e)),
    }
}

async fn read_prefix(path: &Path, limit: Option<u64>) -> Result<Vec<u8>, RecorderError> {
    let file = match tokio::fs::File::open(path).await {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_err(path, e)),
    };
    let mut bytes = Vec::new();
    match limit {
        Some(len) => file.take(len).read_to_end(&mut bytes).await,
        None => {
            let mut file = file;
            file.read_to_end(&mut bytes).await
        }
    }
    .map_err(|e| io_err(path, e))?;
    Ok(bytes)
}

fn io_err(path: &Path, source: std::io::Error) -> RecorderError {
    RecorderError::Io { path: path.display().to_string(), source }
}
