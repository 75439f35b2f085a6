//! Chunk ingestion into LanceDB tables.
use anyhow::{anyhow, Result};
use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::Connection;
use std::sync::Arc;
use tracing::info;

use groundcheck_core::data_processor::TextChunk;
use groundcheck_core::types::{Collection, DocumentChunk};
use groundcheck_core::Embedder;

use crate::schema::build_chunk_schema;
use crate::table::{open_db, table_exists};

const WRITE_BATCH: usize = 1000;
const EMBED_BATCH: usize = 32;

pub struct LanceChunkWriter {
    db: Connection,
    table_name: String,
    dim: usize,
    progress: bool,
}

impl LanceChunkWriter {
    pub async fn open(uri: &str, table_name: &str, dim: usize) -> Result<Self> {
        let db = open_db(uri).await?;
        Ok(Self { db, table_name: table_name.to_string(), dim, progress: false })
    }

    /// Draw an indicatif bar on stderr while writing.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Embeds text chunks and writes them to `collection`. Returns rows written.
    pub async fn index_chunks(
        &self,
        chunks: &[TextChunk],
        collection: Collection,
        embedder: &dyn Embedder,
    ) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        if embedder.dim() != self.dim {
            return Err(anyhow!(
                "embedder '{}' has dim {}, table expects {}",
                embedder.model_id(),
                embedder.dim(),
                self.dim
            ));
        }
        let bar = self.progress_bar(chunks.len())?;
        let mut docs = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = embedder.embed_batch(&texts)?;
            for (chunk, vector) in batch.iter().zip(vectors) {
                docs.push(DocumentChunk::new(
                    chunk.id.clone(),
                    chunk.text.clone(),
                    vector,
                    collection,
                    chunk.origin.clone(),
                ));
            }
            bar.inc(batch.len() as u64);
        }
        bar.finish_and_clear();
        self.write(&docs).await
    }

    /// Appends already-embedded chunks.
    pub async fn write(&self, chunks: &[DocumentChunk]) -> Result<usize> {
        for batch in chunks.chunks(WRITE_BATCH) {
            self.insert_batch(batch).await?;
        }
        info!(table = %self.table_name, rows = chunks.len(), "wrote chunks");
        Ok(chunks.len())
    }

    async fn insert_batch(&self, docs: &[DocumentChunk]) -> Result<()> {
        if docs.is_empty() {
            return Ok(());
        }
        let record_batch = self.to_record_batch(docs)?;
        let schema = record_batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
        if table_exists(&self.db, &self.table_name).await? {
            self.db.open_table(&self.table_name).execute().await?.add(reader).execute().await?;
        } else {
            self.db.create_table(&self.table_name, reader).execute().await?;
        }
        Ok(())
    }

    fn to_record_batch(&self, docs: &[DocumentChunk]) -> Result<RecordBatch> {
        let dim = i32::try_from(self.dim)?;
        if let Some(bad) = docs.iter().find(|d| d.embedding.dim() != self.dim) {
            return Err(anyhow!("chunk '{}' has dim {}, expected {}", bad.id, bad.embedding.dim(), self.dim));
        }
        let now = Utc::now().timestamp_millis();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        let texts: Vec<&str> = docs.iter().map(|d| d.text.as_str()).collect();
        let origins: Vec<&str> = docs.iter().map(|d| d.source.origin.as_str()).collect();
        let stamps: Vec<Option<i64>> =
            docs.iter().map(|d| Some(d.source.timestamp.map_or(now, |t| t.timestamp_millis()))).collect();
        let vectors = docs.iter().map(|d| Some(d.embedding.as_slice().iter().map(|&x| Some(x)).collect::<Vec<_>>()));
        let record_batch = RecordBatch::try_new(
            build_chunk_schema(dim),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(texts)),
                Arc::new(StringArray::from(origins)),
                Arc::new(TimestampMillisecondArray::from(stamps)),
                Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dim)),
            ],
        )?;
        Ok(record_batch)
    }

    fn progress_bar(&self, len: usize) -> Result<ProgressBar> {
        if !self.progress {
            return Ok(ProgressBar::hidden());
        }
        let pb = ProgressBar::new(len as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%)")?
                .progress_chars("#>-"),
        );
        Ok(pb)
    }
}
