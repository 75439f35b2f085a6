use anyhow::Result;
use arrow_array::{Array, RecordBatch};
use async_trait::async_trait;
use chrono::DateTime;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType};
use tracing::debug;

use groundcheck_core::config::StoreConfig;
use groundcheck_core::types::{Collection, DocumentChunk, EmbeddingVector, ScoredChunk, SourceMeta};
use groundcheck_core::ChunkStore;

use crate::table::{f32_column, open_db, string_column, table_exists, timestamp_column, vector_at};

/// Cosine kNN over one LanceDB table per collection.
pub struct LanceChunkStore {
    db: Connection,
    knowledge_table: String,
    conversation_table: String,
}

impl LanceChunkStore {
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        let db = open_db(&config.uri).await?;
        Ok(Self {
            db,
            knowledge_table: config.knowledge_table.clone(),
            conversation_table: config.conversation_table.clone(),
        })
    }

    pub fn table_for(&self, collection: Collection) -> &str {
        match collection {
            Collection::Knowledge => &self.knowledge_table,
            Collection::Conversation => &self.conversation_table,
        }
    }
}

#[async_trait]
impl ChunkStore for LanceChunkStore {
    async fn search(
        &self,
        collection: Collection,
        query: &EmbeddingVector,
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let table_name = self.table_for(collection);
        if k == 0 || !table_exists(&self.db, table_name).await? {
            return Ok(Vec::new());
        }
        let table = self.db.open_table(table_name).execute().await?;
        let mut stream = table
            .vector_search(query.as_slice().to_vec())?
            .distance_type(DistanceType::Cosine)
            .limit(k)
            .execute()
            .await?;

        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            hits.extend(hits_from_batch(&batch, collection)?);
        }
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.chunk.id.cmp(&b.chunk.id)));
        debug!(%collection, k, hits = hits.len(), "lance search");
        Ok(hits)
    }
}

/// Rows of one search batch as scored chunks. The `_distance` column is
/// required; without it no hit can be ranked.
pub(crate) fn hits_from_batch(batch: &RecordBatch, collection: Collection) -> Result<Vec<ScoredChunk>> {
    let ids = string_column(batch, "id")?;
    let texts = string_column(batch, "text")?;
    let origins = string_column(batch, "origin")?;
    let distances = f32_column(batch, "_distance")?;
    let ingested = timestamp_column(batch, "ingested_at");
    let mut hits = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        // cosine distance is 1 - similarity
        let score = 1.0 - distances.value(i);
        let timestamp = ingested
            .filter(|c| !c.is_null(i))
            .and_then(|c| DateTime::from_timestamp_millis(c.value(i)));
        let chunk = DocumentChunk {
            id: ids.value(i).to_string(),
            text: texts.value(i).to_string(),
            embedding: EmbeddingVector::from(vector_at(batch, i)?),
            collection,
            source: SourceMeta { origin: origins.value(i).to_string(), timestamp, ..SourceMeta::default() },
        };
        hits.push(ScoredChunk { chunk, score });
    }
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow_array::types::Float32Type;
    use arrow_array::{ArrayRef, FixedSizeListArray, Float32Array, StringArray, TimestampMillisecondArray};
    use arrow_schema::{DataType, Field, Schema};

    use super::*;
    use crate::schema::build_chunk_schema;

    fn columns() -> Vec<ArrayRef> {
        vec![
            Arc::new(StringArray::from(vec!["doc:0"])),
            Arc::new(StringArray::from(vec!["Paris is the capital of France."])),
            Arc::new(StringArray::from(vec!["atlas.txt"])),
            Arc::new(TimestampMillisecondArray::from(vec![Some(1_700_000_000_000)])),
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
                vec![Some(vec![Some(1.0), Some(0.0)])],
                2,
            )),
        ]
    }

    #[test]
    fn batch_with_distance_scores_by_similarity() {
        let base = build_chunk_schema(2);
        let mut fields: Vec<Field> = base.fields().iter().map(|f| f.as_ref().clone()).collect();
        fields.push(Field::new("_distance", DataType::Float32, true));
        let mut cols = columns();
        cols.push(Arc::new(Float32Array::from(vec![0.25])));
        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), cols).unwrap();

        let hits = hits_from_batch(&batch, Collection::Knowledge).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.id, "doc:0");
        assert!((hits[0].score - 0.75).abs() < 1e-6);
        assert!(hits[0].chunk.source.timestamp.is_some());
    }

    #[test]
    fn batch_without_distance_is_an_error() {
        let batch = RecordBatch::try_new(build_chunk_schema(2), columns()).unwrap();
        let err = hits_from_batch(&batch, Collection::Knowledge).unwrap_err();
        assert!(err.to_string().contains("_distance"), "{err}");
    }
}
