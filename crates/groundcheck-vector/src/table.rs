//! LanceDB connection and table helpers.
use anyhow::{anyhow, Result};
use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, StringArray, TimestampMillisecondArray};
use arrow_array::cast::AsArray;
use arrow_array::types::Float32Type;
use lancedb::{connect, Connection};

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

pub(crate) fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("column '{}' missing or not utf8", name))
}

pub(crate) fn f32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float32Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
        .ok_or_else(|| anyhow!("column '{}' missing or not f32", name))
}

pub(crate) fn timestamp_column<'a>(
    batch: &'a RecordBatch,
    name: &str,
) -> Option<&'a TimestampMillisecondArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<TimestampMillisecondArray>())
}

pub(crate) fn vector_at(batch: &RecordBatch, row: usize) -> Result<Vec<f32>> {
    let list = batch
        .column_by_name("vector")
        .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
        .ok_or_else(|| anyhow!("column 'vector' missing or not a fixed-size list"))?;
    if list.is_null(row) {
        return Err(anyhow!("row {} has no vector", row));
    }
    let value = list.value(row);
    Ok(value.as_primitive::<Float32Type>().values().to_vec())
}
