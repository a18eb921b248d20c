//! Per-document chunk indexes
//!
//! Every chunk carries its `document_id`; searches are filtered to one
//! document and ranked by cosine similarity. Re-indexing a document deletes
//! all of its chunks before inserting the new set.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use blograg_cache::similarity::rank_descending_by_cosine;
use futures::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{DistanceType, Table};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::types::{sort_hits, Chunk, ScoredChunk};
use crate::error::{RagError, Result};

/// Vector index partitioned by document
#[async_trait]
pub trait ChunkIndex: Send + Sync {
    /// Replace every chunk of a document; returns the new chunk count
    async fn replace_document(&self, document_id: &str, chunks: Vec<Chunk>) -> Result<usize>;

    /// Top `limit` chunks of a document by similarity to `query`
    async fn search(&self, document_id: &str, query: &[f32], limit: usize) -> Result<Vec<ScoredChunk>>;

    /// Remove a document's chunks; returns how many were removed
    async fn delete_document(&self, document_id: &str) -> Result<usize>;

    /// Number of chunks stored for a document
    async fn count(&self, document_id: &str) -> Result<usize>;
}

/// In-process chunk index
#[derive(Default)]
pub struct MemoryChunkIndex {
    documents: RwLock<HashMap<String, Vec<Chunk>>>,
}

impl MemoryChunkIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChunkIndex for MemoryChunkIndex {
    async fn replace_document(&self, document_id: &str, mut chunks: Vec<Chunk>) -> Result<usize> {
        chunks.sort_by_key(|c| c.index);
        let count = chunks.len();

        let mut documents = self.documents.write().await;
        documents.insert(document_id.to_string(), chunks);

        debug!("Indexed {} chunks for {}", count, document_id);
        Ok(count)
    }

    async fn search(&self, document_id: &str, query: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
        let documents = self.documents.read().await;
        let Some(chunks) = documents.get(document_id) else {
            return Ok(Vec::new());
        };

        let ranked = rank_descending_by_cosine(query, chunks.iter().map(|c| c.embedding.as_slice()));
        let mut hits: Vec<ScoredChunk> = ranked
            .into_iter()
            .map(|(pos, score)| ScoredChunk {
                index: chunks[pos].index,
                score,
                text: chunks[pos].text.clone(),
            })
            .collect();

        sort_hits(&mut hits);
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete_document(&self, document_id: &str) -> Result<usize> {
        let mut documents = self.documents.write().await;
        Ok(documents.remove(document_id).map(|c| c.len()).unwrap_or(0))
    }

    async fn count(&self, document_id: &str) -> Result<usize> {
        let documents = self.documents.read().await;
        Ok(documents.get(document_id).map(Vec::len).unwrap_or(0))
    }
}

/// Chunk index stored in a LanceDB table
///
/// The table is created on first write, with the vector width of the first
/// chunk set; every later chunk and query must use the same width.
pub struct LanceChunkIndex {
    connection: Connection,
    table_name: String,
}

impl LanceChunkIndex {
    /// Connect to (or create) the database at `db_path`
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        info!("Initializing LanceDB at {:?}", db_path);

        let connection = lancedb::connect(db_path.to_string_lossy().as_ref())
            .execute()
            .await?;

        Ok(Self {
            connection,
            table_name: "blog_chunks".to_string(),
        })
    }

    async fn open_table(&self) -> Result<Option<Table>> {
        let table_names = self.connection.table_names().execute().await?;
        if !table_names.contains(&self.table_name) {
            return Ok(None);
        }

        debug!("Opening existing table: {}", self.table_name);
        Ok(Some(self.connection.open_table(&self.table_name).execute().await?))
    }

    fn schema(dimension: i32) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("document_id", DataType::Utf8, false),
            Field::new("chunk_index", DataType::Int64, false),
            Field::new("text", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension,
                ),
                false,
            ),
        ]))
    }

    fn chunk_batch(chunks: &[Chunk]) -> Result<RecordBatch> {
        let dimension = chunks.first().map(|c| c.embedding.len()).unwrap_or(0);
        if dimension == 0 {
            return Err(RagError::Index("chunks have empty embeddings".into()));
        }
        if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != dimension) {
            return Err(RagError::Index(format!(
                "embedding dimension mismatch: expected {}, got {} for chunk {}",
                dimension,
                bad.embedding.len(),
                bad.index
            )));
        }

        let schema = Self::schema(dimension as i32);

        let document_ids = StringArray::from_iter_values(chunks.iter().map(|c| c.document_id.as_str()));
        let indexes = Int64Array::from_iter_values(chunks.iter().map(|c| c.index as i64));
        let texts = StringArray::from_iter_values(chunks.iter().map(|c| c.text.as_str()));

        let values = Float32Array::from_iter_values(chunks.iter().flat_map(|c| c.embedding.iter().copied()));
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vectors = FixedSizeListArray::try_new(field, dimension as i32, Arc::new(values), None)?;

        Ok(RecordBatch::try_new(
            schema,
            vec![
                Arc::new(document_ids),
                Arc::new(indexes),
                Arc::new(texts),
                Arc::new(vectors),
            ],
        )?)
    }
}

/// SQL filter selecting one document's rows
fn document_filter(document_id: &str) -> String {
    format!("document_id = '{}'", document_id.replace('\'', "''"))
}

#[async_trait]
impl ChunkIndex for LanceChunkIndex {
    async fn replace_document(&self, document_id: &str, chunks: Vec<Chunk>) -> Result<usize> {
        let table = self.open_table().await?;

        if let Some(table) = &table {
            table.delete(&document_filter(document_id)).await?;
        }

        if chunks.is_empty() {
            return Ok(0);
        }

        let batch = Self::chunk_batch(&chunks)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        match table {
            Some(table) => table.add(Box::new(batches)).execute().await?,
            None => {
                info!("Creating new table: {}", self.table_name);
                self.connection
                    .create_table(&self.table_name, Box::new(batches))
                    .execute()
                    .await?;
            }
        };

        debug!("Indexed {} chunks for {}", chunks.len(), document_id);
        Ok(chunks.len())
    }

    async fn search(&self, document_id: &str, query: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
        let Some(table) = self.open_table().await? else {
            return Ok(Vec::new());
        };

        let results = table
            .vector_search(query.to_vec())?
            .distance_type(DistanceType::Cosine)
            .only_if(document_filter(document_id))
            .limit(limit)
            .execute()
            .await?;
        let batches: Vec<RecordBatch> = results.try_collect().await?;

        let mut hits = Vec::new();
        for batch in batches {
            let index_col = batch
                .column_by_name("chunk_index")
                .and_then(|c| c.as_any().downcast_ref::<Int64Array>());
            let text_col = batch
                .column_by_name("text")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>());
            let distance_col = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

            if let (Some(indexes), Some(texts), Some(distances)) = (index_col, text_col, distance_col) {
                for i in 0..batch.num_rows() {
                    hits.push(ScoredChunk {
                        index: indexes.value(i) as usize,
                        score: 1.0 - distances.value(i),
                        text: texts.value(i).to_string(),
                    });
                }
            }
        }

        sort_hits(&mut hits);
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete_document(&self, document_id: &str) -> Result<usize> {
        let Some(table) = self.open_table().await? else {
            return Ok(0);
        };

        let filter = document_filter(document_id);
        let existing = table.count_rows(Some(filter.clone())).await?;
        table.delete(&filter).await?;
        debug!("Deleted {} chunks for {}", existing, document_id);
        Ok(existing)
    }

    async fn count(&self, document_id: &str) -> Result<usize> {
        match self.open_table().await? {
            Some(table) => Ok(table.count_rows(Some(document_filter(document_id))).await?),
            None => Ok(0),
        }
    }
}
