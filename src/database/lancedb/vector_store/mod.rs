
use super::{IndexError, QueryFilter, RetrievedChunk};
use crate::embeddings::chunking::{Chunk, ChunkMetadata, ChunkType};
use crate::records::{Severity, ValidationError};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, Float64Array, RecordBatchIterator, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DEFAULT_UPSERT_BATCH_SIZE: usize = 100;

/// Persistent nearest-neighbour index over maintenance log chunks
///
/// Queries take `&self` and may run concurrently; writes take `&mut self`.
pub struct VectorIndex {
    connection: Connection,
    path: PathBuf,
    table_name: String,
    dimension: usize,
    upsert_batch_size: usize,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("path", &self.path)
            .field("table_name", &self.table_name)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

impl VectorIndex {
    /// Connect to the LanceDB directory at `path`
    ///
    /// The named collection is not created here; a query against a
    /// collection that was never built fails with `IndexError::NotFound`.
    #[inline]
    pub async fn open(path: &Path, table_name: &str, dimension: usize) -> Result<Self, IndexError> {
        debug!("Opening LanceDB at path: {:?}", path);

        std::fs::create_dir_all(path).map_err(|e| {
            IndexError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = format!("file://{}", path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| IndexError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        Ok(Self {
            connection,
            path: path.to_path_buf(),
            table_name: table_name.to_string(),
            dimension,
            upsert_batch_size: DEFAULT_UPSERT_BATCH_SIZE,
        })
    }

    /// Maximum rows written per merge
    #[inline]
    pub fn with_upsert_batch_size(mut self, batch_size: usize) -> Self {
        self.upsert_batch_size = batch_size.max(1);
        self
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub async fn exists(&self) -> Result<bool, IndexError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| IndexError::Database(format!("Failed to list tables: {}", e)))?;

        Ok(table_names.contains(&self.table_name))
    }

    /// Drop the collection if present and recreate it empty
    #[inline]
    pub async fn rebuild(&mut self) -> Result<(), IndexError> {
        if self.exists().await? {
            info!("Dropping existing collection {}", self.table_name);
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| IndexError::Database(format!("Failed to drop table: {}", e)))?;
        }

        self.create_table().await?;
        info!(
            "Collection {} recreated with {} dimensions",
            self.table_name, self.dimension
        );
        Ok(())
    }

    /// Insert or replace chunks by id
    #[inline]
    pub async fn upsert(&mut self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<usize, IndexError> {
        self.upsert_with_progress(chunks, vectors, |_| {}).await
    }

    /// Like [`Self::upsert`], reporting the running row count after each batch
    #[inline]
    pub async fn upsert_with_progress<F>(
        &mut self,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
        mut on_batch: F,
    ) -> Result<usize, IndexError>
    where
        F: FnMut(usize) + Send,
    {
        if chunks.len() != vectors.len() {
            return Err(ValidationError::LengthMismatch {
                chunks: chunks.len(),
                vectors: vectors.len(),
            }
            .into());
        }

        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(ValidationError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            }
            .into());
        }

        if chunks.is_empty() {
            debug!("No chunks to upsert");
            return Ok(0);
        }

        if !self.exists().await? {
            self.create_table().await?;
        }
        let table = self.open_table().await?;

        let mut written = 0;
        for (chunk_batch, vector_batch) in chunks
            .chunks(self.upsert_batch_size)
            .zip(vectors.chunks(self.upsert_batch_size))
        {
            let record_batch = self.create_record_batch(chunk_batch, vector_batch)?;
            let schema = record_batch.schema();
            let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

            let mut merge = table.merge_insert(&["id"]);
            merge
                .when_matched_update_all(None)
                .when_not_matched_insert_all();
            merge
                .execute(Box::new(reader))
                .await
                .map_err(|e| IndexError::Database(format!("Failed to upsert chunks: {}", e)))?;

            written += chunk_batch.len();
            debug!("Upserted {}/{} chunks", written, chunks.len());
            on_batch(written);
        }

        info!("Successfully upserted {} chunks", written);
        Ok(written)
    }

    /// Top-k chunks by ascending cosine distance
    #[inline]
    pub async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&QueryFilter>,
    ) -> Result<Vec<RetrievedChunk>, IndexError> {
        if vector.len() != self.dimension {
            return Err(ValidationError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            }
            .into());
        }

        let table = self.open_table().await?;

        if k == 0 {
            return Ok(Vec::new());
        }

        debug!("Searching for similar vectors with limit: {}", k);

        let mut query = table
            .vector_search(vector)
            .map_err(|e| IndexError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(k);

        if let Some(predicate) = filter.and_then(QueryFilter::to_predicate) {
            debug!("Applying filter: {}", predicate);
            query = query.only_if(predicate);
        }

        let batches: Vec<RecordBatch> = query
            .execute()
            .await
            .map_err(|e| IndexError::Database(format!("Failed to execute search: {}", e)))?
            .try_collect()
            .await
            .map_err(|e| IndexError::Database(format!("Failed to read result stream: {}", e)))?;

        let mut results = Vec::new();
        for batch in &batches {
            results.extend(parse_search_batch(batch)?);
        }

        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        results.truncate(k);

        debug!("Query returned {} chunks", results.len());
        Ok(results)
    }

    /// Number of stored chunks
    #[inline]
    pub async fn count(&self) -> Result<usize, IndexError> {
        let table = self.open_table().await?;
        table
            .count_rows(None)
            .await
            .map_err(|e| IndexError::Database(format!("Failed to count rows: {}", e)))
    }

    async fn open_table(&self) -> Result<Table, IndexError> {
        if !self.exists().await? {
            return Err(IndexError::NotFound {
                collection: self.table_name.clone(),
            });
        }

        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| IndexError::Database(format!("Failed to open table: {}", e)))
    }

    async fn create_table(&self) -> Result<(), IndexError> {
        self.connection
            .create_empty_table(&self.table_name, create_schema(self.dimension))
            .execute()
            .await
            .map_err(|e| IndexError::Database(format!("Failed to create table: {}", e)))?;
        Ok(())
    }

    fn create_record_batch(
        &self,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<RecordBatch, IndexError> {
        let len = chunks.len();
        let dimension = self.dimension;

        let mut ids = Vec::with_capacity(len);
        let mut texts = Vec::with_capacity(len);
        let mut record_ids = Vec::with_capacity(len);
        let mut dates = Vec::with_capacity(len);
        let mut equipment_ids = Vec::with_capacity(len);
        let mut equipment_types = Vec::with_capacity(len);
        let mut severities = Vec::with_capacity(len);
        let mut repair_times = Vec::with_capacity(len);
        let mut chunk_types = Vec::with_capacity(len);

        for chunk in chunks {
            let metadata = &chunk.metadata;
            ids.push(chunk.id.as_str());
            texts.push(chunk.text.as_str());
            record_ids.push(metadata.record_id.as_str());
            dates.push(metadata.date.format(DATE_FORMAT).to_string());
            equipment_ids.push(metadata.equipment_id.as_str());
            equipment_types.push(metadata.equipment_type.as_str());
            severities.push(metadata.severity.as_str());
            repair_times.push(metadata.repair_time_hours);
            chunk_types.push(metadata.chunk_type.as_str());
        }

        let mut flat_values = Vec::with_capacity(len * dimension);
        for vector in vectors {
            flat_values.extend_from_slice(vector);
        }
        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array =
            FixedSizeListArray::try_new(field, dimension as i32, Arc::new(values_array), None)
                .map_err(|e| {
                    IndexError::Database(format!("Failed to create vector array: {}", e))
                })?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(texts)),
            Arc::new(StringArray::from(record_ids)),
            Arc::new(StringArray::from(dates)),
            Arc::new(StringArray::from(equipment_ids)),
            Arc::new(StringArray::from(equipment_types)),
            Arc::new(StringArray::from(severities)),
            Arc::new(Float64Array::from(repair_times)),
            Arc::new(StringArray::from(chunk_types)),
        ];

        RecordBatch::try_new(create_schema(dimension), arrays)
            .map_err(|e| IndexError::Database(format!("Failed to create record batch: {}", e)))
    }
}

/// Create schema with the specified vector dimension
fn create_schema(dimension: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                dimension as i32,
            ),
            false,
        ),
        Field::new("text", DataType::Utf8, false),
        Field::new("record_id", DataType::Utf8, false),
        Field::new("date", DataType::Utf8, false),
        Field::new("equipment_id", DataType::Utf8, false),
        Field::new("equipment_type", DataType::Utf8, false),
        Field::new("severity", DataType::Utf8, false),
        Field::new("repair_time_hours", DataType::Float64, false),
        Field::new("chunk_type", DataType::Utf8, false),
    ]))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, IndexError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| IndexError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| IndexError::Database(format!("Invalid {} column type", name)))
}

fn corrupt_row(field: &str, value: &str) -> IndexError {
    IndexError::Database(format!("Stored row has invalid {}: '{}'", field, value))
}

/// Parse a single record batch from search results
fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<RetrievedChunk>, IndexError> {
    let ids = string_column(batch, "id")?;
    let texts = string_column(batch, "text")?;
    let record_ids = string_column(batch, "record_id")?;
    let dates = string_column(batch, "date")?;
    let equipment_ids = string_column(batch, "equipment_id")?;
    let equipment_types = string_column(batch, "equipment_type")?;
    let severities = string_column(batch, "severity")?;
    let chunk_types = string_column(batch, "chunk_type")?;

    let repair_times = batch
        .column_by_name("repair_time_hours")
        .ok_or_else(|| IndexError::Database("Missing repair_time_hours column".to_string()))?
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| IndexError::Database("Invalid repair_time_hours column type".to_string()))?;

    let distances = batch
        .column_by_name("_distance")
        .ok_or_else(|| IndexError::Database("Missing _distance column".to_string()))?
        .as_any()
        .downcast_ref::<Float32Array>()
        .ok_or_else(|| IndexError::Database("Invalid _distance column type".to_string()))?;

    let mut results = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let date = NaiveDate::parse_from_str(dates.value(row), DATE_FORMAT)
            .map_err(|_| corrupt_row("date", dates.value(row)))?;
        let severity: Severity = severities
            .value(row)
            .parse()
            .map_err(|_| corrupt_row("severity", severities.value(row)))?;
        let chunk_type: ChunkType = chunk_types
            .value(row)
            .parse()
            .map_err(|_| corrupt_row("chunk_type", chunk_types.value(row)))?;

        // Cosine distance can dip fractionally below zero from rounding
        let distance = if distances.is_null(row) {
            0.0
        } else {
            distances.value(row).max(0.0)
        };

        results.push(RetrievedChunk {
            id: ids.value(row).to_string(),
            text: texts.value(row).to_string(),
            metadata: ChunkMetadata {
                record_id: record_ids.value(row).to_string(),
                date,
                equipment_id: equipment_ids.value(row).to_string(),
                equipment_type: equipment_types.value(row).to_string(),
                severity,
                repair_time_hours: repair_times.value(row),
                chunk_type,
            },
            distance,
        });
    }

    Ok(results)
}
