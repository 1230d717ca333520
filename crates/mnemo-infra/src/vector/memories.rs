//! LanceDB-backed implementation of the `VectorStore` trait.
//!
//! One `memories` table holds every (vector, payload) point, filterable by
//! owner and session through SQL predicates. Similarity search uses cosine
//! distance; scroll pages through the table with offset/limit so the
//! durability manager can export the full collection.

use std::sync::{Arc, RwLock};

use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field};
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use uuid::Uuid;

use mnemo_core::memory::vector::VectorStore;
use mnemo_types::error::RepositoryError;
use mnemo_types::memory::{MemoryFilter, MemoryKind, MemoryPayload, MemoryPoint, ScoredMemory};

use super::lance::LanceVectorStore;
use super::schema::memory_schema;

/// Name of the single memory table.
const TABLE_NAME: &str = "memories";

/// LanceDB-backed vector memory store.
pub struct LanceMemoryStore {
    store: LanceVectorStore,
    /// Current collection dimension; replaced by `recreate` on restore.
    dimension: RwLock<i32>,
}

impl LanceMemoryStore {
    pub fn new(store: LanceVectorStore, dimension: usize) -> Self {
        Self {
            store,
            dimension: RwLock::new(dimension as i32),
        }
    }

    fn current_dimension(&self) -> i32 {
        *self.dimension.read().expect("dimension lock poisoned")
    }

    async fn ensure_table(&self) -> Result<lancedb::Table, RepositoryError> {
        let schema = Arc::new(memory_schema(self.current_dimension()));
        self.store
            .ensure_table(TABLE_NAME, schema)
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to ensure memory table: {e}")))
    }

    /// Render a filter as a Lance SQL predicate; None when unfiltered.
    fn predicate(filter: &MemoryFilter) -> Option<String> {
        let mut clauses = Vec::new();
        if let Some(ref owner) = filter.owner_id {
            clauses.push(format!("owner_id = '{}'", escape(owner)));
        }
        if let Some(session) = filter.session_id {
            clauses.push(format!("session_id = '{session}'"));
        }
        if clauses.is_empty() {
            None
        } else {
            Some(clauses.join(" AND "))
        }
    }

    /// Build an Arrow RecordBatch from memory points.
    fn build_record_batch(
        points: &[MemoryPoint],
        dimension: i32,
    ) -> Result<RecordBatch, RepositoryError> {
        let schema = Arc::new(memory_schema(dimension));

        let mut flat = Vec::with_capacity(points.len() * dimension as usize);
        for point in points {
            if point.vector.len() != dimension as usize {
                return Err(RepositoryError::Query(format!(
                    "vector dimension mismatch: expected {dimension}, got {}",
                    point.vector.len()
                )));
            }
            flat.extend_from_slice(&point.vector);
        }

        let id_array = StringArray::from(
            points.iter().map(|p| p.id.to_string()).collect::<Vec<_>>(),
        );
        let owner_array = StringArray::from(
            points
                .iter()
                .map(|p| p.payload.owner_id.clone())
                .collect::<Vec<_>>(),
        );
        let session_array = StringArray::from(
            points
                .iter()
                .map(|p| p.payload.session_id.map(|s| s.to_string()))
                .collect::<Vec<Option<String>>>(),
        );
        let text_array = StringArray::from(
            points
                .iter()
                .map(|p| p.payload.text.clone())
                .collect::<Vec<_>>(),
        );
        let kind_array = StringArray::from(
            points
                .iter()
                .map(|p| p.payload.kind.to_string())
                .collect::<Vec<_>>(),
        );
        let created_array = StringArray::from(
            points
                .iter()
                .map(|p| p.payload.created_at.to_rfc3339())
                .collect::<Vec<_>>(),
        );

        let values = Float32Array::from(flat);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vector_array = FixedSizeListArray::new(field, dimension, Arc::new(values), None);

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(id_array),
                Arc::new(owner_array),
                Arc::new(session_array),
                Arc::new(text_array),
                Arc::new(kind_array),
                Arc::new(created_array),
                Arc::new(vector_array),
            ],
        )
        .map_err(|e| RepositoryError::Query(format!("Failed to build record batch: {e}")))
    }

    /// Parse Arrow RecordBatch rows into memory points.
    fn record_batch_to_points(batch: &RecordBatch) -> Vec<MemoryPoint> {
        let num_rows = batch.num_rows();
        if num_rows == 0 {
            return vec![];
        }

        let id_col = string_column(batch, "id");
        let owner_col = string_column(batch, "owner_id");
        let session_col = string_column(batch, "session_id");
        let text_col = string_column(batch, "text");
        let kind_col = string_column(batch, "kind");
        let created_col = string_column(batch, "created_at");
        let vector_col = batch
            .column_by_name("vector")
            .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
            .expect("vector column should be FixedSizeListArray");

        let mut points = Vec::with_capacity(num_rows);

        for i in 0..num_rows {
            let id = Uuid::parse_str(id_col.value(i)).unwrap_or_else(|_| Uuid::nil());
            let session_id = if session_col.is_null(i) {
                None
            } else {
                Uuid::parse_str(session_col.value(i)).ok()
            };
            let created_at = DateTime::parse_from_rfc3339(created_col.value(i))
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now());
            let kind: MemoryKind = kind_col
                .value(i)
                .parse()
                .unwrap_or(MemoryKind::TranscriptFallback);

            let inner = vector_col.value(i);
            let floats = inner
                .as_any()
                .downcast_ref::<Float32Array>()
                .expect("vector items should be Float32Array");
            let vector: Vec<f32> = (0..floats.len()).map(|j| floats.value(j)).collect();

            points.push(MemoryPoint {
                id,
                vector,
                payload: MemoryPayload {
                    owner_id: owner_col.value(i).to_string(),
                    session_id,
                    text: text_col.value(i).to_string(),
                    kind,
                    created_at,
                },
            });
        }

        points
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> &'a StringArray {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .unwrap_or_else(|| panic!("{name} column should be StringArray"))
}

/// Escape single quotes for a Lance SQL string literal.
fn escape(s: &str) -> String {
    s.replace('\'', "''")
}

impl VectorStore for LanceMemoryStore {
    async fn upsert(&self, points: &[MemoryPoint]) -> Result<(), RepositoryError> {
        if points.is_empty() {
            return Ok(());
        }

        let table = self.ensure_table().await?;

        // Lance has no native upsert: drop stale rows for these ids first.
        let id_list = points
            .iter()
            .map(|p| format!("'{}'", p.id))
            .collect::<Vec<_>>()
            .join(", ");
        table
            .delete(&format!("id IN ({id_list})"))
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to delete stale points: {e}")))?;

        let batch = Self::build_record_batch(points, self.current_dimension())?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(vec![Ok(batch)], schema);

        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to add memory points: {e}")))?;

        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        filter: &MemoryFilter,
        limit: usize,
    ) -> Result<Vec<ScoredMemory>, RepositoryError> {
        if !self.store.table_exists(TABLE_NAME).await {
            return Ok(vec![]);
        }

        let table = self.ensure_table().await?;

        let mut query = table
            .vector_search(query_vector)
            .map_err(|e| RepositoryError::Query(format!("Vector search setup failed: {e}")))?
            .distance_type(lancedb::DistanceType::Cosine)
            .limit(limit);

        if let Some(predicate) = Self::predicate(filter) {
            query = query.only_if(predicate);
        }

        let results = query
            .execute()
            .await
            .map_err(|e| RepositoryError::Query(format!("Vector search failed: {e}")))?;

        let batches: Vec<RecordBatch> = results
            .try_collect()
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to collect results: {e}")))?;

        let mut scored: Vec<ScoredMemory> = Vec::new();

        for batch in &batches {
            if batch.num_rows() == 0 {
                continue;
            }

            // The _distance column is added by LanceDB vector search
            let distance_col = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

            let points = Self::record_batch_to_points(batch);

            for (i, point) in points.into_iter().enumerate() {
                let distance = distance_col.map_or(0.0, |d| d.value(i));
                scored.push(ScoredMemory {
                    id: point.id,
                    score: 1.0 - distance,
                    payload: point.payload,
                });
            }
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        Ok(scored)
    }

    async fn scroll(
        &self,
        filter: &MemoryFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<MemoryPoint>, RepositoryError> {
        if !self.store.table_exists(TABLE_NAME).await {
            return Ok(vec![]);
        }

        let table = self.ensure_table().await?;

        let mut query = table.query().offset(offset).limit(limit);
        if let Some(predicate) = Self::predicate(filter) {
            query = query.only_if(predicate);
        }

        let results = query
            .execute()
            .await
            .map_err(|e| RepositoryError::Query(format!("Scroll query failed: {e}")))?;

        let batches: Vec<RecordBatch> = results
            .try_collect()
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to collect scroll page: {e}")))?;

        let mut points = Vec::new();
        for batch in &batches {
            points.extend(Self::record_batch_to_points(batch));
        }

        Ok(points)
    }

    async fn delete(&self, ids: &[Uuid]) -> Result<(), RepositoryError> {
        if ids.is_empty() || !self.store.table_exists(TABLE_NAME).await {
            return Ok(());
        }

        let table = self.ensure_table().await?;
        let id_list = ids
            .iter()
            .map(|id| format!("'{id}'"))
            .collect::<Vec<_>>()
            .join(", ");

        table
            .delete(&format!("id IN ({id_list})"))
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to delete points: {e}")))?;

        Ok(())
    }

    async fn delete_by_filter(&self, filter: &MemoryFilter) -> Result<u64, RepositoryError> {
        if !self.store.table_exists(TABLE_NAME).await {
            return Ok(0);
        }

        let table = self.ensure_table().await?;
        let predicate = Self::predicate(filter)
            .ok_or_else(|| RepositoryError::Query("refusing unfiltered delete".to_string()))?;

        let count = table
            .count_rows(Some(predicate.clone()))
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to count matches: {e}")))?;

        table
            .delete(&predicate)
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to delete by filter: {e}")))?;

        Ok(count as u64)
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        if !self.store.table_exists(TABLE_NAME).await {
            return Ok(0);
        }

        let table = self.ensure_table().await?;
        let count = table
            .count_rows(None)
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to count rows: {e}")))?;

        Ok(count as u64)
    }

    async fn recreate(&self, dimension: usize) -> Result<(), RepositoryError> {
        self.store
            .drop_table(TABLE_NAME)
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to drop memory table: {e}")))?;

        *self.dimension.write().expect("dimension lock poisoned") = dimension as i32;
        self.ensure_table().await?;

        Ok(())
    }
}
