//! LanceDB Vector Store - 청크 임베딩 저장 및 ANN 검색
//!
//! Apache Arrow 기반 columnar 포맷으로 청크 임베딩을 저장하고
//! 근사 최근접 이웃 검색을 수행합니다.
//! ref: https://lancedb.github.io/lancedb/

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, Int64Array, RecordBatch,
    RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};

use super::vector::{ChunkVector, VectorHit, VectorStore, EMBEDDING_DIMENSION};

/// 청크 벡터 테이블 이름
const TABLE_NAME: &str = "chunks";

// ============================================================================
// LanceVectorStore
// ============================================================================

/// LanceDB 벡터 저장소 구현
pub struct LanceVectorStore {
    db: Connection,
}

impl LanceVectorStore {
    /// LanceDB 저장소 열기
    ///
    /// # Arguments
    /// * `path` - .lance 디렉토리 경로
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create LanceDB directory")?;
            }
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        Ok(Self { db })
    }

    /// 청크 테이블 스키마
    fn create_schema() -> Schema {
        Schema::new(vec![
            Field::new("doc_id", DataType::Int64, false),
            Field::new("chunk_index", DataType::Int32, false),
            Field::new("text", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    EMBEDDING_DIMENSION,
                ),
                false,
            ),
        ])
    }

    /// ChunkVector 목록을 Arrow RecordBatch로 변환
    fn vectors_to_batch(vectors: &[ChunkVector]) -> Result<RecordBatch> {
        if vectors.is_empty() {
            anyhow::bail!("Cannot create batch from empty vectors");
        }

        let doc_ids: Vec<i64> = vectors.iter().map(|v| v.doc_id).collect();
        let chunk_indices: Vec<i32> = vectors.iter().map(|v| v.chunk_index).collect();
        let texts: Vec<&str> = vectors.iter().map(|v| v.text.as_str()).collect();

        let embeddings_flat: Vec<f32> = vectors
            .iter()
            .flat_map(|v| v.embedding.iter().copied())
            .collect();

        let values = Float32Array::from(embeddings_flat);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let embeddings_list = FixedSizeListArray::try_new(
            field,
            EMBEDDING_DIMENSION,
            Arc::new(values) as Arc<dyn Array>,
            None,
        )
        .context("Failed to create embedding array")?;

        let batch = RecordBatch::try_new(
            Arc::new(Self::create_schema()),
            vec![
                Arc::new(Int64Array::from(doc_ids)),
                Arc::new(Int32Array::from(chunk_indices)),
                Arc::new(StringArray::from(texts)),
                Arc::new(embeddings_list),
            ],
        )
        .context("Failed to create RecordBatch")?;

        Ok(batch)
    }

    /// 테이블 존재 여부 확인
    async fn table_exists(&self) -> bool {
        self.db
            .table_names()
            .execute()
            .await
            .map(|names| names.contains(&TABLE_NAME.to_string()))
            .unwrap_or(false)
    }
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn insert_batch(&self, vectors: &[ChunkVector]) -> Result<usize> {
        if vectors.is_empty() {
            return Ok(0);
        }

        let batch = Self::vectors_to_batch(vectors)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        if self.table_exists().await {
            let table = self
                .db
                .open_table(TABLE_NAME)
                .execute()
                .await
                .context("Failed to open table")?;

            table
                .add(batches)
                .execute()
                .await
                .context("Failed to add vectors to table")?;
        } else {
            self.db
                .create_table(TABLE_NAME, batches)
                .execute()
                .await
                .context("Failed to create table")?;
        }

        Ok(vectors.len())
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<VectorHit>> {
        if !self.table_exists().await {
            return Ok(vec![]);
        }

        let table = self
            .db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .context("Failed to open table for search")?;

        let results = table
            .vector_search(query_embedding.to_vec())
            .context("Failed to create vector search")?
            .limit(limit)
            .execute()
            .await
            .context("Failed to execute vector search")?;

        use futures::TryStreamExt;
        let batches: Vec<RecordBatch> = results.try_collect().await?;

        let mut hits = Vec::new();

        for batch in batches {
            let doc_ids = batch
                .column_by_name("doc_id")
                .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
                .ok_or_else(|| anyhow::anyhow!("Missing doc_id column"))?;

            let chunk_indices = batch
                .column_by_name("chunk_index")
                .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
                .ok_or_else(|| anyhow::anyhow!("Missing chunk_index column"))?;

            let texts = batch
                .column_by_name("text")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| anyhow::anyhow!("Missing text column"))?;

            // _distance 컬럼은 LanceDB가 자동 추가
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| anyhow::anyhow!("Missing _distance column"))?;

            for i in 0..batch.num_rows() {
                // L2 거리를 (0, 1] 유사도로 변환
                let similarity = 1.0 / (1.0 + distances.value(i));

                hits.push(VectorHit {
                    doc_id: doc_ids.value(i),
                    chunk_index: chunk_indices.value(i),
                    text: texts.value(i).to_string(),
                    similarity,
                });
            }
        }

        Ok(hits)
    }

    async fn delete_by_doc_id(&self, doc_id: i64) -> Result<usize> {
        if !self.table_exists().await {
            return Ok(0);
        }

        let table = self
            .db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .context("Failed to open table for delete")?;

        let before_count = self.count().await?;

        // doc_id는 i64 타입으로 검증됨 - SQL 인젝션 방지
        let filter = format!("doc_id = {}", doc_id);
        table
            .delete(&filter)
            .await
            .context("Failed to delete vectors")?;

        let after_count = self.count().await?;
        Ok(before_count.saturating_sub(after_count))
    }

    async fn count(&self) -> Result<usize> {
        if !self.table_exists().await {
            return Ok(0);
        }

        let table = self
            .db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .context("Failed to open table for count")?;

        let count = table.count_rows(None).await.context("Failed to count rows")?;
        Ok(count)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn chunk(doc_id: i64, chunk_index: i32, fill: f32) -> ChunkVector {
        ChunkVector {
            doc_id,
            chunk_index,
            text: format!("chunk {} of doc {}", chunk_index, doc_id),
            embedding: vec![fill; EMBEDDING_DIMENSION as usize],
        }
    }

    #[tokio::test]
    async fn test_insert_and_count() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&temp_dir.path().join("test.lance"))
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 0);

        let inserted = store
            .insert_batch(&[chunk(1, 0, 0.1), chunk(1, 1, 0.2)])
            .await
            .unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_search_returns_nearest() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&temp_dir.path().join("search.lance"))
            .await
            .unwrap();

        store
            .insert_batch(&[chunk(1, 0, 0.1), chunk(2, 0, 0.5), chunk(3, 0, 0.9)])
            .await
            .unwrap();

        let query = vec![0.1; EMBEDDING_DIMENSION as usize];
        let hits = store.search(&query, 2).await.unwrap();

        assert!(!hits.is_empty());
        assert!(hits.len() <= 2);
        // 가장 가까운 벡터가 먼저
        assert_eq!(hits[0].doc_id, 1);
        assert!(hits[0].similarity > 0.0 && hits[0].similarity <= 1.0);
    }

    #[tokio::test]
    async fn test_search_empty_store() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&temp_dir.path().join("empty.lance"))
            .await
            .unwrap();

        let query = vec![0.1; EMBEDDING_DIMENSION as usize];
        let hits = store.search(&query, 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_delete_by_doc_id() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&temp_dir.path().join("delete.lance"))
            .await
            .unwrap();

        store
            .insert_batch(&[chunk(1, 0, 0.1), chunk(1, 1, 0.2), chunk(2, 0, 0.3)])
            .await
            .unwrap();

        let deleted = store.delete_by_doc_id(1).await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
