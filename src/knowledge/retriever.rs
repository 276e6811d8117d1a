//! Retriever - 문서 저장 + 임베딩 + 벡터 검색 조합
//!
//! DocumentStore(원문), LanceVectorStore(임베딩), 임베더, 청커를 묶어
//! 문서 추가와 유사도 검색을 한 번에 처리합니다. 검색 결과는
//! 출처 메타데이터가 붙은 ScoredPassage로 반환되어 답변 포매터의
//! ContextSearcher 콜라보레이터로 바로 사용됩니다.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::explain::{ContextSearcher, PassageMetadata, ScoredPassage};
use crate::ingest::Chunker;

use super::lance::LanceVectorStore;
use super::store::{get_data_dir, DocumentStore, NewDocument};
use super::vector::{ChunkVector, VectorStore};

/// 기본 검색 결과 개수
pub const DEFAULT_TOP_K: usize = 4;

// ============================================================================
// Types
// ============================================================================

/// 저장소 통계 (문서 + 벡터)
#[derive(Debug, Clone)]
pub struct RetrieverStats {
    pub document_count: usize,
    pub vector_count: usize,
    pub total_content_bytes: usize,
}

// ============================================================================
// Retriever
// ============================================================================

/// 문서 검색기
pub struct Retriever {
    store: DocumentStore,
    vector: LanceVectorStore,
    embedder: Arc<dyn EmbeddingProvider>,
    chunker: Box<dyn Chunker>,
    top_k: usize,
}

impl Retriever {
    /// 기본 데이터 디렉토리(~/.dokseo-rag/)로 생성
    pub async fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        chunker: Box<dyn Chunker>,
    ) -> Result<Self> {
        let data_dir = get_data_dir();
        Self::with_data_dir(&data_dir, embedder, chunker).await
    }

    /// 지정된 데이터 디렉토리로 생성
    pub async fn with_data_dir(
        data_dir: &Path,
        embedder: Arc<dyn EmbeddingProvider>,
        chunker: Box<dyn Chunker>,
    ) -> Result<Self> {
        if !data_dir.exists() {
            std::fs::create_dir_all(data_dir).context("Failed to create data directory")?;
        }

        let store = DocumentStore::open(&data_dir.join("documents.db"))
            .context("Failed to open document store")?;

        let vector = LanceVectorStore::open(&data_dir.join("chunks.lance"))
            .await
            .context("Failed to open vector store")?;

        Ok(Self {
            store,
            vector,
            embedder,
            chunker,
            top_k: DEFAULT_TOP_K,
        })
    }

    /// 검색 결과 개수 설정
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// 문서 페이지 추가 (청킹 + 자동 임베딩)
    ///
    /// 원문을 DocumentStore에 저장하고, 청킹 후 임베딩을 LanceDB에
    /// 저장합니다. 반환값은 문서 ID입니다.
    pub async fn add_document(&self, doc: NewDocument) -> Result<i64> {
        let doc_id = self
            .store
            .add_document(doc.clone())
            .context("Failed to add document to store")?;

        let chunks = self.chunker.chunk(&doc.content).await?;
        if chunks.is_empty() {
            tracing::warn!("No chunks generated for document: {} (id={})", doc.source, doc_id);
            return Ok(doc_id);
        }

        let embeddings = self
            .embedder
            .embed_document_batch(&chunks)
            .await
            .context("Failed to embed chunks")?;

        let vectors: Vec<ChunkVector> = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (text, embedding))| ChunkVector {
                doc_id,
                chunk_index: i as i32,
                text,
                embedding,
            })
            .collect();

        self.vector
            .insert_batch(&vectors)
            .await
            .context("Failed to insert vectors")?;

        tracing::info!(
            "Added document: {} page {:?} (id={}, chunks={})",
            doc.source,
            doc.page,
            doc_id,
            vectors.len()
        );

        Ok(doc_id)
    }

    /// 유사도 검색
    ///
    /// 질문을 임베딩하여 가까운 청크를 찾고, 문서 메타데이터를 붙여
    /// 스코어 내림차순으로 반환합니다.
    pub async fn search(&self, question: &str, limit: usize) -> Result<Vec<ScoredPassage>> {
        let query_embedding = self
            .embedder
            .embed_query(question)
            .await
            .context("Failed to embed question")?;

        let hits = self.vector.search(&query_embedding, limit).await?;

        let mut passages = Vec::with_capacity(hits.len());

        for hit in hits {
            let metadata = match self.store.get_document(hit.doc_id)? {
                Some(doc) => PassageMetadata {
                    source: Some(doc.source),
                    page: doc.page,
                },
                None => PassageMetadata::default(),
            };

            passages.push(ScoredPassage {
                content: hit.text,
                score: hit.similarity,
                metadata,
            });
        }

        Ok(passages)
    }

    /// 문서 삭제 (원문 + 벡터)
    pub async fn delete_document(&self, doc_id: i64) -> Result<bool> {
        self.vector.delete_by_doc_id(doc_id).await?;
        self.store.delete_document(doc_id)
    }

    /// 소스 경로의 모든 페이지 삭제
    pub async fn delete_by_source(&self, source: &str) -> Result<usize> {
        let ids = self.store.ids_by_source(source)?;
        let mut deleted = 0;

        for id in ids {
            if self.delete_document(id).await? {
                deleted += 1;
            }
        }

        Ok(deleted)
    }

    /// 저장소 통계
    pub async fn stats(&self) -> Result<RetrieverStats> {
        let store_stats = self.store.stats()?;
        let vector_count = self.vector.count().await?;

        Ok(RetrieverStats {
            document_count: store_stats.document_count,
            vector_count,
            total_content_bytes: store_stats.total_content_bytes,
        })
    }

    /// 내부 문서 저장소 접근
    pub fn store(&self) -> &DocumentStore {
        &self.store
    }
}

#[async_trait]
impl ContextSearcher for Retriever {
    async fn search_with_scores(&self, question: &str) -> Result<Vec<ScoredPassage>> {
        self.search(question, self.top_k).await
    }
}
