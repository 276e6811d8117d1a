//! Vector Store - 벡터 검색 트레이트 및 유틸리티
//!
//! 청크 임베딩 저장과 ANN (Approximate Nearest Neighbor) 검색의
//! 공통 인터페이스입니다. 구현체는 LanceDB를 사용합니다.

use anyhow::Result;
use async_trait::async_trait;

/// 벡터 임베딩 차원 (Gemini gemini-embedding-001 기본값)
/// source: https://ai.google.dev/gemini-api/docs/embeddings
pub const EMBEDDING_DIMENSION: i32 = 768;

// ============================================================================
// Types
// ============================================================================

/// 청크 벡터 (저장용)
#[derive(Debug, Clone)]
pub struct ChunkVector {
    /// 문서 ID (documents.id)
    pub doc_id: i64,
    /// 청크 인덱스 (0-based)
    pub chunk_index: i32,
    /// 청크 텍스트
    pub text: String,
    /// 임베딩 벡터
    pub embedding: Vec<f32>,
}

/// 벡터 검색 결과
#[derive(Debug, Clone)]
pub struct VectorHit {
    /// 문서 ID
    pub doc_id: i64,
    /// 청크 인덱스
    pub chunk_index: i32,
    /// 청크 텍스트
    pub text: String,
    /// 유사도 스코어 (0.0 ~ 1.0, 높을수록 가까움)
    pub similarity: f32,
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// VectorStore 트레이트 (async)
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 벡터 배치 삽입
    async fn insert_batch(&self, vectors: &[ChunkVector]) -> Result<usize>;

    /// 질의 임베딩으로 유사 청크 검색
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<VectorHit>>;

    /// doc_id로 벡터 삭제
    async fn delete_by_doc_id(&self, doc_id: i64) -> Result<usize>;

    /// 저장된 벡터 개수
    async fn count(&self) -> Result<usize>;
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산 (-1.0 ~ 1.0)
///
/// 시맨틱 청커가 인접 문장 간 거리를 계산할 때 사용합니다.
/// 길이가 다르거나 빈 벡터는 0.0을 반환합니다.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

// ============================================================================
// Tests
// ============================================================================
