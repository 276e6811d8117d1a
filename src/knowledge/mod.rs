//! Knowledge 모듈 - 문서/벡터 지식 저장소
//!
//! - SQLite: PDF 페이지 원문 저장
//! - LanceDB: 청크 임베딩 벡터 검색 (ANN)
//! - Retriever: 저장 + 청킹 + 임베딩 + 검색 조합

mod lance;
mod retriever;
mod store;
mod vector;

// Re-exports
pub use lance::LanceVectorStore;
pub use retriever::{Retriever, RetrieverStats, DEFAULT_TOP_K};
pub use store::{get_data_dir, Document, DocumentStore, NewDocument, StoreStats};
pub use vector::{
    cosine_similarity, ChunkVector, VectorHit, VectorStore, EMBEDDING_DIMENSION,
};
