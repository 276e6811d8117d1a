//! dokseo-rag - 로컬 PDF RAG 질의응답 시스템
//!
//! PDF 문서를 페이지 단위로 수집해 LanceDB 벡터 검색으로 근거를 찾고,
//! Gemini로 답변 생성/근거 하이라이트/품질 평가까지 수행하는 CLI입니다.

pub mod cli;
pub mod embedding;
pub mod eval;
pub mod explain;
pub mod ingest;
pub mod knowledge;
pub mod llm;
pub mod qa;

// Re-exports
pub use embedding::{get_api_key, has_api_key, EmbeddingProvider, GeminiEmbedding};
pub use explain::{
    format_answer, highlight_matching_terms, ContextSearcher, PassageMetadata, ScoredPassage,
};
pub use ingest::{
    collect_pdfs, extract_pdf_pages, semantic_chunker, size_chunker, Chunker, PdfPage,
    SemanticChunker, SizeChunker,
};
pub use knowledge::{
    cosine_similarity, get_data_dir, ChunkVector, Document, DocumentStore, LanceVectorStore,
    NewDocument, Retriever, RetrieverStats, StoreStats, VectorHit, VectorStore,
    EMBEDDING_DIMENSION,
};
pub use llm::{GeminiGenerator, LlmError, TextGenerator};
pub use qa::{format_docs, QaEngine, RagAnswer};
