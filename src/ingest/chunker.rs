//! 텍스트 청킹
//!
//! 페이지 텍스트를 임베딩 단위 청크로 분할합니다.
//! - SemanticChunker: 인접 문장 임베딩 거리가 큰 지점에서 분할
//! - SizeChunker: 문단 단위로 최대 크기까지 묶는 분할 (API 호출 없음)

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::knowledge::cosine_similarity;

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
#[async_trait]
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    async fn chunk(&self, text: &str) -> Result<Vec<String>>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// SemanticChunker
// ============================================================================

/// 시맨틱 청커
///
/// 문장 단위로 나눈 뒤 각 문장을 임베딩하고, 인접 문장 간 코사인
/// 거리가 가장 큰 (목표 청크 수 - 1)개 지점을 경계로 선택합니다.
/// 의미가 바뀌는 지점에서 청크가 나뉘므로 검색 품질이 좋아지는 대신
/// 문장 수만큼 임베딩 API 호출이 발생합니다.
pub struct SemanticChunker {
    embedder: Arc<dyn EmbeddingProvider>,
    target_chunks: usize,
}

impl SemanticChunker {
    /// 목표 청크 수를 지정하여 생성
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, target_chunks: usize) -> Self {
        Self {
            embedder,
            target_chunks: target_chunks.max(1),
        }
    }
}

#[async_trait]
impl Chunker for SemanticChunker {
    async fn chunk(&self, text: &str) -> Result<Vec<String>> {
        let sentences = split_sentences(text);

        if sentences.is_empty() {
            return Ok(vec![]);
        }

        // 문장이 목표 청크 수 이하면 분할할 경계가 없음
        if sentences.len() <= self.target_chunks || self.target_chunks == 1 {
            if self.target_chunks == 1 || sentences.len() == 1 {
                return Ok(vec![sentences.join(" ")]);
            }
            return Ok(sentences);
        }

        let embeddings = self.embedder.embed_document_batch(&sentences).await?;

        // 인접 문장 간 코사인 거리 (1 - 유사도)
        let distances: Vec<f32> = embeddings
            .windows(2)
            .map(|pair| 1.0 - cosine_similarity(&pair[0], &pair[1]))
            .collect();

        let boundaries = largest_distance_boundaries(&distances, self.target_chunks - 1);

        // 경계에서 문장 목록을 잘라 청크 구성
        let mut chunks = Vec::with_capacity(self.target_chunks);
        let mut start = 0;
        for boundary in boundaries {
            chunks.push(sentences[start..boundary].join(" "));
            start = boundary;
        }
        chunks.push(sentences[start..].join(" "));

        Ok(chunks)
    }

    fn name(&self) -> &'static str {
        "SemanticChunker"
    }
}

/// 거리가 큰 순서대로 분할 경계 선택 (결과는 오름차순 정렬)
///
/// 경계 i는 "문장 i 앞에서 자른다"를 의미합니다 (1 <= i < 문장 수).
fn largest_distance_boundaries(distances: &[f32], count: usize) -> Vec<usize> {
    let mut indexed: Vec<(usize, f32)> = distances
        .iter()
        .copied()
        .enumerate()
        .collect();

    indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut boundaries: Vec<usize> = indexed
        .into_iter()
        .take(count)
        .map(|(i, _)| i + 1)
        .collect();

    boundaries.sort_unstable();
    boundaries
}

/// 문장 단위 분할
///
/// 마침표/물음표/느낌표 뒤에 공백이 오는 지점을 문장 경계로 봅니다.
/// 축약 표기("e.g.")나 소수점은 구분하지 않는 단순한 규칙입니다.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);

        if matches!(c, '.' | '!' | '?') {
            let at_boundary = chars.peek().map_or(true, |next| next.is_whitespace());
            if at_boundary {
                let sentence = current.trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                current.clear();
            }
        }
    }

    let sentence = current.trim();
    if !sentence.is_empty() {
        sentences.push(sentence.to_string());
    }

    sentences
}

// ============================================================================
// SizeChunker
// ============================================================================

/// 기본 최대 청크 크기 (문자 수)
const DEFAULT_MAX_CHARACTERS: usize = 1200;

/// 고정 크기 청커
///
/// 문단(이중 줄바꿈) 단위로 최대 크기까지 묶습니다. 임베딩 호출이
/// 없으므로 빠른 인덱싱에 적합합니다.
pub struct SizeChunker {
    max_characters: usize,
}

impl SizeChunker {
    /// 최대 청크 크기를 지정하여 생성
    pub fn new(max_characters: usize) -> Self {
        Self {
            max_characters: max_characters.max(1),
        }
    }

    /// 기본 설정으로 생성
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_MAX_CHARACTERS)
    }

    /// 최대 크기를 넘는 문단을 문장 경계에서 분할
    fn split_long_paragraph(&self, para: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();

        for sentence in split_sentences(para) {
            if !current.is_empty() && current.len() + sentence.len() + 1 > self.max_characters {
                chunks.push(current.clone());
                current.clear();
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&sentence);
        }

        if !current.is_empty() {
            chunks.push(current);
        }

        chunks
    }
}

#[async_trait]
impl Chunker for SizeChunker {
    async fn chunk(&self, text: &str) -> Result<Vec<String>> {
        if text.trim().is_empty() {
            return Ok(vec![]);
        }

        let mut chunks: Vec<String> = Vec::new();
        let mut current = String::new();

        for para in text.split("\n\n") {
            let para = para.trim();
            if para.is_empty() {
                continue;
            }

            if para.len() > self.max_characters {
                if !current.is_empty() {
                    chunks.push(current.clone());
                    current.clear();
                }
                chunks.extend(self.split_long_paragraph(para));
                continue;
            }

            if !current.is_empty() && current.len() + para.len() + 2 > self.max_characters {
                chunks.push(current.clone());
                current.clear();
            }

            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(para);
        }

        if !current.is_empty() {
            chunks.push(current);
        }

        Ok(chunks)
    }

    fn name(&self) -> &'static str {
        "SizeChunker"
    }
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 고정 크기 청커 생성 (기본 설정)
pub fn size_chunker() -> Box<dyn Chunker> {
    Box::new(SizeChunker::with_defaults())
}

/// 시맨틱 청커 생성
pub fn semantic_chunker(
    embedder: Arc<dyn EmbeddingProvider>,
    target_chunks: usize,
) -> Box<dyn Chunker> {
    Box::new(SemanticChunker::new(embedder, target_chunks))
}

// ============================================================================
// Tests
// ============================================================================
