//! QA 모듈 - RAG 답변 파이프라인
//!
//! 질문을 받아 관련 청크를 검색하고, 컨텍스트 제한 프롬프트로
//! LLM 답변을 생성합니다. 답변 근거 설명(HTML)은 explain 모듈의
//! 포매터에 위임합니다.

use anyhow::{Context, Result};

use crate::explain::{format_answer, ContextSearcher, ScoredPassage};
use crate::knowledge::Retriever;
use crate::llm::TextGenerator;

// ============================================================================
// Types
// ============================================================================

/// RAG 답변 결과
#[derive(Debug, Clone)]
pub struct RagAnswer {
    /// 생성된 답변
    pub answer: String,
    /// 답변 생성에 사용된 컨텍스트 (패시지 본문 연결)
    pub context: String,
}

// ============================================================================
// QaEngine
// ============================================================================

/// RAG 질의응답 엔진
///
/// Retriever(검색)와 TextGenerator(생성)를 조합합니다.
pub struct QaEngine {
    retriever: Retriever,
    generator: Box<dyn TextGenerator>,
}

impl QaEngine {
    /// 새 엔진 생성
    pub fn new(retriever: Retriever, generator: Box<dyn TextGenerator>) -> Self {
        Self {
            retriever,
            generator,
        }
    }

    /// 질문에 대한 RAG 답변 생성
    ///
    /// 검색된 컨텍스트만으로 답변하도록 프롬프트를 구성합니다.
    /// 컨텍스트에 답이 없으면 모델이 그렇게 말하도록 지시합니다.
    pub async fn ask(&self, question: &str) -> Result<RagAnswer> {
        let passages = self
            .retriever
            .search_with_scores(question)
            .await
            .context("Failed to retrieve context")?;

        let context = format_docs(&passages);
        let prompt = build_prompt(&context, question);

        tracing::debug!(
            "Generating answer with {} context passages ({} chars)",
            passages.len(),
            context.len()
        );

        let answer = self
            .generator
            .generate(&prompt)
            .await
            .context("Failed to generate answer")?;

        Ok(RagAnswer {
            answer: answer.trim().to_string(),
            context,
        })
    }

    /// 답변 + 근거 하이라이트 HTML 생성
    ///
    /// `ask`로 답변을 만든 뒤, 스코어가 `score_threshold`를 넘는
    /// 패시지를 출처 헤더와 함께 하이라이트하여 조립합니다.
    pub async fn explain(&self, question: &str, score_threshold: f32) -> Result<String> {
        let rag_answer = self.ask(question).await?;

        format_answer(question, &rag_answer.answer, &self.retriever, score_threshold).await
    }

    /// 내부 검색기 접근
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 패시지 본문을 이중 줄바꿈으로 연결
pub fn format_docs(passages: &[ScoredPassage]) -> String {
    passages
        .iter()
        .map(|p| p.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 컨텍스트 제한 답변 프롬프트 구성
fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Answer the question based only on the supplied context. \
         If you don't know the answer from just the context, \
         say 'the answer is not provided in the context'.\n\
         Context: {}\n\
         Question: {}\n\
         Your answer:",
        context, question
    )
}

// ============================================================================
// Tests
// ============================================================================
