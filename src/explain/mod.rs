//! Explain 모듈 - 답변 근거 설명 및 하이라이트
//!
//! RAG 답변이 어느 컨텍스트에 근거했는지 사람이 읽을 수 있는 HTML
//! 조각으로 구성합니다. 유사도 검색 결과를 스코어 기준으로 필터링하고,
//! 출처/페이지 헤더를 붙인 뒤, 질문/답변/컨텍스트의 매칭 용어를
//! 하이라이트합니다.

mod highlight;
mod stopwords;

use anyhow::Result;
use async_trait::async_trait;

pub use highlight::highlight_matching_terms;
pub use stopwords::is_stopword;

// ============================================================================
// Types
// ============================================================================

/// 패시지 출처 메타데이터
///
/// 값이 없는 키는 에러가 아니며, 표시 시 플레이스홀더로 렌더링됩니다.
#[derive(Debug, Clone, Default)]
pub struct PassageMetadata {
    /// 원본 파일 경로 또는 식별자
    pub source: Option<String>,
    /// 페이지 번호 (1부터 시작)
    pub page: Option<i64>,
}

/// 유사도 스코어가 부여된 컨텍스트 패시지
#[derive(Debug, Clone)]
pub struct ScoredPassage {
    /// 패시지 본문
    pub content: String,
    /// 유사도 스코어 (높을수록 관련성 높음)
    pub score: f32,
    /// 출처 메타데이터
    pub metadata: PassageMetadata,
}

// ============================================================================
// ContextSearcher Trait
// ============================================================================

/// 유사도 검색 콜라보레이터 트레이트
///
/// 질문과 관련된 패시지를 스코어와 함께 반환합니다.
/// 정렬은 구현체 책임이며, 포매터는 반환된 순서를 그대로 사용합니다.
#[async_trait]
pub trait ContextSearcher: Send + Sync {
    /// 질문으로 패시지 검색
    async fn search_with_scores(&self, question: &str) -> Result<Vec<ScoredPassage>>;
}

// ============================================================================
// Answer Formatter
// ============================================================================

/// 메타데이터 값이 없을 때의 표시 문자열
const MISSING_FIELD: &str = "-";

/// 답변을 근거 컨텍스트와 함께 HTML 조각으로 포매팅
///
/// 1. `searcher`로 질문 관련 패시지를 검색합니다.
/// 2. 스코어가 `score_threshold`보다 큰 패시지만 유지합니다 (초과 조건).
/// 3. 유지된 패시지마다 순번, 스코어(소수점 3자리), 출처/페이지 헤더를
///    붙여 컨텍스트 블록을 만듭니다.
/// 4. 질문/답변/컨텍스트의 매칭 용어를 하이라이트합니다.
/// 5. 줄바꿈을 `<br>` 마커로 변환해 최종 문자열을 조립합니다.
///
/// 검색 실패는 그대로 전파됩니다. 패시지가 하나도 없으면 컨텍스트
/// 섹션이 빈 채로 질문/답변만 포함된 결과를 반환합니다.
pub async fn format_answer(
    question: &str,
    answer: &str,
    searcher: &dyn ContextSearcher,
    score_threshold: f32,
) -> Result<String> {
    let passages = searcher.search_with_scores(question).await?;

    let mut format_context = String::new();
    let mut kept = 0usize;

    for passage in &passages {
        if passage.score <= score_threshold {
            continue;
        }
        kept += 1;

        let source = passage.metadata.source.as_deref().unwrap_or(MISSING_FIELD);
        let page = passage
            .metadata
            .page
            .map(|p| p.to_string())
            .unwrap_or_else(|| MISSING_FIELD.to_string());

        // 헤더와 본문은 일반 텍스트로 조립하고, 줄바꿈 마커 변환은
        // 하이라이트(이스케이프) 이후에 수행한다
        format_context.push_str(&format!(
            "Context {} (score: {:.3})\nSource {} page {}\nContent:\n{}\n\n",
            kept, passage.score, source, page, passage.content
        ));
    }

    let (lit_question, lit_answer, lit_context) =
        highlight_matching_terms(question, answer, &format_context);

    // 문단 경계 → <br><br>, 줄 경계 → <br>
    let lit_context = lit_context.replace("\n\n", "<br><br>").replace('\n', "<br>");

    Ok(format!(
        "Question: <br>{}<br><br>\nAnswer: <br>{}\n<br><br>\n{}",
        lit_question, lit_answer, lit_context
    ))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// 고정된 패시지 목록을 반환하는 테스트용 검색기
    struct FixedSearcher {
        passages: Vec<ScoredPassage>,
    }

    #[async_trait]
    impl ContextSearcher for FixedSearcher {
        async fn search_with_scores(&self, _question: &str) -> Result<Vec<ScoredPassage>> {
            Ok(self.passages.clone())
        }
    }

    /// 항상 실패하는 테스트용 검색기
    struct FailingSearcher;

    #[async_trait]
    impl ContextSearcher for FailingSearcher {
        async fn search_with_scores(&self, _question: &str) -> Result<Vec<ScoredPassage>> {
            anyhow::bail!("vector store unavailable")
        }
    }

    fn passage(content: &str, score: f32, source: Option<&str>, page: Option<i64>) -> ScoredPassage {
        ScoredPassage {
            content: content.to_string(),
            score,
            metadata: PassageMetadata {
                source: source.map(str::to_string),
                page,
            },
        }
    }

    #[tokio::test]
    async fn test_threshold_filters_passages() {
        let searcher = FixedSearcher {
            passages: vec![
                passage("alpha text", 0.9, Some("a.pdf"), Some(1)),
                passage("beta text", 0.4, Some("b.pdf"), Some(2)),
                passage("gamma text", 0.6, Some("c.pdf"), Some(3)),
            ],
        };

        let out = format_answer("question", "answer", &searcher, 0.5).await.unwrap();

        assert!(out.contains("alpha"));
        assert!(out.contains("gamma"));
        assert!(!out.contains("beta"));
        // 유지된 패시지 기준 연속 순번
        assert!(out.contains("Context 1 (score: 0.900)"));
        assert!(out.contains("Context 2 (score: 0.600)"));
        assert!(!out.contains("Context 3"));
    }

    #[tokio::test]
    async fn test_score_rounded_to_three_decimals() {
        let searcher = FixedSearcher {
            passages: vec![passage("text", 0.123_456, Some("a.pdf"), Some(1))],
        };

        let out = format_answer("question", "answer", &searcher, 0.0).await.unwrap();
        assert!(out.contains("(score: 0.123)"));
    }

    #[tokio::test]
    async fn test_missing_metadata_rendered_as_placeholder() {
        let searcher = FixedSearcher {
            passages: vec![passage("text", 0.8, None, None)],
        };

        let out = format_answer("question", "answer", &searcher, 0.0).await.unwrap();
        assert!(out.contains("Source - page -"));
    }

    #[tokio::test]
    async fn test_empty_results_keep_question_and_answer() {
        let searcher = FixedSearcher { passages: vec![] };

        let out = format_answer("my question", "my answer", &searcher, 0.5).await.unwrap();
        assert!(out.contains("Question: <br>my question"));
        assert!(out.contains("Answer: <br>my answer"));
        assert!(!out.contains("Context 1"));
    }

    #[tokio::test]
    async fn test_searcher_error_propagated() {
        let result = format_answer("q", "a", &FailingSearcher, 0.5).await;
        assert!(result.is_err());
        let err = result.err();
        assert!(err
            .as_ref()
            .map(|e| e.to_string().contains("vector store unavailable"))
            .unwrap_or(false));
    }

    #[tokio::test]
    async fn test_passage_order_preserved() {
        // 포매터는 재정렬하지 않음 - 검색기가 반환한 순서 그대로
        let searcher = FixedSearcher {
            passages: vec![
                passage("first passage", 0.6, Some("a.pdf"), Some(1)),
                passage("second passage", 0.9, Some("b.pdf"), Some(2)),
            ],
        };

        let out = format_answer("question", "answer", &searcher, 0.5).await.unwrap();
        let first = out.find("first").unwrap();
        let second = out.find("second").unwrap();
        assert!(first < second);
        assert!(out.contains("Context 1 (score: 0.600)"));
        assert!(out.contains("Context 2 (score: 0.900)"));
    }

    #[tokio::test]
    async fn test_matching_terms_highlighted_in_output() {
        let searcher = FixedSearcher {
            passages: vec![passage("cat food is on sale", 0.9, Some("shop.pdf"), Some(4))],
        };

        let out = format_answer("cat food", "cat food is tasty", &searcher, 0.5)
            .await
            .unwrap();
        // 질문/답변/컨텍스트 모두에 등장하는 용어는 이중 매칭 색상
        assert!(out.contains("<span style='background-color: lightgreen'>cat</span>"));
        assert!(out.contains("<span style='background-color: yellow'>cat</span>"));
        assert!(out.contains("<span style='background-color: lightblue'>cat</span>"));
    }

    #[tokio::test]
    async fn test_paragraph_breaks_become_markers() {
        let searcher = FixedSearcher {
            passages: vec![passage("para one\n\npara two", 0.9, Some("a.pdf"), Some(1))],
        };

        let out = format_answer("question", "answer", &searcher, 0.0).await.unwrap();
        assert!(out.contains("para one<br><br>para two"));
    }
}
