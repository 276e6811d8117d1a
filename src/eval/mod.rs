//! Eval 모듈 - 테스트셋 생성 및 RAG 품질 평가
//!
//! 저장된 문서에서 LLM으로 질문/정답 테스트셋을 생성하고,
//! RAG 파이프라인의 답변을 채운 뒤 세 가지 LLM 심사 메트릭으로
//! 평가합니다:
//! - context_precision: 검색된 컨텍스트가 질문과 얼마나 관련 있는가
//! - context_recall: 정답을 뒷받침할 정보가 컨텍스트에 있는가
//! - answer_correctness: 생성된 답변이 정답과 일치하는가

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::knowledge::Document;
use crate::llm::TextGenerator;
use crate::qa::QaEngine;

/// 테스트셋 생성에 사용할 문서의 최소 본문 길이
const MIN_CONTENT_CHARS: usize = 100;

// ============================================================================
// Types
// ============================================================================

/// 생성된 테스트 케이스
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub question: String,
    /// 문서에서 도출한 정답
    pub ground_truth: String,
    /// 출처 문서 (소스 경로 + 페이지)
    pub source: String,
}

/// RAG 답변이 채워진 평가 레코드
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalRecord {
    pub question: String,
    pub ground_truth: String,
    pub answer: String,
    pub context: String,
}

/// 레코드별 메트릭 스코어 (0.0 ~ 1.0)
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RecordScores {
    pub context_precision: f32,
    pub context_recall: f32,
    pub answer_correctness: f32,
}

/// 스코어가 부여된 평가 레코드
#[derive(Debug, Clone, Serialize)]
pub struct ScoredRecord {
    #[serde(flatten)]
    pub record: EvalRecord,
    #[serde(flatten)]
    pub scores: RecordScores,
}

/// 평가 요약 (메트릭별 평균)
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EvalSummary {
    pub case_count: usize,
    pub context_precision: f32,
    pub context_recall: f32,
    pub answer_correctness: f32,
}

/// 평가 리포트
#[derive(Debug, Serialize)]
pub struct EvalReport {
    /// 심사에 사용한 모델 이름
    pub judge_model: String,
    pub summary: EvalSummary,
    pub cases: Vec<ScoredRecord>,
}

/// LLM이 생성한 질문/정답 쌍
#[derive(Debug, Deserialize)]
struct GeneratedPair {
    question: String,
    answer: String,
}

// ============================================================================
// Test Set Generation
// ============================================================================

/// 저장된 문서에서 테스트셋 생성
///
/// 문서 목록에서 고르게 샘플링한 페이지마다 LLM에 질문/정답 쌍을
/// 요청합니다. 파싱에 실패한 출력은 건너뛰고 경고를 남기므로
/// 결과가 `test_size`보다 적을 수 있습니다.
pub async fn generate_test_set(
    docs: &[Document],
    test_size: usize,
    llm: &dyn TextGenerator,
) -> Result<Vec<TestCase>> {
    let usable: Vec<&Document> = docs
        .iter()
        .filter(|d| d.content.trim().len() >= MIN_CONTENT_CHARS)
        .collect();

    if usable.is_empty() {
        anyhow::bail!("No documents with enough content to generate a test set");
    }

    let indices = sample_indices(usable.len(), test_size);
    let mut cases = Vec::with_capacity(indices.len());

    for index in indices {
        let doc = usable[index];
        let prompt = testset_prompt(&doc.content);

        let output = llm
            .generate(&prompt)
            .await
            .context("Failed to generate test case")?;

        match serde_json::from_str::<GeneratedPair>(strip_code_fence(&output)) {
            Ok(pair) => {
                let page = doc.page.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
                cases.push(TestCase {
                    question: pair.question,
                    ground_truth: pair.answer,
                    source: format!("{} page {}", doc.source, page),
                });
            }
            Err(e) => {
                tracing::warn!("Skipping malformed test case output (doc id={}): {}", doc.id, e);
            }
        }
    }

    if cases.len() < test_size {
        tracing::warn!(
            "Generated {} of {} requested test cases",
            cases.len(),
            test_size
        );
    }

    Ok(cases)
}

/// 테스트셋에 RAG 답변 채우기
pub async fn add_rag_answers(cases: &[TestCase], engine: &QaEngine) -> Result<Vec<EvalRecord>> {
    let mut records = Vec::with_capacity(cases.len());

    for (i, case) in cases.iter().enumerate() {
        tracing::info!("Answering test case {}/{}", i + 1, cases.len());

        let rag_answer = engine
            .ask(&case.question)
            .await
            .with_context(|| format!("Failed to answer test question: {}", case.question))?;

        records.push(EvalRecord {
            question: case.question.clone(),
            ground_truth: case.ground_truth.clone(),
            answer: rag_answer.answer,
            context: rag_answer.context,
        });
    }

    Ok(records)
}

// ============================================================================
// Evaluation
// ============================================================================

/// 평가 레코드를 세 메트릭으로 심사
///
/// 심사 출력에서 스코어를 파싱하지 못하면 해당 메트릭은 0.0으로
/// 기록하고 경고를 남깁니다.
pub async fn evaluate_records(
    records: &[EvalRecord],
    llm: &dyn TextGenerator,
) -> Result<EvalReport> {
    let mut cases = Vec::with_capacity(records.len());

    for (i, record) in records.iter().enumerate() {
        tracing::info!("Judging record {}/{}", i + 1, records.len());

        let scores = RecordScores {
            context_precision: judge(
                llm,
                &context_precision_prompt(&record.question, &record.context),
                "context_precision",
            )
            .await?,
            context_recall: judge(
                llm,
                &context_recall_prompt(&record.ground_truth, &record.context),
                "context_recall",
            )
            .await?,
            answer_correctness: judge(
                llm,
                &answer_correctness_prompt(&record.question, &record.ground_truth, &record.answer),
                "answer_correctness",
            )
            .await?,
        };

        cases.push(ScoredRecord {
            record: record.clone(),
            scores,
        });
    }

    let summary = EvalSummary {
        case_count: cases.len(),
        context_precision: mean(cases.iter().map(|c| c.scores.context_precision)),
        context_recall: mean(cases.iter().map(|c| c.scores.context_recall)),
        answer_correctness: mean(cases.iter().map(|c| c.scores.answer_correctness)),
    };

    Ok(EvalReport {
        judge_model: llm.name().to_string(),
        summary,
        cases,
    })
}

/// 리포트를 JSON 파일로 저장
pub fn write_report(report: &EvalReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).context("Failed to create report directory")?;
        }
    }

    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write report: {:?}", path))?;

    tracing::info!("Wrote evaluation report to {:?}", path);
    Ok(())
}

/// 단일 메트릭 심사 호출
async fn judge(llm: &dyn TextGenerator, prompt: &str, metric: &str) -> Result<f32> {
    let output = llm
        .generate(prompt)
        .await
        .with_context(|| format!("Failed to judge metric: {}", metric))?;

    Ok(parse_score(&output).unwrap_or_else(|| {
        tracing::warn!("Unparseable {} judge output: {:?}", metric, output);
        0.0
    }))
}

// ============================================================================
// Prompts
// ============================================================================

/// 테스트 케이스 생성 프롬프트
fn testset_prompt(document: &str) -> String {
    format!(
        "You are building a question-answering test set.\n\
         Read the document below and write one factual question that can be \
         answered from it, together with the correct answer.\n\
         Respond with JSON only, in the form \
         {{\"question\": \"...\", \"answer\": \"...\"}}.\n\n\
         Document:\n{}",
        document
    )
}

fn context_precision_prompt(question: &str, context: &str) -> String {
    format!(
        "Rate how much of the retrieved context below is relevant to answering \
         the question. Respond with a single number between 0 and 1, \
         where 1 means everything is relevant and 0 means nothing is.\n\n\
         Question:\n{}\n\nContext:\n{}\n\nScore:",
        question, context
    )
}

fn context_recall_prompt(ground_truth: &str, context: &str) -> String {
    format!(
        "Rate whether the retrieved context below contains the information \
         needed to support the reference answer. Respond with a single number \
         between 0 and 1, where 1 means fully supported and 0 means not at all.\n\n\
         Reference answer:\n{}\n\nContext:\n{}\n\nScore:",
        ground_truth, context
    )
}

fn answer_correctness_prompt(question: &str, ground_truth: &str, answer: &str) -> String {
    format!(
        "Rate whether the candidate answer matches the reference answer for the \
         question. Respond with a single number between 0 and 1, where 1 means \
         factually equivalent and 0 means completely wrong.\n\n\
         Question:\n{}\n\nReference answer:\n{}\n\nCandidate answer:\n{}\n\nScore:",
        question, ground_truth, answer
    )
}

// ============================================================================
// Helper Functions
// ============================================================================

/// n개 중 count개를 고르게 샘플링한 인덱스 (오름차순)
fn sample_indices(len: usize, count: usize) -> Vec<usize> {
    if len == 0 || count == 0 {
        return vec![];
    }

    if count >= len {
        return (0..len).collect();
    }

    let step = len as f64 / count as f64;
    (0..count).map(|i| (i as f64 * step) as usize).collect()
}

/// 심사 출력에서 0~1 스코어 파싱
///
/// 전체가 숫자면 그대로, 아니면 첫 번째 숫자를 추출합니다.
/// 범위를 벗어난 값은 0~1로 클램프합니다.
fn parse_score(text: &str) -> Option<f32> {
    let trimmed = text.trim();

    if let Ok(value) = trimmed.parse::<f32>() {
        return Some(value.clamp(0.0, 1.0));
    }

    let number = regex::Regex::new(r"\d+(?:\.\d+)?")
        .expect("Invalid regex")
        .find(trimmed)?;

    number.as_str().parse::<f32>().ok().map(|v| v.clamp(0.0, 1.0))
}

/// 코드 펜스 제거 (```json ... ``` 형태의 출력 허용)
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();

    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    let rest = rest.trim_start();
    rest.strip_suffix("```").map(str::trim_end).unwrap_or(rest)
}

/// 평균 계산 (빈 입력은 0.0)
fn mean(values: impl Iterator<Item = f32>) -> f32 {
    let collected: Vec<f32> = values.collect();
    if collected.is_empty() {
        return 0.0;
    }
    collected.iter().sum::<f32>() / collected.len() as f32
}

// ============================================================================
// Tests
// ============================================================================
