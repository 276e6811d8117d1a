//! LLM 모듈 - Gemini API를 통한 텍스트 생성
//!
//! RAG 답변 생성과 평가 심사에 사용하는 Gemini generateContent
//! 클라이언트입니다. 429 에러는 지수 백오프로 재시도하고,
//! 그 외 에러는 즉시 전파합니다.
//! source: https://ai.google.dev/gemini-api/docs/text-generation

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::embedding::get_api_key;

/// 기본 생성 모델
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// 429 에러 시 최대 재시도 횟수
const MAX_RETRIES: u32 = 3;
/// 재시도 시 초기 백오프 (ms)
const INITIAL_BACKOFF_MS: u64 = 2000;
/// 호출 간 최소 딜레이 (ms)
const MIN_DELAY_MS: u64 = 1000;

// ============================================================================
// Error
// ============================================================================

/// LLM 호출 실패 유형
#[derive(Debug, Error)]
pub enum LlmError {
    /// 429 - 재시도 대상
    #[error("rate limit exceeded (429)")]
    RateLimited,

    /// API가 반환한 에러 - 즉시 실패
    #[error("Gemini API error ({status}): {message}")]
    Api { status: String, message: String },

    /// 후보 텍스트가 비어있는 응답
    #[error("empty response from model")]
    EmptyResponse,
}

// ============================================================================
// TextGenerator Trait
// ============================================================================

/// 텍스트 생성 트레이트
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// 프롬프트에 대한 텍스트 생성
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// 생성기 이름
    fn name(&self) -> &str;
}

// ============================================================================
// GeminiGenerator
// ============================================================================

/// Google Gemini 텍스트 생성 구현체
#[derive(Debug)]
pub struct GeminiGenerator {
    api_key: String,
    client: reqwest::Client,
    model: String,
    last_request: Mutex<Option<Instant>>,
}

impl GeminiGenerator {
    /// 새 생성기 생성
    pub fn new(api_key: String, model: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            client,
            model: model.into(),
            last_request: Mutex::new(None),
        })
    }

    /// 환경변수에서 API 키를 읽어 기본 모델로 생성
    pub fn from_env() -> Result<Self> {
        Self::new(get_api_key()?, DEFAULT_MODEL)
    }

    /// 생성 API 엔드포인트
    fn endpoint(&self) -> String {
        format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        )
    }

    /// 호출 간 최소 딜레이 보장
    async fn pace(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(t) = *last {
            let elapsed = t.elapsed();
            let min_delay = Duration::from_millis(MIN_DELAY_MS);
            if elapsed < min_delay {
                tokio::time::sleep(min_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// 단일 생성 요청 (재시도 없음)
    async fn request_once(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![GenerateContent {
                parts: vec![GeneratePart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                max_output_tokens: 2048,
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send generation request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if status.as_u16() == 429 {
            return Err(LlmError::RateLimited.into());
        }

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<GeminiError>(&body) {
                return Err(LlmError::Api {
                    status: error.error.status,
                    message: error.error.message,
                }
                .into());
            }
            return Err(LlmError::Api {
                status: status.to_string(),
                message: body,
            }
            .into());
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&body).context("Failed to parse generation response")?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse.into());
        }

        Ok(text)
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let mut last_error: Option<anyhow::Error> = None;

        for attempt in 0..=MAX_RETRIES {
            self.pace().await;

            match self.request_once(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    // 429만 재시도, 나머지는 즉시 전파
                    let retryable = matches!(e.downcast_ref::<LlmError>(), Some(LlmError::RateLimited));
                    if retryable && attempt < MAX_RETRIES {
                        let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
                        tracing::warn!(
                            "Rate limit hit (429), backing off {:?} (attempt {}/{})",
                            backoff,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        last_error = Some(e);
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("Generation failed after {} retries", MAX_RETRIES)))
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<GenerateContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GenerateContent {
    parts: Vec<GeneratePart>,
}

#[derive(Debug, Serialize)]
struct GeneratePart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<TextPart>,
}

#[derive(Debug, Deserialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    #[serde(default)]
    status: String,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_includes_model() {
        let generator = GeminiGenerator::new("fake_key".to_string(), "gemini-2.0-flash").unwrap();
        assert!(generator.endpoint().contains("gemini-2.0-flash:generateContent"));
        assert_eq!(generator.name(), "gemini-2.0-flash");
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "hello"}]}}
            ]
        }"#;
        let parsed: GenerateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.candidates.len(), 1);
        assert_eq!(parsed.candidates[0].content.parts[0].text, "hello");
    }

    #[test]
    fn test_response_parsing_no_candidates() {
        let parsed: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.candidates.is_empty());
    }

    #[test]
    fn test_llm_error_display() {
        assert_eq!(LlmError::RateLimited.to_string(), "rate limit exceeded (429)");
        let api = LlmError::Api {
            status: "INVALID_ARGUMENT".to_string(),
            message: "bad request".to_string(),
        };
        assert!(api.to_string().contains("INVALID_ARGUMENT"));
    }
}
