//! PDF 텍스트 추출
//!
//! pdf-extract 크레이트로 PDF 전체 텍스트를 추출한 뒤
//! 폼피드 문자 또는 페이지 구분자 패턴으로 페이지를 분리합니다.

use std::path::Path;

use anyhow::{Context, Result};

/// 추출된 PDF 페이지
#[derive(Debug, Clone)]
pub struct PdfPage {
    /// 페이지 번호 (1부터 시작)
    pub number: usize,
    /// 페이지 텍스트
    pub text: String,
}

/// PDF에서 페이지별 텍스트 추출
///
/// 텍스트가 전혀 추출되지 않으면 (스캔 문서 등) 빈 1페이지를
/// 반환하고 경고를 남깁니다.
pub fn extract_pages(path: &Path) -> Result<Vec<PdfPage>> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read PDF: {:?}", path))?;

    let text = pdf_extract::extract_text_from_mem(&bytes)
        .with_context(|| format!("Failed to extract text from PDF: {:?}", path))?;

    if text.trim().is_empty() {
        tracing::warn!(
            "No text extracted from PDF: {:?}. It might be a scanned document.",
            path
        );
        return Ok(vec![PdfPage {
            number: 1,
            text: String::new(),
        }]);
    }

    Ok(split_pages(&text)
        .into_iter()
        .enumerate()
        .map(|(i, text)| PdfPage {
            number: i + 1,
            text,
        })
        .collect())
}

/// PDF 텍스트를 페이지별로 분리
fn split_pages(text: &str) -> Vec<String> {
    // 폼피드 문자 (\x0c)로 페이지 분리 시도
    let pages: Vec<String> = text
        .split('\x0c')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if pages.len() > 1 {
        return pages;
    }

    // 일부 PDF가 사용하는 페이지 구분자 패턴으로 시도
    // 예: "--- Page 1 ---"
    let page_pattern = regex::Regex::new(r"(?m)^[\s]*[-=]+[\s]*(?:Page[\s]*)?(\d+)[\s]*[-=]+[\s]*$")
        .expect("Invalid regex");

    if page_pattern.is_match(text) {
        let pages: Vec<String> = page_pattern
            .split(text)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if pages.len() > 1 {
            return pages;
        }
    }

    // 분리 실패 - 전체를 하나의 페이지로
    vec![text.to_string()]
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_pages_with_formfeed() {
        let text = "Page 1 content\x0cPage 2 content\x0cPage 3 content";
        let pages = split_pages(text);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0], "Page 1 content");
        assert_eq!(pages[2], "Page 3 content");
    }

    #[test]
    fn test_split_pages_with_separator_line() {
        let text = "first page\n--- Page 2 ---\nsecond page";
        let pages = split_pages(text);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0], "first page");
        assert_eq!(pages[1], "second page");
    }

    #[test]
    fn test_split_pages_no_separator() {
        let text = "Just some text without page breaks";
        let pages = split_pages(text);
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn test_page_numbers_are_one_based() {
        let text = "a\x0cb";
        let pages: Vec<PdfPage> = split_pages(text)
            .into_iter()
            .enumerate()
            .map(|(i, text)| PdfPage { number: i + 1, text })
            .collect();
        assert_eq!(pages[0].number, 1);
        assert_eq!(pages[1].number, 2);
    }
}
