//! 매칭 용어 하이라이트
//!
//! 질문/답변/컨텍스트 세 문자열에서 서로 겹치는 (불용어 제외) 용어를
//! 배경색 span으로 표시합니다.
//! - yellow: 질문 ↔ 컨텍스트 매칭
//! - lightblue: 답변 ↔ 컨텍스트 매칭
//! - lightgreen: 질문과 답변 모두에 등장하는 이중 매칭
//!
//! 매칭은 공백 구분 토큰 단위, 대소문자 무시로 판정합니다.
//! 출력 문자열의 원문 텍스트는 HTML 이스케이프 외에는 변경되지 않습니다.

use std::collections::{HashMap, HashSet};

use super::stopwords::is_stopword;

/// 질문-컨텍스트 매칭 색상
const QUERY_COLOR: &str = "yellow";
/// 답변-컨텍스트 매칭 색상
const ANSWER_COLOR: &str = "lightblue";
/// 이중 매칭 색상 (질문 + 답변)
const DOUBLE_COLOR: &str = "lightgreen";

/// 용어의 매칭 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchKind {
    /// 질문과 컨텍스트에만 등장
    Query,
    /// 답변과 컨텍스트에만 등장
    Answer,
    /// 질문, 답변, 컨텍스트 모두에 등장
    Double,
}

/// 질문/답변/컨텍스트의 매칭 용어를 하이라이트
///
/// 세 입력 문자열을 받아 매칭된 용어가 span으로 감싸진 새 문자열을
/// (질문, 답변, 컨텍스트) 순서로 반환합니다. 입력은 변경하지 않습니다.
///
/// 같은 용어는 호출 내에서 항상 같은 색상을 받습니다. 질문과 답변에
/// 모두 등장하는 용어는 컨텍스트에서 이중 매칭 색상으로 승격됩니다.
pub fn highlight_matching_terms(
    query: &str,
    answer: &str,
    context: &str,
) -> (String, String, String) {
    let context_tokens = token_set(context);

    // 컨텍스트와 겹치는 용어 수집 (소문자 기준, 중복 제거)
    let query_terms = matching_terms(query, &context_tokens);
    let answer_terms = matching_terms(answer, &context_tokens);

    // 용어별 매칭 종류 결정
    let mut kinds: HashMap<String, MatchKind> = HashMap::new();
    for term in query_terms {
        kinds.insert(term, MatchKind::Query);
    }
    for term in answer_terms {
        kinds
            .entry(term)
            .and_modify(|kind| *kind = MatchKind::Double)
            .or_insert(MatchKind::Answer);
    }

    let lit_query = annotate(query, |term| match kinds.get(term) {
        Some(MatchKind::Query) | Some(MatchKind::Double) => Some(QUERY_COLOR),
        _ => None,
    });

    let lit_answer = annotate(answer, |term| match kinds.get(term) {
        Some(MatchKind::Answer) | Some(MatchKind::Double) => Some(ANSWER_COLOR),
        _ => None,
    });

    let lit_context = annotate(context, |term| {
        kinds.get(term).map(|kind| match kind {
            MatchKind::Query => QUERY_COLOR,
            MatchKind::Answer => ANSWER_COLOR,
            MatchKind::Double => DOUBLE_COLOR,
        })
    });

    (lit_query, lit_answer, lit_context)
}

/// 텍스트의 공백 구분 토큰을 소문자 집합으로 수집
fn token_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// 컨텍스트 토큰과 일치하는 불용어 아닌 용어 수집 (소문자, 중복 제거)
fn matching_terms(text: &str, context_tokens: &HashSet<String>) -> HashSet<String> {
    text.split_whitespace()
        .map(str::to_lowercase)
        .filter(|term| !is_stopword(term) && context_tokens.contains(term))
        .collect()
}

/// 단일 패스 토큰 주석 처리
///
/// 공백 토큰 단위로 순회하면서 `color_for`가 색상을 반환한 토큰을
/// span으로 감쌉니다. 공백과 토큰 순서는 그대로 유지되며, 토큰 텍스트는
/// HTML 이스케이프됩니다. 이미 감싼 토큰을 다시 감싸지 않으므로
/// 중첩 주석이 발생하지 않습니다.
fn annotate<F>(text: &str, color_for: F) -> String
where
    F: Fn(&str) -> Option<&'static str>,
{
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while !rest.is_empty() {
        // 선행 공백은 그대로 복사
        let token_start = rest
            .find(|c: char| !c.is_whitespace())
            .unwrap_or(rest.len());
        out.push_str(&rest[..token_start]);
        rest = &rest[token_start..];
        if rest.is_empty() {
            break;
        }

        let token_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let token = &rest[..token_end];
        let escaped = escape_html(token);

        match color_for(token.to_lowercase().as_str()) {
            Some(color) => {
                out.push_str("<span style='background-color: ");
                out.push_str(color);
                out.push_str("'>");
                out.push_str(&escaped);
                out.push_str("</span>");
            }
            None => out.push_str(&escaped),
        }

        rest = &rest[token_end..];
    }

    out
}

/// HTML 특수 문자 이스케이프
///
/// 신뢰할 수 없는 텍스트를 HTML 조각에 삽입하기 전에 호출합니다.
pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn span(color: &str, term: &str) -> String {
        format!("<span style='background-color: {}'>{}</span>", color, term)
    }

    #[test]
    fn test_no_match_returns_inputs_unchanged() {
        let (q, a, c) = highlight_matching_terms(
            "quantum physics",
            "irrelevant reply",
            "cooking recipes and baking tips",
        );
        assert_eq!(q, "quantum physics");
        assert_eq!(a, "irrelevant reply");
        assert_eq!(c, "cooking recipes and baking tips");
    }

    #[test]
    fn test_stopwords_never_highlighted() {
        let (q, _, c) = highlight_matching_terms(
            "the cat sat",
            "irrelevant",
            "the cat sat on the mat",
        );
        assert!(!q.contains("<span style='background-color: yellow'>the</span>"));
        assert!(!c.contains("<span style='background-color: yellow'>the</span>"));
        // 불용어 아닌 용어는 하이라이트됨
        assert!(q.contains(&span("yellow", "cat")));
        assert!(c.contains(&span("yellow", "cat")));
    }

    #[test]
    fn test_query_match_highlights_both_strings() {
        let (q, a, c) = highlight_matching_terms("cat", "nothing", "a cat appears");
        assert_eq!(q, span("yellow", "cat"));
        assert_eq!(a, "nothing");
        assert!(c.contains(&span("yellow", "cat")));
    }

    #[test]
    fn test_answer_match_highlights_answer_and_context() {
        let (q, a, c) = highlight_matching_terms("unrelated", "cat", "a cat appears");
        assert_eq!(q, "unrelated");
        assert_eq!(a, span("lightblue", "cat"));
        assert!(c.contains(&span("lightblue", "cat")));
    }

    #[test]
    fn test_double_match_upgrades_context_color() {
        let (q, a, c) = highlight_matching_terms(
            "cat food",
            "cat food is tasty",
            "cat food is on sale",
        );
        // 질문은 노란색, 답변은 파란색
        assert!(q.contains(&span("yellow", "cat")));
        assert!(q.contains(&span("yellow", "food")));
        assert!(a.contains(&span("lightblue", "cat")));
        assert!(a.contains(&span("lightblue", "food")));
        // 컨텍스트에서는 이중 매칭 색상으로 승격
        assert!(c.contains(&span("lightgreen", "cat")));
        assert!(c.contains(&span("lightgreen", "food")));
        assert!(!c.contains(&span("yellow", "cat")));
        assert!(!c.contains(&span("lightblue", "cat")));
    }

    #[test]
    fn test_case_insensitive_matching() {
        let (q, _, c) = highlight_matching_terms("Cat", "nothing", "the CAT sat");
        assert_eq!(q, span("yellow", "Cat"));
        assert!(c.contains(&span("yellow", "CAT")));
    }

    #[test]
    fn test_every_occurrence_wrapped() {
        let (_, _, c) = highlight_matching_terms("cat", "nothing", "cat chases cat");
        assert_eq!(
            c,
            format!("{} chases {}", span("yellow", "cat"), span("yellow", "cat"))
        );
    }

    #[test]
    fn test_duplicate_query_terms_single_annotation() {
        // 질문에 같은 용어가 반복되어도 중첩 span이 생기지 않음
        let (q, _, _) = highlight_matching_terms("cat cat", "nothing", "a cat appears");
        assert_eq!(q, format!("{} {}", span("yellow", "cat"), span("yellow", "cat")));
    }

    #[test]
    fn test_partial_word_not_matched() {
        // "cat"은 "catalog"의 부분 문자열이지만 토큰 단위 매칭에서는 제외
        let (q, _, c) = highlight_matching_terms("cat", "nothing", "the catalog arrived");
        assert_eq!(q, "cat");
        assert_eq!(c, "the catalog arrived");
    }

    #[test]
    fn test_punctuated_token_matched_as_is() {
        // 구두점은 토큰의 일부로 취급
        let (_, _, c) = highlight_matching_terms("cat,", "nothing", "one cat, two dogs");
        assert!(c.contains(&span("yellow", "cat,")));
    }

    #[test]
    fn test_empty_inputs() {
        let (q, a, c) = highlight_matching_terms("", "", "");
        assert_eq!(q, "");
        assert_eq!(a, "");
        assert_eq!(c, "");

        let (q, a, c) = highlight_matching_terms("cat", "", "");
        assert_eq!(q, "cat");
        assert_eq!(a, "");
        assert_eq!(c, "");
    }

    #[test]
    fn test_whitespace_preserved() {
        let (_, _, c) = highlight_matching_terms("cat", "nothing", "a  cat\nappears");
        assert_eq!(c, format!("a  {}\nappears", span("yellow", "cat")));
    }

    #[test]
    fn test_html_escaped() {
        let (q, _, c) =
            highlight_matching_terms("<script>", "nothing", "run <script> now");
        assert_eq!(q, span("yellow", "&lt;script&gt;"));
        assert!(c.contains(&span("yellow", "&lt;script&gt;")));
        assert!(!c.contains("<script>"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a & b"), "a &amp; b");
        assert_eq!(escape_html("<b>\"x\"</b>"), "&lt;b&gt;&quot;x&quot;&lt;/b&gt;");
        assert_eq!(escape_html("it's"), "it&#x27;s");
        assert_eq!(escape_html("plain"), "plain");
    }
}
