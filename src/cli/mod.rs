//! CLI 모듈
//!
//! dokseo-rag CLI 명령어 정의 및 구현

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::embedding::{has_api_key, EmbeddingProvider, GeminiEmbedding};
use crate::eval::{add_rag_answers, evaluate_records, generate_test_set, write_report};
use crate::ingest::{collect_pdfs, extract_pdf_pages, semantic_chunker, size_chunker};
use crate::knowledge::{
    get_data_dir, DocumentStore, LanceVectorStore, NewDocument, Retriever, VectorStore,
};
use crate::llm::GeminiGenerator;
use crate::qa::QaEngine;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "dokseo-rag")]
#[command(version, about = "로컬 PDF RAG 질의응답 시스템", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// PDF 파일 또는 폴더를 지식베이스에 추가
    Ingest {
        /// 수집할 PDF 파일 경로
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// 수집할 폴더 경로 (재귀)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// 페이지당 목표 청크 수 (시맨틱 청킹)
        #[arg(long, default_value = "4")]
        chunks_per_page: usize,

        /// 시맨틱 청킹 대신 고정 크기 청킹 사용 (임베딩 호출 절약)
        #[arg(long)]
        fast: bool,
    },

    /// 질문에 대한 RAG 답변 생성
    Ask {
        /// 질문
        question: String,

        /// 검색할 컨텍스트 개수
        #[arg(short, long, default_value = "4")]
        limit: usize,
    },

    /// 답변 + 근거 컨텍스트 하이라이트 (HTML)
    Explain {
        /// 질문
        question: String,

        /// 검색할 컨텍스트 개수
        #[arg(short, long, default_value = "4")]
        limit: usize,

        /// 컨텍스트 포함 최소 유사도 스코어 (초과 조건)
        #[arg(short, long, default_value = "0.5")]
        threshold: f32,

        /// HTML 출력 파일 경로 (미지정 시 표준 출력)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 테스트셋 생성 및 RAG 품질 평가
    Eval {
        /// 생성할 테스트 케이스 수
        #[arg(short, long, default_value = "10")]
        test_size: usize,

        /// 검색할 컨텍스트 개수
        #[arg(short, long, default_value = "4")]
        limit: usize,

        /// 평가 리포트 출력 경로 (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 저장된 문서 페이지 목록
    List {
        /// 결과 개수 제한
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// 문서 삭제 (ID 또는 소스 경로)
    Delete {
        /// 삭제할 문서 ID
        #[arg(short, long)]
        id: Option<i64>,

        /// 삭제할 소스 경로 (해당 파일의 전체 페이지)
        #[arg(short, long)]
        source: Option<String>,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Ingest {
            file,
            dir,
            chunks_per_page,
            fast,
        } => cmd_ingest(file, dir, chunks_per_page, fast).await,
        Commands::Ask { question, limit } => cmd_ask(&question, limit).await,
        Commands::Explain {
            question,
            limit,
            threshold,
            output,
        } => cmd_explain(&question, limit, threshold, output).await,
        Commands::Eval {
            test_size,
            limit,
            output,
        } => cmd_eval(test_size, limit, output).await,
        Commands::List { limit } => cmd_list(limit).await,
        Commands::Delete { id, source } => cmd_delete(id, source).await,
        Commands::Status => cmd_status().await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// API 키 미설정 시 안내 메시지와 함께 실패
fn require_api_key() -> Result<()> {
    if !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export GEMINI_API_KEY=your-api-key\n  \
             또는\n  \
             export GOOGLE_AI_API_KEY=your-api-key\n\n\
             API 키 발급: https://aistudio.google.com/app/apikey"
        );
    }
    Ok(())
}

/// QA 엔진 구성 (검색 + 생성)
async fn build_engine(top_k: usize) -> Result<QaEngine> {
    let embedder: Arc<dyn EmbeddingProvider> =
        Arc::new(GeminiEmbedding::from_env().context("임베더 생성 실패")?);

    let retriever = Retriever::new(embedder, size_chunker())
        .await
        .context("Retriever 초기화 실패")?
        .with_top_k(top_k);

    let generator = Box::new(GeminiGenerator::from_env().context("생성기 생성 실패")?);

    Ok(QaEngine::new(retriever, generator))
}

/// 문서 수집 명령어 (ingest)
///
/// PDF 파일 또는 폴더를 페이지 단위로 추출하여 지식베이스에 저장합니다.
async fn cmd_ingest(
    file: Option<PathBuf>,
    dir: Option<PathBuf>,
    chunks_per_page: usize,
    fast: bool,
) -> Result<()> {
    require_api_key()?;

    // 대상 파일 수집
    let files = if let Some(ref file_path) = file {
        let is_pdf = file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);

        if !is_pdf {
            bail!("PDF 파일이 아닙니다: {:?}", file_path);
        }
        vec![file_path.clone()]
    } else if let Some(ref dir_path) = dir {
        collect_pdfs(dir_path)?
    } else {
        bail!("--file 또는 --dir 중 하나를 지정해야 합니다");
    };

    if files.is_empty() {
        println!("[!] 수집할 PDF가 없습니다.");
        return Ok(());
    }

    println!("[*] 수집 대상: {} 파일", files.len());

    // Retriever 구성 (청킹 전략 선택)
    let embedder: Arc<dyn EmbeddingProvider> =
        Arc::new(GeminiEmbedding::from_env().context("임베더 생성 실패")?);

    let chunker = if fast {
        size_chunker()
    } else {
        semantic_chunker(embedder.clone(), chunks_per_page)
    };

    let retriever = Retriever::new(embedder, chunker)
        .await
        .context("Retriever 초기화 실패")?;

    if !fast {
        println!("[*] 시맨틱 청킹 사용 (페이지당 {} 청크, 문장별 임베딩 호출 발생)", chunks_per_page);
    }

    // 파일별 처리
    let mut page_count = 0;
    let mut error_count = 0;

    for (i, path) in files.iter().enumerate() {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown");

        print!("[{}/{}] {}... ", i + 1, files.len(), file_name);

        let pages = match extract_pdf_pages(path).await {
            Ok(p) => p,
            Err(e) => {
                println!("실패: {}", e);
                error_count += 1;
                continue;
            }
        };

        let mut stored = 0;
        for page in pages {
            if page.text.trim().is_empty() {
                continue;
            }

            let doc = NewDocument {
                source: path.display().to_string(),
                page: Some(page.number as i64),
                content: page.text,
            };

            match retriever.add_document(doc).await {
                Ok(_) => stored += 1,
                Err(e) => {
                    println!("저장 실패 (page {}): {}", page.number, e);
                    error_count += 1;
                }
            }
        }

        page_count += stored;
        println!("완료 ({} 페이지)", stored);
    }

    println!();
    println!("[OK] 완료: 페이지 {}, 실패 {}", page_count, error_count);

    Ok(())
}

/// 질문 명령어 (ask)
async fn cmd_ask(question: &str, limit: usize) -> Result<()> {
    require_api_key()?;

    println!("[*] 질문: \"{}\"", question);

    let engine = build_engine(limit).await?;
    let result = engine.ask(question).await.context("답변 생성 실패")?;

    println!();
    println!("[OK] 답변:");
    println!("{}", result.answer);

    if result.context.is_empty() {
        println!("\n[!] 검색된 컨텍스트가 없습니다.");
    } else {
        println!("\n[*] 근거 컨텍스트:");
        println!("{}", truncate_text(&result.context, 500));
    }

    Ok(())
}

/// 설명 명령어 (explain)
///
/// 답변과 근거 컨텍스트를 하이라이트한 HTML 조각을 생성합니다.
async fn cmd_explain(
    question: &str,
    limit: usize,
    threshold: f32,
    output: Option<PathBuf>,
) -> Result<()> {
    require_api_key()?;

    println!("[*] 질문: \"{}\"", question);

    let engine = build_engine(limit).await?;
    let html = engine
        .explain(question, threshold)
        .await
        .context("설명 생성 실패")?;

    match output {
        Some(path) => {
            std::fs::write(&path, &html)
                .with_context(|| format!("HTML 저장 실패: {:?}", path))?;
            println!("[OK] HTML 저장됨: {}", path.display());
        }
        None => {
            println!();
            println!("{}", html);
        }
    }

    Ok(())
}

/// 평가 명령어 (eval)
///
/// 저장된 문서에서 테스트셋을 생성하고 RAG 품질을 평가합니다.
async fn cmd_eval(test_size: usize, limit: usize, output: Option<PathBuf>) -> Result<()> {
    require_api_key()?;

    let engine = build_engine(limit).await?;

    let docs = engine
        .retriever()
        .store()
        .list_documents(10_000)
        .context("문서 목록 조회 실패")?;

    if docs.is_empty() {
        bail!("저장된 문서가 없습니다. 먼저 ingest를 실행하세요.");
    }

    let judge = GeminiGenerator::from_env().context("심사 생성기 생성 실패")?;

    println!("[*] 테스트셋 생성 중 ({} 케이스)...", test_size);
    let cases = generate_test_set(&docs, test_size, &judge).await?;

    if cases.is_empty() {
        bail!("테스트 케이스를 생성하지 못했습니다");
    }

    println!("[*] RAG 답변 생성 중 ({} 케이스)...", cases.len());
    let records = add_rag_answers(&cases, &engine).await?;

    println!("[*] 메트릭 심사 중...");
    let report = evaluate_records(&records, &judge).await?;

    println!();
    println!("[OK] 평가 결과 ({} 케이스):", report.summary.case_count);
    println!("     context_precision:  {:.3}", report.summary.context_precision);
    println!("     context_recall:     {:.3}", report.summary.context_recall);
    println!("     answer_correctness: {:.3}", report.summary.answer_correctness);

    if let Some(path) = output {
        write_report(&report, &path)?;
        println!("     리포트: {}", path.display());
    }

    Ok(())
}

/// 목록 명령어 (list)
async fn cmd_list(limit: usize) -> Result<()> {
    let store = DocumentStore::open_default().context("DocumentStore 열기 실패")?;

    let docs = store.list_documents(limit).context("문서 목록 조회 실패")?;

    if docs.is_empty() {
        println!("[!] 저장된 문서가 없습니다.");
        return Ok(());
    }

    println!("[OK] 저장된 문서 ({} 건):\n", docs.len());

    for doc in docs {
        let page = doc
            .page
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());

        println!("  #{:<4} [page {}] {}", doc.id, page, doc.source);
        println!(
            "        {} | {} chars",
            doc.created_at.format("%Y-%m-%d %H:%M"),
            doc.content.len()
        );
        println!();
    }

    Ok(())
}

/// 삭제 명령어 (delete)
///
/// ID 또는 소스 경로로 문서와 벡터를 함께 삭제합니다.
async fn cmd_delete(id: Option<i64>, source: Option<String>) -> Result<()> {
    let store = DocumentStore::open_default().context("DocumentStore 열기 실패")?;
    let lance = LanceVectorStore::open(&get_data_dir().join("chunks.lance"))
        .await
        .context("벡터 스토어 열기 실패")?;

    let ids: Vec<i64> = if let Some(id) = id {
        if store.get_document(id).context("문서 조회 실패")?.is_none() {
            bail!("ID {}인 문서를 찾을 수 없습니다", id);
        }
        vec![id]
    } else if let Some(ref source_path) = source {
        let ids = store.ids_by_source(source_path).context("문서 조회 실패")?;
        if ids.is_empty() {
            bail!("소스 '{}'인 문서를 찾을 수 없습니다", source_path);
        }
        ids
    } else {
        bail!("--id 또는 --source 중 하나를 지정해야 합니다");
    };

    let mut deleted = 0;
    for doc_id in ids {
        lance.delete_by_doc_id(doc_id).await?;
        if store.delete_document(doc_id)? {
            deleted += 1;
        }
    }

    println!("[OK] 문서 {} 건 삭제됨", deleted);

    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status() -> Result<()> {
    println!("dokseo-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    let data_dir = get_data_dir();
    println!("[*] 데이터 디렉토리: {}", data_dir.display());

    if has_api_key() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정");
        println!("    설정: export GEMINI_API_KEY=your-key");
    }

    match DocumentStore::open_default() {
        Ok(store) => match store.stats() {
            Ok(stats) => {
                println!("[OK] 저장된 문서: {} 건", stats.document_count);
                println!(
                    "     총 콘텐츠: {}",
                    format_bytes(stats.total_content_bytes)
                );
            }
            Err(e) => {
                println!("[!] 통계 조회 실패: {}", e);
            }
        },
        Err(e) => {
            println!("[!] DocumentStore 열기 실패: {}", e);
        }
    }

    match LanceVectorStore::open(&data_dir.join("chunks.lance")).await {
        Ok(lance) => match lance.count().await {
            Ok(count) => println!("[OK] 벡터 인덱스: {} 청크", count),
            Err(e) => tracing::debug!("벡터 개수 조회 실패: {}", e),
        },
        Err(e) => tracing::debug!("벡터 스토어 열기 실패: {}", e),
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello world", 5), "hello...");
        assert_eq!(truncate_text("hello\nworld", 20), "hello world");
    }

    #[test]
    fn test_truncate_unicode() {
        let korean = "안녕하세요 세계";
        assert_eq!(truncate_text(korean, 5), "안녕하세요...");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }
}
