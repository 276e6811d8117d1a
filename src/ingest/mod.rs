//! Ingest 모듈 - PDF 수집 및 청킹
//!
//! PDF 파일을 페이지 단위로 추출하고 청크로 분할해
//! 지식 저장소에 넣을 준비를 합니다.

pub mod chunker;
pub mod pdf;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::WalkBuilder;

pub use chunker::{semantic_chunker, size_chunker, Chunker, SemanticChunker, SizeChunker};
pub use pdf::PdfPage;

/// PDF 파일에서 페이지별 텍스트 추출 (비동기)
///
/// PDF 파싱은 CPU 바운드이므로 blocking 태스크에서 수행합니다.
pub async fn extract_pdf_pages(path: &Path) -> Result<Vec<PdfPage>> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || pdf::extract_pages(&path))
        .await
        .context("PDF extraction task failed")?
}

/// 폴더에서 PDF 파일 수집 (재귀, .gitignore 존중)
pub fn collect_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("Not a directory: {:?}", dir);
    }

    let mut files = Vec::new();

    for entry in WalkBuilder::new(dir).build() {
        let entry = entry.context("Failed to walk directory")?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);

        if is_pdf {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_pdfs_filters_extension() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"pdf").unwrap();
        std::fs::write(dir.path().join("b.PDF"), b"pdf").unwrap();
        std::fs::write(dir.path().join("c.txt"), b"text").unwrap();

        let files = collect_pdfs(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| {
            f.extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("pdf"))
                .unwrap_or(false)
        }));
    }

    #[test]
    fn test_collect_pdfs_recursive() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("nested");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("deep.pdf"), b"pdf").unwrap();

        let files = collect_pdfs(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_collect_pdfs_rejects_file_path() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.pdf");
        std::fs::write(&file, b"pdf").unwrap();

        assert!(collect_pdfs(&file).is_err());
    }
}
