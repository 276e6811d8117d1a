//! Document Store - rusqlite 기반 문서 페이지 저장소
//!
//! 수집한 PDF 페이지의 원본 텍스트를 저장합니다. 벡터 인덱스와 달리
//! 원문 전체를 보관하므로 평가용 테스트셋 생성의 소스로도 사용됩니다.
//! 저장 위치: ~/.dokseo-rag/documents.db

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, Row};
use serde::{Deserialize, Serialize};

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.dokseo-rag/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".dokseo-rag")
}

// ============================================================================
// Types
// ============================================================================

/// 저장된 문서 페이지
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    /// 원본 파일 경로
    pub source: String,
    /// 페이지 번호 (1부터 시작, 페이지 정보가 없으면 None)
    pub page: Option<i64>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// 새 문서 입력용 구조체
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub source: String,
    pub page: Option<i64>,
    pub content: String,
}

/// 저장소 통계
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub document_count: usize,
    pub total_content_bytes: usize,
    pub db_path: PathBuf,
}

// ============================================================================
// DocumentStore
// ============================================================================

/// Document Store - 동기 문서 저장소
///
/// SQLite 기반으로 페이지 단위 문서를 저장/조회합니다.
pub struct DocumentStore {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl DocumentStore {
    /// 저장소 열기 (없으면 생성)
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create database directory")?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open SQLite database")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_path_buf(),
        };

        store.initialize()?;
        Ok(store)
    }

    /// 기본 위치에서 열기 (~/.dokseo-rag/documents.db)
    pub fn open_default() -> Result<Self> {
        let data_dir = get_data_dir();
        if !data_dir.exists() {
            std::fs::create_dir_all(&data_dir).context("Failed to create data directory")?;
        }

        Self::open(&data_dir.join("documents.db"))
    }

    /// DB 경로 반환
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// 스키마 초기화
    fn initialize(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source TEXT NOT NULL,
                page INTEGER,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )
        .context("Failed to create documents table")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_documents_source ON documents(source)",
            [],
        )
        .context("Failed to create source index")?;

        tracing::debug!("Document store initialized at {:?}", self.db_path);
        Ok(())
    }

    /// 문서 페이지 저장
    pub fn add_document(&self, doc: NewDocument) -> Result<i64> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO documents (source, page, content, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![doc.source, doc.page, doc.content, now],
        )
        .context("Failed to insert document")?;

        let id = conn.last_insert_rowid();
        tracing::debug!("Added document: {} page {:?} (id={})", doc.source, doc.page, id);

        Ok(id)
    }

    /// ID로 문서 조회
    pub fn get_document(&self, id: i64) -> Result<Option<Document>> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT id, source, page, content, created_at FROM documents WHERE id = ?1",
        )?;

        let doc = stmt.query_row(params![id], document_from_row).ok();
        Ok(doc)
    }

    /// 문서 목록 조회 (최신순)
    pub fn list_documents(&self, limit: usize) -> Result<Vec<Document>> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT id, source, page, content, created_at FROM documents
             ORDER BY created_at DESC, id DESC
             LIMIT ?1",
        )?;

        let docs = stmt
            .query_map(params![limit as i64], document_from_row)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(docs)
    }

    /// 소스 경로로 문서 ID 목록 조회
    pub fn ids_by_source(&self, source: &str) -> Result<Vec<i64>> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let mut stmt = conn.prepare("SELECT id FROM documents WHERE source = ?1 ORDER BY id")?;

        let ids = stmt
            .query_map(params![source], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(ids)
    }

    /// 문서 삭제
    pub fn delete_document(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let rows = conn.execute("DELETE FROM documents WHERE id = ?1", params![id])?;

        Ok(rows > 0)
    }

    /// 저장소 통계
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .unwrap_or(0);

        let total_size: i64 = conn
            .query_row(
                "SELECT COALESCE(SUM(LENGTH(content)), 0) FROM documents",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        Ok(StoreStats {
            document_count: count as usize,
            total_content_bytes: total_size as usize,
            db_path: self.db_path.clone(),
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// SELECT 결과 행을 Document로 변환
fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        source: row.get(1)?,
        page: row.get(2)?,
        content: row.get(3)?,
        created_at: parse_datetime(row.get::<_, String>(4)?),
    })
}

/// RFC3339 문자열을 DateTime<Utc>로 파싱
fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (TempDir, DocumentStore) {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("test.db");
        let store = DocumentStore::open(&db_path).unwrap();
        (dir, store)
    }

    fn page_doc(source: &str, page: i64, content: &str) -> NewDocument {
        NewDocument {
            source: source.to_string(),
            page: Some(page),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_add_and_get_document() {
        let (_dir, store) = create_test_store();

        let id = store
            .add_document(page_doc("/tmp/paper.pdf", 3, "This is page three"))
            .unwrap();
        assert!(id > 0);

        let doc = store.get_document(id).unwrap().unwrap();
        assert_eq!(doc.source, "/tmp/paper.pdf");
        assert_eq!(doc.page, Some(3));
        assert_eq!(doc.content, "This is page three");
    }

    #[test]
    fn test_page_can_be_absent() {
        let (_dir, store) = create_test_store();

        let id = store
            .add_document(NewDocument {
                source: "direct-input".to_string(),
                page: None,
                content: "no page".to_string(),
            })
            .unwrap();

        let doc = store.get_document(id).unwrap().unwrap();
        assert_eq!(doc.page, None);
    }

    #[test]
    fn test_list_documents() {
        let (_dir, store) = create_test_store();

        for i in 1..=5 {
            store
                .add_document(page_doc("/tmp/paper.pdf", i, &format!("page {}", i)))
                .unwrap();
        }

        let all = store.list_documents(10).unwrap();
        assert_eq!(all.len(), 5);

        let limited = store.list_documents(2).unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_ids_by_source() {
        let (_dir, store) = create_test_store();

        store.add_document(page_doc("/tmp/a.pdf", 1, "a1")).unwrap();
        store.add_document(page_doc("/tmp/a.pdf", 2, "a2")).unwrap();
        store.add_document(page_doc("/tmp/b.pdf", 1, "b1")).unwrap();

        let ids = store.ids_by_source("/tmp/a.pdf").unwrap();
        assert_eq!(ids.len(), 2);

        let none = store.ids_by_source("/tmp/missing.pdf").unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_delete_document() {
        let (_dir, store) = create_test_store();

        let id = store.add_document(page_doc("/tmp/a.pdf", 1, "bye")).unwrap();
        assert!(store.get_document(id).unwrap().is_some());

        assert!(store.delete_document(id).unwrap());
        assert!(store.get_document(id).unwrap().is_none());
        assert!(!store.delete_document(id).unwrap());
    }

    #[test]
    fn test_stats() {
        let (_dir, store) = create_test_store();

        store.add_document(page_doc("/tmp/a.pdf", 1, "1234567890")).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.document_count, 1);
        assert_eq!(stats.total_content_bytes, 10);
    }
}
