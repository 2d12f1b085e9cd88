//! Knowledge Store - rusqlite 기반 청크 저장소
//!
//! 수집 파이프라인이 만든 청크를 메타데이터와 함께 저장합니다.
//! 저장 위치: ~/.ragline/knowledge.db
//!
//! 청크는 삽입 순서(= 문서 내 순번 순서)가 rowid로 보존되므로
//! 검색 컨텍스트를 재현 가능하게 복원할 수 있습니다.
//! FTS5 가상 테이블로 키워드 검색도 제공합니다.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags};
use serde::Serialize;

use crate::ingest::Chunk;

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.ragline/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ragline")
}

// ============================================================================
// Types
// ============================================================================

/// 저장된 청크 행
#[derive(Debug, Clone, Serialize)]
pub struct StoredChunk {
    pub id: i64,
    pub source_type: String,
    pub source_identifier: String,
    pub content_hash: String,
    pub processed_at: DateTime<Utc>,
    pub title: String,
    pub content_length: usize,
    pub chunk_index: usize,
    pub text: String,
}

/// 문서 단위 요약 (content_hash 기준 그룹)
#[derive(Debug, Clone)]
pub struct DocumentSummary {
    pub content_hash: String,
    pub source_type: String,
    pub source_identifier: String,
    pub title: String,
    pub chunk_count: usize,
    pub processed_at: DateTime<Utc>,
}

/// FTS5 키워드 검색 결과
#[derive(Debug, Clone)]
pub struct KeywordMatch {
    pub chunk_id: i64,
    pub title: String,
    pub snippet: String,
    pub bm25_score: f64,
}

/// 저장소 통계
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub chunk_count: usize,
    pub document_count: usize,
    pub total_text_bytes: usize,
    pub db_path: PathBuf,
}

// ============================================================================
// KnowledgeStore
// ============================================================================

/// 청크 저장소
pub struct KnowledgeStore {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl KnowledgeStore {
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

    /// 기본 위치에서 열기 (~/.ragline/knowledge.db)
    pub fn open_default() -> Result<Self> {
        let data_dir = get_data_dir();
        if !data_dir.exists() {
            std::fs::create_dir_all(&data_dir).context("Failed to create data directory")?;
        }

        Self::open(&data_dir.join("knowledge.db"))
    }

    /// DB 경로 반환
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// 스키마 초기화
    fn initialize(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_type TEXT NOT NULL,
                source_identifier TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                processed_at TEXT NOT NULL,
                title TEXT NOT NULL,
                content_length INTEGER NOT NULL,
                chunk_index INTEGER NOT NULL,
                text TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create chunks table")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_chunks_hash ON chunks(content_hash)",
            [],
        )
        .context("Failed to create content_hash index")?;

        // FTS5 가상 테이블 (키워드 검색용)
        // ref: https://www.sqlite.org/fts5.html
        let fts_result = conn.execute(
            "CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
                title,
                text,
                content=chunks,
                content_rowid=id
            )",
            [],
        );

        if let Err(e) = fts_result {
            tracing::warn!("FTS5 not available (optional): {}", e);
        } else {
            // FTS5 동기화 트리거
            let _ = conn.execute_batch(
                r#"
                CREATE TRIGGER IF NOT EXISTS chunks_ai AFTER INSERT ON chunks BEGIN
                    INSERT INTO chunks_fts(rowid, title, text)
                    VALUES (new.id, new.title, new.text);
                END;

                CREATE TRIGGER IF NOT EXISTS chunks_ad AFTER DELETE ON chunks BEGIN
                    INSERT INTO chunks_fts(chunks_fts, rowid, title, text)
                    VALUES('delete', old.id, old.title, old.text);
                END;
                "#,
            );
        }

        tracing::debug!("Knowledge store initialized at {:?}", self.db_path);
        Ok(())
    }

    /// 청크 배치 저장 (단일 트랜잭션, 입력 순서 보존)
    ///
    /// 삽입된 행의 rowid 목록을 입력 순서대로 반환합니다.
    pub fn add_chunks(&self, chunks: &[Chunk]) -> Result<Vec<i64>> {
        if chunks.is_empty() {
            return Ok(vec![]);
        }

        let mut conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let tx = conn.transaction().context("Failed to begin transaction")?;
        let mut ids = Vec::with_capacity(chunks.len());

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO chunks
                     (source_type, source_identifier, content_hash, processed_at,
                      title, content_length, chunk_index, text)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )
                .context("Failed to prepare chunk insert")?;

            for chunk in chunks {
                let meta = &chunk.metadata;
                stmt.execute(params![
                    meta.source_type,
                    meta.source_identifier,
                    meta.content_hash,
                    meta.processed_at.to_rfc3339(),
                    meta.title,
                    meta.content_length as i64,
                    meta.chunk_index as i64,
                    chunk.text,
                ])
                .context("Failed to insert chunk")?;

                ids.push(tx.last_insert_rowid());
            }
        }

        tx.commit().context("Failed to commit chunk batch")?;

        tracing::info!("Stored {} chunks", ids.len());
        Ok(ids)
    }

    /// ID로 청크 조회
    pub fn get_chunk(&self, id: i64) -> Result<Option<StoredChunk>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT id, source_type, source_identifier, content_hash, processed_at,
                    title, content_length, chunk_index, text
             FROM chunks WHERE id = ?1",
        )?;

        let chunk = stmt.query_row(params![id], row_to_chunk).ok();
        Ok(chunk)
    }

    /// 저장된 모든 콘텐츠 해시 (중복 레지스트리 시드용)
    pub fn known_hashes(&self) -> Result<Vec<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let mut stmt = conn.prepare("SELECT DISTINCT content_hash FROM chunks")?;

        let hashes = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(hashes)
    }

    /// 문서 단위 목록 조회 (content_hash 기준 그룹, 최신순)
    pub fn list_documents(&self, limit: usize) -> Result<Vec<DocumentSummary>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT content_hash, source_type, source_identifier, title,
                    COUNT(*) as chunk_count, MAX(processed_at) as processed_at
             FROM chunks
             GROUP BY content_hash
             ORDER BY processed_at DESC
             LIMIT ?1",
        )?;

        let docs = stmt
            .query_map(params![limit as i64], |row| {
                Ok(DocumentSummary {
                    content_hash: row.get(0)?,
                    source_type: row.get(1)?,
                    source_identifier: row.get(2)?,
                    title: row.get(3)?,
                    chunk_count: row.get::<_, i64>(4)? as usize,
                    processed_at: parse_datetime(row.get::<_, String>(5)?),
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(docs)
    }

    /// FTS5 키워드 검색
    ///
    /// BM25 스코어 순으로 정렬된 결과를 반환합니다.
    /// ref: https://www.sqlite.org/fts5.html#the_bm25_function
    pub fn search_keyword(&self, query: &str, limit: usize) -> Result<Vec<KeywordMatch>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let escaped_query = escape_fts5_query(query);
        if escaped_query.is_empty() {
            return Ok(vec![]);
        }

        let mut stmt = conn.prepare(
            r#"
            SELECT
                c.id as chunk_id,
                c.title,
                snippet(chunks_fts, 1, '<b>', '</b>', '...', 64) as snippet,
                bm25(chunks_fts) as bm25_score
            FROM chunks_fts
            JOIN chunks c ON c.id = chunks_fts.rowid
            WHERE chunks_fts MATCH ?1
            ORDER BY bm25(chunks_fts)
            LIMIT ?2
            "#,
        )?;

        let results = stmt
            .query_map(params![escaped_query, limit as i64], |row| {
                Ok(KeywordMatch {
                    chunk_id: row.get(0)?,
                    title: row.get(1)?,
                    snippet: row.get(2)?,
                    bm25_score: row.get(3)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(results)
    }

    /// 저장소 통계
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let chunk_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
            .unwrap_or(0);

        let document_count: i64 = conn
            .query_row(
                "SELECT COUNT(DISTINCT content_hash) FROM chunks",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        let total_size: i64 = conn
            .query_row(
                "SELECT COALESCE(SUM(LENGTH(text)), 0) FROM chunks",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        Ok(StoreStats {
            chunk_count: chunk_count as usize,
            document_count: document_count as usize,
            total_text_bytes: total_size as usize,
            db_path: self.db_path.clone(),
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredChunk> {
    Ok(StoredChunk {
        id: row.get(0)?,
        source_type: row.get(1)?,
        source_identifier: row.get(2)?,
        content_hash: row.get(3)?,
        processed_at: parse_datetime(row.get::<_, String>(4)?),
        title: row.get(5)?,
        content_length: row.get::<_, i64>(6)? as usize,
        chunk_index: row.get::<_, i64>(7)? as usize,
        text: row.get(8)?,
    })
}

/// RFC3339 문자열을 DateTime<Utc>로 파싱
fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// FTS5 쿼리 이스케이프
///
/// 특수 문자를 제거하고 단어만 추출합니다.
/// ref: https://www.sqlite.org/fts5.html#full_text_query_syntax
fn escape_fts5_query(query: &str) -> String {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    trimmed
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::ChunkMetadata;
    use tempfile::TempDir;

    fn create_test_store() -> (TempDir, KnowledgeStore) {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("test.db");
        let store = KnowledgeStore::open(&db_path).unwrap();
        (dir, store)
    }

    fn make_chunk(hash: &str, index: usize, text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            metadata: ChunkMetadata {
                source_type: "web".to_string(),
                source_identifier: format!("https://example.com/{}", hash),
                content_hash: hash.to_string(),
                processed_at: Utc::now(),
                title: format!("Doc {}", hash),
                content_length: text.len(),
                chunk_index: index,
            },
        }
    }

    #[test]
    fn test_add_and_get_chunks() {
        let (_dir, store) = create_test_store();

        let chunks = vec![
            make_chunk("hash-a", 0, "first chunk text"),
            make_chunk("hash-a", 1, "second chunk text"),
        ];

        let ids = store.add_chunks(&chunks).unwrap();
        assert_eq!(ids.len(), 2);
        // rowid 순서 = 입력(청크 순번) 순서
        assert!(ids[0] < ids[1]);

        let stored = store.get_chunk(ids[1]).unwrap().unwrap();
        assert_eq!(stored.chunk_index, 1);
        assert_eq!(stored.content_hash, "hash-a");
        assert_eq!(stored.text, "second chunk text");
        assert_eq!(stored.source_type, "web");
    }

    #[test]
    fn test_add_empty_batch() {
        let (_dir, store) = create_test_store();
        let ids = store.add_chunks(&[]).unwrap();
        assert!(ids.is_empty());
    }

    #[test]
    fn test_known_hashes_distinct() {
        let (_dir, store) = create_test_store();

        store
            .add_chunks(&[
                make_chunk("hash-a", 0, "a0"),
                make_chunk("hash-a", 1, "a1"),
                make_chunk("hash-b", 0, "b0"),
            ])
            .unwrap();

        let mut hashes = store.known_hashes().unwrap();
        hashes.sort();
        assert_eq!(hashes, vec!["hash-a", "hash-b"]);
    }

    #[test]
    fn test_list_documents_groups_by_hash() {
        let (_dir, store) = create_test_store();

        store
            .add_chunks(&[
                make_chunk("hash-a", 0, "a0"),
                make_chunk("hash-a", 1, "a1"),
                make_chunk("hash-b", 0, "b0"),
            ])
            .unwrap();

        let docs = store.list_documents(10).unwrap();
        assert_eq!(docs.len(), 2);

        let doc_a = docs.iter().find(|d| d.content_hash == "hash-a").unwrap();
        assert_eq!(doc_a.chunk_count, 2);
    }

    #[test]
    fn test_search_keyword() {
        let (_dir, store) = create_test_store();

        store
            .add_chunks(&[
                make_chunk("hash-a", 0, "Rust is a systems programming language"),
                make_chunk("hash-b", 0, "Python is great for scripting"),
            ])
            .unwrap();

        let results = store.search_keyword("Rust", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].snippet.contains("Rust"));

        let results = store.search_keyword("", 10).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_stats() {
        let (_dir, store) = create_test_store();

        store
            .add_chunks(&[
                make_chunk("hash-a", 0, "1234567890"),
                make_chunk("hash-a", 1, "12345"),
            ])
            .unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.chunk_count, 2);
        assert_eq!(stats.document_count, 1);
        assert_eq!(stats.total_text_bytes, 15);
    }

    #[test]
    fn test_escape_fts5_query() {
        assert_eq!(escape_fts5_query("hello world"), "hello world");
        assert_eq!(escape_fts5_query("  "), "");
        assert_eq!(escape_fts5_query("hello:world"), "helloworld");
        assert_eq!(escape_fts5_query("test-query_123"), "test-query_123");
    }
}
