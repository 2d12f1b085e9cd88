//! 문서 데이터 모델
//!
//! 추출 문서 → 수락 문서(출처 메타데이터 부착) → 청크로 이어지는
//! 파이프라인 단계별 타입을 정의합니다.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::dedup::Fingerprint;
use super::source::Source;

// ============================================================================
// Extracted Document
// ============================================================================

/// 추출 직후의 문서 (메타데이터 부착 전)
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub source: Source,
    pub title: String,
    pub text: String,
    /// 텍스트 길이 (문자 수)
    pub length: usize,
}

impl ExtractedDocument {
    pub fn new(source: Source, title: String, text: String) -> Self {
        let length = text.chars().count();
        Self {
            source,
            title,
            text,
            length,
        }
    }
}

// ============================================================================
// Accepted Document
// ============================================================================

/// 수락된 문서
///
/// 중복 검사를 통과하고 출처 메타데이터가 부착된 문서입니다.
/// 생성 후 불변이며 청커가 소비합니다.
#[derive(Debug, Clone)]
pub struct AcceptedDocument {
    pub source: Source,
    pub title: String,
    pub text: String,
    pub content_hash: Fingerprint,
    pub processed_at: DateTime<Utc>,
    pub content_length: usize,
}

impl AcceptedDocument {
    /// 추출 문서에 출처 메타데이터 부착
    pub fn assemble(
        doc: ExtractedDocument,
        content_hash: Fingerprint,
        processed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            content_length: doc.length,
            source: doc.source,
            title: doc.title,
            text: doc.text,
            content_hash,
            processed_at,
        }
    }

    /// 청크 하나에 복사될 메타데이터 생성
    pub fn chunk_metadata(&self, chunk_index: usize) -> ChunkMetadata {
        ChunkMetadata {
            source_type: self.source.kind().as_str().to_string(),
            source_identifier: self.source.identifier().to_string(),
            content_hash: self.content_hash.as_str().to_string(),
            processed_at: self.processed_at,
            title: self.title.clone(),
            content_length: self.content_length,
            chunk_index,
        }
    }
}

// ============================================================================
// Chunk
// ============================================================================

/// 청크별 메타데이터 (부모 문서에서 복사)
#[derive(Debug, Clone, Serialize)]
pub struct ChunkMetadata {
    /// 소스 종류 ("web" 또는 "pdf")
    pub source_type: String,
    /// 소스 식별자 (URL 또는 경로)
    pub source_identifier: String,
    /// 부모 문서의 콘텐츠 해시
    pub content_hash: String,
    /// 수집 시각
    pub processed_at: DateTime<Utc>,
    /// 문서 제목
    pub title: String,
    /// 부모 문서 텍스트 길이 (문자 수)
    pub content_length: usize,
    /// 문서 내 청크 순번 (0부터 시작)
    pub chunk_index: usize,
}

/// 텍스트 청크
#[derive(Debug, Clone)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

// ============================================================================
// Tests
// ============================================================================
