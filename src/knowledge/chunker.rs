//! 텍스트 청킹 모듈
//!
//! 수락된 문서를 고정 크기의 중첩 문자 윈도우로 분할합니다.
//! 각 청크는 부모 문서의 메타데이터 전체와 자신의 순번(0부터)을
//! 복사해 가지며, 순번 순서가 저장까지 유지되어야 검색 컨텍스트가
//! 재현 가능합니다.

use crate::error::IngestError;
use crate::ingest::{AcceptedDocument, Chunk};

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// 청크 최대 크기 (문자 수)
    pub chunk_size: usize,
    /// 인접 청크 간 중첩 (문자 수)
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 4000,
            chunk_overlap: 20,
        }
    }
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// 설정 검증
    ///
    /// 중첩은 청크 크기보다 엄격히 작아야 합니다.
    /// 같거나 크면 윈도우가 전진하지 못합니다.
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::Config(
                "chunk_size는 0보다 커야 합니다".to_string(),
            ));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(IngestError::Config(format!(
                "chunk_overlap({})은 chunk_size({})보다 작아야 합니다",
                self.chunk_overlap, self.chunk_size
            )));
        }

        Ok(())
    }

    /// 윈도우 전진 폭
    fn stride(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }
}

// ============================================================================
// Chunking
// ============================================================================

/// 문서를 순서 있는 청크 목록으로 분할
///
/// 설정이 잘못되었으면 분할을 시작하기 전에 실패합니다.
pub fn chunk_document(
    document: &AcceptedDocument,
    config: &ChunkConfig,
) -> Result<Vec<Chunk>, IngestError> {
    config.validate()?;

    let windows = split_windows(&document.text, config);

    Ok(windows
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk {
            text,
            metadata: document.chunk_metadata(index),
        })
        .collect())
}

/// 문자 윈도우 분할
///
/// 윈도우는 `chunk_size - chunk_overlap`만큼씩 전진하며
/// 마지막 윈도우는 `chunk_size`보다 짧을 수 있습니다.
/// 문자 단위로 동작하므로 멀티바이트 경계에서 안전합니다.
fn split_windows(text: &str, config: &ChunkConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let stride = config.stride();

    let mut windows = Vec::new();
    let mut start = 0;

    loop {
        let end = (start + config.chunk_size).min(chars.len());
        windows.push(chars[start..end].iter().collect());

        if end >= chars.len() {
            break;
        }
        start += stride;
    }

    windows
}

// ============================================================================
// Tests
// ============================================================================
