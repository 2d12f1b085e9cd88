//! 수집 파이프라인 오류 타입
//!
//! 소스 단위 실패(네트워크, 추출, 중복)는 배치를 중단시키지 않고
//! 이 타입으로 분류되어 결과 리포트에 수집됩니다.
//! 설정 오류만 배치 시작 전에 즉시 실패합니다.

use thiserror::Error;

/// 수집 파이프라인 오류 분류
#[derive(Debug, Error)]
pub enum IngestError {
    /// 네트워크 오류 (연결 실패, HTTP 오류 응답 등)
    #[error("네트워크 오류: {0}")]
    Network(String),

    /// 요청 시간 초과
    #[error("요청 시간 초과")]
    Timeout,

    /// SSL/TLS 인증서 오류
    #[error("SSL 인증서 오류: {0}")]
    Ssl(String),

    /// 소스를 찾을 수 없음 (HTTP 404 또는 존재하지 않는 파일)
    #[error("소스를 찾을 수 없음: {0}")]
    NotFound(String),

    /// 지원하지 않는 소스 형식
    #[error("지원하지 않는 소스 형식: {0}")]
    UnsupportedType(String),

    /// 추출된 콘텐츠가 최소 길이 미만
    #[error("추출된 콘텐츠 부족 ({chars}자)")]
    LowContent { chars: usize },

    /// 동일한 콘텐츠가 이미 이번 실행에서 수집됨
    #[error("중복 콘텐츠")]
    Duplicate,

    /// 잘못된 설정
    #[error("설정 오류: {0}")]
    Config(String),
}

impl IngestError {
    /// 오류 분류 라벨 (리포트/로그 출력용)
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Network(_) => "network_error",
            IngestError::Timeout => "timeout",
            IngestError::Ssl(_) => "ssl_error",
            IngestError::NotFound(_) => "not_found",
            IngestError::UnsupportedType(_) => "unsupported_type",
            IngestError::LowContent { .. } => "low_content",
            IngestError::Duplicate => "duplicate",
            IngestError::Config(_) => "config_error",
        }
    }

    /// 중복 콘텐츠 거부 여부
    ///
    /// 리포트에서 중복은 다른 실패와 별도로 집계됩니다.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, IngestError::Duplicate)
    }
}

// ============================================================================
// Tests
// ============================================================================
