//! 소스 페처 모듈
//!
//! 분류된 소스에서 원본 콘텐츠를 가져옵니다.
//! - 웹: reqwest 클라이언트로 HTTP GET (전체 타임아웃 적용)
//! - PDF: 로컬 파일 존재 확인 후 바이트 읽기
//!
//! 모든 실패는 타입이 있는 결과로 반환되며 경계 밖으로 전파되지 않습니다.
//! 배치 코디네이터가 소스별 결과를 계속 수집할 수 있어야 하기 때문입니다.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::error::IngestError;

use super::source::{Source, SourceKind};

/// HTTP User-Agent (일부 사이트의 봇 차단 회피)
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 기본 요청 타임아웃
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Raw Content
// ============================================================================

/// 페치된 원본 콘텐츠
///
/// 추출 단계로 넘겨진 뒤 폐기되는 일시적 데이터입니다.
#[derive(Debug)]
pub enum RawContent {
    /// 웹 페이지 HTML (+ 응답 Content-Type 힌트)
    Web {
        html: String,
        content_type: Option<String>,
    },
    /// PDF 파일 바이트
    Pdf { bytes: Vec<u8> },
}

impl RawContent {
    /// 원본 크기 (바이트)
    pub fn len(&self) -> usize {
        match self {
            RawContent::Web { html, .. } => html.len(),
            RawContent::Pdf { bytes } => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Source Fetcher
// ============================================================================

/// 소스 페처
pub struct SourceFetcher {
    client: reqwest::Client,
}

impl SourceFetcher {
    /// 새 페처 생성
    ///
    /// `insecure`가 true이면 TLS 인증서 검증을 건너뜁니다.
    /// 명시적으로 요청한 경우에만 허용되며 경고 로그를 남깁니다.
    pub fn new(timeout: Duration, insecure: bool) -> Result<Self> {
        if insecure {
            tracing::warn!("TLS certificate verification disabled (insecure mode)");
        }

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .danger_accept_invalid_certs(insecure)
            .build()
            .context("HTTP 클라이언트 생성 실패")?;

        Ok(Self { client })
    }

    /// 소스에서 원본 콘텐츠 가져오기
    ///
    /// 성공/실패 여부를 소스별로 로그에 남깁니다.
    pub async fn fetch(&self, source: &Source) -> Result<RawContent, IngestError> {
        let result = match source.kind() {
            SourceKind::Web => self.fetch_web(source).await,
            SourceKind::Pdf => self.fetch_pdf(source).await,
        };

        match &result {
            Ok(raw) => tracing::info!("Fetched {} ({} bytes)", source, raw.len()),
            Err(e) => tracing::warn!("Fetch failed for {}: {}", source, e),
        }

        result
    }

    /// 웹 페이지 가져오기
    async fn fetch_web(&self, source: &Source) -> Result<RawContent, IngestError> {
        let response = self
            .client
            .get(source.identifier())
            .send()
            .await
            .map_err(classify_fetch_error)?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(IngestError::NotFound(source.identifier().to_string()));
        }
        if !status.is_success() {
            return Err(IngestError::Network(format!(
                "HTTP {} for {}",
                status,
                source.identifier()
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        let html = response.text().await.map_err(classify_fetch_error)?;

        Ok(RawContent::Web { html, content_type })
    }

    /// 로컬 PDF 파일 읽기
    ///
    /// 읽기 전에 존재 여부와 일반 파일 여부를 확인합니다.
    async fn fetch_pdf(&self, source: &Source) -> Result<RawContent, IngestError> {
        let path = Path::new(source.identifier());

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|_| IngestError::NotFound(source.identifier().to_string()))?;

        if !metadata.is_file() {
            return Err(IngestError::NotFound(format!(
                "일반 파일이 아님: {}",
                source.identifier()
            )));
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| IngestError::Network(format!("파일 읽기 실패: {}", e)))?;

        Ok(RawContent::Pdf { bytes })
    }
}

// ============================================================================
// Error Classification
// ============================================================================

/// reqwest 오류를 수집 오류로 분류
///
/// 타임아웃 → timeout, 인증서 관련 → ssl_error, 그 외 → network_error.
fn classify_fetch_error(err: reqwest::Error) -> IngestError {
    if err.is_timeout() {
        return IngestError::Timeout;
    }

    // 원인 체인까지 포함해서 메시지 수집 (TLS 오류는 내부에 묻혀 있음)
    let mut message = err.to_string();
    let mut cause = std::error::Error::source(&err);
    while let Some(inner) = cause {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        cause = inner.source();
    }

    let lowered = message.to_lowercase();
    if lowered.contains("certificate") || lowered.contains("ssl") || lowered.contains("tls") {
        IngestError::Ssl(message)
    } else {
        IngestError::Network(message)
    }
}

// ============================================================================
// Tests
// ============================================================================
