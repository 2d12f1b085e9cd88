//! 수집 소스 분류 모듈
//!
//! 소스 식별자(URL 또는 로컬 경로)를 종류(web/pdf)로 분류합니다.
//! 분류는 생성 시점에 한 번 결정되며 이후 변경되지 않습니다.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use url::Url;

use crate::error::IngestError;

// ============================================================================
// Source Kind
// ============================================================================

/// 소스 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// 웹 페이지 (HTTP/HTTPS)
    Web,
    /// 로컬 PDF 파일
    Pdf,
}

impl SourceKind {
    /// 메타데이터 저장용 라벨
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Web => "web",
            SourceKind::Pdf => "pdf",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Source
// ============================================================================

/// 수집 소스 (식별자 + 분류된 종류)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    identifier: String,
    kind: SourceKind,
}

impl Source {
    /// 식별자 문자열을 분류하여 소스 생성
    ///
    /// - `http://` / `https://` URL → web
    /// - `.pdf` 확장자 경로 → pdf
    /// - 그 외 → `UnsupportedType`
    pub fn classify(identifier: &str) -> Result<Self, IngestError> {
        let trimmed = identifier.trim();
        if trimmed.is_empty() {
            return Err(IngestError::UnsupportedType("빈 식별자".to_string()));
        }

        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Url::parse(trimmed).map_err(|e| {
                IngestError::UnsupportedType(format!("잘못된 URL '{}': {}", trimmed, e))
            })?;

            return Ok(Self {
                identifier: trimmed.to_string(),
                kind: SourceKind::Web,
            });
        }

        let is_pdf = Path::new(trimmed)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);

        if is_pdf {
            return Ok(Self {
                identifier: trimmed.to_string(),
                kind: SourceKind::Pdf,
            });
        }

        Err(IngestError::UnsupportedType(trimmed.to_string()))
    }

    /// 소스 식별자 (URL 또는 경로)
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// 소스 종류
    pub fn kind(&self) -> SourceKind {
        self.kind
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier)
    }
}

// ============================================================================
// Source List File
// ============================================================================

/// 소스 목록 파일 읽기
///
/// 한 줄에 식별자 하나. 빈 줄과 `#` 주석 줄은 무시합니다.
pub fn read_source_list(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("소스 목록 파일 읽기 실패: {:?}", path))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.to_string())
        .collect())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_web_url() {
        let source = Source::classify("https://example.com/docs").unwrap();
        assert_eq!(source.kind(), SourceKind::Web);
        assert_eq!(source.identifier(), "https://example.com/docs");

        let source = Source::classify("http://example.com").unwrap();
        assert_eq!(source.kind(), SourceKind::Web);
    }

    #[test]
    fn test_classify_pdf_path() {
        let source = Source::classify("data/paper.pdf").unwrap();
        assert_eq!(source.kind(), SourceKind::Pdf);

        // 확장자는 대소문자 구분 없음
        let source = Source::classify("/tmp/REPORT.PDF").unwrap();
        assert_eq!(source.kind(), SourceKind::Pdf);
    }

    #[test]
    fn test_classify_unsupported() {
        let err = Source::classify("notes.txt").unwrap_err();
        assert_eq!(err.kind(), "unsupported_type");

        let err = Source::classify("").unwrap_err();
        assert_eq!(err.kind(), "unsupported_type");
    }

    #[test]
    fn test_classify_trims_whitespace() {
        let source = Source::classify("  https://example.com  ").unwrap();
        assert_eq!(source.identifier(), "https://example.com");
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(SourceKind::Web.as_str(), "web");
        assert_eq!(SourceKind::Pdf.as_str(), "pdf");
    }

    #[test]
    fn test_read_source_list() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sources.txt");
        std::fs::write(
            &path,
            "# 수집 대상\nhttps://example.com/a\n\n  data/paper.pdf  \n# 끝\n",
        )
        .unwrap();

        let list = read_source_list(&path).unwrap();
        assert_eq!(list, vec!["https://example.com/a", "data/paper.pdf"]);
    }
}
