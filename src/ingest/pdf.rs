//! PDF 텍스트 추출 모듈
//!
//! pdf-extract 크레이트로 PDF 바이트에서 텍스트를 추출하고
//! 페이지 단위로 분리합니다.

use anyhow::{Context, Result};

/// PDF 바이트에서 페이지별 텍스트 추출
///
/// 텍스트가 전혀 없는 PDF(스캔 이미지 등)는 빈 목록을 반환하고,
/// 수락 여부는 호출 측의 품질 게이트가 판단합니다.
pub fn extract_pdf_pages(bytes: &[u8]) -> Result<Vec<String>> {
    let text =
        pdf_extract::extract_text_from_mem(bytes).context("PDF 텍스트 추출 실패")?;

    if text.trim().is_empty() {
        tracing::warn!("No text extracted from PDF. It might be a scanned document.");
        return Ok(vec![]);
    }

    Ok(split_pdf_pages(&text))
}

/// PDF 텍스트를 페이지별로 분리
///
/// 폼피드 문자(\x0c)를 우선 시도하고, 없으면 페이지 구분자 패턴
/// (예: "--- Page 1 ---")으로 시도합니다. 둘 다 실패하면 전체를
/// 한 페이지로 취급합니다.
fn split_pdf_pages(text: &str) -> Vec<String> {
    let pages: Vec<String> = text
        .split('\x0c')
        .map(|page| page.trim().to_string())
        .filter(|page| !page.is_empty())
        .collect();

    if pages.len() > 1 {
        return pages;
    }

    let separator =
        regex::Regex::new(r"(?m)^[\s]*[-=]+[\s]*(?:Page[\s]*)?(\d+)[\s]*[-=]+[\s]*$")
            .expect("Invalid regex");

    if separator.is_match(text) {
        let pages: Vec<String> = separator
            .split(text)
            .map(|page| page.trim().to_string())
            .filter(|page| !page.is_empty())
            .collect();

        if pages.len() > 1 {
            return pages;
        }
    }

    vec![text.trim().to_string()]
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_pages_formfeed() {
        let text = "First page\x0cSecond page\x0cThird page";
        let pages = split_pdf_pages(text);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0], "First page");
        assert_eq!(pages[2], "Third page");
    }

    #[test]
    fn test_split_pages_separator_pattern() {
        let text = "Intro text\n--- Page 2 ---\nBody text";
        let pages = split_pdf_pages(text);
        assert_eq!(pages.len(), 2);
    }

    #[test]
    fn test_split_pages_no_separator() {
        let text = "Continuous text without any page markers";
        let pages = split_pdf_pages(text);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0], text);
    }

    #[test]
    fn test_invalid_pdf_bytes() {
        let result = extract_pdf_pages(b"definitely not a pdf");
        assert!(result.is_err());
    }
}
