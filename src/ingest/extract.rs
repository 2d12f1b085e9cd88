//! 콘텐츠 추출 모듈
//!
//! 페치된 원본에서 깨끗한 텍스트와 제목을 추출합니다.
//!
//! 웹 콘텐츠는 사이트 구조에 따라 품질 편차가 크기 때문에
//! 전략 목록을 우선순위 순서로 시도합니다:
//! 1. 본문 컨테이너 탐지 (article, main 등)
//! 2. 범용 태그 제거 (script/style/nav/header/footer 제외 후 body 전체)
//!
//! 각 전략은 태그된 결과(추출됨/분량 미달/실패)를 반환하고,
//! 최소 분량 게이트를 통과한 첫 결과가 채택됩니다.
//! 모든 전략이 실패하면 low_content로 거부됩니다.

use scraper::{ElementRef, Html, Selector};

use crate::error::IngestError;

use super::document::ExtractedDocument;
use super::fetcher::RawContent;
use super::pdf;
use super::source::Source;

/// 최소 콘텐츠 길이 (문자 수)
///
/// 이보다 짧은 추출 결과는 지식베이스를 오염시키는
/// 빈 껍데기 문서로 보고 거부합니다.
pub const MIN_CONTENT_CHARS: usize = 100;

/// 본문 컨테이너 우선순위
const CONTAINER_SELECTORS: &[&str] = &["article", "main", "[role=main]", ".content", "#content"];

/// 항상 제외하는 태그
const SKIP_TAGS: &[&str] = &["script", "style", "noscript"];

/// 범용 전략에서 추가로 제외하는 태그 (페이지 크롬)
const SKIP_CHROME_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "aside",
];

// ============================================================================
// Strategy Outcome
// ============================================================================

/// 전략별 추출 결과
#[derive(Debug)]
enum Extraction {
    /// 분량 게이트를 통과한 텍스트
    Extracted(String),
    /// 추출은 되었으나 최소 분량 미달
    Insufficient { chars: usize },
    /// 전략 내부 실패
    Failed(String),
}

/// HTML 추출 전략 (우선순위 순서대로 시도)
const HTML_STRATEGIES: [(&str, fn(&Html, usize) -> Extraction); 2] = [
    ("article", extract_article),
    ("full-text", extract_full_text),
];

// ============================================================================
// Entry Point
// ============================================================================

/// 원본 콘텐츠에서 문서 추출
///
/// 추출/거부 여부를 소스별로 로그에 남깁니다.
pub async fn extract(
    raw: RawContent,
    source: &Source,
    min_chars: usize,
) -> Result<ExtractedDocument, IngestError> {
    let result = match raw {
        RawContent::Web { html, .. } => extract_web(&html, source, min_chars),
        RawContent::Pdf { bytes } => extract_pdf_document(bytes, source, min_chars).await,
    };

    match &result {
        Ok(doc) => tracing::info!(
            "Extracted {} chars from {} (title: {})",
            doc.length,
            source,
            doc.title
        ),
        Err(e) => tracing::warn!("Extraction rejected for {}: {}", source, e),
    }

    result
}

// ============================================================================
// Web Extraction
// ============================================================================

fn extract_web(
    html: &str,
    source: &Source,
    min_chars: usize,
) -> Result<ExtractedDocument, IngestError> {
    let document = Html::parse_document(html);

    let mut best_short = 0usize;
    let mut accepted: Option<String> = None;

    for (name, strategy) in HTML_STRATEGIES {
        match strategy(&document, min_chars) {
            Extraction::Extracted(text) => {
                tracing::debug!("Strategy '{}' accepted for {}", name, source);
                accepted = Some(text);
                break;
            }
            Extraction::Insufficient { chars } => {
                tracing::debug!(
                    "Strategy '{}' below threshold for {} ({} chars)",
                    name,
                    source,
                    chars
                );
                best_short = best_short.max(chars);
            }
            Extraction::Failed(reason) => {
                tracing::debug!("Strategy '{}' failed for {}: {}", name, source, reason);
            }
        }
    }

    let text = accepted.ok_or(IngestError::LowContent { chars: best_short })?;
    let title = derive_title(extract_declared_title(&document), &text, source);

    Ok(ExtractedDocument::new(source.clone(), title, text))
}

/// 전략 1: 본문 컨테이너 탐지
///
/// 우선순위 셀렉터 중 처음 매칭되는 컨테이너의 텍스트를 사용합니다.
fn extract_article(document: &Html, min_chars: usize) -> Extraction {
    let mut longest = 0usize;

    for selector_str in CONTAINER_SELECTORS {
        let selector = match Selector::parse(selector_str) {
            Ok(selector) => selector,
            Err(e) => return Extraction::Failed(format!("{:?}", e)),
        };

        if let Some(element) = document.select(&selector).next() {
            let text = element_text(element, SKIP_TAGS);
            let chars = text.chars().count();

            if chars >= min_chars {
                return Extraction::Extracted(text);
            }
            longest = longest.max(chars);
        }
    }

    Extraction::Insufficient { chars: longest }
}

/// 전략 2: 범용 태그 제거
///
/// body 전체에서 페이지 크롬 태그를 제외한 텍스트를 사용합니다.
fn extract_full_text(document: &Html, min_chars: usize) -> Extraction {
    let selector = match Selector::parse("body") {
        Ok(selector) => selector,
        Err(e) => return Extraction::Failed(format!("{:?}", e)),
    };

    let Some(body) = document.select(&selector).next() else {
        return Extraction::Insufficient { chars: 0 };
    };

    let text = element_text(body, SKIP_CHROME_TAGS);
    let chars = text.chars().count();

    if chars >= min_chars {
        Extraction::Extracted(text)
    } else {
        Extraction::Insufficient { chars }
    }
}

/// 요소에서 텍스트 추출 (제외 태그의 서브트리는 건너뜀)
fn element_text(element: ElementRef, skip: &[&str]) -> String {
    let mut out = String::new();
    collect_text(element, skip, &mut out);
    collapse_whitespace(&out)
}

fn collect_text(element: ElementRef, skip: &[&str], out: &mut String) {
    for child in element.children() {
        if let Some(el) = ElementRef::wrap(child) {
            if skip.contains(&el.value().name()) {
                continue;
            }
            collect_text(el, skip, out);
        } else if let Some(text) = child.value().as_text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(trimmed);
            }
        }
    }
}

/// 연속 공백 정리
fn collapse_whitespace(text: &str) -> String {
    if let Ok(re) = regex::Regex::new(r"\s+") {
        re.replace_all(text, " ").trim().to_string()
    } else {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

// ============================================================================
// PDF Extraction
// ============================================================================

async fn extract_pdf_document(
    bytes: Vec<u8>,
    source: &Source,
    min_chars: usize,
) -> Result<ExtractedDocument, IngestError> {
    // PDF 파싱은 CPU 바운드이므로 블로킹 스레드에서 수행
    let pages = tokio::task::spawn_blocking(move || pdf::extract_pdf_pages(&bytes))
        .await
        .map_err(|e| IngestError::UnsupportedType(format!("PDF 추출 작업 실패: {}", e)))?
        .map_err(|e| IngestError::UnsupportedType(format!("PDF 파싱 실패: {}", e)))?;

    // 페이지별 텍스트를 이어 붙임
    let text = pages.join("\n\n");
    let chars = text.chars().count();

    if chars < min_chars {
        return Err(IngestError::LowContent { chars });
    }

    let title = derive_title(None, &text, source);

    Ok(ExtractedDocument::new(source.clone(), title, text))
}

// ============================================================================
// Title Extraction
// ============================================================================

/// 문서가 선언한 제목 추출 (<title> 우선, <h1> 폴백)
fn extract_declared_title(document: &Html) -> Option<String> {
    for selector_str in ["title", "h1"] {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = document.select(&selector).next() {
                let title = element.text().collect::<String>().trim().to_string();
                if !title.is_empty() {
                    return Some(title);
                }
            }
        }
    }

    None
}

/// 제목 결정: 선언된 제목 → 첫 머리글 형태의 줄 → 소스 식별자
fn derive_title(declared: Option<String>, text: &str, source: &Source) -> String {
    declared
        .or_else(|| heading_line(text))
        .unwrap_or_else(|| source.identifier().to_string())
}

/// 첫 번째 머리글 형태의 줄 (비어 있지 않고 80자 이하)
fn heading_line(text: &str) -> Option<String> {
    let line = text.lines().map(str::trim).find(|line| !line.is_empty())?;

    if line.chars().count() <= 80 {
        Some(line.to_string())
    } else {
        None
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn web_source() -> Source {
        Source::classify("https://example.com/article").unwrap()
    }

    fn long_sentence() -> String {
        "This is the main article body with enough characters to pass the gate. ".repeat(3)
    }

    #[test]
    fn test_article_strategy_preferred() {
        let html = format!(
            r#"<html><head><title>My Article</title></head>
               <body>
                 <nav>Navigation menu links</nav>
                 <article>{}</article>
                 <footer>Footer boilerplate</footer>
               </body></html>"#,
            long_sentence()
        );

        let doc = extract_web(&html, &web_source(), MIN_CONTENT_CHARS).unwrap();
        assert!(doc.text.contains("main article body"));
        assert!(!doc.text.contains("Navigation"));
        assert_eq!(doc.title, "My Article");
    }

    #[test]
    fn test_fallback_to_full_text() {
        // 본문 컨테이너 없음 - 범용 전략으로 폴백
        let html = format!(
            r#"<html><body>
                 <script>var tracking = "noise";</script>
                 <div><p>{}</p></div>
               </body></html>"#,
            long_sentence()
        );

        let doc = extract_web(&html, &web_source(), MIN_CONTENT_CHARS).unwrap();
        assert!(doc.text.contains("main article body"));
        assert!(!doc.text.contains("tracking"));
    }

    #[test]
    fn test_full_text_skips_page_chrome() {
        let html = format!(
            r#"<html><body>
                 <header>Site header</header>
                 <nav>Menu</nav>
                 <div>{}</div>
                 <footer>Copyright</footer>
               </body></html>"#,
            long_sentence()
        );

        let doc = extract_web(&html, &web_source(), MIN_CONTENT_CHARS).unwrap();
        assert!(!doc.text.contains("Site header"));
        assert!(!doc.text.contains("Copyright"));
    }

    #[test]
    fn test_low_content_rejected() {
        let html = "<html><body><p>too short</p></body></html>";

        let err = extract_web(html, &web_source(), MIN_CONTENT_CHARS).unwrap_err();
        assert_eq!(err.kind(), "low_content");
        match err {
            IngestError::LowContent { chars } => assert!(chars > 0),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_short_article_falls_back_to_body() {
        // article은 분량 미달이지만 body 전체는 게이트 통과
        let html = format!(
            r#"<html><body>
                 <article>stub</article>
                 <div>{}</div>
               </body></html>"#,
            long_sentence()
        );

        let doc = extract_web(&html, &web_source(), MIN_CONTENT_CHARS).unwrap();
        assert!(doc.text.contains("main article body"));
    }

    #[test]
    fn test_title_h1_fallback() {
        let html = format!(
            r#"<html><head><title></title></head>
               <body><h1>Heading Title</h1><article>{}</article></body></html>"#,
            long_sentence()
        );

        let doc = extract_web(&html, &web_source(), MIN_CONTENT_CHARS).unwrap();
        assert_eq!(doc.title, "Heading Title");
    }

    #[test]
    fn test_heading_line() {
        assert_eq!(
            heading_line("Introduction\n\nLong body follows."),
            Some("Introduction".to_string())
        );

        // 80자를 넘는 첫 줄은 머리글로 보지 않음
        let wall_of_text = "x".repeat(120);
        assert_eq!(heading_line(&wall_of_text), None);

        assert_eq!(heading_line("   \n\n"), None);
    }

    #[test]
    fn test_derive_title_source_fallback() {
        let source = web_source();
        let wall_of_text = "y".repeat(120);

        let title = derive_title(None, &wall_of_text, &source);
        assert_eq!(title, "https://example.com/article");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("a  b\n\tc "), "a b c");
    }

    #[tokio::test]
    async fn test_extract_invalid_pdf() {
        let source = Source::classify("broken.pdf").unwrap();
        let raw = RawContent::Pdf {
            bytes: b"not a pdf at all".to_vec(),
        };

        let err = extract(raw, &source, MIN_CONTENT_CHARS).await.unwrap_err();
        assert_eq!(err.kind(), "unsupported_type");
    }
}
