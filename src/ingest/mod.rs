//! 문서 수집 파이프라인
//!
//! 소스 목록을 받아 페치 → 추출 → 중복 제거 → 메타데이터 부착을
//! 소스별 독립 작업 단위로 동시 수행합니다. 동시 실행 수는
//! `max_concurrent`로 제한되며, 한 소스의 실패는 형제 작업을
//! 취소하거나 배치를 중단시키지 않습니다.
//!
//! 설정 오류(빈 배치, 잘못된 청킹 설정)만 디스패치 전에 즉시
//! 실패합니다.

pub mod dedup;
pub mod document;
pub mod extract;
pub mod fetcher;
mod pdf;
pub mod source;

use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;

use crate::error::IngestError;
use crate::knowledge::ChunkConfig;

pub use dedup::{DedupRegistry, Fingerprint};
pub use document::{AcceptedDocument, Chunk, ChunkMetadata, ExtractedDocument};
pub use extract::MIN_CONTENT_CHARS;
pub use fetcher::{RawContent, SourceFetcher, DEFAULT_FETCH_TIMEOUT};
pub use source::{read_source_list, Source, SourceKind};

// ============================================================================
// Configuration
// ============================================================================

/// 수집 파이프라인 설정
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// 동시 처리 소스 수 상한
    pub max_concurrent: usize,
    /// 청킹 설정
    pub chunk: ChunkConfig,
    /// 최소 콘텐츠 길이 (문자 수)
    pub min_content_chars: usize,
    /// 소스당 페치 타임아웃
    pub fetch_timeout: Duration,
    /// TLS 인증서 검증 생략 (명시적 opt-in)
    pub insecure: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            chunk: ChunkConfig::default(),
            min_content_chars: MIN_CONTENT_CHARS,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            insecure: false,
        }
    }
}

impl IngestConfig {
    /// 설정 검증 (디스패치 시작 전)
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.max_concurrent == 0 {
            return Err(IngestError::Config(
                "max_concurrent는 1 이상이어야 합니다".to_string(),
            ));
        }

        self.chunk.validate()
    }
}

// ============================================================================
// Batch Outcome
// ============================================================================

/// 소스별 실패 기록 (원인 소스로 추적 가능)
#[derive(Debug)]
pub struct SourceFailure {
    pub source: Source,
    pub reason: IngestError,
}

/// 배치 처리 결과
///
/// 모든 소스는 수락 또는 실패 중 정확히 하나의 종착 상태에
/// 도달합니다: `accepted.len() + failures.len() == 소스 수`.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub accepted: Vec<AcceptedDocument>,
    pub failures: Vec<SourceFailure>,
}

impl BatchOutcome {
    pub fn accepted_count(&self) -> usize {
        self.accepted.len()
    }

    /// 중복으로 거부된 소스 수 (다른 실패와 별도 집계)
    pub fn duplicate_count(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| f.reason.is_duplicate())
            .count()
    }

    /// 중복을 제외한 실패 수
    pub fn error_count(&self) -> usize {
        self.failures.len() - self.duplicate_count()
    }

    pub fn total(&self) -> usize {
        self.accepted.len() + self.failures.len()
    }
}

// ============================================================================
// Ingest Pipeline
// ============================================================================

/// 수집 파이프라인 (배치 코디네이터)
///
/// 중복 레지스트리는 전역 상태가 아니라 파이프라인 인스턴스가
/// 소유하며, 실행 수명 동안만 유지됩니다.
pub struct IngestPipeline {
    fetcher: SourceFetcher,
    dedup: DedupRegistry,
    config: IngestConfig,
}

impl IngestPipeline {
    /// 새 파이프라인 생성 (실행마다 빈 중복 레지스트리)
    pub fn new(config: IngestConfig) -> Result<Self, IngestError> {
        Self::with_registry(config, DedupRegistry::new())
    }

    /// 저장소에 이미 있는 지문으로 시드된 파이프라인 생성 (점진적 수집)
    pub fn with_known_fingerprints(
        config: IngestConfig,
        known: impl IntoIterator<Item = Fingerprint>,
    ) -> Result<Self, IngestError> {
        Self::with_registry(config, DedupRegistry::with_known(known))
    }

    fn with_registry(config: IngestConfig, dedup: DedupRegistry) -> Result<Self, IngestError> {
        config.validate()?;

        let fetcher = SourceFetcher::new(config.fetch_timeout, config.insecure)
            .map_err(|e| IngestError::Config(format!("페처 초기화 실패: {}", e)))?;

        Ok(Self {
            fetcher,
            dedup,
            config,
        })
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// 소스 배치 처리
    ///
    /// 최대 `max_concurrent`개의 작업 단위가 동시에 진행됩니다.
    /// 반환 시점에는 모든 소스가 종착 상태에 도달해 있습니다.
    /// 결과 순서는 완료 순서이며 제출 순서와 다를 수 있습니다.
    pub async fn process_batch(&self, sources: Vec<Source>) -> Result<BatchOutcome, IngestError> {
        if sources.is_empty() {
            return Err(IngestError::Config(
                "소스 목록이 비어 있습니다".to_string(),
            ));
        }

        tracing::info!(
            "Processing batch of {} sources (max {} concurrent)",
            sources.len(),
            self.config.max_concurrent
        );

        let results: Vec<(Source, Result<AcceptedDocument, IngestError>)> =
            futures::stream::iter(sources.into_iter().map(|source| async move {
                let result = self.process_source(&source).await;
                (source, result)
            }))
            .buffer_unordered(self.config.max_concurrent)
            .collect()
            .await;

        let mut outcome = BatchOutcome::default();
        for (source, result) in results {
            match result {
                Ok(doc) => outcome.accepted.push(doc),
                Err(reason) => outcome.failures.push(SourceFailure { source, reason }),
            }
        }

        tracing::info!(
            "Batch done: {} accepted, {} duplicates, {} failed",
            outcome.accepted_count(),
            outcome.duplicate_count(),
            outcome.error_count()
        );

        Ok(outcome)
    }

    /// 소스 하나의 작업 단위: 페치 → 추출 → 지문 등록 → 메타데이터 부착
    async fn process_source(&self, source: &Source) -> Result<AcceptedDocument, IngestError> {
        let raw = self.fetcher.fetch(source).await?;
        let doc = extract::extract(raw, source, self.config.min_content_chars).await?;

        let fingerprint = Fingerprint::of_text(&doc.text);
        if !self.dedup.register(&fingerprint) {
            tracing::info!("Skipping duplicate content from {}", source);
            return Err(IngestError::Duplicate);
        }

        Ok(AcceptedDocument::assemble(doc, fingerprint, Utc::now()))
    }

    /// 수락된 문서를 파이프라인 청킹 설정으로 분할
    pub fn chunk(&self, document: &AcceptedDocument) -> Result<Vec<Chunk>, IngestError> {
        crate::knowledge::chunk_document(document, &self.config.chunk)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn article_page(body: &str) -> String {
        format!("<html><body><article>{}</article></body></html>", body)
    }

    fn classify(url: &str) -> Source {
        Source::classify(url).unwrap()
    }

    #[tokio::test]
    async fn test_empty_batch_is_config_error() {
        let pipeline = IngestPipeline::new(IngestConfig::default()).unwrap();
        let err = pipeline.process_batch(vec![]).await.unwrap_err();
        assert_eq!(err.kind(), "config_error");
    }

    #[test]
    fn test_invalid_chunk_config_fails_before_dispatch() {
        let config = IngestConfig {
            chunk: ChunkConfig::new(50, 50),
            ..Default::default()
        };
        let err = IngestPipeline::new(config).unwrap_err();
        assert_eq!(err.kind(), "config_error");

        let config = IngestConfig {
            max_concurrent: 0,
            ..Default::default()
        };
        assert!(IngestPipeline::new(config).is_err());
    }

    #[tokio::test]
    async fn test_every_source_reaches_terminal_outcome() {
        let server = MockServer::start_async().await;
        let body = "unique article content ".repeat(20);

        server
            .mock_async(|when, then| {
                when.method(GET).path("/a");
                then.status(200).body(article_page(&body));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/b");
                then.status(200).body(article_page(&body));
            })
            .await;

        let sources = vec![
            classify(&server.url("/a")),
            classify(&server.url("/b")),
            classify("/nonexistent/dir/paper.pdf"),
        ];
        let total = sources.len();

        let pipeline = IngestPipeline::new(IngestConfig::default()).unwrap();
        let outcome = pipeline.process_batch(sources).await.unwrap();

        assert_eq!(outcome.total(), total);
        // 같은 본문을 가진 두 URL 중 하나만 수락
        assert_eq!(outcome.accepted_count(), 1);
        assert_eq!(outcome.duplicate_count(), 1);
        assert_eq!(outcome.error_count(), 1);

        let not_found = outcome
            .failures
            .iter()
            .find(|f| f.reason.kind() == "not_found")
            .expect("missing pdf should fail with not_found");
        assert!(not_found.source.identifier().ends_with("paper.pdf"));
    }

    #[tokio::test]
    async fn test_mixed_batch_with_timeout_and_chunking() {
        let server = MockServer::start_async().await;
        let body = "x".repeat(5000);

        server
            .mock_async(|when, then| {
                when.method(GET).path("/long");
                then.status(200).body(article_page(&body));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/long-copy");
                then.status(200).body(article_page(&body));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/slow");
                then.status(200)
                    .delay(Duration::from_secs(2))
                    .body("late");
            })
            .await;

        let config = IngestConfig {
            chunk: ChunkConfig::new(4000, 20),
            fetch_timeout: Duration::from_millis(200),
            ..Default::default()
        };
        let pipeline = IngestPipeline::new(config).unwrap();

        let outcome = pipeline
            .process_batch(vec![
                classify(&server.url("/long")),
                classify(&server.url("/long-copy")),
                classify(&server.url("/slow")),
            ])
            .await
            .unwrap();

        assert_eq!(outcome.accepted_count(), 1);
        assert_eq!(outcome.duplicate_count(), 1);
        assert!(outcome
            .failures
            .iter()
            .any(|f| f.reason.kind() == "timeout"));

        // 5000자 문서는 4000/20 설정에서 정확히 2개 청크
        let chunks = pipeline.chunk(&outcome.accepted[0]).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(
            chunks[0].metadata.content_hash,
            outcome.accepted[0].content_hash.as_str()
        );
    }

    #[tokio::test]
    async fn test_low_content_source_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/thin");
                then.status(200).body("<html><body><p>tiny</p></body></html>");
            })
            .await;

        let pipeline = IngestPipeline::new(IngestConfig::default()).unwrap();
        let outcome = pipeline
            .process_batch(vec![classify(&server.url("/thin"))])
            .await
            .unwrap();

        assert_eq!(outcome.accepted_count(), 0);
        assert_eq!(outcome.failures[0].reason.kind(), "low_content");
    }

    #[tokio::test]
    async fn test_seeded_registry_rejects_stored_content() {
        let server = MockServer::start_async().await;
        let body = "previously stored article body ".repeat(10);
        server
            .mock_async(|when, then| {
                when.method(GET).path("/again");
                then.status(200).body(article_page(&body));
            })
            .await;

        // 첫 실행에서 수락된 문서의 지문 확보
        let first = IngestPipeline::new(IngestConfig::default()).unwrap();
        let outcome = first
            .process_batch(vec![classify(&server.url("/again"))])
            .await
            .unwrap();
        let hash = outcome.accepted[0].content_hash.clone();

        // 같은 지문으로 시드된 두 번째 실행은 중복으로 거부
        let second =
            IngestPipeline::with_known_fingerprints(IngestConfig::default(), vec![hash]).unwrap();
        let outcome = second
            .process_batch(vec![classify(&server.url("/again"))])
            .await
            .unwrap();

        assert_eq!(outcome.accepted_count(), 0);
        assert_eq!(outcome.duplicate_count(), 1);
    }
}
