//! CLI 모듈
//!
//! ragline CLI 명령어 정의 및 구현

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::embedding::has_api_key;
use crate::error::IngestError;
use crate::ingest::{
    read_source_list, BatchOutcome, Fingerprint, IngestConfig, IngestPipeline, Source,
};
use crate::knowledge::{
    get_data_dir, ChunkConfig, KnowledgeStore, LanceVectorStore, Retriever, VectorStore,
};
use crate::qa::{answer, GeminiGenerator};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "ragline")]
#[command(version, about = "다중 소스 문서 수집 RAG 파이프라인", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// URL/PDF 소스를 수집하여 지식베이스에 추가
    Ingest {
        /// 수집할 소스 (URL 또는 PDF 경로)
        sources: Vec<String>,

        /// 소스 목록 파일 (한 줄에 식별자 하나)
        #[arg(long)]
        sources_file: Option<PathBuf>,

        /// 동시 처리 소스 수
        #[arg(long, default_value_t = 5)]
        max_concurrent: usize,

        /// 청크 크기 (문자 수)
        #[arg(long, default_value_t = 4000)]
        chunk_size: usize,

        /// 청크 중첩 (문자 수)
        #[arg(long, default_value_t = 20)]
        chunk_overlap: usize,

        /// TLS 인증서 검증 생략 (테스트 환경 전용)
        #[arg(long)]
        insecure: bool,

        /// 저장소의 기존 지문으로 중복 검사 시드 (점진적 수집)
        #[arg(long)]
        incremental: bool,

        /// 저장/임베딩 없이 파이프라인만 실행
        #[arg(long)]
        dry_run: bool,
    },

    /// 지식베이스 검색
    Query {
        /// 검색 쿼리
        query: String,

        /// 결과 개수 제한
        #[arg(short = 'k', long, default_value_t = 5)]
        limit: usize,

        /// FTS5 키워드 검색 사용 (API 키 불필요)
        #[arg(long)]
        keyword: bool,
    },

    /// 질문에 대한 답변 생성
    Ask {
        /// 질문
        question: String,

        /// 컨텍스트로 사용할 청크 수
        #[arg(long, default_value_t = 3)]
        top_k: usize,
    },

    /// 저장된 문서 목록
    List {
        /// 결과 개수 제한
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Ingest {
            sources,
            sources_file,
            max_concurrent,
            chunk_size,
            chunk_overlap,
            insecure,
            incremental,
            dry_run,
        } => {
            cmd_ingest(
                sources,
                sources_file,
                max_concurrent,
                chunk_size,
                chunk_overlap,
                insecure,
                incremental,
                dry_run,
            )
            .await
        }
        Commands::Query {
            query,
            limit,
            keyword,
        } => cmd_query(&query, limit, keyword).await,
        Commands::Ask { question, top_k } => cmd_ask(&question, top_k).await,
        Commands::List { limit } => cmd_list(limit),
        Commands::Status => cmd_status().await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 수집 명령어 (ingest)
///
/// 소스 배치를 파이프라인으로 처리하고, 수락된 문서를 청킹해
/// 지식베이스에 인덱싱합니다.
#[allow(clippy::too_many_arguments)]
async fn cmd_ingest(
    sources: Vec<String>,
    sources_file: Option<PathBuf>,
    max_concurrent: usize,
    chunk_size: usize,
    chunk_overlap: usize,
    insecure: bool,
    incremental: bool,
    dry_run: bool,
) -> Result<()> {
    // 소스 식별자 수집 (인자 + 파일)
    let mut identifiers = sources;
    if let Some(ref file) = sources_file {
        identifiers.extend(read_source_list(file)?);
    }

    if identifiers.is_empty() {
        bail!("수집할 소스를 지정해야 합니다 (인자 또는 --sources-file)");
    }

    if !dry_run && !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export GEMINI_API_KEY=your-api-key\n\n\
             API 키 발급: https://aistudio.google.com/app/apikey\n\n\
             저장 없이 파이프라인만 확인하려면 --dry-run을 사용하세요."
        );
    }

    let config = IngestConfig {
        max_concurrent,
        chunk: ChunkConfig::new(chunk_size, chunk_overlap),
        insecure,
        ..Default::default()
    };

    // 분류 - 지원하지 않는 소스는 실패로 기록하고 계속 진행
    let mut classified = Vec::new();
    let mut unsupported: Vec<(String, IngestError)> = Vec::new();
    for raw in identifiers {
        match Source::classify(&raw) {
            Ok(source) => classified.push(source),
            Err(e) => unsupported.push((raw, e)),
        }
    }

    if classified.is_empty() {
        for (raw, e) in &unsupported {
            println!("[!] [{}] {}", e.kind(), raw);
        }
        bail!("처리 가능한 소스가 없습니다");
    }

    let retriever = if dry_run {
        None
    } else {
        Some(Retriever::new().await.context("Retriever 초기화 실패")?)
    };

    // 점진적 모드: 저장소의 기존 지문으로 중복 검사 시드
    let pipeline = if incremental {
        let hashes = match &retriever {
            Some(r) => r.store().known_hashes()?,
            None => KnowledgeStore::open_default()?.known_hashes()?,
        };
        println!("[*] 저장된 지문 {} 건으로 중복 검사 시드", hashes.len());

        IngestPipeline::with_known_fingerprints(
            config,
            hashes.into_iter().map(Fingerprint::from_stored),
        )?
    } else {
        IngestPipeline::new(config)?
    };

    println!(
        "[*] {} 소스 수집 중 (동시 {}개)...",
        classified.len(),
        max_concurrent
    );

    let outcome = pipeline.process_batch(classified).await?;

    // 수락된 문서 청킹 + 인덱싱
    let mut total_chunks = 0usize;
    for doc in &outcome.accepted {
        let chunks = pipeline.chunk(doc)?;
        total_chunks += chunks.len();

        if let Some(ref retriever) = retriever {
            println!(
                "[*] 인덱싱: {} ({} 청크)",
                truncate_text(doc.source.identifier(), 60),
                chunks.len()
            );
            retriever
                .index_chunks(&chunks)
                .await
                .with_context(|| format!("청크 인덱싱 실패: {}", doc.source))?;
        }
    }

    print_ingest_report(&outcome, &unsupported, total_chunks, dry_run);
    Ok(())
}

/// 수집 결과 리포트 출력
///
/// 수락/중복/실패를 구분해서 집계하고, 실패는 소스별 사유를
/// 보여줍니다.
fn print_ingest_report(
    outcome: &BatchOutcome,
    unsupported: &[(String, IngestError)],
    total_chunks: usize,
    dry_run: bool,
) {
    println!();
    println!("[OK] 수집 완료:");
    println!(
        "     수락: {} 문서, {} 청크{}",
        outcome.accepted_count(),
        total_chunks,
        if dry_run { " (저장 안 함)" } else { "" }
    );
    println!("     중복: {} 건", outcome.duplicate_count());
    println!(
        "     실패: {} 건",
        outcome.error_count() + unsupported.len()
    );

    for failure in &outcome.failures {
        if !failure.reason.is_duplicate() {
            println!(
                "       - [{}] {}: {}",
                failure.reason.kind(),
                truncate_text(failure.source.identifier(), 60),
                failure.reason
            );
        }
    }
    for (raw, e) in unsupported {
        println!("       - [{}] {}", e.kind(), truncate_text(raw, 60));
    }
}

/// 검색 명령어 (query)
async fn cmd_query(query: &str, limit: usize, keyword: bool) -> Result<()> {
    println!("[*] 검색 중: \"{}\"", query);

    if keyword {
        // FTS5 키워드 검색 (임베딩 불필요)
        let store = KnowledgeStore::open_default().context("KnowledgeStore 열기 실패")?;
        let results = store.search_keyword(query, limit)?;

        if results.is_empty() {
            println!("\n[!] 검색 결과가 없습니다.");
            return Ok(());
        }

        println!("\n[OK] 키워드 검색 결과 ({} 건):\n", results.len());
        for (i, result) in results.iter().enumerate() {
            println!(
                "{}. [BM25: {:.4}] Chunk #{}",
                i + 1,
                result.bm25_score,
                result.chunk_id
            );
            println!("   제목: {}", result.title);
            println!("   스니펫: {}", truncate_text(&result.snippet, 200));
            println!();
        }
        return Ok(());
    }

    if !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\
             설정: export GEMINI_API_KEY=your-key\n\
             키 없이 검색하려면 --keyword를 사용하세요."
        );
    }

    let retriever = Retriever::new().await.context("Retriever 초기화 실패")?;
    let results = retriever.query(query, limit).await.context("검색 실패")?;

    if results.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", results.len());

    for (i, result) in results.iter().enumerate() {
        let chunk = &result.chunk;
        println!(
            "{}. [점수: {:.4}] [{}] 청크 {}/{}",
            i + 1,
            result.score,
            chunk.source_type,
            chunk.chunk_index,
            chunk.content_hash
        );
        println!("   제목: {}", chunk.title);
        println!("   출처: {}", chunk.source_identifier);
        println!("   내용: {}", truncate_text(&chunk.text, 200));
        println!();
    }

    Ok(())
}

/// 질의응답 명령어 (ask)
async fn cmd_ask(question: &str, top_k: usize) -> Result<()> {
    if !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\
             설정: export GEMINI_API_KEY=your-key"
        );
    }

    println!("[*] 질문: \"{}\"", question);

    let retriever = Retriever::new().await.context("Retriever 초기화 실패")?;
    let generator = GeminiGenerator::from_env().context("생성 모델 초기화 실패")?;

    println!("[*] 관련 청크 검색 및 답변 생성 중...");

    let result = answer(&generator, &retriever, question, top_k)
        .await
        .context("답변 생성 실패")?;

    println!("\n[OK] 답변:\n");
    println!("{}", result.text.trim());

    if !result.sources.is_empty() {
        println!("\n출처:");
        for source in &result.sources {
            println!("  - {}", source);
        }
    }

    Ok(())
}

/// 목록 명령어 (list)
fn cmd_list(limit: usize) -> Result<()> {
    let store = KnowledgeStore::open_default().context("KnowledgeStore 열기 실패")?;

    let docs = store.list_documents(limit).context("문서 목록 조회 실패")?;

    if docs.is_empty() {
        println!("[!] 저장된 문서가 없습니다.");
        return Ok(());
    }

    println!("[OK] 저장된 문서 ({} 건):\n", docs.len());

    for doc in docs {
        println!(
            "  [{}] {} ({} 청크)",
            doc.source_type,
            truncate_text(&doc.title, 40),
            doc.chunk_count
        );
        println!("        출처: {}", doc.source_identifier);
        println!(
            "        {} | hash {}",
            doc.processed_at.format("%Y-%m-%d %H:%M"),
            doc.content_hash
        );
        println!();
    }

    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status() -> Result<()> {
    println!("ragline v{}", env!("CARGO_PKG_VERSION"));
    println!();

    let data_dir = get_data_dir();
    println!("[*] 데이터 디렉토리: {}", data_dir.display());

    if has_api_key() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정");
        println!("    설정: export GEMINI_API_KEY=your-key");
    }

    match KnowledgeStore::open_default() {
        Ok(store) => match store.stats() {
            Ok(stats) => {
                println!(
                    "[OK] 저장된 문서: {} 건 ({} 청크)",
                    stats.document_count, stats.chunk_count
                );
                println!(
                    "     총 콘텐츠: {}",
                    format_bytes(stats.total_text_bytes)
                );
            }
            Err(e) => {
                println!("[!] 통계 조회 실패: {}", e);
            }
        },
        Err(e) => {
            println!("[!] KnowledgeStore 열기 실패: {}", e);
        }
    }

    // 벡터 인덱스는 API 키 없이도 조회 가능
    match LanceVectorStore::open(&data_dir.join("vectors.lance")).await {
        Ok(vector) => match vector.count().await {
            Ok(count) => println!("[OK] 벡터 인덱스: {} 청크", count),
            Err(e) => tracing::debug!("벡터 통계 조회 실패: {}", e),
        },
        Err(e) => tracing::debug!("벡터 저장소 열기 실패: {}", e),
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello world", 5), "hello...");
        assert_eq!(truncate_text("hello\nworld", 20), "hello world");
    }

    #[test]
    fn test_truncate_unicode() {
        let korean = "안녕하세요 세계";
        let truncated = truncate_text(korean, 5);
        assert_eq!(truncated, "안녕하세요...");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }
}
