//! ragline - 다중 소스 문서 수집 RAG 파이프라인
//!
//! 웹 페이지와 로컬 PDF를 동시성 제한 하에 수집하고, 텍스트를
//! 추출·중복 제거한 뒤 메타데이터가 붙은 청크로 분할해
//! 시맨틱 검색 저장소(SQLite + LanceDB)에 넣습니다.

pub mod cli;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod knowledge;
pub mod qa;

// Re-exports
pub use embedding::{get_api_key, has_api_key, EmbeddingProvider, GeminiEmbedding};
pub use error::IngestError;
pub use ingest::{
    AcceptedDocument, BatchOutcome, Chunk, ChunkMetadata, DedupRegistry, ExtractedDocument,
    Fingerprint, IngestConfig, IngestPipeline, RawContent, Source, SourceFailure, SourceFetcher,
    SourceKind,
};
pub use knowledge::{
    chunk_document, get_data_dir, ChunkConfig, DocumentSummary, KeywordMatch, KnowledgeStore,
    LanceVectorStore, RetrievedChunk, Retriever, StoreStats, StoredChunk, VectorEntry,
    VectorSearchResult, VectorStore,
};
pub use qa::{answer, Answer, GeminiGenerator};
