//! Knowledge 모듈 - 청크 저장 및 시맨틱 검색
//!
//! - Chunker: 고정 윈도우 텍스트 분할
//! - SQLite: 청크 + 메타데이터 저장, FTS5 키워드 검색
//! - LanceDB: 벡터 검색 (ANN)
//! - Retriever: 임베딩 기반 시맨틱 검색 조합

mod chunker;
mod lance;
mod retriever;
mod store;
mod vector;

// Re-exports
pub use chunker::{chunk_document, ChunkConfig};
pub use lance::LanceVectorStore;
pub use retriever::{RetrievedChunk, Retriever};
pub use store::{
    get_data_dir, DocumentSummary, KeywordMatch, KnowledgeStore, StoreStats, StoredChunk,
};
pub use vector::{
    cosine_similarity, VectorEntry, VectorSearchResult, VectorStore, EMBEDDING_DIMENSION,
};
