//! 검색기 - 청크 저장소 + 벡터 저장소 + 임베더 조합
//!
//! 수집 파이프라인이 만든 청크를 인덱싱하고, 질의 텍스트를 임베딩해
//! 최근접 청크를 유사도 순으로 돌려줍니다. FTS5 키워드 검색은
//! 별도 경로로 노출됩니다 (점수 통합 없음).

use std::path::Path;

use anyhow::{Context, Result};

use crate::embedding::{EmbeddingProvider, GeminiEmbedding};
use crate::ingest::Chunk;

use super::lance::LanceVectorStore;
use super::store::{get_data_dir, KeywordMatch, KnowledgeStore, StoredChunk};
use super::vector::{VectorEntry, VectorStore};

// ============================================================================
// Types
// ============================================================================

/// 검색된 청크 (유사도 스코어 포함)
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk: StoredChunk,
    /// 유사도 스코어 (높을수록 가까움)
    pub score: f32,
}

// ============================================================================
// Retriever
// ============================================================================

/// 시맨틱 검색기
pub struct Retriever {
    store: KnowledgeStore,
    vector: LanceVectorStore,
    embedder: GeminiEmbedding,
}

impl Retriever {
    /// 기본 데이터 디렉토리(~/.ragline/)로 생성
    pub async fn new() -> Result<Self> {
        let data_dir = get_data_dir();
        Self::with_data_dir(&data_dir).await
    }

    /// 지정된 데이터 디렉토리로 생성
    pub async fn with_data_dir(data_dir: &Path) -> Result<Self> {
        if !data_dir.exists() {
            std::fs::create_dir_all(data_dir).context("Failed to create data directory")?;
        }

        let store = KnowledgeStore::open(&data_dir.join("knowledge.db"))
            .context("Failed to open knowledge store")?;

        let vector = LanceVectorStore::open(&data_dir.join("vectors.lance"))
            .await
            .context("Failed to open vector store")?;

        let embedder = GeminiEmbedding::from_env().context("Failed to create embedder")?;

        Ok(Self {
            store,
            vector,
            embedder,
        })
    }

    /// 청크 저장소 접근
    pub fn store(&self) -> &KnowledgeStore {
        &self.store
    }

    /// 청크 배치 인덱싱
    ///
    /// 청크 행을 순서대로 저장한 뒤 임베딩을 생성해 벡터 저장소에
    /// 넣습니다. 저장된 청크 수를 반환합니다.
    pub async fn index_chunks(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let ids = self
            .store
            .add_chunks(chunks)
            .context("Failed to store chunks")?;

        let mut entries = Vec::with_capacity(chunks.len());
        for (id, chunk) in ids.iter().zip(chunks) {
            let embedding = self
                .embedder
                .embed(&chunk.text)
                .await
                .context("Failed to embed chunk")?;

            entries.push(VectorEntry {
                chunk_id: *id,
                content_hash: chunk.metadata.content_hash.clone(),
                chunk_index: chunk.metadata.chunk_index as i32,
                text: chunk.text.clone(),
                embedding,
            });
        }

        self.vector
            .insert_batch(&entries)
            .await
            .context("Failed to insert vectors")?;

        Ok(entries.len())
    }

    /// 시맨틱 검색
    ///
    /// 질의를 임베딩하고 벡터 검색 결과를 청크 행으로 복원해
    /// 유사도 순으로 반환합니다.
    pub async fn query(&self, text: &str, limit: usize) -> Result<Vec<RetrievedChunk>> {
        let embedding = self
            .embedder
            .embed(text)
            .await
            .context("Failed to embed query")?;

        let hits = self
            .vector
            .search(&embedding, limit)
            .await
            .context("Vector search failed")?;

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            if let Some(chunk) = self.store.get_chunk(hit.chunk_id)? {
                results.push(RetrievedChunk {
                    chunk,
                    score: hit.similarity,
                });
            } else {
                tracing::warn!("Vector hit for missing chunk row {}", hit.chunk_id);
            }
        }

        Ok(results)
    }

    /// FTS5 키워드 검색 (임베딩 없이)
    pub fn keyword(&self, query: &str, limit: usize) -> Result<Vec<KeywordMatch>> {
        self.store.search_keyword(query, limit)
    }

    /// 벡터 인덱스의 청크 수
    pub async fn vector_count(&self) -> Result<usize> {
        self.vector.count().await
    }
}
