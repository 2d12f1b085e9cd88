//! 질의응답 모듈
//!
//! 검색된 청크를 컨텍스트로 묶어 Gemini 생성 모델에 질문을 보내고,
//! 답변 텍스트와 사용된 출처 목록을 돌려줍니다.
//! 생성 모델 자체는 "프롬프트를 주면 답을 돌려주는" 불투명한
//! 협력자입니다.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::embedding::get_api_key;
use crate::knowledge::{RetrievedChunk, Retriever};

/// Gemini 생성 API 엔드포인트
const GEMINI_GENERATE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

/// 질의응답 프롬프트
const ANSWER_PROMPT: &str = r#"다음 컨텍스트를 사용하여 질문에 답하세요.

지시사항:
1. 컨텍스트에 있는 정보만 사용합니다
2. 컨텍스트에 답이 없으면 모른다고 답합니다
3. 간결하고 정확하게 답합니다

컨텍스트:
{context}

질문: {question}

답변:"#;

// ============================================================================
// Types
// ============================================================================

/// 질의응답 결과
#[derive(Debug, Clone)]
pub struct Answer {
    /// 생성된 답변
    pub text: String,
    /// 답변에 사용된 청크의 출처 (중복 제거, 유사도 순)
    pub sources: Vec<String>,
}

// ============================================================================
// Gemini Generator
// ============================================================================

/// Gemini 텍스트 생성 클라이언트
pub struct GeminiGenerator {
    api_key: String,
    client: reqwest::Client,
}

impl GeminiGenerator {
    pub fn new(api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { api_key, client })
    }

    /// 환경변수에서 API 키를 읽어 생성
    pub fn from_env() -> Result<Self> {
        Self::new(get_api_key()?)
    }

    /// 프롬프트로 텍스트 생성
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![GenerateContent {
                parts: vec![TextPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.1,
                max_output_tokens: 1024,
            },
        };

        let response = self
            .client
            .post(GEMINI_GENERATE_URL)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send generation request")?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            anyhow::bail!("Gemini API error ({}): {}", status, body);
        }

        let generate_response: GenerateResponse =
            serde_json::from_str(&body).context("Failed to parse generation response")?;

        let text = generate_response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .unwrap_or_default();

        if text.is_empty() {
            tracing::warn!("Empty answer from generation model");
        }

        Ok(text)
    }
}

// ============================================================================
// QA Flow
// ============================================================================

/// 질문에 답변
///
/// 검색 → 프롬프트 구성 → 생성 순서로 진행합니다.
/// 관련 청크가 없으면 API 호출 없이 빈 답변을 돌려줍니다.
pub async fn answer(
    generator: &GeminiGenerator,
    retriever: &Retriever,
    question: &str,
    top_k: usize,
) -> Result<Answer> {
    let retrieved = retriever.query(question, top_k).await?;

    if retrieved.is_empty() {
        return Ok(Answer {
            text: "관련 문서를 찾을 수 없습니다.".to_string(),
            sources: vec![],
        });
    }

    let prompt = build_prompt(question, &retrieved);
    let text = generator.generate(&prompt).await?;

    Ok(Answer {
        text,
        sources: source_list(&retrieved),
    })
}

/// 검색된 청크로 질의응답 프롬프트 구성
pub fn build_prompt(question: &str, chunks: &[RetrievedChunk]) -> String {
    let context = chunks
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "[{}] {} ({})\n{}",
                i + 1,
                r.chunk.title,
                r.chunk.source_identifier,
                r.chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    ANSWER_PROMPT
        .replace("{context}", &context)
        .replace("{question}", question)
}

/// 출처 목록 (순서 유지, 중복 제거)
fn source_list(chunks: &[RetrievedChunk]) -> Vec<String> {
    let mut sources = Vec::new();
    for r in chunks {
        if !sources.contains(&r.chunk.source_identifier) {
            sources.push(r.chunk.source_identifier.clone());
        }
    }
    sources
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<GenerateContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GenerateContent {
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Vec<TextPart>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::StoredChunk;
    use chrono::Utc;

    fn retrieved(id: i64, source: &str, text: &str) -> RetrievedChunk {
        RetrievedChunk {
            chunk: StoredChunk {
                id,
                source_type: "web".to_string(),
                source_identifier: source.to_string(),
                content_hash: "abc123".to_string(),
                processed_at: Utc::now(),
                title: "제목".to_string(),
                content_length: text.len(),
                chunk_index: 0,
                text: text.to_string(),
            },
            score: 0.9,
        }
    }

    #[test]
    fn test_build_prompt_includes_context_and_question() {
        let chunks = vec![
            retrieved(1, "https://example.com/a", "첫 번째 청크 내용"),
            retrieved(2, "https://example.com/b", "두 번째 청크 내용"),
        ];

        let prompt = build_prompt("이 문서는 무엇에 관한 것인가요?", &chunks);

        assert!(prompt.contains("첫 번째 청크 내용"));
        assert!(prompt.contains("두 번째 청크 내용"));
        assert!(prompt.contains("이 문서는 무엇에 관한 것인가요?"));
        assert!(prompt.contains("[1]"));
        assert!(prompt.contains("[2]"));
    }

    #[test]
    fn test_source_list_dedup_preserves_order() {
        let chunks = vec![
            retrieved(1, "https://example.com/a", "x"),
            retrieved(2, "https://example.com/b", "y"),
            retrieved(3, "https://example.com/a", "z"),
        ];

        let sources = source_list(&chunks);
        assert_eq!(
            sources,
            vec!["https://example.com/a", "https://example.com/b"]
        );
    }
}
