//! 콘텐츠 중복 제거 모듈
//!
//! 정규화된 문서 텍스트의 해시를 지문으로 사용합니다.
//! 지문이 같은 두 문서는 출처가 달라도 중복으로 간주합니다.

use std::collections::HashSet;
use std::fmt;
use std::sync::Mutex;

use sha2::{Digest, Sha256};

// ============================================================================
// Fingerprint
// ============================================================================

/// 콘텐츠 지문 - 정규화된 텍스트의 128비트 해시 (hex)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// 문서 텍스트에서 지문 계산
    ///
    /// 공백 차이만 있는 텍스트는 같은 지문을 갖도록
    /// 연속 공백을 단일 공백으로 정규화한 뒤 해싱합니다.
    pub fn of_text(text: &str) -> Self {
        let normalized = normalize_text(text);

        let digest = Sha256::digest(normalized.as_bytes());
        // 앞 16바이트(128비트)만 사용
        let hex: String = digest[..16].iter().map(|b| format!("{:02x}", b)).collect();

        Self(hex)
    }

    /// 저장된 해시 문자열에서 복원 (점진적 수집 시드용)
    pub fn from_stored(hex: String) -> Self {
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 지문 계산용 텍스트 정규화 (공백 접기 + 트림)
fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// Dedup Registry
// ============================================================================

/// 중복 제거 레지스트리
///
/// 한 번의 수집 실행 동안 수락된 지문 집합을 보관합니다.
/// 전역 상태가 아니라 파이프라인이 소유하는 객체이므로
/// 테스트를 병렬로 격리해서 돌릴 수 있습니다.
pub struct DedupRegistry {
    seen: Mutex<HashSet<Fingerprint>>,
}

impl DedupRegistry {
    /// 빈 레지스트리 생성 (실행마다 새로 시작)
    pub fn new() -> Self {
        Self {
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// 이미 알고 있는 지문으로 시드된 레지스트리 생성
    ///
    /// 저장소에 이미 들어간 문서를 재수집하지 않는 점진적 모드용.
    pub fn with_known(known: impl IntoIterator<Item = Fingerprint>) -> Self {
        Self {
            seen: Mutex::new(known.into_iter().collect()),
        }
    }

    /// 지문 등록 시도
    ///
    /// 확인과 삽입이 락 아래에서 단일 원자 단계로 수행됩니다.
    /// 같은 지문에 대해 최초 호출자만 true를 받습니다.
    pub fn register(&self, fingerprint: &Fingerprint) -> bool {
        let mut seen = self
            .seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        seen.insert(fingerprint.clone())
    }

    /// 등록된 지문 개수
    pub fn len(&self) -> usize {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DedupRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
