//! Similarity backends.
//!
//! The backend is chosen once when the pipeline is built. [`HeuristicBackend`] is always
//! available and scores word overlap; [`HashingEmbeddingBackend`] embeds text into a
//! feature-hashed vector space and scores cosine similarity.

use async_trait::async_trait;
use gapfill_model::text::{content_tokens, token_set};
use gapfill_model::{text, GapError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which backend to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Heuristic,
    Hashing,
}

impl std::str::FromStr for BackendKind {
    type Err = GapError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "heuristic" => Ok(Self::Heuristic),
            "hashing" | "embedding" => Ok(Self::Hashing),
            other => Err(GapError::config(format!(
                "unsupported backend '{other}' (expected 'heuristic' or 'hashing')"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Embedding width for the hashing backend
    pub dimension: usize,
    /// Character n-gram size mixed into the hashed features (0 disables)
    pub char_ngram: usize,
    /// Upper bound for one backend call
    pub timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Heuristic,
            dimension: 256,
            char_ngram: 3,
            timeout_ms: 250,
        }
    }
}

impl BackendConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.timeout_ms == 0 {
            return Err("backend timeout_ms must be > 0".to_string());
        }
        if self.kind == BackendKind::Hashing && !(16..=4096).contains(&self.dimension) {
            return Err(format!(
                "hashing dimension ({}) must be within [16, 4096]",
                self.dimension
            ));
        }
        Ok(())
    }
}

/// Capability interface for semantic similarity
#[async_trait]
pub trait SemanticBackend: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// True when scores come from an embedding model rather than word overlap
    fn is_model_backed(&self) -> bool;

    /// Similarity in `[0, 1]` between `query` and each candidate, in order
    async fn similarities(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>>;
}

/// Word-overlap Jaccard; the always-available path
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicBackend;

impl HeuristicBackend {
    #[must_use]
    pub fn score(query: &str, candidate: &str) -> f32 {
        text::jaccard(&token_set(query), &token_set(candidate))
    }
}

#[async_trait]
impl SemanticBackend for HeuristicBackend {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn is_model_backed(&self) -> bool {
        false
    }

    async fn similarities(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>> {
        let query_set = token_set(query);
        Ok(candidates
            .iter()
            .map(|candidate| text::jaccard(&query_set, &token_set(candidate)))
            .collect())
    }
}

/// Feature-hashed bag of words and character n-grams
#[derive(Debug, Clone)]
pub struct HashingEmbeddingBackend {
    dimension: usize,
    char_ngram: usize,
}

impl HashingEmbeddingBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let checked = BackendConfig {
            kind: BackendKind::Hashing,
            ..config.clone()
        };
        checked.validate().map_err(GapError::backend_unavailable)?;
        Ok(Self {
            dimension: config.dimension,
            char_ngram: config.char_ngram,
        })
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Unit-length embedding; empty text embeds to the zero vector
    #[must_use]
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dimension];
        for token in content_tokens(text) {
            self.add_feature(&mut vec, token.as_bytes(), 1.0);
            if self.char_ngram > 0 {
                let padded: Vec<char> = format!("#{token}#").chars().collect();
                for gram in padded.windows(self.char_ngram) {
                    let gram: String = gram.iter().collect();
                    self.add_feature(&mut vec, gram.as_bytes(), 0.5);
                }
            }
        }
        normalize(&mut vec);
        vec
    }

    fn add_feature(&self, vec: &mut [f32], bytes: &[u8], weight: f32) {
        let mut state = fnv1a_64(bytes);
        let bits = splitmix64(&mut state);
        let idx = (bits % self.dimension as u64) as usize;
        let sign = if bits >> 63 == 0 { 1.0 } else { -1.0 };
        vec[idx] += sign * weight;
    }

    #[must_use]
    pub fn similarity(&self, a: &str, b: &str) -> f32 {
        cosine(&self.embed(a), &self.embed(b)).max(0.0)
    }
}

#[async_trait]
impl SemanticBackend for HashingEmbeddingBackend {
    fn name(&self) -> &'static str {
        "hashing"
    }

    fn is_model_backed(&self) -> bool {
        true
    }

    async fn similarities(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>> {
        let query_vec = self.embed(query);
        Ok(candidates
            .iter()
            .map(|candidate| cosine(&query_vec, &self.embed(candidate)).clamp(0.0, 1.0))
            .collect())
    }
}

/// Build the configured backend; a hashing backend that fails to build degrades to heuristics
pub fn select_backend(config: &BackendConfig) -> (Arc<dyn SemanticBackend>, Option<GapError>) {
    match config.kind {
        BackendKind::Heuristic => (Arc::new(HeuristicBackend), None),
        BackendKind::Hashing => match HashingEmbeddingBackend::new(config) {
            Ok(backend) => {
                log::info!("semantic backend: hashing (dimension {})", backend.dimension());
                (Arc::new(backend), None)
            }
            Err(err) => {
                log::warn!("{err}; using heuristic backend");
                (Arc::new(HeuristicBackend), Some(err))
            }
        },
    }
}

fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vec {
        *value /= norm;
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

const fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn heuristic_scores_word_overlap() {
        let scores = HeuristicBackend
            .similarities(
                "digital marketing strategy",
                &["marketing".to_string(), "cooking".to_string()],
            )
            .await
            .unwrap();
        assert!((scores[0] - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(scores[1], 0.0);
    }

    #[test]
    fn hashing_embeddings_are_unit_length_and_deterministic() {
        let backend = HashingEmbeddingBackend::new(&BackendConfig {
            kind: BackendKind::Hashing,
            ..BackendConfig::default()
        })
        .unwrap();
        let a = backend.embed("content marketing plan");
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
        assert_eq!(a, backend.embed("content marketing plan"));
        assert!(backend.embed("").iter().all(|v| *v == 0.0));
    }

    #[test]
    fn hashing_prefers_related_text() {
        let backend = HashingEmbeddingBackend::new(&BackendConfig::default()).unwrap();
        let related = backend.similarity("marketing strategy", "marketing");
        let unrelated = backend.similarity("marketing strategy", "cooking");
        assert!(related > unrelated);
    }

    #[test]
    fn invalid_hashing_config_degrades_to_heuristic() {
        let config = BackendConfig {
            kind: BackendKind::Hashing,
            dimension: 2,
            ..BackendConfig::default()
        };
        let (backend, err) = select_backend(&config);
        assert_eq!(backend.name(), "heuristic");
        assert!(matches!(err, Some(GapError::SemanticBackendUnavailable(_))));
    }

    #[test]
    fn backend_kind_parses() {
        assert_eq!("Hashing".parse::<BackendKind>().unwrap(), BackendKind::Hashing);
        assert!("neural".parse::<BackendKind>().is_err());
    }
}
