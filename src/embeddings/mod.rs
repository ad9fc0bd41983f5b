//! Embedding capability seam.
//!
//! The vector store computes embeddings through [`EmbeddingProvider`] so that
//! tests can swap in a deterministic mock while production code talks to a
//! remote embeddings endpoint.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::ResearchError;

/// Default public embeddings endpoint.
const OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Turns text into fixed-size numeric vectors for similarity comparison.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds every input, preserving order. One vector per input.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ResearchError>;

    /// Short identifier for logging and telemetry.
    fn id(&self) -> &str;
}

// ── OpenAI backend ─────────────────────────────────────────────────────

/// Remote embeddings backend (`POST /v1/embeddings`).
pub struct OpenAiEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiEmbeddingProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: OPENAI_BASE_URL.to_string(),
        }
    }

    /// Points the provider at a different host (mock servers in tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ResearchError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(ResearchError::Embedding(format!(
                "embeddings endpoint returned {status}: {detail}"
            )));
        }

        let mut parsed: EmbeddingResponse = response.json().await?;
        if parsed.data.len() != texts.len() {
            return Err(ResearchError::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }
        parsed.data.sort_by_key(|row| row.index);
        Ok(parsed.data.into_iter().map(|row| row.embedding).collect())
    }

    fn id(&self) -> &str {
        &self.model
    }
}

// ── Deterministic mock ─────────────────────────────────────────────────

/// Dimensionality of [`MockEmbeddingProvider`] vectors.
pub const MOCK_EMBEDDING_DIM: usize = 64;

/// Deterministic hashed bag-of-words embedder for tests and offline runs.
///
/// Identical text always produces the identical vector; texts sharing tokens
/// land near each other under cosine distance, which is enough for retrieval
/// ordering to be meaningful in tests.
#[derive(Clone, Debug, Default)]
pub struct MockEmbeddingProvider;

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self
    }

    fn embed_one(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; MOCK_EMBEDDING_DIM];
        for token in text.to_lowercase().split_whitespace() {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let bucket = (hasher.finish() as usize) % MOCK_EMBEDDING_DIM;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ResearchError> {
        Ok(texts.iter().map(|text| Self::embed_one(text)).collect())
    }

    fn id(&self) -> &str {
        "mock"
    }
}
