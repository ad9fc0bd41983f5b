//! Runtime configuration for the research pipeline.
//!
//! All knobs have compiled defaults matching the documented behavior of the
//! pipeline; [`ResearchConfig::from_env`] layers environment variables on top
//! (after loading `.env` via `dotenvy`). Only the API key is mandatory, and
//! only when a real remote backend is used — tests inject mock capabilities
//! and never read the environment.

use std::env;
use std::time::Duration;

use crate::types::ResearchError;

/// Default completion model, matching the assistant the tool was built around.
pub const DEFAULT_MODEL: &str = "gpt-4-turbo-preview";
/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Tunable parameters for fetching, indexing, and completion orchestration.
#[derive(Debug, Clone)]
pub struct ResearchConfig {
    /// Credential for the remote completion/embedding backend.
    pub api_key: Option<String>,
    /// Completion model identifier.
    pub model: String,
    /// Embedding model identifier.
    pub embedding_model: String,
    /// Base URL override for the remote backend (tests point this at a mock
    /// server; `None` means the public endpoint).
    pub base_url: Option<String>,
    /// Per-document body cap applied by the fetcher (lossless prefix).
    pub max_body_chars: usize,
    /// Per-request timeout for page fetches.
    pub fetch_timeout: Duration,
    /// Minimum spacing between consecutive requests in a fetch batch.
    pub fetch_delay: Duration,
    /// Interval between completion-run status polls.
    pub poll_interval: Duration,
    /// Overall wall-clock budget for the poll loop.
    pub poll_timeout: Duration,
    /// Consecutive transient poll errors tolerated before a hard failure.
    pub poll_retries: u32,
    /// Number of similar documents retrieved as summary context.
    pub top_k: usize,
    /// Total prompt budget; lowest-ranked sources are dropped first.
    pub max_prompt_chars: usize,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            base_url: None,
            max_body_chars: 10_000,
            fetch_timeout: Duration::from_secs(10),
            fetch_delay: Duration::from_secs(1),
            poll_interval: Duration::from_secs(1),
            poll_timeout: Duration::from_secs(60),
            poll_retries: 3,
            top_k: 5,
            max_prompt_chars: 16_000,
        }
    }
}

impl ResearchConfig {
    /// Builds a configuration from the environment.
    ///
    /// Loads `.env` first (ignored if absent), then reads:
    ///
    /// * `OPENAI_API_KEY` — credential (required by the real backends)
    /// * `WEBSCRIBE_MODEL`, `WEBSCRIBE_EMBEDDING_MODEL`
    /// * `WEBSCRIBE_BASE_URL`
    /// * `WEBSCRIBE_POLL_TIMEOUT_SECS`, `WEBSCRIBE_TOP_K`
    pub fn from_env() -> Result<Self, ResearchError> {
        let _ = dotenvy::dotenv();

        let mut config = Self {
            api_key: env::var("OPENAI_API_KEY").ok(),
            ..Self::default()
        };

        if let Ok(model) = env::var("WEBSCRIBE_MODEL") {
            config.model = model;
        }
        if let Ok(model) = env::var("WEBSCRIBE_EMBEDDING_MODEL") {
            config.embedding_model = model;
        }
        if let Ok(base) = env::var("WEBSCRIBE_BASE_URL") {
            config.base_url = Some(base);
        }
        if let Ok(raw) = env::var("WEBSCRIBE_POLL_TIMEOUT_SECS") {
            let secs: u64 = raw.parse().map_err(|_| {
                ResearchError::Config(format!(
                    "WEBSCRIBE_POLL_TIMEOUT_SECS must be an integer, got '{raw}'"
                ))
            })?;
            config.poll_timeout = Duration::from_secs(secs);
        }
        if let Ok(raw) = env::var("WEBSCRIBE_TOP_K") {
            let k: usize = raw.parse().map_err(|_| {
                ResearchError::Config(format!("WEBSCRIBE_TOP_K must be an integer, got '{raw}'"))
            })?;
            if k == 0 {
                return Err(ResearchError::Config(
                    "WEBSCRIBE_TOP_K must be at least 1".into(),
                ));
            }
            config.top_k = k;
        }

        Ok(config)
    }

    /// Returns the API key or a configuration error naming the variable.
    pub fn require_api_key(&self) -> Result<&str, ResearchError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ResearchError::Config("OPENAI_API_KEY is not set".into()))
    }
}
