//! Pipeline coordinator: fetch → store → retrieve → summarize.
//!
//! Each step is failure-isolated: per-URL fetch failures are collected rather
//! than raised, storage and submission failures abort the run with a typed
//! error, and completion-job teardown is guaranteed regardless of how the run
//! ends. Every run uses its own store collection so concurrent runs cannot
//! interleave writes into each other's retrievals.

use std::sync::Arc;

use url::Url;
use uuid::Uuid;

use crate::assistant::{CompletionService, JobOrchestrator, OrchestratorConfig, build_prompt};
use crate::config::ResearchConfig;
use crate::embeddings::EmbeddingProvider;
use crate::ingestion::fetch::{Document, PageFetcher};
use crate::stores::MemoryVectorStore;
use crate::types::ResearchError;

/// Outcome of a successful research run.
#[derive(Clone, Debug)]
pub struct ResearchReport {
    /// The generated summary answering the query.
    pub summary: String,
    /// URLs that failed to fetch; the summary covers the rest.
    pub failed_urls: Vec<String>,
    /// Number of documents indexed for retrieval.
    pub indexed: usize,
}

/// Composes the fetcher, vector store, and job orchestrator.
pub struct ResearchPipeline<S> {
    fetcher: PageFetcher,
    store: MemoryVectorStore,
    orchestrator: JobOrchestrator<S>,
    config: ResearchConfig,
}

impl<S: CompletionService> ResearchPipeline<S> {
    pub fn new(
        service: S,
        embedder: Arc<dyn EmbeddingProvider>,
        config: ResearchConfig,
    ) -> Result<Self, ResearchError> {
        let fetcher = PageFetcher::new(
            config.max_body_chars,
            config.fetch_timeout,
            config.fetch_delay,
        )?;
        let store = MemoryVectorStore::new(embedder);
        let orchestrator = JobOrchestrator::new(service, OrchestratorConfig::from(&config));
        Ok(Self {
            fetcher,
            store,
            orchestrator,
            config,
        })
    }

    /// Fetches every URL, indexes the successful pages, retrieves the most
    /// relevant ones for `query`, and drives one completion job to a summary.
    ///
    /// # Errors
    ///
    /// `NoContent` when every fetch failed (the store and orchestrator are
    /// never touched), otherwise the first hard failure from storage,
    /// submission, or remote execution.
    pub async fn research(
        &self,
        urls: &[Url],
        query: &str,
    ) -> Result<ResearchReport, ResearchError> {
        tracing::info!(urls = urls.len(), query, "research run started");

        let documents = self.fetcher.fetch_all(urls).await;
        let (succeeded, failed): (Vec<Document>, Vec<Document>) =
            documents.into_iter().partition(Document::is_fetched);
        let failed_urls: Vec<String> = failed.iter().map(|doc| doc.url.to_string()).collect();

        if succeeded.is_empty() {
            tracing::warn!(failed = failed_urls.len(), "every fetch failed, aborting run");
            return Err(ResearchError::NoContent {
                failed: failed_urls,
            });
        }

        // One collection per run; dropped again on the way out.
        let collection = format!("research-{}", Uuid::new_v4());
        let outcome = self
            .summarize_into(&collection, &succeeded, query)
            .await;
        self.store.reset_collection(&collection);

        let (summary, indexed) = outcome?;
        tracing::info!(indexed, failed = failed_urls.len(), "research run finished");
        Ok(ResearchReport {
            summary,
            failed_urls,
            indexed,
        })
    }

    async fn summarize_into(
        &self,
        collection: &str,
        succeeded: &[Document],
        query: &str,
    ) -> Result<(String, usize), ResearchError> {
        let indexed = self.store.add_documents(collection, succeeded).await?;

        let hits = self
            .store
            .search(collection, query, self.config.top_k)
            .await?;
        // Degenerate queries can miss everything in a tiny collection; fall
        // back to summarizing all fetched documents.
        let ranked: Vec<&Document> = if hits.is_empty() {
            succeeded.iter().collect()
        } else {
            hits.iter().map(|hit| &hit.document.document).collect()
        };

        let prompt = build_prompt(query, &ranked, self.config.max_prompt_chars);
        let summary = self.orchestrator.execute(&prompt).await?;
        Ok((summary, indexed))
    }

    /// Read access to the underlying store (demo/diagnostic surface).
    pub fn store(&self) -> &MemoryVectorStore {
        &self.store
    }
}
