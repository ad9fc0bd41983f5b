//! ```text
//! URLs ──► ingestion::fetch::PageFetcher ──► Vec<Document>
//!                                              │ (failed fetches partitioned off)
//!                                              ▼
//!          embeddings::EmbeddingProvider ◄── stores::MemoryVectorStore
//!                                              │ top-k SimilarityResults
//!                                              ▼
//!          assistant::build_prompt ──► assistant::JobOrchestrator
//!                    create context → submit → poll → result → teardown
//!                                              │
//!                                              ▼
//!          pipeline::ResearchPipeline ──► ResearchReport (summary + failures)
//! ```
//!
//! webscribe fetches a set of web pages, indexes their text in a vector store,
//! and drives an asynchronous LLM assistant job to a natural-language summary
//! answering a user query. The completion job lifecycle (allocate remote
//! context, submit, poll under a deadline, release exactly once) is the heart
//! of the crate; both remote capabilities sit behind traits so the whole
//! pipeline runs deterministically against mocks in tests.

pub mod assistant;
pub mod config;
pub mod embeddings;
pub mod ingestion;
pub mod pipeline;
pub mod stores;
pub mod types;

pub use assistant::{
    CompletionJob, CompletionService, ContextHandle, JobOrchestrator, JobStatus,
    OpenAiCompletionService, RunState,
};
pub use config::ResearchConfig;
pub use embeddings::{EmbeddingProvider, MockEmbeddingProvider, OpenAiEmbeddingProvider};
pub use ingestion::fetch::{Document, DocumentStatus, FetchFailure, PageFetcher};
pub use pipeline::{ResearchPipeline, ResearchReport};
pub use stores::{IndexedDocument, MemoryVectorStore, SimilarityResult};
pub use types::ResearchError;
