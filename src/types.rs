//! Shared error taxonomy for the research pipeline.
//!
//! Expected per-URL network failures are *not* represented here: the fetcher
//! records them on the [`Document`](crate::ingestion::fetch::Document) itself
//! so a partial batch can still proceed. `ResearchError` covers the failures
//! that abort a run (storage, submission, remote execution) plus the terminal
//! outcomes of the completion job state machine.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the webscribe pipeline.
#[derive(Debug, Error)]
pub enum ResearchError {
    /// Vector store insertion or lookup failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// A search request was malformed (e.g. `k == 0`).
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The embedding backend rejected or failed a batch.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Allocating the remote conversational context failed; the job never
    /// advanced past `Created`.
    #[error("context allocation failed: {0}")]
    ContextAllocation(String),

    /// Attaching the prompt or starting the run failed.
    #[error("submission failed: {0}")]
    Submission(String),

    /// The remote execution reported an error status. The detail is the
    /// remote-supplied reason, verbatim.
    #[error("remote execution failed: {0}")]
    RemoteExecution(String),

    /// The poll loop exhausted its wall-clock budget while the run was still
    /// in flight. Distinct from [`ResearchError::RemoteExecution`]: the remote
    /// job may still be executing.
    #[error("completion job timed out after {waited:?}")]
    Timeout { waited: Duration },

    /// The run reported success but no assistant message was present.
    #[error("run completed but produced no assistant message")]
    EmptyResult,

    /// Every fetch in the batch failed; there is nothing to summarize.
    #[error("no fetchable content among {} url(s)", failed.len())]
    NoContent { failed: Vec<String> },

    /// Missing or malformed configuration (e.g. no API key).
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport-level HTTP failure outside the fetcher's recovered set.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
