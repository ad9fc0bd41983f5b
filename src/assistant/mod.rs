//! Completion capability seam and job orchestration.
//!
//! The remote completion service is reached through exactly six operations
//! ([`CompletionService`]): context creation, message append, run start, run
//! status, newest-assistant-message retrieval, and context deletion. The job
//! lifecycle built on top of them lives in [`job`]; the REST backend in
//! [`openai`].

pub mod job;
pub mod openai;

use async_trait::async_trait;

use crate::types::ResearchError;

pub use job::{CompletionJob, JobOrchestrator, JobStatus, OrchestratorConfig, build_prompt};
pub use openai::OpenAiCompletionService;

/// Remote conversational context bound to a model and instruction set.
///
/// One handle is allocated per completion job and released exactly once during
/// teardown.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextHandle {
    /// Remote assistant (instruction-set) identifier.
    pub assistant_id: String,
    /// Remote conversation thread identifier.
    pub thread_id: String,
}

/// Remote execution status as reported by a single poll.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunState {
    Queued,
    InProgress,
    Completed,
    /// Remote-supplied reason, propagated verbatim.
    Failed { detail: String },
    Cancelled,
}

impl RunState {
    /// True for states that require another poll.
    pub fn is_pending(&self) -> bool {
        matches!(self, RunState::Queued | RunState::InProgress)
    }
}

/// The six remote operations the orchestrator is allowed to use.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Allocates a conversational context bound to `instructions` and `model`.
    async fn create_context(
        &self,
        instructions: &str,
        model: &str,
    ) -> Result<ContextHandle, ResearchError>;

    /// Appends one user message to the context.
    async fn append_message(
        &self,
        context: &ContextHandle,
        content: &str,
    ) -> Result<(), ResearchError>;

    /// Requests execution start, returning the run identifier.
    async fn start_run(&self, context: &ContextHandle) -> Result<String, ResearchError>;

    /// Queries the current state of a run.
    async fn run_status(
        &self,
        context: &ContextHandle,
        run_id: &str,
    ) -> Result<RunState, ResearchError>;

    /// Returns the most recent message attributed to the assistant role, if
    /// any.
    async fn latest_assistant_message(
        &self,
        context: &ContextHandle,
    ) -> Result<Option<String>, ResearchError>;

    /// Releases the remote context.
    async fn delete_context(&self, context: &ContextHandle) -> Result<(), ResearchError>;
}
