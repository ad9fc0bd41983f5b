//! Completion job lifecycle: `Created → Submitted → Running → terminal`.
//!
//! The poll loop is the single suspension point of the whole pipeline. It runs
//! on `tokio::time`, so callers can impose an overall deadline and tests can
//! drive it deterministically under a paused clock. Teardown releases the
//! remote context at most once and never lets a secondary release error mask
//! the primary outcome.

use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{CompletionService, ContextHandle, RunState};
use crate::config::ResearchConfig;
use crate::ingestion::fetch::Document;
use crate::types::ResearchError;

/// System instructions bound to every research context.
pub const RESEARCH_INSTRUCTIONS: &str = "You are a research assistant that analyzes website \
content and generates comprehensive summaries. Your summaries should: identify key themes and \
topics, extract important facts and data points, synthesize information from multiple sources, \
present findings in a clear, structured format, and highlight connections and patterns across \
sources.";

/// Lifecycle state of a [`CompletionJob`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
    Created,
    Submitted,
    Running,
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
}

impl JobStatus {
    /// True once the job can no longer advance.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::TimedOut | JobStatus::Cancelled
        )
    }
}

/// One execution attempt of a completion request, tracked to a terminal state.
#[derive(Debug)]
pub struct CompletionJob {
    pub id: Uuid,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub last_polled_at: Option<DateTime<Utc>>,
    pub result: Option<String>,
    context: Option<ContextHandle>,
    released: bool,
}

impl CompletionJob {
    fn new(context: ContextHandle) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Created,
            created_at: Utc::now(),
            last_polled_at: None,
            result: None,
            context: Some(context),
            released: false,
        }
    }

    /// The remote context, present until teardown takes it.
    pub fn context(&self) -> Option<&ContextHandle> {
        self.context.as_ref()
    }

    /// True once teardown has run (successfully or not).
    pub fn is_released(&self) -> bool {
        self.released
    }
}

/// Knobs for the polling loop and context allocation.
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    pub model: String,
    pub instructions: String,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    pub poll_retries: u32,
}

impl From<&ResearchConfig> for OrchestratorConfig {
    fn from(config: &ResearchConfig) -> Self {
        Self {
            model: config.model.clone(),
            instructions: RESEARCH_INSTRUCTIONS.to_string(),
            poll_interval: config.poll_interval,
            poll_timeout: config.poll_timeout,
            poll_retries: config.poll_retries,
        }
    }
}

/// Drives [`CompletionJob`]s against an injected [`CompletionService`].
pub struct JobOrchestrator<S> {
    service: S,
    config: OrchestratorConfig,
}

impl<S: CompletionService> JobOrchestrator<S> {
    pub fn new(service: S, config: OrchestratorConfig) -> Self {
        Self { service, config }
    }

    /// `Created`: allocates the remote context. On failure the job never
    /// advances (no job value exists to tear down).
    pub async fn begin(&self) -> Result<CompletionJob, ResearchError> {
        let context = self
            .service
            .create_context(&self.config.instructions, &self.config.model)
            .await
            .map_err(|err| ResearchError::ContextAllocation(err.to_string()))?;
        let job = CompletionJob::new(context);
        tracing::debug!(job = %job.id, "completion context allocated");
        Ok(job)
    }

    /// `Submitted`: attaches the prompt and requests execution start.
    pub async fn submit(
        &self,
        job: &mut CompletionJob,
        prompt: &str,
    ) -> Result<String, ResearchError> {
        let context = job
            .context
            .clone()
            .ok_or_else(|| ResearchError::Submission("context already released".into()))?;

        self.service
            .append_message(&context, prompt)
            .await
            .map_err(|err| ResearchError::Submission(err.to_string()))?;
        let run_id = self
            .service
            .start_run(&context)
            .await
            .map_err(|err| ResearchError::Submission(err.to_string()))?;

        job.status = JobStatus::Submitted;
        tracing::debug!(job = %job.id, run = %run_id, "run submitted");
        Ok(run_id)
    }

    /// `Running`: polls at a fixed interval under a wall-clock deadline until
    /// the run reaches a terminal state. Transient poll errors are retried up
    /// to `poll_retries` consecutive times; the underlying run is never
    /// restarted.
    pub async fn await_result(
        &self,
        job: &mut CompletionJob,
        run_id: &str,
    ) -> Result<String, ResearchError> {
        let context = job
            .context
            .clone()
            .ok_or_else(|| ResearchError::Submission("context already released".into()))?;

        job.status = JobStatus::Running;
        let deadline = tokio::time::Instant::now() + self.config.poll_timeout;
        let mut consecutive_failures = 0u32;

        loop {
            if tokio::time::Instant::now() >= deadline {
                job.status = JobStatus::TimedOut;
                tracing::warn!(job = %job.id, run = run_id, "completion job timed out");
                return Err(ResearchError::Timeout {
                    waited: self.config.poll_timeout,
                });
            }

            tokio::time::sleep(self.config.poll_interval).await;
            job.last_polled_at = Some(Utc::now());

            match self.service.run_status(&context, run_id).await {
                Ok(state) if state.is_pending() => {
                    consecutive_failures = 0;
                }
                Ok(RunState::Completed) => {
                    let message = self
                        .service
                        .latest_assistant_message(&context)
                        .await
                        .map_err(|err| ResearchError::RemoteExecution(err.to_string()))?;
                    return match message {
                        Some(text) => {
                            job.status = JobStatus::Succeeded;
                            job.result = Some(text.clone());
                            Ok(text)
                        }
                        None => {
                            job.status = JobStatus::Failed;
                            Err(ResearchError::EmptyResult)
                        }
                    };
                }
                Ok(RunState::Failed { detail }) => {
                    job.status = JobStatus::Failed;
                    return Err(ResearchError::RemoteExecution(detail));
                }
                Ok(RunState::Cancelled) => {
                    job.status = JobStatus::Cancelled;
                    return Err(ResearchError::RemoteExecution(
                        "run was cancelled remotely".into(),
                    ));
                }
                Ok(_) => unreachable!("pending states handled above"),
                Err(err) => {
                    consecutive_failures += 1;
                    if consecutive_failures > self.config.poll_retries {
                        job.status = JobStatus::Failed;
                        return Err(ResearchError::RemoteExecution(format!(
                            "polling failed after {} consecutive errors: {err}",
                            consecutive_failures
                        )));
                    }
                    tracing::warn!(
                        job = %job.id,
                        run = run_id,
                        attempt = consecutive_failures,
                        error = %err,
                        "transient poll error, retrying"
                    );
                }
            }
        }
    }

    /// Releases the remote context. Safe in any state; a second call is a
    /// no-op and performs no second remote delete. Release errors are logged
    /// and swallowed so they never mask the run's primary outcome.
    pub async fn teardown(&self, job: &mut CompletionJob) {
        if job.released {
            return;
        }
        job.released = true;
        if !job.status.is_terminal() {
            job.status = JobStatus::Cancelled;
        }

        if let Some(context) = job.context.take() {
            if let Err(err) = self.service.delete_context(&context).await {
                tracing::warn!(job = %job.id, error = %err, "failed to release remote context");
            } else {
                tracing::debug!(job = %job.id, "remote context released");
            }
        }
    }

    /// Runs a full job — allocate, submit, poll — with teardown guaranteed on
    /// every exit path after allocation succeeds.
    pub async fn execute(&self, prompt: &str) -> Result<String, ResearchError> {
        let mut job = self.begin().await?;
        let outcome = self.drive(&mut job, prompt).await;
        self.teardown(&mut job).await;
        outcome
    }

    async fn drive(
        &self,
        job: &mut CompletionJob,
        prompt: &str,
    ) -> Result<String, ResearchError> {
        let run_id = self.submit(job, prompt).await?;
        self.await_result(job, &run_id).await
    }
}

/// Builds the structured summary prompt from ranked source documents.
///
/// Sources are appended highest-rank first; once the combined length would
/// exceed `max_chars` the remaining (lowest-ranked) sources are dropped whole.
/// At least one source is always kept so a single oversized page cannot
/// produce an empty prompt.
pub fn build_prompt(query: &str, ranked_sources: &[&Document], max_chars: usize) -> String {
    let header = format!(
        "Based on the following research query: \"{query}\"\n\n\
         Please analyze and summarize the following content:\n\n"
    );
    let footer = "\nProvide a comprehensive summary that addresses the research query.";

    let mut prompt = header;
    let mut dropped = 0usize;
    for (index, source) in ranked_sources.iter().enumerate() {
        let block = format!(
            "Source: {} ({})\n{}\n\n",
            source.title, source.url, source.body
        );
        let projected = prompt.chars().count() + block.chars().count() + footer.chars().count();
        if index > 0 && projected > max_chars {
            dropped = ranked_sources.len() - index;
            break;
        }
        prompt.push_str(&block);
    }
    if dropped > 0 {
        tracing::debug!(dropped, "prompt budget exceeded, lowest-ranked sources dropped");
    }

    prompt.push_str(footer);
    prompt
}
