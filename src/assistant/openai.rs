//! Assistants-style REST backend for [`CompletionService`].
//!
//! One [`ContextHandle`] bundles a remote assistant (instruction set + model)
//! and a conversation thread; both are created together and deleted together.
//! The base URL is overridable so integration tests can point the client at a
//! local mock server.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{CompletionService, ContextHandle, RunState};
use crate::types::ResearchError;

const OPENAI_BASE_URL: &str = "https://api.openai.com";
/// The assistants surface requires an opt-in beta header.
const BETA_HEADER: (&str, &str) = ("OpenAI-Beta", "assistants=v2");

pub struct OpenAiCompletionService {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiCompletionService {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_string(),
        }
    }

    /// Points the client at a different host (mock servers in tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .header(BETA_HEADER.0, BETA_HEADER.1)
    }

    async fn check(
        &self,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ResearchError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let detail = response.text().await.unwrap_or_default();
        Err(ResearchError::RemoteExecution(format!(
            "completion service returned {status}: {detail}"
        )))
    }
}

#[derive(Deserialize)]
struct CreatedObject {
    id: String,
}

#[derive(Deserialize)]
struct RunObject {
    status: String,
    #[serde(default)]
    last_error: Option<RunError>,
}

#[derive(Deserialize)]
struct RunError {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

#[derive(Deserialize)]
struct MessageList {
    data: Vec<ThreadMessage>,
}

#[derive(Deserialize)]
struct ThreadMessage {
    role: String,
    content: Vec<MessagePart>,
}

#[derive(Deserialize)]
struct MessagePart {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<MessageText>,
}

#[derive(Deserialize)]
struct MessageText {
    value: String,
}

fn map_run_state(run: RunObject) -> RunState {
    match run.status.as_str() {
        "queued" => RunState::Queued,
        "in_progress" => RunState::InProgress,
        "completed" => RunState::Completed,
        "cancelling" | "cancelled" => RunState::Cancelled,
        other => {
            let detail = match run.last_error {
                Some(err) => match err.code {
                    Some(code) => format!("{code}: {}", err.message),
                    None => err.message,
                },
                None => format!("run entered status '{other}'"),
            };
            RunState::Failed { detail }
        }
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletionService {
    async fn create_context(
        &self,
        instructions: &str,
        model: &str,
    ) -> Result<ContextHandle, ResearchError> {
        let assistant: CreatedObject = self
            .check(
                self.request(reqwest::Method::POST, "/v1/assistants")
                    .json(&json!({
                        "name": "Research Assistant",
                        "instructions": instructions,
                        "model": model,
                        "tools": [],
                    }))
                    .send()
                    .await?,
            )
            .await?
            .json()
            .await?;

        let thread: CreatedObject = self
            .check(
                self.request(reqwest::Method::POST, "/v1/threads")
                    .json(&json!({}))
                    .send()
                    .await?,
            )
            .await?
            .json()
            .await?;

        Ok(ContextHandle {
            assistant_id: assistant.id,
            thread_id: thread.id,
        })
    }

    async fn append_message(
        &self,
        context: &ContextHandle,
        content: &str,
    ) -> Result<(), ResearchError> {
        self.check(
            self.request(
                reqwest::Method::POST,
                &format!("/v1/threads/{}/messages", context.thread_id),
            )
            .json(&json!({ "role": "user", "content": content }))
            .send()
            .await?,
        )
        .await?;
        Ok(())
    }

    async fn start_run(&self, context: &ContextHandle) -> Result<String, ResearchError> {
        let run: CreatedObject = self
            .check(
                self.request(
                    reqwest::Method::POST,
                    &format!("/v1/threads/{}/runs", context.thread_id),
                )
                .json(&json!({ "assistant_id": context.assistant_id }))
                .send()
                .await?,
            )
            .await?
            .json()
            .await?;
        Ok(run.id)
    }

    async fn run_status(
        &self,
        context: &ContextHandle,
        run_id: &str,
    ) -> Result<RunState, ResearchError> {
        let run: RunObject = self
            .check(
                self.request(
                    reqwest::Method::GET,
                    &format!("/v1/threads/{}/runs/{run_id}", context.thread_id),
                )
                .send()
                .await?,
            )
            .await?
            .json()
            .await?;
        Ok(map_run_state(run))
    }

    async fn latest_assistant_message(
        &self,
        context: &ContextHandle,
    ) -> Result<Option<String>, ResearchError> {
        let list: MessageList = self
            .check(
                self.request(
                    reqwest::Method::GET,
                    &format!("/v1/threads/{}/messages", context.thread_id),
                )
                .send()
                .await?,
            )
            .await?
            .json()
            .await?;

        // The API returns messages newest-first.
        let text = list.data.into_iter().find_map(|message| {
            if message.role != "assistant" {
                return None;
            }
            let combined: String = message
                .content
                .into_iter()
                .filter(|part| part.kind == "text")
                .filter_map(|part| part.text.map(|t| t.value))
                .collect::<Vec<_>>()
                .join("\n");
            if combined.is_empty() {
                None
            } else {
                Some(combined)
            }
        });
        Ok(text)
    }

    async fn delete_context(&self, context: &ContextHandle) -> Result<(), ResearchError> {
        let thread = self
            .request(
                reqwest::Method::DELETE,
                &format!("/v1/threads/{}", context.thread_id),
            )
            .send()
            .await;
        let assistant = self
            .request(
                reqwest::Method::DELETE,
                &format!("/v1/assistants/{}", context.assistant_id),
            )
            .send()
            .await;

        // Attempt both deletes before reporting; the first failure wins.
        match (thread, assistant) {
            (Ok(t), Ok(a)) => {
                self.check(t).await?;
                self.check(a).await?;
                Ok(())
            }
            (Err(err), _) | (_, Err(err)) => Err(err.into()),
        }
    }
}
