//! End-to-end pipeline scenarios with mock pages, mock embeddings, and a mock
//! completion service.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use httpmock::prelude::*;
use parking_lot::Mutex;
use url::Url;

use webscribe::{
    CompletionService, ContextHandle, EmbeddingProvider, MockEmbeddingProvider, ResearchConfig,
    ResearchError, ResearchPipeline, RunState,
};

/// Completion service that immediately succeeds with a fixed summary and
/// counts remote interactions.
struct InstantService {
    summary: String,
    contexts_created: Arc<AtomicUsize>,
    contexts_deleted: Arc<AtomicUsize>,
    last_prompt: Arc<Mutex<Option<String>>>,
}

impl InstantService {
    fn new(summary: &str) -> Self {
        Self {
            summary: summary.to_string(),
            contexts_created: Arc::new(AtomicUsize::new(0)),
            contexts_deleted: Arc::new(AtomicUsize::new(0)),
            last_prompt: Arc::new(Mutex::new(None)),
        }
    }
}

#[async_trait]
impl CompletionService for InstantService {
    async fn create_context(
        &self,
        _instructions: &str,
        _model: &str,
    ) -> Result<ContextHandle, ResearchError> {
        self.contexts_created.fetch_add(1, Ordering::SeqCst);
        Ok(ContextHandle {
            assistant_id: "asst_test".into(),
            thread_id: "thread_test".into(),
        })
    }

    async fn append_message(
        &self,
        _context: &ContextHandle,
        content: &str,
    ) -> Result<(), ResearchError> {
        *self.last_prompt.lock() = Some(content.to_string());
        Ok(())
    }

    async fn start_run(&self, _context: &ContextHandle) -> Result<String, ResearchError> {
        Ok("run_test".into())
    }

    async fn run_status(
        &self,
        _context: &ContextHandle,
        _run_id: &str,
    ) -> Result<RunState, ResearchError> {
        Ok(RunState::Completed)
    }

    async fn latest_assistant_message(
        &self,
        _context: &ContextHandle,
    ) -> Result<Option<String>, ResearchError> {
        Ok(Some(self.summary.clone()))
    }

    async fn delete_context(&self, _context: &ContextHandle) -> Result<(), ResearchError> {
        self.contexts_deleted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Wraps the deterministic mock embedder and records every batch size.
struct CountingEmbedder {
    inner: MockEmbeddingProvider,
    batch_sizes: Arc<Mutex<Vec<usize>>>,
}

impl CountingEmbedder {
    fn new() -> Self {
        Self {
            inner: MockEmbeddingProvider::new(),
            batch_sizes: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ResearchError> {
        self.batch_sizes.lock().push(texts.len());
        self.inner.embed_batch(texts).await
    }

    fn id(&self) -> &str {
        "counting-mock"
    }
}

fn test_config() -> ResearchConfig {
    ResearchConfig {
        fetch_delay: Duration::from_millis(0),
        fetch_timeout: Duration::from_secs(5),
        poll_interval: Duration::from_millis(1),
        poll_timeout: Duration::from_secs(5),
        ..ResearchConfig::default()
    }
}

#[tokio::test]
async fn single_good_url_yields_summary() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/a");
            then.status(200).body(
                "<html><head><title>Good Page</title></head>\
                 <body>useful research content about the topic</body></html>",
            );
        })
        .await;

    let service = InstantService::new("X");
    let deleted = service.contexts_deleted.clone();
    let pipeline = ResearchPipeline::new(
        service,
        Arc::new(CountingEmbedder::new()),
        test_config(),
    )
    .unwrap();

    let urls = vec![Url::parse(&server.url("/a")).unwrap()];
    let report = pipeline.research(&urls, "summarize").await.unwrap();

    assert_eq!(report.summary, "X");
    assert_eq!(report.indexed, 1);
    assert!(report.failed_urls.is_empty());
    // The per-run collection is dropped and the remote context released.
    assert_eq!(deleted.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn all_failed_fetches_short_circuit_before_store_and_orchestrator() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/x");
            then.status(500);
        })
        .await;

    let service = InstantService::new("never used");
    let created = service.contexts_created.clone();
    let embedder = CountingEmbedder::new();
    let batches = embedder.batch_sizes.clone();
    let pipeline = ResearchPipeline::new(service, Arc::new(embedder), test_config()).unwrap();

    let urls = vec![Url::parse(&server.url("/x")).unwrap()];
    let err = pipeline.research(&urls, "q").await.unwrap_err();

    match err {
        ResearchError::NoContent { failed } => {
            assert_eq!(failed.len(), 1);
            assert!(failed[0].ends_with("/x"));
        }
        other => panic!("expected NoContent, got {other:?}"),
    }
    assert!(batches.lock().is_empty(), "vector store must not be touched");
    assert_eq!(created.load(Ordering::SeqCst), 0, "orchestrator must not be touched");
}

#[tokio::test]
async fn partial_failure_indexes_only_fetched_documents() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/good");
            then.status(200).body(
                "<html><head><title>Kept</title></head>\
                 <body>content that survives the batch</body></html>",
            );
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/bad");
            then.status(404);
        })
        .await;

    let service = InstantService::new("partial summary");
    let prompt = service.last_prompt.clone();
    let embedder = CountingEmbedder::new();
    let batches = embedder.batch_sizes.clone();
    let pipeline = ResearchPipeline::new(service, Arc::new(embedder), test_config()).unwrap();

    let urls = vec![
        Url::parse(&server.url("/good")).unwrap(),
        Url::parse(&server.url("/bad")).unwrap(),
    ];
    let report = pipeline.research(&urls, "what survives?").await.unwrap();

    assert_eq!(report.summary, "partial summary");
    assert_eq!(report.indexed, 1);
    assert_eq!(report.failed_urls.len(), 1);
    assert!(report.failed_urls[0].ends_with("/bad"));

    // First embedding batch is the insertion: exactly the one fetched page.
    assert_eq!(batches.lock().first().copied(), Some(1));

    // The prompt was built from the fetched page, not the failed one.
    let prompt = prompt.lock().clone().unwrap();
    assert!(prompt.contains("Kept"));
    assert!(prompt.contains("what survives?"));
}

#[tokio::test]
async fn remote_failure_surfaces_after_teardown() {
    struct FailingRunService {
        deleted: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CompletionService for FailingRunService {
        async fn create_context(
            &self,
            _instructions: &str,
            _model: &str,
        ) -> Result<ContextHandle, ResearchError> {
            Ok(ContextHandle {
                assistant_id: "a".into(),
                thread_id: "t".into(),
            })
        }
        async fn append_message(
            &self,
            _context: &ContextHandle,
            _content: &str,
        ) -> Result<(), ResearchError> {
            Ok(())
        }
        async fn start_run(&self, _context: &ContextHandle) -> Result<String, ResearchError> {
            Ok("r".into())
        }
        async fn run_status(
            &self,
            _context: &ContextHandle,
            _run_id: &str,
        ) -> Result<RunState, ResearchError> {
            Ok(RunState::Failed {
                detail: "invalid_request".into(),
            })
        }
        async fn latest_assistant_message(
            &self,
            _context: &ContextHandle,
        ) -> Result<Option<String>, ResearchError> {
            Ok(None)
        }
        async fn delete_context(&self, _context: &ContextHandle) -> Result<(), ResearchError> {
            self.deleted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/page");
            then.status(200)
                .body("<html><body>some page text</body></html>");
        })
        .await;

    let deleted = Arc::new(AtomicUsize::new(0));
    let pipeline = ResearchPipeline::new(
        FailingRunService {
            deleted: deleted.clone(),
        },
        Arc::new(MockEmbeddingProvider::new()),
        test_config(),
    )
    .unwrap();

    let urls = vec![Url::parse(&server.url("/page")).unwrap()];
    let err = pipeline.research(&urls, "q").await.unwrap_err();

    match err {
        ResearchError::RemoteExecution(detail) => assert_eq!(detail, "invalid_request"),
        other => panic!("expected RemoteExecution, got {other:?}"),
    }
    assert_eq!(deleted.load(Ordering::SeqCst), 1, "teardown must still run");
}
