//! Page fetching and text extraction.
//!
//! Network failure is a normal outcome here, not an error: [`PageFetcher::fetch`]
//! always returns a [`Document`] and records failures in its
//! [`DocumentStatus`]. Batch fetching is intentionally sequential with a fixed
//! inter-request delay as a backpressure policy against target hosts.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::types::ResearchError;

/// User agent sent with every page request; some hosts reject the default.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Why a fetch failed, classified for callers that partition batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// The request exceeded the configured timeout.
    Timeout,
    /// The server answered with a non-success status code.
    HttpStatus(u16),
    /// Connection, DNS, or TLS-level failure.
    Network(String),
    /// The response body could not be decoded or contained no text.
    Unparseable(String),
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::Timeout => write!(f, "request timed out"),
            FetchFailure::HttpStatus(code) => write!(f, "http status {code}"),
            FetchFailure::Network(reason) => write!(f, "network error: {reason}"),
            FetchFailure::Unparseable(reason) => write!(f, "unparseable content: {reason}"),
        }
    }
}

/// Outcome marker on a [`Document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentStatus {
    /// Title and body were extracted successfully.
    Fetched,
    /// The fetch failed; `title` and `body` are empty.
    Failed(FetchFailure),
}

/// One fetched page, immutable after creation.
#[derive(Debug, Clone)]
pub struct Document {
    pub url: Url,
    pub title: String,
    pub body: String,
    pub status: DocumentStatus,
    pub fetched_at: DateTime<Utc>,
}

impl Document {
    /// True when the page yielded usable text.
    pub fn is_fetched(&self) -> bool {
        matches!(self.status, DocumentStatus::Fetched)
    }

    fn failed(url: Url, failure: FetchFailure) -> Self {
        Self {
            url,
            title: String::new(),
            body: String::new(),
            status: DocumentStatus::Failed(failure),
            fetched_at: Utc::now(),
        }
    }
}

/// Fetches pages and extracts their textual content.
#[derive(Clone, Debug)]
pub struct PageFetcher {
    client: Client,
    max_body_chars: usize,
    delay: Duration,
}

impl PageFetcher {
    /// Builds a fetcher with the given per-document body cap, per-request
    /// timeout, and inter-request delay for batches.
    pub fn new(
        max_body_chars: usize,
        timeout: Duration,
        delay: Duration,
    ) -> Result<Self, ResearchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            max_body_chars,
            delay,
        })
    }

    /// Fetches one URL. Expected network conditions (timeout, non-2xx,
    /// undecodable body) come back as a `Failed` document, never as `Err`.
    pub async fn fetch(&self, url: &Url) -> Document {
        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(err) => return Document::failed(url.clone(), classify(&err)),
        };

        let status = response.status();
        if !status.is_success() {
            return Document::failed(url.clone(), FetchFailure::HttpStatus(status.as_u16()));
        }

        let html = match response.text().await {
            Ok(html) => html,
            Err(err) => {
                return Document::failed(
                    url.clone(),
                    FetchFailure::Unparseable(err.to_string()),
                );
            }
        };

        let (title, body) = extract_text(&html);
        if body.is_empty() {
            return Document::failed(
                url.clone(),
                FetchFailure::Unparseable("document contains no text".into()),
            );
        }

        Document {
            url: url.clone(),
            title: if title.is_empty() {
                url.to_string()
            } else {
                title
            },
            body: truncate_chars(&body, self.max_body_chars),
            status: DocumentStatus::Fetched,
            fetched_at: Utc::now(),
        }
    }

    /// Fetches every URL strictly sequentially, sleeping [`Self::new`]'s delay
    /// between consecutive requests. The result has the same length and order
    /// as the input; failures are marked per entry and never abort the batch.
    pub async fn fetch_all(&self, urls: &[Url]) -> Vec<Document> {
        let mut documents = Vec::with_capacity(urls.len());
        for (index, url) in urls.iter().enumerate() {
            tracing::info!(url = %url, index = index + 1, total = urls.len(), "fetching page");
            let document = self.fetch(url).await;
            if let DocumentStatus::Failed(failure) = &document.status {
                tracing::warn!(url = %url, failure = %failure, "fetch failed");
            }
            documents.push(document);

            if index + 1 < urls.len() {
                tokio::time::sleep(self.delay).await;
            }
        }
        documents
    }
}

fn classify(err: &reqwest::Error) -> FetchFailure {
    if err.is_timeout() {
        FetchFailure::Timeout
    } else if let Some(status) = err.status() {
        FetchFailure::HttpStatus(status.as_u16())
    } else {
        FetchFailure::Network(err.to_string())
    }
}

/// Extracts the `<title>` and visible text (script/style/noscript skipped,
/// whitespace collapsed) from an HTML document.
fn extract_text(html: &str) -> (String, String) {
    let document = Html::parse_document(html);

    let title_selector = Selector::parse("title").expect("static selector");
    let title = document
        .select(&title_selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let mut raw = String::new();
    collect_visible_text(document.root_element(), &mut raw);
    let body = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    (title, body)
}

fn collect_visible_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(el) = ElementRef::wrap(child) {
            match el.value().name() {
                "script" | "style" | "noscript" | "title" => {}
                _ => collect_visible_text(el, out),
            }
        } else if let Some(text) = child.value().as_text() {
            out.push_str(&text.text);
            out.push(' ');
        }
    }
}

/// Keeps the first `max` characters, respecting char boundaries.
fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}
