//! Interactive CLI: collects a query and a newline-terminated URL list on
//! stdin, runs the research pipeline, and prints the summary.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use url::Url;

use webscribe::{
    MockEmbeddingProvider, OpenAiCompletionService, OpenAiEmbeddingProvider, ResearchConfig,
    ResearchError, ResearchPipeline,
};
use webscribe::embeddings::EmbeddingProvider;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("webscribe=info")),
        )
        .init();

    if let Err(err) = run().await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), ResearchError> {
    let config = ResearchConfig::from_env()?;
    let api_key = config.require_api_key()?.to_string();

    let (query, urls) = read_input()?;

    let mut service = OpenAiCompletionService::new(&api_key);
    let mut embedder = OpenAiEmbeddingProvider::new(&api_key, &config.embedding_model);
    if let Some(base) = &config.base_url {
        service = service.with_base_url(base.clone());
        embedder = embedder.with_base_url(base.clone());
    }
    // Offline mode keeps retrieval working without an embeddings backend.
    let embedder: Arc<dyn EmbeddingProvider> =
        if std::env::var("WEBSCRIBE_MOCK_EMBEDDINGS").is_ok() {
            Arc::new(MockEmbeddingProvider::new())
        } else {
            Arc::new(embedder)
        };

    let pipeline = ResearchPipeline::new(service, embedder, config)?;

    println!("\nResearching {} url(s)...\n", urls.len());
    let report = pipeline.research(&urls, &query).await?;

    println!("Query: {query}\n");
    println!("{}", report.summary);
    if !report.failed_urls.is_empty() {
        println!("\nSkipped (fetch failed):");
        for url in &report.failed_urls {
            println!("  - {url}");
        }
    }
    Ok(())
}

fn read_input() -> Result<(String, Vec<Url>), ResearchError> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    print!("Research query: ");
    io::stdout().flush()?;
    let query = match lines.next() {
        Some(line) => line?.trim().to_string(),
        None => String::new(),
    };
    if query.is_empty() {
        return Err(ResearchError::Config("query cannot be empty".into()));
    }

    println!("URLs to research (one per line, empty line to finish):");
    let mut urls = Vec::new();
    for line in lines {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            break;
        }
        match Url::parse(trimmed) {
            Ok(url) => urls.push(url),
            Err(err) => eprintln!("skipping '{trimmed}': {err}"),
        }
    }
    if urls.is_empty() {
        return Err(ResearchError::Config(
            "at least one valid URL is required".into(),
        ));
    }

    Ok((query, urls))
}
