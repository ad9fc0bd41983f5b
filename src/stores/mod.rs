//! Vector storage for fetched documents.
//!
//! Collections are isolated namespaces; ids are store-assigned and unique
//! within a collection. The store computes embeddings on insertion through an
//! injected [`EmbeddingProvider`] and serves nearest-neighbor queries ordered
//! by ascending cosine distance, ties broken by insertion order.
//!
//! Persistence format is deliberately out of scope — this is the logical
//! document model held in memory. Callers are responsible for filtering out
//! failed fetches before insertion; the store only validates that bodies are
//! non-empty.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::embeddings::EmbeddingProvider;
use crate::ingestion::fetch::Document;
use crate::types::ResearchError;

/// A document plus its derived embedding and store-assigned id.
#[derive(Clone, Debug)]
pub struct IndexedDocument {
    pub id: Uuid,
    pub document: Document,
    pub embedding: Vec<f32>,
}

/// One ranked hit from a similarity search. Ephemeral, produced per call.
#[derive(Clone, Debug)]
pub struct SimilarityResult {
    pub document: IndexedDocument,
    /// Cosine distance to the query (lower is more similar).
    pub score: f32,
    /// Zero-based position in the result ordering.
    pub rank: usize,
}

/// In-memory vector store over named collections.
pub struct MemoryVectorStore {
    provider: Arc<dyn EmbeddingProvider>,
    collections: RwLock<HashMap<String, Vec<IndexedDocument>>>,
}

impl MemoryVectorStore {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Embeds and inserts every document into the named collection, returning
    /// the number inserted. Duplicate source URLs create distinct entries.
    ///
    /// # Errors
    ///
    /// `Storage` if any document has an empty body (failed fetches must be
    /// filtered out upstream), `Embedding` if the provider fails.
    pub async fn add_documents(
        &self,
        collection: &str,
        documents: &[Document],
    ) -> Result<usize, ResearchError> {
        if documents.is_empty() {
            return Ok(0);
        }
        if let Some(empty) = documents.iter().find(|doc| doc.body.is_empty()) {
            return Err(ResearchError::Storage(format!(
                "document '{}' has an empty body",
                empty.url
            )));
        }

        let bodies: Vec<String> = documents.iter().map(|doc| doc.body.clone()).collect();
        let embeddings = self.provider.embed_batch(&bodies).await?;

        let mut guard = self.collections.write();
        let entries = guard.entry(collection.to_string()).or_default();
        for (document, embedding) in documents.iter().zip(embeddings) {
            entries.push(IndexedDocument {
                id: Uuid::new_v4(),
                document: document.clone(),
                embedding,
            });
        }

        tracing::debug!(
            collection,
            inserted = documents.len(),
            embedder = self.provider.id(),
            "documents indexed"
        );
        Ok(documents.len())
    }

    /// Returns up to `k` documents most similar to `query`, ascending by
    /// cosine distance. Searching a missing or empty collection yields an
    /// empty vec; `k == 0` is an input error.
    pub async fn search(
        &self,
        collection: &str,
        query: &str,
        k: usize,
    ) -> Result<Vec<SimilarityResult>, ResearchError> {
        if k == 0 {
            return Err(ResearchError::InvalidQuery(
                "search requires k >= 1".into(),
            ));
        }

        let entries: Vec<IndexedDocument> = {
            let guard = self.collections.read();
            match guard.get(collection) {
                Some(entries) => entries.clone(),
                None => return Ok(Vec::new()),
            }
        };
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self
            .provider
            .embed_batch(std::slice::from_ref(&query.to_string()))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ResearchError::Embedding("provider returned no query vector".into()))?;

        let mut scored: Vec<(f32, IndexedDocument)> = entries
            .into_iter()
            .map(|entry| (cosine_distance(&query_embedding, &entry.embedding), entry))
            .collect();
        // Stable sort keeps insertion order for equal distances.
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(k)
            .enumerate()
            .map(|(rank, (score, document))| SimilarityResult {
                document,
                score,
                rank,
            })
            .collect())
    }

    /// Drops every entry in the named collection. Resetting a collection that
    /// does not exist is a no-op.
    pub fn reset_collection(&self, collection: &str) {
        let removed = self.collections.write().remove(collection);
        if removed.is_some() {
            tracing::debug!(collection, "collection reset");
        }
    }

    /// Number of indexed documents in the named collection.
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, Vec::len)
    }
}

/// Cosine distance in `[0, 2]`; orthogonal or degenerate vectors score 1.0.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockEmbeddingProvider;
    use crate::ingestion::fetch::DocumentStatus;
    use chrono::Utc;
    use url::Url;

    fn doc(url: &str, body: &str) -> Document {
        Document {
            url: Url::parse(url).unwrap(),
            title: url.to_string(),
            body: body.to_string(),
            status: DocumentStatus::Fetched,
            fetched_at: Utc::now(),
        }
    }

    fn store() -> MemoryVectorStore {
        MemoryVectorStore::new(Arc::new(MockEmbeddingProvider::new()))
    }

    #[tokio::test]
    async fn search_ranks_by_similarity() {
        let store = store();
        store
            .add_documents(
                "runs",
                &[
                    doc("https://a.example/", "rust async runtimes and tokio schedulers"),
                    doc("https://b.example/", "gardening tips for tomato plants"),
                ],
            )
            .await
            .unwrap();

        let results = store
            .search("runs", "tokio async rust", 2)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].rank, 0);
        assert!(results[0].score <= results[1].score);
        assert!(results[0].document.document.url.as_str().starts_with("https://a."));
    }

    #[tokio::test]
    async fn search_never_exceeds_k() {
        let store = store();
        let docs: Vec<Document> = (0..6)
            .map(|i| doc(&format!("https://example.com/{i}"), "shared body text"))
            .collect();
        store.add_documents("many", &docs).await.unwrap();

        let results = store.search("many", "shared", 3).await.unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn equal_distances_break_ties_by_insertion_order() {
        let store = store();
        store
            .add_documents(
                "ties",
                &[
                    doc("https://first.example/", "identical content"),
                    doc("https://second.example/", "identical content"),
                ],
            )
            .await
            .unwrap();

        let results = store.search("ties", "identical content", 2).await.unwrap();
        assert_eq!(results[0].document.document.url.as_str(), "https://first.example/");
        assert_eq!(results[1].document.document.url.as_str(), "https://second.example/");
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let store = store();
        store
            .add_documents("left", &[doc("https://l.example/", "left only data")])
            .await
            .unwrap();
        store
            .add_documents("right", &[doc("https://r.example/", "right only data")])
            .await
            .unwrap();

        let results = store.search("left", "data", 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.document.url.as_str(), "https://l.example/");
    }

    #[tokio::test]
    async fn missing_collection_returns_empty() {
        let store = store();
        assert!(store.search("nope", "anything", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_k_is_an_input_error() {
        let store = store();
        assert!(matches!(
            store.search("runs", "query", 0).await,
            Err(ResearchError::InvalidQuery(_))
        ));
    }

    #[tokio::test]
    async fn reset_then_search_is_empty() {
        let store = store();
        store
            .add_documents("tmp", &[doc("https://t.example/", "temporary")])
            .await
            .unwrap();
        assert_eq!(store.count("tmp"), 1);

        store.reset_collection("tmp");
        assert!(store.search("tmp", "temporary", 5).await.unwrap().is_empty());
        assert_eq!(store.count("tmp"), 0);

        // Resetting again (or a collection that never existed) is a no-op.
        store.reset_collection("tmp");
        store.reset_collection("never-created");
    }

    #[tokio::test]
    async fn duplicate_urls_create_distinct_entries() {
        let store = store();
        let page = doc("https://dup.example/", "same page inserted twice");
        store
            .add_documents("dups", &[page.clone(), page])
            .await
            .unwrap();

        let results = store.search("dups", "page", 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_ne!(results[0].document.id, results[1].document.id);
    }

    #[tokio::test]
    async fn empty_body_is_rejected() {
        let store = store();
        let mut bad = doc("https://empty.example/", "x");
        bad.body.clear();
        assert!(matches!(
            store.add_documents("bad", &[bad]).await,
            Err(ResearchError::Storage(_))
        ));
    }
}
