//! In-memory document store with a populate-once lifecycle.
//!
//! The store starts empty. The first successful [`CorpusStore::ensure_loaded`]
//! call fills it from the [`CorpusLoader`]; later calls are no-ops. A failed
//! load, or one that yields no documents, leaves the store empty so the next
//! caller retries. Concurrent first
//! callers wait on the same in-flight load instead of starting their own.
//!
//! Nothing mutates the documents after population, so readers need no lock.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::OnceCell;

use crate::error::SearchError;
use crate::loader::CorpusLoader;
use crate::models::Document;
use crate::scoring::tokenize;

/// A document together with its precomputed token set.
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    pub document: Document,
    pub tokens: HashSet<String>,
}

impl IndexedDocument {
    fn new(document: Document) -> Self {
        let tokens = tokenize(&document.text);
        Self { document, tokens }
    }
}

pub struct CorpusStore {
    loader: Arc<dyn CorpusLoader>,
    documents: OnceCell<Vec<IndexedDocument>>,
}

impl CorpusStore {
    pub fn new(loader: Arc<dyn CorpusLoader>) -> Self {
        Self {
            loader,
            documents: OnceCell::new(),
        }
    }

    /// Populate the store if it is still empty.
    pub async fn ensure_loaded(&self) -> Result<(), SearchError> {
        self.documents
            .get_or_try_init(|| async {
                let started = Instant::now();
                let docs = self.loader.load().await.map_err(|e| {
                    tracing::error!(loader = self.loader.name(), error = %e, "corpus load failed");
                    SearchError::CorpusUnavailable(format!("{:#}", e))
                })?;
                if docs.is_empty() {
                    tracing::warn!(loader = self.loader.name(), "corpus loader returned no documents");
                    return Err(SearchError::CorpusUnavailable(
                        "loader returned no documents".to_string(),
                    ));
                }
                let indexed: Vec<IndexedDocument> =
                    docs.into_iter().map(IndexedDocument::new).collect();
                tracing::info!(
                    loader = self.loader.name(),
                    documents = indexed.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "corpus loaded"
                );
                Ok::<_, SearchError>(indexed)
            })
            .await
            .map(|_| ())
    }

    /// The loaded documents in corpus order, or an empty slice before loading.
    pub fn all_documents(&self) -> &[IndexedDocument] {
        self.documents.get().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_loaded(&self) -> bool {
        self.documents.initialized()
    }

    pub fn len(&self) -> usize {
        self.all_documents().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a loaded document by id.
    pub fn get(&self, id: &str) -> Option<&Document> {
        self.all_documents()
            .iter()
            .map(|d| &d.document)
            .find(|d| d.id == id)
    }
}
