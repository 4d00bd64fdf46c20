//! Error taxonomy for the relevance engine.
//!
//! Application plumbing (config, loaders, CLI) uses `anyhow`; the query path
//! uses [`SearchError`] so the server and streaming sessions can map each
//! failure to a stable code.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    /// The corpus loader failed. The store stays empty and a later call retries.
    #[error("corpus unavailable: {0}")]
    CorpusUnavailable(String),

    /// The query has no alphanumeric tokens.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("document not found: {0}")]
    DocumentNotFound(String),

    /// A single scoring pass failed; callers may try again.
    #[error("scoring failed: {0}")]
    TransientScoringFailure(String),
}

impl SearchError {
    /// Machine-readable code used in HTTP error bodies and `error` events.
    pub fn code(&self) -> &'static str {
        match self {
            SearchError::CorpusUnavailable(_) => "corpus_unavailable",
            SearchError::InvalidQuery(_) => "bad_request",
            SearchError::DocumentNotFound(_) => "not_found",
            SearchError::TransientScoringFailure(_) => "scoring_failed",
        }
    }
}
