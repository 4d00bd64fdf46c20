//! Core data models shared by the loaders, the index and the server.

use serde::Serialize;

/// A single corpus document as produced by a [`CorpusLoader`](crate::loader::CorpusLoader).
///
/// Immutable once loaded; the [`CorpusStore`](crate::corpus::CorpusStore)
/// owns every instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    /// Path of the source file relative to the scan root, `/`-separated.
    pub id: String,
    pub text: String,
    /// Browsable location of the source file.
    pub source_url: String,
}

/// One ranked search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredMatch {
    pub document_id: String,
    /// Fraction of query tokens present in the document, in `[0.0, 1.0]`.
    pub score: f64,
    /// Leading characters of the document text.
    pub snippet: String,
    pub source_url: String,
}
