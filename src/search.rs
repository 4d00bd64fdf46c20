//! Query normalization and top-K ranking over the corpus.
//!
//! # Algorithm
//!
//! 1. Tokenize the query; no tokens means no results.
//! 2. Ensure the corpus is loaded (`CorpusUnavailable` fails this call only).
//! 3. Score every document with [`scoring::score`], dropping zero scores.
//! 4. Stable-sort by score descending, so ties keep corpus order.
//! 5. Truncate to `k` and cut snippets to `snippet_chars` characters.
//!
//! Identical inputs against an unchanged corpus produce identical output.

use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::{Config, RetrievalConfig};
use crate::corpus::CorpusStore;
use crate::error::SearchError;
use crate::loader::loader_from_config;
use crate::models::ScoredMatch;
use crate::scoring::{self, tokenize};

/// A user query and its normalized token set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    raw: String,
    tokens: HashSet<String>,
}

impl Query {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let tokens = tokenize(&raw);
        Self { raw, tokens }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn tokens(&self) -> &HashSet<String> {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Reject queries without tokens, for callers that need a hard error.
    pub fn require_tokens(self) -> Result<Self, SearchError> {
        if self.is_empty() {
            Err(SearchError::InvalidQuery(format!(
                "'{}' contains no searchable terms",
                self.raw
            )))
        } else {
            Ok(self)
        }
    }
}

/// Ranks corpus documents against queries.
#[derive(Clone)]
pub struct SearchIndex {
    store: Arc<CorpusStore>,
    params: RetrievalConfig,
}

impl SearchIndex {
    pub fn new(store: Arc<CorpusStore>, params: RetrievalConfig) -> Self {
        Self { store, params }
    }

    pub fn store(&self) -> &Arc<CorpusStore> {
        &self.store
    }

    pub fn default_k(&self) -> usize {
        self.params.top_k
    }

    /// Clamp a caller-supplied `k` to `1..=max_k`, defaulting to `top_k`.
    pub fn effective_k(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.params.top_k)
            .clamp(1, self.params.max_k)
    }

    /// Return at most `k` matches, best first.
    pub async fn search(&self, query: &Query, k: usize) -> Result<Vec<ScoredMatch>, SearchError> {
        if query.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        self.store.ensure_loaded().await?;

        // Scoring touches every document; keep it off the async workers.
        let store = self.store.clone();
        let tokens = query.tokens().clone();
        let snippet_chars = self.params.snippet_chars;
        tokio::task::spawn_blocking(move || rank(&store, &tokens, k, snippet_chars))
            .await
            .map_err(|e| SearchError::TransientScoringFailure(e.to_string()))
    }
}

fn rank(
    store: &CorpusStore,
    query_tokens: &HashSet<String>,
    k: usize,
    snippet_chars: usize,
) -> Vec<ScoredMatch> {
    let mut scored: Vec<(f64, usize)> = store
        .all_documents()
        .iter()
        .enumerate()
        .filter_map(|(i, doc)| {
            let s = scoring::score(query_tokens, &doc.tokens);
            (s > 0.0).then_some((s, i))
        })
        .collect();

    // `sort_by` is stable: equal scores keep corpus order.
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.truncate(k);

    let docs = store.all_documents();
    scored
        .into_iter()
        .map(|(score, i)| {
            let doc = &docs[i].document;
            ScoredMatch {
                document_id: doc.id.clone(),
                score,
                snippet: doc.text.chars().take(snippet_chars).collect(),
                source_url: doc.source_url.clone(),
            }
        })
        .collect()
}

/// CLI entry point for `rctx search`.
pub async fn run_search(config: &Config, query: &str, k: Option<usize>) -> Result<()> {
    let query = Query::new(query);
    if query.is_empty() {
        println!("No results.");
        return Ok(());
    }

    let loader = loader_from_config(config)?;
    let index = SearchIndex::new(
        Arc::new(CorpusStore::new(loader)),
        config.retrieval.clone(),
    );
    let results = index.search(&query, index.effective_k(k)).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!("{}. [{:.2}] {}", i + 1, result.score, result.document_id);
        println!("    url: {}", result.source_url);
        let excerpt: String = result.snippet.chars().take(200).collect();
        println!("    excerpt: \"{}\"", excerpt.replace('\n', " ").trim());
        println!();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::tests::FakeLoader;

    fn index_with(docs: Vec<(&str, &str)>) -> SearchIndex {
        let store = Arc::new(CorpusStore::new(Arc::new(FakeLoader::new(docs))));
        SearchIndex::new(store, RetrievalConfig::default())
    }

    fn ids(results: &[ScoredMatch]) -> Vec<&str> {
        results.iter().map(|r| r.document_id.as_str()).collect()
    }

    #[test]
    fn test_query_tokens() {
        let q = Query::new("Configure the vRouter!");
        assert_eq!(q.raw(), "Configure the vRouter!");
        assert_eq!(q.tokens().len(), 3);
        assert!(q.tokens().contains("vrouter"));
        assert!(Query::new(" ... ").is_empty());
    }

    #[test]
    fn test_require_tokens() {
        assert!(Query::new("vrouter").require_tokens().is_ok());
        let err = Query::new("?!").require_tokens().unwrap_err();
        assert!(matches!(err, SearchError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn test_empty_query_returns_nothing_without_loading() {
        let loader = Arc::new(FakeLoader::new(vec![("a.md", "alpha")]).failing_first(100));
        let index = SearchIndex::new(
            Arc::new(CorpusStore::new(loader)),
            RetrievalConfig::default(),
        );
        // A failing loader would surface if the empty query touched the store.
        assert!(index.search(&Query::new(""), 3).await.unwrap().is_empty());
        assert!(index.search(&Query::new("--"), 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_scores_excluded() {
        let index = index_with(vec![
            ("a.md", "alpha bravo"),
            ("b.md", "charlie delta"),
            ("c.md", "bravo echo"),
        ]);
        let results = index.search(&Query::new("bravo"), 10).await.unwrap();
        assert_eq!(ids(&results), vec!["a.md", "c.md"]);
        assert!(results.iter().all(|r| r.score > 0.0));
    }

    #[tokio::test]
    async fn test_ranked_by_score_then_corpus_order() {
        let index = index_with(vec![
            ("one.md", "alpha"),
            ("two.md", "alpha bravo"),
            ("three.md", "bravo"),
            ("four.md", "alpha bravo charlie"),
        ]);
        let results = index.search(&Query::new("alpha bravo"), 10).await.unwrap();
        assert_eq!(ids(&results), vec!["two.md", "four.md", "one.md", "three.md"]);
        assert!((results[0].score - 1.0).abs() < 1e-9);
        assert!((results[2].score - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_top_k_truncates() {
        let index = index_with(vec![
            ("a.md", "shared"),
            ("b.md", "shared"),
            ("c.md", "shared"),
            ("d.md", "shared"),
        ]);
        let results = index.search(&Query::new("shared"), 3).await.unwrap();
        assert_eq!(ids(&results), vec!["a.md", "b.md", "c.md"]);
    }

    #[tokio::test]
    async fn test_deterministic() {
        let index = index_with(vec![
            ("a.md", "x y z"),
            ("b.md", "y z"),
            ("c.md", "z"),
        ]);
        let q = Query::new("x y z");
        let first = index.search(&q, 3).await.unwrap();
        for _ in 0..5 {
            assert_eq!(index.search(&q, 3).await.unwrap(), first);
        }
    }

    #[tokio::test]
    async fn test_snippet_bounded_by_chars() {
        let long = format!("needle {}", "é".repeat(5000));
        let store = Arc::new(CorpusStore::new(Arc::new(FakeLoader::new(vec![(
            "long.md",
            long.as_str(),
        )]))));
        let params = RetrievalConfig {
            snippet_chars: 100,
            ..RetrievalConfig::default()
        };
        let index = SearchIndex::new(store, params);

        let results = index.search(&Query::new("needle"), 1).await.unwrap();
        assert_eq!(results[0].snippet.chars().count(), 100);
        assert!(results[0].snippet.starts_with("needle "));
    }

    #[tokio::test]
    async fn test_corpus_unavailable_does_not_poison() {
        let loader = Arc::new(FakeLoader::new(vec![("a.md", "alpha")]).failing_first(1));
        let index = SearchIndex::new(
            Arc::new(CorpusStore::new(loader)),
            RetrievalConfig::default(),
        );

        let err = index.search(&Query::new("alpha"), 3).await.unwrap_err();
        assert!(matches!(err, SearchError::CorpusUnavailable(_)));

        let results = index.search(&Query::new("alpha"), 3).await.unwrap();
        assert_eq!(ids(&results), vec!["a.md"]);
    }

    #[tokio::test]
    async fn test_default_query_scenario() {
        let index = index_with(vec![
            ("packages/router/README.md", "### README.md\nrouter examples"),
            ("packages/router/src/yang/vrouter.yang", "### vrouter.yang\nmodule vrouter {}"),
        ]);
        let results = index.search(&Query::new("vrouter"), 3).await.unwrap();
        assert_eq!(results[0].document_id, "packages/router/src/yang/vrouter.yang");
        assert!((results[0].score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_effective_k_clamped() {
        let index = index_with(vec![]);
        assert_eq!(index.effective_k(None), 3);
        assert_eq!(index.effective_k(Some(0)), 1);
        assert_eq!(index.effective_k(Some(7)), 7);
        assert_eq!(index.effective_k(Some(10_000)), 50);
    }
}
