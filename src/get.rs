//! Document retrieval by id.
//!
//! Used by both the `rctx get` CLI command and the `GET /files/{*id}` endpoint.

use anyhow::Result;

use crate::config::Config;
use crate::corpus::CorpusStore;
use crate::error::SearchError;
use crate::loader::loader_from_config;
use crate::models::Document;

/// Return the full document for `id`, loading the corpus first if needed.
pub async fn get_document(store: &CorpusStore, id: &str) -> Result<Document, SearchError> {
    store.ensure_loaded().await?;
    store
        .get(id.trim_start_matches('/'))
        .cloned()
        .ok_or_else(|| SearchError::DocumentNotFound(id.to_string()))
}

/// CLI entry point — prints the document text verbatim.
pub async fn run_get(config: &Config, id: &str) -> Result<()> {
    let store = CorpusStore::new(loader_from_config(config)?);
    let doc = match get_document(&store, id).await {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    println!("--- {} ---", doc.id);
    println!("url: {}", doc.source_url);
    println!();
    println!("{}", doc.text);

    Ok(())
}
