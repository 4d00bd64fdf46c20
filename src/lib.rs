//! # repo-context
//!
//! Answers natural-language queries against a lazily-loaded corpus of text
//! files (typically one source repository) by returning the top-K documents
//! with the greatest token overlap, either as a single response or as a
//! live server-sent-event feed that re-runs the query on a timer.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌──────────────┐
//! │ CorpusLoader │──▶│ CorpusStore │──▶│ SearchIndex  │◀── scoring
//! │ zip/git/fs   │   │ (load once) │   │  top-K rank  │
//! └──────────────┘   └─────────────┘   └──────┬───────┘
//!                                             │
//!                        ┌────────────────────┤
//!                        ▼                    ▼
//!                 ┌─────────────┐     ┌──────────────────┐
//!                 │ POST /search│     │ StreamingSession │
//!                 │  (one-shot) │     │  GET /stream SSE │
//!                 └─────────────┘     └──────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rctx load                       # download and index the corpus
//! rctx search "vrouter netconf"   # one-shot search
//! rctx get packages/vrouter.yang  # print one document
//! rctx serve                      # start the HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Query-path error taxonomy |
//! | [`loader`] | `CorpusLoader` trait and directory scan |
//! | [`connector_archive`] | Zip archive loader |
//! | [`connector_git`] | Git repository loader |
//! | [`connector_fs`] | Local directory loader |
//! | [`corpus`] | Populate-once document store |
//! | [`scoring`] | Tokenizer and relevance score |
//! | [`search`] | Query normalization and top-K ranking |
//! | [`session`] | Streaming query sessions |
//! | [`get`] | Document retrieval |
//! | [`completions`] | OpenAI-compatible chat shim |
//! | [`server`] | HTTP server |

pub mod completions;
pub mod config;
pub mod connector_archive;
pub mod connector_fs;
pub mod connector_git;
pub mod corpus;
pub mod error;
pub mod get;
pub mod loader;
pub mod models;
pub mod scoring;
pub mod search;
pub mod server;
pub mod session;
