//! HTTP gateway.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/search` | One-shot top-K search: `{"query": "...", "k": 3}` → `{"results": [...]}` |
//! | `GET`/`POST` | `/stream` | Live session as server-sent events (`ready`, `results`, `ping`, `error`) |
//! | `GET`  | `/files/{*id}` | Full text of one corpus document |
//! | `POST` | `/v1/chat/completions` | OpenAI-compatible chat shim over the corpus |
//! | `GET`  | `/health` | Health check (version, corpus size) |
//!
//! # Streaming query discovery
//!
//! `/stream` looks for its query in the `?query=` parameter, then the
//! `x-query` header, then a JSON `{"query": "..."}` request body (names and
//! wait are configurable under `[stream]`). If none is present the session
//! runs the configured default query.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "document not found: a/b.yang" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404),
//! `corpus_unavailable` (503), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Path, Query as UrlQuery, State},
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};

use crate::completions::{complete, ChatRequest, ChatResponse};
use crate::config::Config;
use crate::corpus::CorpusStore;
use crate::error::SearchError;
use crate::get::get_document;
use crate::loader::{loader_from_config, CorpusLoader};
use crate::models::ScoredMatch;
use crate::search::{Query, SearchIndex};
use crate::session::{
    BodySource, HeaderSource, ParamSource, QuerySource, SessionEvent, SessionOptions,
    StreamingSession,
};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    index: SearchIndex,
}

/// Starts the HTTP server with the loader selected by `[corpus.*]`.
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let loader = loader_from_config(config)?;
    run_server_with_loader(config, loader).await
}

/// Starts the HTTP server over a caller-supplied corpus loader.
///
/// ```rust,no_run
/// use repo_context::server::run_server_with_loader;
/// # use repo_context::loader::CorpusLoader;
/// # use std::sync::Arc;
/// # async fn example(config: &repo_context::config::Config, loader: Arc<dyn CorpusLoader>) -> anyhow::Result<()> {
/// run_server_with_loader(config, loader).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_server_with_loader(
    config: &Config,
    loader: Arc<dyn CorpusLoader>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let store = Arc::new(CorpusStore::new(loader));
    let index = SearchIndex::new(store.clone(), config.retrieval.clone());

    if config.server.prewarm {
        tokio::spawn(async move {
            // Failure is not fatal; the first request retries.
            if let Err(e) = store.ensure_loaded().await {
                tracing::warn!(error = %e, "corpus prewarm failed");
            }
        });
    }

    let app = router(config, index);

    tracing::info!("listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router without binding a socket.
pub fn router(config: &Config, index: SearchIndex) -> Router {
    let state = AppState {
        config: Arc::new(config.clone()),
        index,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/search", post(handle_search))
        .route("/stream", get(handle_stream).post(handle_stream))
        .route("/files/{*id}", get(handle_file))
        .route("/v1/chat/completions", post(handle_chat))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        let status = match &err {
            SearchError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            SearchError::DocumentNotFound(_) => StatusCode::NOT_FOUND,
            SearchError::CorpusUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            SearchError::TransientScoringFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let code = match &err {
            SearchError::TransientScoringFailure(_) => "internal",
            other => other.code(),
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }
        AppError {
            status,
            code: code.to_string(),
            message: err.to_string(),
        }
    }
}

/// Malformed, mistyped, or non-JSON request bodies.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request".to_string(),
            message: rejection.body_text(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    loaded: bool,
    documents: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = state.index.store();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        loaded: store.is_loaded(),
        documents: store.len(),
    })
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    #[serde(default)]
    query: String,
    #[serde(default)]
    k: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<ScoredMatch>,
}

/// A blank query is an empty result set, not an error.
async fn handle_search(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Json(req) = payload?;
    let query = Query::new(req.query);
    let k = state.index.effective_k(req.k);
    let results = state.index.search(&query, k).await?;
    Ok(Json(SearchResponse { results }))
}

// ============ GET /files/{*id} ============

async fn handle_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<String, AppError> {
    let doc = get_document(state.index.store(), &id).await?;
    Ok(doc.text)
}

// ============ POST /v1/chat/completions ============

async fn handle_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(req) = payload?;
    Ok(Json(complete(&state.index, &req).await?))
}

// ============ GET|POST /stream ============

/// Opens a [`StreamingSession`] and forwards its events as SSE.
///
/// The session runs on its own task. When the client disconnects axum drops
/// the response stream, which drops the channel receiver and ends the session.
async fn handle_stream(
    State(state): State<AppState>,
    UrlQuery(params): UrlQuery<HashMap<String, String>>,
    headers: HeaderMap,
    body: Body,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream_cfg = &state.config.stream;

    let sources: Vec<Box<dyn QuerySource>> = vec![
        Box::new(ParamSource::new(params.get(&stream_cfg.query_param).cloned())),
        Box::new(HeaderSource::new(&headers, &stream_cfg.query_header)),
        Box::new(BodySource::new(body, stream_cfg.body_wait())),
    ];

    let k = state.index.effective_k(
        params
            .get("k")
            .and_then(|k| k.parse::<usize>().ok()),
    );
    let options = SessionOptions::from_config(stream_cfg, k);

    let (tx, rx) = mpsc::channel(stream_cfg.channel_capacity);
    let session = StreamingSession::new(state.index.clone(), options, sources, tx);
    tokio::spawn(session.run());

    let events = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|event| (Ok::<_, Infallible>(to_sse_event(event)), rx))
    });

    Sse::new(events)
}

fn to_sse_event(event: SessionEvent) -> Event {
    Event::default()
        .event(event.kind.as_str())
        .data(event.data.to_string())
}
