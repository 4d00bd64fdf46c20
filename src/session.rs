//! Long-lived streaming query sessions.
//!
//! A [`StreamingSession`] feeds one peer a sequence of named events over a
//! bounded channel. The peer owns the receiving half; dropping it is the only
//! way a session ends.
//!
//! # Lifecycle
//!
//! ```text
//!  AwaitingQuery ──(query resolved)──▶ Active ──(peer gone)──▶ Closed
//! ```
//!
//! 1. Emit `ready` with an empty result set.
//! 2. Try each [`QuerySource`] in order; the first non-blank answer wins.
//!    If none answers, use the configured default query.
//! 3. Search, emit `results`, become `Active`.
//! 4. Every `interval`: emit `ping`, search again, emit `results`.
//!
//! Liveness is checked at the top of every cycle, and both suspension points
//! (the body wait in step 2 and the sleep in step 4) race against the peer
//! disconnecting, so a session is released at most one interval after its
//! peer leaves. A failed search produces one `error` event; the loop keeps
//! going.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::{ResendPolicy, StreamConfig};
use crate::models::ScoredMatch;
use crate::search::{Query, SearchIndex};

/// Largest request body read while looking for an initial query.
const MAX_QUERY_BODY_BYTES: usize = 64 * 1024;

// ═══════════════════════════════════════════════════════════════════════
// Query sources
// ═══════════════════════════════════════════════════════════════════════

/// One place a session may find its initial query.
#[async_trait]
pub trait QuerySource: Send {
    /// Label used in logs.
    fn name(&self) -> &str;

    /// Return the query text, or `None` if this source has nothing.
    async fn resolve(&mut self) -> Option<String>;
}

/// A URL query parameter, captured when the connection was accepted.
pub struct ParamSource {
    value: Option<String>,
}

impl ParamSource {
    pub fn new(value: Option<String>) -> Self {
        Self { value }
    }
}

#[async_trait]
impl QuerySource for ParamSource {
    fn name(&self) -> &str {
        "param"
    }

    async fn resolve(&mut self) -> Option<String> {
        self.value.take()
    }
}

/// A request header.
pub struct HeaderSource {
    value: Option<String>,
}

impl HeaderSource {
    pub fn new(headers: &HeaderMap, header_name: &str) -> Self {
        let value = headers
            .get(header_name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Self { value }
    }
}

#[async_trait]
impl QuerySource for HeaderSource {
    fn name(&self) -> &str {
        "header"
    }

    async fn resolve(&mut self) -> Option<String> {
        self.value.take()
    }
}

#[derive(Deserialize)]
struct QueryMessage {
    query: String,
}

/// A JSON `{"query": "..."}` message in the request body, awaited for at
/// most `wait`.
pub struct BodySource {
    body: Option<Body>,
    wait: Duration,
}

impl BodySource {
    pub fn new(body: Body, wait: Duration) -> Self {
        Self {
            body: Some(body),
            wait,
        }
    }
}

#[async_trait]
impl QuerySource for BodySource {
    fn name(&self) -> &str {
        "body"
    }

    async fn resolve(&mut self) -> Option<String> {
        let body = self.body.take()?;
        let bytes = match tokio::time::timeout(
            self.wait,
            axum::body::to_bytes(body, MAX_QUERY_BODY_BYTES),
        )
        .await
        {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "could not read query body");
                return None;
            }
            Err(_) => {
                tracing::debug!(wait_ms = self.wait.as_millis() as u64, "no query body before timeout");
                return None;
            }
        };
        if bytes.is_empty() {
            return None;
        }
        match serde_json::from_slice::<QueryMessage>(&bytes) {
            Ok(message) => Some(message.query),
            Err(e) => {
                tracing::debug!(error = %e, "query body is not a query message");
                None
            }
        }
    }
}

/// Try `sources` in order and return the first non-blank answer.
pub async fn resolve_query(sources: &mut [Box<dyn QuerySource>]) -> Option<(String, String)> {
    for source in sources.iter_mut() {
        if let Some(value) = source.resolve().await {
            if !value.trim().is_empty() {
                return Some((source.name().to_string(), value));
            }
        }
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════
// Events
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Ready,
    Results,
    Ping,
    Error,
}

impl EventKind {
    /// The SSE event name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Ready => "ready",
            EventKind::Results => "results",
            EventKind::Ping => "ping",
            EventKind::Error => "error",
        }
    }
}

/// A named event with a JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub kind: EventKind,
    pub data: Value,
}

#[derive(Serialize)]
struct ReadyPayload<'a> {
    session_id: &'a str,
    results: [ScoredMatch; 0],
    interval_secs: u64,
    default_query: &'a str,
}

#[derive(Serialize)]
struct ResultsPayload<'a> {
    session_id: &'a str,
    query: &'a str,
    results: &'a [ScoredMatch],
}

#[derive(Serialize)]
struct PingPayload<'a> {
    session_id: &'a str,
    seq: u64,
    timestamp: String,
}

#[derive(Serialize)]
struct ErrorPayload<'a> {
    session_id: &'a str,
    code: &'a str,
    message: String,
}

// ═══════════════════════════════════════════════════════════════════════
// Session
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingQuery,
    Active,
    Closed,
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub session_id: String,
    pub last_query: Option<Query>,
    pub phase: Phase,
}

/// Per-session tunables. Fixed for the life of the session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub interval: Duration,
    pub default_query: String,
    pub resend: ResendPolicy,
    pub k: usize,
}

impl SessionOptions {
    pub fn from_config(stream: &StreamConfig, k: usize) -> Self {
        Self {
            interval: stream.interval(),
            default_query: stream.default_query.clone(),
            resend: stream.resend,
            k,
        }
    }
}

/// The receiving side went away.
#[derive(Debug)]
struct Disconnected;

pub struct StreamingSession {
    state: SessionState,
    index: SearchIndex,
    options: SessionOptions,
    sources: Vec<Box<dyn QuerySource>>,
    events: mpsc::Sender<SessionEvent>,
    ping_seq: u64,
    last_sent: Option<Vec<ScoredMatch>>,
}

impl StreamingSession {
    pub fn new(
        index: SearchIndex,
        options: SessionOptions,
        sources: Vec<Box<dyn QuerySource>>,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        Self {
            state: SessionState {
                session_id: uuid::Uuid::new_v4().to_string(),
                last_query: None,
                phase: Phase::AwaitingQuery,
            },
            index,
            options,
            sources,
            events,
            ping_seq: 0,
            last_sent: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Drive the session until the peer disconnects. Returns the final state.
    pub async fn run(mut self) -> SessionState {
        tracing::info!(session_id = %self.state.session_id, "session opened");

        if self.emit_ready().await.is_err() {
            return self.close();
        }

        let resolved = tokio::select! {
            resolved = resolve_query(&mut self.sources) => resolved,
            _ = self.events.closed() => return self.close(),
        };
        let query = match resolved {
            Some((source, raw)) => {
                tracing::info!(session_id = %self.state.session_id, source = %source, query = %raw, "query resolved");
                Query::new(raw)
            }
            None => {
                tracing::info!(
                    session_id = %self.state.session_id,
                    query = %self.options.default_query,
                    "no query supplied, using default"
                );
                Query::new(self.options.default_query.clone())
            }
        };

        self.state.last_query = Some(query.clone());
        self.state.phase = Phase::Active;

        if self.cycle(&query, true).await.is_err() {
            return self.close();
        }

        loop {
            if self.events.is_closed() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.options.interval) => {}
                _ = self.events.closed() => break,
            }

            if self.emit_ping().await.is_err() {
                break;
            }
            if self.cycle(&query, false).await.is_err() {
                break;
            }
        }

        self.close()
    }

    /// Search once and emit `results` (or `error`). Only a disconnect is fatal.
    async fn cycle(&mut self, query: &Query, first: bool) -> Result<(), Disconnected> {
        if self.events.is_closed() {
            return Err(Disconnected);
        }

        let outcome = tokio::select! {
            outcome = self.index.search(query, self.options.k) => outcome,
            _ = self.events.closed() => return Err(Disconnected),
        };

        match outcome {
            Ok(results) => {
                let unchanged = self.last_sent.as_deref() == Some(results.as_slice());
                if !first && unchanged && self.options.resend == ResendPolicy::OnChange {
                    return Ok(());
                }
                let payload = ResultsPayload {
                    session_id: &self.state.session_id,
                    query: query.raw(),
                    results: &results,
                };
                let event = to_event(EventKind::Results, &payload);
                self.emit(event).await?;
                self.last_sent = Some(results);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(session_id = %self.state.session_id, error = %e, "search cycle failed");
                self.emit_error(e.code(), e.to_string()).await
            }
        }
    }

    async fn emit_ready(&mut self) -> Result<(), Disconnected> {
        let payload = ReadyPayload {
            session_id: &self.state.session_id,
            results: [],
            interval_secs: self.options.interval.as_secs(),
            default_query: &self.options.default_query,
        };
        let event = to_event(EventKind::Ready, &payload);
        self.emit(event).await
    }

    async fn emit_ping(&mut self) -> Result<(), Disconnected> {
        self.ping_seq += 1;
        let payload = PingPayload {
            session_id: &self.state.session_id,
            seq: self.ping_seq,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        let event = to_event(EventKind::Ping, &payload);
        self.emit(event).await
    }

    async fn emit_error(&mut self, code: &str, message: String) -> Result<(), Disconnected> {
        let payload = ErrorPayload {
            session_id: &self.state.session_id,
            code,
            message,
        };
        let event = to_event(EventKind::Error, &payload);
        self.emit(event).await
    }

    async fn emit(&mut self, event: SessionEvent) -> Result<(), Disconnected> {
        self.events.send(event).await.map_err(|_| Disconnected)
    }

    fn close(mut self) -> SessionState {
        self.state.phase = Phase::Closed;
        tracing::info!(session_id = %self.state.session_id, pings = self.ping_seq, "session closed");
        self.state
    }
}

/// Serialize a payload; a serialization failure becomes an `error` event.
fn to_event<T: Serialize>(kind: EventKind, payload: &T) -> SessionEvent {
    match serde_json::to_value(payload) {
        Ok(data) => SessionEvent { kind, data },
        Err(e) => SessionEvent {
            kind: EventKind::Error,
            data: serde_json::json!({ "code": "internal", "message": e.to_string() }),
        },
    }
}
