//! TOML configuration parsing and validation.
//!
//! A config file has four sections:
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8000"
//!
//! [retrieval]
//! top_k = 3
//! snippet_chars = 1000
//!
//! [stream]
//! interval_secs = 10
//! default_query = "vrouter"
//!
//! [corpus.archive]
//! url = "https://github.com/NSO-developer/nso-examples/archive/refs/heads/main.zip"
//! extract_dir = "/tmp/rctx-corpus"
//! ```
//!
//! Exactly one of `[corpus.archive]`, `[corpus.git]` and `[corpus.filesystem]`
//! must be present.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    pub corpus: CorpusConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// Load the corpus in the background as soon as the server starts.
    #[serde(default = "default_prewarm")]
    pub prewarm: bool,
}

fn default_prewarm() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Upper bound applied to caller-supplied `k` values.
    #[serde(default = "default_max_k")]
    pub max_k: usize,
    /// Length, in characters, of the text prefix returned with each match.
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_k: default_max_k(),
            snippet_chars: default_snippet_chars(),
        }
    }
}

fn default_top_k() -> usize {
    3
}
fn default_max_k() -> usize {
    50
}
fn default_snippet_chars() -> usize {
    1000
}

/// When a streaming session emits `results` during its active loop.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResendPolicy {
    /// Every cycle, whether or not the matches changed.
    #[default]
    Always,
    /// Only when the match list differs from the last one sent.
    OnChange,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StreamConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_query")]
    pub default_query: String,
    #[serde(default)]
    pub resend: ResendPolicy,
    /// Name of the URL query parameter checked for the initial query.
    #[serde(default = "default_query_param")]
    pub query_param: String,
    /// Name of the request header checked for the initial query.
    #[serde(default = "default_query_header")]
    pub query_header: String,
    /// How long to wait for a JSON body carrying the initial query.
    #[serde(default = "default_body_wait_ms")]
    pub body_wait_ms: u64,
    /// Capacity of the per-session event channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            default_query: default_query(),
            resend: ResendPolicy::default(),
            query_param: default_query_param(),
            query_header: default_query_header(),
            body_wait_ms: default_body_wait_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl StreamConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn body_wait(&self) -> Duration {
        Duration::from_millis(self.body_wait_ms)
    }
}

fn default_interval_secs() -> u64 {
    10
}
fn default_query() -> String {
    "vrouter".to_string()
}
fn default_query_param() -> String {
    "query".to_string()
}
fn default_query_header() -> String {
    "x-query".to_string()
}
fn default_body_wait_ms() -> u64 {
    1000
}
fn default_channel_capacity() -> usize {
    16
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CorpusConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    pub archive: Option<ArchiveCorpusConfig>,
    pub git: Option<GitCorpusConfig>,
    pub filesystem: Option<FilesystemCorpusConfig>,
}

fn default_include_globs() -> Vec<String> {
    ["py", "xml", "yang", "md", "txt", "cfg"]
        .iter()
        .map(|ext| format!("**/*.{}", ext))
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArchiveCorpusConfig {
    /// URL of a `.zip` archive.
    pub url: String,
    /// Directory the archive is unpacked into. Reused when it already exists.
    pub extract_dir: PathBuf,
    /// Prefix used to build per-file source URLs, e.g.
    /// `https://github.com/org/repo/blob/main`.
    #[serde(default)]
    pub web_base: Option<String>,
    #[serde(default = "default_download_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_download_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GitCorpusConfig {
    pub url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Subdirectory of the repository to scan.
    #[serde(default = "default_git_root")]
    pub root: String,
    #[serde(default = "default_shallow")]
    pub shallow: bool,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

fn default_branch() -> String {
    "main".to_string()
}
fn default_git_root() -> String {
    ".".to_string()
}
fn default_shallow() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct FilesystemCorpusConfig {
    pub root: PathBuf,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Config {
    /// A config serving the given directory with every other setting at its default.
    pub fn for_directory(root: impl Into<PathBuf>, bind: impl Into<String>) -> Self {
        Self {
            server: ServerConfig {
                bind: bind.into(),
                prewarm: default_prewarm(),
            },
            retrieval: RetrievalConfig::default(),
            stream: StreamConfig::default(),
            corpus: CorpusConfig {
                include_globs: default_include_globs(),
                filesystem: Some(FilesystemCorpusConfig {
                    root: root.into(),
                    follow_symlinks: false,
                }),
                ..Default::default()
            },
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.retrieval.top_k == 0 {
        bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.max_k < config.retrieval.top_k {
        bail!("retrieval.max_k must be >= retrieval.top_k");
    }
    if config.retrieval.snippet_chars == 0 {
        bail!("retrieval.snippet_chars must be > 0");
    }

    if config.stream.interval_secs == 0 {
        bail!("stream.interval_secs must be > 0");
    }
    if config.stream.default_query.trim().is_empty() {
        bail!("stream.default_query must not be empty");
    }
    if config.stream.channel_capacity == 0 {
        bail!("stream.channel_capacity must be > 0");
    }

    let sources = [
        config.corpus.archive.is_some(),
        config.corpus.git.is_some(),
        config.corpus.filesystem.is_some(),
    ]
    .iter()
    .filter(|set| **set)
    .count();
    match sources {
        0 => bail!("No corpus source configured. Add [corpus.archive], [corpus.git] or [corpus.filesystem]."),
        1 => {}
        _ => bail!("Only one corpus source may be configured, found {}", sources),
    }

    if config.corpus.include_globs.is_empty() {
        bail!("corpus.include_globs must not be empty");
    }

    Ok(())
}
