//! Git repository loader.
//!
//! Clones the configured repository (shallow by default) into a cache
//! directory, or fetches and resets an existing clone, then scans the
//! configured subdirectory.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::GitCorpusConfig;
use crate::loader::{scan_directory, CorpusLoader, FileFilter};
use crate::models::Document;

pub struct GitLoader {
    config: GitCorpusConfig,
    filter: FileFilter,
}

impl GitLoader {
    pub fn new(config: GitCorpusConfig, filter: FileFilter) -> Self {
        Self { config, filter }
    }

    fn cache_dir(&self) -> PathBuf {
        match &self.config.cache_dir {
            Some(dir) => dir.clone(),
            None => std::env::temp_dir()
                .join("rctx-git-cache")
                .join(short_hash(&self.config.url)),
        }
    }
}

#[async_trait]
impl CorpusLoader for GitLoader {
    fn name(&self) -> &str {
        "git"
    }

    async fn load(&self) -> Result<Vec<Document>> {
        let config = self.config.clone();
        let filter = self.filter.clone();
        let cache_dir = self.cache_dir();

        tokio::task::spawn_blocking(move || sync_and_scan(&config, &filter, &cache_dir))
            .await
            .context("git scan task failed")?
    }
}

fn sync_and_scan(
    config: &GitCorpusConfig,
    filter: &FileFilter,
    cache_dir: &Path,
) -> Result<Vec<Document>> {
    if cache_dir.join(".git").exists() {
        tracing::info!(url = %config.url, dir = %cache_dir.display(), "updating git cache");
        git_pull(cache_dir, &config.branch)?;
    } else {
        tracing::info!(url = %config.url, dir = %cache_dir.display(), "cloning repository");
        git_clone(&config.url, &config.branch, config.shallow, cache_dir)?;
    }

    let scan_root = if config.root == "." {
        cache_dir.to_path_buf()
    } else {
        cache_dir.join(&config.root)
    };
    if !scan_root.exists() {
        bail!(
            "Git corpus root '{}' does not exist in repo {}",
            config.root,
            config.url
        );
    }

    let sha = git_head_sha(cache_dir).unwrap_or_else(|_| config.branch.clone());
    let prefix = if config.root == "." {
        String::new()
    } else {
        format!("{}/", config.root.trim_matches('/'))
    };

    scan_directory(&scan_root, filter, false, |id| {
        build_web_url(&config.url, &sha, &format!("{}{}", prefix, id))
    })
}

fn git_clone(url: &str, branch: &str, shallow: bool, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)
        .with_context(|| format!("Failed to create cache directory: {}", dest.display()))?;

    let mut cmd = Command::new("git");
    cmd.args(["clone", "--branch", branch, "--single-branch"]);
    if shallow {
        cmd.args(["--depth", "1"]);
    }
    cmd.arg(url);
    cmd.arg(dest);

    let output = cmd
        .output()
        .with_context(|| "Failed to execute 'git clone'. Is git installed?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git clone failed: {}", stderr.trim());
    }

    Ok(())
}

fn git_pull(repo_dir: &Path, branch: &str) -> Result<()> {
    run_git(repo_dir, &["fetch", "origin", branch])?;
    run_git(repo_dir, &["reset", "--hard", &format!("origin/{}", branch)])?;
    Ok(())
}

fn git_head_sha(repo_dir: &Path) -> Result<String> {
    run_git(repo_dir, &["rev-parse", "HEAD"])
}

fn run_git(repo_dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_dir)
        .output()
        .with_context(|| format!("Failed to execute 'git {}'", args.join(" ")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git {} failed: {}", args[0], stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Browsable URL for a file at `rev`.
///
/// scp-style remotes (`git@host:org/repo.git`) are rewritten to https first.
/// github.com and GitLab hosts (including self-hosted `gitlab.*`) get their
/// blob layout; anything else falls back to a `git://` pseudo-URL.
pub(crate) fn build_web_url(repo_url: &str, rev: &str, relative_path: &str) -> String {
    let remote = repo_url.trim_end_matches('/').trim_end_matches(".git");
    let https = match remote.strip_prefix("git@") {
        Some(scp) => format!("https://{}", scp.replacen(':', "/", 1)),
        None => remote.to_string(),
    };
    let host = https
        .strip_prefix("https://")
        .or_else(|| https.strip_prefix("http://"))
        .and_then(|rest| rest.split('/').next())
        .unwrap_or("");

    match host {
        "github.com" => format!("{}/blob/{}/{}", https, rev, relative_path),
        h if h == "gitlab.com" || h.starts_with("gitlab.") => {
            format!("{}/-/blob/{}/{}", https, rev, relative_path)
        }
        _ => format!("git://{}/{}", repo_url, relative_path),
    }
}

/// First 12 hex digits of the SHA-256 of `input`.
fn short_hash(input: &str) -> String {
    Sha256::digest(input.as_bytes())
        .iter()
        .take(6)
        .map(|b| format!("{:02x}", b))
        .collect()
}
