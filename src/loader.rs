//! Corpus acquisition.
//!
//! A [`CorpusLoader`] produces the full document set in one call. The
//! built-in loaders ([`ArchiveLoader`](crate::connector_archive::ArchiveLoader),
//! [`GitLoader`](crate::connector_git::GitLoader),
//! [`FilesystemLoader`](crate::connector_fs::FilesystemLoader)) all obtain a
//! directory and hand it to [`scan_directory`].

use anyhow::{bail, Result};
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use std::sync::Arc;
use walkdir::WalkDir;

use crate::config::Config;
use crate::connector_archive::ArchiveLoader;
use crate::connector_fs::FilesystemLoader;
use crate::connector_git::GitLoader;
use crate::models::Document;

/// Source of the corpus.
///
/// Implementations may do network and disk I/O. Any error is surfaced to
/// callers of [`CorpusStore::ensure_loaded`](crate::corpus::CorpusStore::ensure_loaded)
/// as `CorpusUnavailable`.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use anyhow::Result;
/// use repo_context::loader::CorpusLoader;
/// use repo_context::models::Document;
///
/// struct Fixed(Vec<Document>);
///
/// #[async_trait]
/// impl CorpusLoader for Fixed {
///     fn name(&self) -> &str { "fixed" }
///     async fn load(&self) -> Result<Vec<Document>> { Ok(self.0.clone()) }
/// }
/// ```
#[async_trait]
pub trait CorpusLoader: Send + Sync {
    /// Short label used in logs (e.g. `"archive"`, `"git"`).
    fn name(&self) -> &str;

    /// Produce every document, in a stable order.
    async fn load(&self) -> Result<Vec<Document>>;
}

/// Build the loader selected by `[corpus.*]`.
pub fn loader_from_config(config: &Config) -> Result<Arc<dyn CorpusLoader>> {
    let corpus = &config.corpus;
    let filter = FileFilter::new(&corpus.include_globs, &corpus.exclude_globs)?;

    if let Some(archive) = &corpus.archive {
        return Ok(Arc::new(ArchiveLoader::new(archive.clone(), filter)));
    }
    if let Some(git) = &corpus.git {
        return Ok(Arc::new(GitLoader::new(git.clone(), filter)));
    }
    if let Some(fs) = &corpus.filesystem {
        return Ok(Arc::new(FilesystemLoader::new(fs.clone(), filter)));
    }
    bail!("No corpus source configured")
}

/// Include/exclude glob filter applied to paths relative to the scan root.
#[derive(Clone)]
pub struct FileFilter {
    include: GlobSet,
    exclude: GlobSet,
}

impl FileFilter {
    pub fn new(include_globs: &[String], exclude_globs: &[String]) -> Result<Self> {
        let mut excludes = vec![
            "**/.git/**".to_string(),
            "**/target/**".to_string(),
            "**/node_modules/**".to_string(),
        ];
        excludes.extend(exclude_globs.iter().cloned());

        Ok(Self {
            include: build_globset(include_globs)?,
            exclude: build_globset(&excludes)?,
        })
    }

    pub fn accepts(&self, relative: &str) -> bool {
        !self.exclude.is_match(relative) && self.include.is_match(relative)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Walk `root` and turn every accepted UTF-8 file into a [`Document`].
///
/// Document text is prefixed with `### <file name>` so the name is itself
/// searchable. Entries that cannot be visited and files that cannot be read
/// as UTF-8 are skipped with a warning.
/// `source_url` maps a relative path to the document's browsable location.
pub fn scan_directory(
    root: &Path,
    filter: &FileFilter,
    follow_symlinks: bool,
    source_url: impl Fn(&str) -> String,
) -> Result<Vec<Document>> {
    if !root.exists() {
        bail!("Corpus root does not exist: {}", root.display());
    }

    let mut docs = Vec::new();

    for entry in WalkDir::new(root).follow_links(follow_symlinks) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let id = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if !filter.accepts(&id) {
            continue;
        }

        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable file");
                continue;
            }
        };

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        docs.push(Document {
            source_url: source_url(&id),
            text: format!("### {}\n{}", file_name, contents),
            id,
        });
    }

    // Sort for deterministic ordering
    docs.sort_by(|a, b| a.id.cmp(&b.id));

    Ok(docs)
}
