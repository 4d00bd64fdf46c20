//! Local directory loader.

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::config::FilesystemCorpusConfig;
use crate::loader::{scan_directory, CorpusLoader, FileFilter};
use crate::models::Document;

pub struct FilesystemLoader {
    config: FilesystemCorpusConfig,
    filter: FileFilter,
}

impl FilesystemLoader {
    pub fn new(config: FilesystemCorpusConfig, filter: FileFilter) -> Self {
        Self { config, filter }
    }
}

#[async_trait]
impl CorpusLoader for FilesystemLoader {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn load(&self) -> Result<Vec<Document>> {
        let root = self.config.root.clone();
        let filter = self.filter.clone();
        let follow_symlinks = self.config.follow_symlinks;

        tokio::task::spawn_blocking(move || {
            let base = root.clone();
            scan_directory(&root, &filter, follow_symlinks, |id| {
                format!("file://{}", base.join(id).display())
            })
        })
        .await
        .context("filesystem scan task failed")?
    }
}
