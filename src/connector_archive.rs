//! Zip archive loader.
//!
//! Downloads a `.zip` (e.g. a GitHub branch archive) and unpacks it into
//! `extract_dir`. An existing `extract_dir` is reused as-is, so the download
//! happens at most once per machine. Extraction goes through a staging
//! directory that is renamed into place only after the archive unpacked
//! cleanly.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::ArchiveCorpusConfig;
use crate::loader::{scan_directory, CorpusLoader, FileFilter};
use crate::models::Document;

pub struct ArchiveLoader {
    config: ArchiveCorpusConfig,
    filter: FileFilter,
}

impl ArchiveLoader {
    pub fn new(config: ArchiveCorpusConfig, filter: FileFilter) -> Self {
        Self { config, filter }
    }

    async fn download(&self) -> Result<Vec<u8>> {
        tracing::info!(url = %self.config.url, "downloading corpus archive");

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()?;
        let resp = client
            .get(&self.config.url)
            .send()
            .await
            .with_context(|| format!("Failed to download {}", self.config.url))?;

        if !resp.status().is_success() {
            bail!(
                "Archive download failed with status {}: {}",
                resp.status(),
                self.config.url
            );
        }

        let bytes = resp.bytes().await?;
        tracing::info!(bytes = bytes.len(), "archive downloaded");
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl CorpusLoader for ArchiveLoader {
    fn name(&self) -> &str {
        "archive"
    }

    async fn load(&self) -> Result<Vec<Document>> {
        let extract_dir = self.config.extract_dir.clone();

        if extract_dir.exists() {
            tracing::info!(dir = %extract_dir.display(), "reusing extracted archive");
        } else {
            let bytes = self.download().await?;
            let dest = extract_dir.clone();
            tokio::task::spawn_blocking(move || unpack(&bytes, &dest))
                .await
                .context("archive extraction task failed")??;
            tracing::info!(dir = %extract_dir.display(), "archive extracted");
        }

        let filter = self.filter.clone();
        let web_base = self.config.web_base.clone();
        tokio::task::spawn_blocking(move || {
            let root = archive_root(&extract_dir)?;
            scan_directory(&root, &filter, false, |id| match &web_base {
                Some(base) => format!("{}/{}", base.trim_end_matches('/'), id),
                None => format!("file://{}", root.join(id).display()),
            })
        })
        .await
        .context("archive scan task failed")?
    }
}

/// Extract `bytes` into `dest` via a sibling staging directory.
fn unpack(bytes: &[u8], dest: &Path) -> Result<()> {
    let staging = staging_dir(dest);
    if staging.exists() {
        std::fs::remove_dir_all(&staging)
            .with_context(|| format!("Failed to clear {}", staging.display()))?;
    }
    std::fs::create_dir_all(&staging)
        .with_context(|| format!("Failed to create {}", staging.display()))?;

    let result = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .context("Downloaded file is not a valid zip archive")
        .and_then(|mut archive| {
            archive
                .extract(&staging)
                .context("Failed to extract zip archive")
        });

    if let Err(e) = result {
        let _ = std::fs::remove_dir_all(&staging);
        return Err(e);
    }

    std::fs::rename(&staging, dest)
        .with_context(|| format!("Failed to move archive into {}", dest.display()))?;
    Ok(())
}

fn staging_dir(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    dest.with_file_name(name)
}

/// Branch archives wrap everything in one `<repo>-<branch>/` directory;
/// scan inside it when that is the only entry.
fn archive_root(extract_dir: &Path) -> Result<PathBuf> {
    let entries: Vec<PathBuf> = std::fs::read_dir(extract_dir)
        .with_context(|| format!("Failed to read {}", extract_dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect();

    match entries.as_slice() {
        [only] if only.is_dir() => Ok(only.clone()),
        _ => Ok(extract_dir.to_path_buf()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn make_zip(files: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            let options = zip::write::SimpleFileOptions::default();
            for (name, body) in files {
                writer.start_file(*name, options).unwrap();
                writer.write_all(body.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn test_unpack_and_root_detection() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("corpus");
        let bytes = make_zip(&[
            ("examples-main/README.md", "# examples"),
            ("examples-main/models/vrouter.yang", "module vrouter {}"),
        ]);

        unpack(&bytes, &dest).unwrap();

        assert!(dest.join("examples-main/models/vrouter.yang").exists());
        assert!(!staging_dir(&dest).exists());
        assert_eq!(archive_root(&dest).unwrap(), dest.join("examples-main"));
    }

    #[test]
    fn test_unpack_invalid_archive_leaves_nothing() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("corpus");

        let err = unpack(b"not a zip", &dest).unwrap_err();
        assert!(err.to_string().contains("not a valid zip"));
        assert!(!dest.exists());
        assert!(!staging_dir(&dest).exists());
    }

    #[tokio::test]
    async fn test_load_reuses_extract_dir() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("corpus");
        unpack(
            &make_zip(&[("repo-main/models/vrouter.yang", "module vrouter {}")]),
            &dest,
        )
        .unwrap();

        // The URL is never contacted because the directory already exists.
        let loader = ArchiveLoader::new(
            ArchiveCorpusConfig {
                url: "http://127.0.0.1:9/unreachable.zip".to_string(),
                extract_dir: dest,
                web_base: Some("https://github.com/org/repo/blob/main/".to_string()),
                timeout_secs: 1,
            },
            FileFilter::new(&["**/*.yang".to_string()], &[]).unwrap(),
        );

        let docs = loader.load().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "models/vrouter.yang");
        assert_eq!(
            docs[0].source_url,
            "https://github.com/org/repo/blob/main/models/vrouter.yang"
        );
    }
}
