//! Artifact store on local disk.
//!
//! Layout: `<stash>/<key>/<canonical name>` plus `<stash>/<key>/artifact.json`.
//! Creating the key directory is the atomic claim on the key.

use super::{digest_file, ensure_signed, ArtifactStore};
use crate::core::Artifact;
use crate::errors::{ReleaseflowError, Result};
use crate::utils::path_safe;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

const METADATA_FILE: &str = "artifact.json";

/// A store that copies every blob into a stash directory.
#[derive(Debug, Clone)]
pub struct FilesystemArtifactStore {
    root: PathBuf,
}

impl FilesystemArtifactStore {
    /// Creates a store rooted at `root`. Nothing is created until the first
    /// publish.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The stash directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn slot(&self, key: &str) -> PathBuf {
        self.root.join(path_safe(key))
    }

    async fn read_metadata(&self, key: &str) -> Result<Artifact> {
        let path = self.slot(key).join(METADATA_FILE);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(ReleaseflowError::NotFound {
                key: key.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_metadata(&self, key: &str, artifact: &Artifact) -> Result<()> {
        let slot = self.slot(key);
        let tmp = slot.join(format!("{METADATA_FILE}.tmp"));
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(artifact)?).await?;
        tokio::fs::rename(&tmp, slot.join(METADATA_FILE)).await?;
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for FilesystemArtifactStore {
    async fn publish(&self, key: &str, artifact: Artifact) -> Result<Artifact> {
        tokio::fs::create_dir_all(&self.root).await?;
        let slot = self.slot(key);
        match tokio::fs::create_dir(&slot).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(ReleaseflowError::DuplicateKey {
                    key: key.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        }

        let blob = slot.join(artifact.canonical_name());
        tokio::fs::copy(&artifact.path, &blob).await?;
        let mut stored = artifact.relocated(&blob);
        stored.sha256 = Some(digest_file(&blob).await?);
        self.write_metadata(key, &stored).await?;

        debug!(key, path = %blob.display(), "Stashed artifact");
        Ok(stored)
    }

    async fn fetch(&self, key: &str) -> Result<Artifact> {
        self.read_metadata(key).await
    }

    async fn promote_signed(&self, key: &str, artifact: Artifact) -> Result<Artifact> {
        ensure_signed(key, &artifact)?;
        let current = self.read_metadata(key).await?;
        if current.signed {
            return Err(ReleaseflowError::DuplicateKey {
                key: key.to_string(),
            });
        }

        let blob = self.slot(key).join(artifact.canonical_name());
        if artifact.path != blob {
            tokio::fs::copy(&artifact.path, &blob).await?;
        }
        let mut stored = artifact.relocated(&blob);
        stored.sha256 = Some(digest_file(&blob).await?);
        self.write_metadata(key, &stored).await?;
        Ok(stored)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.path().join(METADATA_FILE);
            if tokio::fs::try_exists(&metadata).await? {
                let bytes = tokio::fs::read(&metadata).await?;
                let artifact: Artifact = serde_json::from_slice(&bytes)?;
                keys.push(artifact.key().to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn discard(&self) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
