//! Run-scoped artifact storage.
//!
//! A store is a write-once map from target triple to [`Artifact`]. It is the
//! only channel between the build, signing and release stages. The single
//! exception to write-once is [`ArtifactStore::promote_signed`], which swaps
//! an unsigned artifact for its signed self exactly once.

mod filesystem;
mod memory;

pub use filesystem::FilesystemArtifactStore;
pub use memory::InMemoryArtifactStore;

use crate::config::{PipelineConfig, StoreKind};
use crate::core::Artifact;
use crate::errors::{ReleaseflowError, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

/// Storage for the artifacts of one run.
#[async_trait]
pub trait ArtifactStore: Send + Sync + Debug {
    /// Stores `artifact` under `key` and returns the stored value, with the
    /// blob's SHA-256 recorded.
    ///
    /// # Errors
    ///
    /// `DuplicateKey` if `key` was already published in this run, `Io` if
    /// the blob cannot be read.
    async fn publish(&self, key: &str, artifact: Artifact) -> Result<Artifact>;

    /// Returns the artifact stored under `key`.
    ///
    /// # Errors
    ///
    /// `NotFound` if `key` was never published.
    async fn fetch(&self, key: &str) -> Result<Artifact>;

    /// Replaces the unsigned artifact under `key` with its signed version,
    /// digesting the signed blob.
    ///
    /// # Errors
    ///
    /// `NotFound` if `key` was never published, `DuplicateKey` if it was
    /// already promoted, `Internal` if `artifact` is not signed, `Io` if the
    /// signed blob cannot be read.
    async fn promote_signed(&self, key: &str, artifact: Artifact) -> Result<Artifact>;

    /// Published keys, sorted.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Drops everything the run stored.
    async fn discard(&self) -> Result<()>;
}

/// Opens the store the configuration asks for, private to run `run_id`.
#[must_use]
pub fn open_store(config: &PipelineConfig, run_id: &str) -> Arc<dyn ArtifactStore> {
    match config.store.kind {
        StoreKind::Memory => Arc::new(InMemoryArtifactStore::new()),
        StoreKind::Filesystem => {
            Arc::new(FilesystemArtifactStore::new(config.stash_dir(run_id)))
        }
    }
}

/// Hex SHA-256 of a file's contents.
///
/// # Errors
///
/// `Io` if the file cannot be read.
pub async fn digest_file(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

fn ensure_signed(key: &str, artifact: &Artifact) -> Result<()> {
    if artifact.signed {
        Ok(())
    } else {
        Err(ReleaseflowError::Internal(format!(
            "artifact '{key}' must be signed to be promoted"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_digest_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob");
        std::fs::write(&path, b"abc").unwrap();

        assert_eq!(
            digest_file(&path).await.unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_open_store_follows_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = crate::testing::fixtures::sample_config(dir.path());
        config.store.kind = StoreKind::Memory;
        let store = open_store(&config, "run-a");
        assert!(format!("{store:?}").contains("InMemory"));

        config.store.kind = StoreKind::Filesystem;
        let store = open_store(&config, "run-a");
        let debug = format!("{store:?}");
        assert!(debug.contains("Filesystem"));
        assert!(debug.contains("run-a"));
    }
}
