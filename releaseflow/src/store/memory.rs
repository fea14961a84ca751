//! Process-local artifact store.

use super::{digest_file, ensure_signed, ArtifactStore};
use crate::core::Artifact;
use crate::errors::{ReleaseflowError, Result};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// A store backed by a concurrent map. Artifacts stay where the build left
/// them on disk; their digests are taken at publish and promotion time.
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    entries: DashMap<String, Artifact>,
}

impl InMemoryArtifactStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been published.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn unsigned(&self, key: &str) -> Result<()> {
        match self.entries.get(key) {
            None => Err(not_found(key)),
            Some(entry) if entry.signed => Err(duplicate(key)),
            Some(_) => Ok(()),
        }
    }
}

fn not_found(key: &str) -> ReleaseflowError {
    ReleaseflowError::NotFound {
        key: key.to_string(),
    }
}

fn duplicate(key: &str) -> ReleaseflowError {
    ReleaseflowError::DuplicateKey {
        key: key.to_string(),
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn publish(&self, key: &str, mut artifact: Artifact) -> Result<Artifact> {
        if self.entries.contains_key(key) {
            return Err(duplicate(key));
        }
        artifact.sha256 = Some(digest_file(&artifact.path).await?);

        match self.entries.entry(key.to_string()) {
            Entry::Occupied(_) => Err(duplicate(key)),
            Entry::Vacant(slot) => {
                slot.insert(artifact.clone());
                Ok(artifact)
            }
        }
    }

    async fn fetch(&self, key: &str) -> Result<Artifact> {
        self.entries
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| not_found(key))
    }

    async fn promote_signed(&self, key: &str, mut artifact: Artifact) -> Result<Artifact> {
        ensure_signed(key, &artifact)?;
        self.unsigned(key)?;
        artifact.sha256 = Some(digest_file(&artifact.path).await?);

        let mut entry = self.entries.get_mut(key).ok_or_else(|| not_found(key))?;
        if entry.signed {
            return Err(duplicate(key));
        }
        *entry = artifact.clone();
        Ok(artifact)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        Ok(keys)
    }

    async fn discard(&self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}
