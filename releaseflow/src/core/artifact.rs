//! The built binary for one target.

use super::Target;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A built binary under its canonical cross-platform name.
///
/// Created by a build stage. Only the signing stage changes it, by flipping
/// `signed`; it is never changed after it reaches the release publisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Name of the tool the binary is a build of.
    pub tool_name: String,
    /// The target it was built for.
    pub target: Target,
    /// Where the binary currently lives.
    pub path: PathBuf,
    /// Whether the binary has been signed.
    #[serde(default)]
    pub signed: bool,
    /// Hex SHA-256 of the blob, recorded by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    /// When the artifact was created (ISO 8601).
    pub created_at: String,
}

impl Artifact {
    /// Creates an unsigned artifact.
    #[must_use]
    pub fn new(tool_name: impl Into<String>, target: Target, path: impl Into<PathBuf>) -> Self {
        Self {
            tool_name: tool_name.into(),
            target,
            path: path.into(),
            signed: false,
            sha256: None,
            created_at: crate::utils::iso_timestamp(),
        }
    }

    /// The store key for this artifact.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.target.triple
    }

    /// The canonical asset name, `<tool>-<triple>[.exe]`.
    #[must_use]
    pub fn canonical_name(&self) -> String {
        self.target.canonical_name(&self.tool_name)
    }

    /// Returns a copy located at `path`.
    #[must_use]
    pub fn relocated(&self, path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..self.clone()
        }
    }

    /// Returns the signed promotion of this artifact.
    #[must_use]
    pub fn into_signed(self) -> Self {
        Self {
            signed: true,
            ..self
        }
    }

    /// Whether the artifact may be attached to a release: signed, or for a
    /// target that does not require signing.
    #[must_use]
    pub fn is_releasable(&self) -> bool {
        self.signed || !self.target.requires_signing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_creation() {
        let target = Target::new("windows-x86_64", "windows");
        let artifact = Artifact::new("gt-installer", target, "dist/gt-installer-windows-x86_64.exe");

        assert_eq!(artifact.key(), "windows-x86_64");
        assert_eq!(artifact.canonical_name(), "gt-installer-windows-x86_64.exe");
        assert!(!artifact.signed);
        assert!(artifact.is_releasable());
    }

    #[test]
    fn test_signing_required_artifact_is_releasable_only_when_signed() {
        let target = Target::new("macos-arm64", "mac").with_signing();
        let artifact = Artifact::new("gt-installer", target, "dist/x");

        assert!(!artifact.is_releasable());
        assert!(artifact.into_signed().is_releasable());
    }

    #[test]
    fn test_artifact_serialization() {
        let artifact = Artifact::new("tool", Target::new("linux-x86_64", "linux"), "/tmp/tool");
        let json = serde_json::to_string(&artifact).unwrap();
        let deserialized: Artifact = serde_json::from_str(&json).unwrap();

        assert_eq!(artifact, deserialized);
        assert!(!json.contains("sha256"));
    }
}
