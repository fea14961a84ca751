//! Version bump levels and release requests.

use super::Artifact;
use crate::secrets::Secret;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The semantic-versioning increment applied by the release tool.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum BumpLevel {
    /// x.y.Z
    #[default]
    Patch,
    /// x.Y.0
    Minor,
    /// X.0.0
    Major,
}

impl BumpLevel {
    /// The level as passed to the release tool.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Patch => "patch",
            Self::Minor => "minor",
            Self::Major => "major",
        }
    }
}

impl fmt::Display for BumpLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the release tool is invoked with.
///
/// Built once, immediately before the invocation, and never persisted.
#[derive(Debug, Clone)]
pub struct ReleaseRequest {
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Version increment.
    pub bump: BumpLevel,
    /// One artifact per registered target, in registry order.
    pub assets: Vec<Artifact>,
    /// Release API credential.
    pub auth_token: Secret,
}

impl ReleaseRequest {
    /// Paths of the assets, in order.
    #[must_use]
    pub fn asset_paths(&self) -> Vec<PathBuf> {
        self.assets.iter().map(|a| a.path.clone()).collect()
    }

    /// Canonical names of the assets, in order.
    #[must_use]
    pub fn asset_names(&self) -> Vec<String> {
        self.assets.iter().map(Artifact::canonical_name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bump_display_matches_release_tool_flag() {
        assert_eq!(BumpLevel::Major.to_string(), "major");
        assert_eq!(BumpLevel::default().as_str(), "patch");
        assert_eq!(serde_json::to_string(&BumpLevel::Minor).unwrap(), "\"minor\"");
    }

    #[test]
    fn test_request_does_not_leak_token() {
        let request = ReleaseRequest {
            owner: "feenkcom".to_string(),
            repo: "gtoolkit-maker".to_string(),
            bump: BumpLevel::Patch,
            assets: Vec::new(),
            auth_token: Secret::new("ghp_abcdef"),
        };
        assert!(!format!("{request:?}").contains("ghp_abcdef"));
    }
}
