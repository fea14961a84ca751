//! The set of targets a release is made of, and the agents that build them.

use crate::core::Target;
use crate::errors::{ReleaseflowError, Result};
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

static TRIPLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_]+(-[A-Za-z0-9_.]+)+$")
        .unwrap_or_else(|e| unreachable!("triple pattern is a valid regex: {e}"))
});

/// Returns true if `triple` looks like an os-arch-abi triple.
#[must_use]
pub fn is_valid_triple(triple: &str) -> bool {
    TRIPLE_PATTERN.is_match(triple)
}

/// The statically configured list of targets for one pipeline.
///
/// Triples are unique and the order is the order assets are attached to
/// the release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRegistry {
    targets: Vec<Target>,
}

impl TargetRegistry {
    /// Creates a registry, validating every target.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the list is empty, a triple is malformed, an
    /// agent label is empty, or a triple appears twice.
    pub fn new(targets: Vec<Target>) -> Result<Self> {
        if targets.is_empty() {
            return Err(ReleaseflowError::config("at least one target is required"));
        }

        let mut seen = HashSet::new();
        for target in &targets {
            if !is_valid_triple(&target.triple) {
                return Err(ReleaseflowError::config(format!(
                    "'{}' is not a valid target triple",
                    target.triple
                )));
            }
            if target.agent.trim().is_empty() {
                return Err(ReleaseflowError::config(format!(
                    "target '{}' has no agent",
                    target.triple
                )));
            }
            if !seen.insert(target.triple.as_str()) {
                return Err(ReleaseflowError::config(format!(
                    "target '{}' is listed more than once",
                    target.triple
                )));
            }
        }

        Ok(Self { targets })
    }

    /// Every target, in registry order.
    #[must_use]
    pub fn list_targets(&self) -> &[Target] {
        &self.targets
    }

    /// Looks a target up by triple.
    #[must_use]
    pub fn get(&self, triple: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.triple == triple)
    }

    /// Every triple, in registry order.
    #[must_use]
    pub fn triples(&self) -> Vec<&str> {
        self.targets.iter().map(|t| t.triple.as_str()).collect()
    }

    /// Returns true if any target must be signed before release.
    #[must_use]
    pub fn any_requires_signing(&self) -> bool {
        self.targets.iter().any(|t| t.requires_signing)
    }

    /// Number of targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Always false for a validated registry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// The agents currently able to take work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentPool {
    available: BTreeSet<String>,
}

impl AgentPool {
    /// Creates a pool from agent labels.
    pub fn new(labels: impl IntoIterator<Item = String>) -> Self {
        Self {
            available: labels.into_iter().collect(),
        }
    }

    /// Returns true if `agent` can take work.
    #[must_use]
    pub fn is_available(&self, agent: &str) -> bool {
        self.available.contains(agent)
    }

    /// Returns the agent label `target` must build on.
    ///
    /// # Errors
    ///
    /// Returns `AgentUnavailable` if that agent is not in the pool. A target
    /// is never rerouted to another agent.
    pub fn resolve<'a>(&self, target: &'a Target) -> Result<&'a str> {
        if self.is_available(&target.agent) {
            Ok(&target.agent)
        } else {
            Err(ReleaseflowError::AgentUnavailable {
                agent: target.agent.clone(),
                triple: target.triple.clone(),
            })
        }
    }

    /// Available labels, sorted.
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        self.available.iter().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::{rust_targets, sample_targets};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_registry_preserves_order() {
        let registry = TargetRegistry::new(sample_targets()).unwrap();
        assert_eq!(
            registry.triples(),
            vec!["linux-x86_64", "macos-arm64", "windows-x86_64"]
        );
        assert_eq!(registry.get("macos-arm64").unwrap().agent, "mac");
        assert!(registry.get("linux-arm64").is_none());
        assert!(registry.any_requires_signing());
    }

    #[test]
    fn test_rust_triples_register() {
        let registry = TargetRegistry::new(rust_targets()).unwrap();
        assert_eq!(registry.len(), 6);

        let signed: Vec<&str> = registry
            .list_targets()
            .iter()
            .filter(|t| t.requires_signing)
            .map(|t| t.triple.as_str())
            .collect();
        assert_eq!(signed, vec!["x86_64-apple-darwin", "aarch64-apple-darwin"]);

        let names: Vec<String> = registry
            .list_targets()
            .iter()
            .map(|t| t.canonical_name("gt-installer"))
            .collect();
        assert!(names.contains(&"gt-installer-aarch64-pc-windows-msvc.exe".to_string()));
        assert!(names.contains(&"gt-installer-x86_64-unknown-linux-gnu".to_string()));
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let mut targets = sample_targets();
        targets.push(Target::new("linux-x86_64", "other"));
        let err = TargetRegistry::new(targets).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_registry_rejects_empty() {
        assert!(TargetRegistry::new(Vec::new()).is_err());
    }

    #[test]
    fn test_triple_validation() {
        assert!(is_valid_triple("x86_64-unknown-linux-gnu"));
        assert!(is_valid_triple("macos-arm64"));
        assert!(is_valid_triple("armv7-linux-androideabi"));
        assert!(!is_valid_triple("linux"));
        assert!(!is_valid_triple("linux x86_64"));
        assert!(!is_valid_triple("../etc-passwd"));
        assert!(!is_valid_triple("-linux"));
    }

    #[test]
    fn test_resolve_never_reroutes() {
        let pool = AgentPool::new(["linux".to_string(), "windows".to_string()]);
        let target = Target::new("macos-arm64", "mac");

        let err = pool.resolve(&target).unwrap_err();
        assert_eq!(err.code(), "AGENT_UNAVAILABLE");

        let target = Target::new("linux-x86_64", "linux");
        assert_eq!(pool.resolve(&target).unwrap(), "linux");
    }
}
