//! Build targets and their canonical artifact names.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating system family a target triple denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Os {
    /// Microsoft Windows.
    Windows,
    /// Apple macOS.
    MacOs,
    /// Linux.
    Linux,
    /// Android.
    Android,
    /// Anything the triple does not name explicitly.
    Unknown,
}

impl Os {
    /// Detects the OS from the dash-separated components of a triple.
    ///
    /// Both Rust-style triples (`x86_64-pc-windows-msvc`) and short
    /// os-arch triples (`windows-x86_64`) are recognised.
    #[must_use]
    pub fn from_triple(triple: &str) -> Self {
        let components: Vec<String> = triple.split('-').map(str::to_ascii_lowercase).collect();
        let has = |names: &[&str]| components.iter().any(|c| names.contains(&c.as_str()));

        if has(&["windows", "win32", "win64"]) {
            Self::Windows
        } else if has(&["android", "androideabi"]) {
            Self::Android
        } else if has(&["darwin", "macos", "apple", "osx"]) {
            Self::MacOs
        } else if has(&["linux"]) {
            Self::Linux
        } else {
            Self::Unknown
        }
    }

    /// The executable suffix on this OS.
    #[must_use]
    pub fn exe_suffix(self) -> &'static str {
        match self {
            Self::Windows => ".exe",
            _ => "",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Windows => write!(f, "windows"),
            Self::MacOs => write!(f, "macos"),
            Self::Linux => write!(f, "linux"),
            Self::Android => write!(f, "android"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A platform to build for, bound to the agent that builds it.
///
/// The triple is unique within a pipeline run and the target is immutable
/// once the registry is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// The os-arch-abi triple.
    pub triple: String,
    /// Label of the build agent (queue) this target runs on.
    #[serde(alias = "agent_label")]
    pub agent: String,
    /// Whether artifacts for this target must be signed before release.
    #[serde(default)]
    pub requires_signing: bool,
}

impl Target {
    /// Creates a target that does not require signing.
    #[must_use]
    pub fn new(triple: impl Into<String>, agent: impl Into<String>) -> Self {
        Self {
            triple: triple.into(),
            agent: agent.into(),
            requires_signing: false,
        }
    }

    /// Marks the target as requiring signing.
    #[must_use]
    pub fn with_signing(mut self) -> Self {
        self.requires_signing = true;
        self
    }

    /// The OS this target builds for.
    #[must_use]
    pub fn os(&self) -> Os {
        Os::from_triple(&self.triple)
    }

    /// The published asset name: `<tool>-<triple>[.exe]`.
    ///
    /// Installer scripts download by this exact name.
    #[must_use]
    pub fn canonical_name(&self, tool_name: &str) -> String {
        format!("{}-{}{}", tool_name, self.triple, self.os().exe_suffix())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.triple, self.agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_detection() {
        assert_eq!(Os::from_triple("x86_64-pc-windows-msvc"), Os::Windows);
        assert_eq!(Os::from_triple("windows-x86_64"), Os::Windows);
        assert_eq!(Os::from_triple("aarch64-apple-darwin"), Os::MacOs);
        assert_eq!(Os::from_triple("macos-arm64"), Os::MacOs);
        assert_eq!(Os::from_triple("x86_64-unknown-linux-gnu"), Os::Linux);
        assert_eq!(Os::from_triple("aarch64-linux-android"), Os::Android);
        assert_eq!(Os::from_triple("wasm32-unknown-unknown"), Os::Unknown);
    }

    #[test]
    fn test_os_detection_does_not_match_substrings() {
        // "darwinian" is not a component named darwin
        assert_eq!(Os::from_triple("x86_64-darwinian-gnu"), Os::Unknown);
    }

    #[test]
    fn test_canonical_name() {
        let linux = Target::new("linux-x86_64", "linux");
        let windows = Target::new("windows-x86_64", "windows");
        let mac = Target::new("aarch64-apple-darwin", "mac").with_signing();

        assert_eq!(linux.canonical_name("gt-installer"), "gt-installer-linux-x86_64");
        assert_eq!(windows.canonical_name("gt-installer"), "gt-installer-windows-x86_64.exe");
        assert_eq!(mac.canonical_name("gt-installer"), "gt-installer-aarch64-apple-darwin");
        assert!(mac.requires_signing);
    }

    #[test]
    fn test_target_deserialize_with_agent_label_alias() {
        let target: Target =
            serde_json::from_str(r#"{"triple": "linux-x86_64", "agent_label": "docker"}"#).unwrap();
        assert_eq!(target.agent, "docker");
        assert!(!target.requires_signing);
    }
}
