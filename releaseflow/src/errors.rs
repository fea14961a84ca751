//! Error types for the release pipeline.
//!
//! Every variant is fatal to the run that raised it. There is no local
//! recovery or retry anywhere in the pipeline: a clean abort is preferred
//! over a release that is missing a platform or ships an unsigned binary.

use crate::process::ProcessOutcome;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = ReleaseflowError> = std::result::Result<T, E>;

/// The main error type for releaseflow operations.
#[derive(Debug, Error)]
pub enum ReleaseflowError {
    /// The agent a target is bound to is not available.
    #[error("Agent '{agent}' required by target '{triple}' is not available")]
    AgentUnavailable {
        /// The agent label named by the registry.
        agent: String,
        /// The target that needed it.
        triple: String,
    },

    /// The external compiler exited unsuccessfully.
    #[error("Build failed for '{triple}': {outcome}")]
    BuildFailed {
        /// The target being built.
        triple: String,
        /// What the compiler reported.
        outcome: ProcessOutcome,
    },

    /// The compiler reported success but its output file does not exist.
    #[error("Build for '{triple}' produced no output at {}", path.display())]
    MissingOutput {
        /// The target being built.
        triple: String,
        /// Where the output was expected.
        path: PathBuf,
    },

    /// A key was published twice into the artifact store.
    #[error("Artifact '{key}' was already published in this run")]
    DuplicateKey {
        /// The duplicated key.
        key: String,
    },

    /// A key was fetched that was never published.
    #[error("Artifact '{key}' was not found in the store")]
    NotFound {
        /// The missing key.
        key: String,
    },

    /// The store does not hold a releasable artifact for every target.
    #[error("Release set is incomplete; missing or unsigned: {}", missing.join(", "))]
    IncompleteReleaseSet {
        /// Triples without a releasable artifact.
        missing: Vec<String>,
    },

    /// The external signer exited unsuccessfully.
    #[error("Signing failed for '{triple}': {outcome}")]
    SigningFailed {
        /// The target whose artifact was being signed.
        triple: String,
        /// What the signer reported.
        outcome: ProcessOutcome,
    },

    /// The external release tool exited unsuccessfully.
    #[error("Publishing the release failed: {outcome}")]
    PublishFailed {
        /// What the release tool reported.
        outcome: ProcessOutcome,
    },

    /// An external tool did not finish within its bounded wait.
    #[error("'{tool}' did not finish within {seconds}s")]
    Timeout {
        /// The tool that was running.
        tool: String,
        /// The configured limit.
        seconds: u64,
    },

    /// The stage was stopped because the run was already doomed.
    #[error("Cancelled: {reason}")]
    Cancelled {
        /// The first cancellation reason recorded on the run.
        reason: String,
    },

    /// Another run for the same branch holds the run lock.
    #[error("A release run for branch '{branch}' is already in progress ({})", lock.display())]
    RunInProgress {
        /// The branch being released.
        branch: String,
        /// The lock file held by the other run.
        lock: PathBuf,
    },

    /// A version pin file is missing or malformed.
    #[error("Version pin {}: {message}", path.display())]
    VersionPin {
        /// The pin file.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// A secret was requested but is not set.
    #[error("Secret '{name}' is not set")]
    MissingSecret {
        /// Name of the secret (never its value).
        name: String,
    },

    /// The pipeline configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A pinned tool could not be downloaded.
    #[error("Failed to download {url}: {message}")]
    Download {
        /// The URL that was requested.
        url: String,
        /// What went wrong.
        message: String,
    },

    /// A task panicked or could not be joined.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReleaseflowError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Returns a stable machine-readable code for the error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::AgentUnavailable { .. } => "AGENT_UNAVAILABLE",
            Self::BuildFailed { .. } => "BUILD_FAILED",
            Self::MissingOutput { .. } => "MISSING_OUTPUT",
            Self::DuplicateKey { .. } => "DUPLICATE_KEY",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::IncompleteReleaseSet { .. } => "INCOMPLETE_RELEASE_SET",
            Self::SigningFailed { .. } => "SIGNING_FAILED",
            Self::PublishFailed { .. } => "PUBLISH_FAILED",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Cancelled { .. } => "CANCELLED",
            Self::RunInProgress { .. } => "RUN_IN_PROGRESS",
            Self::VersionPin { .. } => "VERSION_PIN",
            Self::MissingSecret { .. } => "MISSING_SECRET",
            Self::Config(_) => "CONFIG",
            Self::Download { .. } => "DOWNLOAD",
            Self::Internal(_) => "INTERNAL",
            Self::Serialization(_) => "SERIALIZATION",
            Self::Io(_) => "IO",
        }
    }

    /// Returns true if this error only reports that the stage was cancelled
    /// because of a failure elsewhere in the run.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.code()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));

        match self {
            Self::AgentUnavailable { agent, triple } => {
                map.insert("agent".to_string(), serde_json::json!(agent));
                map.insert("triple".to_string(), serde_json::json!(triple));
            }
            Self::BuildFailed { triple, outcome } | Self::SigningFailed { triple, outcome } => {
                map.insert("triple".to_string(), serde_json::json!(triple));
                map.insert("exit_code".to_string(), serde_json::json!(outcome.exit_code));
            }
            Self::PublishFailed { outcome } => {
                map.insert("exit_code".to_string(), serde_json::json!(outcome.exit_code));
            }
            Self::MissingOutput { triple, path } => {
                map.insert("triple".to_string(), serde_json::json!(triple));
                map.insert("path".to_string(), serde_json::json!(path.display().to_string()));
            }
            Self::DuplicateKey { key } | Self::NotFound { key } => {
                map.insert("key".to_string(), serde_json::json!(key));
            }
            Self::IncompleteReleaseSet { missing } => {
                map.insert("missing".to_string(), serde_json::json!(missing));
            }
            Self::Timeout { tool, seconds } => {
                map.insert("tool".to_string(), serde_json::json!(tool));
                map.insert("timeout_seconds".to_string(), serde_json::json!(seconds));
            }
            _ => {}
        }

        map
    }
}

impl From<serde_json::Error> for ReleaseflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for ReleaseflowError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}
