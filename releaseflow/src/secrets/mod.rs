//! Opaque credentials.
//!
//! Secret values never appear in logs, events or error messages: `Secret`
//! redacts itself in both `Debug` and `Display`, and sources report only the
//! *name* of a secret that could not be found.

use crate::errors::{ReleaseflowError, Result};
use std::collections::HashMap;
use std::fmt;

const REDACTED: &str = "***";

/// An opaque secret value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wraps a secret value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw value. Only call this at the point where the value is
    /// handed to an external process.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

/// A place secrets are looked up by name.
pub trait SecretSource: Send + Sync + fmt::Debug {
    /// Returns the secret called `name`.
    ///
    /// # Errors
    ///
    /// Returns `MissingSecret` if it is not set or is empty.
    fn secret(&self, name: &str) -> Result<Secret>;
}

/// Reads secrets from environment variables at the moment they are needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecretSource;

impl SecretSource for EnvSecretSource {
    fn secret(&self, name: &str) -> Result<Secret> {
        match std::env::var(name) {
            Ok(value) if !value.is_empty() => Ok(Secret::new(value)),
            _ => Err(ReleaseflowError::MissingSecret {
                name: name.to_string(),
            }),
        }
    }
}

/// A fixed set of secrets, for tests and embedding.
#[derive(Default)]
pub struct StaticSecretSource {
    values: HashMap<String, Secret>,
}

impl StaticSecretSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a secret.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), Secret::new(value));
        self
    }
}

impl fmt::Debug for StaticSecretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.values.keys().collect();
        names.sort();
        f.debug_struct("StaticSecretSource")
            .field("names", &names)
            .finish()
    }
}

impl SecretSource for StaticSecretSource {
    fn secret(&self, name: &str) -> Result<Secret> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| ReleaseflowError::MissingSecret {
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_redacted() {
        let secret = Secret::new("ghp_supersecret");
        assert_eq!(format!("{secret:?}"), "***");
        assert_eq!(secret.to_string(), "***");
        assert_eq!(secret.expose(), "ghp_supersecret");
    }

    #[test]
    fn test_static_source_lookup() {
        let source = StaticSecretSource::new().with("GITHUB_TOKEN", "s3cr3t");
        assert_eq!(source.secret("GITHUB_TOKEN").unwrap().expose(), "s3cr3t");

        let err = source.secret("APPLE_PASSWORD").unwrap_err();
        assert_eq!(err.code(), "MISSING_SECRET");
        assert!(!format!("{source:?}").contains("s3cr3t"));
    }

    #[test]
    fn test_env_source_missing_variable() {
        let err = EnvSecretSource
            .secret("RELEASEFLOW_TEST_SURELY_UNSET_VARIABLE")
            .unwrap_err();
        assert!(err.to_string().contains("RELEASEFLOW_TEST_SURELY_UNSET_VARIABLE"));
    }
}
