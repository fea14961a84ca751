//! A command line to run, with its secrets kept out of logs.

use crate::secrets::Secret;
use std::fmt;
use std::path::{Path, PathBuf};

/// A single command-line argument or environment value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// Safe to log.
    Plain(String),
    /// Passed to the process but masked everywhere else.
    Secret(Secret),
}

impl Arg {
    /// The value handed to the process.
    #[must_use]
    pub fn expose(&self) -> &str {
        match self {
            Self::Plain(value) => value,
            Self::Secret(secret) => secret.expose(),
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(value) if value.contains(char::is_whitespace) => write!(f, "'{value}'"),
            Self::Plain(value) => f.write_str(value),
            Self::Secret(secret) => write!(f, "{secret}"),
        }
    }
}

/// One invocation of an external tool.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Logical tool name used in logs, events and timeout errors.
    pub tool: String,
    /// The executable.
    pub program: PathBuf,
    /// Arguments, in order.
    pub args: Vec<Arg>,
    /// Extra environment for the process.
    pub env: Vec<(String, Arg)>,
    /// Working directory, if not inherited.
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    /// Creates an invocation with no arguments.
    #[must_use]
    pub fn new(tool: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            tool: tool.into(),
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
        }
    }

    /// Appends a plain argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(Arg::Plain(arg.into()));
        self
    }

    /// Appends plain arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|a| Arg::Plain(a.into())));
        self
    }

    /// Appends a secret argument.
    #[must_use]
    pub fn secret_arg(mut self, secret: Secret) -> Self {
        self.args.push(Arg::Secret(secret));
        self
    }

    /// Sets a secret environment variable.
    #[must_use]
    pub fn secret_env(mut self, key: impl Into<String>, secret: Secret) -> Self {
        self.env.push((key.into(), Arg::Secret(secret)));
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// The arguments as they appear in logs (secrets masked).
    #[must_use]
    pub fn display_args(&self) -> Vec<String> {
        self.args.iter().map(ToString::to_string).collect()
    }

    /// Returns true if any plain argument equals `needle`.
    #[must_use]
    pub fn has_arg(&self, needle: &str) -> bool {
        self.args
            .iter()
            .any(|a| matches!(a, Arg::Plain(value) if value == needle))
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_masks_secrets() {
        let invocation = Invocation::new("feenk-releaser", "/tools/feenk-releaser")
            .args(["--owner", "feenkcom"])
            .arg("--token")
            .secret_arg(Secret::new("ghp_secret"))
            .secret_env("APPLE_PASSWORD", Secret::new("hunter2"));

        let shown = invocation.to_string();
        assert_eq!(shown, "/tools/feenk-releaser --owner feenkcom --token ***");
        assert!(!format!("{invocation:?}").contains("ghp_secret"));
        assert!(!format!("{invocation:?}").contains("hunter2"));
        assert_eq!(invocation.args[3].expose(), "ghp_secret");
    }

    #[test]
    fn test_display_quotes_whitespace() {
        let invocation = Invocation::new("cargo", "cargo").arg("a b");
        assert_eq!(invocation.display_args(), vec!["'a b'".to_string()]);
        assert!(invocation.has_arg("a b"));
        assert!(!invocation.has_arg("a"));
    }
}
