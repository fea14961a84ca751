//! Pipeline configuration.
//!
//! Loaded once from a TOML file at run start and immutable afterwards.
//! Relative paths resolve against the directory holding the file.

mod template;

pub use template::render_template;

use crate::core::Target;
use crate::errors::{ReleaseflowError, Result};
use crate::registry::{AgentPool, TargetRegistry};
use crate::utils::path_safe;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "releaseflow.toml";

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Name of the tool being released; prefix of every asset name.
    pub tool_name: String,
    /// Owner of the repository releases are published to.
    pub owner: String,
    /// Repository releases are published to.
    pub repo: String,
    /// Only runs on this branch publish a release.
    #[serde(default = "default_release_branch")]
    pub release_branch: String,
    /// Scratch directory for the stash, downloaded tools and run locks.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    /// Build targets, in release order.
    #[serde(default)]
    pub targets: Vec<Target>,
    /// Build agents.
    #[serde(default)]
    pub agents: AgentsConfig,
    /// Compiler invocation.
    #[serde(default)]
    pub build: BuildConfig,
    /// Code signer.
    #[serde(default)]
    pub signer: SignerConfig,
    /// Release tool.
    #[serde(default)]
    pub releaser: ReleaserConfig,
    /// Artifact store backend.
    #[serde(default)]
    pub store: StoreConfig,
    /// Directory relative paths resolve against.
    #[serde(skip)]
    pub root: PathBuf,
}

fn default_release_branch() -> String {
    "main".to_string()
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".releaseflow")
}

/// Which agents are online.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentsConfig {
    /// Labels of the available agents. When unset, every agent a target
    /// names is assumed to be this host.
    #[serde(default)]
    pub available: Option<Vec<String>>,
}

/// How the external compiler is invoked for one target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// The compiler executable.
    #[serde(default = "default_build_program")]
    pub program: String,
    /// Argument templates.
    #[serde(default = "default_build_args")]
    pub args: Vec<String>,
    /// Template for the path the compiler writes its binary to.
    #[serde(default = "default_build_output")]
    pub output: String,
    /// Bounded wait for one build.
    #[serde(default = "default_build_timeout")]
    pub timeout_secs: u64,
}

fn default_build_program() -> String {
    "cargo".to_string()
}

fn default_build_args() -> Vec<String> {
    ["build", "--release", "--bin", "{tool}", "--target", "{triple}"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_build_output() -> String {
    "target/{triple}/release/{tool}{exe}".to_string()
}

fn default_build_timeout() -> u64 {
    3600
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            program: default_build_program(),
            args: default_build_args(),
            output: default_build_output(),
            timeout_secs: default_build_timeout(),
        }
    }
}

/// Where a pinned external tool comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSource {
    /// Tool (and GitHub repository) name.
    pub name: String,
    /// File holding the pinned version.
    pub version_file: PathBuf,
    /// Pre-installed executable, bypassing the download.
    pub path: Option<PathBuf>,
    /// GitHub owner releases are downloaded from.
    pub download_owner: String,
}

/// The external code signer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    /// Tool name.
    #[serde(default = "default_signer_name")]
    pub name: String,
    /// File holding the pinned signer version.
    #[serde(default = "default_signer_version_file")]
    pub version_file: PathBuf,
    /// Pre-installed executable.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// GitHub owner to download from; defaults to `owner`.
    #[serde(default)]
    pub download_owner: Option<String>,
    /// Argument templates; `{artifact}` and `{platform}` are available.
    #[serde(default = "default_signer_args")]
    pub args: Vec<String>,
    /// Environment variable holding the signing certificate.
    #[serde(default = "default_certificate_env")]
    pub certificate_env: String,
    /// Environment variable holding the notarization service password.
    #[serde(default = "default_password_env")]
    pub password_env: String,
    /// Bounded wait for one signature.
    #[serde(default = "default_signer_timeout")]
    pub timeout_secs: u64,
}

fn default_signer_name() -> String {
    "feenk-signer".to_string()
}

fn default_signer_version_file() -> PathBuf {
    PathBuf::from("feenk-signer.version")
}

fn default_signer_args() -> Vec<String> {
    vec!["{platform}".to_string(), "{artifact}".to_string()]
}

fn default_certificate_env() -> String {
    "CERT".to_string()
}

fn default_password_env() -> String {
    "APPLEPASSWORD".to_string()
}

fn default_signer_timeout() -> u64 {
    1800
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            name: default_signer_name(),
            version_file: default_signer_version_file(),
            path: None,
            download_owner: None,
            args: default_signer_args(),
            certificate_env: default_certificate_env(),
            password_env: default_password_env(),
            timeout_secs: default_signer_timeout(),
        }
    }
}

/// The external release tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaserConfig {
    /// Tool name.
    #[serde(default = "default_releaser_name")]
    pub name: String,
    /// File holding the pinned release-tool version.
    #[serde(default = "default_releaser_version_file")]
    pub version_file: PathBuf,
    /// Pre-installed executable.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// GitHub owner to download from; defaults to `owner`.
    #[serde(default)]
    pub download_owner: Option<String>,
    /// Environment variable holding the release API token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Bounded wait for the release.
    #[serde(default = "default_releaser_timeout")]
    pub timeout_secs: u64,
}

fn default_releaser_name() -> String {
    "feenk-releaser".to_string()
}

fn default_releaser_version_file() -> PathBuf {
    PathBuf::from("feenk-releaser.version")
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

fn default_releaser_timeout() -> u64 {
    600
}

impl Default for ReleaserConfig {
    fn default() -> Self {
        Self {
            name: default_releaser_name(),
            version_file: default_releaser_version_file(),
            path: None,
            download_owner: None,
            token_env: default_token_env(),
            timeout_secs: default_releaser_timeout(),
        }
    }
}

/// Artifact store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Process-local map; artifacts stay where the build left them.
    Memory,
    /// Stash directory under `work_dir`.
    #[default]
    Filesystem,
}

/// Artifact store settings.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Which backend to use.
    #[serde(default)]
    pub kind: StoreKind,
}

impl PipelineConfig {
    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ReleaseflowError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        let root = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self::from_toml_str(&text, root)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the text does not parse or validate.
    pub fn from_toml_str(text: &str, root: impl Into<PathBuf>) -> Result<Self> {
        let mut config: Self = toml::from_str(text)?;
        config.root = root.into();
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for mistakes that would only surface
    /// halfway through a run.
    ///
    /// # Errors
    ///
    /// Returns `Config` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("tool_name", &self.tool_name),
            ("owner", &self.owner),
            ("repo", &self.repo),
            ("release_branch", &self.release_branch),
            ("build.program", &self.build.program),
        ] {
            if value.trim().is_empty() {
                return Err(ReleaseflowError::config(format!("'{field}' must not be empty")));
            }
        }

        if !self.build.output.contains("{triple}") {
            return Err(ReleaseflowError::config(
                "'build.output' must contain {triple} so targets do not overwrite each other",
            ));
        }

        for (field, secs) in [
            ("build.timeout_secs", self.build.timeout_secs),
            ("signer.timeout_secs", self.signer.timeout_secs),
            ("releaser.timeout_secs", self.releaser.timeout_secs),
        ] {
            if secs == 0 {
                return Err(ReleaseflowError::config(format!("'{field}' must be positive")));
            }
        }

        self.registry().map(|_| ())
    }

    /// Builds the target registry.
    ///
    /// # Errors
    ///
    /// Returns `Config` if targets are missing, malformed or duplicated.
    pub fn registry(&self) -> Result<TargetRegistry> {
        TargetRegistry::new(self.targets.clone())
    }

    /// Builds the agent pool.
    #[must_use]
    pub fn agent_pool(&self) -> AgentPool {
        match self.agents.available {
            Some(ref labels) => AgentPool::new(labels.iter().cloned()),
            None => AgentPool::new(self.targets.iter().map(|t| t.agent.clone())),
        }
    }

    /// Resolves `path` against the configuration root.
    #[must_use]
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// The resolved scratch directory.
    #[must_use]
    pub fn work_dir(&self) -> PathBuf {
        self.resolve(&self.work_dir)
    }

    /// Scratch space owned by one run. Runs never share it, whatever their
    /// branch.
    #[must_use]
    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.work_dir().join("runs").join(path_safe(run_id))
    }

    /// Where the filesystem store keeps the blobs of one run.
    #[must_use]
    pub fn stash_dir(&self, run_id: &str) -> PathBuf {
        self.run_dir(run_id).join("stash")
    }

    /// Where one run's binaries are renamed to their canonical names.
    #[must_use]
    pub fn dist_dir(&self, run_id: &str) -> PathBuf {
        self.run_dir(run_id).join("dist")
    }

    /// Where pinned tools are downloaded to.
    #[must_use]
    pub fn tools_dir(&self) -> PathBuf {
        self.work_dir().join("tools")
    }

    /// Where run locks live.
    #[must_use]
    pub fn locks_dir(&self) -> PathBuf {
        self.work_dir().join("locks")
    }

    /// The signer's source.
    #[must_use]
    pub fn signer_source(&self) -> ToolSource {
        ToolSource {
            name: self.signer.name.clone(),
            version_file: self.resolve(&self.signer.version_file),
            path: self.signer.path.as_ref().map(|p| self.resolve(p)),
            download_owner: self
                .signer
                .download_owner
                .clone()
                .unwrap_or_else(|| self.owner.clone()),
        }
    }

    /// The release tool's source.
    #[must_use]
    pub fn releaser_source(&self) -> ToolSource {
        ToolSource {
            name: self.releaser.name.clone(),
            version_file: self.resolve(&self.releaser.version_file),
            path: self.releaser.path.as_ref().map(|p| self.resolve(p)),
            download_owner: self
                .releaser
                .download_owner
                .clone()
                .unwrap_or_else(|| self.owner.clone()),
        }
    }

    /// Bounded wait for one build.
    #[must_use]
    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build.timeout_secs)
    }

    /// Bounded wait for one signature.
    #[must_use]
    pub fn signer_timeout(&self) -> Duration {
        Duration::from_secs(self.signer.timeout_secs)
    }

    /// Bounded wait for the release tool.
    #[must_use]
    pub fn releaser_timeout(&self) -> Duration {
        Duration::from_secs(self.releaser.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MINIMAL: &str = r#"
        tool_name = "gt-installer"
        owner = "feenkcom"
        repo = "gtoolkit-maker"

        [[targets]]
        triple = "x86_64-unknown-linux-gnu"
        agent = "linux"

        [[targets]]
        triple = "aarch64-apple-darwin"
        agent = "mac"
        requires_signing = true
    "#;

    #[test]
    fn test_minimal_config_defaults() {
        let config = PipelineConfig::from_toml_str(MINIMAL, "/repo").unwrap();

        assert_eq!(config.release_branch, "main");
        assert_eq!(config.build.program, "cargo");
        assert_eq!(config.build.output, "target/{triple}/release/{tool}{exe}");
        assert_eq!(config.signer.name, "feenk-signer");
        assert_eq!(config.releaser.token_env, "GITHUB_TOKEN");
        assert_eq!(config.store.kind, StoreKind::Filesystem);
        assert_eq!(config.work_dir(), PathBuf::from("/repo/.releaseflow"));
        assert_eq!(
            config.stash_dir("0192-run"),
            PathBuf::from("/repo/.releaseflow/runs/0192-run/stash")
        );
        assert_eq!(
            config.dist_dir("0192-run"),
            PathBuf::from("/repo/.releaseflow/runs/0192-run/dist")
        );
        assert_eq!(config.build_timeout(), Duration::from_secs(3600));
        assert!(config.targets[1].requires_signing);
    }

    #[test]
    fn test_tool_sources_resolve_against_root() {
        let config = PipelineConfig::from_toml_str(MINIMAL, "/repo").unwrap();
        let signer = config.signer_source();

        assert_eq!(signer.name, "feenk-signer");
        assert_eq!(signer.version_file, PathBuf::from("/repo/feenk-signer.version"));
        assert_eq!(signer.download_owner, "feenkcom");
        assert_eq!(signer.path, None);
    }

    #[test]
    fn test_agent_pool_defaults_to_named_agents() {
        let config = PipelineConfig::from_toml_str(MINIMAL, "/repo").unwrap();
        let pool = config.agent_pool();
        assert!(pool.is_available("linux"));
        assert!(pool.is_available("mac"));
        assert!(!pool.is_available("windows"));
    }

    #[test]
    fn test_empty_owner_rejected() {
        let text = MINIMAL.replace("owner = \"feenkcom\"", "owner = \"  \"");
        let err = PipelineConfig::from_toml_str(&text, "/repo").unwrap_err();
        assert!(err.to_string().contains("'owner'"));
    }

    #[test]
    fn test_output_must_be_per_triple() {
        let text = format!("{MINIMAL}\n[build]\noutput = \"target/release/tool\"\n");
        let err = PipelineConfig::from_toml_str(&text, "/repo").unwrap_err();
        assert_eq!(err.code(), "CONFIG");
    }

    #[test]
    fn test_duplicate_triples_rejected() {
        let text = format!(
            "{MINIMAL}\n[[targets]]\ntriple = \"x86_64-unknown-linux-gnu\"\nagent = \"other\"\n"
        );
        let err = PipelineConfig::from_toml_str(&text, "/repo").unwrap_err();
        assert!(err.to_string().contains("x86_64-unknown-linux-gnu"));
    }

    #[test]
    fn test_unparseable_config() {
        let err = PipelineConfig::from_toml_str("tool_name = ", "/repo").unwrap_err();
        assert_eq!(err.code(), "CONFIG");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, MINIMAL).unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.root, dir.path());
        assert_eq!(config.registry().unwrap().len(), 2);
    }
}
