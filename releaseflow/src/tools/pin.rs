use super::download::Downloader;
use super::host::host_triple;
use crate::config::ToolSource;
use crate::core::Os;
use crate::errors::{ReleaseflowError, Result};
use semver::Version;
use std::path::{Path, PathBuf};
use tracing::info;

/// Reads a version pin: one semantic version, optionally prefixed with `v`.
///
/// # Errors
///
/// `VersionPin` if the file is missing, empty or not a version.
pub fn read_version_pin(path: &Path) -> Result<Version> {
    let pin_error = |message: String| ReleaseflowError::VersionPin {
        path: path.to_path_buf(),
        message,
    };

    let text = std::fs::read_to_string(path).map_err(|e| pin_error(e.to_string()))?;
    let raw = text.trim();
    if raw.is_empty() {
        return Err(pin_error("file is empty".to_string()));
    }
    let raw = raw.strip_prefix('v').unwrap_or(raw);
    Version::parse(raw).map_err(|e| pin_error(format!("'{raw}' is not a version: {e}")))
}

/// A pinned tool resolved to the executable that will be invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinnedTool {
    /// Tool name.
    pub name: String,
    /// Pinned version.
    pub version: Version,
    /// The executable.
    pub executable: PathBuf,
    /// Where to fetch the executable from, unless it is pre-installed.
    pub download_url: Option<String>,
}

impl PinnedTool {
    /// Reads the pin and works out where the executable lives.
    ///
    /// # Errors
    ///
    /// `VersionPin` if the pin cannot be read, `Config` if a download is
    /// needed and the host platform is unsupported.
    pub fn resolve(source: &ToolSource, tools_dir: &Path) -> Result<Self> {
        let version = read_version_pin(&source.version_file)?;

        if let Some(ref path) = source.path {
            return Ok(Self {
                name: source.name.clone(),
                version,
                executable: path.clone(),
                download_url: None,
            });
        }

        let host = host_triple()?;
        let exe = Os::from_triple(host).exe_suffix();
        Ok(Self {
            executable: tools_dir.join(format!("{}-v{version}{exe}", source.name)),
            download_url: Some(format!(
                "https://github.com/{owner}/{name}/releases/download/v{version}/{name}-{host}{exe}",
                owner = source.download_owner,
                name = source.name,
            )),
            name: source.name.clone(),
            version,
        })
    }

    /// Returns the executable, downloading it first if needed.
    ///
    /// # Errors
    ///
    /// `Config` if a pre-installed executable does not exist, `Download` if
    /// fetching fails.
    pub async fn ensure_installed(&self, downloader: &Downloader) -> Result<PathBuf> {
        if tokio::fs::try_exists(&self.executable).await? {
            return Ok(self.executable.clone());
        }

        let Some(ref url) = self.download_url else {
            return Err(ReleaseflowError::config(format!(
                "{} executable {} does not exist",
                self.name,
                self.executable.display()
            )));
        };

        info!(tool = %self.name, version = %self.version, %url, "Downloading pinned tool");
        downloader.download(url, &self.executable).await?;
        Ok(self.executable.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn source(dir: &Path, path: Option<PathBuf>) -> ToolSource {
        ToolSource {
            name: "feenk-releaser".to_string(),
            version_file: dir.join("feenk-releaser.version"),
            path,
            download_owner: "feenkcom".to_string(),
        }
    }

    #[test]
    fn test_read_version_pin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pin");

        std::fs::write(&path, "v0.4.2\n").unwrap();
        assert_eq!(read_version_pin(&path).unwrap(), Version::new(0, 4, 2));

        std::fs::write(&path, "  1.0.0  ").unwrap();
        assert_eq!(read_version_pin(&path).unwrap(), Version::new(1, 0, 0));
    }

    #[test]
    fn test_read_version_pin_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pin");

        let err = read_version_pin(&path).unwrap_err();
        assert_eq!(err.code(), "VERSION_PIN");

        std::fs::write(&path, "\n").unwrap();
        assert!(read_version_pin(&path).unwrap_err().to_string().contains("empty"));

        std::fs::write(&path, "latest").unwrap();
        assert!(read_version_pin(&path).unwrap_err().to_string().contains("'latest'"));
    }

    #[test]
    fn test_resolve_with_override_skips_download() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("feenk-releaser.version"), "0.3.1").unwrap();
        let exe = dir.path().join("bin/feenk-releaser");

        let tool = PinnedTool::resolve(&source(dir.path(), Some(exe.clone())), dir.path()).unwrap();
        assert_eq!(tool.executable, exe);
        assert_eq!(tool.download_url, None);
    }

    #[test]
    fn test_resolve_download_location() {
        let Ok(host) = host_triple() else {
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("feenk-releaser.version"), "0.3.1").unwrap();

        let tool = PinnedTool::resolve(&source(dir.path(), None), &dir.path().join("tools")).unwrap();
        let exe = Os::from_triple(host).exe_suffix();

        assert_eq!(
            tool.executable,
            dir.path().join(format!("tools/feenk-releaser-v0.3.1{exe}"))
        );
        assert_eq!(
            tool.download_url.unwrap(),
            format!(
                "https://github.com/feenkcom/feenk-releaser/releases/download/v0.3.1/feenk-releaser-{host}{exe}"
            )
        );
    }

    #[tokio::test]
    async fn test_ensure_installed_uses_existing_executable() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("feenk-releaser");
        std::fs::write(&exe, "#!/bin/sh\n").unwrap();

        let tool = PinnedTool {
            name: "feenk-releaser".to_string(),
            version: Version::new(0, 3, 1),
            executable: exe.clone(),
            download_url: Some("http://127.0.0.1:9/unreachable".to_string()),
        };
        let downloader = Downloader::new().unwrap();
        assert_eq!(tool.ensure_installed(&downloader).await.unwrap(), exe);
    }

    #[tokio::test]
    async fn test_ensure_installed_missing_override() {
        let dir = tempfile::tempdir().unwrap();
        let tool = PinnedTool {
            name: "feenk-signer".to_string(),
            version: Version::new(1, 0, 0),
            executable: dir.path().join("missing"),
            download_url: None,
        };
        let downloader = Downloader::new().unwrap();
        let err = tool.ensure_installed(&downloader).await.unwrap_err();
        assert_eq!(err.code(), "CONFIG");
    }
}
