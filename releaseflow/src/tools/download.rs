use crate::errors::{ReleaseflowError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

const USER_AGENT: &str = concat!("releaseflow/", env!("CARGO_PKG_VERSION"));

/// Fetches pinned tool executables over HTTPS.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: reqwest::Client,
}

impl Downloader {
    /// Creates a downloader with a five minute request timeout.
    ///
    /// # Errors
    ///
    /// `Internal` if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| ReleaseflowError::Internal(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Downloads `url` to `dest` and marks it executable.
    ///
    /// The file appears at `dest` only once it is complete.
    ///
    /// # Errors
    ///
    /// `Download` if the request fails or returns a non-success status,
    /// `Io` if the file cannot be written.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let download_error = |message: String| ReleaseflowError::Download {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| download_error(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(download_error(format!("HTTP {status}")));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| download_error(e.to_string()))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut partial = dest.as_os_str().to_owned();
        partial.push(".partial");
        let partial = PathBuf::from(partial);
        tokio::fs::write(&partial, &bytes).await?;
        mark_executable(&partial).await?;
        tokio::fs::rename(&partial, dest).await?;
        Ok(())
    }
}

#[cfg(unix)]
async fn mark_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn mark_executable(_path: &Path) -> Result<()> {
    Ok(())
}
