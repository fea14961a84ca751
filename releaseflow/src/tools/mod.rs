//! Pinned external tools.
//!
//! The signer and the release tool are versioned independently of this
//! crate. Their versions are pinned in files read once at run start, and
//! each pinned version is fetched from its GitHub release the first time it
//! is needed.

mod download;
mod host;
mod pin;

pub use download::Downloader;
pub use host::{host_triple, triple_for};
pub use pin::{read_version_pin, PinnedTool};

use crate::config::PipelineConfig;
use crate::errors::Result;

/// The two pinned tools a run may invoke.
#[derive(Debug, Clone)]
pub struct PinnedTools {
    /// The code signer.
    pub signer: PinnedTool,
    /// The release tool.
    pub releaser: PinnedTool,
}

impl PinnedTools {
    /// Reads both version pins.
    ///
    /// # Errors
    ///
    /// `VersionPin` if either pin file is missing or malformed, `Config` if
    /// a download is needed but the host platform is unsupported.
    pub fn load(config: &PipelineConfig) -> Result<Self> {
        let tools_dir = config.tools_dir();
        Ok(Self {
            signer: PinnedTool::resolve(&config.signer_source(), &tools_dir)?,
            releaser: PinnedTool::resolve(&config.releaser_source(), &tools_dir)?,
        })
    }
}
