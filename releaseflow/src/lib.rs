//! # Releaseflow
//!
//! Cross-platform release orchestration for a single native tool.
//!
//! A run takes one source revision through a fixed pipeline:
//!
//! - **Build**: every registered target is compiled concurrently on its agent
//! - **Barrier**: the first build failure cancels the remaining builds
//! - **Sign**: artifacts for targets that require it go through the pinned signer
//! - **Gate**: only a healthy run on the release branch may publish
//! - **Publish**: the pinned release tool bumps the version and uploads every asset
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use releaseflow::prelude::*;
//!
//! let config = PipelineConfig::load("releaseflow.toml")?;
//! let pipeline = ReleasePipeline::new(config)?;
//!
//! let report = pipeline.run(&RunRequest::new("main", BumpLevel::Minor)).await?;
//! println!("{}", report.summary());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod pipeline;
pub mod process;
pub mod registry;
pub mod secrets;
pub mod stages;
pub mod store;
pub mod testing;
pub mod tools;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::{CancellationToken, StructuredTaskGroup};
    pub use crate::config::PipelineConfig;
    pub use crate::core::{
        Artifact, BumpLevel, Os, ReleaseRequest, RunResult, RunStatus, StageRecord,
        StageStatus, Target,
    };
    pub use crate::errors::{ReleaseflowError, Result};
    pub use crate::events::{
        CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, RunEvents,
    };
    pub use crate::pipeline::{ReleasePipeline, RunReport, RunRequest};
    pub use crate::process::{CommandRunner, Invocation, ProcessOutcome, SystemCommandRunner};
    pub use crate::registry::{AgentPool, TargetRegistry};
    pub use crate::secrets::{EnvSecretSource, Secret, SecretSource, StaticSecretSource};
    pub use crate::stages::should_release;
    pub use crate::store::{ArtifactStore, FilesystemArtifactStore, InMemoryArtifactStore};
    pub use crate::tools::{PinnedTool, PinnedTools};
    pub use crate::utils::{generate_run_id, iso_timestamp};
}
