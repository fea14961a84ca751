//! Core domain model types for releaseflow.
//!
//! This module contains the fundamental types used throughout the pipeline:
//! - Targets and the OS detection behind canonical asset names
//! - Artifacts handed between stages
//! - Run and stage status
//! - Bump levels and release requests

mod artifact;
mod release;
mod status;
mod target;

pub use artifact::Artifact;
pub use release::{BumpLevel, ReleaseRequest};
pub use status::{RunResult, RunStatus, StageRecord, StageStatus};
pub use target::{Os, Target};
