//! Release run orchestration.
//!
//! This module provides:
//! - The release pipeline: parallel builds joined by one barrier, then
//!   signing, the release gate and the publisher
//! - The per-branch run lock
//! - Run reports

mod lock;
mod orchestrator;
mod report;


pub use lock::RunLock;
pub use orchestrator::{ReleasePipeline, RunRequest};
pub use report::RunReport;
