//! Structured cancellation for parallel stages.
//!
//! This module provides:
//! - CancellationToken for cooperative cancellation
//! - StructuredTaskGroup for running sibling stages behind one barrier

mod task_group;
mod token;

pub use task_group::{first_failure, StructuredTaskGroup, TaskOutcome};
pub use token::CancellationToken;
