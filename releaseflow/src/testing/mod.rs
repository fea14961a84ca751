//! Testing utilities for release pipelines.
//!
//! This module provides:
//! - A scripted command runner standing in for compilers, signers and
//!   release tools
//! - Fixture targets and configurations

pub mod fixtures;
mod runner;

pub use runner::{Response, ScriptedRunner};
