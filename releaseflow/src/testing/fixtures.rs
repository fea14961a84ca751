//! Fixture targets and configurations.

use super::ScriptedRunner;
use crate::cancellation::CancellationToken;
use crate::config::PipelineConfig;
use crate::core::Target;
use crate::events::{CollectingEventSink, RunEvents};
use crate::secrets::StaticSecretSource;
use crate::stages::StageContext;
use crate::store::InMemoryArtifactStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Three short-triple targets; only macOS requires signing.
#[must_use]
pub fn sample_targets() -> Vec<Target> {
    vec![
        Target::new("linux-x86_64", "linux"),
        Target::new("macos-arm64", "mac").with_signing(),
        Target::new("windows-x86_64", "windows"),
    ]
}

/// The Rust triples an installer is usually shipped for.
#[must_use]
pub fn rust_targets() -> Vec<Target> {
    vec![
        Target::new("x86_64-unknown-linux-gnu", "linux"),
        Target::new("aarch64-unknown-linux-gnu", "linux-arm64"),
        Target::new("x86_64-apple-darwin", "mac").with_signing(),
        Target::new("aarch64-apple-darwin", "mac").with_signing(),
        Target::new("x86_64-pc-windows-msvc", "windows"),
        Target::new("aarch64-pc-windows-msvc", "windows-arm64"),
    ]
}

/// A configuration over [`sample_targets`] rooted at `root`, with
/// pre-installed signer and release tools so nothing is downloaded.
///
/// # Panics
///
/// Panics if the fixture text no longer validates.
#[must_use]
pub fn sample_config(root: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::from_toml_str(SAMPLE_CONFIG, root)
        .unwrap_or_else(|e| panic!("sample config is valid: {e}"));
    config.targets = sample_targets();
    config
}

/// The configuration text behind [`sample_config`].
pub const SAMPLE_CONFIG: &str = r#"
tool_name = "gt-installer"
owner = "feenkcom"
repo = "gtoolkit-maker"
release_branch = "main"

[[targets]]
triple = "linux-x86_64"
agent = "linux"

[build]
program = "cargo"
output = "target/{triple}/release/{tool}{exe}"
timeout_secs = 5

[signer]
path = "bin/feenk-signer"
timeout_secs = 5

[releaser]
path = "bin/feenk-releaser"
timeout_secs = 5
"#;

/// Run id of every fixture stage context.
pub const FIXTURE_RUN_ID: &str = "test-run";

/// A stage context over `config` with an in-memory store and no secrets.
///
/// # Panics
///
/// Panics if the configuration's targets do not form a valid registry.
#[must_use]
pub fn stage_context(
    config: PipelineConfig,
    runner: Arc<ScriptedRunner>,
) -> (StageContext, Arc<CollectingEventSink>) {
    stage_context_with(config, runner, StaticSecretSource::new())
}

/// A stage context over `config` with an in-memory store and the given
/// secrets.
///
/// # Panics
///
/// Panics if the configuration's targets do not form a valid registry.
#[must_use]
pub fn stage_context_with(
    config: PipelineConfig,
    runner: Arc<ScriptedRunner>,
    secrets: StaticSecretSource,
) -> (StageContext, Arc<CollectingEventSink>) {
    let sink = Arc::new(CollectingEventSink::new());
    let registry = config
        .registry()
        .unwrap_or_else(|e| panic!("fixture registry is valid: {e}"));
    let ctx = StageContext {
        dist_dir: config.dist_dir(FIXTURE_RUN_ID),
        agents: Arc::new(config.agent_pool()),
        registry: Arc::new(registry),
        config: Arc::new(config),
        store: Arc::new(InMemoryArtifactStore::new()),
        runner,
        secrets: Arc::new(secrets),
        events: RunEvents::new(sink.clone(), FIXTURE_RUN_ID, "main"),
        cancel: Arc::new(CancellationToken::new()),
    };
    (ctx, sink)
}

/// Writes a stand-in binary called `name` into the context's dist
/// directory and returns its path.
///
/// # Panics
///
/// Panics if the file cannot be written.
#[must_use]
pub fn dist_file(ctx: &StageContext, name: &str) -> PathBuf {
    std::fs::create_dir_all(&ctx.dist_dir)
        .unwrap_or_else(|e| panic!("cannot create {}: {e}", ctx.dist_dir.display()));
    let path = ctx.dist_dir.join(name);
    std::fs::write(&path, format!("{name}\n"))
        .unwrap_or_else(|e| panic!("cannot write {}: {e}", path.display()));
    path
}
