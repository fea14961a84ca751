use super::StageContext;
use crate::core::{Artifact, BumpLevel, ReleaseRequest};
use crate::errors::{ReleaseflowError, Result};
use crate::process::{run_bounded, Invocation};
use crate::registry::TargetRegistry;
use crate::store::ArtifactStore;
use std::path::PathBuf;
use tracing::{info, warn};

/// Whether the release tool is actually invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishMode {
    /// Invoke the release tool at this path.
    Live(PathBuf),
    /// Build the request, report it and stop.
    DryRun,
}

/// Collects one releasable artifact per registered target, in registry
/// order.
///
/// # Errors
///
/// `IncompleteReleaseSet` naming every target whose artifact is missing or
/// still unsigned; any other store error as is.
pub async fn collect_release_set(
    registry: &TargetRegistry,
    store: &dyn ArtifactStore,
) -> Result<Vec<Artifact>> {
    let mut assets = Vec::with_capacity(registry.len());
    let mut missing = Vec::new();

    for target in registry.list_targets() {
        match store.fetch(&target.triple).await {
            Ok(artifact) if artifact.is_releasable() => assets.push(artifact),
            Ok(_) | Err(ReleaseflowError::NotFound { .. }) => missing.push(target.triple.clone()),
            Err(e) => return Err(e),
        }
    }

    if missing.is_empty() {
        Ok(assets)
    } else {
        Err(ReleaseflowError::IncompleteReleaseSet { missing })
    }
}

/// The release tool's command line for `request`.
#[must_use]
pub fn release_invocation(tool: &str, program: PathBuf, request: &ReleaseRequest) -> Invocation {
    Invocation::new(tool, program)
        .args(["--owner", request.owner.as_str(), "--repo", request.repo.as_str(), "--token"])
        .secret_arg(request.auth_token.clone())
        .args(["--bump", request.bump.as_str(), "--auto-accept", "--assets"])
        .args(request.asset_paths().iter().map(|p| p.display().to_string()))
}

/// Builds the release request and invokes the release tool exactly once.
///
/// # Errors
///
/// `IncompleteReleaseSet` if any target lacks a releasable artifact,
/// `MissingSecret` if the release token is unset, `PublishFailed` on a
/// non-zero exit, and `Timeout` or `Cancelled` from the bounded wait.
pub async fn publish_release(
    ctx: &StageContext,
    bump: BumpLevel,
    mode: &PublishMode,
) -> Result<ReleaseRequest> {
    let config = &ctx.config;
    let assets = collect_release_set(&ctx.registry, ctx.store.as_ref()).await?;
    let request = ReleaseRequest {
        owner: config.owner.clone(),
        repo: config.repo.clone(),
        bump,
        assets,
        auth_token: ctx.secrets.secret(&config.releaser.token_env)?,
    };

    let program = match mode {
        PublishMode::Live(program) => program.clone(),
        PublishMode::DryRun => {
            warn!(
                owner = %request.owner,
                repo = %request.repo,
                bump = %request.bump,
                assets = ?request.asset_names(),
                "Dry run: release tool not invoked"
            );
            return Ok(request);
        }
    };

    let invocation = release_invocation(&config.releaser.name, program, &request);
    let outcome = run_bounded(
        ctx.runner.as_ref(),
        &invocation,
        &ctx.cancel,
        config.releaser_timeout(),
    )
    .await?;
    if !outcome.success {
        return Err(ReleaseflowError::PublishFailed { outcome });
    }

    info!(
        owner = %request.owner,
        repo = %request.repo,
        bump = %request.bump,
        assets = request.assets.len(),
        "Release published"
    );
    Ok(request)
}
