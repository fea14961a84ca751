use super::StageContext;
use crate::config::render_template;
use crate::core::{Artifact, Target};
use crate::errors::{ReleaseflowError, Result};
use crate::process::{run_bounded, Invocation};
use tracing::info;

/// Builds one target and publishes the result into the store.
///
/// The compiler runs in the configuration root. Its output is copied into
/// the run's dist directory under the canonical asset name before
/// publishing.
///
/// # Errors
///
/// `AgentUnavailable` if the target's agent is offline, `BuildFailed` on a
/// non-zero exit, `MissingOutput` if the compiler claimed success without
/// writing its output, `Timeout` or `Cancelled` from the bounded wait, and
/// `DuplicateKey` if the target was already published this run.
pub async fn build_target(ctx: &StageContext, target: &Target) -> Result<Artifact> {
    let agent = ctx.agents.resolve(target)?;
    let config = &ctx.config;
    let vars = [
        ("tool", config.tool_name.as_str()),
        ("triple", target.triple.as_str()),
        ("exe", target.os().exe_suffix()),
    ];

    let invocation = Invocation::new(&config.build.program, &config.build.program)
        .args(config.build.args.iter().map(|a| render_template(a, &vars)))
        .current_dir(&config.root);

    info!(triple = %target.triple, agent, "Building target");
    let outcome = run_bounded(
        ctx.runner.as_ref(),
        &invocation,
        &ctx.cancel,
        config.build_timeout(),
    )
    .await?;
    if !outcome.success {
        return Err(ReleaseflowError::BuildFailed {
            triple: target.triple.clone(),
            outcome,
        });
    }

    let output = config.resolve(render_template(&config.build.output, &vars));
    if !tokio::fs::try_exists(&output).await? {
        return Err(ReleaseflowError::MissingOutput {
            triple: target.triple.clone(),
            path: output,
        });
    }

    tokio::fs::create_dir_all(&ctx.dist_dir).await?;
    let canonical = ctx.dist_dir.join(target.canonical_name(&config.tool_name));
    tokio::fs::copy(&output, &canonical).await?;

    let artifact = Artifact::new(&config.tool_name, target.clone(), canonical);
    let stored = ctx.store.publish(&target.triple, artifact).await?;
    info!(triple = %target.triple, path = %stored.path.display(), "Published artifact");
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::AgentPool;
    use crate::testing::fixtures::{sample_config, stage_context};
    use crate::testing::{Response, ScriptedRunner};
    use std::sync::Arc;

    fn output_path(root: &std::path::Path, triple: &str, exe: &str) -> std::path::PathBuf {
        root.join(format!("target/{triple}/release/gt-installer{exe}"))
    }

    #[tokio::test]
    async fn test_build_publishes_canonical_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new().respond_to(
            "cargo",
            Response::WriteFile(output_path(dir.path(), "windows-x86_64", ".exe")),
        ));
        let (ctx, _) = stage_context(sample_config(dir.path()), runner.clone());
        let target = ctx.registry.get("windows-x86_64").unwrap().clone();

        let artifact = build_target(&ctx, &target).await.unwrap();

        assert_eq!(
            artifact.path,
            dir.path()
                .join(".releaseflow/runs/test-run/dist/gt-installer-windows-x86_64.exe")
        );
        assert!(artifact.sha256.is_some());
        assert!(artifact.path.is_file());
        assert!(!artifact.signed);
        assert_eq!(ctx.store.fetch("windows-x86_64").await.unwrap(), artifact);

        let invocation = &runner.invocations()[0];
        assert_eq!(
            invocation.display_args(),
            vec!["build", "--release", "--bin", "gt-installer", "--target", "windows-x86_64"]
        );
        assert_eq!(invocation.cwd.as_deref(), Some(dir.path()));
    }

    #[tokio::test]
    async fn test_compiler_failure_is_build_failed() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(
            ScriptedRunner::new().respond_to("cargo", Response::fail(101, "error: could not compile")),
        );
        let (ctx, _) = stage_context(sample_config(dir.path()), runner);
        let target = ctx.registry.get("linux-x86_64").unwrap().clone();

        let err = build_target(&ctx, &target).await.unwrap_err();
        assert_eq!(err.code(), "BUILD_FAILED");
        assert!(err.to_string().contains("could not compile"));
        assert!(ctx.store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_output() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _) = stage_context(sample_config(dir.path()), Arc::new(ScriptedRunner::new()));
        let target = ctx.registry.get("linux-x86_64").unwrap().clone();

        let err = build_target(&ctx, &target).await.unwrap_err();
        assert_eq!(err.code(), "MISSING_OUTPUT");
    }

    #[tokio::test]
    async fn test_unavailable_agent_never_invokes_compiler() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let (mut ctx, _) = stage_context(sample_config(dir.path()), runner.clone());
        ctx.agents = Arc::new(AgentPool::new(["linux".to_string()]));
        let target = ctx.registry.get("macos-arm64").unwrap().clone();

        let err = build_target(&ctx, &target).await.unwrap_err();
        assert_eq!(err.code(), "AGENT_UNAVAILABLE");
        assert!(runner.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_second_build_of_same_target_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new().respond_to(
            "cargo",
            Response::WriteFile(output_path(dir.path(), "linux-x86_64", "")),
        ));
        let (ctx, _) = stage_context(sample_config(dir.path()), runner);
        let target = ctx.registry.get("linux-x86_64").unwrap().clone();

        build_target(&ctx, &target).await.unwrap();
        let err = build_target(&ctx, &target).await.unwrap_err();
        assert_eq!(err.code(), "DUPLICATE_KEY");
    }
}
