//! The release run: builds, barrier, signing, gate, publish.

use super::{RunLock, RunReport};
use crate::cancellation::{first_failure, CancellationToken, StructuredTaskGroup};
use crate::config::PipelineConfig;
use crate::core::{BumpLevel, ReleaseRequest, RunResult, RunStatus, StageRecord};
use crate::errors::Result;
use crate::events::{
    EventSink, LoggingEventSink, RunEvents, GATE_EVALUATED, RELEASE_PUBLISHED, RUN_COMPLETED,
    RUN_FAILED, RUN_STARTED,
};
use crate::process::{CommandRunner, SystemCommandRunner};
use crate::registry::{AgentPool, TargetRegistry};
use crate::secrets::{EnvSecretSource, SecretSource};
use crate::stages::{
    build_stage_name, build_target, publish_release, should_release, sign_artifacts, skipped,
    tracked, PublishMode, StageContext, GATE_STAGE, PUBLISH_STAGE, SIGN_STAGE,
};
use crate::store::{open_store, ArtifactStore};
use crate::tools::{Downloader, PinnedTools};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// What to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// The branch being built.
    pub branch: String,
    /// Version increment for the release.
    pub bump: BumpLevel,
    /// Skip the release-tool invocation.
    pub dry_run: bool,
}

impl RunRequest {
    /// A live run on `branch`.
    #[must_use]
    pub fn new(branch: impl Into<String>, bump: BumpLevel) -> Self {
        Self {
            branch: branch.into(),
            bump,
            dry_run: false,
        }
    }

    /// Marks the run as a dry run.
    #[must_use]
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

/// Runs releases for one pipeline configuration.
#[derive(Debug, Clone)]
pub struct ReleasePipeline {
    config: Arc<PipelineConfig>,
    registry: Arc<TargetRegistry>,
    agents: Arc<AgentPool>,
    runner: Arc<dyn CommandRunner>,
    secrets: Arc<dyn SecretSource>,
    sink: Arc<dyn EventSink>,
    store: Option<Arc<dyn ArtifactStore>>,
}

impl ReleasePipeline {
    /// Creates a pipeline that spawns real processes, reads secrets from
    /// the environment and logs events.
    ///
    /// # Errors
    ///
    /// `Config` if the configured targets are invalid.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let registry = config.registry()?;
        Ok(Self {
            agents: Arc::new(config.agent_pool()),
            registry: Arc::new(registry),
            config: Arc::new(config),
            runner: Arc::new(SystemCommandRunner),
            secrets: Arc::new(EnvSecretSource),
            sink: Arc::new(LoggingEventSink),
            store: None,
        })
    }

    /// Replaces the command runner.
    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Replaces the secret source.
    #[must_use]
    pub fn with_secrets(mut self, secrets: Arc<dyn SecretSource>) -> Self {
        self.secrets = secrets;
        self
    }

    /// Replaces the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Uses `store` instead of opening the configured one for each run.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replaces the agent pool.
    #[must_use]
    pub fn with_agents(mut self, agents: AgentPool) -> Self {
        self.agents = Arc::new(agents);
        self
    }

    /// The pipeline's configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The pipeline's targets.
    #[must_use]
    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    /// Performs one run.
    ///
    /// Every failure after the branch lock is taken is reported in the
    /// returned [`RunReport`] rather than as an error; the store is
    /// discarded either way. Stash and dist live under the run's own
    /// directory, so runs on different branches may overlap.
    ///
    /// # Errors
    ///
    /// `RunInProgress` if another run holds the branch, `Io` if the lock
    /// cannot be written.
    pub async fn run(&self, request: &RunRequest) -> Result<RunReport> {
        let _lock = RunLock::acquire(&self.config.locks_dir(), &request.branch)?;

        let status = RunStatus::pending(&request.branch);
        let events = RunEvents::new(self.sink.clone(), &status.run_id, &request.branch);
        events.emit(
            RUN_STARTED,
            json!({
                "bump": request.bump.as_str(),
                "dry_run": request.dry_run,
                "targets": self.registry.triples(),
            }),
        );
        info!(run_id = %status.run_id, branch = %request.branch, bump = %request.bump, "Release run started");

        let ctx = StageContext {
            config: self.config.clone(),
            registry: self.registry.clone(),
            agents: self.agents.clone(),
            store: self
                .store
                .clone()
                .unwrap_or_else(|| open_store(&self.config, &status.run_id)),
            dist_dir: self.config.dist_dir(&status.run_id),
            runner: self.runner.clone(),
            secrets: self.secrets.clone(),
            events: events.clone(),
            cancel: Arc::new(CancellationToken::new()),
        };

        let mut report = RunReport::new(status.clone(), request.dry_run);
        let outcome = self.execute(&ctx, request, status, &mut report).await;

        report.artifacts = snapshot(ctx.store.as_ref()).await;
        if let Err(e) = ctx.store.discard().await {
            warn!(error = %e, "Failed to discard artifact store");
        }

        match outcome {
            Ok((status, released)) => {
                report.status = status.with_result(RunResult::Success);
                report.released = released;
                events.emit(
                    RUN_COMPLETED,
                    json!({ "released": report.released.is_some(), "dry_run": request.dry_run }),
                );
                info!(run_id = %report.status.run_id, released = report.released.is_some(), "Release run completed");
            }
            Err(e) => {
                report.status = report.status.clone().with_result(RunResult::Failure);
                events.emit(RUN_FAILED, json!({ "error": e.to_string(), "code": e.code() }));
                warn!(run_id = %report.status.run_id, error = %e, "Release run failed");
                report.error = Some(e);
            }
        }

        Ok(report)
    }

    async fn execute(
        &self,
        ctx: &StageContext,
        request: &RunRequest,
        status: RunStatus,
        report: &mut RunReport,
    ) -> Result<(RunStatus, Option<ReleaseRequest>)> {
        let pins = PinnedTools::load(&self.config)?;
        info!(
            signer = %pins.signer.version,
            releaser = %pins.releaser.version,
            "Pinned tool versions"
        );

        self.build_all(ctx, report).await?;

        let on_release_branch = request.branch == self.config.release_branch;
        if !self.registry.any_requires_signing() {
            report.stages.push(skipped(&ctx.events, SIGN_STAGE, "no target requires signing"));
        } else if !on_release_branch {
            report.stages.push(skipped(&ctx.events, SIGN_STAGE, "not the release branch"));
        } else {
            let (record, result) = tracked(&ctx.events, SIGN_STAGE, async {
                let signer = pins.signer.ensure_installed(&Downloader::new()?).await?;
                sign_artifacts(ctx, &signer).await
            })
            .await;
            report.stages.push(record);
            result?;
        }

        let (record, open) = tracked(&ctx.events, GATE_STAGE, async {
            Ok(should_release(&status, &self.config.release_branch))
        })
        .await;
        report.stages.push(record);
        let open = open?;
        ctx.events.emit(
            GATE_EVALUATED,
            json!({
                "result": status.overall,
                "release_branch": self.config.release_branch,
                "open": open,
            }),
        );
        if !open {
            info!(branch = %status.branch, release_branch = %self.config.release_branch, "Release gate closed");
            report.stages.push(skipped(&ctx.events, PUBLISH_STAGE, "release gate closed"));
            return Ok((status, None));
        }
        if status.overall == RunResult::Pending {
            warn!(run_id = %status.run_id, "Release gate opened on a pending result");
        }

        let (record, result) = tracked(&ctx.events, PUBLISH_STAGE, async {
            let mode = if request.dry_run {
                PublishMode::DryRun
            } else {
                PublishMode::Live(pins.releaser.ensure_installed(&Downloader::new()?).await?)
            };
            publish_release(ctx, request.bump, &mode).await
        })
        .await;
        report.stages.push(record);
        let released = result?;

        ctx.events.emit(
            RELEASE_PUBLISHED,
            json!({
                "owner": released.owner,
                "repo": released.repo,
                "bump": released.bump.as_str(),
                "assets": released.asset_names(),
                "dry_run": request.dry_run,
            }),
        );
        Ok((status, Some(released)))
    }

    /// Builds every target in parallel and waits for all of them.
    async fn build_all(&self, ctx: &StageContext, report: &mut RunReport) -> Result<()> {
        let records = Arc::new(Mutex::new(Vec::<StageRecord>::new()));
        let group = StructuredTaskGroup::with_token(ctx.cancel.clone());

        for target in self.registry.list_targets() {
            let ctx = ctx.clone();
            let target = target.clone();
            let records = records.clone();
            let name = build_stage_name(&target.triple);
            group.spawn(name.clone(), move |_token| async move {
                let (record, result) = tracked(&ctx.events, &name, build_target(&ctx, &target)).await;
                records.lock().push(record);
                result
            });
        }

        let outcomes = group.wait().await;

        let mut records = std::mem::take(&mut *records.lock());
        let order: Vec<String> = self
            .registry
            .triples()
            .into_iter()
            .map(build_stage_name)
            .collect();
        records.sort_by_key(|r| order.iter().position(|n| *n == r.name));
        report.stages.extend(records);

        first_failure(outcomes).map(|_| ())
    }
}

async fn snapshot(store: &dyn ArtifactStore) -> Vec<crate::core::Artifact> {
    let Ok(keys) = store.keys().await else {
        return Vec::new();
    };
    let mut artifacts = Vec::with_capacity(keys.len());
    for key in keys {
        if let Ok(artifact) = store.fetch(&key).await {
            artifacts.push(artifact);
        }
    }
    artifacts
}
