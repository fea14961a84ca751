use super::StageContext;
use crate::config::render_template;
use crate::core::{Artifact, Target};
use crate::errors::{ReleaseflowError, Result};
use crate::process::{run_bounded, Invocation};
use crate::secrets::{Secret, SecretSource};
use futures::future::try_join_all;
use std::path::Path;
use tracing::{debug, info};

/// The code-signing certificate and notarization password.
///
/// Lives only as long as the signing stage and is handed to the signer
/// through its environment, never through arguments.
#[derive(Debug)]
pub struct SigningCredential {
    certificate_env: String,
    certificate: Secret,
    password_env: String,
    password: Secret,
}

impl SigningCredential {
    /// Reads both secrets.
    ///
    /// # Errors
    ///
    /// `MissingSecret` if either is unset.
    pub fn acquire(
        secrets: &dyn SecretSource,
        certificate_env: &str,
        password_env: &str,
    ) -> Result<Self> {
        Ok(Self {
            certificate: secrets.secret(certificate_env)?,
            certificate_env: certificate_env.to_string(),
            password: secrets.secret(password_env)?,
            password_env: password_env.to_string(),
        })
    }

    /// Adds the credential to a signer invocation.
    #[must_use]
    pub fn apply(&self, invocation: Invocation) -> Invocation {
        invocation
            .secret_env(&self.certificate_env, self.certificate.clone())
            .secret_env(&self.password_env, self.password.clone())
    }
}

impl Drop for SigningCredential {
    fn drop(&mut self) {
        debug!("Signing credential released");
    }
}

/// Targets whose artifacts must be signed, in registry order.
#[must_use]
pub fn signing_targets(ctx: &StageContext) -> Vec<&Target> {
    ctx.registry
        .list_targets()
        .iter()
        .filter(|t| t.requires_signing)
        .collect()
}

/// Signs every artifact whose target requires it and promotes each one to
/// its signed version in the store.
///
/// All artifacts are fetched before the credential is acquired, so a build
/// that never completed fails the stage without touching secrets. Artifacts
/// are signed concurrently; the first failure drops the remaining signer
/// invocations.
///
/// # Errors
///
/// `NotFound` if an eligible artifact was never published, `MissingSecret`
/// if the credential is incomplete, `SigningFailed` on a non-zero signer
/// exit, and `Timeout` or `Cancelled` from the bounded wait.
pub async fn sign_artifacts(ctx: &StageContext, signer: &Path) -> Result<Vec<Artifact>> {
    let mut pending = Vec::new();
    for target in signing_targets(ctx) {
        pending.push(ctx.store.fetch(&target.triple).await?);
    }

    let config = &ctx.config;
    let credential = SigningCredential::acquire(
        ctx.secrets.as_ref(),
        &config.signer.certificate_env,
        &config.signer.password_env,
    )?;

    let signed = try_join_all(pending.into_iter().map(|artifact| {
        let credential = &credential;
        async move {
            let path = artifact.path.display().to_string();
            let platform = artifact.target.os().to_string();
            let vars = [
                ("tool", config.tool_name.as_str()),
                ("triple", artifact.target.triple.as_str()),
                ("exe", artifact.target.os().exe_suffix()),
                ("artifact", path.as_str()),
                ("platform", platform.as_str()),
            ];
            let invocation = credential.apply(
                Invocation::new(&config.signer.name, signer)
                    .args(config.signer.args.iter().map(|a| render_template(a, &vars)))
                    .current_dir(&config.root),
            );

            let outcome = run_bounded(
                ctx.runner.as_ref(),
                &invocation,
                &ctx.cancel,
                config.signer_timeout(),
            )
            .await?;
            if !outcome.success {
                return Err(ReleaseflowError::SigningFailed {
                    triple: artifact.target.triple.clone(),
                    outcome,
                });
            }

            let key = artifact.key().to_string();
            let promoted = ctx.store.promote_signed(&key, artifact.into_signed()).await?;
            info!(triple = %key, "Artifact signed");
            Ok(promoted)
        }
    }))
    .await?;

    drop(credential);
    Ok(signed)
}
