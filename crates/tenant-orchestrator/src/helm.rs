//! Release management through the helm CLI.

use tracing::{info, warn};

use crate::command::{CommandRunner, CommandSpec};
use crate::error::{CommandError, WorkflowError};

/// Outcome of `helm uninstall`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UninstallOutcome {
    Removed,
    /// The release did not exist.
    NotFound,
}

/// One `helm upgrade --install` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    pub release: String,
    /// Chart reference or local chart directory.
    pub chart: String,
    pub namespace: String,
    pub create_namespace: bool,
    /// `--set` overrides, applied in order.
    pub values: Vec<(String, String)>,
}

impl InstallRequest {
    #[must_use]
    pub fn new(
        release: impl Into<String>,
        chart: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            release: release.into(),
            chart: chart.into(),
            namespace: namespace.into(),
            create_namespace: false,
            values: Vec::new(),
        }
    }

    #[must_use]
    pub fn create_namespace(mut self) -> Self {
        self.create_namespace = true;
        self
    }

    #[must_use]
    pub fn values(mut self, values: Vec<(String, String)>) -> Self {
        self.values = values;
        self
    }

    /// `helm` argument list.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "upgrade".to_string(),
            "--install".to_string(),
            self.release.clone(),
            self.chart.clone(),
            "--namespace".to_string(),
            self.namespace.clone(),
        ];
        if self.create_namespace {
            args.push("--create-namespace".to_string());
        }
        for (key, value) in &self.values {
            args.push("--set".to_string());
            args.push(format!("{key}={value}"));
        }
        args
    }
}

/// Thin wrapper over the helm binary.
pub struct Helm<'a> {
    runner: &'a dyn CommandRunner,
    bin: &'a str,
}

impl<'a> Helm<'a> {
    #[must_use]
    pub fn new(runner: &'a dyn CommandRunner, bin: &'a str) -> Self {
        Self { runner, bin }
    }

    fn command(&self, prefix: &str) -> CommandSpec {
        CommandSpec::new(self.bin, format!("helm-{prefix}"))
    }

    /// Register a chart repository and refresh the index.
    pub async fn ensure_repo(&self, name: &str, url: &str) -> Result<(), WorkflowError> {
        let add = self.command("repo").args(["repo", "add", name, url]);
        match self.runner.run(&add).await {
            Ok(_) => info!(repo = name, "Chart repository added"),
            Err(e @ CommandError::Failed { .. }) if e.output_contains("already exists") => {
                info!(repo = name, "Chart repository already exists");
            }
            Err(e) => return Err(e.into()),
        }

        let update = self.command("repo").args(["repo", "update"]);
        self.runner.run(&update).await?;
        info!("Chart repositories updated");
        Ok(())
    }

    /// Install or upgrade a release. `step` tags the streamed output.
    pub async fn upgrade_install(
        &self,
        step: &str,
        request: &InstallRequest,
    ) -> Result<(), WorkflowError> {
        info!(
            release = %request.release,
            namespace = %request.namespace,
            chart = %request.chart,
            "Installing release"
        );
        let spec = self.command(step).args(request.args());
        self.runner.run(&spec).await?;
        info!(release = %request.release, namespace = %request.namespace, "Release installed");
        Ok(())
    }

    /// Uninstall a release; a missing release is not an error.
    pub async fn uninstall(
        &self,
        step: &str,
        namespace: &str,
        release: &str,
    ) -> Result<UninstallOutcome, WorkflowError> {
        let spec = self.command(step).args(["uninstall", "-n", namespace, release]);
        match self.runner.run(&spec).await {
            Ok(_) => {
                info!(release, namespace, "Release uninstalled");
                Ok(UninstallOutcome::Removed)
            }
            Err(e @ CommandError::Failed { .. }) if e.output_contains("release: not found") => {
                info!(release, namespace, "Release not found; considering it uninstalled");
                Ok(UninstallOutcome::NotFound)
            }
            Err(e) => {
                warn!(
                    release,
                    namespace,
                    error = %e,
                    output = %e.output().trim(),
                    "Release uninstall failed"
                );
                Err(e.into())
            }
        }
    }
}
