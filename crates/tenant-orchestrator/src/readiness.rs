//! Bounded readiness waits via `kubectl wait`.

use std::time::Duration;

use tracing::{info, warn};

use crate::command::{CommandRunner, CommandSpec};
use crate::error::{CommandError, WorkflowError};

/// Extra time granted to kubectl beyond its own `--timeout` before the
/// process is abandoned.
const WAIT_GRACE: Duration = Duration::from_secs(30);

/// Kinds a readiness wait can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Pod,
    Deployment,
    StatefulSet,
}

impl ResourceKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pod => "pod",
            Self::Deployment => "deployment",
            Self::StatefulSet => "statefulset",
        }
    }

    /// Pods report per-instance readiness; workloads report availability.
    #[must_use]
    pub fn condition(&self) -> &'static str {
        match self {
            Self::Pod => "condition=Ready",
            Self::Deployment | Self::StatefulSet => "condition=Available",
        }
    }
}

/// What to wait for.
#[derive(Debug, Clone)]
pub struct WaitRequest<'a> {
    pub namespace: &'a str,
    pub selector: &'a str,
    pub kind: ResourceKind,
    pub timeout: Duration,
}

impl WaitRequest<'_> {
    /// `kubectl wait` argument list.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        vec![
            "wait".to_string(),
            format!("--namespace={}", self.namespace),
            format!("--for={}", self.kind.condition()),
            self.kind.as_str().to_string(),
            "-l".to_string(),
            self.selector.to_string(),
            format!("--timeout={}s", self.timeout.as_secs()),
        ]
    }

    fn timed_out(&self) -> WorkflowError {
        WorkflowError::ReadinessTimeout {
            kind: self.kind.as_str().to_string(),
            namespace: self.namespace.to_string(),
            selector: self.selector.to_string(),
            timeout_secs: self.timeout.as_secs(),
        }
    }
}

/// Block until the selected resources are ready or the timeout elapses.
///
/// A non-zero kubectl exit and an overrun of the local guard both yield
/// [`WorkflowError::ReadinessTimeout`]. Failing to start kubectl at all is a
/// command fault.
pub async fn wait_for_ready(
    runner: &dyn CommandRunner,
    kubectl: &str,
    request: &WaitRequest<'_>,
) -> Result<(), WorkflowError> {
    let spec = CommandSpec::new(kubectl, "kube-wait").args(request.args());
    info!(
        namespace = %request.namespace,
        selector = %request.selector,
        kind = request.kind.as_str(),
        timeout_secs = request.timeout.as_secs(),
        "Waiting for resource readiness"
    );

    match tokio::time::timeout(request.timeout + WAIT_GRACE, runner.run(&spec)).await {
        Ok(Ok(_)) => {
            info!(namespace = %request.namespace, selector = %request.selector, "Resource ready");
            Ok(())
        }
        Ok(Err(CommandError::Failed { exit_code, stdout, stderr, .. })) => {
            warn!(
                namespace = %request.namespace,
                selector = %request.selector,
                exit_code,
                output = %format!("{stdout}{stderr}").trim(),
                "Wait failed or timed out"
            );
            Err(request.timed_out())
        }
        Ok(Err(e)) => Err(e.into()),
        Err(_) => {
            warn!(
                namespace = %request.namespace,
                selector = %request.selector,
                "kubectl wait overran its timeout; abandoning"
            );
            Err(request.timed_out())
        }
    }
}
