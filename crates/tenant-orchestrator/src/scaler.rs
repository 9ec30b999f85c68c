//! Deployment scaling via `kubectl scale`.

use tracing::{info, warn};

use crate::command::{CommandRunner, CommandSpec};
use crate::error::{CommandError, WorkflowError};

/// Outputs meaning "nothing matched", which is as good as scaled.
const NOTHING_TO_SCALE: &[&str] = &["not found", "no objects passed to scale"];

/// Outcome of a successful scale request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleOutcome {
    Scaled,
    /// No deployment matched the selector.
    NotFound,
}

/// `kubectl scale` argument list.
#[must_use]
pub fn scale_args(namespace: &str, selector: &str, replicas: u32) -> Vec<String> {
    vec![
        "scale".to_string(),
        format!("--namespace={namespace}"),
        "deployment".to_string(),
        "-l".to_string(),
        selector.to_string(),
        format!("--replicas={replicas}"),
    ]
}

fn nothing_to_scale(output: &str) -> bool {
    let output = output.to_lowercase();
    NOTHING_TO_SCALE.iter().any(|needle| output.contains(needle))
}

/// Scale every deployment matching `selector` to `replicas`.
pub async fn scale_deployments(
    runner: &dyn CommandRunner,
    kubectl: &str,
    namespace: &str,
    selector: &str,
    replicas: u32,
) -> Result<ScaleOutcome, WorkflowError> {
    let spec =
        CommandSpec::new(kubectl, "kube-scale").args(scale_args(namespace, selector, replicas));
    info!(namespace, selector, replicas, "Scaling deployments");

    match runner.run(&spec).await {
        // kubectl can exit 0 and still report an error in its output.
        Ok(output) if nothing_to_scale(&output.combined()) => {
            warn!(namespace, selector, "Nothing to scale; assuming already scaled or removed");
            Ok(ScaleOutcome::NotFound)
        }
        Ok(output) if output.combined().to_lowercase().contains("error") => {
            Err(WorkflowError::Command(CommandError::Failed {
                program: spec.program.clone(),
                exit_code: 0,
                stdout: output.stdout,
                stderr: output.stderr,
            }))
        }
        Ok(_) => {
            info!(namespace, selector, replicas, "Scaled deployments");
            Ok(ScaleOutcome::Scaled)
        }
        Err(e @ CommandError::Failed { .. }) if nothing_to_scale(&e.output()) => {
            warn!(namespace, selector, "Nothing to scale; assuming already scaled or removed");
            Ok(ScaleOutcome::NotFound)
        }
        Err(e) => Err(e.into()),
    }
}
