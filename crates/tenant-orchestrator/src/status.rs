//! Resource status checks.
//!
//! A status is a point-in-time classification of one workload's replica
//! counters. Lookup failures become [`ServiceState::Error`] instead of
//! propagating.

use serde::Serialize;
use tracing::{debug, warn};

use crate::cluster::{ClusterApi, ReplicaCounts, WorkloadKind};
use crate::kube_error::ClusterErrorInfo;

/// Health classification of one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Healthy,
    Unhealthy,
    Degraded,
    NotFound,
    Error,
    /// Not checked because the namespace is absent or unreadable.
    Unavailable,
}

/// Extra context attached to a non-healthy status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ServiceIssue {
    Note(String),
    Cluster(ClusterErrorInfo),
}

/// Ephemeral health of one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub state: ServiceState,
    pub ready_replicas: i32,
    pub desired_replicas: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_info: Option<ServiceIssue>,
}

impl ServiceStatus {
    fn new(state: ServiceState, counts: ReplicaCounts, note: Option<&str>) -> Self {
        Self {
            state,
            ready_replicas: counts.ready,
            desired_replicas: counts.desired,
            error_info: note.map(|n| ServiceIssue::Note(n.to_string())),
        }
    }

    #[must_use]
    pub fn not_found() -> Self {
        Self::new(ServiceState::NotFound, ReplicaCounts::default(), None)
    }

    /// Placeholder for a component that was never looked up.
    #[must_use]
    pub fn unavailable(reason: &str) -> Self {
        Self::new(ServiceState::Unavailable, ReplicaCounts::default(), Some(reason))
    }

    #[must_use]
    pub fn error(info: ClusterErrorInfo) -> Self {
        Self {
            state: ServiceState::Error,
            ready_replicas: 0,
            desired_replicas: 0,
            error_info: Some(ServiceIssue::Cluster(info)),
        }
    }

    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.state == ServiceState::Healthy
    }
}

/// Classify replica counters.
///
/// Rules apply in order: zero desired is degraded, all counters equal is
/// healthy, some-but-not-all ready is degraded, none ready is unhealthy, and
/// any other mismatch is degraded.
#[must_use]
pub fn classify(counts: ReplicaCounts) -> ServiceStatus {
    use ServiceState::{Degraded, Healthy, Unhealthy};

    if counts.desired == 0 {
        return ServiceStatus::new(
            Degraded,
            ReplicaCounts {
                ready: 0,
                ..counts
            },
            Some("Desired replica count is 0"),
        );
    }
    if counts.ready == counts.desired && counts.current == counts.desired {
        return ServiceStatus::new(Healthy, counts, None);
    }
    if counts.ready < counts.desired {
        if counts.ready > 0 {
            return ServiceStatus::new(Degraded, counts, Some("Some pods are not ready"));
        }
        return ServiceStatus::new(Unhealthy, counts, Some("No pods are ready"));
    }
    ServiceStatus::new(Degraded, counts, Some("Replica status mismatch"))
}

/// Label selector that scopes resources to one release.
#[must_use]
pub fn release_selector(release: &str) -> String {
    format!("app.kubernetes.io/instance={release}")
}

/// Look up the workload of `release` and classify it.
pub async fn check_resource_status(
    cluster: &dyn ClusterApi,
    namespace: &str,
    release: &str,
    kind: WorkloadKind,
) -> ServiceStatus {
    let selector = release_selector(release);
    match cluster.list_workloads(namespace, &selector, kind).await {
        Ok(items) => match items.first() {
            Some(counts) => {
                let status = classify(*counts);
                debug!(namespace, release, %kind, state = ?status.state, "Checked resource status");
                status
            }
            None => {
                debug!(namespace, release, %kind, "No resource matches release selector");
                ServiceStatus::not_found()
            }
        },
        Err(e) => {
            warn!(namespace, release, %kind, error = %e, "Resource status lookup failed");
            ServiceStatus::error(e.0)
        }
    }
}
