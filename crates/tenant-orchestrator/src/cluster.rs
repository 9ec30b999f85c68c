//! Kubernetes control-plane access.
//!
//! Only the handful of reads and deletes the orchestrator needs. Mutations
//! that go through deployment tooling (install, scale, wait) live in the
//! CLI-driven modules instead.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{Api, DeleteParams, ListParams};
use kube::Client;
use tracing::{debug, info};

use crate::error::ClusterError;

/// Workload kinds whose replica counts the health checks read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
}

impl WorkloadKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deployment => "deployment",
            Self::StatefulSet => "statefulset",
        }
    }
}

impl std::fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Replica counters of one workload. Missing fields read as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplicaCounts {
    /// `spec.replicas`
    pub desired: i32,
    /// `status.readyReplicas`
    pub ready: i32,
    /// `status.replicas`
    pub current: i32,
}

impl From<&Deployment> for ReplicaCounts {
    fn from(deployment: &Deployment) -> Self {
        let status = deployment.status.as_ref();
        Self {
            desired: deployment.spec.as_ref().and_then(|s| s.replicas).unwrap_or(0),
            ready: status.and_then(|s| s.ready_replicas).unwrap_or(0),
            current: status.and_then(|s| s.replicas).unwrap_or(0),
        }
    }
}

impl From<&StatefulSet> for ReplicaCounts {
    fn from(set: &StatefulSet) -> Self {
        let status = set.status.as_ref();
        Self {
            desired: set.spec.as_ref().and_then(|s| s.replicas).unwrap_or(0),
            ready: status.and_then(|s| s.ready_replicas).unwrap_or(0),
            current: status.map_or(0, |s| s.replicas),
        }
    }
}

/// Control-plane operations used by health checks and the delete workflow.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Read a namespace; a missing namespace is a 404 [`ClusterError`].
    async fn read_namespace(&self, name: &str) -> Result<(), ClusterError>;

    /// Replica counts of every workload of `kind` matching `selector`.
    async fn list_workloads(
        &self,
        namespace: &str,
        selector: &str,
        kind: WorkloadKind,
    ) -> Result<Vec<ReplicaCounts>, ClusterError>;

    /// Request namespace deletion without waiting for it to finish.
    async fn delete_namespace(&self, name: &str) -> Result<(), ClusterError>;

    /// Git version reported by the API server.
    async fn server_version(&self) -> Result<String, ClusterError>;
}

/// [`ClusterApi`] backed by a `kube` client.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn read_namespace(&self, name: &str) -> Result<(), ClusterError> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        namespaces.get(name).await?;
        debug!(namespace = %name, "Namespace exists");
        Ok(())
    }

    async fn list_workloads(
        &self,
        namespace: &str,
        selector: &str,
        kind: WorkloadKind,
    ) -> Result<Vec<ReplicaCounts>, ClusterError> {
        let params = ListParams::default().labels(selector);
        let counts = match kind {
            WorkloadKind::Deployment => {
                let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
                api.list(&params).await?.items.iter().map(ReplicaCounts::from).collect()
            }
            WorkloadKind::StatefulSet => {
                let api: Api<StatefulSet> = Api::namespaced(self.client.clone(), namespace);
                api.list(&params).await?.items.iter().map(ReplicaCounts::from).collect()
            }
        };
        Ok(counts)
    }

    async fn delete_namespace(&self, name: &str) -> Result<(), ClusterError> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        namespaces.delete(name, &DeleteParams::default()).await?;
        info!(namespace = %name, "Namespace deletion requested");
        Ok(())
    }

    async fn server_version(&self) -> Result<String, ClusterError> {
        let info = self.client.apiserver_version().await?;
        Ok(info.git_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::{DeploymentSpec, DeploymentStatus, StatefulSetStatus};

    #[test]
    fn deployment_counts_default_to_zero() {
        let empty = Deployment::default();
        assert_eq!(ReplicaCounts::from(&empty), ReplicaCounts::default());

        let deployment = Deployment {
            spec: Some(DeploymentSpec {
                replicas: Some(2),
                ..Default::default()
            }),
            status: Some(DeploymentStatus {
                ready_replicas: Some(1),
                replicas: Some(2),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(
            ReplicaCounts::from(&deployment),
            ReplicaCounts {
                desired: 2,
                ready: 1,
                current: 2
            }
        );
    }

    #[test]
    fn statefulset_without_spec_has_no_desired_replicas() {
        let set = StatefulSet {
            status: Some(StatefulSetStatus {
                replicas: 1,
                ready_replicas: Some(1),
                ..Default::default()
            }),
            ..Default::default()
        };
        let counts = ReplicaCounts::from(&set);
        assert_eq!(counts.desired, 0);
        assert_eq!(counts.ready, 1);
        assert_eq!(counts.current, 1);
    }
}
