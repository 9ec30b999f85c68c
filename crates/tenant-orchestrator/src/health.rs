//! Tenant health aggregation.
//!
//! A health check combines the persisted lifecycle status with a live look
//! at the tenant's namespace and its three components, and produces exactly
//! one reported status:
//!
//! - `STOPPED` whenever the registry says the tenant is stopped, regardless
//!   of what the cluster shows;
//! - `READY` when the namespace exists and every component is healthy, in
//!   which case the registry is corrected to `READY` in the background;
//! - `NOT_READY` otherwise.
//!
//! The background correction never overwrites the status of a tenant that
//! has a lifecycle workflow in flight.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::cluster::{ClusterApi, WorkloadKind};
use crate::error::HealthError;
use crate::kube_error::ClusterErrorInfo;
use crate::lifecycle::Orchestrator;
use crate::registry::TenantRegistry;
use crate::resolver::{resolve_tenant_config, TenantConfig};
use crate::status::{check_resource_status, ServiceStatus};
use crate::tenant::TenantStatus;

/// Externally reported tenant status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportedStatus {
    Ready,
    NotReady,
    Stopped,
}

/// Outcome of reading the tenant namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceStatus {
    Exists,
    NotFoundInCluster,
    Error(ClusterErrorInfo),
}

impl NamespaceStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exists => "exists",
            Self::NotFoundInCluster => "not_found_in_cluster",
            Self::Error(_) => "error",
        }
    }
}

impl Serialize for NamespaceStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Live status of the three tenant components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantServices {
    pub postgresql: ServiceStatus,
    pub backend_api: ServiceStatus,
    pub user_frontend: ServiceStatus,
}

impl TenantServices {
    fn unavailable(reason: &str) -> Self {
        Self {
            postgresql: ServiceStatus::unavailable(reason),
            backend_api: ServiceStatus::unavailable(reason),
            user_frontend: ServiceStatus::unavailable(reason),
        }
    }

    #[must_use]
    pub fn all_healthy(&self) -> bool {
        self.postgresql.is_healthy()
            && self.backend_api.is_healthy()
            && self.user_frontend.is_healthy()
    }
}

/// Result of one health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub status: ReportedStatus,
    pub company_code: String,
    pub checked_namespace: String,
    pub namespace_status: NamespaceStatus,
    pub services: TenantServices,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubernetes_error: Option<ClusterErrorInfo>,
}

/// Decide the reported status from persisted and live state.
#[must_use]
pub fn reported_status(
    persisted: TenantStatus,
    namespace: &NamespaceStatus,
    services: &TenantServices,
) -> ReportedStatus {
    if persisted == TenantStatus::Stopped {
        return ReportedStatus::Stopped;
    }
    if *namespace == NamespaceStatus::Exists && services.all_healthy() {
        return ReportedStatus::Ready;
    }
    ReportedStatus::NotReady
}

/// Runs tenant health checks.
pub struct HealthAggregator {
    registry: Arc<dyn TenantRegistry>,
    cluster: Arc<dyn ClusterApi>,
    workflows: Option<Orchestrator>,
}

impl HealthAggregator {
    pub fn new(registry: Arc<dyn TenantRegistry>, cluster: Arc<dyn ClusterApi>) -> Self {
        Self {
            registry,
            cluster,
            workflows: None,
        }
    }

    /// Leave tenants with a running workflow to that workflow's own status
    /// writes.
    #[must_use]
    pub fn with_workflows(mut self, orchestrator: Orchestrator) -> Self {
        self.workflows = Some(orchestrator);
        self
    }

    fn workflow_running(&self, company_code: &str) -> bool {
        running_workflow(self.workflows.as_ref(), company_code)
    }

    /// Check one tenant's health.
    ///
    /// Fails only when the tenant cannot be resolved; cluster trouble is
    /// reported inside the snapshot.
    pub async fn check(&self, company_code: &str) -> Result<HealthSnapshot, HealthError> {
        let config = resolve_tenant_config(self.registry.as_ref(), company_code).await?;
        debug!(
            company_code = %config.company_code,
            namespace = %config.namespace,
            "Checking tenant health"
        );

        let namespace_status = self.namespace_status(&config.namespace).await;
        let services = match &namespace_status {
            NamespaceStatus::Exists => self.services(&config).await,
            NamespaceStatus::NotFoundInCluster => {
                TenantServices::unavailable("Namespace not found")
            }
            NamespaceStatus::Error(_) => TenantServices::unavailable("Namespace check failed"),
        };

        let status = reported_status(config.status, &namespace_status, &services);
        if status == ReportedStatus::Ready && config.status != TenantStatus::Ready {
            if self.workflow_running(&config.company_code) {
                debug!(
                    company_code = %config.company_code,
                    persisted = %config.status,
                    "Workflow in progress; skipping status reconciliation"
                );
            } else {
                self.reconcile_ready(&config);
            }
        }

        let kubernetes_error = match &namespace_status {
            NamespaceStatus::Error(info) => Some(info.clone()),
            _ => None,
        };
        Ok(HealthSnapshot {
            status,
            company_code: config.company_code,
            checked_namespace: config.namespace,
            namespace_status,
            services,
            kubernetes_error,
        })
    }

    async fn namespace_status(&self, namespace: &str) -> NamespaceStatus {
        match self.cluster.read_namespace(namespace).await {
            Ok(()) => NamespaceStatus::Exists,
            Err(e) if e.is_not_found() => {
                debug!(namespace, "Namespace not found in cluster");
                NamespaceStatus::NotFoundInCluster
            }
            Err(e) => {
                warn!(namespace, error = %e, "Failed to read namespace");
                NamespaceStatus::Error(e.0)
            }
        }
    }

    async fn services(&self, config: &TenantConfig) -> TenantServices {
        let cluster = self.cluster.as_ref();
        let ns = config.namespace.as_str();
        let releases = &config.releases;
        let (postgresql, backend_api, user_frontend) = futures::join!(
            check_resource_status(cluster, ns, &releases.postgresql, WorkloadKind::StatefulSet),
            check_resource_status(cluster, ns, &releases.backend_api, WorkloadKind::Deployment),
            check_resource_status(cluster, ns, &releases.user_frontend, WorkloadKind::Deployment),
        );
        TenantServices {
            postgresql,
            backend_api,
            user_frontend,
        }
    }

    fn reconcile_ready(&self, config: &TenantConfig) {
        let registry = Arc::clone(&self.registry);
        let workflows = self.workflows.clone();
        let company_code = config.company_code.clone();
        let previous = config.status;
        info!(
            company_code = %company_code,
            %previous,
            "Tenant observed healthy; reconciling status to READY"
        );
        tokio::spawn(async move {
            if running_workflow(workflows.as_ref(), &company_code) {
                debug!(
                    company_code = %company_code,
                    "Workflow started; dropping status reconciliation"
                );
                return;
            }
            if let Err(e) = registry
                .update_status(&company_code, TenantStatus::Ready, Utc::now())
                .await
            {
                error!(
                    company_code = %company_code,
                    error = %e,
                    "Background status reconciliation failed"
                );
            }
        });
    }
}

fn running_workflow(workflows: Option<&Orchestrator>, company_code: &str) -> bool {
    workflows.is_some_and(|orchestrator| orchestrator.running(company_code).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn services(healthy: bool) -> TenantServices {
        let status = if healthy {
            crate::status::classify(crate::cluster::ReplicaCounts {
                desired: 1,
                ready: 1,
                current: 1,
            })
        } else {
            ServiceStatus::not_found()
        };
        TenantServices {
            postgresql: status.clone(),
            backend_api: status.clone(),
            user_frontend: status,
        }
    }

    #[test]
    fn stopped_wins_over_live_state() {
        for ns in [
            NamespaceStatus::Exists,
            NamespaceStatus::NotFoundInCluster,
            NamespaceStatus::Error(ClusterErrorInfo::from_message("boom")),
        ] {
            for healthy in [true, false] {
                assert_eq!(
                    reported_status(TenantStatus::Stopped, &ns, &services(healthy)),
                    ReportedStatus::Stopped
                );
            }
        }
    }

    #[test]
    fn ready_needs_namespace_and_all_components() {
        assert_eq!(
            reported_status(TenantStatus::Failed, &NamespaceStatus::Exists, &services(true)),
            ReportedStatus::Ready
        );
        assert_eq!(
            reported_status(TenantStatus::Ready, &NamespaceStatus::Exists, &services(false)),
            ReportedStatus::NotReady
        );

        let mut one_down = services(true);
        one_down.user_frontend = ServiceStatus::not_found();
        assert_eq!(
            reported_status(TenantStatus::Ready, &NamespaceStatus::Exists, &one_down),
            ReportedStatus::NotReady
        );
    }

    #[test]
    fn snapshot_serializes_namespace_status_as_text() {
        let snapshot = HealthSnapshot {
            status: ReportedStatus::NotReady,
            company_code: "ACME".to_string(),
            checked_namespace: "tenant-acme".to_string(),
            namespace_status: NamespaceStatus::Error(ClusterErrorInfo::from_message("forbidden")),
            services: TenantServices::unavailable("Namespace check failed"),
            kubernetes_error: Some(ClusterErrorInfo::from_message("forbidden")),
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["status"], "NOT_READY");
        assert_eq!(value["namespaceStatus"], "error");
        assert_eq!(value["checkedNamespace"], "tenant-acme");
        assert_eq!(value["services"]["backendApi"]["state"], "unavailable");
        assert_eq!(value["kubernetesError"]["message"], "forbidden");
    }
}
