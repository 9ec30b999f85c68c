use tracing::{error, info, warn};

use super::Inner;
use crate::error::WorkflowError;
use crate::readiness::{wait_for_ready, ResourceKind, WaitRequest};
use crate::resolver::{resolve_tenant_config, TenantConfig};
use crate::scaler::scale_deployments;
use crate::status::release_selector;
use crate::tenant::TenantStatus;

impl Inner {
    /// Scale the application deployments to zero. The database keeps running.
    pub(super) async fn stop(&self, company_code: &str) -> TenantStatus {
        self.set_status(company_code, TenantStatus::Stopping).await;

        let status = match resolve_tenant_config(self.deps.registry.as_ref(), company_code).await {
            Ok(tenant) => {
                let frontend = self.scale(&tenant, &tenant.releases.user_frontend, 0).await;
                let backend = self.scale(&tenant, &tenant.releases.backend_api, 0).await;
                if frontend && backend {
                    TenantStatus::Stopped
                } else {
                    warn!(company_code, "Stop completed with errors");
                    TenantStatus::StopFailed
                }
            }
            Err(e) => {
                error!(company_code, error = %e, "Cannot stop tenant");
                TenantStatus::StopFailed
            }
        };

        self.set_status(company_code, status).await;
        status
    }

    /// Scale the application deployments to one replica and wait for both.
    pub(super) async fn start(&self, company_code: &str) -> TenantStatus {
        self.set_status(company_code, TenantStatus::Starting).await;

        let status = match resolve_tenant_config(self.deps.registry.as_ref(), company_code).await {
            Ok(tenant) => self.start_services(&tenant).await,
            Err(e) => {
                error!(company_code, error = %e, "Cannot start tenant");
                TenantStatus::StartFailed
            }
        };

        self.set_status(company_code, status).await;
        status
    }

    async fn start_services(&self, tenant: &TenantConfig) -> TenantStatus {
        let company_code = tenant.company_code.as_str();
        let backend = self.scale(tenant, &tenant.releases.backend_api, 1).await;
        let frontend = self.scale(tenant, &tenant.releases.user_frontend, 1).await;
        if !(backend && frontend) {
            error!(company_code, "Start failed while scaling; skipping readiness checks");
            return TenantStatus::StartFailed;
        }

        let backend = self.await_rollout(tenant, &tenant.releases.backend_api).await;
        let frontend = self.await_rollout(tenant, &tenant.releases.user_frontend).await;
        if backend && frontend {
            info!(company_code, "Tenant services started");
            TenantStatus::Ready
        } else {
            warn!(company_code, "Services scaled up but did not become ready");
            TenantStatus::StartFailed
        }
    }

    /// Scale one release's deployments; returns whether that succeeded.
    async fn scale(&self, tenant: &TenantConfig, release: &str, replicas: u32) -> bool {
        let result = scale_deployments(
            self.deps.runner.as_ref(),
            &self.deps.config.tools.kubectl,
            &tenant.namespace,
            &release_selector(release),
            replicas,
        )
        .await;
        log_fault(&tenant.company_code, "scale", release, result)
    }

    /// Wait for one release's deployment; returns whether it became available.
    async fn await_rollout(&self, tenant: &TenantConfig, release: &str) -> bool {
        let selector = release_selector(release);
        let result = wait_for_ready(
            self.deps.runner.as_ref(),
            &self.deps.config.tools.kubectl,
            &WaitRequest {
                namespace: &tenant.namespace,
                selector: &selector,
                kind: ResourceKind::Deployment,
                timeout: self.deps.config.rollout_timeout,
            },
        )
        .await;
        log_fault(&tenant.company_code, "wait", release, result)
    }
}

fn log_fault<T>(
    company_code: &str,
    step: &str,
    release: &str,
    result: Result<T, WorkflowError>,
) -> bool {
    match result {
        Ok(_) => true,
        Err(e) => {
            error!(company_code, step, release, error = %e, "Step failed");
            false
        }
    }
}
