use tracing::{error, info, warn};

use super::Inner;
use crate::error::ResolveError;
use crate::helm::{Helm, UninstallOutcome};
use crate::resolver::resolve_tenant_config;
use crate::tenant::TenantStatus;

impl Inner {
    /// Uninstall every release and request namespace deletion.
    ///
    /// A tenant with nothing recorded to delete ends `NOT_READY`. Individual
    /// faults do not stop the remaining steps.
    pub(super) async fn delete(&self, company_code: &str) -> TenantStatus {
        self.set_status(company_code, TenantStatus::Destroying).await;

        let tenant = match resolve_tenant_config(self.deps.registry.as_ref(), company_code).await {
            Ok(tenant) => tenant,
            Err(ResolveError::Config(e)) => {
                info!(company_code, reason = %e, "Nothing to delete; assuming already removed");
                self.set_status(company_code, TenantStatus::NotReady).await;
                return TenantStatus::NotReady;
            }
            Err(e) => {
                error!(company_code, error = %e, "Cannot delete tenant");
                self.set_status(company_code, TenantStatus::DeleteFailed).await;
                return TenantStatus::DeleteFailed;
            }
        };

        let helm = Helm::new(self.deps.runner.as_ref(), &self.deps.config.tools.helm);
        let mut faulted = false;
        for (step, release) in [
            ("uninstall-fe", &tenant.releases.user_frontend),
            ("uninstall-be", &tenant.releases.backend_api),
            ("uninstall-pg", &tenant.releases.postgresql),
        ] {
            match helm.uninstall(step, &tenant.namespace, release).await {
                Ok(UninstallOutcome::Removed | UninstallOutcome::NotFound) => {}
                Err(e) => {
                    error!(
                        company_code,
                        release = %release,
                        error = %e,
                        "Uninstall failed; continuing"
                    );
                    faulted = true;
                }
            }
        }

        match self.deps.cluster.delete_namespace(&tenant.namespace).await {
            Ok(()) => {
                info!(company_code, namespace = %tenant.namespace, "Namespace deletion initiated");
            }
            Err(e) if e.is_not_found() => {
                info!(company_code, namespace = %tenant.namespace, "Namespace already gone");
            }
            Err(e) => {
                error!(
                    company_code,
                    namespace = %tenant.namespace,
                    error = %e,
                    "Namespace deletion failed"
                );
                faulted = true;
            }
        }

        let status = if faulted {
            warn!(company_code, "Deletion completed with errors");
            TenantStatus::DeleteFailed
        } else {
            info!(company_code, "Tenant deleted");
            TenantStatus::NotReady
        };
        self.set_status(company_code, status).await;
        status
    }
}
