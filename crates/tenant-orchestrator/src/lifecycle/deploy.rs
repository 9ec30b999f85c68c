use tracing::{error, info};

use super::Inner;
use crate::charts::AppChart;
use crate::error::WorkflowError;
use crate::helm::{Helm, InstallRequest};
use crate::readiness::{wait_for_ready, ResourceKind, WaitRequest};
use crate::resolver::{resolve_tenant_config, TenantConfig};
use crate::status::release_selector;
use crate::tenant::TenantStatus;
use crate::values::{backend_values, frontend_values};

/// Labels the database chart puts on its primary pod.
const PRIMARY_POD_LABELS: &str =
    "app.kubernetes.io/name=postgresql,app.kubernetes.io/component=primary";

/// Selector of the database primary pod.
fn primary_pod_selector(pg_release: &str) -> String {
    format!("app.kubernetes.io/instance={pg_release},{PRIMARY_POD_LABELS}")
}

impl Inner {
    /// Install or upgrade all three components in dependency order.
    ///
    /// Components applied before a failing step stay in place.
    pub(super) async fn deploy(&self, company_code: &str) -> TenantStatus {
        self.set_status(company_code, TenantStatus::Pending).await;

        match self.try_deploy(company_code).await {
            Ok(()) => {
                info!(company_code, "Tenant deployed");
                self.set_status(company_code, TenantStatus::Ready).await;
                TenantStatus::Ready
            }
            Err(e) => {
                error!(company_code, error = %e, "Tenant deployment failed");
                self.set_status(company_code, TenantStatus::Failed).await;
                TenantStatus::Failed
            }
        }
    }

    async fn try_deploy(&self, company_code: &str) -> Result<(), WorkflowError> {
        let tenant = resolve_tenant_config(self.deps.registry.as_ref(), company_code).await?;
        let config = &self.deps.config;
        let helm = Helm::new(self.deps.runner.as_ref(), &config.tools.helm);

        self.set_status(company_code, TenantStatus::DeployingPg).await;
        helm.ensure_repo(&config.database_chart.repo_name, &config.database_chart.repo_url)
            .await?;
        let install = InstallRequest::new(
            &tenant.releases.postgresql,
            &config.database_chart.chart,
            &tenant.namespace,
        )
        .create_namespace();
        helm.upgrade_install("postgresql", &install).await?;
        let selector = primary_pod_selector(&tenant.releases.postgresql);
        wait_for_ready(
            self.deps.runner.as_ref(),
            &config.tools.kubectl,
            &WaitRequest {
                namespace: &tenant.namespace,
                selector: &selector,
                kind: ResourceKind::Pod,
                timeout: config.provision_timeout,
            },
        )
        .await?;

        self.set_status(company_code, TenantStatus::DeployingBe).await;
        let values = backend_values(config, &tenant.company_code, &tenant.releases.postgresql)?;
        self.install_app(&helm, &tenant, AppChart::BackendApi, &tenant.releases.backend_api, values)
            .await?;

        self.set_status(company_code, TenantStatus::DeployingFe).await;
        let values = frontend_values(config, &tenant.company_code)?;
        self.install_app(
            &helm,
            &tenant,
            AppChart::UserFrontend,
            &tenant.releases.user_frontend,
            values,
        )
        .await?;

        Ok(())
    }

    /// Fetch an application chart, install it, and wait for its rollout.
    async fn install_app(
        &self,
        helm: &Helm<'_>,
        tenant: &TenantConfig,
        app: AppChart,
        release: &str,
        values: Vec<(String, String)>,
    ) -> Result<(), WorkflowError> {
        let chart = self.deps.charts.fetch(&tenant.company_code, app).await?;
        let install =
            InstallRequest::new(release, chart.path().to_string_lossy(), &tenant.namespace)
                .values(values);
        let installed = helm.upgrade_install(app.as_str(), &install).await;
        chart.discard().await;
        installed?;

        let selector = release_selector(release);
        wait_for_ready(
            self.deps.runner.as_ref(),
            &self.deps.config.tools.kubectl,
            &WaitRequest {
                namespace: &tenant.namespace,
                selector: &selector,
                kind: ResourceKind::Deployment,
                timeout: self.deps.config.rollout_timeout,
            },
        )
        .await
    }
}
